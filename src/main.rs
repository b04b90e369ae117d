use clap::Parser;
use log::{debug, info};
use resources_usage::{
    Cli, Config, ConfigLayer, CsvSink, JsonSink, KubernetesLoader, OutputFormat, ReportSink,
    Reporter, Result, TableSink, init_logger,
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logger(cli.verbose, cli.quiet)?;

    // Both ring and aws-lc-rs are linked, rustls needs an explicit provider
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

    let mut layers = vec![cli.config_layer()];
    if let Some(path) = cli.config.as_deref() {
        layers.push(ConfigLayer::from_file(path)?);
    }
    let config = Config::from_layers(layers)?;

    info!("Starting Kubernetes resources usage report");
    debug!("Configuration: {:?}", config);

    let loader = KubernetesLoader::new(&config).await?;
    let reporter = Reporter::new(&loader, &config);

    let mut sink: Box<dyn ReportSink> = match cli.output {
        OutputFormat::Csv => Box::new(CsvSink::new(std::io::stdout().lock())?),
        OutputFormat::Json => Box::new(JsonSink::new(std::io::stdout().lock(), &config)),
        OutputFormat::Table => Box::new(TableSink::new()),
    };

    reporter.run(sink.as_mut()).await?;

    Ok(())
}
