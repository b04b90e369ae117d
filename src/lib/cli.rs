use std::path::PathBuf;

use clap::Parser;

use crate::lib::config::ConfigLayer;

/// Kubernetes Resources Usage Report
///
/// Compares the live CPU and memory usage of every Deployment and
/// StatefulSet with its declared requests and recommends whether to keep,
/// shrink or remove it.
#[derive(Parser, Debug)]
#[command(name = "resources-usage", author, version, about, styles=get_styles())]
pub struct Cli {
    /// Kubernetes config file
    ///
    /// Uses the default kubeconfig, or the in-cluster config, when not given
    #[arg(long, value_name = "FILE")]
    pub kubeconfig: Option<PathBuf>,

    /// Provide context name
    ///
    /// Use if you have multiple clusters in your kubeconfig
    #[arg(long)]
    pub context: Option<String>,

    /// Only report workloads in this namespace
    #[arg(long)]
    pub namespace: Option<String>,

    /// Namespaces to skip, comma separated
    /// [default: default,kube-node-lease,kube-public,kube-system]
    #[arg(long, value_delimiter = ',', num_args = 1..)]
    pub ignore_namespaces: Option<Vec<String>>,

    /// Output format: csv (default), json or table
    #[arg(long, value_name = "FORMAT", default_value = "csv")]
    pub output: OutputFormat,

    /// Unused share of the per-pod request, in percent, tolerated before
    /// recommending an update [default: 10]
    #[arg(long)]
    pub threshold_percent: Option<u32>,

    /// Maximum number of workloads fetched concurrently [default: 4]
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// YAML config file; command line flags take precedence
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Suppress log output to stderr (logs still written to file)
    #[arg(short, long)]
    pub quiet: bool,
}

impl Cli {
    /// Settings given on the command line
    pub fn config_layer(&self) -> ConfigLayer {
        ConfigLayer {
            kubeconfig: self.kubeconfig.clone(),
            context: self.context.clone(),
            namespace: self.namespace.clone(),
            ignore_namespaces: self.ignore_namespaces.clone(),
            threshold_percent: self.threshold_percent,
            concurrency: self.concurrency,
        }
    }
}

/// Output format for the report
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Stream comma separated rows to stdout
    Csv,
    /// Output results as JSON
    Json,
    /// Display results in an interactive table (TUI)
    Table,
}

/// Set color and variants for help description
///
/// Thanks to [Praveen Perera](https://stackoverflow.com/a/76916424)
fn get_styles() -> clap::builder::Styles {
    clap::builder::Styles::styled()
        .usage(
            anstyle::Style::new()
                .bold()
                .underline()
                .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Yellow))),
        )
        .header(
            anstyle::Style::new()
                .bold()
                .underline()
                .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Yellow))),
        )
        .literal(
            anstyle::Style::new().fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Green))),
        )
        .invalid(
            anstyle::Style::new()
                .bold()
                .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Red))),
        )
        .error(
            anstyle::Style::new()
                .bold()
                .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Red))),
        )
        .valid(
            anstyle::Style::new()
                .bold()
                .underline()
                .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Green))),
        )
        .placeholder(
            anstyle::Style::new().fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::White))),
        )
}
