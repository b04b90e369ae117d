use directories::ProjectDirs;
use log::LevelFilter;
use std::fs;
use std::io::Write;
use std::path::PathBuf;

use crate::Result;
use crate::lib::error::ConfigError;

/// Initialize the logger with file and console output
///
/// Console output goes to stderr, stdout carries the report.
///
/// # Arguments
///
/// * `verbose` - Enable debug level logging
/// * `quiet` - Suppress console output (logs still written to file)
///
/// # Platform-specific log locations
///
/// * **macOS**: `~/Library/Application Support/com.frost8ytes.resources-usage/resources-usage.log`
/// * **Linux**: `~/.local/share/resources-usage/resources-usage.log`
/// * **Windows**: `C:\Users\<User>\AppData\Local\frost8ytes\resources-usage\data\resources-usage.log`
///
pub fn init_logger(verbose: bool, quiet: bool) -> Result<()> {
    let log_level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    let log_path = log_file_path()?;

    let log_file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .map_err(|e| ConfigError::InvalidValue(format!("Failed to open log file: {}", e)))?;

    let mut builder = env_logger::Builder::new();
    builder
        .filter_level(log_level)
        .parse_default_env()
        .format_timestamp_secs();

    if quiet {
        builder.target(env_logger::Target::Pipe(Box::new(log_file)));
    } else {
        let tee = Tee {
            stderr: std::io::stderr(),
            file: log_file,
        };
        builder.target(env_logger::Target::Pipe(Box::new(tee)));
    }

    builder.init();

    log::debug!("Logging to: {}", log_path.display());

    Ok(())
}

fn log_file_path() -> Result<PathBuf> {
    let dir = if let Some(proj_dirs) = ProjectDirs::from("com", "frost8ytes", "resources-usage") {
        let log_dir = proj_dirs.data_local_dir().to_path_buf();
        fs::create_dir_all(&log_dir).map_err(|e| {
            ConfigError::InvalidValue(format!("Failed to create log directory: {}", e))
        })?;
        log_dir
    } else {
        // Fallback to current directory if ProjectDirs fails
        std::env::current_dir().map_err(|e| {
            ConfigError::InvalidValue(format!("Failed to get current directory: {}", e))
        })?
    };
    Ok(dir.join("resources-usage.log"))
}

/// Writes every log line to stderr and the log file
struct Tee {
    stderr: std::io::Stderr,
    file: fs::File,
}

impl Write for Tee {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.stderr.write_all(buf)?;
        self.file.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.stderr.flush()?;
        self.file.flush()?;
        Ok(())
    }
}
