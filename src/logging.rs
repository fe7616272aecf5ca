//! Logging setup
//!
//! Installs a `tracing` subscriber with a stdout layer and, when enabled, an
//! append-only file layer in the configured log directory. Timestamps use
//! local time.

use crate::config::LoggingConfig;
use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing_subscriber::prelude::*;

/// Name of the log file inside the log directory
pub const LOG_FILE_NAME: &str = "voicemenu.log";

/// Format timestamps using the system's local time via chrono
struct LocalTimer;

impl tracing_subscriber::fmt::time::FormatTime for LocalTimer {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"))
    }
}

fn env_filter(config: &LoggingConfig) -> tracing_subscriber::EnvFilter {
    tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.level))
}

/// Install the global subscriber
///
/// Returns the log file path when file logging is active. Falls back to
/// stdout only if the file cannot be opened. Fails if a global subscriber is
/// already installed.
pub fn init_logging(config: &LoggingConfig) -> Result<Option<PathBuf>> {
    let log_file = if config.file_logging {
        open_log_file(config)
            .map_err(|e| eprintln!("File logging disabled: {:#}", e))
            .ok()
    } else {
        None
    };

    let stdout_layer = tracing_subscriber::fmt::layer().with_timer(LocalTimer);

    match log_file {
        Some((path, file)) => {
            let file_layer = tracing_subscriber::fmt::layer()
                .with_writer(std::sync::Mutex::new(file))
                .with_timer(LocalTimer)
                .with_ansi(false);
            tracing_subscriber::registry()
                .with(env_filter(config))
                .with(stdout_layer)
                .with(file_layer)
                .try_init()
                .context("Failed to install tracing subscriber")?;
            tracing::info!("Logging to {}", path.display());
            Ok(Some(path))
        }
        None => {
            tracing_subscriber::registry()
                .with(env_filter(config))
                .with(stdout_layer)
                .try_init()
                .context("Failed to install tracing subscriber")?;
            Ok(None)
        }
    }
}

fn open_log_file(config: &LoggingConfig) -> Result<(PathBuf, std::fs::File)> {
    let log_dir = config.log_dir();
    std::fs::create_dir_all(&log_dir)
        .with_context(|| format!("Failed to create log directory {}", log_dir.display()))?;

    let path = log_dir.join(LOG_FILE_NAME);
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("Failed to open log file {}", path.display()))?;
    Ok((path, file))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_open_log_file_creates_directory() {
        let dir = TempDir::new().unwrap();
        let config = LoggingConfig {
            level: "debug".to_string(),
            file_logging: true,
            log_dir: Some(dir.path().join("nested").join("logs")),
        };

        let (path, _file) = open_log_file(&config).unwrap();
        assert!(path.ends_with(LOG_FILE_NAME));
        assert!(path.exists());
    }
}
