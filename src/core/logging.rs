//! Logging setup.
//!
//! A `tracing` registry with a human-readable stdout layer and, when a log
//! directory is configured, a daily-rolling JSON file layer. `log` macros are
//! bridged into the same subscriber.

use std::fs;
use std::io;
use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::config::LoggingConfig;

/// Base name of the rolling log file
pub const LOG_FILE_NAME: &str = "gm-dashboard.log";

fn env_filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.filter))
}

/// Initialize logging.
///
/// Keep the returned guard alive for as long as file logs should be flushed.
/// Calling this again once a subscriber is installed is a no-op.
pub fn init(config: &LoggingConfig) -> Option<WorkerGuard> {
    let (file_layer, guard) = match config.log_dir.as_deref() {
        Some(log_dir) => match prepare_log_dir(log_dir) {
            Ok(()) => {
                let file_appender = tracing_appender::rolling::daily(log_dir, LOG_FILE_NAME);
                let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

                // JSON for ingestion
                let layer = tracing_subscriber::fmt::layer()
                    .with_writer(non_blocking)
                    .json()
                    .with_file(true)
                    .with_line_number(true)
                    .with_target(true)
                    .with_filter(env_filter(config));
                (Some(layer), Some(guard))
            }
            Err(e) => {
                eprintln!("Failed to create logs directory {}: {}", log_dir.display(), e);
                (None, None)
            }
        },
        None => (None, None),
    };

    let stdout_layer = tracing_subscriber::fmt::layer()
        .with_writer(io::stdout)
        .with_target(true)
        .with_filter(env_filter(config));

    match tracing_subscriber::registry()
        .with(stdout_layer)
        .with(file_layer)
        .try_init()
    {
        Ok(()) => {
            log::info!(
                "Logging initialized (filter: {}, file: {})",
                config.filter,
                config
                    .log_dir
                    .as_deref()
                    .map(|d| d.display().to_string())
                    .unwrap_or_else(|| "disabled".to_string())
            );
            guard
        }
        Err(_) => {
            log::debug!("Logging already initialized");
            None
        }
    }
}

/// Test-friendly subscriber writing through the test harness capture.
pub fn init_for_tests() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")))
        .try_init();
}

fn prepare_log_dir(log_dir: &Path) -> io::Result<()> {
    if !log_dir.exists() {
        fs::create_dir_all(log_dir)?;
    }
    Ok(())
}
