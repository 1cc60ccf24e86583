//! # Logging Setup
//!
//! Builds the tracing subscriber for the engine: an `EnvFilter` driven
//! by `RUST_LOG` (falling back to the configured level), a console
//! layer in either human-readable or JSON form, and an optional
//! daily-rolled file layer with a non-blocking writer.

use anyhow::{Result, anyhow};
use once_cell::sync::Lazy;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::infrastructure::config::LoggingConfig;

// Keeps non-blocking file writers alive for the process lifetime.
static LOG_GUARDS: Lazy<Mutex<Vec<non_blocking::WorkerGuard>>> =
    Lazy::new(|| Mutex::new(Vec::new()));

const LOG_FILE_PREFIX: &str = "harvester.log";

/// Initializes logging with the default configuration.
///
/// # Errors
/// Fails when a global subscriber is already installed.
pub fn init_logging() -> Result<()> {
    init_logging_with_config(&LoggingConfig::default())
}

/// Initializes logging from a [`LoggingConfig`].
///
/// # Errors
/// Fails when a global subscriber is already installed.
pub fn init_logging_with_config(config: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.clone()));

    let file_writer = if config.file_enabled {
        let dir = config.log_dir.clone().unwrap_or_else(default_log_dir);
        let appender = rolling::daily(dir, LOG_FILE_PREFIX);
        let (writer, guard) = non_blocking(appender);
        LOG_GUARDS
            .lock()
            .map_err(|_| anyhow!("log guard registry poisoned"))?
            .push(guard);
        Some(writer)
    } else {
        None
    };

    if config.json_output {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .with(file_writer.map(|writer| fmt::layer().with_writer(writer).with_ansi(false)))
            .try_init()
            .map_err(|e| anyhow!("failed to install logging subscriber: {e}"))?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer())
            .with(file_writer.map(|writer| fmt::layer().with_writer(writer).with_ansi(false)))
            .try_init()
            .map_err(|e| anyhow!("failed to install logging subscriber: {e}"))?;
    }

    Ok(())
}

/// Log directory next to the executable, current directory as fallback.
fn default_log_dir() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(std::path::Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."))
        .join("logs")
}
