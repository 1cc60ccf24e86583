//! # Engine Configuration
//!
//! Runtime knobs for the extraction engine, grouped by component.
//! Every section deserializes with defaults so a config file only needs
//! to name what it overrides.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::fs;
use tracing::info;

/// Complete engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub extraction: ExtractionConfig,
    pub pagination: PaginationConfig,
    pub traversal: TraversalConfig,
    pub logging: LoggingConfig,
}

/// Probe evaluation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Bounded wait per probe in milliseconds. Zero disables waiting and
    /// each probe gets a single immediate query.
    pub probe_timeout_ms: u64,

    /// Re-query interval while waiting on a probe.
    pub poll_interval_ms: u64,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            probe_timeout_ms: defaults::PROBE_TIMEOUT_MS,
            poll_interval_ms: defaults::POLL_INTERVAL_MS,
        }
    }
}

impl ExtractionConfig {
    #[must_use]
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Pagination stepping settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PaginationConfig {
    /// Hard step ceiling shared by both pagination strategies.
    pub max_steps: u32,

    /// Bounded wait for the item count to grow after an activation.
    pub growth_timeout_ms: u64,

    /// Fixed settle interval after a scroll request.
    pub settle_delay_ms: u64,

    /// Re-count interval while waiting for growth.
    pub poll_interval_ms: u64,

    /// Bounded wait for the load-more control to become interactable.
    pub activation_timeout_ms: u64,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            max_steps: defaults::MAX_PAGINATION_STEPS,
            growth_timeout_ms: defaults::GROWTH_TIMEOUT_MS,
            settle_delay_ms: defaults::SETTLE_DELAY_MS,
            poll_interval_ms: defaults::POLL_INTERVAL_MS,
            activation_timeout_ms: defaults::ACTIVATION_TIMEOUT_MS,
        }
    }
}

impl PaginationConfig {
    #[must_use]
    pub fn growth_timeout(&self) -> Duration {
        Duration::from_millis(self.growth_timeout_ms)
    }

    #[must_use]
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    #[must_use]
    pub fn activation_timeout(&self) -> Duration {
        Duration::from_millis(self.activation_timeout_ms)
    }
}

/// Traversal and worker pool settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TraversalConfig {
    /// Concurrent detail-page workers.
    pub max_concurrent_workers: usize,

    /// Capacity of the accepted-record stream channel.
    pub record_channel_capacity: usize,
}

impl Default for TraversalConfig {
    fn default() -> Self {
        Self {
            max_concurrent_workers: defaults::MAX_CONCURRENT_WORKERS,
            record_channel_capacity: defaults::RECORD_CHANNEL_CAPACITY,
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset.
    pub level: String,

    /// Emit structured JSON instead of human-readable lines.
    pub json_output: bool,

    /// Also write to a daily-rolled file.
    pub file_enabled: bool,

    /// Directory for log files, when file output is enabled.
    pub log_dir: Option<std::path::PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_output: false,
            file_enabled: false,
            log_dir: None,
        }
    }
}

impl EngineConfig {
    /// Loads configuration from a JSON file.
    ///
    /// # Errors
    /// Fails when the file cannot be read or parsed.
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        info!("Loaded engine configuration from {}", path.display());
        Ok(config)
    }

    /// Writes the configuration as pretty-printed JSON.
    ///
    /// # Errors
    /// Fails when the file cannot be written.
    pub async fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content =
            serde_json::to_string_pretty(self).context("failed to serialize configuration")?;
        fs::write(path, content)
            .await
            .with_context(|| format!("failed to write config file {}", path.display()))?;
        Ok(())
    }
}

/// Default values for all engine settings.
pub mod defaults {
    /// Default bounded wait per probe in milliseconds.
    pub const PROBE_TIMEOUT_MS: u64 = 2_000;

    /// Default re-query interval in milliseconds.
    pub const POLL_INTERVAL_MS: u64 = 200;

    /// Default hard ceiling on pagination steps per listing.
    pub const MAX_PAGINATION_STEPS: u32 = 30;

    /// Default bounded wait for post-activation growth in milliseconds.
    pub const GROWTH_TIMEOUT_MS: u64 = 5_000;

    /// Default settle interval after a scroll request in milliseconds.
    pub const SETTLE_DELAY_MS: u64 = 1_000;

    /// Default bounded wait for control interactability in milliseconds.
    pub const ACTIVATION_TIMEOUT_MS: u64 = 3_000;

    /// Default number of concurrent detail-page workers.
    pub const MAX_CONCURRENT_WORKERS: usize = 8;

    /// Default capacity of the accepted-record stream channel.
    pub const RECORD_CHANNEL_CAPACITY: usize = 64;
}
