//! # Infrastructure
//!
//! Ambient concerns of the engine: configuration loading and the
//! logging/telemetry setup.

pub mod config;
pub mod logging;

pub use config::{
    EngineConfig, ExtractionConfig, LoggingConfig, PaginationConfig, TraversalConfig,
};
pub use logging::{init_logging, init_logging_with_config};
