//! ghostscale-core — shared records, configuration, and tracing setup.

pub mod config;
pub mod error;
pub mod telemetry;
pub mod types;

pub use config::{GhostscaleConfig, LoggingConfig, parse_duration};
pub use error::ConfigError;
pub use telemetry::init_tracing;
pub use types::*;
