//! # swarm-telemetry
//!
//! Tracing initialization shared by Hive-Swarm binaries.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use swarm_telemetry::{init_telemetry, TelemetryConfig};
//!
//! fn main() {
//!     let config = TelemetryConfig::from_env();
//!     init_telemetry(&config).expect("failed to init telemetry");
//!     // tracing macros are live from here on
//! }
//! ```
//!
//! ## Environment variables
//!
//! | Variable        | Default | Description                          |
//! |-----------------|---------|--------------------------------------|
//! | `HS_LOG_LEVEL`  | `info`  | Log level filter (env-filter syntax) |
//! | `HS_LOG_FORMAT` | `text`  | `text` or `compact`                  |

mod config;

pub use config::{LogFormat, TelemetryConfig};

use thiserror::Error;
use tracing_subscriber::{fmt, EnvFilter};

/// Telemetry initialization errors.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// The level filter could not be parsed.
    #[error("Invalid log filter {filter:?}: {reason}")]
    InvalidFilter { filter: String, reason: String },

    /// A global subscriber is already installed.
    #[error("Tracing subscriber already initialized: {0}")]
    AlreadyInitialized(String),
}

/// Install the global tracing subscriber from the given configuration.
///
/// Call once per process, before any subsystem is constructed. Subsequent
/// calls fail with [`TelemetryError::AlreadyInitialized`].
pub fn init_telemetry(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    let filter =
        EnvFilter::try_new(&config.log_filter).map_err(|err| TelemetryError::InvalidFilter {
            filter: config.log_filter.clone(),
            reason: err.to_string(),
        })?;

    let builder = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_level(true);

    let result = match config.format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Compact => builder.compact().try_init(),
    };
    result.map_err(|err| TelemetryError::AlreadyInitialized(err.to_string()))
}
