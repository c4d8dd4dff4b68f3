//! Telemetry configuration, loaded from the environment.

use serde::{Deserialize, Serialize};

/// Console log rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Full fmt layer output.
    Text,
    /// Single-line compact output.
    Compact,
}

/// Recognized telemetry options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// env-filter directive string (e.g. `info,hs_02_consensus=debug`).
    pub log_filter: String,
    /// Console rendering.
    pub format: LogFormat,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_filter: "info".to_owned(),
            format: LogFormat::Text,
        }
    }
}

impl TelemetryConfig {
    /// Read `HS_LOG_LEVEL` and `HS_LOG_FORMAT`, falling back to defaults.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(filter) = std::env::var("HS_LOG_LEVEL") {
            if !filter.is_empty() {
                config.log_filter = filter;
            }
        }
        if let Ok(format) = std::env::var("HS_LOG_FORMAT") {
            if format.eq_ignore_ascii_case("compact") {
                config.format = LogFormat::Compact;
            }
        }
        config
    }
}
