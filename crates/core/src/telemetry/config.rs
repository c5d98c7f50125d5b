//! Configuration for log output

use serde::{Deserialize, Serialize};

/// Output format for log lines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Log configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogConfig {
    /// Log level filter (e.g., "info", "debug", "portal_http=trace")
    pub log_level: String,
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

impl LogConfig {
    /// Create configuration from environment variables
    ///
    /// Supports the following environment variables:
    /// - `RUST_LOG`: Log level filter
    /// - `PORTAL_LOG_FORMAT`: `json` or `pretty`
    pub fn from_env() -> Self {
        let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
        let format = std::env::var("PORTAL_LOG_FORMAT")
            .map(|f| parse_format(&f))
            .unwrap_or_default();

        Self { log_level, format }
    }

    /// Create a development configuration with sensible defaults
    pub fn dev() -> Self {
        Self {
            log_level: "debug".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

fn parse_format(value: &str) -> LogFormat {
    if value.eq_ignore_ascii_case("json") {
        LogFormat::Json
    } else {
        LogFormat::Pretty
    }
}
