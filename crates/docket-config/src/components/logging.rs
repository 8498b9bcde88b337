//! Logging section
//!
//! Level, output format, and an optional append-only log file. Rotation is
//! left to the process supervisor.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// `[logging]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default level directive when `RUST_LOG` is unset
    pub level: String,
    /// Line format
    pub format: LogFormat,
    /// Append log lines to this file instead of stderr
    pub file: Option<PathBuf>,
}

/// Log line format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogFormat {
    #[serde(rename = "text")]
    Text,
    #[serde(rename = "json")]
    Json,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
            file: None,
        }
    }
}
