//! Watch section
//!
//! Where to look for input files and how their outputs are named.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// `[watch]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Root of the watched tree
    pub root: PathBuf,
    /// Name of the subdirectory that holds input files, at any depth
    pub target_dir: String,
    /// Extension of input files, without the leading dot
    pub input_extension: String,
    /// Extension of the output artifact written next to each input
    pub output_extension: String,
    /// Seconds between periodic re-sweeps
    pub scan_interval_secs: u64,
    /// Quiet period before a live notification is reported
    pub debounce_ms: u64,
}

impl WatchConfig {
    pub fn scan_interval(&self) -> Duration {
        Duration::from_secs(self.scan_interval_secs)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("/srv/docket"),
            target_dir: "inbox".to_string(),
            input_extension: "json".to_string(),
            output_extension: "docx".to_string(),
            scan_interval_secs: 300,
            debounce_ms: 500,
        }
    }
}
