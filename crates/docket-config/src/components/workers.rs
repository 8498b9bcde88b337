//! Worker pool section

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// `[workers]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkersConfig {
    /// Number of concurrent jobs
    pub count: usize,
    /// Seconds to wait for running jobs after a termination signal
    pub shutdown_grace_secs: u64,
}

impl WorkersConfig {
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

impl Default for WorkersConfig {
    fn default() -> Self {
        Self {
            count: 10,
            shutdown_grace_secs: 120,
        }
    }
}
