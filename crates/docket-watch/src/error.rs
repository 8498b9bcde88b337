//! Error types for input discovery.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while discovering input files.
#[derive(Error, Debug)]
pub enum WatchError {
    /// File system watching error.
    #[error("File watching error: {0}")]
    Watch(String),

    /// Watch root is missing or not a directory.
    #[error("Invalid watch root: {0}")]
    InvalidRoot(PathBuf),

    /// A background sweep task died before reporting.
    #[error("Sweep task failed: {0}")]
    Task(String),
}

/// Result type for discovery operations.
pub type Result<T> = std::result::Result<T, WatchError>;

impl From<notify::Error> for WatchError {
    fn from(err: notify::Error) -> Self {
        WatchError::Watch(err.to_string())
    }
}

impl From<tokio::task::JoinError> for WatchError {
    fn from(err: tokio::task::JoinError) -> Self {
        WatchError::Task(err.to_string())
    }
}
