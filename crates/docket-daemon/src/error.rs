//! Error types for the daemon and its job processors.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Why a single job failed. Never fatal to the daemon.
#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid input {path}: {message}")]
    InvalidInput { path: PathBuf, message: String },

    #[error("Failed to load template {path}: {source}")]
    Template {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Command exited with {status}\nstdout:\n{stdout}\nstderr:\n{stderr}")]
    CommandFailed {
        status: String,
        stdout: String,
        stderr: String,
    },

    #[error("Command timed out after {0:?}")]
    Timeout(Duration),

    #[error("Processor reported success but {0} does not exist")]
    MissingOutput(PathBuf),

    #[error("Job task failed: {0}")]
    Panicked(String),
}

/// Errors that stop the daemon from starting or running.
#[derive(Error, Debug)]
pub enum DaemonError {
    #[error("Configuration error: {0}")]
    Config(#[from] docket_config::ConfigError),

    #[error("Failed to set up logging: {0}")]
    Logging(String),

    #[error("Failed to install signal handler: {0}")]
    Signal(#[source] std::io::Error),
}

pub type Result<T> = std::result::Result<T, DaemonError>;
