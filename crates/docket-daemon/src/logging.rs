//! Tracing subscriber setup.

use std::fs::OpenOptions;
use std::sync::Mutex;

use docket_config::{LogFormat, LoggingConfig};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::EnvFilter;

use crate::error::{DaemonError, Result};

/// Pick the filter: `RUST_LOG` first, then the command-line level, then the
/// configured level.
pub fn build_filter(configured: &str, level_override: Option<LevelFilter>) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    match level_override {
        Some(level) => Ok(EnvFilter::default().add_directive(level.into())),
        None => EnvFilter::try_new(configured)
            .map_err(|e| DaemonError::Logging(format!("invalid level {configured:?}: {e}"))),
    }
}

/// Install the global subscriber. Call once, before anything logs.
pub fn init(config: &LoggingConfig, level_override: Option<LevelFilter>) -> Result<()> {
    let filter = build_filter(&config.level, level_override)?;

    let (writer, ansi) = match &config.file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| {
                    DaemonError::Logging(format!("cannot open {}: {e}", path.display()))
                })?;
            (BoxMakeWriter::new(Mutex::new(file)), false)
        }
        None => (BoxMakeWriter::new(std::io::stderr), true),
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(ansi);

    match config.format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    }
    .map_err(|e| DaemonError::Logging(e.to_string()))
}
