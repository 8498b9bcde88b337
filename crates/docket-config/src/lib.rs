//! # Docket Configuration
//!
//! Static configuration for the docket daemon, read once at startup from a
//! TOML file. Every field has a default, so an absent file is a valid
//! configuration; a malformed one is not.
//!
//! ```toml
//! [watch]
//! root = "/srv/docket"
//! target_dir = "inbox"
//! input_extension = "json"
//! output_extension = "docx"
//!
//! [workers]
//! count = 10
//!
//! [processor]
//! kind = "command"
//! program = "/usr/local/bin/render"
//! args = ["{input}", "{output}"]
//! ```

#![warn(clippy::all)]

pub mod components;
mod error;

pub use components::*;
pub use error::{ConfigError, ConfigResult};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Complete daemon configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocketConfig {
    pub watch: WatchConfig,
    pub workers: WorkersConfig,
    pub processor: ProcessorConfig,
    pub logging: LoggingConfig,
}

/// Directory holding docket's config files: `$XDG_CONFIG_HOME/docket`
pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config")
        })
        .join("docket")
}

impl DocketConfig {
    /// Default config file path: `$XDG_CONFIG_HOME/docket/config.toml`
    pub fn default_path() -> PathBuf {
        config_dir().join("config.toml")
    }

    /// Load configuration.
    ///
    /// An explicit `path` must exist. Without one, the default path is tried
    /// and defaults are used when it is absent.
    pub fn load(path: Option<&Path>) -> ConfigResult<Self> {
        let config = match path {
            Some(path) => {
                if !path.exists() {
                    return Err(ConfigError::NotFound(path.to_path_buf()));
                }
                Self::from_file(path)?
            }
            None => {
                let path = Self::default_path();
                if path.exists() {
                    Self::from_file(&path)?
                } else {
                    debug!("No config at {}, using defaults", path.display());
                    Self::default()
                }
            }
        };
        Ok(config)
    }

    /// Read and parse a config file without validating it.
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Render the configuration as TOML.
    pub fn to_toml_string(&self) -> String {
        toml::to_string_pretty(self).unwrap_or_else(|e| format!("# unrenderable config: {e}\n"))
    }

    /// Reject values the daemon cannot run with.
    pub fn validate(&self) -> ConfigResult<()> {
        let watch = &self.watch;
        if watch.root.as_os_str().is_empty() {
            return Err(ConfigError::invalid("watch.root", "must not be empty"));
        }
        if watch.target_dir.is_empty() || watch.target_dir.contains(['/', '\\']) {
            return Err(ConfigError::invalid(
                "watch.target_dir",
                "must be a single directory name",
            ));
        }
        for (field, ext) in [
            ("watch.input_extension", &watch.input_extension),
            ("watch.output_extension", &watch.output_extension),
        ] {
            if ext.is_empty() {
                return Err(ConfigError::invalid(field, "must not be empty"));
            }
            if ext.starts_with('.') {
                return Err(ConfigError::invalid(field, "give the extension without a leading dot"));
            }
        }
        if watch.input_extension == watch.output_extension {
            return Err(ConfigError::invalid(
                "watch.output_extension",
                "must differ from watch.input_extension",
            ));
        }
        if watch.scan_interval_secs == 0 {
            return Err(ConfigError::invalid("watch.scan_interval_secs", "must be greater than 0"));
        }
        if watch.debounce_ms == 0 {
            return Err(ConfigError::invalid("watch.debounce_ms", "must be greater than 0"));
        }
        if self.workers.count == 0 {
            return Err(ConfigError::invalid("workers.count", "must be greater than 0"));
        }

        match &self.processor {
            ProcessorConfig::Command(cmd) => {
                if cmd.program.trim().is_empty() {
                    return Err(ConfigError::invalid("processor.program", "must not be empty"));
                }
                if cmd.timeout_secs == 0 {
                    return Err(ConfigError::invalid("processor.timeout_secs", "must be greater than 0"));
                }
            }
            ProcessorConfig::Template(tpl) => {
                if !tpl.record_pointer.is_empty() && !tpl.record_pointer.starts_with('/') {
                    return Err(ConfigError::invalid(
                        "processor.record_pointer",
                        "must be empty or start with '/'",
                    ));
                }
                if tpl.companion_poll_ms == 0 {
                    return Err(ConfigError::invalid("processor.companion_poll_ms", "must be greater than 0"));
                }
            }
        }

        Ok(())
    }
}
