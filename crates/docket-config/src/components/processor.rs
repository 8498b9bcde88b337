//! Processor section
//!
//! Selects the job processor that turns one input file into its output
//! artifact. The daemon core treats it as opaque.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// `[processor]` section, tagged by `kind`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProcessorConfig {
    /// Run an external program per input
    Command(CommandProcessorConfig),
    /// Render a text template from the input's JSON record
    Template(TemplateProcessorConfig),
}

impl ProcessorConfig {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Command(_) => "command",
            Self::Template(_) => "template",
        }
    }
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self::Template(TemplateProcessorConfig::default())
    }
}

/// Options for the external command processor.
///
/// `{input}`, `{output}`, `{stem}` and `{dir}` in `args` are replaced per job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandProcessorConfig {
    pub program: String,
    pub args: Vec<String>,
    /// Working directory; defaults to the input's directory
    pub working_dir: Option<PathBuf>,
    /// The child is killed after this many seconds
    pub timeout_secs: u64,
}

impl CommandProcessorConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for CommandProcessorConfig {
    fn default() -> Self {
        Self {
            program: String::new(),
            args: vec!["{input}".to_string(), "{output}".to_string()],
            working_dir: None,
            timeout_secs: 600,
        }
    }
}

/// Options for the built-in template renderer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplateProcessorConfig {
    /// Template file with `{{placeholder}}` markers
    pub template: PathBuf,
    /// JSON pointer selecting the record inside each input document
    pub record_pointer: String,
    /// Longest wait for a companion file named by the record
    pub companion_timeout_secs: u64,
    /// Delay between companion existence checks
    pub companion_poll_ms: u64,
}

impl TemplateProcessorConfig {
    pub fn companion_timeout(&self) -> Duration {
        Duration::from_secs(self.companion_timeout_secs)
    }

    pub fn companion_poll(&self) -> Duration {
        Duration::from_millis(self.companion_poll_ms)
    }
}

impl Default for TemplateProcessorConfig {
    fn default() -> Self {
        Self {
            template: crate::config_dir().join("template.txt"),
            record_pointer: "/data/asdf/0".to_string(),
            companion_timeout_secs: 60,
            companion_poll_ms: 2000,
        }
    }
}
