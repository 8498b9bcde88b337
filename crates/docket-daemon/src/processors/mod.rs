//! Job processors: the per-file work the daemon schedules.
//!
//! The core only knows the [`JobProcessor`] trait. On success the processor
//! has written the input's output artifact atomically; on failure it has
//! left no output behind, so the next sweep finds the input again.

mod command;
mod template;

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use docket_config::ProcessorConfig;
use docket_watch::CompletionOracle;

use crate::error::ProcessError;

pub use command::CommandProcessor;
pub use template::{human_size, TemplateProcessor};

#[async_trait]
pub trait JobProcessor: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &str;

    /// Process one input. May be slow; is never cancelled by the daemon.
    async fn process(&self, input: &Path) -> Result<(), ProcessError>;
}

/// Build the processor selected in configuration.
pub fn from_config(config: &ProcessorConfig, oracle: CompletionOracle) -> Arc<dyn JobProcessor> {
    match config {
        ProcessorConfig::Command(command) => Arc::new(CommandProcessor::new(command.clone(), oracle)),
        ProcessorConfig::Template(template) => {
            Arc::new(TemplateProcessor::new(template.clone(), oracle))
        }
    }
}
