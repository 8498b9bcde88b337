//! The single sink every discovery source reports into.

use std::path::PathBuf;
use std::sync::Arc;

use docket_watch::{Acceptance, CandidateSink, CompletionOracle, DiscoverySource};
use tracing::{debug, info};

use crate::queue::TaskQueue;
use crate::registry::JobRegistry;

/// Turns candidates into queued work, at most once per unprocessed path.
///
/// Checks run cheapest-to-undo first: a closed queue, then the output
/// artifact, then the registry. Only a path that passes all three is
/// pushed.
pub struct Dispatcher {
    oracle: CompletionOracle,
    registry: Arc<JobRegistry>,
    queue: Arc<TaskQueue>,
}

impl Dispatcher {
    pub fn new(oracle: CompletionOracle, registry: Arc<JobRegistry>, queue: Arc<TaskQueue>) -> Self {
        Self {
            oracle,
            registry,
            queue,
        }
    }
}

impl CandidateSink for Dispatcher {
    fn accept(&self, path: PathBuf, source: DiscoverySource) -> Acceptance {
        if self.queue.is_closed() {
            debug!(path = %path.display(), %source, "Shutting down, not accepting");
            return Acceptance::Closed;
        }

        if self.oracle.is_complete(&path) {
            debug!(path = %path.display(), %source, "Output already exists");
            return Acceptance::AlreadyComplete;
        }

        // A job finishing between these two checks can requeue its path; the
        // worker re-checks the oracle after claiming and skips it.
        if !self.registry.try_accept(&path) {
            debug!(path = %path.display(), %source, "Already pending or running");
            return Acceptance::Duplicate;
        }

        match self.queue.push(path.clone()) {
            Ok(()) => {
                info!(
                    path = %path.display(),
                    %source,
                    queue_size = self.queue.len(),
                    "Queued"
                );
                Acceptance::Queued
            }
            Err(path) => {
                // Closed between the first check and the push
                self.registry.withdraw(&path);
                debug!(path = %path.display(), %source, "Shutting down, not accepting");
                Acceptance::Closed
            }
        }
    }
}
