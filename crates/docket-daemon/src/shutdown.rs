//! Drain-and-exit on termination requests.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::{DaemonError, Result};
use crate::queue::TaskQueue;
use crate::registry::JobRegistry;
use crate::worker::WorkerPool;

/// How the drain ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainOutcome {
    /// Every job finished within the grace period
    Clean,
    /// The grace period ran out with jobs still executing
    TimedOut { in_flight: usize },
}

impl DrainOutcome {
    pub fn is_clean(&self) -> bool {
        matches!(self, Self::Clean)
    }
}

/// Stops intake, lets running jobs finish, and bounds the wait.
///
/// Cancelling `token` stops the discovery sources and keeps idle workers from
/// dequeuing again. Paths still queued are abandoned; they have no output and
/// are found by the next startup sweep.
pub struct ShutdownCoordinator {
    token: CancellationToken,
    queue: Arc<TaskQueue>,
    registry: Arc<JobRegistry>,
    grace: Duration,
}

impl ShutdownCoordinator {
    pub fn new(
        token: CancellationToken,
        queue: Arc<TaskQueue>,
        registry: Arc<JobRegistry>,
        grace: Duration,
    ) -> Self {
        Self {
            token,
            queue,
            registry,
            grace,
        }
    }

    /// Token observed by sources and workers.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub async fn drain(&self, pool: &WorkerPool) -> DrainOutcome {
        self.queue.close();
        self.token.cancel();

        let abandoned = self.queue.len();
        info!(
            in_flight = self.registry.in_flight(),
            abandoned,
            grace_secs = self.grace.as_secs(),
            "Shutting down, waiting for running jobs"
        );

        let finished = tokio::time::timeout(self.grace, async {
            self.registry.wait_idle().await;
            pool.wait().await;
        })
        .await;

        match finished {
            Ok(()) => {
                info!("All jobs finished");
                DrainOutcome::Clean
            }
            Err(_) => {
                let in_flight = self.registry.in_flight();
                warn!(
                    in_flight,
                    grace_secs = self.grace.as_secs(),
                    "Grace period elapsed with jobs still running, exiting anyway"
                );
                DrainOutcome::TimedOut { in_flight }
            }
        }
    }
}

/// Resolve on the first SIGINT or SIGTERM, naming the signal.
#[cfg(unix)]
pub async fn termination_signal() -> Result<&'static str> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate()).map_err(DaemonError::Signal)?;
    let mut interrupt = signal(SignalKind::interrupt()).map_err(DaemonError::Signal)?;
    tokio::select! {
        _ = terminate.recv() => Ok("SIGTERM"),
        _ = interrupt.recv() => Ok("SIGINT"),
    }
}

#[cfg(not(unix))]
pub async fn termination_signal() -> Result<&'static str> {
    tokio::signal::ctrl_c().await.map_err(DaemonError::Signal)?;
    Ok("Ctrl-C")
}
