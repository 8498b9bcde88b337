//! Interval re-sweeps as a backstop for missed notifications.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::file_scanner::FileScanner;
use crate::traits::{CandidateSink, DiscoverySource};

/// Repeats the startup sweep every `interval` for the life of the process.
///
/// The first sweep happens one interval after [`run`](Self::run) starts,
/// since the startup sweep has just covered the tree. A notification on
/// `rescan` triggers an immediate sweep and restarts the interval.
pub struct PeriodicScanner {
    scanner: FileScanner,
    interval: Duration,
    rescan: Arc<Notify>,
}

impl PeriodicScanner {
    pub fn new(scanner: FileScanner, interval: Duration, rescan: Arc<Notify>) -> Self {
        Self {
            scanner,
            interval,
            rescan,
        }
    }

    /// Sweep on schedule until `cancel` fires.
    pub async fn run(self, sink: Arc<dyn CandidateSink>, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
                _ = self.rescan.notified() => {
                    info!("Early sweep requested");
                    ticker.reset();
                }
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                result = self.scanner.scan_into(&sink, DiscoverySource::Periodic) => {
                    if let Err(e) = result {
                        warn!(error = %e, "Periodic sweep failed, retrying next interval");
                    }
                }
            }
        }

        debug!("Periodic scanner stopped");
    }
}
