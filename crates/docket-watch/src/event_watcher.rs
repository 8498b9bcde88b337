//! Live discovery from filesystem notifications.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::backends::{NotifyWatcher, WatchEvents, WatchSignal};
use crate::file_scanner::FileScanner;
use crate::traits::{CandidateSink, DiscoverySource};

/// Wait before retrying a failed or lost subscription.
pub const DEFAULT_RESUBSCRIBE_DELAY: Duration = Duration::from_secs(30);

enum PumpEnd {
    Cancelled,
    Lost,
}

/// Feeds live arrivals under the watch root into a [`CandidateSink`].
///
/// Lost notifications are never fatal: overflow wakes the periodic scanner
/// through `rescan`, and a failed or lost subscription is retried after
/// `resubscribe_delay` while sweeps keep the daemon going.
pub struct EventWatcher {
    scanner: FileScanner,
    debounce: Duration,
    rescan: Arc<Notify>,
    resubscribe_delay: Duration,
}

impl EventWatcher {
    pub fn new(scanner: FileScanner, debounce: Duration, rescan: Arc<Notify>) -> Self {
        Self {
            scanner,
            debounce,
            rescan,
            resubscribe_delay: DEFAULT_RESUBSCRIBE_DELAY,
        }
    }

    pub fn with_resubscribe_delay(mut self, delay: Duration) -> Self {
        self.resubscribe_delay = delay;
        self
    }

    /// Watch until `cancel` fires.
    pub async fn run(self, sink: Arc<dyn CandidateSink>, cancel: CancellationToken) {
        let mut resubscribing = false;

        loop {
            match NotifyWatcher::start(self.scanner.root(), self.debounce) {
                Ok((watcher, mut events)) => {
                    if resubscribing {
                        // Anything that arrived while unsubscribed is only visible to a sweep
                        self.rescan.notify_one();
                    }
                    let end = self.pump(&mut events, &sink, &cancel).await;
                    watcher.stop();
                    if let PumpEnd::Cancelled = end {
                        break;
                    }
                    warn!(root = %self.scanner.root().display(), "Live watch lost, resubscribing");
                }
                Err(e) => {
                    warn!(
                        root = %self.scanner.root().display(),
                        error = %e,
                        retry_in_secs = self.resubscribe_delay.as_secs(),
                        "Cannot subscribe to filesystem notifications, relying on sweeps"
                    );
                }
            }
            resubscribing = true;

            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.resubscribe_delay) => {}
            }
        }

        debug!("Event watcher stopped");
    }

    async fn pump(
        &self,
        events: &mut WatchEvents,
        sink: &Arc<dyn CandidateSink>,
        cancel: &CancellationToken,
    ) -> PumpEnd {
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return PumpEnd::Cancelled,
                signal = events.recv() => match signal {
                    Some(WatchSignal::Paths(paths)) => {
                        for path in paths {
                            self.handle_path(path, sink).await;
                        }
                    }
                    Some(WatchSignal::Overflow) => {
                        warn!("Filesystem notifications overflowed, requesting an early sweep");
                        self.rescan.notify_one();
                    }
                    Some(WatchSignal::RootRemoved) | None => return PumpEnd::Lost,
                }
            }
        }
    }

    async fn handle_path(&self, path: PathBuf, sink: &Arc<dyn CandidateSink>) {
        let meta = match tokio::fs::metadata(&path).await {
            Ok(meta) => meta,
            // Gone again before we looked
            Err(_) => return,
        };

        if meta.is_dir() {
            // Files may have landed before the recursive watch covered this directory
            let scoped = self.scanner.with_root(&path);
            if let Err(e) = scoped.scan_into(sink, DiscoverySource::Event).await {
                warn!(path = %path.display(), error = %e, "Sweep of new directory failed");
            }
            return;
        }

        if !meta.is_file() || !self.scanner.filter().matches(&path) {
            return;
        }

        let acceptance = sink.accept(path.clone(), DiscoverySource::Event);
        if acceptance.is_queued() {
            info!(path = %path.display(), "Event: queued new input");
        } else {
            debug!(path = %path.display(), ?acceptance, "Event: input not queued");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::InputFilter;
    use crate::oracle::CompletionOracle;
    use crate::traits::Acceptance;
    use tempfile::TempDir;
    use tokio::sync::mpsc;

    struct NullSink;

    impl CandidateSink for NullSink {
        fn accept(&self, _path: PathBuf, _source: DiscoverySource) -> Acceptance {
            Acceptance::Queued
        }
    }

    fn watcher(root: &std::path::Path, rescan: Arc<Notify>) -> EventWatcher {
        let scanner = FileScanner::new(
            root,
            InputFilter::new("qwerty", "json"),
            CompletionOracle::new("docx"),
        );
        EventWatcher::new(scanner, Duration::from_millis(50), rescan)
    }

    #[tokio::test]
    async fn test_overflow_wakes_periodic_scanner() {
        let dir = TempDir::new().unwrap();
        let rescan = Arc::new(Notify::new());
        let watcher = watcher(dir.path(), Arc::clone(&rescan));

        let (tx, rx) = mpsc::channel(4);
        tx.send(WatchSignal::Overflow).await.unwrap();
        drop(tx);
        let mut events = WatchEvents::from_channel(rx);
        let sink: Arc<dyn CandidateSink> = Arc::new(NullSink);

        let end = watcher
            .pump(&mut events, &sink, &CancellationToken::new())
            .await;
        assert!(matches!(end, PumpEnd::Lost));

        tokio::time::timeout(Duration::from_secs(1), rescan.notified())
            .await
            .expect("overflow should request an early sweep");
    }

    #[tokio::test]
    async fn test_resubscribe_requests_early_sweep() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("later");
        let rescan = Arc::new(Notify::new());
        let cancel = CancellationToken::new();
        let watcher = watcher(&root, Arc::clone(&rescan))
            .with_resubscribe_delay(Duration::from_millis(100));
        let task = tokio::spawn(watcher.run(Arc::new(NullSink), cancel.clone()));

        // Still unsubscribed: nothing to recover yet
        tokio::time::sleep(Duration::from_millis(250)).await;
        assert!(
            tokio::time::timeout(Duration::from_millis(50), rescan.notified())
                .await
                .is_err()
        );

        std::fs::create_dir(&root).unwrap();
        tokio::time::timeout(Duration::from_secs(5), rescan.notified())
            .await
            .expect("first successful subscribe should request an early sweep");

        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .expect("event watcher should stop on cancel")
            .unwrap();
    }
}
