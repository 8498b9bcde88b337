//! Wiring: discovery sources, dispatcher, worker pool and shutdown.
//!
//! ```text
//! startup sweep ─┐
//! EventWatcher ──┼─▶ Dispatcher ─▶ TaskQueue ─▶ WorkerPool ─▶ JobProcessor
//! Periodic ──────┘        │                         │
//!                         └──────── JobRegistry ◀───┘
//! ```

use std::future::Future;
use std::sync::Arc;

use docket_config::DocketConfig;
use docket_watch::{
    CandidateSink, CompletionOracle, DiscoverySource, EventWatcher, FileScanner, InputFilter,
    PeriodicScanner,
};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{info, warn};

use crate::dispatcher::Dispatcher;
use crate::error::Result;
use crate::processors::{self, JobProcessor};
use crate::queue::TaskQueue;
use crate::registry::JobRegistry;
use crate::shutdown::{DrainOutcome, ShutdownCoordinator};
use crate::worker::{PoolStats, WorkerPool};

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DaemonReport {
    pub outcome: DrainOutcome,
    pub stats: PoolStats,
}

pub struct Daemon {
    config: DocketConfig,
    processor: Arc<dyn JobProcessor>,
    registry: Arc<JobRegistry>,
    queue: Arc<TaskQueue>,
}

impl Daemon {
    /// Validate `config` and build its configured processor.
    pub fn new(config: DocketConfig) -> Result<Self> {
        let oracle = CompletionOracle::new(&config.watch.output_extension);
        let processor = processors::from_config(&config.processor, oracle);
        Self::with_processor(config, processor)
    }

    /// Same as [`new`](Self::new) with a caller-supplied processor.
    pub fn with_processor(config: DocketConfig, processor: Arc<dyn JobProcessor>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            processor,
            registry: Arc::new(JobRegistry::new()),
            queue: Arc::new(TaskQueue::new()),
        })
    }

    pub fn registry(&self) -> Arc<JobRegistry> {
        Arc::clone(&self.registry)
    }

    fn oracle(&self) -> CompletionOracle {
        CompletionOracle::new(&self.config.watch.output_extension)
    }

    fn scanner(&self) -> FileScanner {
        let watch = &self.config.watch;
        FileScanner::new(
            &watch.root,
            InputFilter::new(&watch.target_dir, &watch.input_extension),
            self.oracle(),
        )
    }

    fn log_startup(&self, once: bool) {
        let watch = &self.config.watch;
        info!(
            root = %watch.root.display(),
            target_dir = %watch.target_dir,
            input_extension = %watch.input_extension,
            output_extension = %watch.output_extension,
            workers = self.config.workers.count,
            scan_interval_secs = watch.scan_interval_secs,
            processor = self.processor.name(),
            once,
            "Daemon started"
        );
        if !watch.root.is_dir() {
            warn!(root = %watch.root.display(), "Watch root does not exist yet");
        }
    }

    /// Run until `shutdown` resolves, then drain.
    ///
    /// The startup sweep completes before live events and periodic sweeps
    /// begin. Workers start first so queued work begins immediately.
    pub async fn run<F>(self, shutdown: F) -> Result<DaemonReport>
    where
        F: Future<Output = ()>,
    {
        self.log_startup(false);
        let token = CancellationToken::new();
        let (pool, coordinator, sink) = self.assemble(token.clone());
        pool.start();

        let scanner = self.scanner();
        tokio::pin!(shutdown);
        let interrupted = tokio::select! {
            _ = &mut shutdown => true,
            result = scanner.scan_into(&sink, DiscoverySource::Startup) => {
                if let Err(e) = result {
                    warn!(error = %e, "Startup sweep failed, relying on later sweeps");
                }
                false
            }
        };

        let sources = TaskTracker::new();
        if !interrupted {
            let rescan = Arc::new(Notify::new());
            let watch = &self.config.watch;
            let watcher = EventWatcher::new(scanner.clone(), watch.debounce(), Arc::clone(&rescan));
            let periodic = PeriodicScanner::new(scanner, watch.scan_interval(), rescan);
            sources.spawn(watcher.run(Arc::clone(&sink), token.clone()));
            sources.spawn(periodic.run(Arc::clone(&sink), token.clone()));
            shutdown.await;
        }
        sources.close();

        let outcome = coordinator.drain(&pool).await;
        if tokio::time::timeout(std::time::Duration::from_secs(5), sources.wait())
            .await
            .is_err()
        {
            warn!("Discovery sources did not stop within timeout");
        }

        Ok(self.finish(outcome, &pool))
    }

    /// Sweep once, process everything found, and return.
    ///
    /// `shutdown` still cuts the run short with the normal drain.
    pub async fn run_once<F>(self, shutdown: F) -> Result<DaemonReport>
    where
        F: Future<Output = ()>,
    {
        self.log_startup(true);
        let token = CancellationToken::new();
        let (pool, coordinator, sink) = self.assemble(token);
        pool.start();

        let scanner = self.scanner();
        tokio::pin!(shutdown);
        let interrupted = tokio::select! {
            _ = &mut shutdown => true,
            result = scanner.scan_into(&sink, DiscoverySource::Startup) => {
                if let Err(e) = result {
                    warn!(error = %e, "Sweep failed");
                }
                false
            }
        };

        let outcome = if interrupted {
            coordinator.drain(&pool).await
        } else {
            // Closed queue: workers exit once it is empty
            self.queue.close();
            tokio::select! {
                _ = pool.wait() => DrainOutcome::Clean,
                _ = &mut shutdown => coordinator.drain(&pool).await,
            }
        };

        Ok(self.finish(outcome, &pool))
    }

    fn assemble(
        &self,
        token: CancellationToken,
    ) -> (WorkerPool, ShutdownCoordinator, Arc<dyn CandidateSink>) {
        let sink: Arc<dyn CandidateSink> = Arc::new(Dispatcher::new(
            self.oracle(),
            Arc::clone(&self.registry),
            Arc::clone(&self.queue),
        ));
        let pool = WorkerPool::new(
            self.config.workers.count,
            Arc::clone(&self.queue),
            Arc::clone(&self.registry),
            self.oracle(),
            Arc::clone(&self.processor),
            token.clone(),
        );
        let coordinator = ShutdownCoordinator::new(
            token,
            Arc::clone(&self.queue),
            Arc::clone(&self.registry),
            self.config.workers.shutdown_grace(),
        );
        (pool, coordinator, sink)
    }

    fn finish(&self, outcome: DrainOutcome, pool: &WorkerPool) -> DaemonReport {
        let stats = pool.stats();
        info!(
            ?outcome,
            succeeded = stats.succeeded,
            failed = stats.failed,
            skipped = stats.skipped,
            "Daemon stopped"
        );
        DaemonReport { outcome, stats }
    }
}
