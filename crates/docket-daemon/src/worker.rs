//! Bounded pool of job executors.
//!
//! ```text
//! Idle ─▶ Dequeuing ─▶ Claiming ─┬─▶ claim failed ──────────────────────▶ Idle
//!                                └─▶ Processing ─▶ Releasing ──────────▶ Idle
//! ```
//!
//! Each worker holds at most one claim. Cancellation is only observed while
//! dequeuing; a job that has started always runs to completion.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use docket_watch::CompletionOracle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info};

use crate::error::ProcessError;
use crate::processors::JobProcessor;
use crate::queue::TaskQueue;
use crate::registry::JobRegistry;

#[derive(Debug, Default)]
struct PoolCounters {
    succeeded: AtomicUsize,
    failed: AtomicUsize,
    skipped: AtomicUsize,
}

/// Job outcomes since the pool started.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub succeeded: usize,
    pub failed: usize,
    /// Dequeued paths that were claimed elsewhere or already complete
    pub skipped: usize,
}

pub struct WorkerPool {
    size: usize,
    queue: Arc<TaskQueue>,
    registry: Arc<JobRegistry>,
    oracle: CompletionOracle,
    processor: Arc<dyn JobProcessor>,
    cancel: CancellationToken,
    tracker: TaskTracker,
    counters: Arc<PoolCounters>,
}

impl WorkerPool {
    pub fn new(
        size: usize,
        queue: Arc<TaskQueue>,
        registry: Arc<JobRegistry>,
        oracle: CompletionOracle,
        processor: Arc<dyn JobProcessor>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            size,
            queue,
            registry,
            oracle,
            processor,
            cancel,
            tracker: TaskTracker::new(),
            counters: Arc::new(PoolCounters::default()),
        }
    }

    /// Spawn the workers. Call once.
    pub fn start(&self) {
        for id in 0..self.size {
            let worker = Worker {
                id,
                queue: Arc::clone(&self.queue),
                registry: Arc::clone(&self.registry),
                oracle: self.oracle.clone(),
                processor: Arc::clone(&self.processor),
                cancel: self.cancel.clone(),
                counters: Arc::clone(&self.counters),
            };
            self.tracker.spawn(worker.run());
        }
        self.tracker.close();
        info!(
            workers = self.size,
            processor = self.processor.name(),
            "Worker pool started"
        );
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Resolve once every worker has exited.
    pub async fn wait(&self) {
        self.tracker.wait().await;
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            succeeded: self.counters.succeeded.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
            skipped: self.counters.skipped.load(Ordering::Relaxed),
        }
    }
}

struct Worker {
    id: usize,
    queue: Arc<TaskQueue>,
    registry: Arc<JobRegistry>,
    oracle: CompletionOracle,
    processor: Arc<dyn JobProcessor>,
    cancel: CancellationToken,
    counters: Arc<PoolCounters>,
}

impl Worker {
    async fn run(self) {
        debug!(worker = self.id, "Worker started");
        while let Some(path) = self.queue.recv(&self.cancel).await {
            self.handle(path).await;
        }
        debug!(worker = self.id, "Worker stopped");
    }

    async fn handle(&self, path: PathBuf) {
        let Some(claim) = self.registry.claim(&path) else {
            debug!(worker = self.id, path = %path.display(), "Claimed by another worker, skipping");
            self.counters.skipped.fetch_add(1, Ordering::Relaxed);
            return;
        };

        // A sweep may have re-queued it just before the previous run finished
        if self.oracle.is_complete(&path) {
            debug!(worker = self.id, path = %path.display(), "Already complete, skipping");
            self.counters.skipped.fetch_add(1, Ordering::Relaxed);
            return;
        }

        let started = Instant::now();
        match self.execute(&path).await {
            Ok(()) => {
                self.counters.succeeded.fetch_add(1, Ordering::Relaxed);
                info!(
                    worker = self.id,
                    path = %path.display(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Job completed"
                );
            }
            Err(e) => {
                self.counters.failed.fetch_add(1, Ordering::Relaxed);
                error!(
                    worker = self.id,
                    path = %path.display(),
                    error = %e,
                    "Job failed, will retry on a later sweep"
                );
            }
        }

        drop(claim);
    }

    /// Run the job in its own task so a panic surfaces as an error here.
    async fn execute(&self, path: &Path) -> Result<(), ProcessError> {
        let processor = Arc::clone(&self.processor);
        let input = path.to_path_buf();
        match tokio::spawn(async move { processor.process(&input).await }).await {
            Ok(result) => result,
            Err(e) => Err(ProcessError::Panicked(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::Duration;
    use tempfile::TempDir;

    /// Records calls and writes the output, or fails for names containing "bad".
    #[derive(Default)]
    struct ScriptedProcessor {
        calls: Mutex<Vec<PathBuf>>,
    }

    #[async_trait]
    impl JobProcessor for ScriptedProcessor {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn process(&self, input: &Path) -> Result<(), ProcessError> {
            self.calls.lock().unwrap().push(input.to_path_buf());
            let name = input
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            if name.contains("panic") {
                panic!("processor exploded");
            }
            if name.contains("bad") {
                return Err(ProcessError::InvalidInput {
                    path: input.to_path_buf(),
                    message: "scripted failure".to_string(),
                });
            }
            std::fs::write(input.with_extension("docx"), "ok").unwrap();
            Ok(())
        }
    }

    fn pool(
        size: usize,
        processor: Arc<ScriptedProcessor>,
    ) -> (WorkerPool, Arc<TaskQueue>, Arc<JobRegistry>) {
        let queue = Arc::new(TaskQueue::new());
        let registry = Arc::new(JobRegistry::new());
        let pool = WorkerPool::new(
            size,
            Arc::clone(&queue),
            Arc::clone(&registry),
            CompletionOracle::new("docx"),
            processor,
            CancellationToken::new(),
        );
        (pool, queue, registry)
    }

    #[tokio::test]
    async fn test_failures_and_panics_do_not_stop_workers() {
        let dir = TempDir::new().unwrap();
        let processor = Arc::new(ScriptedProcessor::default());
        let (pool, queue, registry) = pool(1, Arc::clone(&processor));

        for name in ["bad.json", "panic.json", "good.json"] {
            let path = dir.path().join(name);
            registry.try_accept(&path);
            queue.push(path).unwrap();
        }
        queue.close();
        pool.start();

        tokio::time::timeout(Duration::from_secs(5), pool.wait())
            .await
            .expect("pool should drain a closed queue");

        assert_eq!(
            pool.stats(),
            PoolStats {
                succeeded: 1,
                failed: 2,
                skipped: 0
            }
        );
        assert_eq!(processor.calls.lock().unwrap().len(), 3);
        assert!(registry.is_idle());
        assert_eq!(registry.pending(), 0);
        assert!(dir.path().join("good.docx").exists());
        assert!(!dir.path().join("bad.docx").exists());
    }

    #[tokio::test]
    async fn test_completed_and_running_paths_are_skipped() {
        let dir = TempDir::new().unwrap();
        let processor = Arc::new(ScriptedProcessor::default());
        let (pool, queue, registry) = pool(2, Arc::clone(&processor));

        let done = dir.path().join("done.json");
        std::fs::write(dir.path().join("done.docx"), "ok").unwrap();
        let busy = dir.path().join("busy.json");
        registry.try_claim(&busy);

        queue.push(done).unwrap();
        queue.push(busy.clone()).unwrap();
        queue.close();
        pool.start();
        tokio::time::timeout(Duration::from_secs(5), pool.wait())
            .await
            .unwrap();

        assert_eq!(pool.stats().skipped, 2);
        assert!(processor.calls.lock().unwrap().is_empty());
        // the foreign claim is untouched
        assert_eq!(registry.in_flight(), 1);
        registry.release(&busy);
    }
}
