//! Unbounded FIFO of input paths between the dispatcher and the workers.

use std::path::PathBuf;
use std::sync::{PoisonError, RwLock};

use tokio_util::sync::CancellationToken;

/// Pushes never block; receives suspend until a path arrives.
///
/// Closing drops the only sender. Paths already queued stay receivable,
/// which lets a one-shot run drain the queue before its workers exit.
pub struct TaskQueue {
    tx: RwLock<Option<flume::Sender<PathBuf>>>,
    rx: flume::Receiver<PathBuf>,
}

impl TaskQueue {
    pub fn new() -> Self {
        let (tx, rx) = flume::unbounded();
        Self {
            tx: RwLock::new(Some(tx)),
            rx,
        }
    }

    /// Enqueue `path`, or hand it back if the queue is closed.
    pub fn push(&self, path: PathBuf) -> Result<(), PathBuf> {
        let guard = self.tx.read().unwrap_or_else(PoisonError::into_inner);
        match guard.as_ref() {
            Some(tx) => tx.send(path).map_err(|e| e.into_inner()),
            None => Err(path),
        }
    }

    /// Refuse further pushes. Idempotent.
    pub fn close(&self) {
        self.tx
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }

    pub fn is_closed(&self) -> bool {
        self.tx
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }

    /// Paths waiting to be dequeued.
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// Next path in FIFO order.
    ///
    /// `None` once `cancel` fires (even if paths remain) or once the queue
    /// is closed and empty.
    pub async fn recv(&self, cancel: &CancellationToken) -> Option<PathBuf> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            received = self.rx.recv_async() => received.ok(),
        }
    }
}

impl Default for TaskQueue {
    fn default() -> Self {
        Self::new()
    }
}
