//! Process-wide ownership of input paths.
//!
//! Every accepted path has exactly one entry until its job is released.
//! The entry starts `Pending` when the dispatcher queues the path and turns
//! `Running` when a worker claims it, so one lookup answers both "is this
//! already queued?" and "is someone working on it?".

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::Notify;
use tracing::debug;

/// State of a registry entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    /// Accepted and waiting in the queue
    Pending,
    /// Claimed by a worker, job executing
    Running,
}

#[derive(Debug, Default)]
pub struct JobRegistry {
    entries: DashMap<PathBuf, JobState>,
    running: AtomicUsize,
    idle: Notify,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `path` as queued. False if it is already pending or running.
    pub fn try_accept(&self, path: &Path) -> bool {
        match self.entries.entry(path.to_path_buf()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(JobState::Pending);
                true
            }
        }
    }

    /// Take exclusive ownership of `path` for one job.
    ///
    /// A pending entry is promoted to running; an absent one is inserted as
    /// running. Fails only while another worker holds the path.
    pub fn try_claim(&self, path: &Path) -> bool {
        match self.entries.entry(path.to_path_buf()) {
            Entry::Occupied(mut entry) => {
                if *entry.get() == JobState::Running {
                    return false;
                }
                entry.insert(JobState::Running);
            }
            Entry::Vacant(slot) => {
                slot.insert(JobState::Running);
            }
        }
        self.running.fetch_add(1, Ordering::AcqRel);
        true
    }

    /// Claim `path` and get a guard that releases it when dropped.
    pub fn claim(self: &Arc<Self>, path: &Path) -> Option<Claim> {
        if self.try_claim(path) {
            Some(Claim {
                registry: Arc::clone(self),
                path: path.to_path_buf(),
            })
        } else {
            None
        }
    }

    /// Drop the entry for `path`, whatever its state.
    pub fn release(&self, path: &Path) {
        match self.entries.remove(path) {
            Some((_, JobState::Running)) => {
                if self.running.fetch_sub(1, Ordering::AcqRel) == 1 {
                    self.idle.notify_waiters();
                }
            }
            Some((_, JobState::Pending)) => {}
            None => debug!(path = %path.display(), "Release of unregistered path"),
        }
    }

    /// Undo a [`try_accept`](Self::try_accept) whose enqueue did not happen.
    /// Running entries are left alone.
    pub fn withdraw(&self, path: &Path) {
        self.entries
            .remove_if(path, |_, state| *state == JobState::Pending);
    }

    pub fn state(&self, path: &Path) -> Option<JobState> {
        self.entries.get(path).map(|entry| *entry.value())
    }

    /// Number of jobs currently executing.
    pub fn in_flight(&self) -> usize {
        self.running.load(Ordering::Acquire)
    }

    /// Number of paths queued but not yet claimed.
    pub fn pending(&self) -> usize {
        self.entries
            .iter()
            .filter(|entry| *entry.value() == JobState::Pending)
            .count()
    }

    pub fn is_idle(&self) -> bool {
        self.in_flight() == 0
    }

    /// Resolve once no job is executing.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            tokio::pin!(notified);
            // Register before checking so a release in between is not missed
            notified.as_mut().enable();
            if self.is_idle() {
                return;
            }
            notified.await;
        }
    }
}

/// Ownership of one path by one worker. Releases on drop, including
/// during unwinding.
#[derive(Debug)]
pub struct Claim {
    registry: Arc<JobRegistry>,
    path: PathBuf,
}

impl Claim {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for Claim {
    fn drop(&mut self) {
        self.registry.release(&self.path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn path(name: &str) -> PathBuf {
        PathBuf::from("/srv/docket/qwerty").join(name)
    }

    #[test]
    fn test_accept_is_exclusive() {
        let registry = JobRegistry::new();
        assert!(registry.try_accept(&path("a.json")));
        assert!(!registry.try_accept(&path("a.json")));
        assert!(registry.try_accept(&path("b.json")));
        assert_eq!(registry.pending(), 2);
        assert_eq!(registry.in_flight(), 0);
    }

    #[test]
    fn test_claim_promotes_pending_entry() {
        let registry = JobRegistry::new();
        registry.try_accept(&path("a.json"));

        assert!(registry.try_claim(&path("a.json")));
        assert_eq!(registry.state(&path("a.json")), Some(JobState::Running));
        assert!(!registry.try_claim(&path("a.json")));
        // still owned, so acceptance must fail too
        assert!(!registry.try_accept(&path("a.json")));
        assert_eq!(registry.in_flight(), 1);
        assert_eq!(registry.pending(), 0);

        registry.release(&path("a.json"));
        assert!(registry.is_idle());
        assert_eq!(registry.state(&path("a.json")), None);
        assert!(registry.try_accept(&path("a.json")));
    }

    #[test]
    fn test_claim_without_accept() {
        let registry = JobRegistry::new();
        assert!(registry.try_claim(&path("a.json")));
        assert_eq!(registry.in_flight(), 1);
    }

    #[test]
    fn test_withdraw_only_removes_pending() {
        let registry = JobRegistry::new();
        registry.try_accept(&path("a.json"));
        registry.withdraw(&path("a.json"));
        assert_eq!(registry.state(&path("a.json")), None);

        registry.try_claim(&path("b.json"));
        registry.withdraw(&path("b.json"));
        assert_eq!(registry.state(&path("b.json")), Some(JobState::Running));
        assert_eq!(registry.in_flight(), 1);
    }

    #[test]
    fn test_claim_guard_releases_on_drop() {
        let registry = Arc::new(JobRegistry::new());
        {
            let claim = registry.claim(&path("a.json")).unwrap();
            assert_eq!(claim.path(), path("a.json"));
            assert!(registry.claim(&path("a.json")).is_none());
            assert_eq!(registry.in_flight(), 1);
        }
        assert!(registry.is_idle());
        assert!(registry.claim(&path("a.json")).is_some());
    }

    #[test]
    fn test_claim_guard_releases_on_panic() {
        let registry = Arc::new(JobRegistry::new());
        let inner = Arc::clone(&registry);
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(move || {
            let _claim = inner.claim(&path("a.json")).unwrap();
            panic!("job blew up");
        }));
        assert!(result.is_err());
        assert!(registry.is_idle());
        assert_eq!(registry.state(&path("a.json")), None);
    }

    #[test]
    fn test_concurrent_claims_have_one_winner() {
        let registry = Arc::new(JobRegistry::new());
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || registry.try_claim(&path("a.json")))
            })
            .collect();

        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(winners, 1);
        assert_eq!(registry.in_flight(), 1);
    }

    #[tokio::test]
    async fn test_wait_idle_resolves_after_last_release() {
        let registry = Arc::new(JobRegistry::new());
        registry.try_claim(&path("a.json"));
        registry.try_claim(&path("b.json"));

        let waiter = {
            let registry = Arc::clone(&registry);
            tokio::spawn(async move { registry.wait_idle().await })
        };

        registry.release(&path("a.json"));
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        registry.release(&path("b.json"));
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("wait_idle should resolve")
            .unwrap();
    }

    #[tokio::test]
    async fn test_wait_idle_returns_immediately_when_idle() {
        let registry = JobRegistry::new();
        registry.try_accept(&path("a.json"));
        tokio::time::timeout(Duration::from_millis(100), registry.wait_idle())
            .await
            .expect("pending entries do not count as running");
    }
}
