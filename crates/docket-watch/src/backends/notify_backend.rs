//! Notify-based live watch of the input tree.
//!
//! The debouncer invokes its callback on its own thread. The callback turns
//! each debounced event into a [`WatchSignal`] and pushes it through a
//! bounded channel into the async runtime. When that channel is full the
//! event is dropped and a single [`WatchSignal::Overflow`] is reported
//! instead, the same as when the kernel queue itself overflows.

use crate::error::{Result, WatchError};

use notify::event::{AccessKind, AccessMode, ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode};
use notify_debouncer_full::{new_debouncer, DebounceEventResult, Debouncer, RecommendedCache};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, error, info, warn};

/// Capacity of the channel bridging the notify thread to the runtime.
pub const BRIDGE_CAPACITY: usize = 4096;

/// What the live watch reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchSignal {
    /// Paths that were created or renamed into place. May name directories.
    Paths(Vec<PathBuf>),
    /// Notifications were lost; only a full sweep can recover them.
    Overflow,
    /// The watch root itself went away.
    RootRemoved,
}

/// Receiving end of a live watch.
pub struct WatchEvents {
    rx: mpsc::Receiver<WatchSignal>,
    lost: Arc<AtomicBool>,
}

impl WatchEvents {
    /// Next signal, or `None` once the watcher is gone.
    ///
    /// A bridge overflow is reported before the next queued signal.
    pub async fn recv(&mut self) -> Option<WatchSignal> {
        if self.lost.swap(false, Ordering::AcqRel) {
            return Some(WatchSignal::Overflow);
        }
        self.rx.recv().await
    }

    #[cfg(test)]
    pub(crate) fn from_channel(rx: mpsc::Receiver<WatchSignal>) -> Self {
        Self {
            rx,
            lost: Arc::new(AtomicBool::new(false)),
        }
    }
}

/// Recursive, debounced notify subscription on one root.
///
/// Dropping the watcher ends the subscription and closes its [`WatchEvents`].
pub struct NotifyWatcher {
    /// Keeps the OS watch alive
    debouncer: Debouncer<RecommendedWatcher, RecommendedCache>,
    root: PathBuf,
}

impl NotifyWatcher {
    /// Subscribe to changes under `root`.
    pub fn start(root: &Path, debounce: Duration) -> Result<(Self, WatchEvents)> {
        if !root.is_dir() {
            return Err(WatchError::InvalidRoot(root.to_path_buf()));
        }

        let (tx, rx) = mpsc::channel(BRIDGE_CAPACITY);
        let lost = Arc::new(AtomicBool::new(false));

        let callback_lost = Arc::clone(&lost);
        let callback_root = root.to_path_buf();
        let mut debouncer = new_debouncer(debounce, None, move |result: DebounceEventResult| {
            let signals: Vec<WatchSignal> = match result {
                Ok(events) => events
                    .iter()
                    .filter_map(|event| Self::classify(&event.event, &callback_root))
                    .collect(),
                Err(errors) => {
                    for error in errors {
                        error!("Notify error: {:?}", error);
                    }
                    // Whatever failed, events may be missing now
                    vec![WatchSignal::Overflow]
                }
            };

            for signal in signals {
                match tx.try_send(signal) {
                    Ok(()) => {}
                    Err(TrySendError::Full(_)) => {
                        if !callback_lost.swap(true, Ordering::AcqRel) {
                            warn!(
                                capacity = BRIDGE_CAPACITY,
                                "Watch channel full, coalescing into a full sweep"
                            );
                        }
                    }
                    Err(TrySendError::Closed(_)) => return,
                }
            }
        })
        .map_err(|e| WatchError::Watch(format!("Failed to create notify watcher: {}", e)))?;

        debouncer
            .watch(root, RecursiveMode::Recursive)
            .map_err(|e| WatchError::Watch(format!("Failed to watch {}: {}", root.display(), e)))?;

        info!(root = %root.display(), "Notify watcher initialized");

        Ok((
            Self {
                debouncer,
                root: root.to_path_buf(),
            },
            WatchEvents { rx, lost },
        ))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Stop watching. Equivalent to dropping the watcher, but logged.
    pub fn stop(mut self) {
        if let Err(e) = self.debouncer.unwatch(&self.root) {
            debug!(root = %self.root.display(), error = %e, "Unwatch failed");
        }
        info!(root = %self.root.display(), "Notify watcher stopped");
    }

    /// Map one notify event to the signal the daemon cares about.
    ///
    /// Only arrivals matter: creations, renames into place and closes after
    /// writing. Modifications and removals are ignored, except removal of
    /// the root itself.
    pub(crate) fn classify(event: &Event, root: &Path) -> Option<WatchSignal> {
        if event.need_rescan() {
            return Some(WatchSignal::Overflow);
        }

        match event.kind {
            EventKind::Create(_)
            | EventKind::Modify(ModifyKind::Name(RenameMode::To))
            | EventKind::Modify(ModifyKind::Name(RenameMode::Any))
            | EventKind::Access(AccessKind::Close(AccessMode::Write)) => {
                if event.paths.is_empty() {
                    None
                } else {
                    Some(WatchSignal::Paths(event.paths.clone()))
                }
            }
            // paths are [from, to]
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => event
                .paths
                .last()
                .map(|to| WatchSignal::Paths(vec![to.clone()])),
            EventKind::Remove(_) if event.paths.iter().any(|p| p == root) => {
                Some(WatchSignal::RootRemoved)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, DataChange, Flag, RemoveKind};
    use tempfile::TempDir;

    fn root() -> PathBuf {
        PathBuf::from("/srv/docket")
    }

    #[test]
    fn test_creation_is_reported() {
        let event = Event::new(EventKind::Create(CreateKind::File))
            .add_path(PathBuf::from("/srv/docket/qwerty/a.json"));

        assert_eq!(
            NotifyWatcher::classify(&event, &root()),
            Some(WatchSignal::Paths(vec![PathBuf::from("/srv/docket/qwerty/a.json")]))
        );
    }

    #[test]
    fn test_rename_reports_destination() {
        let event = Event::new(EventKind::Modify(ModifyKind::Name(RenameMode::Both)))
            .add_path(PathBuf::from("/srv/docket/qwerty/a.json.part"))
            .add_path(PathBuf::from("/srv/docket/qwerty/a.json"));

        assert_eq!(
            NotifyWatcher::classify(&event, &root()),
            Some(WatchSignal::Paths(vec![PathBuf::from("/srv/docket/qwerty/a.json")]))
        );
    }

    #[test]
    fn test_content_changes_are_ignored() {
        let event = Event::new(EventKind::Modify(ModifyKind::Data(DataChange::Content)))
            .add_path(PathBuf::from("/srv/docket/qwerty/a.json"));
        assert_eq!(NotifyWatcher::classify(&event, &root()), None);

        let event = Event::new(EventKind::Remove(RemoveKind::File))
            .add_path(PathBuf::from("/srv/docket/qwerty/a.json"));
        assert_eq!(NotifyWatcher::classify(&event, &root()), None);
    }

    #[test]
    fn test_rescan_flag_means_overflow() {
        let event = Event::new(EventKind::Other).set_flag(Flag::Rescan);
        assert_eq!(NotifyWatcher::classify(&event, &root()), Some(WatchSignal::Overflow));
    }

    #[test]
    fn test_root_removal_is_reported() {
        let event = Event::new(EventKind::Remove(RemoveKind::Folder)).add_path(root());
        assert_eq!(NotifyWatcher::classify(&event, &root()), Some(WatchSignal::RootRemoved));
    }

    #[test]
    fn test_missing_root_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let result = NotifyWatcher::start(&temp_dir.path().join("gone"), Duration::from_millis(50));
        assert!(matches!(result, Err(WatchError::InvalidRoot(_))));
    }

    #[tokio::test]
    async fn test_bridge_overflow_is_reported_first() {
        let (tx, rx) = mpsc::channel(1);
        let lost = Arc::new(AtomicBool::new(true));
        tx.try_send(WatchSignal::Paths(vec![root()])).unwrap();

        let mut events = WatchEvents { rx, lost };
        assert_eq!(events.recv().await, Some(WatchSignal::Overflow));
        assert_eq!(events.recv().await, Some(WatchSignal::Paths(vec![root()])));
    }
}
