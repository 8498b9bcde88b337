//! Filesystem notification backends.

pub mod notify_backend;

pub use notify_backend::{NotifyWatcher, WatchEvents, WatchSignal, BRIDGE_CAPACITY};
