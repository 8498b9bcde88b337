//! # Docket Input Discovery
//!
//! Finds input files that still need processing. Three independent sources
//! feed one [`CandidateSink`]:
//!
//! ```text
//! ┌─────────────────┐
//! │ startup sweep   │──┐
//! └─────────────────┘  │    ┌──────────────────┐
//! ┌─────────────────┐  ├───▶│  CandidateSink   │
//! │ EventWatcher    │──┤    │  (dedup, queue)  │
//! └─────────────────┘  │    └──────────────────┘
//! ┌─────────────────┐  │
//! │ PeriodicScanner │──┘
//! └─────────────────┘
//! ```
//!
//! The sources overlap on purpose and report the same path freely; the sink
//! is responsible for deduplication. Completion is decided by the output
//! artifact on disk ([`CompletionOracle`]), never by in-memory state.

#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod backends;
pub mod error;
mod event_watcher;
mod file_scanner;
mod filter;
mod oracle;
mod periodic;
pub mod traits;

pub use backends::{NotifyWatcher, WatchEvents, WatchSignal};
pub use error::{Result, WatchError};
pub use event_watcher::{EventWatcher, DEFAULT_RESUBSCRIBE_DELAY};
pub use file_scanner::{DispatchSummary, FileScanner, ScanResult, ScanStatistics};
pub use filter::InputFilter;
pub use oracle::CompletionOracle;
pub use periodic::PeriodicScanner;
pub use traits::{Acceptance, CandidateSink, DiscoverySource};
