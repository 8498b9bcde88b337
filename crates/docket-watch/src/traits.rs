//! Seam between discovery sources and the component that queues work.

use std::fmt;
use std::path::PathBuf;

/// Which discovery mechanism noticed a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiscoverySource {
    /// One-shot sweep before anything else runs.
    Startup,
    /// Live filesystem notification.
    Event,
    /// Interval re-sweep.
    Periodic,
}

impl DiscoverySource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Startup => "startup",
            Self::Event => "event",
            Self::Periodic => "periodic",
        }
    }
}

impl fmt::Display for DiscoverySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the sink did with a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Acceptance {
    /// New work, pushed onto the queue.
    Queued,
    /// Output artifact already exists.
    AlreadyComplete,
    /// Already queued or running.
    Duplicate,
    /// Shutdown in progress; nothing new is accepted.
    Closed,
}

impl Acceptance {
    pub fn is_queued(&self) -> bool {
        matches!(self, Self::Queued)
    }
}

/// Receives candidates from every discovery source.
///
/// Implementations must be safe to call concurrently and must tolerate the
/// same path arriving repeatedly, from one source or several.
pub trait CandidateSink: Send + Sync {
    /// Offer one input path.
    fn accept(&self, path: PathBuf, source: DiscoverySource) -> Acceptance;
}
