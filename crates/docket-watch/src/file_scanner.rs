//! Directory sweeps for input discovery.
//!
//! A sweep walks the whole tree under the watch root and collects every
//! eligible input that has no output artifact yet. The startup scan and the
//! periodic re-scan are both sweeps; they differ only in when they run.
//!
//! ```text
//! ┌─────────────────┐    ┌──────────────────┐    ┌─────────────────┐
//! │   FileScanner   │───▶│   InputFilter    │───▶│ CompletionOracle│
//! │   (walkdir)     │    │ (dir + ext)      │    │ (output exists) │
//! └─────────────────┘    └──────────────────┘    └─────────────────┘
//!         │
//!         ▼
//! ┌─────────────────┐
//! │  CandidateSink  │
//! └─────────────────┘
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::Result;
use crate::filter::InputFilter;
use crate::oracle::CompletionOracle;
use crate::traits::{Acceptance, CandidateSink, DiscoverySource};

/// Counters collected while walking the tree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanStatistics {
    /// Regular files seen
    pub files_visited: usize,
    /// Files passing the eligibility filter
    pub eligible: usize,
    /// Eligible files that already have an output
    pub already_complete: usize,
    /// Entries that could not be read
    pub errors: usize,
}

/// Result of a sweep: the candidates plus how they were found.
#[derive(Debug, Clone, Default)]
pub struct ScanResult {
    pub candidates: Vec<PathBuf>,
    pub statistics: ScanStatistics,
    pub duration: Duration,
}

/// Tally of what the sink did with a sweep's candidates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    pub queued: usize,
    pub already_complete: usize,
    pub duplicate: usize,
    pub closed: usize,
}

impl DispatchSummary {
    pub fn record(&mut self, acceptance: Acceptance) {
        match acceptance {
            Acceptance::Queued => self.queued += 1,
            Acceptance::AlreadyComplete => self.already_complete += 1,
            Acceptance::Duplicate => self.duplicate += 1,
            Acceptance::Closed => self.closed += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.queued + self.already_complete + self.duplicate + self.closed
    }
}

/// Recursive sweeper for one root directory.
///
/// Cheap to clone; clones share nothing mutable.
#[derive(Debug, Clone)]
pub struct FileScanner {
    root: PathBuf,
    filter: InputFilter,
    oracle: CompletionOracle,
}

impl FileScanner {
    pub fn new(root: impl Into<PathBuf>, filter: InputFilter, oracle: CompletionOracle) -> Self {
        Self {
            root: root.into(),
            filter,
            oracle,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn filter(&self) -> &InputFilter {
        &self.filter
    }

    pub fn oracle(&self) -> &CompletionOracle {
        &self.oracle
    }

    /// Same filter and oracle, rooted somewhere else (e.g. a newly created
    /// subdirectory).
    pub fn with_root(&self, root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            filter: self.filter.clone(),
            oracle: self.oracle.clone(),
        }
    }

    /// Walk the tree and collect unprocessed inputs. Blocking.
    ///
    /// Unreadable entries are logged and counted, never fatal; a missing root
    /// simply yields no candidates.
    pub fn sweep(&self) -> ScanResult {
        let start = Instant::now();
        let mut result = ScanResult::default();

        for entry in WalkDir::new(&self.root).follow_links(false) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    result.statistics.errors += 1;
                    warn!(
                        path = %e.path().unwrap_or(self.root.as_path()).display(),
                        error = %e,
                        "Skipping unreadable entry during sweep"
                    );
                    continue;
                }
            };

            if !entry.file_type().is_file() {
                continue;
            }
            result.statistics.files_visited += 1;

            let path = entry.path();
            if !self.filter.matches(path) {
                continue;
            }
            result.statistics.eligible += 1;

            if self.oracle.is_complete(path) {
                result.statistics.already_complete += 1;
                continue;
            }
            result.candidates.push(entry.into_path());
        }

        result.duration = start.elapsed();
        result
    }

    /// Sweep on the blocking pool.
    pub async fn sweep_async(&self) -> Result<ScanResult> {
        let scanner = self.clone();
        Ok(tokio::task::spawn_blocking(move || scanner.sweep()).await?)
    }

    /// Sweep, then offer every candidate to `sink` in discovery order.
    pub async fn scan_into(
        &self,
        sink: &Arc<dyn CandidateSink>,
        source: DiscoverySource,
    ) -> Result<DispatchSummary> {
        let result = self.sweep_async().await?;
        let mut summary = DispatchSummary::default();
        for path in result.candidates {
            summary.record(sink.accept(path, source));
        }

        if summary.queued > 0 {
            info!(
                source = %source,
                root = %self.root.display(),
                queued = summary.queued,
                duplicate = summary.duplicate,
                elapsed_ms = result.duration.as_millis() as u64,
                "[{}] Found {} unprocessed files",
                source,
                summary.queued
            );
        } else if source == DiscoverySource::Event {
            debug!(root = %self.root.display(), "No unprocessed files in new directory");
        } else {
            info!(
                source = %source,
                root = %self.root.display(),
                duplicate = summary.duplicate,
                "[{}] No unprocessed files",
                source
            );
        }
        debug!(source = %source, stats = ?result.statistics, "Sweep statistics");

        Ok(summary)
    }
}
