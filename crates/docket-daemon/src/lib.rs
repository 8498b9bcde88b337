//! # Docket Daemon
//!
//! Schedules exactly one job per eligible input file. Discovery lives in
//! `docket-watch`; this crate owns what happens after a path is found:
//!
//! - [`Dispatcher`]: the sink all discovery sources report into
//! - [`JobRegistry`]: which paths are queued or running
//! - [`TaskQueue`] and [`WorkerPool`]: bounded concurrent execution
//! - [`ShutdownCoordinator`]: stop intake, drain, exit
//! - [`processors`]: the per-file work itself
//!
//! Completion is never recorded in memory. A job is done when its output
//! artifact exists, so a restart simply sweeps again.

#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod cli;
mod daemon;
mod dispatcher;
pub mod error;
pub mod logging;
pub mod processors;
mod queue;
mod registry;
mod shutdown;
mod worker;

pub use daemon::{Daemon, DaemonReport};
pub use dispatcher::Dispatcher;
pub use error::{DaemonError, ProcessError, Result};
pub use processors::JobProcessor;
pub use queue::TaskQueue;
pub use registry::{Claim, JobRegistry, JobState};
pub use shutdown::{termination_signal, DrainOutcome, ShutdownCoordinator};
pub use worker::{PoolStats, WorkerPool};
