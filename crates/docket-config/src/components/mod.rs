//! Configuration sections for the daemon
//!
//! One module per `[section]` of the config file.

pub mod logging;
pub mod processor;
pub mod watch;
pub mod workers;

pub use logging::*;
pub use processor::*;
pub use watch::*;
pub use workers::*;
