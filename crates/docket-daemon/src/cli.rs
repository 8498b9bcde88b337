use clap::{Parser, Subcommand, ValueEnum};
use docket_config::DocketConfig;
use std::path::PathBuf;
use tracing_subscriber::filter::LevelFilter;

/// Log level options for the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    /// No logging output
    Off,
    /// Error messages only
    Error,
    /// Warnings and errors
    Warn,
    /// Informational messages
    Info,
    /// Debug messages
    Debug,
    /// Trace-level messages (most verbose)
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Off => LevelFilter::OFF,
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Trace => LevelFilter::TRACE,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "docketd")]
#[command(about = "Watch a directory tree and process every arriving input file exactly once")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Config file path (defaults to ~/.config/docket/config.toml)
    #[arg(short = 'C', long, global = true)]
    pub config: Option<PathBuf>,

    /// Root of the watched tree (overrides config file)
    #[arg(long, global = true)]
    pub watch_root: Option<PathBuf>,

    /// Name of the directories holding inputs (overrides config file)
    #[arg(long, global = true)]
    pub target_dir: Option<String>,

    /// Number of concurrent jobs (overrides config file)
    #[arg(short = 'w', long, global = true)]
    pub workers: Option<usize>,

    /// Set log level; RUST_LOG takes precedence when set
    #[arg(short = 'l', long, global = true, value_enum)]
    pub log_level: Option<LogLevel>,

    /// Sweep once, process everything found, then exit
    #[arg(long)]
    pub once: bool,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Validate the configuration and print the effective settings
    CheckConfig,
}

impl Cli {
    /// Apply command-line overrides on top of file values.
    pub fn apply_overrides(&self, config: &mut DocketConfig) {
        if let Some(root) = &self.watch_root {
            config.watch.root = root.clone();
        }
        if let Some(target_dir) = &self.target_dir {
            config.watch.target_dir = target_dir.clone();
        }
        if let Some(workers) = self.workers {
            config.workers.count = workers;
        }
    }

    pub fn level_override(&self) -> Option<LevelFilter> {
        self.log_level.map(LevelFilter::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrides_replace_file_values() {
        let cli = Cli::parse_from([
            "docketd",
            "--watch-root",
            "/data/in",
            "--target-dir",
            "incoming",
            "-w",
            "3",
            "--once",
        ]);
        let mut config = DocketConfig::default();
        cli.apply_overrides(&mut config);

        assert_eq!(config.watch.root, PathBuf::from("/data/in"));
        assert_eq!(config.watch.target_dir, "incoming");
        assert_eq!(config.workers.count, 3);
        assert!(cli.once);
        assert_eq!(cli.command, None);
    }

    #[test]
    fn test_absent_flags_keep_file_values() {
        let cli = Cli::parse_from(["docketd"]);
        let mut config = DocketConfig::default();
        cli.apply_overrides(&mut config);
        assert_eq!(config, DocketConfig::default());
        assert_eq!(cli.level_override(), None);
    }

    #[test]
    fn test_check_config_subcommand() {
        let cli = Cli::parse_from(["docketd", "check-config", "-C", "/etc/docket.toml", "-l", "debug"]);
        assert_eq!(cli.command, Some(Commands::CheckConfig));
        assert_eq!(cli.config, Some(PathBuf::from("/etc/docket.toml")));
        assert_eq!(cli.level_override(), Some(LevelFilter::DEBUG));
    }

    #[test]
    fn test_cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
