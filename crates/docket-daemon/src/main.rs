// Docket daemon
//
// Watches a directory tree for input files and runs one processing job per
// file that has no output yet:
// - startup sweep, live notifications and periodic re-sweeps
// - bounded worker pool with per-path claims
// - drain on SIGINT/SIGTERM with a grace period

use anyhow::{Context, Result};
use clap::Parser;
use docket_config::DocketConfig;
use docket_daemon::cli::{Cli, Commands};
use docket_daemon::{logging, termination_signal, Daemon, DaemonReport, DrainOutcome};
use std::process;
use tracing::{error, info};

/// Exit codes for different scenarios
mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const CONFIG_ERROR: i32 = 1;
    pub const RUNTIME_ERROR: i32 = 2;
    /// Grace period ran out with jobs still running
    pub const DRAIN_TIMEOUT: i32 = 3;
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match load_configuration(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("docketd: {e:#}");
            process::exit(exit_codes::CONFIG_ERROR);
        }
    };

    if let Some(Commands::CheckConfig) = cli.command {
        println!("# configuration is valid");
        print!("{}", config.to_toml_string());
        process::exit(exit_codes::SUCCESS);
    }

    if let Err(e) = logging::init(&config.logging, cli.level_override()) {
        eprintln!("docketd: {e}");
        process::exit(exit_codes::CONFIG_ERROR);
    }

    info!("Starting docketd v{}", env!("CARGO_PKG_VERSION"));

    match run(config, cli.once).await {
        Ok(report) => match report.outcome {
            DrainOutcome::Clean => process::exit(exit_codes::SUCCESS),
            DrainOutcome::TimedOut { .. } => process::exit(exit_codes::DRAIN_TIMEOUT),
        },
        Err(e) => {
            error!("Daemon failed: {e:#}");
            process::exit(exit_codes::RUNTIME_ERROR);
        }
    }
}

/// File values, then command-line overrides, then validation.
fn load_configuration(cli: &Cli) -> Result<DocketConfig> {
    let mut config =
        DocketConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    cli.apply_overrides(&mut config);
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

async fn run(config: DocketConfig, once: bool) -> Result<DaemonReport> {
    let daemon = Daemon::new(config)?;

    let shutdown = async {
        match termination_signal().await {
            Ok(signal) => info!(signal, "Termination requested, draining"),
            Err(e) => error!(error = %e, "Cannot listen for termination signals, shutting down"),
        }
    };

    let report = if once {
        daemon.run_once(shutdown).await?
    } else {
        daemon.run(shutdown).await?
    };
    Ok(report)
}
