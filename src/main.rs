//! # clanwatch
//!
//! Entry point for the roster watcher.
//!
//! ## Startup
//!
//! 1. **Tracing** - `RUST_LOG` wins; otherwise `info`, or `debug` with `--verbose`
//! 2. **Configuration** - TOML file, then `CLANWATCH_*` variables, then flags
//! 3. **Command** - `run`, `once`, `members` or `group`
//!
//! ## Exit status
//!
//! `run` exits 0 after SIGINT/SIGTERM and 1 if the roster service rejects the
//! initial cycle. Every other startup error also exits 1.

#![forbid(unsafe_code)]
#![forbid(clippy::unwrap_used)]
#![forbid(clippy::panic)]
#![deny(clippy::expect_used)]

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::error;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use clanwatch::cli::Cli;
use clanwatch::commands::execute_command;
use clanwatch::config::AppConfig;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = AppConfig::load(cli.config.as_deref(), &cli.overrides())
        .context("Invalid configuration")?;

    execute_command(cli.command, config).await
}

/// Initialize tracing subscriber with environment filter.
fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with(tracing_subscriber::fmt::layer())
        .init();
}
