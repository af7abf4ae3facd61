//! CLI command definitions using clap.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::Overrides;

/// clanwatch - clan roster watcher
#[derive(Parser, Debug)]
#[command(name = "clanwatch")]
#[command(version)]
#[command(about = "Watches a clan roster and keeps a ledger of members and contributions")]
#[command(
    long_about = "clanwatch periodically snapshots a group's roster, records joins, exits and contribution changes in a persistent ledger, and alerts the operator about promotion candidates and roster service outages."
)]
pub struct Cli {
    /// Path to a TOML configuration file
    #[arg(short, long, global = true, env = "CLANWATCH_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true, default_value_t = false)]
    pub verbose: bool,

    /// Group tag to watch (overrides config and environment)
    #[arg(short, long, global = true)]
    pub group: Option<String>,

    /// Ledger database URL, e.g. mem:// or rocksdb://data/ledger
    #[arg(long, global = true)]
    pub db_url: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Settings from the command line that override the loaded config.
    #[must_use]
    pub fn overrides(&self) -> Overrides {
        let interval_secs = match self.command {
            Commands::Run { interval_secs } => interval_secs,
            _ => None,
        };

        Overrides {
            group_tag: self.group.clone(),
            db_url: self.db_url.clone(),
            interval_secs,
        }
    }
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Reconcile now and then on every interval until interrupted
    Run {
        /// Seconds between cycles
        #[arg(short, long)]
        interval_secs: Option<u64>,
    },

    /// Run a single reconciliation cycle and print what changed
    Once {
        /// Print the result as JSON
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// List members recorded in the ledger
    Members {
        /// Only members currently in the group
        #[arg(long, default_value_t = false, conflicts_with = "exited")]
        active: bool,

        /// Only members who have left
        #[arg(long, default_value_t = false)]
        exited: bool,

        /// Print as JSON
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Show the group summary from the roster service
    Group {
        /// Print as JSON
        #[arg(long, default_value_t = false)]
        json: bool,
    },
}
