#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

//! # clanwatch
//!
//! Watches a clan roster and keeps a persistent ledger of its members.
//!
//! The binary wires the workspace crates together:
//!
//! - [`clanwatch_roster`] fetches roster snapshots
//! - [`clanwatch_ledger`] stores member records and contribution history
//! - [`clanwatch_reconciler`] reconciles snapshots, tracks outages and
//!   schedules cycles
//!
//! This crate adds the CLI, configuration loading and signal handling.

pub use clanwatch_core;
pub use clanwatch_ledger;
pub use clanwatch_reconciler;
pub use clanwatch_roster;

pub mod cli;
pub mod commands;
pub mod config;
pub mod shutdown;
