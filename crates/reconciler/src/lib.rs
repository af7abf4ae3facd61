//! Roster reconciliation for clanwatch.
//!
//! Each cycle fetches the group roster, reconciles it against the ledger and
//! reports what changed:
//!
//! - **Upsert**: every member in the snapshot is created or refreshed
//! - **Contribution deltas**: counters that differ from the stored value are
//!   updated; increases are kept as history
//! - **Absence sweep**: active members missing from a non-empty snapshot exit
//! - **Promotion latch**: a regular member at or above the threshold is
//!   reported once, ever
//!
//! Separately, [`OutageMonitor`] turns runs of transient fetch failures into
//! one "degraded" and one "recovered" notification.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use clanwatch_ledger::InMemoryLedger;
//! use clanwatch_reconciler::{
//!     LogNotifier, LoopConfig, Reconciler, ReconcilerConfig, ReconciliationLoop,
//! };
//! use clanwatch_roster::{RosterClient, RosterConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let client = RosterClient::with_config(RosterConfig::new("#2PP", token))?;
//!     let reconciler = Arc::new(Reconciler::new(
//!         InMemoryLedger::new_arc(),
//!         ReconcilerConfig::default(),
//!     ));
//!
//!     let reconciliation = ReconciliationLoop::new(
//!         Arc::new(client),
//!         "#2PP".parse()?,
//!         reconciler,
//!         Arc::new(LogNotifier),
//!         LoopConfig::default(),
//!     );
//!
//!     // Run until stopped
//!     // reconciliation.run().await;
//! }
//! ```

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod alert;
pub mod error;
pub mod r#loop;
pub mod notify;
pub mod reconciler;
pub mod types;

// Re-export main types
pub use alert::{Alert, OutageMonitor, OutageSignal, OutageState};
pub use error::{Error, NotifyError, Result};
pub use r#loop::{LoopConfig, LoopStopper, ReconciliationLoop};
pub use notify::{InMemoryNotifier, LogNotifier, Notifier, WebhookNotifier};
pub use reconciler::{Reconciler, ReconcilerConfig};
pub use types::{CycleReport, ReconciliationResult};
