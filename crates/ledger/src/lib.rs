//! Membership ledger for clanwatch.
//!
//! The ledger holds one [`MemberLedgerRecord`](clanwatch_core::MemberLedgerRecord)
//! per tag ever seen, plus the history of contribution increases.
//!
//! # Architecture
//!
//! - [`LedgerStore`]: read access and the entry point for a write cycle
//! - [`LedgerCycle`]: the idempotent write operations of one reconciliation
//!   cycle; nothing is visible to readers until [`LedgerCycle::commit`]
//! - [`InMemoryLedger`]: process-local backend used by tests and dry runs
//! - [`SurrealLedger`]: SurrealDB backend; a cycle is committed as a single
//!   transaction
//!
//! # Example
//!
//! ```ignore
//! use clanwatch_ledger::{LedgerStore, StoreConfig, SurrealLedger};
//!
//! let ledger = SurrealLedger::connect(StoreConfig::in_memory()).await?;
//! ledger.initialize_schema().await?;
//!
//! let mut cycle = ledger.begin_cycle().await?;
//! let upsert = cycle.upsert_member(&entry, now).await?;
//! cycle.commit().await?;
//! ```

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod client;
pub mod error;
pub mod memory;
pub mod store;
pub mod surreal;

pub use client::{Credentials, StoreConfig, SurrealLedger};
pub use error::{LedgerError, LedgerResult};
pub use memory::InMemoryLedger;
pub use store::{
    ContributionEntry, LedgerCycle, LedgerStore, MemberFilter, MemberUpsert, RecordId, UpsertKind,
};
