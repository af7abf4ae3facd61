//! # clanwatch-core
//!
//! Data contracts shared between the roster fetcher, the ledger store and the
//! reconciler:
//!
//! - [`Tag`] and [`Role`]: member identity and rank
//! - [`MemberSnapshotEntry`]: one member as seen in a single roster fetch
//! - [`MemberLedgerRecord`]: the persistent per-tag record
//! - [`ContributionDeltaEvent`] and [`PromotionAlert`]: what a reconciliation
//!   cycle reports

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod error;
pub mod events;
pub mod member;

pub use error::{Error, Result};
pub use events::{ContributionDeltaEvent, DeltaDirection, PromotionAlert};
pub use member::{MemberLedgerRecord, MemberSnapshotEntry, Role, Tag};
