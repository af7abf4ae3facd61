#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

//! # clanwatch-roster
//!
//! Snapshot fetcher for the remote roster API.
//!
//! The fetcher has no side effects beyond the network call. Every failure is
//! classified as either [`FetchErrorKind::Transient`] (retried on the next
//! scheduled tick and counted towards outage detection) or
//! [`FetchErrorKind::Fatal`] (reported to the operator, never counted).
//!
//! ## Example
//!
//! ```ignore
//! use clanwatch_roster::{RosterClient, RosterConfig, RosterSource};
//!
//! let client = RosterClient::with_config(RosterConfig::new("#2PP", "token"))?;
//! let snapshot = client.fetch(&"#2PP".parse()?).await?;
//! println!("{} members", snapshot.len());
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod types;

pub use client::{RosterClient, RosterSource};
pub use config::RosterConfig;
pub use error::{FetchError, FetchErrorKind, FetchResult};
pub use types::{GroupSummary, MemberList, WireMember};
