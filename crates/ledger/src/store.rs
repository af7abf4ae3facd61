//! Ledger store contract.
//!
//! Every write operation is idempotent: calling it again with the same input
//! in a later cycle leaves the ledger unchanged. Reads inside a cycle observe
//! the ledger as it was when the cycle began, never the cycle's own pending
//! writes.

use std::collections::BTreeSet;
use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use clanwatch_core::{ContributionDeltaEvent, MemberLedgerRecord, MemberSnapshotEntry, Tag};
use serde::{Deserialize, Serialize};

use crate::error::LedgerResult;

/// Handle to a ledger record, returned by [`LedgerCycle::upsert_member`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordId(Tag);

impl RecordId {
    #[must_use]
    pub const fn new(tag: Tag) -> Self {
        Self(tag)
    }

    #[must_use]
    pub const fn tag(&self) -> &Tag {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "member:{}", self.0)
    }
}

/// What an upsert did to the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertKind {
    /// First sighting of the tag; the record was created.
    Created,
    /// The tag was already active; name and last-seen were refreshed.
    Present,
    /// The tag had exited and is back; the record was reactivated.
    Rejoined,
}

impl UpsertKind {
    /// Whether this upsert moved the record into the active state.
    #[must_use]
    pub const fn is_activation(&self) -> bool {
        matches!(self, Self::Created | Self::Rejoined)
    }
}

/// Outcome of [`LedgerCycle::upsert_member`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberUpsert {
    pub id: RecordId,
    pub kind: UpsertKind,
    /// State of the promotion latch before this cycle.
    pub promotion_alert_sent: bool,
}

/// Which records [`LedgerStore::members`] returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MemberFilter {
    #[default]
    All,
    Active,
    Exited,
}

impl MemberFilter {
    #[must_use]
    pub const fn matches(&self, record: &MemberLedgerRecord) -> bool {
        match self {
            Self::All => true,
            Self::Active => !record.has_exited(),
            Self::Exited => record.has_exited(),
        }
    }
}

/// Stored timestamps use a fixed nine-digit fraction so that they sort as
/// text in the same order as in time.
pub(crate) mod timestamp {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn format(at: &DateTime<Utc>) -> String {
        at.to_rfc3339_opts(SecondsFormat::Nanos, true)
    }

    pub fn serialize<S: Serializer>(at: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format(at))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<DateTime<Utc>, D::Error> {
        DateTime::<Utc>::deserialize(deserializer)
    }
}

/// One persisted contribution increase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContributionEntry {
    pub tag: Tag,
    pub previous: u32,
    pub current: u32,
    pub delta: i64,
    #[serde(with = "timestamp")]
    pub recorded_at: DateTime<Utc>,
}

impl ContributionEntry {
    /// Build a history entry from a delta event.
    #[must_use]
    pub fn from_event(event: &ContributionDeltaEvent, recorded_at: DateTime<Utc>) -> Self {
        Self {
            tag: event.tag.clone(),
            previous: event.previous,
            current: event.current,
            delta: event.delta(),
            recorded_at,
        }
    }
}

/// Durable membership ledger.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Open the write scope of one reconciliation cycle.
    ///
    /// At most one cycle is open at a time; a second call waits until the
    /// first cycle is committed or dropped.
    async fn begin_cycle(&self) -> LedgerResult<Box<dyn LedgerCycle>>;

    /// Get one record by tag.
    async fn member(&self, tag: &Tag) -> LedgerResult<Option<MemberLedgerRecord>>;

    /// List records ordered by tag.
    async fn members(&self, filter: MemberFilter) -> LedgerResult<Vec<MemberLedgerRecord>>;

    /// Contribution increases recorded for a tag, oldest first.
    async fn contribution_history(&self, tag: &Tag) -> LedgerResult<Vec<ContributionEntry>>;
}

/// Write operations of one reconciliation cycle.
///
/// Writes are staged and become visible atomically on [`commit`](Self::commit).
/// Dropping a cycle without committing discards every staged write.
#[async_trait]
pub trait LedgerCycle: Send {
    /// Create the record for an unknown tag, or refresh a known one
    /// (`name`, `last_seen_at`, `active = true`, `exited_at` cleared).
    async fn upsert_member(
        &mut self,
        entry: &MemberSnapshotEntry,
        now: DateTime<Utc>,
    ) -> LedgerResult<MemberUpsert>;

    /// Contribution counter stored before this cycle began.
    ///
    /// Records created in this cycle are not visible and yield `NotFound`.
    async fn read_current_contribution(&mut self, id: &RecordId) -> LedgerResult<u32>;

    /// Store a changed contribution counter.
    async fn write_contribution(
        &mut self,
        id: &RecordId,
        previous: u32,
        current: u32,
        at: DateTime<Utc>,
    ) -> LedgerResult<()>;

    /// Append a contribution increase to the history.
    async fn append_contribution(&mut self, entry: &ContributionEntry) -> LedgerResult<()>;

    /// Set the one-shot promotion latch. Never cleared.
    async fn latch_promotion_alert(&mut self, id: &RecordId) -> LedgerResult<()>;

    /// Set `exited_at = now` on every active record whose tag is not in
    /// `present`. Returns the affected tags.
    async fn mark_exited_except(
        &mut self,
        present: &BTreeSet<Tag>,
        now: DateTime<Utc>,
    ) -> LedgerResult<Vec<Tag>>;

    /// Set `active = false` on every active record whose tag is not in
    /// `present`. Returns the affected tags.
    async fn mark_inactive_except(&mut self, present: &BTreeSet<Tag>) -> LedgerResult<Vec<Tag>>;

    /// Apply every staged write as one unit.
    async fn commit(self: Box<Self>) -> LedgerResult<()>;
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::indexing_slicing)]

    use super::*;
    use chrono::TimeZone;
    use clanwatch_core::Role;

    #[test]
    fn test_member_filter() {
        let entry = MemberSnapshotEntry::new(Tag::new("#A").unwrap(), "A", Role::Member, 0);
        let mut record = MemberLedgerRecord::first_sighting(&entry, Utc::now());

        assert!(MemberFilter::All.matches(&record));
        assert!(MemberFilter::Active.matches(&record));
        assert!(!MemberFilter::Exited.matches(&record));

        record.active = false;
        assert!(MemberFilter::Exited.matches(&record));
        assert!(!MemberFilter::Active.matches(&record));
    }

    #[test]
    fn test_upsert_kind_activation() {
        assert!(UpsertKind::Created.is_activation());
        assert!(UpsertKind::Rejoined.is_activation());
        assert!(!UpsertKind::Present.is_activation());
    }

    #[test]
    fn test_timestamps_sort_as_text() {
        let whole = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let later = whole + chrono::Duration::milliseconds(500);

        assert_eq!(timestamp::format(&whole), "2026-03-01T12:00:00.000000000Z");
        assert!(timestamp::format(&whole) < timestamp::format(&later));

        let event = ContributionDeltaEvent::between(Tag::new("#A").unwrap(), 1, 2).unwrap();
        let json = serde_json::to_value(ContributionEntry::from_event(&event, later)).unwrap();
        assert_eq!(json["recorded_at"], "2026-03-01T12:00:00.500000000Z");

        let back: ContributionEntry = serde_json::from_value(json).unwrap();
        assert_eq!(back.recorded_at, later);
    }

    #[test]
    fn test_contribution_entry_from_event() {
        let event = ContributionDeltaEvent::between(Tag::new("#A").unwrap(), 50, 1200).unwrap();
        let entry = ContributionEntry::from_event(&event, Utc::now());
        assert_eq!(entry.delta, 1150);
        assert_eq!(entry.current, 1200);
    }
}
