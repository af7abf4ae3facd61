//! In-memory ledger backend.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use clanwatch_core::{MemberLedgerRecord, MemberSnapshotEntry, Tag};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::trace;

use crate::error::{LedgerError, LedgerResult};
use crate::store::{
    ContributionEntry, LedgerCycle, LedgerStore, MemberFilter, MemberUpsert, RecordId, UpsertKind,
};

#[derive(Debug, Clone, Default)]
struct LedgerState {
    members: BTreeMap<Tag, MemberLedgerRecord>,
    history: Vec<ContributionEntry>,
}

/// Process-local ledger.
///
/// Each cycle works on a private copy of the state that replaces the shared
/// state on commit. Reads through [`LedgerStore`] wait while a cycle is open.
#[derive(Debug, Clone, Default)]
pub struct InMemoryLedger {
    state: Arc<Mutex<LedgerState>>,
    faults: Faults,
}

/// Simulated failures for exercising error paths.
#[derive(Debug, Clone, Default)]
struct Faults {
    upserts: Arc<BTreeSet<Tag>>,
    reads: Arc<BTreeSet<Tag>>,
    writes: Arc<BTreeSet<Tag>>,
    next_sweep: Arc<AtomicBool>,
    next_commit: Arc<AtomicBool>,
}

impl InMemoryLedger {
    /// Create an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty ledger wrapped in an Arc.
    #[must_use]
    pub fn new_arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Make every upsert of the given tags fail.
    #[must_use]
    pub fn with_failing_upserts(mut self, tags: impl IntoIterator<Item = Tag>) -> Self {
        self.faults.upserts = Arc::new(tags.into_iter().collect());
        self
    }

    /// Make every stored-contribution read of the given tags fail.
    #[must_use]
    pub fn with_failing_reads(mut self, tags: impl IntoIterator<Item = Tag>) -> Self {
        self.faults.reads = Arc::new(tags.into_iter().collect());
        self
    }

    /// Make every contribution write of the given tags fail.
    #[must_use]
    pub fn with_failing_writes(mut self, tags: impl IntoIterator<Item = Tag>) -> Self {
        self.faults.writes = Arc::new(tags.into_iter().collect());
        self
    }

    /// Make the next absence sweep fail.
    pub fn fail_next_sweep(&self) {
        self.faults.next_sweep.store(true, Ordering::Release);
    }

    /// Make the next commit fail, discarding that cycle's writes.
    pub fn fail_next_commit(&self) {
        self.faults.next_commit.store(true, Ordering::Release);
    }

    /// Seed a record directly, bypassing the cycle machinery.
    pub async fn insert(&self, record: MemberLedgerRecord) {
        self.state
            .lock()
            .await
            .members
            .insert(record.tag.clone(), record);
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedger {
    async fn begin_cycle(&self) -> LedgerResult<Box<dyn LedgerCycle>> {
        let guard = Arc::clone(&self.state).lock_owned().await;
        let base = guard.clone();

        Ok(Box::new(InMemoryCycle {
            working: base.clone(),
            base,
            guard,
            faults: self.faults.clone(),
        }))
    }

    async fn member(&self, tag: &Tag) -> LedgerResult<Option<MemberLedgerRecord>> {
        Ok(self.state.lock().await.members.get(tag).cloned())
    }

    async fn members(&self, filter: MemberFilter) -> LedgerResult<Vec<MemberLedgerRecord>> {
        Ok(self
            .state
            .lock()
            .await
            .members
            .values()
            .filter(|record| filter.matches(record))
            .cloned()
            .collect())
    }

    async fn contribution_history(&self, tag: &Tag) -> LedgerResult<Vec<ContributionEntry>> {
        Ok(self
            .state
            .lock()
            .await
            .history
            .iter()
            .filter(|entry| &entry.tag == tag)
            .cloned()
            .collect())
    }
}

struct InMemoryCycle {
    guard: OwnedMutexGuard<LedgerState>,
    /// State when the cycle began; all reads go here.
    base: LedgerState,
    /// State with this cycle's writes applied.
    working: LedgerState,
    faults: Faults,
}

impl InMemoryCycle {
    fn record_mut(&mut self, id: &RecordId) -> LedgerResult<&mut MemberLedgerRecord> {
        self.working
            .members
            .get_mut(id.tag())
            .ok_or_else(|| LedgerError::missing_member(id.tag()))
    }

    fn sweep_candidates(&self, present: &BTreeSet<Tag>) -> Vec<Tag> {
        self.working
            .members
            .values()
            .filter(|record| record.active && !present.contains(&record.tag))
            .map(|record| record.tag.clone())
            .collect()
    }
}

#[async_trait]
impl LedgerCycle for InMemoryCycle {
    async fn upsert_member(
        &mut self,
        entry: &MemberSnapshotEntry,
        now: DateTime<Utc>,
    ) -> LedgerResult<MemberUpsert> {
        if self.faults.upserts.contains(&entry.tag) {
            return Err(LedgerError::query_failed(format!(
                "simulated upsert failure for {}",
                entry.tag
            )));
        }

        let id = RecordId::new(entry.tag.clone());

        let Some(record) = self.working.members.get_mut(&entry.tag) else {
            let record = MemberLedgerRecord::first_sighting(entry, now);
            self.working.members.insert(entry.tag.clone(), record);
            trace!(tag = %entry.tag, "Created member record");
            return Ok(MemberUpsert {
                id,
                kind: UpsertKind::Created,
                promotion_alert_sent: false,
            });
        };

        let kind = if record.active {
            UpsertKind::Present
        } else {
            UpsertKind::Rejoined
        };

        record.name.clone_from(&entry.name);
        record.last_seen_at = now;
        record.active = true;
        record.exited_at = None;

        Ok(MemberUpsert {
            id,
            kind,
            promotion_alert_sent: record.promotion_alert_sent,
        })
    }

    async fn read_current_contribution(&mut self, id: &RecordId) -> LedgerResult<u32> {
        if self.faults.reads.contains(id.tag()) {
            return Err(LedgerError::query_failed(format!(
                "simulated read failure for {id}"
            )));
        }

        self.base
            .members
            .get(id.tag())
            .map(|record| record.current_contribution)
            .ok_or_else(|| LedgerError::missing_member(id.tag()))
    }

    async fn write_contribution(
        &mut self,
        id: &RecordId,
        previous: u32,
        current: u32,
        at: DateTime<Utc>,
    ) -> LedgerResult<()> {
        if self.faults.writes.contains(id.tag()) {
            return Err(LedgerError::query_failed(format!(
                "simulated contribution write failure for {id}"
            )));
        }

        let record = self.record_mut(id)?;
        record.previous_contribution = previous;
        record.current_contribution = current;
        record.last_contribution_change_at = Some(at);
        Ok(())
    }

    async fn append_contribution(&mut self, entry: &ContributionEntry) -> LedgerResult<()> {
        self.working.history.push(entry.clone());
        Ok(())
    }

    async fn latch_promotion_alert(&mut self, id: &RecordId) -> LedgerResult<()> {
        self.record_mut(id)?.promotion_alert_sent = true;
        Ok(())
    }

    async fn mark_exited_except(
        &mut self,
        present: &BTreeSet<Tag>,
        now: DateTime<Utc>,
    ) -> LedgerResult<Vec<Tag>> {
        if self.faults.next_sweep.swap(false, Ordering::AcqRel) {
            return Err(LedgerError::query_failed("simulated sweep failure"));
        }

        let tags = self.sweep_candidates(present);
        for tag in &tags {
            if let Some(record) = self.working.members.get_mut(tag) {
                record.exited_at = Some(now);
            }
        }
        Ok(tags)
    }

    async fn mark_inactive_except(&mut self, present: &BTreeSet<Tag>) -> LedgerResult<Vec<Tag>> {
        let tags = self.sweep_candidates(present);
        for tag in &tags {
            if let Some(record) = self.working.members.get_mut(tag) {
                record.active = false;
            }
        }
        Ok(tags)
    }

    async fn commit(self: Box<Self>) -> LedgerResult<()> {
        if self.faults.next_commit.swap(false, Ordering::AcqRel) {
            return Err(LedgerError::transaction_failed("simulated commit failure"));
        }

        let Self {
            mut guard, working, ..
        } = *self;
        *guard = working;
        Ok(())
    }
}
