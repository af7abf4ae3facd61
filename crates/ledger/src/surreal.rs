//! [`LedgerStore`] on SurrealDB.
//!
//! A cycle reads committed records directly and stages its writes as
//! SurrealQL statements. Commit sends them as one
//! `BEGIN TRANSACTION ... COMMIT TRANSACTION` query.

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use clanwatch_core::{MemberLedgerRecord, MemberSnapshotEntry, Tag};
use serde::Serialize;
use serde_json::{Map, Value};
use surrealdb::Surreal;
use surrealdb::engine::any::Any;
use tokio::sync::OwnedMutexGuard;
use tracing::{debug, trace};

use crate::client::SurrealLedger;
use crate::error::{LedgerError, LedgerResult, from_surrealdb_error};
use crate::store::{
    ContributionEntry, LedgerCycle, LedgerStore, MemberFilter, MemberUpsert, RecordId, UpsertKind,
    timestamp,
};

const SELECT_MEMBER: &str = "SELECT * OMIT id FROM";

#[async_trait]
impl LedgerStore for SurrealLedger {
    async fn begin_cycle(&self) -> LedgerResult<Box<dyn LedgerCycle>> {
        let guard = Arc::clone(&self.cycle_lock).lock_owned().await;
        Ok(Box::new(SurrealCycle {
            db: Arc::clone(&self.db),
            _guard: guard,
            statements: Vec::new(),
            params: Map::new(),
        }))
    }

    async fn member(&self, tag: &Tag) -> LedgerResult<Option<MemberLedgerRecord>> {
        fetch_member(&self.db, tag).await
    }

    async fn members(&self, filter: MemberFilter) -> LedgerResult<Vec<MemberLedgerRecord>> {
        let condition = match filter {
            MemberFilter::All => "",
            MemberFilter::Active => " WHERE active = true",
            MemberFilter::Exited => " WHERE active = false",
        };

        let records: Vec<MemberLedgerRecord> = self
            .db
            .query(format!("{SELECT_MEMBER} member{condition} ORDER BY tag"))
            .await
            .map_err(from_surrealdb_error)?
            .take(0)
            .map_err(from_surrealdb_error)?;

        Ok(records)
    }

    async fn contribution_history(&self, tag: &Tag) -> LedgerResult<Vec<ContributionEntry>> {
        let entries: Vec<ContributionEntry> = self
            .db
            .query(
                "SELECT tag, previous, current, delta, recorded_at FROM contribution \
                 WHERE tag = $tag ORDER BY recorded_at",
            )
            .bind(("tag", tag.as_str().to_string()))
            .await
            .map_err(from_surrealdb_error)?
            .take(0)
            .map_err(from_surrealdb_error)?;

        Ok(entries)
    }
}

async fn fetch_member(db: &Surreal<Any>, tag: &Tag) -> LedgerResult<Option<MemberLedgerRecord>> {
    let record: Option<MemberLedgerRecord> = db
        .query(format!("{SELECT_MEMBER} type::thing('member', $tag)"))
        .bind(("tag", tag.as_str().to_string()))
        .await
        .map_err(from_surrealdb_error)?
        .take(0)
        .map_err(from_surrealdb_error)?;

    Ok(record)
}

struct SurrealCycle {
    db: Arc<Surreal<Any>>,
    _guard: OwnedMutexGuard<()>,
    statements: Vec<String>,
    params: Map<String, Value>,
}

impl SurrealCycle {
    /// Register a bound parameter and return its placeholder.
    fn param(&mut self, value: impl Serialize) -> LedgerResult<String> {
        let name = format!("p{}", self.params.len());
        self.params.insert(name.clone(), serde_json::to_value(value)?);
        Ok(format!("${name}"))
    }

    /// Register a timestamp parameter in the stored text form.
    fn time_param(&mut self, at: DateTime<Utc>) -> LedgerResult<String> {
        self.param(timestamp::format(&at))
    }

    fn stage(&mut self, statement: String) {
        trace!(statement = %statement, "Staged ledger write");
        self.statements.push(statement);
    }

    fn record(&mut self, id: &RecordId) -> LedgerResult<String> {
        let tag = self.param(id.tag().as_str())?;
        Ok(format!("type::thing('member', {tag})"))
    }

    /// Active records whose tag is not in `present`, as committed.
    async fn sweep_candidates(&self, present: &BTreeSet<Tag>) -> LedgerResult<Vec<Tag>> {
        let present: Vec<&str> = present.iter().map(Tag::as_str).collect();
        let tags: Vec<Tag> = self
            .db
            .query(
                "SELECT VALUE tag FROM member \
                 WHERE active = true AND tag NOTINSIDE $present ORDER BY tag",
            )
            .bind(("present", serde_json::to_value(present)?))
            .await
            .map_err(from_surrealdb_error)?
            .take(0)
            .map_err(from_surrealdb_error)?;

        Ok(tags)
    }

    fn stage_sweep(&mut self, present: &BTreeSet<Tag>, assignment: &str) -> LedgerResult<()> {
        let present: Vec<&str> = present.iter().map(Tag::as_str).collect();
        let present = self.param(present)?;
        self.stage(format!(
            "UPDATE member SET {assignment} WHERE active = true AND tag NOTINSIDE {present}"
        ));
        Ok(())
    }
}

#[async_trait]
impl LedgerCycle for SurrealCycle {
    async fn upsert_member(
        &mut self,
        entry: &MemberSnapshotEntry,
        now: DateTime<Utc>,
    ) -> LedgerResult<MemberUpsert> {
        let id = RecordId::new(entry.tag.clone());
        let existing = fetch_member(&self.db, &entry.tag).await?;
        let thing = self.record(&id)?;

        let Some(existing) = existing else {
            let content = self.param(MemberLedgerRecord::first_sighting(entry, now))?;
            self.stage(format!("CREATE {thing} CONTENT {content}"));
            return Ok(MemberUpsert {
                id,
                kind: UpsertKind::Created,
                promotion_alert_sent: false,
            });
        };

        let name = self.param(&entry.name)?;
        let seen = self.time_param(now)?;
        self.stage(format!(
            "UPDATE {thing} SET name = {name}, last_seen_at = {seen}, active = true, exited_at = NONE"
        ));

        Ok(MemberUpsert {
            id,
            kind: if existing.active {
                UpsertKind::Present
            } else {
                UpsertKind::Rejoined
            },
            promotion_alert_sent: existing.promotion_alert_sent,
        })
    }

    async fn read_current_contribution(&mut self, id: &RecordId) -> LedgerResult<u32> {
        fetch_member(&self.db, id.tag())
            .await?
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
        let thing = self.record(id)?;
        let previous = self.param(previous)?;
        let current = self.param(current)?;
        let at = self.time_param(at)?;
        self.stage(format!(
            "UPDATE {thing} SET previous_contribution = {previous}, \
             current_contribution = {current}, last_contribution_change_at = {at}"
        ));
        Ok(())
    }

    async fn append_contribution(&mut self, entry: &ContributionEntry) -> LedgerResult<()> {
        let content = self.param(entry)?;
        self.stage(format!("CREATE contribution CONTENT {content}"));
        Ok(())
    }

    async fn latch_promotion_alert(&mut self, id: &RecordId) -> LedgerResult<()> {
        let thing = self.record(id)?;
        self.stage(format!("UPDATE {thing} SET promotion_alert_sent = true"));
        Ok(())
    }

    async fn mark_exited_except(
        &mut self,
        present: &BTreeSet<Tag>,
        now: DateTime<Utc>,
    ) -> LedgerResult<Vec<Tag>> {
        let tags = self.sweep_candidates(present).await?;
        if !tags.is_empty() {
            let now = self.time_param(now)?;
            self.stage_sweep(present, &format!("exited_at = {now}"))?;
        }
        Ok(tags)
    }

    async fn mark_inactive_except(&mut self, present: &BTreeSet<Tag>) -> LedgerResult<Vec<Tag>> {
        let tags = self.sweep_candidates(present).await?;
        if !tags.is_empty() {
            self.stage_sweep(present, "active = false")?;
        }
        Ok(tags)
    }

    async fn commit(self: Box<Self>) -> LedgerResult<()> {
        let Self {
            db,
            statements,
            params,
            ..
        } = *self;

        if statements.is_empty() {
            return Ok(());
        }

        let count = statements.len();
        let sql = format!(
            "BEGIN TRANSACTION;\n{};\nCOMMIT TRANSACTION;",
            statements.join(";\n")
        );

        db.query(sql)
            .bind(params)
            .await
            .map_err(|e| LedgerError::transaction_failed(e.to_string()))?
            .check()
            .map_err(|e| LedgerError::transaction_failed(e.to_string()))?;

        debug!(statements = count, "Committed ledger cycle");
        Ok(())
    }
}
