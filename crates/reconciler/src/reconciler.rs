//! Reconciler implementation.

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use clanwatch_core::{ContributionDeltaEvent, MemberSnapshotEntry, PromotionAlert, Tag};
use clanwatch_ledger::{ContributionEntry, LedgerCycle, LedgerStore, MemberUpsert, UpsertKind};
use tracing::{debug, error, info, warn};

use crate::error::{Error, Result};
use crate::types::ReconciliationResult;

/// Default contribution count at which a regular member is flagged.
pub const DEFAULT_PROMOTION_THRESHOLD: u32 = 1000;

/// Configuration for the reconciler.
#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
    /// Contribution count that makes a regular member a promotion candidate.
    pub promotion_threshold: u32,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            promotion_threshold: DEFAULT_PROMOTION_THRESHOLD,
        }
    }
}

/// A snapshot entry whose upsert succeeded.
struct Tracked<'a> {
    entry: &'a MemberSnapshotEntry,
    upsert: MemberUpsert,
    /// Contribution count held by the record once the cycle commits, if known.
    contribution: Option<u32>,
}

/// Reconciles roster snapshots against the ledger.
pub struct Reconciler {
    ledger: Arc<dyn LedgerStore>,
    config: ReconcilerConfig,
}

impl Reconciler {
    /// Create a new reconciler.
    pub fn new(ledger: Arc<dyn LedgerStore>, config: ReconcilerConfig) -> Self {
        Self { ledger, config }
    }

    /// Reconcile one snapshot, writing every change in a single ledger cycle.
    ///
    /// Per-record write failures are logged, counted in
    /// [`ReconciliationResult::persistence_failures`] and skipped.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Persistence`] if the cycle cannot be opened, the
    /// absence sweep fails, or the commit fails. Nothing is written then.
    pub async fn reconcile(
        &self,
        snapshot: &[MemberSnapshotEntry],
        now: DateTime<Utc>,
    ) -> Result<ReconciliationResult> {
        let entries = unique_entries(snapshot);

        info!(
            snapshot = snapshot.len(),
            unique = entries.len(),
            "Starting reconciliation"
        );

        let mut result = ReconciliationResult {
            snapshot_size: entries.len(),
            ..Default::default()
        };
        let mut cycle = self.ledger.begin_cycle().await?;

        // Failed upserts still count as present so the sweep leaves them alone.
        let present: BTreeSet<Tag> = entries.iter().map(|e| e.tag.clone()).collect();

        let mut tracked = Vec::with_capacity(entries.len());
        for entry in entries {
            match cycle.upsert_member(entry, now).await {
                Ok(upsert) => {
                    if upsert.kind.is_activation() {
                        result.activated_count += 1;
                    }
                    match upsert.kind {
                        UpsertKind::Created => {
                            info!(tag = %entry.tag, name = %entry.name, "New member");
                            result.created_count += 1;
                        }
                        UpsertKind::Rejoined => {
                            info!(tag = %entry.tag, name = %entry.name, "Member rejoined");
                            result.rejoined_count += 1;
                        }
                        UpsertKind::Present => {}
                    }
                    tracked.push(Tracked {
                        entry,
                        upsert,
                        contribution: Some(entry.contribution_count),
                    });
                }
                Err(e) => {
                    warn!(tag = %entry.tag, error = %e, "Failed to upsert member");
                    result.persistence_failures += 1;
                }
            }
        }

        for member in &mut tracked {
            if member.upsert.kind != UpsertKind::Created {
                member.contribution = apply_contribution(
                    cycle.as_mut(),
                    member.entry,
                    &member.upsert,
                    now,
                    &mut result,
                )
                .await;
            }
        }

        if present.is_empty() {
            warn!("Empty snapshot, skipping absence sweep");
            result.sweep_skipped = true;
        } else {
            result.deactivated_count = sweep_absent(cycle.as_mut(), &present, now).await?;
        }

        for member in &tracked {
            if let Some(alert) = self
                .check_promotion(cycle.as_mut(), member, &mut result)
                .await
            {
                result.promotion_alerts.push(alert);
            }
        }

        cycle.commit().await.map_err(|e| {
            error!(error = %e, "Failed to commit reconciliation cycle");
            Error::from(e)
        })?;

        info!(
            activated = result.activated_count,
            deactivated = result.deactivated_count,
            contribution_events = result.contribution_events.len(),
            promotion_alerts = result.promotion_alerts.len(),
            persistence_failures = result.persistence_failures,
            "Reconciliation complete"
        );

        Ok(result)
    }

    async fn check_promotion(
        &self,
        cycle: &mut dyn LedgerCycle,
        member: &Tracked<'_>,
        result: &mut ReconciliationResult,
    ) -> Option<PromotionAlert> {
        let contribution = member.contribution?;
        if !member.entry.role.is_promotable()
            || member.upsert.promotion_alert_sent
            || contribution < self.config.promotion_threshold
        {
            return None;
        }

        if let Err(e) = cycle.latch_promotion_alert(&member.upsert.id).await {
            warn!(tag = %member.entry.tag, error = %e, "Failed to latch promotion alert");
            result.persistence_failures += 1;
            return None;
        }

        info!(
            tag = %member.entry.tag,
            contribution,
            threshold = self.config.promotion_threshold,
            "Promotion threshold reached"
        );

        Some(PromotionAlert {
            tag: member.entry.tag.clone(),
            name: member.entry.name.clone(),
            contribution,
        })
    }
}

/// Drop repeated tags, keeping the first occurrence.
fn unique_entries(snapshot: &[MemberSnapshotEntry]) -> Vec<&MemberSnapshotEntry> {
    let mut seen = HashSet::with_capacity(snapshot.len());
    snapshot
        .iter()
        .filter(|entry| {
            let first = seen.insert(entry.tag.clone());
            if !first {
                warn!(tag = %entry.tag, "Duplicate tag in snapshot, keeping first occurrence");
            }
            first
        })
        .collect()
}

/// Compare the stored counter with the snapshot and stage the change.
///
/// Returns the counter the record holds once the cycle commits, or `None`
/// when the stored value could not be read.
async fn apply_contribution(
    cycle: &mut dyn LedgerCycle,
    entry: &MemberSnapshotEntry,
    upsert: &MemberUpsert,
    now: DateTime<Utc>,
    result: &mut ReconciliationResult,
) -> Option<u32> {
    let stored = match cycle.read_current_contribution(&upsert.id).await {
        Ok(stored) => stored,
        Err(e) => {
            warn!(tag = %entry.tag, error = %e, "Failed to read stored contribution");
            result.persistence_failures += 1;
            return None;
        }
    };

    let Some(event) =
        ContributionDeltaEvent::between(entry.tag.clone(), stored, entry.contribution_count)
    else {
        return Some(stored);
    };

    if let Err(e) = cycle
        .write_contribution(&upsert.id, stored, entry.contribution_count, now)
        .await
    {
        warn!(tag = %entry.tag, error = %e, "Failed to write contribution");
        result.persistence_failures += 1;
        return Some(stored);
    }

    if event.is_increase() {
        let history = ContributionEntry::from_event(&event, now);
        if let Err(e) = cycle.append_contribution(&history).await {
            warn!(tag = %entry.tag, error = %e, "Failed to record contribution history");
            result.persistence_failures += 1;
        }
    }

    debug!(
        tag = %entry.tag,
        previous = event.previous,
        current = event.current,
        direction = ?event.direction,
        "Contribution changed"
    );
    result.contribution_events.push(event);
    Some(entry.contribution_count)
}

/// Mark every active record outside `present` as exited and inactive.
async fn sweep_absent(
    cycle: &mut dyn LedgerCycle,
    present: &BTreeSet<Tag>,
    now: DateTime<Utc>,
) -> Result<usize> {
    cycle.mark_exited_except(present, now).await?;
    let deactivated = cycle.mark_inactive_except(present).await?;

    for tag in &deactivated {
        info!(tag = %tag, "Member exited");
    }
    Ok(deactivated.len())
}
