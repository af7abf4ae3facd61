//! Core types for the reconciler.

use std::fmt;

use clanwatch_core::{ContributionDeltaEvent, PromotionAlert};
use clanwatch_roster::FetchError;
use itertools::Itertools;
use serde::{Deserialize, Serialize};

/// Outcome of reconciling one snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationResult {
    /// Records that became active: first sightings plus rejoins.
    pub activated_count: usize,
    /// Records that went from active to exited.
    pub deactivated_count: usize,
    /// One event per member whose contribution counter changed.
    pub contribution_events: Vec<ContributionDeltaEvent>,
    /// Members that crossed the promotion threshold for the first time.
    pub promotion_alerts: Vec<PromotionAlert>,
    /// Tags seen for the first time.
    pub created_count: usize,
    /// Tags that came back after an exit.
    pub rejoined_count: usize,
    /// Per-record ledger writes that failed and were skipped.
    pub persistence_failures: usize,
    /// The snapshot was empty, so no one was marked absent.
    pub sweep_skipped: bool,
    /// Unique entries in the snapshot.
    pub snapshot_size: usize,
}

impl ReconciliationResult {
    /// True when the cycle changed nothing in the ledger.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.activated_count == 0
            && self.deactivated_count == 0
            && self.contribution_events.is_empty()
            && self.promotion_alerts.is_empty()
    }

    /// Contribution events that were recorded as history.
    pub fn increases(&self) -> impl Iterator<Item = &ContributionDeltaEvent> {
        self.contribution_events.iter().filter(|e| e.is_increase())
    }
}

impl fmt::Display for ReconciliationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} members: {} activated ({} new, {} rejoined), {} exited, {} contribution changes, {} promotion alerts",
            self.snapshot_size,
            self.activated_count,
            self.created_count,
            self.rejoined_count,
            self.deactivated_count,
            self.contribution_events.len(),
            self.promotion_alerts.len(),
        )?;

        if self.persistence_failures > 0 {
            write!(f, ", {} write failures", self.persistence_failures)?;
        }
        if self.sweep_skipped {
            write!(f, " (empty snapshot, absence sweep skipped)")?;
        }
        if !self.promotion_alerts.is_empty() {
            let tags = self.promotion_alerts.iter().map(|a| a.tag.as_str()).join(", ");
            write!(f, " [{tags}]")?;
        }
        Ok(())
    }
}

/// What one scheduler cycle did.
#[derive(Debug, Clone)]
pub enum CycleReport {
    /// The snapshot was fetched and reconciled.
    Reconciled(ReconciliationResult),
    /// The roster service was temporarily unavailable.
    TransientFailure {
        error: FetchError,
        consecutive_failures: u32,
    },
    /// The roster service rejected the request; nothing was written.
    FatalFailure(FetchError),
    /// The snapshot was fetched but the ledger could not commit the cycle.
    PersistenceFailure { reason: String },
    /// Another cycle was still running.
    Skipped,
}

impl CycleReport {
    #[must_use]
    pub const fn is_reconciled(&self) -> bool {
        matches!(self, Self::Reconciled(_))
    }

    #[must_use]
    pub const fn result(&self) -> Option<&ReconciliationResult> {
        match self {
            Self::Reconciled(result) => Some(result),
            _ => None,
        }
    }
}
