//! Fixed-interval reconciliation loop.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use clanwatch_core::Tag;
use clanwatch_roster::{FetchErrorKind, RosterSource};
use tokio::sync::{Mutex, watch};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::alert::{Alert, DEFAULT_OUTAGE_THRESHOLD, OutageMonitor, OutageState};
use crate::error::{Error, Result};
use crate::notify::Notifier;
use crate::reconciler::Reconciler;
use crate::types::CycleReport;

/// Default time between cycles.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(300);

/// Configuration for the reconciliation loop.
#[derive(Debug, Clone)]
pub struct LoopConfig {
    /// Interval between reconciliation cycles.
    pub interval: Duration,
    /// Consecutive transient failures tolerated before alerting.
    pub outage_threshold: u32,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_INTERVAL,
            outage_threshold: DEFAULT_OUTAGE_THRESHOLD,
        }
    }
}

/// Continuous reconciliation loop.
///
/// Runs one cycle immediately, then one per interval until stopped. At most
/// one cycle runs at a time; a cycle requested while another is in flight is
/// skipped.
pub struct ReconciliationLoop {
    source: Arc<dyn RosterSource>,
    group: Tag,
    reconciler: Arc<Reconciler>,
    notifier: Arc<dyn Notifier>,
    monitor: OutageMonitor,
    /// Held for the duration of a cycle.
    outage: Mutex<OutageState>,
    config: LoopConfig,
    stop_tx: watch::Sender<bool>,
}

impl ReconciliationLoop {
    /// Create a new reconciliation loop.
    pub fn new(
        source: Arc<dyn RosterSource>,
        group: Tag,
        reconciler: Arc<Reconciler>,
        notifier: Arc<dyn Notifier>,
        config: LoopConfig,
    ) -> Self {
        let (stop_tx, _) = watch::channel(false);
        Self {
            source,
            group,
            reconciler,
            notifier,
            monitor: OutageMonitor::new(config.outage_threshold),
            outage: Mutex::new(OutageState::new()),
            config,
            stop_tx,
        }
    }

    /// Run until stopped.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] for a zero interval, and
    /// [`Error::FatalFetch`] if the initial cycle is rejected by the roster
    /// service. Later fatal errors are reported and the loop goes on.
    pub async fn run(&self) -> Result<()> {
        let mut stop_rx = self.stop_tx.subscribe();
        let period = self.config.interval;
        if period.is_zero() {
            return Err(Error::invalid_config("interval must be greater than zero"));
        }

        info!(
            group = %self.group,
            interval_secs = period.as_secs(),
            outage_threshold = self.monitor.threshold(),
            "Starting reconciliation loop"
        );

        let initial = tokio::select! {
            biased;
            () = stopped(&mut stop_rx) => None,
            report = self.run_cycle() => Some(report),
        };

        match initial {
            None => {
                info!("Reconciliation loop stopped during initial cycle");
                return Ok(());
            }
            Some(CycleReport::FatalFailure(error)) => {
                error!(error = %error, "Initial cycle failed, stopping");
                return Err(Error::FatalFetch(error));
            }
            Some(report) => log_report(&report),
        }

        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                () = stopped(&mut stop_rx) => {
                    info!("Reconciliation loop stopped");
                    return Ok(());
                }
                _ = ticker.tick() => {
                    tokio::select! {
                        biased;
                        () = stopped(&mut stop_rx) => {
                            // The cycle has not committed, so the ledger is untouched.
                            info!("Reconciliation loop stopped, abandoning in-flight cycle");
                            return Ok(());
                        }
                        report = self.run_cycle() => log_report(&report),
                    }
                }
            }
        }
    }

    /// Fetch, reconcile and alert once.
    pub async fn run_cycle(&self) -> CycleReport {
        let Ok(mut outage) = self.outage.try_lock() else {
            warn!("Previous cycle still running, skipping");
            return CycleReport::Skipped;
        };

        let now = Utc::now();
        debug!(group = %self.group, "Fetching roster");

        let snapshot = match self.source.fetch(&self.group).await {
            Ok(snapshot) => snapshot,
            Err(error) if error.kind() == FetchErrorKind::Transient => {
                warn!(
                    error = %error,
                    status = ?error.status(),
                    consecutive = outage.consecutive_failures().saturating_add(1),
                    "Roster service unavailable"
                );
                if let Some(signal) = self.monitor.record_failure(&mut outage) {
                    warn!(
                        consecutive = outage.consecutive_failures(),
                        "Roster service degraded"
                    );
                    self.dispatch(&Alert::from(signal)).await;
                }
                return CycleReport::TransientFailure {
                    error,
                    consecutive_failures: outage.consecutive_failures(),
                };
            }
            Err(error) => {
                error!(error = %error, status = ?error.status(), "Roster fetch rejected");
                self.dispatch(&Alert::FatalFetch(error.clone())).await;
                return CycleReport::FatalFailure(error);
            }
        };

        if let Some(signal) = self.monitor.record_success(&mut outage) {
            info!("Roster service recovered");
            self.dispatch(&Alert::from(signal)).await;
        }

        match self.reconciler.reconcile(&snapshot, now).await {
            Ok(result) => {
                for alert in &result.promotion_alerts {
                    self.dispatch(&Alert::Promotion(alert.clone())).await;
                }
                CycleReport::Reconciled(result)
            }
            Err(e) => {
                error!(error = %e, "Reconciliation failed, nothing written");
                CycleReport::PersistenceFailure {
                    reason: e.to_string(),
                }
            }
        }
    }

    async fn dispatch(&self, alert: &Alert) {
        if let Err(e) = self.notifier.send(alert).await {
            warn!(error = %e, subject = %alert.subject(), "Failed to send notification");
        }
    }

    /// Current outage bookkeeping. Waits for an in-flight cycle.
    pub async fn outage_state(&self) -> OutageState {
        *self.outage.lock().await
    }

    /// Stop the loop.
    pub fn stop(&self) {
        self.stop_tx.send_replace(true);
    }

    /// Get a stopper handle.
    pub fn stopper(&self) -> LoopStopper {
        LoopStopper {
            stop_tx: self.stop_tx.clone(),
        }
    }
}

/// Resolves once the stop flag is set or the sender is gone.
async fn stopped(rx: &mut watch::Receiver<bool>) {
    let _ = rx.wait_for(|stopped| *stopped).await;
}

fn log_report(report: &CycleReport) {
    match report {
        CycleReport::Reconciled(result) => info!(summary = %result, "Cycle complete"),
        CycleReport::TransientFailure {
            consecutive_failures,
            ..
        } => debug!(consecutive = consecutive_failures, "Cycle ended on transient failure"),
        CycleReport::FatalFailure(error) => debug!(error = %error, "Cycle ended on fatal failure"),
        CycleReport::PersistenceFailure { reason } => {
            debug!(reason = %reason, "Cycle ended on persistence failure");
        }
        CycleReport::Skipped => {}
    }
}

/// Handle to stop a reconciliation loop.
#[derive(Clone)]
pub struct LoopStopper {
    stop_tx: watch::Sender<bool>,
}

impl LoopStopper {
    /// Stop the loop.
    pub fn stop(&self) {
        self.stop_tx.send_replace(true);
    }
}
