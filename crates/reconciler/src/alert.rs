//! Outage detection and operator alerts.
//!
//! [`OutageState`] is plain data owned by the scheduler; [`OutageMonitor`]
//! applies fetch outcomes to it and returns a signal only on the transitions
//! `Healthy -> Degraded` and `Degraded -> Healthy`.

use clanwatch_core::PromotionAlert;
use clanwatch_roster::FetchError;

/// Consecutive transient failures tolerated before the service is degraded.
pub const DEFAULT_OUTAGE_THRESHOLD: u32 = 3;

/// Fetch-failure bookkeeping for the process lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OutageState {
    consecutive_failures: u32,
    degraded: bool,
}

impl OutageState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    #[must_use]
    pub const fn is_degraded(&self) -> bool {
        self.degraded
    }
}

/// Edge-triggered transition of the outage state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutageSignal {
    Degraded { consecutive_failures: u32 },
    Recovered { after_failures: u32 },
}

/// Applies fetch outcomes to an [`OutageState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutageMonitor {
    threshold: u32,
}

impl Default for OutageMonitor {
    fn default() -> Self {
        Self::new(DEFAULT_OUTAGE_THRESHOLD)
    }
}

impl OutageMonitor {
    /// The service degrades once failures exceed `threshold`.
    #[must_use]
    pub const fn new(threshold: u32) -> Self {
        Self { threshold }
    }

    #[must_use]
    pub const fn threshold(&self) -> u32 {
        self.threshold
    }

    /// Record a transient fetch failure.
    pub fn record_failure(&self, state: &mut OutageState) -> Option<OutageSignal> {
        state.consecutive_failures = state.consecutive_failures.saturating_add(1);

        if state.degraded || state.consecutive_failures <= self.threshold {
            return None;
        }

        state.degraded = true;
        Some(OutageSignal::Degraded {
            consecutive_failures: state.consecutive_failures,
        })
    }

    /// Record a successful fetch.
    pub fn record_success(&self, state: &mut OutageState) -> Option<OutageSignal> {
        let previous = std::mem::take(state);
        previous.degraded.then_some(OutageSignal::Recovered {
            after_failures: previous.consecutive_failures,
        })
    }
}

/// Message sent to the operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Alert {
    Degraded { consecutive_failures: u32 },
    Recovered { after_failures: u32 },
    Promotion(PromotionAlert),
    FatalFetch(FetchError),
}

impl Alert {
    #[must_use]
    pub fn subject(&self) -> String {
        match self {
            Self::Degraded { .. } => "Roster service degraded".to_string(),
            Self::Recovered { .. } => "Roster service recovered".to_string(),
            Self::Promotion(alert) => format!("Promotion candidate: {}", alert.name),
            Self::FatalFetch(_) => "Roster fetch rejected".to_string(),
        }
    }

    #[must_use]
    pub fn body(&self) -> String {
        match self {
            Self::Degraded {
                consecutive_failures,
            } => format!("roster service degraded after {consecutive_failures} consecutive failures"),
            Self::Recovered { after_failures } => {
                format!("roster service recovered after {after_failures} failed attempts")
            }
            Self::Promotion(alert) => format!(
                "{} ({}) reached {} contributions",
                alert.name, alert.tag, alert.contribution
            ),
            Self::FatalFetch(error) => {
                format!("roster fetch was rejected and needs operator attention: {error}")
            }
        }
    }
}

impl From<OutageSignal> for Alert {
    fn from(signal: OutageSignal) -> Self {
        match signal {
            OutageSignal::Degraded {
                consecutive_failures,
            } => Self::Degraded {
                consecutive_failures,
            },
            OutageSignal::Recovered { after_failures } => Self::Recovered { after_failures },
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use clanwatch_core::Tag;
    use proptest::prelude::*;

    /// Given a healthy service
    /// When three transient failures occur
    /// Then it stays healthy, and the fourth degrades it exactly once
    #[test]
    fn fourth_consecutive_failure_degrades() {
        let monitor = OutageMonitor::default();
        let mut state = OutageState::new();

        for _ in 0..3 {
            assert_eq!(monitor.record_failure(&mut state), None);
            assert!(!state.is_degraded());
        }

        assert_eq!(
            monitor.record_failure(&mut state),
            Some(OutageSignal::Degraded {
                consecutive_failures: 4
            })
        );
        assert!(state.is_degraded());

        // Already degraded: nothing further.
        assert_eq!(monitor.record_failure(&mut state), None);
        assert_eq!(state.consecutive_failures(), 5);

        assert_eq!(
            monitor.record_success(&mut state),
            Some(OutageSignal::Recovered { after_failures: 5 })
        );
        assert_eq!(state, OutageState::new());
    }

    #[test]
    fn success_while_healthy_resets_silently() {
        let monitor = OutageMonitor::default();
        let mut state = OutageState::new();

        monitor.record_failure(&mut state);
        monitor.record_failure(&mut state);
        assert_eq!(monitor.record_success(&mut state), None);
        assert_eq!(state.consecutive_failures(), 0);

        // The count starts over.
        for _ in 0..3 {
            assert_eq!(monitor.record_failure(&mut state), None);
        }
    }

    #[test]
    fn alert_texts() {
        let degraded = Alert::from(OutageSignal::Degraded {
            consecutive_failures: 4,
        });
        assert_eq!(
            degraded.body(),
            "roster service degraded after 4 consecutive failures"
        );

        let promotion = Alert::Promotion(PromotionAlert {
            tag: Tag::new("#ABC").unwrap(),
            name: "Alice".to_string(),
            contribution: 1200,
        });
        assert_eq!(promotion.subject(), "Promotion candidate: Alice");
        assert_eq!(promotion.body(), "Alice (#ABC) reached 1200 contributions");
    }

    proptest! {
        /// Property: one degraded signal per failure run longer than the
        /// threshold, and one recovered signal per degraded run that ends.
        #[test]
        fn prop_signals_are_edge_triggered(
            outcomes in proptest::collection::vec(any::<bool>(), 0..200),
            threshold in 0u32..6,
        ) {
            let monitor = OutageMonitor::new(threshold);
            let mut state = OutageState::new();
            let mut degraded_signals = 0usize;
            let mut recovered_signals = 0usize;

            for &success in &outcomes {
                let signal = if success {
                    monitor.record_success(&mut state)
                } else {
                    monitor.record_failure(&mut state)
                };
                match signal {
                    Some(OutageSignal::Degraded { .. }) => degraded_signals += 1,
                    Some(OutageSignal::Recovered { .. }) => recovered_signals += 1,
                    None => {}
                }
                prop_assert_eq!(
                    state.is_degraded(),
                    state.consecutive_failures() > threshold
                );
            }

            let threshold = threshold as usize;
            let mut long_runs = 0usize;
            let mut ended_long_runs = 0usize;
            let mut run = 0usize;
            for &success in &outcomes {
                if success {
                    if run > threshold {
                        ended_long_runs += 1;
                    }
                    run = 0;
                } else {
                    run += 1;
                    if run == threshold + 1 {
                        long_runs += 1;
                    }
                }
            }

            prop_assert_eq!(degraded_signals, long_runs);
            prop_assert_eq!(recovered_signals, ended_long_runs);
        }
    }
}
