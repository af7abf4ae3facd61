//! Events reported by a reconciliation cycle.

use serde::{Deserialize, Serialize};

use crate::member::Tag;

/// Direction of a contribution counter change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeltaDirection {
    Increase,
    /// Counter went down, e.g. a season reset
    Decrease,
}

/// A member's contribution counter differs from the stored value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContributionDeltaEvent {
    pub tag: Tag,
    pub previous: u32,
    pub current: u32,
    pub direction: DeltaDirection,
}

impl ContributionDeltaEvent {
    /// Build an event from the stored and observed counters.
    ///
    /// Returns `None` when the values are equal: no change is not an event.
    #[must_use]
    pub fn between(tag: Tag, previous: u32, current: u32) -> Option<Self> {
        if previous == current {
            return None;
        }

        let direction = if current > previous {
            DeltaDirection::Increase
        } else {
            DeltaDirection::Decrease
        };

        Some(Self {
            tag,
            previous,
            current,
            direction,
        })
    }

    /// Signed difference between the observed and stored counters.
    #[must_use]
    pub fn delta(&self) -> i64 {
        i64::from(self.current) - i64::from(self.previous)
    }

    #[must_use]
    pub const fn is_increase(&self) -> bool {
        matches!(self.direction, DeltaDirection::Increase)
    }
}

/// A regular member crossed the promotion threshold for the first time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromotionAlert {
    pub tag: Tag,
    pub name: String,
    pub contribution: u32,
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    fn tag() -> Tag {
        Tag::new("#ABC").unwrap()
    }

    #[test]
    fn test_equal_counters_are_not_an_event() {
        assert!(ContributionDeltaEvent::between(tag(), 50, 50).is_none());
    }

    #[test]
    fn test_increase_and_decrease() {
        let up = ContributionDeltaEvent::between(tag(), 50, 1200).unwrap();
        assert_eq!(up.direction, DeltaDirection::Increase);
        assert_eq!(up.delta(), 1150);
        assert!(up.is_increase());

        let down = ContributionDeltaEvent::between(tag(), 1200, 0).unwrap();
        assert_eq!(down.direction, DeltaDirection::Decrease);
        assert_eq!(down.delta(), -1200);
        assert!(!down.is_increase());
    }
}
