//! Threshold crossing detection.

use std::fmt;

/// A change of side relative to the area threshold.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Transition {
    /// Area rose to or above the threshold.
    Reached {
        /// Area that triggered the transition.
        area: f64,
        /// Configured threshold.
        threshold: f64,
    },

    /// Area fell below the threshold.
    Dropped {
        /// Area that triggered the transition.
        area: f64,
        /// Configured threshold.
        threshold: f64,
    },
}

impl Transition {
    /// Area observed when the transition fired.
    #[must_use]
    pub fn area(&self) -> f64 {
        match self {
            Self::Reached { area, .. } | Self::Dropped { area, .. } => *area,
        }
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reached { threshold, .. } => {
                write!(f, "At Least {} units belongs to CH", threshold)
            }
            Self::Dropped { threshold, .. } => {
                write!(f, "At Least {} units no longer belongs to CH", threshold)
            }
        }
    }
}

/// Remembers which side of the threshold the last observed area was on.
///
/// Starts below the threshold, so a first observation at or above it is
/// reported as [`Transition::Reached`].
///
/// ```rust
/// use hull_monitor::{ThresholdTracker, Transition};
///
/// let mut tracker = ThresholdTracker::new(100.0);
/// assert!(tracker.observe(50.0).is_none());
/// assert!(matches!(tracker.observe(100.0), Some(Transition::Reached { .. })));
/// assert!(tracker.observe(250.0).is_none());
/// assert!(matches!(tracker.observe(99.9), Some(Transition::Dropped { .. })));
/// ```
#[derive(Debug, Clone)]
pub struct ThresholdTracker {
    threshold: f64,
    above: bool,
}

impl ThresholdTracker {
    #[must_use]
    pub const fn new(threshold: f64) -> Self {
        Self {
            threshold,
            above: false,
        }
    }

    /// Records `area` and returns the transition it causes, if any.
    pub fn observe(&mut self, area: f64) -> Option<Transition> {
        let threshold = self.threshold;
        match (area >= threshold, self.above) {
            (true, false) => {
                self.above = true;
                Some(Transition::Reached { area, threshold })
            }
            (false, true) => {
                self.above = false;
                Some(Transition::Dropped { area, threshold })
            }
            _ => None,
        }
    }

    /// Whether the last observed area was at or above the threshold.
    #[must_use]
    pub const fn is_above(&self) -> bool {
        self.above
    }

    #[must_use]
    pub const fn threshold(&self) -> f64 {
        self.threshold
    }
}
