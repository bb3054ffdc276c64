use serde::{Deserialize, Serialize};

use crate::common::constants::{DEFAULT_BANDS_HIGH, DEFAULT_BANDS_MEDIUM};
use crate::common::types::Decision;

/// Thresholded mapping from a confidence score to a decision.
///
/// Each band has a closed lower bound: `high` itself blocks and `medium` itself
/// suggests. Thresholds are taken as given; with `medium > high` the suggest band
/// is simply never reached.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Banding {
    pub high: f64,
    pub medium: f64,
}

impl Banding {
    pub const fn new(high: f64, medium: f64) -> Self {
        Self { high, medium }
    }

    pub fn decide(&self, confidence: f64) -> Decision {
        if confidence >= self.high {
            Decision::Block
        } else if confidence >= self.medium {
            Decision::Suggest
        } else {
            Decision::Allow
        }
    }

    /// True when both thresholds lie in [0, 1] and `medium <= high`
    pub fn is_well_ordered(&self) -> bool {
        (0.0..=1.0).contains(&self.medium)
            && (0.0..=1.0).contains(&self.high)
            && self.medium <= self.high
    }
}

impl Default for Banding {
    fn default() -> Self {
        Self::new(DEFAULT_BANDS_HIGH, DEFAULT_BANDS_MEDIUM)
    }
}
