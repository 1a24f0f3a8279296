//! Tunable constants of the decision procedure

use serde::{Deserialize, Serialize};

/// Fraction of samples in a window that must violate for a rule to fire
pub const DEFAULT_VIOLATION_RATIO: f64 = 0.8;

/// Maximum distance from the threshold that still counts as `equals`
pub const DEFAULT_EQUALS_TOLERANCE: f64 = 1.0;

/// A single sample cannot establish persistence
pub const MIN_WINDOW_SAMPLES: usize = 2;

/// Window of the "recent metrics" figure in the status view
pub const DEFAULT_RECENT_METRICS_MINUTES: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationPolicy {
    pub violation_ratio: f64,
    pub equals_tolerance: f64,
    pub min_window_samples: usize,
    pub recent_metrics_minutes: u32,
}

impl Default for EvaluationPolicy {
    fn default() -> Self {
        Self {
            violation_ratio: DEFAULT_VIOLATION_RATIO,
            equals_tolerance: DEFAULT_EQUALS_TOLERANCE,
            min_window_samples: MIN_WINDOW_SAMPLES,
            recent_metrics_minutes: DEFAULT_RECENT_METRICS_MINUTES,
        }
    }
}

impl EvaluationPolicy {
    pub fn validate(&self) -> Result<(), String> {
        if !(self.violation_ratio > 0.0 && self.violation_ratio <= 1.0) {
            return Err(format!(
                "violation ratio must be in (0, 1], got {}",
                self.violation_ratio
            ));
        }

        if !self.equals_tolerance.is_finite() || self.equals_tolerance < 0.0 {
            return Err(format!(
                "equals tolerance must be a non-negative number, got {}",
                self.equals_tolerance
            ));
        }

        if self.min_window_samples == 0 {
            return Err("minimum window size must be at least 1 sample".to_string());
        }

        Ok(())
    }
}
