//! Evaluation windows over metric samples

use chrono::Duration;

use super::policy::EvaluationPolicy;
use crate::storage::schema::{SystemMetricSample, ThresholdRule};

/// Outcome of applying a rule's condition to its window
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowAssessment {
    /// Samples inside the window
    pub total: usize,

    /// Samples breaching the condition
    pub violating: usize,

    /// The rule's metric in the newest sample, if it has a usable value
    pub current_value: Option<f64>,
}

impl WindowAssessment {
    pub fn violation_ratio(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.violating as f64 / self.total as f64
    }

    /// Whether the violation is persistent enough to raise an alarm
    pub fn fires(&self, policy: &EvaluationPolicy) -> bool {
        self.total >= policy.min_window_samples
            && self.violation_ratio() >= policy.violation_ratio
    }
}

/// Samples within `duration` of the newest one.
///
/// `samples` must be ordered newest first. Anchoring on the newest sample
/// instead of the wall clock keeps a burst of data that arrived slightly late
/// from being cut in half.
pub fn anchored_window(
    samples: &[SystemMetricSample],
    duration: Duration,
) -> &[SystemMetricSample] {
    let Some(newest) = samples.first() else {
        return &[];
    };

    let start = newest.timestamp - duration;
    let end = samples
        .iter()
        .position(|sample| sample.timestamp < start)
        .unwrap_or(samples.len());

    &samples[..end]
}

pub fn assess_window(
    samples: &[SystemMetricSample],
    rule: &ThresholdRule,
    policy: &EvaluationPolicy,
) -> WindowAssessment {
    let window = anchored_window(samples, rule.duration());

    let violating = window
        .iter()
        .filter_map(|sample| sample.value_for(rule.metric_type))
        .filter(|value| {
            rule.condition
                .is_violated_by(*value, rule.threshold_value, policy.equals_tolerance)
        })
        .count();

    WindowAssessment {
        total: window.len(),
        violating,
        current_value: window
            .first()
            .and_then(|sample| sample.value_for(rule.metric_type)),
    }
}
