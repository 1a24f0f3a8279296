//! Per-rule evaluation failures

use std::fmt;

use crate::storage::StorageError;

/// Why a single rule could not be evaluated.
///
/// None of these abort a monitoring cycle; the runner logs them with the
/// rule's identity and moves on to the next rule.
#[derive(Debug)]
pub enum EvaluationError {
    /// Reading the metric window failed
    MetricQuery(StorageError),

    /// Reading the worker registry failed
    WorkerQuery(StorageError),

    /// The violation was confirmed but the alarm could not be stored.
    /// The cooldown is not recorded, so the rule can fire again next cycle.
    AlarmWrite(StorageError),

    /// The stored rule violates its own bounds
    InvalidRule(String),
}

impl fmt::Display for EvaluationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvaluationError::MetricQuery(err) => write!(f, "failed to query metrics: {}", err),
            EvaluationError::WorkerQuery(err) => {
                write!(f, "failed to query service workers: {}", err)
            }
            EvaluationError::AlarmWrite(err) => write!(f, "failed to store alarm: {}", err),
            EvaluationError::InvalidRule(msg) => write!(f, "invalid rule: {}", msg),
        }
    }
}

impl std::error::Error for EvaluationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EvaluationError::MetricQuery(err)
            | EvaluationError::WorkerQuery(err)
            | EvaluationError::AlarmWrite(err) => Some(err),
            EvaluationError::InvalidRule(_) => None,
        }
    }
}
