//! Per-rule decision procedure
//!
//! ## Resource rules (CPU, memory, disk)
//!
//! 1. Load samples newer than `now - duration`
//! 2. Re-anchor the window on the newest sample
//! 3. Fewer than two samples: no violation
//! 4. Fire when at least 80% of the window violates the condition
//!
//! ## Worker inactivity rules
//!
//! The threshold is a number of minutes. The first monitored worker that has
//! been `inactive` since before `now - threshold` (optionally matching the
//! rule's source filter) raises the alarm.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument, trace};

use super::cooldown::CooldownTracker;
use super::error::EvaluationError;
use super::policy::EvaluationPolicy;
use super::window::assess_window;
use crate::storage::StorageBackend;
use crate::storage::schema::{
    Alarm, AlarmDraft, AlarmSource, RuleMetric, ServiceWorker, ThresholdRule,
};

/// Result of checking one rule in a cycle
#[derive(Debug, Clone, PartialEq)]
pub enum RuleOutcome {
    /// The rule fired recently; no data was read
    CoolingDown,

    /// Not enough data, or the violation is not persistent
    NoViolation,

    /// A new alarm was stored
    Raised(Alarm),
}

pub struct RuleEvaluator {
    store: Arc<dyn StorageBackend>,
    policy: EvaluationPolicy,
    cooldowns: CooldownTracker,
}

impl RuleEvaluator {
    pub fn new(store: Arc<dyn StorageBackend>, policy: EvaluationPolicy) -> Self {
        Self::with_cooldowns(store, policy, CooldownTracker::new())
    }

    pub fn with_cooldowns(
        store: Arc<dyn StorageBackend>,
        policy: EvaluationPolicy,
        cooldowns: CooldownTracker,
    ) -> Self {
        Self {
            store,
            policy,
            cooldowns,
        }
    }

    pub fn policy(&self) -> &EvaluationPolicy {
        &self.policy
    }

    pub fn cooldowns(&self) -> &CooldownTracker {
        &self.cooldowns
    }

    /// Decide whether `rule` is violated at `now`. Reads only.
    #[instrument(skip(self, rule), fields(rule_id = rule.id, metric = %rule.metric_type))]
    pub async fn evaluate(
        &self,
        rule: &ThresholdRule,
        now: DateTime<Utc>,
    ) -> Result<Option<AlarmDraft>, EvaluationError> {
        rule.validate().map_err(EvaluationError::InvalidRule)?;

        match rule.metric_type {
            RuleMetric::Cpu | RuleMetric::Memory | RuleMetric::Disk => {
                self.evaluate_resource(rule, now).await
            }
            RuleMetric::ServiceWorkerInactive => self.evaluate_worker_inactivity(rule, now).await,
        }
    }

    /// Evaluate `rule` under the cooldown protocol and store any alarm.
    ///
    /// The cooldown is consulted before any data is read and recorded only
    /// after the alarm write succeeded.
    pub async fn check_rule(
        &mut self,
        rule: &ThresholdRule,
        now: DateTime<Utc>,
    ) -> Result<RuleOutcome, EvaluationError> {
        if !self.cooldowns.is_expired(rule, now) {
            trace!("rule {} ({}) is cooling down", rule.id, rule.name);
            return Ok(RuleOutcome::CoolingDown);
        }

        let Some(draft) = self.evaluate(rule, now).await? else {
            return Ok(RuleOutcome::NoViolation);
        };

        let alarm = self
            .store
            .create_alarm(draft)
            .await
            .map_err(EvaluationError::AlarmWrite)?;

        self.cooldowns.record(rule, now);

        info!(
            "rule {} ({}) raised alarm {}: {}",
            rule.id, rule.name, alarm.id, alarm.description
        );
        Ok(RuleOutcome::Raised(alarm))
    }

    async fn evaluate_resource(
        &self,
        rule: &ThresholdRule,
        now: DateTime<Utc>,
    ) -> Result<Option<AlarmDraft>, EvaluationError> {
        let samples = self
            .store
            .query_metrics_since(now - rule.duration())
            .await
            .map_err(EvaluationError::MetricQuery)?;

        if samples.is_empty() {
            debug!("no samples in the last {} minutes", rule.duration_minutes);
            return Ok(None);
        }

        let assessment = assess_window(&samples, rule, &self.policy);
        trace!(
            "{} of {} samples violate (ratio {:.2})",
            assessment.violating,
            assessment.total,
            assessment.violation_ratio()
        );

        if !assessment.fires(&self.policy) {
            return Ok(None);
        }

        Ok(Some(resource_alarm(
            rule,
            assessment.current_value.unwrap_or(0.0),
            now,
        )))
    }

    async fn evaluate_worker_inactivity(
        &self,
        rule: &ThresholdRule,
        now: DateTime<Utc>,
    ) -> Result<Option<AlarmDraft>, EvaluationError> {
        let cutoff = now - rule.inactivity_threshold();
        let workers = self
            .store
            .query_inactive_workers(cutoff, rule.worker_filter())
            .await
            .map_err(EvaluationError::WorkerQuery)?;

        let Some(worker) = workers.into_iter().next() else {
            debug!("no worker inactive since before {}", cutoff);
            return Ok(None);
        };

        Ok(Some(worker_alarm(rule, &worker, now)))
    }
}

/// Thresholds are shown with at least one decimal place ("80.0", "85.25")
fn format_threshold(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{:.1}", value)
    } else {
        value.to_string()
    }
}

fn resource_alarm(rule: &ThresholdRule, current_value: f64, now: DateTime<Utc>) -> AlarmDraft {
    AlarmDraft {
        title: format!("Threshold Alert: {}", rule.name),
        description: format!(
            "{} {} threshold of {}% for {} minutes. Current value: {:.1}%",
            rule.metric_type.label(),
            rule.condition.verb(),
            format_threshold(rule.threshold_value),
            rule.duration_minutes,
            current_value
        ),
        severity: rule.severity,
        source: AlarmSource::ThresholdMonitor,
        source_id: rule.id.to_string(),
        triggered_at: now,
    }
}

fn worker_alarm(rule: &ThresholdRule, worker: &ServiceWorker, now: DateTime<Utc>) -> AlarmDraft {
    let inactive_minutes = (now - worker.last_updated).num_minutes();

    AlarmDraft {
        title: format!("Service Worker Inactive: {}", worker.name),
        description: format!(
            "Service worker '{}' has been inactive for {} minutes, exceeding the threshold of {} minutes. Last activity: {}",
            worker.name,
            inactive_minutes,
            format_threshold(rule.threshold_value),
            worker.last_updated.format("%Y-%m-%d %H:%M:%S UTC")
        ),
        severity: rule.severity,
        source: AlarmSource::ServiceWorkerMonitor,
        source_id: worker.id.to_string(),
        triggered_at: now,
    }
}
