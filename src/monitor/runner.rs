//! Monitoring cycle runner
//!
//! One cycle loads the enabled rules, checks each of them against a single
//! instant and returns the alarms it created. A failing rule is logged and
//! skipped; a failing rule store aborts the cycle with an empty result and
//! the failure is kept for the status view.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{debug, error, info, instrument, warn};

use super::clock::{Clock, SystemClock};
use super::cooldown::CooldownTracker;
use super::evaluator::{RuleEvaluator, RuleOutcome};
use super::policy::EvaluationPolicy;
use crate::storage::schema::Alarm;
use crate::storage::{StorageBackend, StorageError};

/// What happened in one cycle
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CycleSummary {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub rules_evaluated: usize,
    pub alarms_raised: usize,

    /// Rules skipped because they fired recently
    pub cooling_down: usize,

    /// Rules whose evaluation failed
    pub failed: usize,

    /// Set when the cycle could not run at all
    pub error: Option<String>,
}

impl CycleSummary {
    fn started(at: DateTime<Utc>) -> Self {
        Self {
            started_at: at,
            finished_at: at,
            rules_evaluated: 0,
            alarms_raised: 0,
            cooling_down: 0,
            failed: 0,
            error: None,
        }
    }
}

/// Operational view of the monitor
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonitoringStatus {
    pub enabled_rules: usize,

    /// Start of the last cycle, if any ran
    pub last_check: Option<DateTime<Utc>>,

    /// Samples received in the recent-metrics window
    pub recent_metrics: usize,

    /// Rules currently suppressed by their cooldown
    pub active_cooldowns: usize,

    pub last_cycle: Option<CycleSummary>,

    /// The store error hit while building this view, or else the error of
    /// the last cycle
    pub error: Option<String>,
}

pub struct MonitoringCycleRunner {
    store: Arc<dyn StorageBackend>,
    evaluator: RuleEvaluator,
    clock: Arc<dyn Clock>,
    last_cycle: Option<CycleSummary>,
}

impl MonitoringCycleRunner {
    pub fn new(store: Arc<dyn StorageBackend>, policy: EvaluationPolicy) -> Self {
        Self::with_clock(store, policy, Arc::new(SystemClock))
    }

    pub fn with_clock(
        store: Arc<dyn StorageBackend>,
        policy: EvaluationPolicy,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            evaluator: RuleEvaluator::new(store.clone(), policy),
            store,
            clock,
            last_cycle: None,
        }
    }

    /// Replace the cooldown state, e.g. to share a pre-seeded tracker in tests
    pub fn with_cooldowns(mut self, cooldowns: CooldownTracker) -> Self {
        let policy = *self.evaluator.policy();
        self.evaluator = RuleEvaluator::with_cooldowns(self.store.clone(), policy, cooldowns);
        self
    }

    pub fn cooldowns(&self) -> &CooldownTracker {
        self.evaluator.cooldowns()
    }

    pub fn last_cycle(&self) -> Option<&CycleSummary> {
        self.last_cycle.as_ref()
    }

    /// Evaluate every enabled rule once.
    ///
    /// Always returns; the list holds the alarms created in this cycle, in
    /// creation order.
    #[instrument(skip(self))]
    pub async fn run_cycle(&mut self) -> Vec<Alarm> {
        let now = self.clock.now();
        let mut summary = CycleSummary::started(now);

        let rules = match self.store.list_enabled_rules().await {
            Ok(rules) => rules,
            Err(e) => {
                error!("monitoring cycle aborted, could not load rules: {}", e);
                summary.error = Some(e.to_string());
                summary.finished_at = self.clock.now();
                self.last_cycle = Some(summary);
                return Vec::new();
            }
        };

        if rules.is_empty() {
            debug!("no enabled rules");
        }

        let mut alarms = Vec::new();
        for rule in &rules {
            summary.rules_evaluated += 1;

            match self.evaluator.check_rule(rule, now).await {
                Ok(RuleOutcome::Raised(alarm)) => alarms.push(alarm),
                Ok(RuleOutcome::CoolingDown) => summary.cooling_down += 1,
                Ok(RuleOutcome::NoViolation) => {}
                Err(e) => {
                    summary.failed += 1;
                    warn!("rule {} ({}) evaluation failed: {}", rule.id, rule.name, e);
                }
            }
        }

        summary.alarms_raised = alarms.len();
        summary.finished_at = self.clock.now();

        info!(
            "monitoring cycle complete: {} rules, {} alarms, {} cooling down, {} failed",
            summary.rules_evaluated, summary.alarms_raised, summary.cooling_down, summary.failed
        );

        self.last_cycle = Some(summary);
        alarms
    }

    /// Check one rule on demand under the same cooldown protocol as a cycle.
    ///
    /// Unknown and disabled rules yield `None`, as do failures (which are
    /// logged).
    #[instrument(skip(self))]
    pub async fn check_rule_by_id(&mut self, rule_id: i64) -> Option<Alarm> {
        let rule = match self.store.get_rule(rule_id).await {
            Ok(Some(rule)) if rule.enabled => rule,
            Ok(_) => {
                debug!("rule {} does not exist or is disabled", rule_id);
                return None;
            }
            Err(e) => {
                warn!("could not load rule {}: {}", rule_id, e);
                return None;
            }
        };

        match self.evaluator.check_rule(&rule, self.clock.now()).await {
            Ok(RuleOutcome::Raised(alarm)) => Some(alarm),
            Ok(_) => None,
            Err(e) => {
                warn!("rule {} ({}) evaluation failed: {}", rule.id, rule.name, e);
                None
            }
        }
    }

    /// Read-only status for operators; never used for decisions
    pub async fn status(&self) -> MonitoringStatus {
        let now = self.clock.now();
        let recent_window =
            Duration::minutes(i64::from(self.evaluator.policy().recent_metrics_minutes));

        let counts = async {
            let enabled_rules = self.store.list_enabled_rules().await?.len();
            let recent_metrics = self.store.count_metrics_since(now - recent_window).await?;
            Ok::<_, StorageError>((enabled_rules, recent_metrics))
        }
        .await;

        let (enabled_rules, recent_metrics, error) = match counts {
            Ok((rules, metrics)) => (
                rules,
                metrics,
                self.last_cycle.as_ref().and_then(|c| c.error.clone()),
            ),
            Err(e) => {
                warn!("monitoring status incomplete: {}", e);
                (0, 0, Some(e.to_string()))
            }
        };

        MonitoringStatus {
            enabled_rules,
            last_check: self.last_cycle.as_ref().map(|c| c.started_at),
            recent_metrics,
            active_cooldowns: self.evaluator.cooldowns().active_count(now),
            last_cycle: self.last_cycle.clone(),
            error,
        }
    }
}
