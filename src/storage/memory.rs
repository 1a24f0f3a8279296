//! In-memory storage backend (no persistence)
//!
//! Useful for:
//! - Testing without database dependencies
//! - Running the hub without a database file
//!
//! ## Fault injection
//!
//! Tests can make individual operations fail with
//! [`MemoryBackend::inject_fault`] to exercise the monitor's error paths
//! (a failing metric query, a failing alarm write, an unreachable rule store).

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::debug;

use super::backend::{HealthStatus, StorageBackend};
use super::error::{StorageError, StorageResult};
use super::schema::{
    Alarm, AlarmDraft, NewMetricSample, NewRule, ServiceWorker, SystemMetricSample,
    ThresholdRule, WorkerReport, monitoring_order,
};

/// Operations that can be forced to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultPoint {
    /// `list_rules`, `list_enabled_rules` and `get_rule`
    ListRules,

    /// `query_metrics_since` and `count_metrics_since`
    QueryMetrics,

    /// `query_inactive_workers`
    QueryWorkers,

    /// `create_alarm`
    CreateAlarm,
}

#[derive(Default)]
struct MemoryState {
    rules: BTreeMap<i64, ThresholdRule>,
    metrics: Vec<SystemMetricSample>,
    workers: BTreeMap<i64, ServiceWorker>,
    alarms: BTreeMap<i64, Alarm>,
    last_rule_id: i64,
    last_metric_id: i64,
    last_worker_id: i64,
    last_alarm_id: i64,
}

fn next_id(counter: &mut i64) -> i64 {
    *counter += 1;
    *counter
}

/// In-memory storage backend
pub struct MemoryBackend {
    state: RwLock<MemoryState>,
    faults: Mutex<HashSet<FaultPoint>>,
}

impl MemoryBackend {
    /// Create a new in-memory backend
    pub fn new() -> Self {
        Self {
            state: RwLock::new(MemoryState::default()),
            faults: Mutex::new(HashSet::new()),
        }
    }

    /// Make every call covered by `point` fail with `StorageError::Unavailable`
    pub fn inject_fault(&self, point: FaultPoint) {
        if let Ok(mut faults) = self.faults.lock() {
            faults.insert(point);
        }
    }

    pub fn clear_faults(&self) {
        if let Ok(mut faults) = self.faults.lock() {
            faults.clear();
        }
    }

    fn check_fault(&self, point: FaultPoint) -> StorageResult<()> {
        let faults = self
            .faults
            .lock()
            .map_err(|_| StorageError::Unavailable("fault registry poisoned".to_string()))?;

        if faults.contains(&point) {
            return Err(StorageError::Unavailable(format!(
                "injected fault at {:?}",
                point
            )));
        }

        Ok(())
    }

    async fn update_alarm<F>(&self, id: i64, transition: F) -> StorageResult<Alarm>
    where
        F: FnOnce(&mut Alarm) -> StorageResult<()> + Send,
    {
        let mut state = self.state.write().await;
        let alarm = state
            .alarms
            .get_mut(&id)
            .ok_or_else(|| StorageError::NotFound(format!("alarm {}", id)))?;

        transition(alarm)?;
        Ok(alarm.clone())
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    async fn insert_rule(
        &self,
        rule: NewRule,
        now: DateTime<Utc>,
    ) -> StorageResult<ThresholdRule> {
        let mut state = self.state.write().await;
        let id = next_id(&mut state.last_rule_id);
        let rule = rule.into_rule(id, now);

        debug!("in-memory backend: inserted rule {} ({})", id, rule.name);
        state.rules.insert(id, rule.clone());
        Ok(rule)
    }

    async fn list_rules(&self) -> StorageResult<Vec<ThresholdRule>> {
        self.check_fault(FaultPoint::ListRules)?;
        let state = self.state.read().await;
        Ok(state.rules.values().cloned().collect())
    }

    async fn list_enabled_rules(&self) -> StorageResult<Vec<ThresholdRule>> {
        self.check_fault(FaultPoint::ListRules)?;
        let state = self.state.read().await;

        let mut rules: Vec<ThresholdRule> =
            state.rules.values().filter(|r| r.enabled).cloned().collect();
        rules.sort_by(monitoring_order);
        Ok(rules)
    }

    async fn get_rule(&self, id: i64) -> StorageResult<Option<ThresholdRule>> {
        self.check_fault(FaultPoint::ListRules)?;
        let state = self.state.read().await;
        Ok(state.rules.get(&id).cloned())
    }

    async fn set_rule_enabled(
        &self,
        id: i64,
        enabled: bool,
        now: DateTime<Utc>,
    ) -> StorageResult<ThresholdRule> {
        let mut state = self.state.write().await;
        let rule = state
            .rules
            .get_mut(&id)
            .ok_or_else(|| StorageError::NotFound(format!("rule {}", id)))?;

        rule.enabled = enabled;
        rule.updated_at = now;
        Ok(rule.clone())
    }

    async fn insert_metric(&self, sample: NewMetricSample) -> StorageResult<i64> {
        let mut state = self.state.write().await;
        let id = next_id(&mut state.last_metric_id);
        state.metrics.push(sample.into_sample(id));
        Ok(id)
    }

    async fn query_metrics_since(
        &self,
        since: DateTime<Utc>,
    ) -> StorageResult<Vec<SystemMetricSample>> {
        self.check_fault(FaultPoint::QueryMetrics)?;
        let state = self.state.read().await;

        let mut samples: Vec<SystemMetricSample> = state
            .metrics
            .iter()
            .filter(|s| s.timestamp >= since)
            .cloned()
            .collect();
        samples.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.id.cmp(&a.id)));

        debug!("in-memory backend: {} samples since {}", samples.len(), since);
        Ok(samples)
    }

    async fn count_metrics_since(&self, since: DateTime<Utc>) -> StorageResult<usize> {
        self.check_fault(FaultPoint::QueryMetrics)?;
        let state = self.state.read().await;
        Ok(state
            .metrics
            .iter()
            .filter(|s| s.timestamp >= since)
            .count())
    }

    async fn cleanup_old_metrics(&self, before: DateTime<Utc>) -> StorageResult<usize> {
        let mut state = self.state.write().await;
        let previous = state.metrics.len();
        state.metrics.retain(|s| s.timestamp >= before);
        Ok(previous - state.metrics.len())
    }

    async fn upsert_worker(
        &self,
        report: WorkerReport,
        at: DateTime<Utc>,
    ) -> StorageResult<ServiceWorker> {
        let mut state = self.state.write().await;

        if let Some(worker) = state.workers.values_mut().find(|w| w.name == report.name) {
            if report.changes(worker) {
                worker.status = report.status;
                worker.enabled = report.enabled;
                worker.last_updated = at;
            }
            return Ok(worker.clone());
        }

        let id = next_id(&mut state.last_worker_id);
        let worker = ServiceWorker {
            id,
            name: report.name,
            status: report.status,
            monitoring: true,
            enabled: report.enabled,
            last_updated: at,
            created_at: at,
        };
        state.workers.insert(id, worker.clone());
        Ok(worker)
    }

    async fn list_workers(&self) -> StorageResult<Vec<ServiceWorker>> {
        let state = self.state.read().await;
        Ok(state.workers.values().cloned().collect())
    }

    async fn query_inactive_workers(
        &self,
        cutoff: DateTime<Utc>,
        name: Option<&str>,
    ) -> StorageResult<Vec<ServiceWorker>> {
        self.check_fault(FaultPoint::QueryWorkers)?;
        let state = self.state.read().await;

        Ok(state
            .workers
            .values()
            .filter(|w| w.monitoring && w.status.is_inactive() && w.last_updated < cutoff)
            .filter(|w| name.is_none_or(|n| w.name == n))
            .cloned()
            .collect())
    }

    async fn create_alarm(&self, draft: AlarmDraft) -> StorageResult<Alarm> {
        self.check_fault(FaultPoint::CreateAlarm)?;
        let mut state = self.state.write().await;
        let id = next_id(&mut state.last_alarm_id);
        let alarm = Alarm::from_draft(id, draft);

        debug!("in-memory backend: created alarm {} ({})", id, alarm.title);
        state.alarms.insert(id, alarm.clone());
        Ok(alarm)
    }

    async fn list_alarms(&self, active_only: bool) -> StorageResult<Vec<Alarm>> {
        let state = self.state.read().await;

        let mut alarms: Vec<Alarm> = state
            .alarms
            .values()
            .filter(|a| !active_only || a.is_active)
            .cloned()
            .collect();
        alarms.sort_by(|a, b| b.triggered_at.cmp(&a.triggered_at).then(b.id.cmp(&a.id)));
        Ok(alarms)
    }

    async fn acknowledge_alarm(&self, id: i64, at: DateTime<Utc>) -> StorageResult<Alarm> {
        self.update_alarm(id, |alarm| alarm.acknowledge(at)).await
    }

    async fn resolve_alarm(&self, id: i64, at: DateTime<Utc>) -> StorageResult<Alarm> {
        self.update_alarm(id, |alarm| alarm.resolve(at)).await
    }

    async fn health_check(&self) -> StorageResult<HealthStatus> {
        let state = self.state.read().await;

        Ok(HealthStatus {
            healthy: true,
            message: "In-memory storage operational".to_string(),
            metadata: HashMap::from([
                ("backend".to_string(), "memory".to_string()),
                ("rules".to_string(), state.rules.len().to_string()),
                ("metrics".to_string(), state.metrics.len().to_string()),
            ]),
        })
    }

    async fn get_stats(&self) -> StorageResult<String> {
        let state = self.state.read().await;
        Ok(format!(
            "In-Memory: {} rules, {} metric samples, {} workers, {} alarms",
            state.rules.len(),
            state.metrics.len(),
            state.workers.len(),
            state.alarms.len()
        ))
    }

    async fn close(&self) -> StorageResult<()> {
        debug!("in-memory backend closed");
        Ok(())
    }
}
