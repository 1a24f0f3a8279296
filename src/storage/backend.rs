//! Storage backend trait definition
//!
//! Every collaborator the monitoring cycle reads from or writes to is
//! reachable through this one trait.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::error::StorageResult;
use super::schema::{
    Alarm, AlarmDraft, NewMetricSample, NewRule, ServiceWorker, SystemMetricSample,
    ThresholdRule, WorkerReport,
};

/// Health status of the storage backend
#[derive(Debug, Clone)]
pub struct HealthStatus {
    /// Is the backend operational?
    pub healthy: bool,

    /// Human-readable status message
    pub message: String,

    /// Additional backend-specific metadata
    pub metadata: HashMap<String, String>,
}

/// Trait for storage backends
///
/// ## Thread Safety
///
/// Implementations must be `Send + Sync`; the monitor actor and the HTTP
/// handlers share one backend behind an `Arc`.
///
/// ## Error Handling
///
/// Methods return `StorageResult<T>`. Implementations convert driver errors
/// to `StorageError` variants and map unreadable stored values to
/// `StorageError::InvalidData`.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    // ========================================================================
    // Threshold rules
    // ========================================================================

    /// Persist a new rule and return it with its assigned id.
    ///
    /// Callers validate the rule first; the store accepts what it is given.
    async fn insert_rule(
        &self,
        rule: NewRule,
        now: DateTime<Utc>,
    ) -> StorageResult<ThresholdRule>;

    /// All rules, ordered by id
    async fn list_rules(&self) -> StorageResult<Vec<ThresholdRule>>;

    /// Enabled rules in monitoring order: severity descending, then id
    async fn list_enabled_rules(&self) -> StorageResult<Vec<ThresholdRule>>;

    async fn get_rule(&self, id: i64) -> StorageResult<Option<ThresholdRule>>;

    /// Enable or disable a rule. Fails with `NotFound` for an unknown id.
    async fn set_rule_enabled(
        &self,
        id: i64,
        enabled: bool,
        now: DateTime<Utc>,
    ) -> StorageResult<ThresholdRule>;

    // ========================================================================
    // Metric samples
    // ========================================================================

    /// Store one sample and return its id
    async fn insert_metric(&self, sample: NewMetricSample) -> StorageResult<i64>;

    /// Samples with `timestamp >= since`, newest first
    async fn query_metrics_since(
        &self,
        since: DateTime<Utc>,
    ) -> StorageResult<Vec<SystemMetricSample>>;

    async fn count_metrics_since(&self, since: DateTime<Utc>) -> StorageResult<usize>;

    /// Delete samples older than `before`; returns how many were removed.
    async fn cleanup_old_metrics(&self, before: DateTime<Utc>) -> StorageResult<usize>;

    // ========================================================================
    // Service workers
    // ========================================================================

    /// Register or update a worker by name.
    ///
    /// `last_updated` only moves to `at` when the reported status or enabled
    /// flag differs from what is stored, so a worker that keeps reporting
    /// "inactive" keeps accumulating inactivity time.
    async fn upsert_worker(
        &self,
        report: WorkerReport,
        at: DateTime<Utc>,
    ) -> StorageResult<ServiceWorker>;

    async fn list_workers(&self) -> StorageResult<Vec<ServiceWorker>>;

    /// Monitored workers whose status is inactive and whose `last_updated`
    /// is strictly before `cutoff`, optionally restricted to one name, ordered
    /// by id.
    async fn query_inactive_workers(
        &self,
        cutoff: DateTime<Utc>,
        name: Option<&str>,
    ) -> StorageResult<Vec<ServiceWorker>>;

    // ========================================================================
    // Alarms
    // ========================================================================

    async fn create_alarm(&self, draft: AlarmDraft) -> StorageResult<Alarm>;

    /// Alarms newest first; `active_only` keeps those with `is_active` set.
    async fn list_alarms(&self, active_only: bool) -> StorageResult<Vec<Alarm>>;

    async fn acknowledge_alarm(&self, id: i64, at: DateTime<Utc>) -> StorageResult<Alarm>;

    async fn resolve_alarm(&self, id: i64, at: DateTime<Utc>) -> StorageResult<Alarm>;

    // ========================================================================
    // Maintenance
    // ========================================================================

    /// Lightweight check that the backend can serve requests
    async fn health_check(&self) -> StorageResult<HealthStatus>;

    /// Human-readable stats (row counts)
    async fn get_stats(&self) -> StorageResult<String>;

    /// Close the backend and release resources
    async fn close(&self) -> StorageResult<()>;
}
