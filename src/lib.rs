//! Threshold evaluation and alarm generation for agent-reported metrics.
//!
//! Agents push periodic reports (CPU, memory, disk usage and service worker
//! states). Operators configure threshold rules; a monitoring cycle evaluates
//! every enabled rule against the recent data and raises de-duplicated alarms.
//!
//! ## Layout
//!
//! - [`storage`]: the `StorageBackend` trait plus in-memory and SQLite backends
//!   for rules, metric samples, service workers and alarms
//! - [`monitor`]: the rule evaluator, cooldown tracker and cycle runner
//! - [`actors`]: the monitor actor that serializes every cycle trigger
//! - [`api`]: the axum HTTP surface (ingestion, manual trigger, status)
//! - [`config`]: hub configuration

pub mod actors;
pub mod api;
pub mod config;
pub mod monitor;
pub mod storage;

pub use monitor::{
    CooldownTracker, EvaluationPolicy, MonitoringCycleRunner, MonitoringStatus, RuleEvaluator,
    RuleOutcome,
};
pub use storage::schema::{
    Alarm, AlarmDraft, AlarmSource, AlarmStatus, Condition, RuleMetric, ServiceWorker, Severity,
    SystemMetricSample, ThresholdRule,
};
