//! Domain records shared by every storage backend
//!
//! ## Boundary parsing
//!
//! Everything that arrives as loosely typed text (rule enums, worker status,
//! disk usage JSON, agent timestamps) is parsed exactly once here, when a row
//! is read or a payload is deserialized. The monitoring core only ever sees
//! closed enums and `DateTime<Utc>` instants:
//!
//! - enum values are matched case-insensitively (`"CPU"`, `"cpu"`, `" Cpu "`)
//! - naive agent timestamps (no offset) are interpreted as UTC
//! - an unparseable disk usage payload becomes [`DiskUsage::Malformed`]
//!   instead of an error, so one bad sample never poisons a rule evaluation

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use super::error::StorageError;

/// Shortest persistence window a rule may require
pub const MIN_DURATION_MINUTES: u32 = 1;

/// Longest persistence window a rule may require
pub const MAX_DURATION_MINUTES: u32 = 60;

/// Upper bound for the per-rule spam suppression window
pub const MAX_COOLDOWN_MINUTES: u32 = 120;

/// Cooldown applied when a rule does not specify one
pub const DEFAULT_COOLDOWN_MINUTES: u32 = 5;

const PERCENT_RANGE: RangeInclusive<f64> = 0.0..=100.0;

/// Error returned when a stored or submitted enum value is unknown
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseEnumError {
    kind: &'static str,
    value: String,
}

impl ParseEnumError {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

impl fmt::Display for ParseEnumError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown {}: {:?}", self.kind, self.value)
    }
}

impl std::error::Error for ParseEnumError {}

impl From<ParseEnumError> for StorageError {
    fn from(err: ParseEnumError) -> Self {
        StorageError::InvalidData(err.to_string())
    }
}

fn normalize(raw: &str) -> String {
    raw.trim().to_ascii_lowercase()
}

// ============================================================================
// Rule enums
// ============================================================================

/// What a threshold rule watches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", try_from = "String")]
pub enum RuleMetric {
    Cpu,
    Memory,
    Disk,
    /// Threshold value is an inactivity duration in minutes, not a percentage
    ServiceWorkerInactive,
}

impl RuleMetric {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleMetric::Cpu => "cpu",
            RuleMetric::Memory => "memory",
            RuleMetric::Disk => "disk",
            RuleMetric::ServiceWorkerInactive => "service_worker_inactive",
        }
    }

    /// Upper-case label used in alarm descriptions
    pub fn label(&self) -> &'static str {
        match self {
            RuleMetric::Cpu => "CPU",
            RuleMetric::Memory => "MEMORY",
            RuleMetric::Disk => "DISK",
            RuleMetric::ServiceWorkerInactive => "SERVICE_WORKER_INACTIVE",
        }
    }

    /// CPU, memory and disk rules are evaluated against metric samples
    pub fn is_resource(&self) -> bool {
        !matches!(self, RuleMetric::ServiceWorkerInactive)
    }
}

impl fmt::Display for RuleMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RuleMetric {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "cpu" => Ok(RuleMetric::Cpu),
            "memory" => Ok(RuleMetric::Memory),
            "disk" => Ok(RuleMetric::Disk),
            "service_worker_inactive" => Ok(RuleMetric::ServiceWorkerInactive),
            _ => Err(ParseEnumError::new("metric type", s)),
        }
    }
}

impl TryFrom<String> for RuleMetric {
    type Error = ParseEnumError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Comparison applied to each sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", try_from = "String")]
pub enum Condition {
    GreaterThan,
    LessThan,
    /// Within the configured tolerance of the threshold
    Equals,
}

impl Condition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Condition::GreaterThan => "greater_than",
            Condition::LessThan => "less_than",
            Condition::Equals => "equals",
        }
    }

    /// Verb used in alarm descriptions
    pub fn verb(&self) -> &'static str {
        match self {
            Condition::GreaterThan => "exceeded",
            Condition::LessThan => "below",
            Condition::Equals => "equals",
        }
    }

    /// Whether `value` breaches `threshold` under this condition
    pub fn is_violated_by(&self, value: f64, threshold: f64, equals_tolerance: f64) -> bool {
        match self {
            Condition::GreaterThan => value > threshold,
            Condition::LessThan => value < threshold,
            Condition::Equals => (value - threshold).abs() <= equals_tolerance,
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Condition {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "greater_than" => Ok(Condition::GreaterThan),
            "less_than" => Ok(Condition::LessThan),
            "equals" => Ok(Condition::Equals),
            _ => Err(ParseEnumError::new("condition", s)),
        }
    }
}

impl TryFrom<String> for Condition {
    type Error = ParseEnumError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Severity of a rule and of the alarms it raises
///
/// Variants are declared in ascending order so `Ord` ranks `Critical` highest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", try_from = "String")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "low" => Ok(Severity::Low),
            "medium" => Ok(Severity::Medium),
            "high" => Ok(Severity::High),
            "critical" => Ok(Severity::Critical),
            _ => Err(ParseEnumError::new("severity", s)),
        }
    }
}

impl TryFrom<String> for Severity {
    type Error = ParseEnumError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

// ============================================================================
// Threshold rules
// ============================================================================

/// An operator-defined threshold rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdRule {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub metric_type: RuleMetric,
    pub condition: Condition,

    /// Percentage (0-100) for resource metrics, minutes for worker inactivity
    pub threshold_value: f64,

    /// Required persistence window
    pub duration_minutes: u32,

    pub severity: Severity,
    pub enabled: bool,

    /// Exact worker name (only meaningful for `ServiceWorkerInactive`)
    pub source_filter: Option<String>,

    pub cooldown_minutes: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ThresholdRule {
    pub fn duration(&self) -> Duration {
        Duration::minutes(i64::from(self.duration_minutes))
    }

    pub fn cooldown(&self) -> Duration {
        Duration::minutes(i64::from(self.cooldown_minutes))
    }

    /// The threshold value read as a span of minutes (worker inactivity rules)
    pub fn inactivity_threshold(&self) -> Duration {
        fractional_minutes(self.threshold_value)
    }

    /// The source filter, ignoring blank strings
    pub fn worker_filter(&self) -> Option<&str> {
        self.source_filter
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
    }

    pub fn validate(&self) -> Result<(), String> {
        check_rule_bounds(
            self.metric_type,
            self.threshold_value,
            self.duration_minutes,
            self.cooldown_minutes,
        )
    }
}

/// Order in which a monitoring cycle evaluates rules: most severe first,
/// ties broken by id so the order is stable for a given snapshot.
pub fn monitoring_order(a: &ThresholdRule, b: &ThresholdRule) -> Ordering {
    b.severity.cmp(&a.severity).then(a.id.cmp(&b.id))
}

/// Convert a (possibly fractional) number of minutes into a duration
pub fn fractional_minutes(minutes: f64) -> Duration {
    Duration::milliseconds((minutes * 60_000.0).round() as i64)
}

fn check_rule_bounds(
    metric: RuleMetric,
    threshold_value: f64,
    duration_minutes: u32,
    cooldown_minutes: u32,
) -> Result<(), String> {
    if !threshold_value.is_finite() {
        return Err("threshold value must be a finite number".to_string());
    }

    if metric.is_resource() && !PERCENT_RANGE.contains(&threshold_value) {
        return Err(format!(
            "threshold value for {metric} must be between 0 and 100, got {threshold_value}"
        ));
    }

    if !metric.is_resource() && threshold_value < 0.0 {
        return Err(format!(
            "inactivity threshold must be a non-negative number of minutes, got {threshold_value}"
        ));
    }

    if !(MIN_DURATION_MINUTES..=MAX_DURATION_MINUTES).contains(&duration_minutes) {
        return Err(format!(
            "duration must be between {MIN_DURATION_MINUTES} and {MAX_DURATION_MINUTES} minutes, got {duration_minutes}"
        ));
    }

    if cooldown_minutes > MAX_COOLDOWN_MINUTES {
        return Err(format!(
            "cooldown must be between 0 and {MAX_COOLDOWN_MINUTES} minutes, got {cooldown_minutes}"
        ));
    }

    Ok(())
}

fn default_condition() -> Condition {
    Condition::GreaterThan
}

fn default_duration() -> u32 {
    MIN_DURATION_MINUTES
}

fn default_severity() -> Severity {
    Severity::Medium
}

fn default_cooldown() -> u32 {
    DEFAULT_COOLDOWN_MINUTES
}

fn default_true() -> bool {
    true
}

/// A rule as submitted for creation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewRule {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub metric_type: RuleMetric,
    #[serde(default = "default_condition")]
    pub condition: Condition,
    pub threshold_value: f64,
    #[serde(default = "default_duration")]
    pub duration_minutes: u32,
    #[serde(default = "default_severity")]
    pub severity: Severity,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub source_filter: Option<String>,
    #[serde(default = "default_cooldown")]
    pub cooldown_minutes: u32,
}

impl NewRule {
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("rule name must not be empty".to_string());
        }
        check_rule_bounds(
            self.metric_type,
            self.threshold_value,
            self.duration_minutes,
            self.cooldown_minutes,
        )
    }

    pub fn into_rule(self, id: i64, now: DateTime<Utc>) -> ThresholdRule {
        ThresholdRule {
            id,
            name: self.name,
            description: self.description,
            metric_type: self.metric_type,
            condition: self.condition,
            threshold_value: self.threshold_value,
            duration_minutes: self.duration_minutes,
            severity: self.severity,
            enabled: self.enabled,
            source_filter: self.source_filter,
            cooldown_minutes: self.cooldown_minutes,
            created_at: now,
            updated_at: now,
        }
    }
}

// ============================================================================
// Metric samples
// ============================================================================

/// Usage figures for one mount point
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MountUsage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub used: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub free: Option<u64>,
    #[serde(default)]
    pub percent: f64,
}

impl MountUsage {
    /// Read one mount entry; entries that are not objects or whose percent is
    /// not a number are skipped by the caller.
    fn from_value(value: &Value) -> Option<Self> {
        let entry = value.as_object()?;
        let percent = match entry.get("percent") {
            None | Some(Value::Null) => 0.0,
            Some(v) => v.as_f64()?,
        };

        Some(Self {
            used: entry.get("used").and_then(Value::as_u64),
            free: entry.get("free").and_then(Value::as_u64),
            percent,
        })
    }
}

/// Per-mount disk usage of one sample
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DiskUsage {
    Mounts(BTreeMap<String, MountUsage>),

    /// The stored payload could not be read as a mount map; the raw text is kept
    Malformed(String),
}

impl Default for DiskUsage {
    fn default() -> Self {
        DiskUsage::Mounts(BTreeMap::new())
    }
}

impl DiskUsage {
    /// Parse the stored JSON text. Never fails.
    pub fn parse(raw: &str) -> Self {
        if raw.trim().is_empty() {
            return DiskUsage::default();
        }

        match serde_json::from_str::<Value>(raw) {
            Ok(value) => {
                Self::from_value(&value).unwrap_or_else(|| DiskUsage::Malformed(raw.to_string()))
            }
            Err(_) => DiskUsage::Malformed(raw.to_string()),
        }
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Null => Some(DiskUsage::default()),
            Value::Object(map) => Some(DiskUsage::Mounts(
                map.iter()
                    .filter_map(|(mount, entry)| {
                        MountUsage::from_value(entry).map(|usage| (mount.clone(), usage))
                    })
                    .collect(),
            )),
            _ => None,
        }
    }

    /// Highest usage percentage across mounts; `None` when there is nothing
    /// usable to compare.
    pub fn max_percent(&self) -> Option<f64> {
        match self {
            DiskUsage::Mounts(mounts) => mounts
                .values()
                .map(|usage| usage.percent)
                .fold(None, |max, percent| {
                    Some(max.map_or(percent, |m: f64| m.max(percent)))
                }),
            DiskUsage::Malformed(_) => None,
        }
    }

    /// Text form written to the database
    pub fn to_json_string(&self) -> String {
        match self {
            DiskUsage::Mounts(mounts) => {
                serde_json::to_string(mounts).unwrap_or_else(|_| "{}".to_string())
            }
            DiskUsage::Malformed(raw) => raw.clone(),
        }
    }
}

impl<'de> Deserialize<'de> for DiskUsage {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(match value {
            Value::String(raw) => DiskUsage::parse(&raw),
            other => DiskUsage::from_value(&other)
                .unwrap_or_else(|| DiskUsage::Malformed(other.to_string())),
        })
    }
}

/// One stored system metric sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemMetricSample {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub cpu_percent: Option<f64>,
    pub memory_percent: Option<f64>,
    pub memory_available: Option<u64>,
    pub disk_usage: DiskUsage,
}

impl SystemMetricSample {
    /// The scalar a rule of the given metric type compares.
    ///
    /// Missing CPU/memory readings count as 0. Disk yields `None` when the
    /// usage map is empty or malformed; such a sample never violates.
    pub fn value_for(&self, metric: RuleMetric) -> Option<f64> {
        match metric {
            RuleMetric::Cpu => Some(self.cpu_percent.unwrap_or(0.0)),
            RuleMetric::Memory => Some(self.memory_percent.unwrap_or(0.0)),
            RuleMetric::Disk => self.disk_usage.max_percent(),
            RuleMetric::ServiceWorkerInactive => None,
        }
    }
}

/// A metric sample as reported by an agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewMetricSample {
    #[serde(with = "utc_lenient")]
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub cpu_percent: Option<f64>,
    #[serde(default)]
    pub memory_percent: Option<f64>,
    #[serde(default)]
    pub memory_available: Option<u64>,
    #[serde(default)]
    pub disk_usage: DiskUsage,
}

impl NewMetricSample {
    pub fn into_sample(self, id: i64) -> SystemMetricSample {
        SystemMetricSample {
            id,
            timestamp: self.timestamp,
            cpu_percent: self.cpu_percent,
            memory_percent: self.memory_percent,
            memory_available: self.memory_available,
            disk_usage: self.disk_usage,
        }
    }
}

// ============================================================================
// Service workers
// ============================================================================

/// Reported worker status. Only `Inactive` has meaning to the monitor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum WorkerStatus {
    Active,
    Inactive,
    Other(String),
}

impl WorkerStatus {
    pub fn as_str(&self) -> &str {
        match self {
            WorkerStatus::Active => "active",
            WorkerStatus::Inactive => "inactive",
            WorkerStatus::Other(status) => status,
        }
    }

    pub fn is_inactive(&self) -> bool {
        matches!(self, WorkerStatus::Inactive)
    }
}

impl From<String> for WorkerStatus {
    fn from(value: String) -> Self {
        match normalize(&value).as_str() {
            "active" => WorkerStatus::Active,
            "inactive" => WorkerStatus::Inactive,
            _ => WorkerStatus::Other(value),
        }
    }
}

impl From<&str> for WorkerStatus {
    fn from(value: &str) -> Self {
        WorkerStatus::from(value.to_string())
    }
}

impl From<WorkerStatus> for String {
    fn from(value: WorkerStatus) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for WorkerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A monitored service worker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceWorker {
    pub id: i64,
    pub name: String,
    pub status: WorkerStatus,

    /// Whether inactivity rules consider this worker
    pub monitoring: bool,

    pub enabled: bool,

    /// Last time the reported state changed
    pub last_updated: DateTime<Utc>,

    pub created_at: DateTime<Utc>,
}

/// Worker state as reported by an agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerReport {
    pub name: String,
    pub status: WorkerStatus,
    #[serde(default = "default_true", deserialize_with = "lenient_bool")]
    pub enabled: bool,
}

impl WorkerReport {
    /// Whether applying this report to `worker` changes its reported state
    pub fn changes(&self, worker: &ServiceWorker) -> bool {
        worker.status != self.status || worker.enabled != self.enabled
    }
}

/// Agents send worker flags as JSON booleans or as strings
fn lenient_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Bool(flag) => Ok(flag),
        Value::Null => Ok(true),
        Value::Number(n) => Ok(n.as_f64().is_some_and(|v| v != 0.0)),
        Value::String(raw) => match normalize(&raw).as_str() {
            "true" | "1" | "yes" | "on" => Ok(true),
            "false" | "0" | "no" | "off" | "" => Ok(false),
            _ => Err(serde::de::Error::custom(format!(
                "invalid boolean flag: {raw:?}"
            ))),
        },
        other => Err(serde::de::Error::custom(format!(
            "invalid boolean flag: {other}"
        ))),
    }
}

// ============================================================================
// Alarms
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", try_from = "String")]
pub enum AlarmStatus {
    Active,
    Acknowledged,
    Resolved,
}

impl AlarmStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlarmStatus::Active => "active",
            AlarmStatus::Acknowledged => "acknowledged",
            AlarmStatus::Resolved => "resolved",
        }
    }
}

impl fmt::Display for AlarmStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AlarmStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "active" => Ok(AlarmStatus::Active),
            "acknowledged" => Ok(AlarmStatus::Acknowledged),
            "resolved" => Ok(AlarmStatus::Resolved),
            _ => Err(ParseEnumError::new("alarm status", s)),
        }
    }
}

impl TryFrom<String> for AlarmStatus {
    type Error = ParseEnumError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Subsystem that produced an alarm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", try_from = "String")]
pub enum AlarmSource {
    ThresholdMonitor,
    ServiceWorkerMonitor,
}

impl AlarmSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlarmSource::ThresholdMonitor => "threshold_monitor",
            AlarmSource::ServiceWorkerMonitor => "service_worker_monitor",
        }
    }
}

impl fmt::Display for AlarmSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AlarmSource {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "threshold_monitor" => Ok(AlarmSource::ThresholdMonitor),
            "service_worker_monitor" => Ok(AlarmSource::ServiceWorkerMonitor),
            _ => Err(ParseEnumError::new("alarm source", s)),
        }
    }
}

impl TryFrom<String> for AlarmSource {
    type Error = ParseEnumError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// A detected violation that has not been persisted yet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlarmDraft {
    pub title: String,
    pub description: String,
    pub severity: Severity,
    pub source: AlarmSource,

    /// Rule id or worker id, depending on `source`
    pub source_id: String,

    pub triggered_at: DateTime<Utc>,
}

/// A persisted alarm
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alarm {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub severity: Severity,
    pub status: AlarmStatus,
    pub source: AlarmSource,
    pub source_id: String,
    pub is_active: bool,
    pub triggered_at: DateTime<Utc>,
    pub acknowledged_at: Option<DateTime<Utc>>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl Alarm {
    pub fn from_draft(id: i64, draft: AlarmDraft) -> Self {
        Self {
            id,
            title: draft.title,
            description: draft.description,
            severity: draft.severity,
            status: AlarmStatus::Active,
            source: draft.source,
            source_id: draft.source_id,
            is_active: true,
            triggered_at: draft.triggered_at,
            acknowledged_at: None,
            resolved_at: None,
        }
    }

    /// ACTIVE → ACKNOWLEDGED. Acknowledging twice keeps the first timestamp.
    pub fn acknowledge(&mut self, at: DateTime<Utc>) -> Result<(), StorageError> {
        match self.status {
            AlarmStatus::Active => {
                self.status = AlarmStatus::Acknowledged;
                self.acknowledged_at = Some(at);
                Ok(())
            }
            AlarmStatus::Acknowledged => Ok(()),
            AlarmStatus::Resolved => Err(StorageError::InvalidTransition(format!(
                "alarm {} is already resolved",
                self.id
            ))),
        }
    }

    /// ACTIVE/ACKNOWLEDGED → RESOLVED. Resolved alarms are never reopened.
    pub fn resolve(&mut self, at: DateTime<Utc>) -> Result<(), StorageError> {
        if self.status == AlarmStatus::Resolved {
            return Err(StorageError::InvalidTransition(format!(
                "alarm {} is already resolved",
                self.id
            )));
        }

        self.status = AlarmStatus::Resolved;
        self.is_active = false;
        self.resolved_at = Some(at);
        Ok(())
    }
}

// ============================================================================
// Timestamps
// ============================================================================

/// Serde adapter accepting RFC 3339 and naive ISO-8601 timestamps.
///
/// Naive timestamps carry no offset; agents report UTC, so they are taken as
/// UTC here and nowhere else.
pub mod utc_lenient {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

    pub fn parse(raw: &str) -> Option<DateTime<Utc>> {
        let raw = raw.trim();
        if let Ok(aware) = DateTime::parse_from_rfc3339(raw) {
            return Some(aware.with_timezone(&Utc));
        }

        NAIVE_FORMATS
            .iter()
            .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
            .map(|naive| naive.and_utc())
    }

    pub fn serialize<S>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&value.to_rfc3339())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {raw}")))
    }
}
