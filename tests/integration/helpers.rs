//! Helper functions for integration tests

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use threshold_monitor::{
    EvaluationPolicy, MonitoringCycleRunner,
    monitor::ManualClock,
    storage::{
        StorageBackend,
        schema::{
            Condition, DiskUsage, NewMetricSample, NewRule, RuleMetric, Severity, WorkerReport,
            WorkerStatus,
        },
    },
};

pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 7, 20, 12, 0, 0).unwrap()
}

pub fn minutes_ago(minutes: i64) -> DateTime<Utc> {
    base_time() - Duration::minutes(minutes)
}

pub fn create_rule(
    name: &str,
    metric_type: RuleMetric,
    condition: Condition,
    threshold_value: f64,
    duration_minutes: u32,
) -> NewRule {
    NewRule {
        name: name.to_string(),
        description: None,
        metric_type,
        condition,
        threshold_value,
        duration_minutes,
        severity: Severity::Medium,
        enabled: true,
        source_filter: None,
        cooldown_minutes: 5,
    }
}

pub fn create_worker_rule(name: &str, threshold_minutes: f64, worker: Option<&str>) -> NewRule {
    NewRule {
        source_filter: worker.map(str::to_string),
        ..create_rule(
            name,
            RuleMetric::ServiceWorkerInactive,
            Condition::GreaterThan,
            threshold_minutes,
            1,
        )
    }
}

pub fn cpu_sample(at: DateTime<Utc>, cpu: f64) -> NewMetricSample {
    NewMetricSample {
        timestamp: at,
        cpu_percent: Some(cpu),
        memory_percent: None,
        memory_available: None,
        disk_usage: DiskUsage::default(),
    }
}

pub fn memory_sample(at: DateTime<Utc>, memory: f64) -> NewMetricSample {
    NewMetricSample {
        memory_percent: Some(memory),
        cpu_percent: None,
        ..cpu_sample(at, 0.0)
    }
}

pub fn disk_sample(at: DateTime<Utc>, raw_disk: &str) -> NewMetricSample {
    NewMetricSample {
        disk_usage: DiskUsage::parse(raw_disk),
        cpu_percent: None,
        ..cpu_sample(at, 0.0)
    }
}

pub fn inactive_report(name: &str) -> WorkerReport {
    WorkerReport {
        name: name.to_string(),
        status: WorkerStatus::Inactive,
        enabled: true,
    }
}

pub async fn insert_samples(store: &dyn StorageBackend, samples: Vec<NewMetricSample>) {
    for sample in samples {
        store.insert_metric(sample).await.unwrap();
    }
}

/// Runner whose clock starts at `base_time()`
pub fn create_runner(store: Arc<dyn StorageBackend>) -> (MonitoringCycleRunner, ManualClock) {
    let clock = ManualClock::new(base_time());
    let runner =
        MonitoringCycleRunner::with_clock(store, EvaluationPolicy::default(), Arc::new(clock.clone()));
    (runner, clock)
}
