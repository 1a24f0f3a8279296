//! Failure tests for the monitoring cycle
//!
//! These tests verify that the system handles failures gracefully:
//! - Store outages abort the cycle but never panic
//! - A failing rule does not block the others
//! - Failed alarm writes do not start a cooldown
//! - Malformed agent data is treated as non-violating

use std::sync::Arc;
use std::time::Duration as StdDuration;

use threshold_monitor::{
    Condition, RuleMetric, Severity,
    actors::{MonitorHandle, MonitorSettings},
    storage::{MemoryBackend, StorageBackend, memory::FaultPoint, schema::NewRule},
};

use crate::helpers::*;

async fn store_with_cpu_violation() -> Arc<MemoryBackend> {
    let store = Arc::new(MemoryBackend::new());
    store
        .insert_rule(
            create_rule("cpu high", RuleMetric::Cpu, Condition::GreaterThan, 80.0, 5),
            base_time(),
        )
        .await
        .unwrap();
    insert_samples(
        &*store,
        (0..4).map(|i| cpu_sample(minutes_ago(i), 93.0)).collect(),
    )
    .await;
    store
}

#[tokio::test]
async fn test_rule_store_outage_aborts_cycle() {
    let store = store_with_cpu_violation().await;
    store.inject_fault(FaultPoint::ListRules);

    let (mut runner, _clock) = create_runner(store.clone());
    assert!(runner.run_cycle().await.is_empty());

    let summary = runner.last_cycle().unwrap();
    assert!(summary.error.is_some());

    let status = runner.status().await;
    assert_eq!(status.enabled_rules, 0);
    assert!(status.error.is_some());

    // Recovers on the next cycle
    store.clear_faults();
    assert_eq!(runner.run_cycle().await.len(), 1);
    assert_eq!(runner.status().await.error, None);
}

#[tokio::test]
async fn test_metric_outage_does_not_block_worker_rules() {
    let store = store_with_cpu_violation().await;
    store
        .insert_rule(create_worker_rule("api down", 30.0, None), base_time())
        .await
        .unwrap();
    store
        .upsert_worker(inactive_report("api-worker"), minutes_ago(45))
        .await
        .unwrap();
    store.inject_fault(FaultPoint::QueryMetrics);

    let (mut runner, _clock) = create_runner(store.clone());
    let alarms = runner.run_cycle().await;

    assert_eq!(alarms.len(), 1);
    assert!(alarms[0].title.contains("api-worker"));

    let summary = runner.last_cycle().unwrap();
    assert_eq!(summary.rules_evaluated, 2);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.error, None);
}

#[tokio::test]
async fn test_failed_alarm_write_retries_next_cycle() {
    let store = store_with_cpu_violation().await;
    store.inject_fault(FaultPoint::CreateAlarm);

    let (mut runner, _clock) = create_runner(store.clone());
    assert!(runner.run_cycle().await.is_empty());
    assert!(runner.cooldowns().is_empty());

    store.clear_faults();
    assert_eq!(runner.run_cycle().await.len(), 1);
    assert_eq!(store.list_alarms(false).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_malformed_disk_payload_is_non_violating() {
    let store = Arc::new(MemoryBackend::new());
    store
        .insert_rule(
            NewRule {
                severity: Severity::Critical,
                ..create_rule("disk full", RuleMetric::Disk, Condition::GreaterThan, 90.0, 5)
            },
            base_time(),
        )
        .await
        .unwrap();
    insert_samples(
        &*store,
        vec![
            disk_sample(minutes_ago(2), "not json at all"),
            disk_sample(minutes_ago(1), "{}"),
            disk_sample(minutes_ago(0), r#"{"/": "full"}"#),
        ],
    )
    .await;

    let (mut runner, _clock) = create_runner(store.clone());
    assert!(runner.run_cycle().await.is_empty());
    assert_eq!(runner.last_cycle().unwrap().failed, 0);
}

#[tokio::test]
async fn test_single_sample_never_fires() {
    let store = Arc::new(MemoryBackend::new());
    store
        .insert_rule(
            create_rule("cpu high", RuleMetric::Cpu, Condition::GreaterThan, 80.0, 5),
            base_time(),
        )
        .await
        .unwrap();
    insert_samples(&*store, vec![cpu_sample(base_time(), 100.0)]).await;

    let (mut runner, _clock) = create_runner(store.clone());
    assert!(runner.run_cycle().await.is_empty());
}

#[tokio::test]
async fn test_stopped_actor_returns_empty_results() {
    let store = store_with_cpu_violation().await;
    let (runner, _clock) = create_runner(store.clone());
    let handle = MonitorHandle::spawn(runner, store.clone(), MonitorSettings::default());

    handle.shutdown().await;
    tokio::time::sleep(StdDuration::from_millis(10)).await;

    assert!(handle.run_cycle().await.is_empty());
    assert!(handle.check_rule(1).await.is_none());
    assert!(handle.status().await.is_none());
    assert!(store.list_alarms(false).await.unwrap().is_empty());
}
