//! End-to-end monitoring cycles against the in-memory backend
//!
//! These tests verify that:
//! - Persistent violations raise exactly one alarm per cooldown
//! - Non-violating windows and fresh workers stay quiet
//! - Rules are evaluated in severity order

use std::sync::Arc;

use assert_matches::assert_matches;
use chrono::Duration;
use pretty_assertions::assert_eq;
use threshold_monitor::{
    AlarmSource, AlarmStatus, Condition, RuleMetric, Severity,
    storage::{MemoryBackend, StorageBackend, schema::NewRule},
};

use crate::helpers::*;

#[tokio::test]
async fn test_sustained_cpu_violation_raises_one_alarm() {
    let store = Arc::new(MemoryBackend::new());
    let rule = store
        .insert_rule(
            NewRule {
                cooldown_minutes: 10,
                severity: Severity::High,
                ..create_rule("cpu high", RuleMetric::Cpu, Condition::GreaterThan, 80.0, 5)
            },
            base_time(),
        )
        .await
        .unwrap();
    insert_samples(
        &*store,
        (0..5).map(|i| cpu_sample(minutes_ago(i), 90.0)).collect(),
    )
    .await;

    let (mut runner, clock) = create_runner(store.clone());

    let alarms = runner.run_cycle().await;
    assert_eq!(alarms.len(), 1);

    let alarm = &alarms[0];
    assert_eq!(alarm.title, "Threshold Alert: cpu high");
    assert_eq!(
        alarm.description,
        "CPU exceeded threshold of 80.0% for 5 minutes. Current value: 90.0%"
    );
    assert_eq!(alarm.severity, Severity::High);
    assert_eq!(alarm.status, AlarmStatus::Active);
    assert_eq!(alarm.source, AlarmSource::ThresholdMonitor);
    assert_eq!(alarm.source_id, rule.id.to_string());
    assert!(alarm.is_active);

    // Still violating two minutes later, but inside the cooldown
    clock.advance(Duration::minutes(2));
    insert_samples(&*store, vec![cpu_sample(minutes_ago(-2), 95.0)]).await;
    assert!(runner.run_cycle().await.is_empty());

    // Once the cooldown expired the rule may fire again
    clock.advance(Duration::minutes(8));
    insert_samples(
        &*store,
        (0..3)
            .map(|i| cpu_sample(minutes_ago(-10 + i), 97.0))
            .collect(),
    )
    .await;
    let alarms = runner.run_cycle().await;
    assert_eq!(alarms.len(), 1);
    assert!(alarms[0].description.ends_with("Current value: 97.0%"));

    assert_eq!(store.list_alarms(true).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_memory_above_floor_does_not_fire() {
    let store = Arc::new(MemoryBackend::new());
    store
        .insert_rule(
            create_rule("memory low", RuleMetric::Memory, Condition::LessThan, 20.0, 3),
            base_time(),
        )
        .await
        .unwrap();
    insert_samples(
        &*store,
        vec![
            memory_sample(minutes_ago(2), 50.0),
            memory_sample(minutes_ago(1), 55.0),
            memory_sample(minutes_ago(0), 60.0),
        ],
    )
    .await;

    let (mut runner, _clock) = create_runner(store.clone());
    assert!(runner.run_cycle().await.is_empty());

    let summary = runner.last_cycle().unwrap();
    assert_eq!(summary.rules_evaluated, 1);
    assert_eq!(summary.alarms_raised, 0);
    assert_eq!(summary.error, None);
}

#[tokio::test]
async fn test_inactive_worker_raises_alarm() {
    let store = Arc::new(MemoryBackend::new());
    store
        .insert_rule(create_worker_rule("api down", 30.0, None), base_time())
        .await
        .unwrap();
    let worker = store
        .upsert_worker(inactive_report("api-worker"), minutes_ago(45))
        .await
        .unwrap();

    let (mut runner, _clock) = create_runner(store.clone());
    let alarms = runner.run_cycle().await;

    assert_eq!(alarms.len(), 1);
    assert_eq!(alarms[0].title, "Service Worker Inactive: api-worker");
    assert_eq!(
        alarms[0].description,
        "Service worker 'api-worker' has been inactive for 45 minutes, exceeding the threshold of 30.0 minutes. Last activity: 2025-07-20 11:15:00 UTC"
    );
    assert_eq!(alarms[0].source, AlarmSource::ServiceWorkerMonitor);
    assert_eq!(alarms[0].source_id, worker.id.to_string());
}

#[tokio::test]
async fn test_recently_inactive_worker_is_quiet() {
    let store = Arc::new(MemoryBackend::new());
    store
        .insert_rule(create_worker_rule("api down", 30.0, None), base_time())
        .await
        .unwrap();
    store
        .upsert_worker(inactive_report("api-worker"), minutes_ago(10))
        .await
        .unwrap();

    let (mut runner, _clock) = create_runner(store.clone());
    assert!(runner.run_cycle().await.is_empty());
}

#[tokio::test]
async fn test_worker_filter_selects_named_worker() {
    let store = Arc::new(MemoryBackend::new());
    store
        .insert_rule(
            create_worker_rule("billing down", 30.0, Some("billing-worker")),
            base_time(),
        )
        .await
        .unwrap();
    store
        .upsert_worker(inactive_report("api-worker"), minutes_ago(60))
        .await
        .unwrap();

    let (mut runner, clock) = create_runner(store.clone());
    assert!(runner.run_cycle().await.is_empty());

    store
        .upsert_worker(inactive_report("billing-worker"), minutes_ago(40))
        .await
        .unwrap();
    clock.advance(Duration::seconds(1));

    let alarms = runner.run_cycle().await;
    assert_eq!(alarms.len(), 1);
    assert!(alarms[0].description.contains("'billing-worker'"));
}

#[tokio::test]
async fn test_disk_equals_tolerance() {
    let store = Arc::new(MemoryBackend::new());
    store
        .insert_rule(
            create_rule("disk pinned", RuleMetric::Disk, Condition::Equals, 50.0, 5),
            base_time(),
        )
        .await
        .unwrap();
    insert_samples(
        &*store,
        vec![
            disk_sample(minutes_ago(1), r#"{"/": {"percent": 50.4}}"#),
            disk_sample(minutes_ago(0), r#"{"/": {"percent": 50.4}, "/data": {"percent": 12.0}}"#),
        ],
    )
    .await;

    let (mut runner, _clock) = create_runner(store.clone());
    let alarms = runner.run_cycle().await;
    assert_eq!(alarms.len(), 1);
    assert_eq!(
        alarms[0].description,
        "DISK equals threshold of 50.0% for 5 minutes. Current value: 50.4%"
    );

    // Same rule against 52.0 on a fresh store stays quiet
    let store = Arc::new(MemoryBackend::new());
    store
        .insert_rule(
            create_rule("disk pinned", RuleMetric::Disk, Condition::Equals, 50.0, 5),
            base_time(),
        )
        .await
        .unwrap();
    insert_samples(
        &*store,
        vec![
            disk_sample(minutes_ago(1), r#"{"/": {"percent": 52.0}}"#),
            disk_sample(minutes_ago(0), r#"{"/": {"percent": 52.0}}"#),
        ],
    )
    .await;

    let (mut runner, _clock) = create_runner(store.clone());
    assert!(runner.run_cycle().await.is_empty());
}

#[tokio::test]
async fn test_empty_rule_set_cycles() {
    let store = Arc::new(MemoryBackend::new());
    let (mut runner, _clock) = create_runner(store.clone());

    assert!(runner.run_cycle().await.is_empty());
    assert!(runner.run_cycle().await.is_empty());

    let status = runner.status().await;
    assert_eq!(status.enabled_rules, 0);
    assert_eq!(status.last_check, Some(base_time()));
    assert_eq!(status.error, None);
}

#[tokio::test]
async fn test_alarms_follow_severity_order() {
    let store = Arc::new(MemoryBackend::new());
    for (name, severity) in [
        ("low", Severity::Low),
        ("critical", Severity::Critical),
        ("medium", Severity::Medium),
    ] {
        store
            .insert_rule(
                NewRule {
                    severity,
                    ..create_rule(name, RuleMetric::Cpu, Condition::GreaterThan, 50.0, 5)
                },
                base_time(),
            )
            .await
            .unwrap();
    }
    insert_samples(
        &*store,
        (0..3).map(|i| cpu_sample(minutes_ago(i), 75.0)).collect(),
    )
    .await;

    let (mut runner, _clock) = create_runner(store.clone());
    let severities: Vec<_> = runner
        .run_cycle()
        .await
        .into_iter()
        .map(|alarm| alarm.severity)
        .collect();

    assert_eq!(
        severities,
        vec![Severity::Critical, Severity::Medium, Severity::Low]
    );
}

#[tokio::test]
async fn test_disabled_rule_is_skipped() {
    let store = Arc::new(MemoryBackend::new());
    let rule = store
        .insert_rule(
            create_rule("cpu high", RuleMetric::Cpu, Condition::GreaterThan, 80.0, 5),
            base_time(),
        )
        .await
        .unwrap();
    store
        .set_rule_enabled(rule.id, false, base_time())
        .await
        .unwrap();
    insert_samples(
        &*store,
        (0..3).map(|i| cpu_sample(minutes_ago(i), 99.0)).collect(),
    )
    .await;

    let (mut runner, _clock) = create_runner(store.clone());
    assert!(runner.run_cycle().await.is_empty());
    assert_matches!(runner.check_rule_by_id(rule.id).await, None);
}
