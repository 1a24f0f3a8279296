//! Integration tests for the SQLite backend
//!
//! These tests verify that:
//! - Monitoring cycles run end-to-end against SQLite
//! - Rules, workers and alarms survive a reopen
//! - Alarm lifecycle transitions are enforced
//! - Retention cleanup removes old samples only

use std::sync::Arc;

use assert_matches::assert_matches;
use chrono::Duration;
use threshold_monitor::{
    AlarmStatus, Condition, RuleMetric,
    storage::{StorageBackend, StorageError, schema::WorkerStatus, sqlite::SqliteBackend},
};
use tempfile::tempdir;

use crate::helpers::*;

#[tokio::test]
async fn test_full_cycle_persists_across_reopen() {
    let temp_dir = tempdir().unwrap();
    let db_path = temp_dir.path().join("monitoring.db");

    {
        let backend = Arc::new(SqliteBackend::new(&db_path).await.unwrap());
        backend
            .insert_rule(
                create_rule("cpu high", RuleMetric::Cpu, Condition::GreaterThan, 80.0, 5),
                base_time(),
            )
            .await
            .unwrap();
        insert_samples(
            &*backend,
            (0..5).map(|i| cpu_sample(minutes_ago(i), 90.0)).collect(),
        )
        .await;

        let (mut runner, _clock) = create_runner(backend.clone());
        let alarms = runner.run_cycle().await;
        assert_eq!(alarms.len(), 1);
        assert!(alarms[0].description.contains("90.0%"));

        backend.close().await.unwrap();
    }

    let backend = Arc::new(SqliteBackend::new(&db_path).await.unwrap());

    let rules = backend.list_enabled_rules().await.unwrap();
    assert_eq!(rules.len(), 1);
    assert_eq!(rules[0].name, "cpu high");
    assert_eq!(rules[0].created_at, base_time());

    let alarms = backend.list_alarms(true).await.unwrap();
    assert_eq!(alarms.len(), 1);
    assert_eq!(alarms[0].triggered_at, base_time());

    // Cooldowns live in memory, so a fresh runner may fire again
    let (mut runner, _clock) = create_runner(backend.clone());
    assert_eq!(runner.run_cycle().await.len(), 1);
}

#[tokio::test]
async fn test_worker_alarm_against_sqlite() {
    let temp_dir = tempdir().unwrap();
    let backend = Arc::new(
        SqliteBackend::new(temp_dir.path().join("workers.db"))
            .await
            .unwrap(),
    );

    backend
        .insert_rule(create_worker_rule("api down", 30.0, Some("api-worker")), base_time())
        .await
        .unwrap();
    backend
        .upsert_worker(inactive_report("api-worker"), minutes_ago(45))
        .await
        .unwrap();

    // A repeated report of the same state keeps the original timestamp
    let worker = backend
        .upsert_worker(inactive_report("api-worker"), minutes_ago(5))
        .await
        .unwrap();
    assert_eq!(worker.status, WorkerStatus::Inactive);
    assert_eq!(worker.last_updated, minutes_ago(45));

    let (mut runner, _clock) = create_runner(backend.clone());
    let alarms = runner.run_cycle().await;
    assert_eq!(alarms.len(), 1);
    assert!(alarms[0].description.contains("inactive for 45 minutes"));
}

#[tokio::test]
async fn test_alarm_lifecycle() {
    let temp_dir = tempdir().unwrap();
    let backend = Arc::new(
        SqliteBackend::new(temp_dir.path().join("alarms.db"))
            .await
            .unwrap(),
    );
    backend
        .insert_rule(
            create_rule("memory high", RuleMetric::Memory, Condition::GreaterThan, 70.0, 5),
            base_time(),
        )
        .await
        .unwrap();
    insert_samples(
        &*backend,
        (0..3).map(|i| memory_sample(minutes_ago(i), 88.0)).collect(),
    )
    .await;

    let (mut runner, _clock) = create_runner(backend.clone());
    let alarm = runner.run_cycle().await.remove(0);

    let acknowledged = backend
        .acknowledge_alarm(alarm.id, base_time() + Duration::minutes(1))
        .await
        .unwrap();
    assert_eq!(acknowledged.status, AlarmStatus::Acknowledged);
    assert!(acknowledged.is_active);

    let resolved = backend
        .resolve_alarm(alarm.id, base_time() + Duration::minutes(2))
        .await
        .unwrap();
    assert_eq!(resolved.status, AlarmStatus::Resolved);
    assert!(!resolved.is_active);
    assert_eq!(resolved.resolved_at, Some(base_time() + Duration::minutes(2)));

    assert!(backend.list_alarms(true).await.unwrap().is_empty());
    assert_eq!(backend.list_alarms(false).await.unwrap().len(), 1);

    assert_matches!(
        backend.acknowledge_alarm(alarm.id, base_time()).await,
        Err(StorageError::InvalidTransition(_))
    );
    assert_matches!(
        backend.resolve_alarm(alarm.id + 100, base_time()).await,
        Err(StorageError::NotFound(_))
    );
}

#[tokio::test]
async fn test_retention_cleanup() {
    let temp_dir = tempdir().unwrap();
    let backend = SqliteBackend::new(temp_dir.path().join("retention.db"))
        .await
        .unwrap();

    insert_samples(
        &backend,
        vec![
            cpu_sample(base_time() - Duration::days(40), 10.0),
            cpu_sample(base_time() - Duration::days(31), 20.0),
            cpu_sample(base_time() - Duration::days(1), 30.0),
            cpu_sample(base_time(), 40.0),
        ],
    )
    .await;

    let deleted = backend
        .cleanup_old_metrics(base_time() - Duration::days(30))
        .await
        .unwrap();
    assert_eq!(deleted, 2);

    let remaining = backend
        .query_metrics_since(base_time() - Duration::days(365))
        .await
        .unwrap();
    let values: Vec<_> = remaining.iter().map(|s| s.cpu_percent).collect();
    assert_eq!(values, vec![Some(40.0), Some(30.0)]);
}
