//! Integration tests for API endpoints
//!
//! These tests verify that:
//! - Agent reports are stored and trigger a monitoring cycle
//! - Rule and alarm endpoints validate input and map errors
//! - Authentication middleware functions properly

use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use threshold_monitor::{
    actors::{MonitorHandle, MonitorSettings},
    api::{ApiConfig, ApiState, router, spawn_api_server},
    storage::{MemoryBackend, StorageBackend},
};
use tower::ServiceExt;

use crate::helpers::*;

const TOKEN: &str = "test-token";

fn create_test_app() -> (Router, Arc<MemoryBackend>) {
    let store = Arc::new(MemoryBackend::new());
    let (runner, _clock) = create_runner(store.clone());
    let monitor = MonitorHandle::spawn(runner, store.clone(), MonitorSettings::default());

    let config = ApiConfig {
        auth_token: Some(TOKEN.to_string()),
        ..ApiConfig::default()
    };

    (router(&config, ApiState::new(store.clone(), monitor)), store)
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {TOKEN}"));

    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string())),
        None => builder.body(Body::empty()),
    }
    .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);

    (status, value)
}

fn cpu_rule_body() -> Value {
    json!({
        "name": "cpu high",
        "metric_type": "CPU",
        "condition": "greater_than",
        "threshold_value": 80.0,
        "duration_minutes": 5,
        "severity": "high",
        "cooldown_minutes": 10
    })
}

fn agent_report(minutes_back: i64, cpu: f64) -> Value {
    json!({
        "system_metrics": {
            "timestamp": minutes_ago(minutes_back).to_rfc3339(),
            "cpu_percent": cpu,
            "memory_percent": 35.0,
            "disk_usage": {"/": {"used": 40, "free": 60, "percent": 40.0}}
        },
        "services": [{"name": "api-worker", "status": "active", "enabled": true}]
    })
}

#[tokio::test]
async fn test_health_endpoint_without_token() {
    let (app, _store) = create_test_app();

    let request = Request::builder()
        .uri("/api/v1/health")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_auth_required_for_other_routes() {
    let (app, _store) = create_test_app();

    let request = Request::builder()
        .uri("/api/v1/rules")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let request = Request::builder()
        .uri("/api/v1/rules")
        .header(header::AUTHORIZATION, "Bearer wrong-token")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_create_and_toggle_rule() {
    let (app, _store) = create_test_app();

    let (status, rule) = send(&app, "POST", "/api/v1/rules", Some(cpu_rule_body())).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(rule["metric_type"], "cpu");
    assert_eq!(rule["severity"], "high");
    assert_eq!(rule["enabled"], true);

    let id = rule["id"].as_i64().unwrap();
    let (status, rule) = send(
        &app,
        "PUT",
        &format!("/api/v1/rules/{id}/enabled"),
        Some(json!({"enabled": false})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(rule["enabled"], false);

    let (status, rules) = send(&app, "GET", "/api/v1/rules", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(rules.as_array().unwrap().len(), 1);

    let (status, _) = send(
        &app,
        "PUT",
        "/api/v1/rules/999/enabled",
        Some(json!({"enabled": true})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_invalid_rule_is_rejected() {
    let (app, _store) = create_test_app();

    let mut body = cpu_rule_body();
    body["duration_minutes"] = json!(90);

    let (status, error) = send(&app, "POST", "/api/v1/rules", Some(body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(error["error"].as_str().unwrap().contains("duration"));
}

#[tokio::test]
async fn test_ingestion_triggers_cycle() {
    let (app, store) = create_test_app();
    send(&app, "POST", "/api/v1/rules", Some(cpu_rule_body())).await;

    for minutes_back in (0..4).rev() {
        let (status, response) = send(
            &app,
            "POST",
            "/api/v1/monitoring-data",
            Some(agent_report(minutes_back, 91.0)),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(response["status"], "ok");
        assert_eq!(response["workers"], 1);
    }

    // Status goes through the actor, so every queued cycle has finished
    let (status, monitoring) = send(&app, "GET", "/api/v1/monitoring/status", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(monitoring["enabled_rules"], 1);
    assert_eq!(monitoring["active_cooldowns"], 1);

    let (_, alarms) = send(&app, "GET", "/api/v1/alarms?active=true", None).await;
    let alarms = alarms.as_array().unwrap();
    assert_eq!(alarms.len(), 1);
    assert_eq!(alarms[0]["title"], "Threshold Alert: cpu high");

    let (_, workers) = send(&app, "GET", "/api/v1/workers", None).await;
    assert_eq!(workers[0]["name"], "api-worker");
    assert_eq!(workers[0]["status"], "active");

    assert_eq!(store.list_alarms(false).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_manual_run_and_single_rule_check() {
    let (app, store) = create_test_app();
    let (_, rule) = send(&app, "POST", "/api/v1/rules", Some(cpu_rule_body())).await;
    let id = rule["id"].as_i64().unwrap();
    insert_samples(
        &*store,
        (0..3).map(|i| cpu_sample(minutes_ago(i), 99.0)).collect(),
    )
    .await;

    let (status, result) = send(
        &app,
        "POST",
        &format!("/api/v1/monitoring/rules/{id}/check"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(result["rule_id"], id);
    assert!(result["alarm"].is_object());

    // The check started the cooldown, so a full cycle raises nothing
    let (status, alarms) = send(&app, "POST", "/api/v1/monitoring/run", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(alarms, json!([]));

    let (status, _) = send(&app, "POST", "/api/v1/monitoring/rules/999/check", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_alarm_transitions() {
    let (app, store) = create_test_app();
    send(&app, "POST", "/api/v1/rules", Some(cpu_rule_body())).await;
    insert_samples(
        &*store,
        (0..3).map(|i| cpu_sample(minutes_ago(i), 99.0)).collect(),
    )
    .await;

    let (_, alarms) = send(&app, "POST", "/api/v1/monitoring/run", None).await;
    let id = alarms[0]["id"].as_i64().unwrap();

    let (status, alarm) = send(&app, "POST", &format!("/api/v1/alarms/{id}/acknowledge"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(alarm["status"], "acknowledged");

    let (status, alarm) = send(&app, "POST", &format!("/api/v1/alarms/{id}/resolve"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(alarm["status"], "resolved");
    assert_eq!(alarm["is_active"], false);

    let (status, _) = send(&app, "POST", &format!("/api/v1/alarms/{id}/resolve"), None).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = send(&app, "POST", "/api/v1/alarms/999/acknowledge", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, active) = send(&app, "GET", "/api/v1/alarms?active=true", None).await;
    assert_eq!(active, json!([]));
}

#[tokio::test]
async fn test_spawned_server_over_tcp() {
    let store = Arc::new(MemoryBackend::new());
    let (runner, _clock) = create_runner(store.clone());
    let monitor = MonitorHandle::spawn(runner, store.clone(), MonitorSettings::default());

    let config = ApiConfig {
        bind: "127.0.0.1:0".parse().unwrap(), // Random port
        auth_token: Some(TOKEN.to_string()),
        enable_cors: true,
    };
    let addr = spawn_api_server(config, ApiState::new(store, monitor))
        .await
        .unwrap();

    let client = reqwest::Client::new();
    let response = client
        .get(format!("http://{}/api/v1/health", addr))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["storage"]["healthy"], true);

    let response = client
        .get(format!("http://{}/api/v1/monitoring/status", addr))
        .header("Authorization", format!("Bearer {TOKEN}"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);
}
