//! Monitoring cycle endpoints
//!
//! All of these go through the monitor actor so they never overlap with a
//! running cycle.

use axum::{
    Json,
    extract::{Path, State},
};
use serde_json::{Value, json};
use tracing::info;

use crate::{
    api::{
        error::{ApiError, ApiResult},
        state::ApiState,
    },
    monitor::MonitoringStatus,
    storage::schema::Alarm,
};

/// POST /api/v1/monitoring/run
///
/// Runs a full cycle and returns the alarms it created
pub async fn run_cycle(State(state): State<ApiState>) -> Json<Vec<Alarm>> {
    let alarms = state.monitor.run_cycle().await;
    info!("manual monitoring cycle raised {} alarm(s)", alarms.len());
    Json(alarms)
}

/// GET /api/v1/monitoring/status
pub async fn get_status(State(state): State<ApiState>) -> ApiResult<Json<MonitoringStatus>> {
    state
        .monitor
        .status()
        .await
        .map(Json)
        .ok_or_else(|| ApiError::ServiceUnavailable("monitor actor is not running".to_string()))
}

/// POST /api/v1/monitoring/rules/{id}/check
///
/// Evaluates one rule now. `alarm` is null when nothing was raised, which
/// includes disabled rules and rules still cooling down.
pub async fn check_rule(
    State(state): State<ApiState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Value>> {
    let rule = state
        .storage
        .get_rule(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("rule {id}")))?;

    let alarm = state.monitor.check_rule(rule.id).await;

    Ok(Json(json!({
        "rule_id": rule.id,
        "enabled": rule.enabled,
        "alarm": alarm,
    })))
}
