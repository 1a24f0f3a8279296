//! Alarm endpoints

use axum::{
    Json,
    extract::{Path, Query, State},
};
use chrono::Utc;

use crate::{
    api::{error::ApiResult, state::ApiState, types::AlarmsQuery},
    storage::schema::Alarm,
};

/// GET /api/v1/alarms?active=true
///
/// Newest first
pub async fn list_alarms(
    State(state): State<ApiState>,
    Query(query): Query<AlarmsQuery>,
) -> ApiResult<Json<Vec<Alarm>>> {
    Ok(Json(state.storage.list_alarms(query.active).await?))
}

/// POST /api/v1/alarms/{id}/acknowledge
///
/// 409 if the alarm is already resolved
pub async fn acknowledge_alarm(
    State(state): State<ApiState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Alarm>> {
    Ok(Json(state.storage.acknowledge_alarm(id, Utc::now()).await?))
}

/// POST /api/v1/alarms/{id}/resolve
pub async fn resolve_alarm(
    State(state): State<ApiState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Alarm>> {
    Ok(Json(state.storage.resolve_alarm(id, Utc::now()).await?))
}
