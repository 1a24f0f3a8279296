//! Threshold rule endpoints

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::Utc;
use tracing::info;

use crate::{
    api::{
        error::{ApiError, ApiResult},
        state::ApiState,
        types::SetEnabledRequest,
    },
    storage::schema::{NewRule, ThresholdRule},
};

/// GET /api/v1/rules
pub async fn list_rules(State(state): State<ApiState>) -> ApiResult<Json<Vec<ThresholdRule>>> {
    Ok(Json(state.storage.list_rules().await?))
}

/// POST /api/v1/rules
///
/// Validates and stores a new rule. It takes part in the next cycle.
pub async fn create_rule(
    State(state): State<ApiState>,
    Json(rule): Json<NewRule>,
) -> ApiResult<(StatusCode, Json<ThresholdRule>)> {
    rule.validate().map_err(ApiError::InvalidRequest)?;

    let rule = state.storage.insert_rule(rule, Utc::now()).await?;
    info!(
        "created rule {} '{}' ({} {} {})",
        rule.id, rule.name, rule.metric_type, rule.condition, rule.threshold_value
    );

    Ok((StatusCode::CREATED, Json(rule)))
}

/// PUT /api/v1/rules/{id}/enabled
pub async fn set_rule_enabled(
    State(state): State<ApiState>,
    Path(id): Path<i64>,
    Json(request): Json<SetEnabledRequest>,
) -> ApiResult<Json<ThresholdRule>> {
    let rule = state
        .storage
        .set_rule_enabled(id, request.enabled, Utc::now())
        .await?;

    info!("rule {} enabled = {}", rule.id, rule.enabled);
    Ok(Json(rule))
}
