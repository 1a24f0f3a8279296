//! Health check endpoint

use axum::{Json, extract::State, http::StatusCode};
use chrono::Utc;

use crate::api::{
    state::ApiState,
    types::{HealthResponse, StorageHealth},
};

/// GET /api/v1/health
///
/// Reports the storage backend's health; 503 when it is unhealthy
pub async fn health_check(State(state): State<ApiState>) -> (StatusCode, Json<HealthResponse>) {
    let storage = match state.storage.health_check().await {
        Ok(health) => StorageHealth {
            healthy: health.healthy,
            message: health.message,
            metadata: health.metadata,
            stats: state.storage.get_stats().await.ok(),
        },
        Err(e) => StorageHealth {
            healthy: false,
            message: e.to_string(),
            metadata: Default::default(),
            stats: None,
        },
    };

    let (code, status) = if storage.healthy {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    };

    (
        code,
        Json(HealthResponse {
            status: status.to_string(),
            timestamp: Utc::now().to_rfc3339(),
            storage,
        }),
    )
}
