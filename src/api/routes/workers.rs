//! Service worker endpoints

use axum::{Json, extract::State};

use crate::{
    api::{error::ApiResult, state::ApiState},
    storage::schema::ServiceWorker,
};

/// GET /api/v1/workers
pub async fn list_workers(State(state): State<ApiState>) -> ApiResult<Json<Vec<ServiceWorker>>> {
    Ok(Json(state.storage.list_workers().await?))
}
