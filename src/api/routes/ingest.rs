//! Agent report ingestion

use axum::{Json, extract::State};
use chrono::Utc;
use tracing::{debug, instrument, warn};

use crate::api::{
    error::ApiResult,
    state::ApiState,
    types::{IngestRequest, IngestResponse},
};

/// POST /api/v1/monitoring-data
///
/// Stores the metric sample and the worker reports, then enqueues a
/// monitoring cycle. The response does not wait for the cycle.
#[instrument(skip_all)]
pub async fn store_monitoring_data(
    State(state): State<ApiState>,
    Json(request): Json<IngestRequest>,
) -> ApiResult<Json<IngestResponse>> {
    let metric_id = state.storage.insert_metric(request.system_metrics).await?;
    debug!(
        "stored metric sample {} with {} worker report(s)",
        metric_id,
        request.services.len()
    );

    let received_at = Utc::now();
    let mut workers = 0;
    for report in request.services {
        if report.name.trim().is_empty() {
            warn!("ignoring worker report without a name");
            continue;
        }

        state.storage.upsert_worker(report, received_at).await?;
        workers += 1;
    }

    let cycle_queued = state.monitor.trigger_cycle();

    Ok(Json(IngestResponse {
        status: "ok".to_string(),
        metric_id,
        workers,
        cycle_queued,
    }))
}
