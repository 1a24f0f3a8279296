//! REST API for the threshold monitor hub
//!
//! Agents push their reports here, operators manage rules and alarms.
//!
//! ## Architecture
//!
//! - **Axum** web framework with Tower middleware
//! - **Storage backend** shared with the monitor actor for CRUD
//! - **Monitor handle** for everything that evaluates rules, so cycles
//!   never overlap
//!
//! ## Endpoints
//!
//! - `GET /api/v1/health` - Health check (never requires auth)
//! - `POST /api/v1/monitoring-data` - Agent report ingestion
//! - `POST /api/v1/monitoring/run` - Run a monitoring cycle now
//! - `GET /api/v1/monitoring/status` - Monitoring status view
//! - `POST /api/v1/monitoring/rules/{id}/check` - Check a single rule
//! - `GET|POST /api/v1/rules` - List or create threshold rules
//! - `PUT /api/v1/rules/{id}/enabled` - Enable or disable a rule
//! - `GET /api/v1/alarms?active=true` - List alarms
//! - `POST /api/v1/alarms/{id}/acknowledge` - Acknowledge an alarm
//! - `POST /api/v1/alarms/{id}/resolve` - Resolve an alarm
//! - `GET /api/v1/workers` - List service workers

#[cfg(feature = "api")]
pub mod error;
#[cfg(feature = "api")]
pub mod middleware;
#[cfg(feature = "api")]
pub mod routes;
#[cfg(feature = "api")]
pub mod state;
#[cfg(feature = "api")]
pub mod types;

#[cfg(feature = "api")]
pub use error::{ApiError, ApiResult};
#[cfg(feature = "api")]
pub use state::ApiState;
#[cfg(feature = "api")]
pub use types::{HealthResponse, IngestRequest, IngestResponse};

#[cfg(feature = "api")]
use axum::{
    Router,
    routing::{get, post, put},
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
#[cfg(feature = "api")]
use tracing::info;

/// API server configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Bind address (e.g., "0.0.0.0:8080")
    pub bind: SocketAddr,

    /// Optional bearer token required on every route but the health check
    pub auth_token: Option<String>,

    /// Enable CORS for browser clients
    pub enable_cors: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 8080)),
            auth_token: None,
            enable_cors: true,
        }
    }
}

/// Build the router with all routes and layers
#[cfg(feature = "api")]
pub fn router(config: &ApiConfig, state: ApiState) -> Router {
    use tower_http::cors::{Any, CorsLayer};
    use tower_http::trace::TraceLayer;

    let mut app = Router::new()
        .route(middleware::HEALTH_PATH, get(routes::health::health_check))
        .route(
            "/api/v1/monitoring-data",
            post(routes::ingest::store_monitoring_data),
        )
        .route("/api/v1/monitoring/run", post(routes::monitoring::run_cycle))
        .route(
            "/api/v1/monitoring/status",
            get(routes::monitoring::get_status),
        )
        .route(
            "/api/v1/monitoring/rules/:id/check",
            post(routes::monitoring::check_rule),
        )
        .route(
            "/api/v1/rules",
            get(routes::rules::list_rules).post(routes::rules::create_rule),
        )
        .route(
            "/api/v1/rules/:id/enabled",
            put(routes::rules::set_rule_enabled),
        )
        .route("/api/v1/alarms", get(routes::alarms::list_alarms))
        .route(
            "/api/v1/alarms/:id/acknowledge",
            post(routes::alarms::acknowledge_alarm),
        )
        .route(
            "/api/v1/alarms/:id/resolve",
            post(routes::alarms::resolve_alarm),
        )
        .route("/api/v1/workers", get(routes::workers::list_workers))
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    if config.enable_cors {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
        app = app.layer(cors);
    }

    if let Some(token) = config.auth_token.clone() {
        app = app.layer(axum::middleware::from_fn_with_state(
            token,
            middleware::auth::auth_middleware,
        ));
    }

    app
}

/// Spawn the API server
///
/// This starts an Axum HTTP server in a background task.
/// Returns the server's local address.
#[cfg(feature = "api")]
pub async fn spawn_api_server(config: ApiConfig, state: ApiState) -> anyhow::Result<SocketAddr> {
    info!("starting API server on {}", config.bind);

    let app = router(&config, state);

    let listener = tokio::net::TcpListener::bind(config.bind).await?;
    let addr = listener.local_addr()?;

    info!("API server listening on {}", addr);

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!("API server error: {}", e);
        }
    });

    Ok(addr)
}
