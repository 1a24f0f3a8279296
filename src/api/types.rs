//! Request and response types of the REST API
//!
//! Domain types (rules, alarms, workers) are serialized as they are; the
//! types here only wrap them for the individual endpoints.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::storage::schema::{NewMetricSample, WorkerReport};

// ============================================================================
// Health
// ============================================================================

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HealthResponse {
    /// "ok" or "degraded"
    pub status: String,
    pub timestamp: String,
    pub storage: StorageHealth,
}

/// Storage part of the health check
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StorageHealth {
    pub healthy: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<String>,
}

// ============================================================================
// Ingestion
// ============================================================================

/// Report pushed by a monitoring agent
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IngestRequest {
    pub system_metrics: NewMetricSample,

    /// Service workers the agent watches
    #[serde(default)]
    pub services: Vec<WorkerReport>,
}

/// Response to an agent report
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IngestResponse {
    pub status: String,

    /// Id of the stored metric sample
    pub metric_id: i64,

    /// Number of worker reports applied
    pub workers: usize,

    /// Whether a monitoring cycle was enqueued for this report
    pub cycle_queued: bool,
}

// ============================================================================
// Rules and alarms
// ============================================================================

/// Body of `PUT /rules/{id}/enabled`
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct SetEnabledRequest {
    pub enabled: bool,
}

/// Query parameters of `GET /alarms`
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct AlarmsQuery {
    /// Only list alarms that are still active
    #[serde(default)]
    pub active: bool,
}
