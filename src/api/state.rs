//! API shared state

use std::sync::Arc;

use crate::actors::MonitorHandle;
use crate::storage::StorageBackend;

/// Shared state passed to all API handlers
#[derive(Clone)]
pub struct ApiState {
    /// Backend for rule, alarm and worker CRUD
    pub storage: Arc<dyn StorageBackend>,

    /// Handle to the monitor actor; every evaluation goes through it
    pub monitor: MonitorHandle,
}

impl ApiState {
    pub fn new(storage: Arc<dyn StorageBackend>, monitor: MonitorHandle) -> Self {
        Self { storage, monitor }
    }
}
