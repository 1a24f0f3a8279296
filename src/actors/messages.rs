//! Message types for the monitor actor

use tokio::sync::oneshot;

use crate::monitor::MonitoringStatus;
use crate::storage::schema::Alarm;

/// Commands that can be sent to the MonitorActor
#[derive(Debug)]
pub enum MonitorCommand {
    /// Run one monitoring cycle
    ///
    /// Ingestion sends this without a reply channel and does not wait.
    RunCycle {
        respond_to: Option<oneshot::Sender<Vec<Alarm>>>,
    },

    /// Check a single rule under the cooldown protocol
    CheckRule {
        rule_id: i64,
        respond_to: oneshot::Sender<Option<Alarm>>,
    },

    /// Get the monitoring status view
    GetStatus {
        respond_to: oneshot::Sender<MonitoringStatus>,
    },

    /// Gracefully shut down the actor
    ///
    /// Commands queued before this one are still handled.
    Shutdown,
}
