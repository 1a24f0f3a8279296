//! MonitorActor - serializes every monitoring cycle
//!
//! The actor owns the [`MonitoringCycleRunner`] and handles commands one at a
//! time. Besides commands it reacts to two timers:
//!
//! - the optional scheduled cycle (`monitoring.interval_secs`)
//! - the daily retention cleanup of old metric samples

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, error, info, instrument, trace, warn};

use super::messages::MonitorCommand;
use crate::monitor::{MonitoringCycleRunner, MonitoringStatus};
use crate::storage::StorageBackend;
use crate::storage::schema::Alarm;

/// Retention cleanup runs once a day
const CLEANUP_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

/// Timer settings of the monitor actor
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MonitorSettings {
    /// Run a cycle on this interval in addition to triggered cycles
    pub cycle_interval: Option<Duration>,

    /// Delete metric samples older than this many days
    pub retention_days: Option<u32>,
}

/// Actor that runs monitoring cycles
pub struct MonitorActor {
    runner: MonitoringCycleRunner,

    /// Used for retention cleanup only
    store: Arc<dyn StorageBackend>,

    settings: MonitorSettings,

    /// Command receiver
    command_rx: mpsc::Receiver<MonitorCommand>,
}

impl MonitorActor {
    /// Create a new monitor actor
    pub fn new(
        runner: MonitoringCycleRunner,
        store: Arc<dyn StorageBackend>,
        settings: MonitorSettings,
        command_rx: mpsc::Receiver<MonitorCommand>,
    ) -> Self {
        Self {
            runner,
            store,
            settings,
            command_rx,
        }
    }

    /// Run the actor's main loop
    #[instrument(skip(self))]
    pub async fn run(mut self) {
        debug!("starting monitor actor");

        let scheduled = self.settings.cycle_interval.is_some();
        let mut cycle_interval =
            time::interval(self.settings.cycle_interval.unwrap_or(CLEANUP_INTERVAL));
        cycle_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let has_retention = self.settings.retention_days.is_some();
        let mut cleanup_interval = time::interval(CLEANUP_INTERVAL);
        cleanup_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        if let Some(interval) = self.settings.cycle_interval {
            info!("scheduled monitoring cycle every {:?}", interval);
        }

        loop {
            tokio::select! {
                cmd = self.command_rx.recv() => {
                    let Some(cmd) = cmd else {
                        warn!("command channel closed, shutting down");
                        break;
                    };

                    if !self.handle_command(cmd).await {
                        debug!("received shutdown command");
                        break;
                    }
                }

                _ = cycle_interval.tick(), if scheduled => {
                    trace!("scheduled monitoring cycle");
                    self.runner.run_cycle().await;
                }

                _ = cleanup_interval.tick(), if has_retention => {
                    debug!("daily retention cleanup triggered");
                    self.run_cleanup().await;
                }
            }
        }

        debug!("monitor actor stopped");
    }

    /// Handle one command; returns false on shutdown
    async fn handle_command(&mut self, cmd: MonitorCommand) -> bool {
        match cmd {
            MonitorCommand::RunCycle { respond_to } => {
                let alarms = self.runner.run_cycle().await;
                if let Some(respond_to) = respond_to {
                    let _ = respond_to.send(alarms);
                }
            }

            MonitorCommand::CheckRule {
                rule_id,
                respond_to,
            } => {
                let alarm = self.runner.check_rule_by_id(rule_id).await;
                let _ = respond_to.send(alarm);
            }

            MonitorCommand::GetStatus { respond_to } => {
                let _ = respond_to.send(self.runner.status().await);
            }

            MonitorCommand::Shutdown => return false,
        }

        true
    }

    /// Delete metric samples older than the retention period
    async fn run_cleanup(&mut self) {
        let Some(days) = self.settings.retention_days else {
            return;
        };

        let cutoff = Utc::now() - chrono::Duration::days(i64::from(days));
        debug!("running retention cleanup (deleting samples before {})", cutoff);

        match self.store.cleanup_old_metrics(cutoff).await {
            Ok(0) => trace!("retention cleanup: no old samples to delete"),
            Ok(deleted) => info!("retention cleanup complete: deleted {} old samples", deleted),
            Err(e) => error!("failed to clean up old metric samples: {}", e),
        }
    }
}

/// Handle for communicating with the MonitorActor
#[derive(Clone)]
pub struct MonitorHandle {
    sender: mpsc::Sender<MonitorCommand>,
}

impl MonitorHandle {
    /// Spawn a new monitor actor
    ///
    /// # Arguments
    /// - `runner`: the cycle runner the actor takes ownership of
    /// - `store`: backend used for retention cleanup
    /// - `settings`: scheduled cycle and retention timers
    pub fn spawn(
        runner: MonitoringCycleRunner,
        store: Arc<dyn StorageBackend>,
        settings: MonitorSettings,
    ) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel(32);

        let actor = MonitorActor::new(runner, store, settings, cmd_rx);
        tokio::spawn(actor.run());

        Self { sender: cmd_tx }
    }

    /// Run a cycle and wait for its alarms.
    ///
    /// Returns an empty list if the actor is gone.
    pub async fn run_cycle(&self) -> Vec<Alarm> {
        let (tx, rx) = oneshot::channel();

        if self
            .sender
            .send(MonitorCommand::RunCycle {
                respond_to: Some(tx),
            })
            .await
            .is_err()
        {
            warn!("monitor actor is not running");
            return Vec::new();
        }

        rx.await.unwrap_or_default()
    }

    /// Enqueue a cycle without waiting for it.
    ///
    /// Returns false when the queue is full or the actor is gone. A full
    /// queue already holds cycles that will see the newest data.
    pub fn trigger_cycle(&self) -> bool {
        match self
            .sender
            .try_send(MonitorCommand::RunCycle { respond_to: None })
        {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                debug!("monitor queue full, cycle not enqueued");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                warn!("monitor actor is not running");
                false
            }
        }
    }

    /// Check a single rule; `None` when nothing was raised
    pub async fn check_rule(&self, rule_id: i64) -> Option<Alarm> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(MonitorCommand::CheckRule {
                rule_id,
                respond_to: tx,
            })
            .await
            .ok()?;

        rx.await.ok()?
    }

    /// Get the status view; `None` if the actor is gone
    pub async fn status(&self) -> Option<MonitoringStatus> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(MonitorCommand::GetStatus { respond_to: tx })
            .await
            .ok()?;

        rx.await.ok()
    }

    /// Shutdown the monitor actor
    pub async fn shutdown(&self) {
        let _ = self.sender.send(MonitorCommand::Shutdown).await;
    }
}
