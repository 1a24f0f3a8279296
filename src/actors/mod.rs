//! Actor that owns the monitoring cycle runner
//!
//! ## Architecture Overview
//!
//! ```text
//!   POST /monitoring-data ──┐
//!   POST /monitoring/run  ──┼──► MonitorHandle ──mpsc──► MonitorActor
//!   scheduled tick        ──┘                            │ owns
//!                                                        ▼
//!                                              MonitoringCycleRunner
//!                                              (rules, cooldowns, status)
//! ```
//!
//! Every trigger ends up as a command on one channel and the actor handles
//! one command at a time, so monitoring cycles never run concurrently and the
//! cooldown state needs no lock.
//!
//! ## Communication Patterns
//!
//! 1. **Fire-and-forget**: ingestion enqueues a cycle and returns immediately
//! 2. **Request/Response**: oneshot channels for manual runs and status queries

pub mod messages;
pub mod monitor;

pub use messages::MonitorCommand;
pub use monitor::{MonitorActor, MonitorHandle, MonitorSettings};
