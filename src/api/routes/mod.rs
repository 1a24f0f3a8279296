//! Route handlers, one module per resource

pub mod alarms;
pub mod health;
pub mod ingest;
pub mod monitoring;
pub mod rules;
pub mod workers;
