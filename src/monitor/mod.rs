//! Threshold evaluation and alarm generation
//!
//! ## Components
//!
//! - [`RuleEvaluator`]: decides for one rule whether a persistent violation
//!   exists and, if so, writes an alarm
//! - [`CooldownTracker`]: per-rule time of the last raised alarm
//! - [`MonitoringCycleRunner`]: evaluates every enabled rule once and keeps an
//!   auditable summary of the last cycle
//!
//! The runner takes `&mut self` for every mutating call. It is owned by the
//! monitor actor (see [`crate::actors::monitor`]), whose command loop is the
//! only place cycles are started, so two cycles never overlap.

pub mod clock;
pub mod cooldown;
pub mod error;
pub mod evaluator;
pub mod policy;
pub mod runner;
pub mod window;

pub use clock::{Clock, ManualClock, SystemClock};
pub use cooldown::CooldownTracker;
pub use error::EvaluationError;
pub use evaluator::{RuleEvaluator, RuleOutcome};
pub use policy::EvaluationPolicy;
pub use runner::{CycleSummary, MonitoringCycleRunner, MonitoringStatus};
