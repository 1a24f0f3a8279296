//! Persistence for rules, metric samples, service workers and alarms
//!
//! The monitoring core never talks to a database directly. It goes through
//! the `StorageBackend` trait so a cycle can run against SQLite in production
//! and against the in-memory backend in tests.
//!
//! ## Backends
//!
//! - **SQLite** (default): embedded database with sqlx migrations
//! - **In-Memory**: no persistence, supports fault injection for tests
//!
//! ## Usage
//!
//! ```no_run
//! use threshold_monitor::storage::{StorageBackend, sqlite::SqliteBackend};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let backend = SqliteBackend::new("./monitoring.db").await?;
//!     let rules = backend.list_enabled_rules().await?;
//!     println!("{} enabled rules", rules.len());
//!     Ok(())
//! }
//! ```

pub mod backend;
pub mod error;
pub mod memory;
pub mod schema;
#[cfg(feature = "storage-sqlite")]
pub mod sqlite;

pub use backend::{HealthStatus, StorageBackend};
pub use error::{StorageError, StorageResult};
pub use memory::MemoryBackend;
