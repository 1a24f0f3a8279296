use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, bail};
use tracing::{debug, trace};

use crate::actors::MonitorSettings;
use crate::api::ApiConfig;
use crate::monitor::EvaluationPolicy;

/// Environment variable overriding the SQLite database path
pub const DB_PATH_ENV: &str = "THRESHOLD_MONITOR_DB";

/// Storage backend configuration
#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum StorageConfig {
    /// In-memory storage (no persistence)
    #[serde(rename = "none")]
    None,

    /// SQLite database (default for most deployments)
    Sqlite {
        /// Path to the SQLite database file
        #[serde(default = "default_sqlite_path")]
        path: PathBuf,

        /// Retention period in days (metric samples older than this are deleted)
        #[serde(default = "default_retention_days")]
        retention_days: u32,
    },
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig::Sqlite {
            path: default_sqlite_path(),
            retention_days: default_retention_days(),
        }
    }
}

impl StorageConfig {
    pub fn retention_days(&self) -> Option<u32> {
        match self {
            StorageConfig::None => None,
            StorageConfig::Sqlite { retention_days, .. } => Some(*retention_days),
        }
    }
}

fn default_sqlite_path() -> PathBuf {
    PathBuf::from("./monitoring.db")
}

fn default_retention_days() -> u32 {
    30
}

/// Monitoring cycle configuration
#[derive(Debug, Clone, Default, PartialEq, serde::Deserialize)]
#[serde(default)]
pub struct MonitoringConfig {
    /// Run a cycle every this many seconds; without it cycles only run when
    /// agents report or an operator triggers one
    pub interval_secs: Option<u64>,

    #[serde(flatten)]
    pub policy: EvaluationPolicy,
}

#[derive(Debug, Clone, Default, PartialEq, serde::Deserialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub monitoring: MonitoringConfig,
}

impl Config {
    /// Check values serde cannot check
    pub fn validate(&self) -> anyhow::Result<()> {
        self.monitoring
            .policy
            .validate()
            .map_err(|e| anyhow::anyhow!("invalid monitoring configuration: {e}"))?;

        if self.monitoring.interval_secs == Some(0) {
            bail!("invalid monitoring configuration: interval_secs must be at least 1");
        }

        if self.storage.retention_days() == Some(0) {
            bail!("invalid storage configuration: retention_days must be at least 1");
        }

        Ok(())
    }

    /// Apply overrides from the process environment
    pub fn apply_env_overrides(&mut self) {
        self.apply_db_override(std::env::var_os(DB_PATH_ENV).map(PathBuf::from));
    }

    /// Replace the SQLite path; ignored for other backends
    pub fn apply_db_override(&mut self, db_path: Option<PathBuf>) {
        let Some(db_path) = db_path else {
            return;
        };

        if let StorageConfig::Sqlite { path, .. } = &mut self.storage {
            debug!("database path overridden to {}", db_path.display());
            *path = db_path;
        }
    }

    /// Timer settings for the monitor actor
    pub fn monitor_settings(&self) -> MonitorSettings {
        MonitorSettings {
            cycle_interval: self.monitoring.interval_secs.map(Duration::from_secs),
            retention_days: self.storage.retention_days(),
        }
    }
}

pub fn read_config_file(path: impl AsRef<Path>) -> anyhow::Result<Config> {
    let path = path.as_ref();
    let file_content = std::fs::read_to_string(path)
        .with_context(|| format!("could not read configuration file {}", path.display()))?;

    let config: Config = serde_json::from_str(&file_content)
        .map_err(|e| anyhow::anyhow!("Invalid configuration file provided! {e}"))?;
    config.validate()?;

    trace!("loaded config: {config:?}");
    Ok(config)
}
