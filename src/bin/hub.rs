use std::sync::Arc;

use clap::Parser;
use threshold_monitor::{
    MonitoringCycleRunner,
    actors::MonitorHandle,
    api::{ApiState, spawn_api_server},
    config::{Config, StorageConfig, read_config_file},
    storage::{MemoryBackend, StorageBackend},
};
use tracing::{debug, error, info, level_filters::LevelFilter, trace};
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Parser)]
struct Args {
    /// Config file
    #[arg(short)]
    file: String,

    /// Log level of the hub (error, warn, info, debug, trace)
    #[arg(long, default_value = "debug")]
    log_level: LevelFilter,
}

fn init(level: LevelFilter) {
    let filter = filter::Targets::new().with_targets(vec![
        ("threshold_monitor", level),
        ("threshold_hub", level),
        ("tower_http", LevelFilter::INFO),
    ]);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .compact()
                .with_ansi(false),
        )
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    let args = Args::parse();
    init(args.log_level);
    trace!("started with args: {args:?}");

    let mut config = read_config_file(&args.file)?;
    config.apply_env_overrides();

    let storage = open_storage(&config).await?;
    info!("storage backend ready: {}", storage.get_stats().await?);

    let runner = MonitoringCycleRunner::new(storage.clone(), config.monitoring.policy);
    let monitor = MonitorHandle::spawn(runner, storage.clone(), config.monitor_settings());

    let state = ApiState::new(storage.clone(), monitor.clone());
    let addr = spawn_api_server(config.api.clone(), state).await?;
    info!("threshold hub running on {addr}");

    tokio::signal::ctrl_c().await?;
    info!("shutting down");

    monitor.shutdown().await;
    if let Err(e) = storage.close().await {
        error!("failed to close storage backend: {e}");
    }

    Ok(())
}

async fn open_storage(config: &Config) -> anyhow::Result<Arc<dyn StorageBackend>> {
    match &config.storage {
        StorageConfig::None => {
            debug!("using in-memory storage, nothing will be persisted");
            Ok(Arc::new(MemoryBackend::new()))
        }

        #[cfg(feature = "storage-sqlite")]
        StorageConfig::Sqlite { path, .. } => {
            debug!("opening sqlite database at {}", path.display());
            let backend = threshold_monitor::storage::sqlite::SqliteBackend::new(path).await?;
            Ok(Arc::new(backend))
        }

        #[cfg(not(feature = "storage-sqlite"))]
        StorageConfig::Sqlite { .. } => {
            anyhow::bail!("sqlite storage configured but the storage-sqlite feature is disabled")
        }
    }
}
