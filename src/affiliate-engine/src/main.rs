//! Affiliate Engine: click tracking, sale attribution and offer personalization.
//!
//! Main entry point that selects the store, starts the scheduled jobs and
//! serves the HTTP API.

mod scheduler;

use affiliate_api::{ApiServer, AppState};
use affiliate_core::config::{AppConfig, StoreBackend};
use affiliate_store::{KeyValueStore, MemoryStore, RecordStore, RedisStore};
use anyhow::Context;
use clap::{Parser, ValueEnum};
use std::sync::Arc;
use tracing::{error, info};

/// Log filter used when `RUST_LOG` is unset. Every workspace crate logs at
/// info so best-effort bookkeeping failures stay visible.
const DEFAULT_LOG_FILTER: &str = "affiliate_engine=info,affiliate_api=info,affiliate_tracking=info,\
affiliate_ranking=info,affiliate_store=info,tower_http=info";

#[derive(Clone, Copy, Debug, ValueEnum)]
enum BackendArg {
    Memory,
    Redis,
}

impl From<BackendArg> for StoreBackend {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::Memory => StoreBackend::Memory,
            BackendArg::Redis => StoreBackend::Redis,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "affiliate-engine")]
#[command(about = "Affiliate click tracking, sale attribution and offer personalization")]
#[command(version)]
struct Cli {
    /// Node identifier (overrides config)
    #[arg(long, env = "AFFILIATE_ENGINE__NODE_ID")]
    node_id: Option<String>,

    /// HTTP port (overrides config)
    #[arg(long, env = "AFFILIATE_ENGINE__API__HTTP_PORT")]
    http_port: Option<u16>,

    /// Storage backend (overrides config)
    #[arg(long, value_enum)]
    store: Option<BackendArg>,

    /// Redis URL (overrides config)
    #[arg(long, env = "AFFILIATE_ENGINE__STORE__REDIS_URL")]
    redis_url: Option<String>,

    /// Do not run the periodic feed refresh and ranking jobs
    #[arg(long, default_value_t = false)]
    no_scheduler: bool,
}

async fn open_store(config: &AppConfig) -> anyhow::Result<Arc<dyn KeyValueStore>> {
    match config.store.backend {
        StoreBackend::Memory => {
            info!("Using in-memory store; records are lost on restart");
            Ok(Arc::new(MemoryStore::new()))
        }
        StoreBackend::Redis => {
            let store = RedisStore::connect(&config.store)
                .await
                .context("connecting to Redis")?;
            Ok(Arc::new(store))
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        )
        .json()
        .init();

    let cli = Cli::parse();

    info!("Affiliate Engine starting up");

    // Load configuration
    let mut config = AppConfig::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Failed to load config, using defaults");
        AppConfig::default()
    });

    // Apply CLI overrides
    if let Some(node_id) = cli.node_id {
        config.node_id = node_id;
    }
    if let Some(port) = cli.http_port {
        config.api.http_port = port;
    }
    if let Some(backend) = cli.store {
        config.store.backend = backend.into();
    }
    if let Some(url) = cli.redis_url {
        config.store.redis_url = url;
    }

    info!(
        node_id = %config.node_id,
        http_port = config.api.http_port,
        store = ?config.store.backend,
        "Configuration loaded"
    );

    let store = open_store(&config).await?;
    let state = AppState::new(RecordStore::new(store.clone()), &config);

    let api_server = ApiServer::new(config.clone(), state.clone());

    // Start metrics exporter
    if let Err(e) = api_server.start_metrics() {
        error!(error = %e, "Failed to start metrics exporter");
    }

    scheduler::spawn_maintenance(store);
    if cli.no_scheduler {
        info!("Scheduled feed refresh and ranking disabled");
    } else {
        scheduler::spawn_jobs(&state, &config.schedule);
    }

    info!("Affiliate Engine is ready to serve traffic");

    // Start HTTP server (blocks until shutdown)
    api_server.start_http().await?;

    Ok(())
}
