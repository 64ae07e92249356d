//! recordgate gateway
//!
//! Serves `/in-memory` (key-value store) and `/mongo` (record aggregation
//! queries) on the API address, plus health checks and metrics on the admin
//! address.

use anyhow::{Context, Result};
use clap::Parser;
use recordgate::{
    config::{DocumentBackend, GatewayConfig},
    kv::RedbKvStore,
    query::QueryEngine,
    server::{http, AppState},
    storage::{memory, DocumentCollection},
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "recordgate")]
#[command(about = "Key-value and record query gateway", long_about = None)]
#[command(version)]
struct Args {
    /// TOML config file; RECORDGATE_* environment variables override it
    #[arg(short, long, env = "RECORDGATE_CONFIG")]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose, args.log_json);

    let config = GatewayConfig::load(args.config.as_deref())?;
    info!(
        "Starting recordgate (api {}, admin {}, backend {:?})",
        config.listen_addr, config.admin_addr, config.document_backend
    );

    let kv = Arc::new(RedbKvStore::in_memory().context("Open in-memory key-value store")?);
    let collection = open_collection(&config).await?;
    let engine = Arc::new(QueryEngine::new(collection).with_timeout(config.query_timeout()));
    let state = AppState::new(kv, engine);

    let shutdown = CancellationToken::new();
    tokio::spawn(wait_for_signal(shutdown.clone()));

    let admin_addr = config.admin_socket()?;
    let admin = tokio::spawn(http::serve_admin(
        admin_addr,
        state.clone(),
        shutdown.clone(),
    ));

    let api_result = http::serve_api(config.listen_socket()?, state, shutdown.clone()).await;
    // Stop the admin listener too if the API server exited on its own.
    shutdown.cancel();

    match admin.await {
        Ok(Err(e)) => warn!("Admin server error: {}", e),
        Err(e) => warn!("Admin server task failed: {}", e),
        Ok(Ok(())) => {}
    }
    api_result.context("API server error")?;

    info!("recordgate stopped");
    Ok(())
}

fn init_tracing(verbose: bool, json: bool) {
    let filter = if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_target(false))
            .init();
    }
}

async fn open_collection(config: &GatewayConfig) -> Result<Arc<dyn DocumentCollection>> {
    match config.document_backend {
        DocumentBackend::Memory => {
            let collection = memory::InMemoryCollection::new();
            if let Some(path) = &config.seed_file {
                let documents = memory::load_seed_file(std::path::Path::new(path))?;
                let count = documents.len();
                collection
                    .insert_many(documents)
                    .map_err(anyhow::Error::msg)
                    .context("Seed in-memory collection")?;
                info!("Seeded {} records from {}", count, path);
            }
            Ok(Arc::new(collection))
        }

        #[cfg(feature = "mongodb-storage")]
        DocumentBackend::Mongodb => {
            let collection = recordgate::storage::mongo::MongoCollection::connect(
                &config.mongo_uri,
                &config.mongo_database,
                &config.mongo_collection,
                config.connect_timeout(),
            )
            .await
            .context("MongoDB connection failed")?;
            info!(
                "MongoDB storage enabled: {} / {}",
                config.mongo_database, config.mongo_collection
            );
            Ok(Arc::new(collection))
        }

        #[cfg(not(feature = "mongodb-storage"))]
        DocumentBackend::Mongodb => {
            anyhow::bail!("document_backend = \"mongodb\" requires the mongodb-storage feature")
        }
    }
}

async fn wait_for_signal(shutdown: CancellationToken) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = term.recv() => {}
                }
            }
            Err(e) => {
                warn!("Cannot install SIGTERM handler: {}", e);
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }

    info!("Shutdown signal received, draining connections");
    shutdown.cancel();
}
