//! rawi-ingest - Recitation Ingestion & Publication Service
//!
//! Accepts user-submitted recitation bundles (manifest + audio), pairs
//! them by content checksum, persists draft recitations, and publishes
//! approved recitations to the remote file store and the two external
//! catalog databases.

use anyhow::Result;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use rawi_common::config::RawiConfig;
use rawi_ingest::queue::{JobContext, JobQueue};
use rawi_ingest::services::cache::MemoryCache;
use rawi_ingest::services::remote::{
    Catalog, HttpNotifier, HttpRemoteStore, Notifier, RemoteStore, SqlCatalog,
};
use rawi_ingest::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting rawi-ingest");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let config = Arc::new(RawiConfig::load()?);
    std::fs::create_dir_all(&config.storage.temp_upload_path)?;
    std::fs::create_dir_all(&config.storage.repository_path)?;

    let db = rawi_ingest::db::init_database_pool(&config.storage.database_path).await?;
    info!("Database: {}", config.storage.database_path.display());

    let cache = Arc::new(MemoryCache::new());
    let remote: Arc<dyn RemoteStore> =
        Arc::new(HttpRemoteStore::new(config.remote.clone(), cache)?);
    let primary_catalog: Arc<dyn Catalog> =
        Arc::new(SqlCatalog::connect_lazy(&catalog_url(&config.catalog.primary_url, "primary"), "primary")?);
    let secondary_catalog: Arc<dyn Catalog> = Arc::new(SqlCatalog::connect_lazy(
        &catalog_url(&config.catalog.secondary_url, "secondary"),
        "secondary",
    )?);
    let notifier: Arc<dyn Notifier> = Arc::new(HttpNotifier::new(config.notify.endpoint.clone()));

    let queue = JobQueue::start(
        config.queue.workers,
        JobContext {
            db: db.clone(),
            config: config.clone(),
            remote,
            primary_catalog,
            secondary_catalog,
            notifier: notifier.clone(),
        },
    );
    info!(workers = config.queue.workers, "Background worker pool started");

    let state = AppState::new(db, config.clone(), queue, notifier);
    let app = rawi_ingest::build_router(state);

    let listener =
        tokio::net::TcpListener::bind((config.server.host.as_str(), config.server.port)).await?;
    info!("Listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app).await?;

    Ok(())
}

fn catalog_url(configured: &str, name: &str) -> String {
    if configured.is_empty() {
        tracing::warn!(catalog = name, "Catalog URL not configured, using transient in-memory catalog");
        "sqlite::memory:".to_string()
    } else {
        configured.to_string()
    }
}
