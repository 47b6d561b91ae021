//! rawi-ingest library interface
//!
//! Exposes the ingestion pipeline's public APIs for integration testing.

pub mod api;
pub mod db;
pub mod error;
pub mod models;
pub mod queue;
pub mod services;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use rawi_common::config::RawiConfig;
use sqlx::SqlitePool;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::queue::JobQueue;
use crate::services::remote::Notifier;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Service configuration
    pub config: Arc<RawiConfig>,
    /// Background job queue handle
    pub queue: JobQueue,
    /// Notification sink
    pub notifier: Arc<dyn Notifier>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(
        db: SqlitePool,
        config: Arc<RawiConfig>,
        queue: JobQueue,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            db,
            config,
            queue,
            notifier,
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::upload_routes())
        .merge(api::profile_routes())
        .merge(api::recitation_routes())
        .merge(api::publishing_routes())
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
