//! Publishing queue API
//!
//! POST /publishing/retry, GET /publishing/queue

use axum::{
    extract::{Query, State},
    routing::{get, post},
    Json, Router,
};
use rawi_common::paging::{PaginationMetadata, PagingParams};
use serde::{Deserialize, Serialize};

use crate::db;
use crate::error::ApiResult;
use crate::models::PublishingTracker;
use crate::queue::Job;
use crate::AppState;

/// POST /publishing/retry response
#[derive(Debug, Serialize)]
pub struct RetryResponse {
    pub scheduled: bool,
}

/// GET /publishing/queue query
#[derive(Debug, Deserialize)]
pub struct QueueQuery {
    pub page: Option<i64>,
    pub page_size: Option<i64>,
    #[serde(default = "default_true")]
    pub in_progress: bool,
    #[serde(default)]
    pub finished: bool,
}

fn default_true() -> bool {
    true
}

/// GET /publishing/queue response
#[derive(Debug, Serialize)]
pub struct QueueResponse {
    pub paging: PaginationMetadata,
    pub items: Vec<PublishingTracker>,
}

/// POST /publishing/retry
///
/// Schedule a rescan of approved recitations whose remote state is
/// stale. Idempotent: synchronized items are outside the scan set.
pub async fn retry_publish(State(state): State<AppState>) -> ApiResult<Json<RetryResponse>> {
    state.queue.enqueue(Job::RetryPublish);
    tracing::info!("Publish retry scan scheduled");

    Ok(Json(RetryResponse { scheduled: true }))
}

/// GET /publishing/queue
///
/// Paginated publish attempt history, newest first.
pub async fn queue_status(
    State(state): State<AppState>,
    Query(query): Query<QueueQuery>,
) -> ApiResult<Json<QueueResponse>> {
    let defaults = PagingParams::default();
    let paging = PagingParams {
        page: query.page.unwrap_or(defaults.page),
        page_size: query.page_size.unwrap_or(defaults.page_size),
    };

    let (paging, items) =
        db::trackers::list_trackers(&state.db, query.in_progress, query.finished, &paging).await?;

    Ok(Json(QueueResponse { paging, items }))
}

/// Build publishing routes
pub fn publishing_routes() -> Router<AppState> {
    Router::new()
        .route("/publishing/retry", post(retry_publish))
        .route("/publishing/queue", get(queue_status))
}
