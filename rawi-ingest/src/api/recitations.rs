//! Recitation catalog API
//!
//! GET /recitations, GET/PUT /recitations/:id,
//! PUT /recitations/:id/moderate

use axum::{
    extract::{Path, Query, State},
    routing::{get, put},
    Json, Router,
};
use rawi_common::language;
use rawi_common::paging::{PaginationMetadata, PagingParams};
use serde::{Deserialize, Serialize};

use crate::db;
use crate::error::{ApiError, ApiResult};
use crate::models::{Recitation, ReviewStatus, SyncStatus};
use crate::queue::Job;
use crate::AppState;

use super::UserId;

/// GET /recitations query
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub page: Option<i64>,
    pub page_size: Option<i64>,
    /// Filter by review status, e.g. `DRAFT`
    pub status: Option<String>,
    /// true lists every user's recitations instead of the caller's
    #[serde(default)]
    pub all: bool,
}

/// GET /recitations response
#[derive(Debug, Serialize)]
pub struct ListResponse {
    pub paging: PaginationMetadata,
    pub items: Vec<Recitation>,
}

/// PUT /recitations/:id request: the attribution fields a user may
/// edit after creation
#[derive(Debug, Deserialize)]
pub struct MetadataRequest {
    pub title: String,
    pub artist_name: String,
    #[serde(default)]
    pub artist_url: String,
    #[serde(default)]
    pub source_name: String,
    #[serde(default)]
    pub source_url: String,
}

/// Moderation verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ModerationResult {
    Approve,
    Reject,
    /// Metadata needs changes; review status stays as-is
    FixMetadata,
}

/// PUT /recitations/:id/moderate request
#[derive(Debug, Deserialize)]
pub struct ModerateRequest {
    pub result: ModerationResult,
    #[serde(default)]
    pub message: Option<String>,
}

/// GET /recitations
pub async fn list_recitations(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<ListResponse>> {
    let status = query
        .status
        .as_deref()
        .map(|s| {
            ReviewStatus::parse(s)
                .ok_or_else(|| ApiError::BadRequest(format!("Unknown review status: {}", s)))
        })
        .transpose()?;

    let defaults = PagingParams::default();
    let paging = PagingParams {
        page: query.page.unwrap_or(defaults.page),
        page_size: query.page_size.unwrap_or(defaults.page_size),
    };

    let filter = if query.all { None } else { Some(user_id) };
    let (paging, items) =
        db::recitations::list_recitations(&state.db, filter, status, &paging).await?;

    Ok(Json(ListResponse { paging, items }))
}

/// GET /recitations/:id
pub async fn get_recitation(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Recitation>> {
    let recitation = db::recitations::get_recitation(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Recitation not found: {}", id)))?;

    Ok(Json(recitation))
}

/// PUT /recitations/:id
pub async fn update_metadata(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    Path(id): Path<i64>,
    Json(request): Json<MetadataRequest>,
) -> ApiResult<Json<Recitation>> {
    let recitation = db::recitations::get_recitation(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Recitation not found: {}", id)))?;

    if recitation.user_id != user_id {
        return Err(ApiError::Forbidden(
            "Recitation belongs to another user".to_string(),
        ));
    }

    let title = request.title.trim();
    let artist_name = request.artist_name.trim();
    let artist_url = request.artist_url.trim();
    let source_name = request.source_name.trim();
    let source_url = request.source_url.trim();

    if let Some(error) = attribution_error(artist_name, artist_url, source_url) {
        return Err(ApiError::BadRequest(error));
    }

    db::recitations::update_metadata(
        &state.db,
        id,
        title,
        artist_name,
        artist_url,
        source_name,
        source_url,
    )
    .await?;

    let recitation = db::recitations::get_recitation(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Recitation not found: {}", id)))?;

    Ok(Json(recitation))
}

/// PUT /recitations/:id/moderate
///
/// Approve schedules publication; reject marks the recitation
/// synchronized (nothing further to publish) and notifies the owner;
/// fix-requested only notifies.
pub async fn moderate_recitation(
    State(state): State<AppState>,
    UserId(moderator_id): UserId,
    Path(id): Path<i64>,
    Json(request): Json<ModerateRequest>,
) -> ApiResult<Json<Recitation>> {
    let recitation = db::recitations::get_recitation(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Recitation not found: {}", id)))?;

    if !recitation.review_status.is_moderatable() {
        return Err(ApiError::Conflict(
            "Recitation must be in draft or pending review status.".to_string(),
        ));
    }

    let new_status = match request.result {
        ModerationResult::Approve => Some(ReviewStatus::Approved),
        ModerationResult::Reject => Some(ReviewStatus::Rejected),
        ModerationResult::FixMetadata => None,
    };
    db::recitations::record_moderation(
        &state.db,
        id,
        new_status,
        moderator_id,
        request.message.as_deref(),
    )
    .await?;

    match request.result {
        ModerationResult::Approve => {
            let replace = recitation.sync_status == SyncStatus::FilesChanged;
            state.queue.enqueue(Job::PublishRecitation {
                recitation_id: id,
                replace,
            });
            tracing::info!(recitation_id = id, "Recitation approved, publication scheduled");
        }
        ModerationResult::Reject => {
            // Nothing left to publish for a rejected item
            db::recitations::set_sync_status(&state.db, id, SyncStatus::Synchronized).await?;
            notify(
                &state,
                recitation.user_id,
                "Recitation rejected",
                "Your submitted recitation was not accepted.",
            )
            .await;
            tracing::info!(recitation_id = id, "Recitation rejected");
        }
        ModerationResult::FixMetadata => {
            notify(
                &state,
                recitation.user_id,
                "Recitation needs changes",
                "Your recitation has been reviewed and needs changes before it can be accepted.",
            )
            .await;
        }
    }

    let recitation = db::recitations::get_recitation(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Recitation not found: {}", id)))?;

    Ok(Json(recitation))
}

async fn notify(state: &AppState, user_id: uuid::Uuid, subject: &str, body: &str) {
    if let Err(e) = state.notifier.push(user_id, subject, body).await {
        tracing::warn!(user_id = %user_id, error = %e, "Notification failed");
    }
}

/// Attribution validation shared with profile rules: artist name shape
/// and absolute http(s) URLs
fn attribution_error(artist_name: &str, artist_url: &str, source_url: &str) -> Option<String> {
    if artist_name.chars().count() < 3 {
        return Some("Artist name must be at least three characters long.".to_string());
    }
    if let Some(c) = language::first_not_matching_char(
        artist_name,
        language::PERSIAN_ALPHABET,
        language::NAME_SEPARATORS,
    ) {
        return Some(format!(
            "Artist name may only contain Persian letters and spaces. First invalid character: {}",
            c
        ));
    }
    if !artist_url.is_empty() && !language::is_absolute_http_url(artist_url) {
        return Some("Artist URL is not a valid absolute http(s) URL.".to_string());
    }
    if !source_url.is_empty() && !language::is_absolute_http_url(source_url) {
        return Some("Source URL is not a valid absolute http(s) URL.".to_string());
    }
    None
}

/// Build recitation routes
pub fn recitation_routes() -> Router<AppState> {
    Router::new()
        .route("/recitations", get(list_recitations))
        .route("/recitations/:id", get(get_recitation).put(update_metadata))
        .route("/recitations/:id/moderate", put(moderate_recitation))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attribution_rules() {
        assert_eq!(attribution_error("حمیدرضا محمدی", "", ""), None);
        assert!(attribution_error("آب", "", "").is_some());
        assert!(attribution_error("John Doe", "", "").is_some());
        assert!(attribution_error("حمیدرضا محمدی", "not-a-url", "").is_some());
        assert!(attribution_error("حمیدرضا محمدی", "", "ftp://x").is_some());
        assert_eq!(
            attribution_error("حمیدرضا محمدی", "https://example.org", ""),
            None
        );
    }
}
