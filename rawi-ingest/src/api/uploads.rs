//! Upload session API
//!
//! POST /uploads, POST /uploads/:id/files, POST /uploads/:id/finalize,
//! GET /uploads/:id, GET /uploads

use axum::{
    extract::{Multipart, Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use rawi_common::paging::{PaginationMetadata, PagingParams};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db;
use crate::error::{ApiError, ApiResult};
use crate::models::upload_session::UNSUPPORTED_EXTENSION_MESSAGE;
use crate::models::{SessionKind, UploadSession, UploadSessionFile};
use crate::queue::Job;
use crate::AppState;

use super::UserId;

const ACCEPTED_EXTENSIONS: [&str; 3] = ["mp3", "xml", "ogg"];

/// POST /uploads request
#[derive(Debug, Default, Deserialize)]
pub struct InitiateSessionRequest {
    /// true when the batch replaces audio of existing recitations
    #[serde(default)]
    pub replace: bool,
}

/// GET /uploads/:id response
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    #[serde(flatten)]
    pub session: UploadSession,
    pub files: Vec<UploadSessionFile>,
}

/// GET /uploads query
#[derive(Debug, Default, Deserialize)]
pub struct HistoryQuery {
    pub page: Option<i64>,
    pub page_size: Option<i64>,
    /// true lists every user's uploads instead of the caller's
    #[serde(default)]
    pub all: bool,
}

impl HistoryQuery {
    fn paging(&self) -> PagingParams {
        let defaults = PagingParams::default();
        PagingParams {
            page: self.page.unwrap_or(defaults.page),
            page_size: self.page_size.unwrap_or(defaults.page_size),
        }
    }
}

/// GET /uploads response
#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub paging: PaginationMetadata,
    pub items: Vec<db::sessions::UploadHistoryItem>,
}

/// POST /uploads
///
/// Initiate a new upload session. Fails when the caller has no default
/// naming profile: placement could neither name nor attribute the files.
pub async fn initiate_session(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    request: Option<Json<InitiateSessionRequest>>,
) -> ApiResult<Json<UploadSession>> {
    let request = request.map(|Json(r)| r).unwrap_or_default();

    if db::profiles::default_profile(&state.db, user_id)
        .await?
        .is_none()
    {
        return Err(ApiError::BadRequest(
            "You have no default naming profile. Define a default profile before uploading \
             recitations."
                .to_string(),
        ));
    }

    let kind = if request.replace {
        SessionKind::ReplaceAudio
    } else {
        SessionKind::NewAudio
    };

    let session = UploadSession::new(user_id, kind);
    db::sessions::insert_session(&state.db, &session).await?;

    tracing::info!(session_id = %session.id, user_id = %user_id, kind = ?kind, "Upload session initiated");

    Ok(Json(session))
}

/// POST /uploads/:session_id/files
///
/// Store one uploaded file. Unrecognized extensions are recorded with a
/// descriptive result message rather than failing the call, so the
/// caller can report per-file outcomes.
pub async fn save_file(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    Path(session_id): Path<Uuid>,
    mut multipart: Multipart,
) -> ApiResult<Json<UploadSessionFile>> {
    let session = load_owned_session(&state, session_id, user_id).await?;
    if session.upload_ended_at.is_some() {
        return Err(ApiError::Conflict(
            "Upload session is already finalized".to_string(),
        ));
    }

    let field = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Malformed multipart body: {}", e)))?
        .ok_or_else(|| ApiError::BadRequest("No file field in request".to_string()))?;

    let name = field.name().unwrap_or("file").to_string();
    let original_filename = field
        .file_name()
        .ok_or_else(|| ApiError::BadRequest("File field carries no filename".to_string()))?
        .to_string();
    // Strip any client-supplied directory components
    let original_filename = std::path::Path::new(&original_filename)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .ok_or_else(|| ApiError::BadRequest("Invalid filename".to_string()))?;
    let content_type = field
        .content_type()
        .unwrap_or("application/octet-stream")
        .to_string();
    let data = field
        .bytes()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Failed to read upload: {}", e)))?;

    let mut file = UploadSessionFile::new(
        session_id,
        name,
        original_filename,
        content_type,
        data.len() as i64,
    );

    let ext = file.extension();
    if !ACCEPTED_EXTENSIONS.contains(&ext.as_str()) {
        file.result_message = UNSUPPORTED_EXTENSION_MESSAGE.to_string();
    } else {
        let temp_dir = &state.config.storage.temp_upload_path;
        tokio::fs::create_dir_all(temp_dir).await?;

        // Collision-avoiding temp name: original filename first, then
        // unique names
        let mut target = temp_dir.join(&file.original_filename);
        while target.exists() {
            target = temp_dir.join(format!("{}.{}", Uuid::new_v4(), ext));
        }
        tokio::fs::write(&target, &data).await?;
        file.temp_path = Some(target.display().to_string());
    }

    db::sessions::insert_file(&state.db, &file).await?;
    tracing::debug!(
        session_id = %session_id,
        file_id = %file.id,
        filename = %file.original_filename,
        stored = file.temp_path.is_some(),
        "Upload file saved"
    );

    Ok(Json(file))
}

/// POST /uploads/:session_id/finalize
///
/// Close the session and schedule the pairing & placement job.
/// Fire-and-forget: returns before the job runs.
pub async fn finalize_session(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    Path(session_id): Path<Uuid>,
) -> ApiResult<Json<UploadSession>> {
    let session = load_owned_session(&state, session_id, user_id).await?;
    if session.upload_ended_at.is_some() {
        return Err(ApiError::Conflict(
            "Upload session is already finalized".to_string(),
        ));
    }

    db::sessions::finalize_session(&state.db, session_id, Utc::now()).await?;
    state.queue.enqueue(Job::ProcessUploadSession { session_id });

    tracing::info!(session_id = %session_id, "Upload session finalized, processing scheduled");

    let session = db::sessions::get_session(&state.db, session_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Upload session not found: {}", session_id)))?;

    Ok(Json(session))
}

/// GET /uploads/:session_id
pub async fn get_session(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    Path(session_id): Path<Uuid>,
) -> ApiResult<Json<SessionResponse>> {
    let session = load_owned_session(&state, session_id, user_id).await?;
    let files = db::sessions::session_files(&state.db, session_id).await?;

    Ok(Json(SessionResponse { session, files }))
}

/// GET /uploads
///
/// Paginated upload history, newest first.
pub async fn list_history(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<Json<HistoryResponse>> {
    let filter = if query.all { None } else { Some(user_id) };
    let (paging, items) = db::sessions::list_history(&state.db, filter, &query.paging()).await?;

    Ok(Json(HistoryResponse { paging, items }))
}

async fn load_owned_session(
    state: &AppState,
    session_id: Uuid,
    user_id: Uuid,
) -> ApiResult<UploadSession> {
    let session = db::sessions::get_session(&state.db, session_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Upload session not found: {}", session_id)))?;

    if session.user_id != user_id {
        return Err(ApiError::Forbidden(
            "Upload session belongs to another user".to_string(),
        ));
    }

    Ok(session)
}

/// Build upload session routes
pub fn upload_routes() -> Router<AppState> {
    Router::new()
        .route("/uploads", post(initiate_session).get(list_history))
        .route("/uploads/:session_id/files", post(save_file))
        .route("/uploads/:session_id/finalize", post(finalize_session))
        .route("/uploads/:session_id", get(get_session))
}
