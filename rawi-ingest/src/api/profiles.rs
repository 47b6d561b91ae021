//! Naming profile API
//!
//! GET/POST /profiles, PUT/DELETE /profiles/:id

use axum::{
    extract::{Path, State},
    routing::{get, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db;
use crate::error::{ApiError, ApiResult};
use crate::models::RecitationProfile;
use crate::AppState;

use super::UserId;

/// Profile create/update request body
#[derive(Debug, Deserialize)]
pub struct ProfileRequest {
    pub name: String,
    pub artist_name: String,
    #[serde(default)]
    pub artist_url: String,
    #[serde(default)]
    pub source_name: String,
    #[serde(default)]
    pub source_url: String,
    pub file_suffix: String,
    #[serde(default)]
    pub is_default: bool,
}

/// DELETE /profiles/:id response
#[derive(Debug, Serialize)]
pub struct DeleteProfileResponse {
    pub deleted: bool,
}

impl ProfileRequest {
    fn into_profile(self, id: Uuid, user_id: Uuid) -> RecitationProfile {
        let mut profile = RecitationProfile {
            id,
            user_id,
            name: self.name,
            artist_name: self.artist_name,
            artist_url: self.artist_url,
            source_name: self.source_name,
            source_url: self.source_url,
            file_suffix: self.file_suffix,
            is_default: self.is_default,
        };
        profile.trim();
        profile
    }
}

/// GET /profiles
pub async fn list_profiles(
    State(state): State<AppState>,
    UserId(user_id): UserId,
) -> ApiResult<Json<Vec<RecitationProfile>>> {
    let profiles = db::profiles::list_profiles(&state.db, user_id).await?;
    Ok(Json(profiles))
}

/// POST /profiles
pub async fn add_profile(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    Json(request): Json<ProfileRequest>,
) -> ApiResult<Json<RecitationProfile>> {
    let profile = request.into_profile(Uuid::new_v4(), user_id);

    if let Some(error) = profile.validation_error() {
        return Err(ApiError::BadRequest(error));
    }
    if db::profiles::name_in_use(&state.db, user_id, &profile.name, None).await? {
        return Err(ApiError::Conflict(
            "You already have another profile with this name.".to_string(),
        ));
    }

    db::profiles::insert_profile(&state.db, &profile).await?;
    tracing::info!(profile_id = %profile.id, user_id = %user_id, "Naming profile created");

    Ok(Json(profile))
}

/// PUT /profiles/:id
pub async fn update_profile(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    Path(id): Path<Uuid>,
    Json(request): Json<ProfileRequest>,
) -> ApiResult<Json<RecitationProfile>> {
    let existing = db::profiles::get_profile(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Profile not found: {}", id)))?;

    if existing.user_id != user_id {
        return Err(ApiError::Forbidden(
            "Profile belongs to another user".to_string(),
        ));
    }

    let profile = request.into_profile(id, user_id);

    if let Some(error) = profile.validation_error() {
        return Err(ApiError::BadRequest(error));
    }
    if db::profiles::name_in_use(&state.db, user_id, &profile.name, Some(id)).await? {
        return Err(ApiError::Conflict(
            "You already have another profile with this name.".to_string(),
        ));
    }

    db::profiles::update_profile(&state.db, &profile).await?;

    Ok(Json(profile))
}

/// DELETE /profiles/:id
///
/// Denied deletions (missing profile, foreign owner) report
/// `deleted: false` rather than an error.
pub async fn delete_profile(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<DeleteProfileResponse>> {
    let deleted = db::profiles::delete_profile(&state.db, id, user_id).await?;
    Ok(Json(DeleteProfileResponse { deleted }))
}

/// Build naming profile routes
pub fn profile_routes() -> Router<AppState> {
    Router::new()
        .route("/profiles", get(list_profiles).post(add_profile))
        .route("/profiles/:id", put(update_profile).delete(delete_profile))
}
