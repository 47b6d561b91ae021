//! Acting user extraction
//!
//! The identity/session system is an external collaborator; it fronts
//! this service and forwards the authenticated user id in the
//! `X-User-Id` header.

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

use crate::error::ApiError;

/// The authenticated user a request acts as
#[derive(Debug, Clone, Copy)]
pub struct UserId(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for UserId
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get("x-user-id")
            .ok_or_else(|| ApiError::BadRequest("Missing X-User-Id header".to_string()))?
            .to_str()
            .map_err(|_| ApiError::BadRequest("Invalid X-User-Id header".to_string()))?;

        Uuid::parse_str(value)
            .map(UserId)
            .map_err(|_| ApiError::BadRequest("Invalid X-User-Id header".to_string()))
    }
}
