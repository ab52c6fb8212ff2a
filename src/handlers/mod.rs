//! HTTP handlers
//!
//! Thin plumbing over the job service: decode, call, map typed errors to
//! status codes. Authentication happens at the boundary in front of this
//! service; handlers trust the user id it forwards in the X-User-Id header.

pub mod job;
pub mod profile;

use axum::extract::FromRequestParts;
use axum::http::{request::Parts, StatusCode};
use axum::Json;

use crate::models::job::ErrorResponse;
use crate::services::job_service::JobServiceError;

/// Authenticated user id, as asserted by the identity boundary
pub struct AuthUser(pub String);

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, Json<ErrorResponse>);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get("x-user-id")
            .and_then(|value| value.to_str().ok())
            .filter(|value| !value.is_empty())
            .map(|value| AuthUser(value.to_string()))
            .ok_or((
                StatusCode::UNAUTHORIZED,
                Json(ErrorResponse {
                    error: "Missing authenticated user".to_string(),
                }),
            ))
    }
}

pub(crate) fn error_response(err: JobServiceError) -> (StatusCode, Json<ErrorResponse>) {
    let status = match &err {
        JobServiceError::NotFound(_) => StatusCode::NOT_FOUND,
        JobServiceError::QuotaExceeded { .. } => StatusCode::FORBIDDEN,
        JobServiceError::InvalidState(_) => StatusCode::BAD_REQUEST,
        JobServiceError::RetryLimitExceeded => StatusCode::BAD_REQUEST,
        JobServiceError::InvalidPasskey => StatusCode::FORBIDDEN,
        JobServiceError::Database(db_err) => {
            tracing::error!("Database error: {}", db_err);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };

    (status, Json(ErrorResponse { error: err.to_string() }))
}
