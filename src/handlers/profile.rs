use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;

use crate::handlers::{error_response, AuthUser};
use crate::models::job::ErrorResponse;
use crate::models::quota::{DevModeRequest, DevModeResponse, GenerationLimit};
use crate::services::quota;
use crate::AppState;

pub async fn get_generation_limit(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<GenerationLimit>, (StatusCode, Json<ErrorResponse>)> {
    let limit = quota::check_generation_limit(&state.db, &state.config, &user_id)
        .await
        .map_err(error_response)?;
    Ok(Json(limit))
}

pub async fn toggle_dev_mode(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<DevModeRequest>,
) -> Result<Json<DevModeResponse>, (StatusCode, Json<ErrorResponse>)> {
    let is_dev_mode = quota::toggle_dev_mode(
        &state.db,
        &state.config,
        &user_id,
        &payload.passkey,
        payload.activate,
    )
    .await
    .map_err(error_response)?;

    Ok(Json(DevModeResponse { is_dev_mode }))
}
