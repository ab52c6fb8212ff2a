use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;

use crate::handlers::{error_response, AuthUser};
use crate::models::job::{CreateJobRequest, ErrorResponse, HistoryEntryResponse, JobResponse};
use crate::services::job_service::{self, CreateJobParams};
use crate::AppState;

pub async fn create_job(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<CreateJobRequest>,
) -> Result<(StatusCode, Json<JobResponse>), (StatusCode, Json<ErrorResponse>)> {
    let job = job_service::create_job(
        &state.db,
        &state.config,
        &state.styles,
        CreateJobParams {
            user_id,
            input_image_id: payload.input_image_id,
            style_config_id: payload.style_config_id,
            prompt: payload.prompt,
        },
    )
    .await
    .map_err(error_response)?;

    let response = job_service::annotate_job(&state.db, state.storage.as_ref(), &state.config, job)
        .await
        .map_err(error_response)?;

    Ok((StatusCode::CREATED, Json(response)))
}

pub async fn list_jobs(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Vec<JobResponse>>, (StatusCode, Json<ErrorResponse>)> {
    let jobs = job_service::list_jobs(&state.db, state.storage.as_ref(), &state.config, &user_id)
        .await
        .map_err(error_response)?;
    Ok(Json(jobs))
}

pub async fn get_job(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(job_id): Path<String>,
) -> Result<Json<JobResponse>, (StatusCode, Json<ErrorResponse>)> {
    let job = job_service::get_job(&state.db, state.storage.as_ref(), &state.config, &job_id, &user_id)
        .await
        .map_err(error_response)?;
    Ok(Json(job))
}

pub async fn get_job_history(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(job_id): Path<String>,
) -> Result<Json<Vec<HistoryEntryResponse>>, (StatusCode, Json<ErrorResponse>)> {
    let entries = job_service::get_job_history(&state.db, &job_id, &user_id)
        .await
        .map_err(error_response)?;
    Ok(Json(entries.into_iter().map(HistoryEntryResponse::from).collect()))
}

pub async fn retry_job(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(job_id): Path<String>,
) -> Result<Json<JobResponse>, (StatusCode, Json<ErrorResponse>)> {
    let job = job_service::retry_job(&state.db, &job_id, &user_id)
        .await
        .map_err(error_response)?;

    let response = job_service::annotate_job(&state.db, state.storage.as_ref(), &state.config, job)
        .await
        .map_err(error_response)?;
    Ok(Json(response))
}

pub async fn delete_job(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(job_id): Path<String>,
) -> Result<StatusCode, (StatusCode, Json<ErrorResponse>)> {
    job_service::delete_job(&state.db, state.storage.as_ref(), &job_id, &user_id)
        .await
        .map_err(error_response)?;
    Ok(StatusCode::NO_CONTENT)
}
