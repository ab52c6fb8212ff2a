//! Generation job store and service façade
//!
//! Public operations invoked by the HTTP layer: create, list, get, history,
//! retry, delete. All multi-row mutations run in a single transaction so a
//! crash leaves either the old or the new state, never a partial one. The
//! worker loop owns the QUEUED -> PROCESSING -> terminal transitions; this
//! module owns creation, explicit retry and deletion.

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    Order, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::entities::{generated_images, generation_history, generation_jobs, prelude::*, uploaded_images};
use crate::models::job::{GenerationStatus, JobResponse};
use crate::services::quota::check_generation_limit;
use crate::services::storage::ObjectStorage;
use crate::services::style_catalog::StyleCatalogService;

/// Default retry cap for newly created jobs
pub const DEFAULT_MAX_RETRIES: i32 = 3;

#[derive(Debug)]
pub enum JobServiceError {
    NotFound(&'static str),
    QuotaExceeded { limit: i64 },
    InvalidState(&'static str),
    RetryLimitExceeded,
    InvalidPasskey,
    Database(DbErr),
}

impl std::fmt::Display for JobServiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobServiceError::NotFound(msg) => write!(f, "{}", msg),
            JobServiceError::QuotaExceeded { limit } => write!(
                f,
                "Free limit reached ({} generations). Activate Developer Mode for unlimited access.",
                limit
            ),
            JobServiceError::InvalidState(msg) => write!(f, "{}", msg),
            JobServiceError::RetryLimitExceeded => write!(f, "Retry limit reached"),
            JobServiceError::InvalidPasskey => write!(f, "Invalid passkey"),
            JobServiceError::Database(err) => write!(f, "Database error: {}", err),
        }
    }
}

impl std::error::Error for JobServiceError {}

impl From<DbErr> for JobServiceError {
    fn from(err: DbErr) -> Self {
        JobServiceError::Database(err)
    }
}

pub struct CreateJobParams {
    pub user_id: String,
    pub input_image_id: String,
    pub style_config_id: String,
    pub prompt: Option<String>,
}

/// Append a history entry; callers decide the connection (plain or
/// transactional) so the entry commits together with the status change
pub async fn append_history<C: ConnectionTrait>(
    conn: &C,
    job_id: &str,
    user_id: &str,
    status: GenerationStatus,
    message: Option<String>,
) -> Result<(), DbErr> {
    let entry = generation_history::ActiveModel {
        job_id: Set(job_id.to_string()),
        user_id: Set(user_id.to_string()),
        status: Set(status.as_str().to_string()),
        message: Set(message),
        created_at: Set(Utc::now().fixed_offset()),
        ..Default::default()
    };
    entry.insert(conn).await?;
    Ok(())
}

async fn ensure_image_ownership(
    db: &DatabaseConnection,
    user_id: &str,
    input_image_id: &str,
) -> Result<uploaded_images::Model, JobServiceError> {
    UploadedImages::find()
        .filter(uploaded_images::Column::Id.eq(input_image_id))
        .filter(uploaded_images::Column::UserId.eq(user_id))
        .one(db)
        .await?
        .ok_or(JobServiceError::NotFound("Input image not found"))
}

/// Create a new generation job: quota check, ownership/style validation,
/// then the QUEUED row plus its first history entry in one transaction
pub async fn create_job(
    db: &DatabaseConnection,
    config: &AppConfig,
    styles: &StyleCatalogService,
    params: CreateJobParams,
) -> Result<generation_jobs::Model, JobServiceError> {
    let limit = check_generation_limit(db, config, &params.user_id).await?;
    if !limit.can_generate {
        return Err(JobServiceError::QuotaExceeded { limit: limit.limit });
    }

    ensure_image_ownership(db, &params.user_id, &params.input_image_id).await?;
    styles.get_active_style(db, &params.style_config_id).await?;

    let now = Utc::now().fixed_offset();
    let job_id = Uuid::new_v4().to_string();

    let txn = db.begin().await?;

    let job = generation_jobs::ActiveModel {
        id: Set(job_id.clone()),
        user_id: Set(params.user_id.clone()),
        input_image_id: Set(params.input_image_id),
        style_config_id: Set(params.style_config_id),
        prompt: Set(params.prompt),
        status: Set(GenerationStatus::Queued.as_str().to_string()),
        error_message: Set(None),
        retry_count: Set(0),
        max_retries: Set(DEFAULT_MAX_RETRIES),
        queued_at: Set(Some(now)),
        started_at: Set(None),
        completed_at: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
    };
    let job = job.insert(&txn).await?;

    append_history(
        &txn,
        &job.id,
        &params.user_id,
        GenerationStatus::Queued,
        Some("Job queued".to_string()),
    )
    .await?;

    txn.commit().await?;

    tracing::info!("Created generation job {} for user {}", job.id, job.user_id);
    Ok(job)
}

/// Annotate a job row with style metadata and, for completed jobs, a fresh
/// signed URL for the latest output. URL signing is best-effort: a storage
/// failure leaves output_url null rather than failing the read.
pub async fn annotate_job(
    db: &DatabaseConnection,
    storage: &dyn ObjectStorage,
    config: &AppConfig,
    job: generation_jobs::Model,
) -> Result<JobResponse, JobServiceError> {
    let style = StyleConfigs::find_by_id(&job.style_config_id).one(db).await?;

    let mut output_url = None;
    if job.status == GenerationStatus::Completed.as_str() {
        let output = GeneratedImages::find()
            .filter(generated_images::Column::JobId.eq(&job.id))
            .order_by(generated_images::Column::CreatedAt, Order::Desc)
            .one(db)
            .await?;

        if let Some(output) = output {
            match storage
                .create_signed_url(
                    &output.storage_bucket,
                    &output.storage_path,
                    config.generated_url_ttl_secs,
                )
                .await
            {
                Ok(url) => output_url = Some(url),
                Err(err) => {
                    tracing::warn!("Failed to sign output URL for job {}: {}", job.id, err);
                }
            }
        }
    }

    Ok(JobResponse {
        id: job.id,
        status: job.status,
        prompt: job.prompt,
        style_key: style.as_ref().map(|s| s.key.clone()),
        style_name: style.as_ref().map(|s| s.name.clone()),
        output_url,
        error_message: job.error_message,
        retry_count: job.retry_count,
        max_retries: job.max_retries,
        queued_at: job.queued_at.map(|t| t.to_rfc3339()),
        started_at: job.started_at.map(|t| t.to_rfc3339()),
        completed_at: job.completed_at.map(|t| t.to_rfc3339()),
        created_at: job.created_at.to_rfc3339(),
    })
}

/// List the user's jobs, newest first
pub async fn list_jobs(
    db: &DatabaseConnection,
    storage: &dyn ObjectStorage,
    config: &AppConfig,
    user_id: &str,
) -> Result<Vec<JobResponse>, JobServiceError> {
    let jobs = GenerationJobs::find()
        .filter(generation_jobs::Column::UserId.eq(user_id))
        .order_by(generation_jobs::Column::CreatedAt, Order::Desc)
        .all(db)
        .await?;

    let mut responses = Vec::with_capacity(jobs.len());
    for job in jobs {
        responses.push(annotate_job(db, storage, config, job).await?);
    }
    Ok(responses)
}

async fn find_owned_job(
    db: &DatabaseConnection,
    job_id: &str,
    user_id: &str,
) -> Result<generation_jobs::Model, JobServiceError> {
    GenerationJobs::find()
        .filter(generation_jobs::Column::Id.eq(job_id))
        .filter(generation_jobs::Column::UserId.eq(user_id))
        .one(db)
        .await?
        .ok_or(JobServiceError::NotFound("Job not found"))
}

pub async fn get_job(
    db: &DatabaseConnection,
    storage: &dyn ObjectStorage,
    config: &AppConfig,
    job_id: &str,
    user_id: &str,
) -> Result<JobResponse, JobServiceError> {
    let job = find_owned_job(db, job_id, user_id).await?;
    annotate_job(db, storage, config, job).await
}

/// Ordered audit trail for a job the caller owns
pub async fn get_job_history(
    db: &DatabaseConnection,
    job_id: &str,
    user_id: &str,
) -> Result<Vec<generation_history::Model>, JobServiceError> {
    find_owned_job(db, job_id, user_id).await?;

    let entries = GenerationHistory::find()
        .filter(generation_history::Column::JobId.eq(job_id))
        .order_by(generation_history::Column::CreatedAt, Order::Asc)
        .order_by(generation_history::Column::Id, Order::Asc)
        .all(db)
        .await?;
    Ok(entries)
}

/// Reset a FAILED job back to QUEUED for another attempt. Does not re-check
/// quota: a retry re-runs an attempt the quota already paid for.
pub async fn retry_job(
    db: &DatabaseConnection,
    job_id: &str,
    user_id: &str,
) -> Result<generation_jobs::Model, JobServiceError> {
    let job = find_owned_job(db, job_id, user_id).await?;

    if job.status != GenerationStatus::Failed.as_str() {
        return Err(JobServiceError::InvalidState("Only failed jobs can be retried"));
    }
    if job.retry_count >= job.max_retries {
        return Err(JobServiceError::RetryLimitExceeded);
    }

    let now = Utc::now().fixed_offset();
    let retry_count = job.retry_count + 1;

    let txn = db.begin().await?;

    let mut active: generation_jobs::ActiveModel = job.into();
    active.status = Set(GenerationStatus::Queued.as_str().to_string());
    active.retry_count = Set(retry_count);
    active.error_message = Set(None);
    active.queued_at = Set(Some(now));
    active.started_at = Set(None);
    active.completed_at = Set(None);
    active.updated_at = Set(now);
    let updated = active.update(&txn).await?;

    append_history(
        &txn,
        &updated.id,
        user_id,
        GenerationStatus::Queued,
        Some("Retry requested".to_string()),
    )
    .await?;

    txn.commit().await?;

    tracing::info!(
        "Retry requested for job {} (attempt {}/{})",
        updated.id,
        updated.retry_count,
        updated.max_retries
    );
    Ok(updated)
}

/// Delete a job with its history and output records. Stored output objects
/// are removed best-effort first; a storage failure never blocks the row
/// deletion.
pub async fn delete_job(
    db: &DatabaseConnection,
    storage: &dyn ObjectStorage,
    job_id: &str,
    user_id: &str,
) -> Result<(), JobServiceError> {
    let job = find_owned_job(db, job_id, user_id).await?;

    let outputs = GeneratedImages::find()
        .filter(generated_images::Column::JobId.eq(&job.id))
        .all(db)
        .await?;

    for output in &outputs {
        if let Err(err) = storage.delete(&output.storage_bucket, &output.storage_path).await {
            tracing::warn!(
                "Best-effort delete of {}/{} failed: {}",
                output.storage_bucket,
                output.storage_path,
                err
            );
        }
    }

    // history -> generated images -> job, respecting foreign keys
    let txn = db.begin().await?;

    GenerationHistory::delete_many()
        .filter(generation_history::Column::JobId.eq(&job.id))
        .exec(&txn)
        .await?;
    GeneratedImages::delete_many()
        .filter(generated_images::Column::JobId.eq(&job.id))
        .exec(&txn)
        .await?;
    GenerationJobs::delete_by_id(&job.id).exec(&txn).await?;

    txn.commit().await?;

    tracing::info!("Deleted job {} for user {}", job.id, user_id);
    Ok(())
}
