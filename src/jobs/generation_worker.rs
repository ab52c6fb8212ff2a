//! Background generation worker
//!
//! Single logical worker: polls for the oldest QUEUED job, claims it with a
//! conditional update on status (zero rows affected means another actor won
//! and we walk away), runs generation, and records the terminal outcome
//! together with its history entry in one transaction. The database row is
//! the only coordination medium; there are no in-memory locks.

use std::time::Duration;

use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, Order, PaginatorTrait, QueryFilter, QueryOrder,
    TransactionTrait,
};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::entities::{generated_images, generation_jobs, prelude::*};
use crate::models::job::GenerationStatus;
use crate::services::generation::{GenerateImageParams, GenerationService};
use crate::services::job_service::append_history;

/// Run the worker until the shutdown token flips. The token is owned by the
/// caller; the loop holds no global run state. An in-flight job finishes its
/// transaction before the task exits.
pub fn start_generation_worker(
    db: DatabaseConnection,
    generation: GenerationService,
    poll_interval_secs: u64,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let poll_interval = Duration::from_secs(poll_interval_secs);
        tracing::info!("Generation worker started (poll every {:?})", poll_interval);

        loop {
            if *shutdown.borrow() {
                break;
            }

            match find_next_queued(&db).await {
                Ok(Some(job_id)) => {
                    tracing::info!("Processing job {}", job_id);
                    if let Err(err) = process_generation_job(&db, &generation, &job_id).await {
                        tracing::error!("Job {} failed: {}", job_id, err);
                        sleep_or_shutdown(&mut shutdown, poll_interval).await;
                    } else {
                        tracing::info!("Job {} done", job_id);
                    }
                }
                Ok(None) => {
                    sleep_or_shutdown(&mut shutdown, poll_interval).await;
                }
                Err(err) => {
                    // Store unreachable: log and keep polling, never crash
                    tracing::error!("Worker poll failed: {}", err);
                    sleep_or_shutdown(&mut shutdown, poll_interval).await;
                }
            }
        }

        tracing::info!("Generation worker stopped");
    })
}

async fn sleep_or_shutdown(shutdown: &mut watch::Receiver<bool>, interval: Duration) {
    tokio::select! {
        _ = tokio::time::sleep(interval) => {}
        _ = shutdown.changed() => {}
    }
}

/// Oldest QUEUED job first (FIFO by creation time)
async fn find_next_queued(db: &DatabaseConnection) -> Result<Option<String>, sea_orm::DbErr> {
    let job = GenerationJobs::find()
        .filter(generation_jobs::Column::Status.eq(GenerationStatus::Queued.as_str()))
        .order_by(generation_jobs::Column::CreatedAt, Order::Asc)
        .order_by(generation_jobs::Column::Id, Order::Asc)
        .one(db)
        .await?;
    Ok(job.map(|j| j.id))
}

/// Process one job id. Safe to call concurrently or repeatedly for the same
/// job: the conditional claim and the already-generated short-circuit make
/// every path but the first a no-op, and a crashed run is recovered on the
/// next call without re-invoking the provider.
pub async fn process_generation_job(
    db: &DatabaseConnection,
    generation: &GenerationService,
    job_id: &str,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Fresh fetch: the job may have moved since the poll
    let job = GenerationJobs::find_by_id(job_id)
        .one(db)
        .await?
        .ok_or("Job not found")?;

    let status: GenerationStatus = job.status.parse()?;

    if status == GenerationStatus::Completed {
        return Ok(());
    }

    // Crash recovery: output exists but the terminal transition never
    // committed. Close the job out without calling the provider again.
    let existing_outputs = GeneratedImages::find()
        .filter(generated_images::Column::JobId.eq(&job.id))
        .count(db)
        .await?;

    if existing_outputs > 0
        && matches!(status, GenerationStatus::Queued | GenerationStatus::Processing)
    {
        let now = Utc::now().fixed_offset();
        let txn = db.begin().await?;
        GenerationJobs::update_many()
            .col_expr(
                generation_jobs::Column::Status,
                Expr::value(GenerationStatus::Completed.as_str()),
            )
            .col_expr(generation_jobs::Column::CompletedAt, Expr::value(now))
            .col_expr(generation_jobs::Column::UpdatedAt, Expr::value(now))
            .filter(generation_jobs::Column::Id.eq(&job.id))
            .exec(&txn)
            .await?;
        append_history(
            &txn,
            &job.id,
            &job.user_id,
            GenerationStatus::Completed,
            Some("Output already generated".to_string()),
        )
        .await?;
        txn.commit().await?;

        tracing::info!("Job {} already had an output, marked completed", job.id);
        return Ok(());
    }

    if status != GenerationStatus::Queued {
        // Someone else already advanced it
        return Ok(());
    }

    // Claim: compare-and-swap on status. Zero rows affected means we lost.
    let now = Utc::now().fixed_offset();
    let claim = GenerationJobs::update_many()
        .col_expr(
            generation_jobs::Column::Status,
            Expr::value(GenerationStatus::Processing.as_str()),
        )
        .col_expr(generation_jobs::Column::StartedAt, Expr::value(now))
        .col_expr(
            generation_jobs::Column::ErrorMessage,
            Expr::value(Option::<String>::None),
        )
        .col_expr(generation_jobs::Column::UpdatedAt, Expr::value(now))
        .filter(generation_jobs::Column::Id.eq(&job.id))
        .filter(generation_jobs::Column::Status.eq(GenerationStatus::Queued.as_str()))
        .exec(db)
        .await?;

    if claim.rows_affected == 0 {
        return Ok(());
    }

    append_history(
        db,
        &job.id,
        &job.user_id,
        GenerationStatus::Processing,
        Some("Job started".to_string()),
    )
    .await?;

    match run_generation(db, generation, &job).await {
        Ok(descriptor) => {
            let now = Utc::now().fixed_offset();
            let txn = db.begin().await?;
            GenerationJobs::update_many()
                .col_expr(
                    generation_jobs::Column::Status,
                    Expr::value(GenerationStatus::Completed.as_str()),
                )
                .col_expr(generation_jobs::Column::CompletedAt, Expr::value(now))
                .col_expr(generation_jobs::Column::UpdatedAt, Expr::value(now))
                .filter(generation_jobs::Column::Id.eq(&job.id))
                .exec(&txn)
                .await?;
            append_history(
                &txn,
                &job.id,
                &job.user_id,
                GenerationStatus::Completed,
                Some(descriptor),
            )
            .await?;
            txn.commit().await?;
            Ok(())
        }
        Err(err) => {
            let message = err.to_string();
            let now = Utc::now().fixed_offset();
            let txn = db.begin().await?;
            GenerationJobs::update_many()
                .col_expr(
                    generation_jobs::Column::Status,
                    Expr::value(GenerationStatus::Failed.as_str()),
                )
                .col_expr(generation_jobs::Column::CompletedAt, Expr::value(now))
                .col_expr(
                    generation_jobs::Column::ErrorMessage,
                    Expr::value(Some(message.clone())),
                )
                .col_expr(generation_jobs::Column::UpdatedAt, Expr::value(now))
                .filter(generation_jobs::Column::Id.eq(&job.id))
                .exec(&txn)
                .await?;
            append_history(
                &txn,
                &job.id,
                &job.user_id,
                GenerationStatus::Failed,
                Some(message),
            )
            .await?;
            txn.commit().await?;
            Err(err)
        }
    }
}

async fn run_generation(
    db: &DatabaseConnection,
    generation: &GenerationService,
    job: &generation_jobs::Model,
) -> Result<String, Box<dyn std::error::Error + Send + Sync>> {
    let style = StyleConfigs::find_by_id(&job.style_config_id)
        .one(db)
        .await?
        .ok_or("Style configuration missing")?;

    let input_image = UploadedImages::find_by_id(&job.input_image_id)
        .one(db)
        .await?
        .ok_or("Input image missing")?;

    let artifact = generation
        .generate(
            db,
            GenerateImageParams {
                user_id: job.user_id.clone(),
                job_id: Some(job.id.clone()),
                style,
                input_image_id: Some(input_image.id.clone()),
                input_image_bucket: input_image.storage_bucket,
                input_image_path: input_image.storage_path,
                seed: None,
                user_prompt: job.prompt.clone(),
                user_negative_prompt: None,
            },
        )
        .await?;

    // History message carries the output descriptor as a small JSON payload
    Ok(serde_json::json!({
        "outputUrl": artifact.url,
        "storageBucket": artifact.storage_bucket,
        "storagePath": artifact.storage_path,
        "contentType": artifact.content_type,
    })
    .to_string())
}
