//! Integration tests for the worker state machine: claim, terminal
//! transitions, idempotence and crash recovery, all through the public
//! process function with stubbed storage and provider.

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;

use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, IntoActiveModel, PaginatorTrait, QueryFilter, QueryOrder, Set};

use artmorph_backend::entities::{generated_images, generation_history, generation_jobs, prelude::*};
use artmorph_backend::jobs::generation_worker::process_generation_job;
use artmorph_backend::models::job::GenerationStatus;
use artmorph_backend::services::generation::GenerationService;
use artmorph_backend::services::job_service::{self, CreateJobParams};
use artmorph_backend::services::provider::{ImageProvider, ProviderChain};
use artmorph_backend::services::style_catalog::StyleCatalogService;

use crate::common::{
    insert_style, insert_uploaded_image, insert_user, setup_test_db, test_config, MemoryStorage,
    StubBehavior, StubProvider,
};

fn generation_service(
    storage: Arc<MemoryStorage>,
    provider: Arc<StubProvider>,
) -> GenerationService {
    GenerationService::new(
        storage,
        ProviderChain::new(vec![provider as Arc<dyn ImageProvider>]),
        "generated_images".to_string(),
        600,
        "test/model".to_string(),
    )
}

struct Fixture {
    db: DatabaseConnection,
    job: generation_jobs::Model,
    storage: Arc<MemoryStorage>,
}

/// Seeded user, style, uploaded input object, and one queued job
async fn queued_job_fixture() -> Fixture {
    let db = setup_test_db().await.unwrap();
    let user = insert_user(&db, false).await;
    let image = insert_uploaded_image(&db, &user.id).await;
    let style = insert_style(&db, true).await;

    let storage = MemoryStorage::with_object(
        &image.storage_bucket,
        &image.storage_path,
        vec![0x89, 0x50, 0x4e, 0x47],
    );

    let job = job_service::create_job(
        &db,
        &test_config(),
        &StyleCatalogService::new(60),
        CreateJobParams {
            user_id: user.id.clone(),
            input_image_id: image.id.clone(),
            style_config_id: style.id.clone(),
            prompt: Some("keep the lighthouse".to_string()),
        },
    )
    .await
    .unwrap();

    Fixture { db, job, storage }
}

async fn history_statuses(db: &DatabaseConnection, job_id: &str) -> Vec<String> {
    GenerationHistory::find()
        .filter(generation_history::Column::JobId.eq(job_id))
        .order_by_asc(generation_history::Column::CreatedAt)
        .order_by_asc(generation_history::Column::Id)
        .all(db)
        .await
        .unwrap()
        .into_iter()
        .map(|entry| entry.status)
        .collect()
}

async fn reload(db: &DatabaseConnection, job_id: &str) -> generation_jobs::Model {
    GenerationJobs::find_by_id(job_id).one(db).await.unwrap().unwrap()
}

#[tokio::test]
async fn successful_run_completes_job_with_artifact_and_history() {
    let fixture = queued_job_fixture().await;
    let (provider, calls) = StubProvider::new(StubBehavior::Succeed);
    let generation = generation_service(fixture.storage.clone(), provider);

    process_generation_job(&fixture.db, &generation, &fixture.job.id)
        .await
        .unwrap();

    let job = reload(&fixture.db, &fixture.job.id).await;
    assert_eq!(job.status, GenerationStatus::Completed.as_str());
    assert!(job.completed_at.is_some());
    assert!(job.started_at.is_some());
    assert!(job.error_message.is_none());
    assert_eq!(job.retry_count, 0);

    let outputs = GeneratedImages::find()
        .filter(generated_images::Column::JobId.eq(&fixture.job.id))
        .count(&fixture.db)
        .await
        .unwrap();
    assert_eq!(outputs, 1);

    // input object plus the stored artifact
    assert_eq!(fixture.storage.object_count(), 2);
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    assert_eq!(
        history_statuses(&fixture.db, &fixture.job.id).await,
        vec!["QUEUED", "PROCESSING", "COMPLETED"]
    );

    // Terminal entry carries the output descriptor
    let last = GenerationHistory::find()
        .filter(generation_history::Column::JobId.eq(&fixture.job.id))
        .order_by_desc(generation_history::Column::Id)
        .one(&fixture.db)
        .await
        .unwrap()
        .unwrap();
    let payload: serde_json::Value = serde_json::from_str(last.message.as_deref().unwrap()).unwrap();
    assert_eq!(payload["storageBucket"], "generated_images");
    assert_eq!(payload["contentType"], "image/png");
}

#[tokio::test]
async fn provider_timeout_fails_job_without_consuming_retries() {
    let fixture = queued_job_fixture().await;
    let (provider, calls) = StubProvider::new(StubBehavior::Timeout);
    let generation = generation_service(fixture.storage.clone(), provider);

    let result = process_generation_job(&fixture.db, &generation, &fixture.job.id).await;
    assert!(result.is_err());

    let job = reload(&fixture.db, &fixture.job.id).await;
    assert_eq!(job.status, GenerationStatus::Failed.as_str());
    assert!(job.completed_at.is_some());
    assert!(job.error_message.as_deref().unwrap().contains("timed out"));
    assert_eq!(job.retry_count, 0);
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let outputs = GeneratedImages::find()
        .filter(generated_images::Column::JobId.eq(&fixture.job.id))
        .count(&fixture.db)
        .await
        .unwrap();
    assert_eq!(outputs, 0);

    assert_eq!(
        history_statuses(&fixture.db, &fixture.job.id).await,
        vec!["QUEUED", "PROCESSING", "FAILED"]
    );
}

#[tokio::test]
async fn retried_job_reprocesses_independently() {
    let fixture = queued_job_fixture().await;
    let (provider, _) = StubProvider::new(StubBehavior::Timeout);
    let generation = generation_service(fixture.storage.clone(), provider);

    process_generation_job(&fixture.db, &generation, &fixture.job.id)
        .await
        .unwrap_err();

    let job = reload(&fixture.db, &fixture.job.id).await;
    let retried = job_service::retry_job(&fixture.db, &job.id, &job.user_id).await.unwrap();
    assert_eq!(retried.status, GenerationStatus::Queued.as_str());
    assert_eq!(retried.retry_count, 1);
    assert!(retried.error_message.is_none());

    let (provider, calls) = StubProvider::new(StubBehavior::Succeed);
    let generation = generation_service(fixture.storage.clone(), provider);
    process_generation_job(&fixture.db, &generation, &fixture.job.id)
        .await
        .unwrap();

    let job = reload(&fixture.db, &fixture.job.id).await;
    assert_eq!(job.status, GenerationStatus::Completed.as_str());
    assert_eq!(job.retry_count, 1);
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    assert_eq!(
        history_statuses(&fixture.db, &fixture.job.id).await,
        vec!["QUEUED", "PROCESSING", "FAILED", "QUEUED", "PROCESSING", "COMPLETED"]
    );
}

#[tokio::test]
async fn processing_a_completed_job_never_calls_the_provider() {
    let fixture = queued_job_fixture().await;
    let (provider, calls) = StubProvider::new(StubBehavior::Succeed);
    let generation = generation_service(fixture.storage.clone(), provider);

    process_generation_job(&fixture.db, &generation, &fixture.job.id)
        .await
        .unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    let history_before = history_statuses(&fixture.db, &fixture.job.id).await;

    // Second run is a no-op
    process_generation_job(&fixture.db, &generation, &fixture.job.id)
        .await
        .unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(history_statuses(&fixture.db, &fixture.job.id).await, history_before);
}

#[tokio::test]
async fn existing_output_short_circuits_to_completed() {
    let fixture = queued_job_fixture().await;

    // Crash recovery: the artifact row exists but the job never reached a
    // terminal status
    generated_images::ActiveModel {
        id: Set(uuid::Uuid::new_v4().to_string()),
        user_id: Set(fixture.job.user_id.clone()),
        job_id: Set(Some(fixture.job.id.clone())),
        source_image_id: Set(Some(fixture.job.input_image_id.clone())),
        storage_bucket: Set("generated_images".to_string()),
        storage_path: Set("users/x/generated/recovered.png".to_string()),
        created_at: Set(chrono::Utc::now().fixed_offset()),
    }
    .insert(&fixture.db)
    .await
    .unwrap();

    let (provider, calls) = StubProvider::new(StubBehavior::Succeed);
    let generation = generation_service(fixture.storage.clone(), provider);

    process_generation_job(&fixture.db, &generation, &fixture.job.id)
        .await
        .unwrap();

    let job = reload(&fixture.db, &fixture.job.id).await;
    assert_eq!(job.status, GenerationStatus::Completed.as_str());
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    let history = GenerationHistory::find()
        .filter(generation_history::Column::JobId.eq(&fixture.job.id))
        .order_by_desc(generation_history::Column::Id)
        .one(&fixture.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(history.status, GenerationStatus::Completed.as_str());
    assert_eq!(history.message.as_deref(), Some("Output already generated"));
}

#[tokio::test]
async fn non_queued_job_is_left_alone() {
    let fixture = queued_job_fixture().await;

    // Another actor already claimed it
    let mut active = reload(&fixture.db, &fixture.job.id).await.into_active_model();
    active.status = Set(GenerationStatus::Processing.as_str().to_string());
    active.started_at = Set(Some(chrono::Utc::now().fixed_offset()));
    active.update(&fixture.db).await.unwrap();

    let (provider, calls) = StubProvider::new(StubBehavior::Succeed);
    let generation = generation_service(fixture.storage.clone(), provider);

    process_generation_job(&fixture.db, &generation, &fixture.job.id)
        .await
        .unwrap();

    let job = reload(&fixture.db, &fixture.job.id).await;
    assert_eq!(job.status, GenerationStatus::Processing.as_str());
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(history_statuses(&fixture.db, &fixture.job.id).await, vec!["QUEUED"]);
}
