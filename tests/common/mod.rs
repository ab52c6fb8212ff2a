//! Shared test fixtures: in-memory database, seeded rows, and stub
//! collaborators for the storage and provider seams.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ConnectOptions, Database, DatabaseConnection, DbErr, Set};
use sea_orm_migration::MigratorTrait;
use uuid::Uuid;

use artmorph_backend::config::AppConfig;
use artmorph_backend::entities::{style_configs, uploaded_images, user_profiles};
use artmorph_backend::services::provider::{
    GeneratedOutput, GenerationRequest, ImageProvider, ProviderError,
};
use artmorph_backend::services::storage::{ObjectStorage, StorageError};

/// Fresh in-memory database with the full schema applied. The pool is
/// pinned to one connection: every pooled sqlite connection would otherwise
/// open its own empty in-memory database.
pub async fn setup_test_db() -> Result<DatabaseConnection, DbErr> {
    let mut options = ConnectOptions::new("sqlite::memory:");
    options.max_connections(1);
    let db = Database::connect(options).await?;
    migration::Migrator::up(&db, None).await?;
    Ok(db)
}

pub fn test_config() -> AppConfig {
    AppConfig {
        free_generation_limit: 5,
        generated_url_ttl_secs: 600,
        upload_bucket: "uploaded_images".to_string(),
        generated_bucket: "generated_images".to_string(),
        dev_passkey: "test-passkey".to_string(),
        supabase_url: "http://localhost:54321".to_string(),
        supabase_service_role_key: "test-service-key".to_string(),
        replicate_api_token: None,
        replicate_base_url: "https://api.replicate.com/v1".to_string(),
        hf_api_token: None,
        hf_space: "test/space".to_string(),
        default_model: "test/model".to_string(),
        generation_timeout_secs: 5,
        worker_poll_interval_secs: 1,
    }
}

pub async fn insert_user(db: &DatabaseConnection, dev_mode: bool) -> user_profiles::Model {
    let now = Utc::now().fixed_offset();
    let id = Uuid::new_v4().to_string();
    user_profiles::ActiveModel {
        id: Set(id.clone()),
        email: Set(format!("{}@example.com", id)),
        display_name: Set(Some("Test User".to_string())),
        is_dev_mode: Set(dev_mode),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(db)
    .await
    .expect("insert user profile")
}

pub async fn insert_style(db: &DatabaseConnection, active: bool) -> style_configs::Model {
    let id = Uuid::new_v4().to_string();
    style_configs::ActiveModel {
        id: Set(id.clone()),
        key: Set(format!("style-{}", id)),
        name: Set("Film Noir".to_string()),
        base_model: Set(Some("test/model".to_string())),
        prompt_prefix: Set(Some("Transform this image into a film noir scene.".to_string())),
        prompt_suffix: Set(Some("High contrast lighting.".to_string())),
        negative_prompt: Set(None),
        controlnet_module: Set(None),
        controlnet_weight: Set(None),
        guidance_scale: Set(Some(2.5)),
        strength: Set(None),
        prompt_template: Set(None),
        params: Set(Some(serde_json::json!({ "steps": 28 }))),
        is_active: Set(active),
        created_at: Set(Utc::now().fixed_offset()),
    }
    .insert(db)
    .await
    .expect("insert style config")
}

pub async fn insert_uploaded_image(
    db: &DatabaseConnection,
    user_id: &str,
) -> uploaded_images::Model {
    let id = Uuid::new_v4().to_string();
    uploaded_images::ActiveModel {
        id: Set(id.clone()),
        user_id: Set(user_id.to_string()),
        storage_bucket: Set("uploaded_images".to_string()),
        storage_path: Set(format!("users/{}/uploads/{}.png", user_id, id)),
        content_type: Set(Some("image/png".to_string())),
        created_at: Set(Utc::now().fixed_offset()),
    }
    .insert(db)
    .await
    .expect("insert uploaded image")
}

/// In-memory object store keyed by "bucket/path"
#[derive(Default)]
pub struct MemoryStorage {
    pub objects: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryStorage {
    pub fn with_object(bucket: &str, path: &str, bytes: Vec<u8>) -> Arc<Self> {
        let storage = Self::default();
        storage
            .objects
            .lock()
            .unwrap()
            .insert(format!("{}/{}", bucket, path), bytes);
        Arc::new(storage)
    }

    pub fn object_count(&self) -> usize {
        self.objects.lock().unwrap().len()
    }
}

#[async_trait]
impl ObjectStorage for MemoryStorage {
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        _content_type: &str,
    ) -> Result<(), StorageError> {
        self.objects
            .lock()
            .unwrap()
            .insert(format!("{}/{}", bucket, path), bytes);
        Ok(())
    }

    async fn download(&self, bucket: &str, path: &str) -> Result<Vec<u8>, StorageError> {
        self.objects
            .lock()
            .unwrap()
            .get(&format!("{}/{}", bucket, path))
            .cloned()
            .ok_or_else(|| StorageError(format!("no such object {}/{}", bucket, path)))
    }

    async fn create_signed_url(
        &self,
        bucket: &str,
        path: &str,
        _ttl_secs: u32,
    ) -> Result<String, StorageError> {
        Ok(format!("https://storage.test/sign/{}/{}", bucket, path))
    }

    async fn delete(&self, bucket: &str, path: &str) -> Result<(), StorageError> {
        self.objects
            .lock()
            .unwrap()
            .remove(&format!("{}/{}", bucket, path));
        Ok(())
    }
}

#[derive(Clone, Copy)]
pub enum StubBehavior {
    Succeed,
    Timeout,
}

/// Provider stub that counts calls, so tests can assert the idempotence
/// paths never reach the backend
pub struct StubProvider {
    pub behavior: StubBehavior,
    pub calls: Arc<AtomicUsize>,
}

impl StubProvider {
    pub fn new(behavior: StubBehavior) -> (Arc<Self>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (
            Arc::new(Self {
                behavior,
                calls: calls.clone(),
            }),
            calls,
        )
    }
}

#[async_trait]
impl ImageProvider for StubProvider {
    fn name(&self) -> &'static str {
        "stub"
    }

    async fn generate(
        &self,
        _request: &GenerationRequest,
    ) -> Result<GeneratedOutput, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.behavior {
            StubBehavior::Succeed => Ok(GeneratedOutput {
                image: vec![0x89, 0x50, 0x4e, 0x47, 0x0d, 0x0a, 0x1a, 0x0a],
                content_type: "image/png".to_string(),
            }),
            StubBehavior::Timeout => Err(ProviderError::Timeout(
                "prediction still processing after 5s".to_string(),
            )),
        }
    }
}
