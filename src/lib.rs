// src/lib.rs

use std::sync::Arc;

use sea_orm::DatabaseConnection;

use config::AppConfig;
use services::storage::ObjectStorage;
use services::style_catalog::StyleCatalogService;

#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub config: AppConfig,
    pub storage: Arc<dyn ObjectStorage>,
    pub styles: StyleCatalogService,
}

pub mod entities {
    pub mod prelude;
    pub mod generated_images;
    pub mod generation_history;
    pub mod generation_jobs;
    pub mod style_configs;
    pub mod uploaded_images;
    pub mod user_profiles;
}

pub mod services {
    pub mod generation;
    pub mod hf_space;
    pub mod job_service;
    pub mod prompt;
    pub mod provider;
    pub mod quota;
    pub mod replicate;
    pub mod storage;
    pub mod style_catalog;
}

pub mod config;
pub mod handlers;
pub mod jobs;
pub mod models;
