//! Read-only style preset lookups
//!
//! Presets change rarely, so active lookups are cached for a few minutes.
//! The catalog's CRUD lives elsewhere; the pipeline only validates and
//! reads.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};

use crate::entities::{prelude::*, style_configs};
use crate::services::job_service::JobServiceError;

#[derive(Clone)]
pub struct StyleCatalogService {
    cache: Arc<Cache<String, style_configs::Model>>,
}

impl StyleCatalogService {
    pub fn new(ttl_secs: u64) -> Self {
        let cache = Cache::builder()
            .max_capacity(256)
            .time_to_live(Duration::from_secs(ttl_secs))
            .build();

        Self { cache: Arc::new(cache) }
    }

    /// Look up a style that exists and is active; inactive presets are
    /// indistinguishable from missing ones for callers
    pub async fn get_active_style(
        &self,
        db: &DatabaseConnection,
        style_id: &str,
    ) -> Result<style_configs::Model, JobServiceError> {
        if let Some(style) = self.cache.get(style_id).await {
            return Ok(style);
        }

        let style = StyleConfigs::find()
            .filter(style_configs::Column::Id.eq(style_id))
            .filter(style_configs::Column::IsActive.eq(true))
            .one(db)
            .await?
            .ok_or(JobServiceError::NotFound("Style configuration not found"))?;

        self.cache.insert(style_id.to_string(), style.clone()).await;
        Ok(style)
    }
}
