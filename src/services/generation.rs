//! Generation orchestration
//!
//! Glue between the job worker and the outside world: download the input,
//! compose prompts, call the provider chain, store the output and record
//! the generated_images row. Returns the output descriptor the worker puts
//! into the job's history.

use std::sync::Arc;

use chrono::Utc;
use sea_orm::{ActiveModelTrait, DatabaseConnection, DbErr, Set};
use uuid::Uuid;

use crate::entities::{generated_images, style_configs};
use crate::services::prompt::{compose_negative_prompt, compose_prompt};
use crate::services::provider::{GenerationRequest, ProviderChain, ProviderError};
use crate::services::storage::{extension_for, ObjectStorage, StorageError};

#[derive(Debug)]
pub enum GenerationError {
    Provider(ProviderError),
    Storage(StorageError),
    Database(DbErr),
}

impl std::fmt::Display for GenerationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GenerationError::Provider(err) => write!(f, "{}", err),
            GenerationError::Storage(err) => write!(f, "{}", err),
            GenerationError::Database(err) => write!(f, "Database error: {}", err),
        }
    }
}

impl std::error::Error for GenerationError {}

impl From<ProviderError> for GenerationError {
    fn from(err: ProviderError) -> Self {
        GenerationError::Provider(err)
    }
}

impl From<StorageError> for GenerationError {
    fn from(err: StorageError) -> Self {
        GenerationError::Storage(err)
    }
}

impl From<DbErr> for GenerationError {
    fn from(err: DbErr) -> Self {
        GenerationError::Database(err)
    }
}

pub struct GenerateImageParams {
    pub user_id: String,
    pub job_id: Option<String>,
    pub style: style_configs::Model,
    pub input_image_id: Option<String>,
    pub input_image_bucket: String,
    pub input_image_path: String,
    pub seed: Option<i64>,
    pub user_prompt: Option<String>,
    pub user_negative_prompt: Option<String>,
}

/// Descriptor of a stored output artifact
#[derive(Debug, Clone)]
pub struct GeneratedArtifact {
    pub url: String,
    pub storage_bucket: String,
    pub storage_path: String,
    pub content_type: String,
}

#[derive(Clone)]
pub struct GenerationService {
    storage: Arc<dyn ObjectStorage>,
    providers: ProviderChain,
    generated_bucket: String,
    url_ttl_secs: u32,
    default_model: String,
}

impl GenerationService {
    pub fn new(
        storage: Arc<dyn ObjectStorage>,
        providers: ProviderChain,
        generated_bucket: String,
        url_ttl_secs: u32,
        default_model: String,
    ) -> Self {
        Self {
            storage,
            providers,
            generated_bucket,
            url_ttl_secs,
            default_model,
        }
    }

    fn style_params(style: &style_configs::Model) -> serde_json::Map<String, serde_json::Value> {
        style
            .params
            .as_ref()
            .and_then(|v| v.as_object().cloned())
            .unwrap_or_default()
    }

    /// Controlnet model for conditioning presets, then any explicit model
    /// override, then the style's base model, then the configured default
    fn resolve_model_id(&self, style: &style_configs::Model) -> String {
        let params = Self::style_params(style);
        let override_model = params.get("hfModel").and_then(|v| v.as_str());
        let controlnet_model = params.get("controlnetModel").and_then(|v| v.as_str());

        if style.controlnet_module.is_some() {
            if let Some(model) = controlnet_model {
                return model.to_string();
            }
        }

        override_model
            .map(str::to_string)
            .or_else(|| style.base_model.clone())
            .unwrap_or_else(|| self.default_model.clone())
    }

    pub async fn generate(
        &self,
        db: &DatabaseConnection,
        params: GenerateImageParams,
    ) -> Result<GeneratedArtifact, GenerationError> {
        let input_image = self
            .storage
            .download(&params.input_image_bucket, &params.input_image_path)
            .await?;

        let style = &params.style;
        let style_params = Self::style_params(style);

        let prompt = compose_prompt(style, params.user_prompt.as_deref());
        let negative_prompt = compose_negative_prompt(style, params.user_negative_prompt.as_deref());

        let wants_control = style.controlnet_module.is_some()
            || style_params.contains_key("controlnetModel")
            || style_params.contains_key("controlnetConditioningScale");

        let request = GenerationRequest {
            model: self.resolve_model_id(style),
            prompt,
            // conditioning-only parameters are omitted for plain presets
            negative_prompt: if wants_control && !negative_prompt.is_empty() {
                Some(negative_prompt)
            } else {
                None
            },
            control_image: if wants_control { Some(input_image.clone()) } else { None },
            input_image,
            guidance_scale: style
                .guidance_scale
                .or_else(|| style_params.get("guidanceScale").and_then(|v| v.as_f64())),
            num_inference_steps: style_params
                .get("steps")
                .and_then(|v| v.as_u64())
                .map(|v| v as u32),
            strength: style
                .strength
                .or_else(|| style_params.get("strength").and_then(|v| v.as_f64())),
            seed: params
                .seed
                .or_else(|| style_params.get("seed").and_then(|v| v.as_i64())),
            controlnet_conditioning_scale: if wants_control {
                style.controlnet_weight.or_else(|| {
                    style_params
                        .get("controlnetConditioningScale")
                        .and_then(|v| v.as_f64())
                })
            } else {
                None
            },
        };

        let output = self.providers.generate(&request).await?;

        let ext = extension_for(&output.content_type);
        let object_path = format!("users/{}/generated/{}{}", params.user_id, Uuid::new_v4(), ext);

        self.storage
            .upload(
                &self.generated_bucket,
                &object_path,
                output.image,
                &output.content_type,
            )
            .await?;

        let url = self
            .storage
            .create_signed_url(&self.generated_bucket, &object_path, self.url_ttl_secs)
            .await?;

        let record = generated_images::ActiveModel {
            id: Set(Uuid::new_v4().to_string()),
            user_id: Set(params.user_id.clone()),
            job_id: Set(params.job_id.clone()),
            source_image_id: Set(params.input_image_id.clone()),
            storage_bucket: Set(self.generated_bucket.clone()),
            storage_path: Set(object_path.clone()),
            created_at: Set(Utc::now().fixed_offset()),
        };
        record.insert(db).await?;

        Ok(GeneratedArtifact {
            url,
            storage_bucket: self.generated_bucket.clone(),
            storage_path: object_path,
            content_type: output.content_type,
        })
    }
}
