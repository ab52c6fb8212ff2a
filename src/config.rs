//! Application configuration loaded from the environment
//!
//! Read once in main; handlers and the worker receive a clone through
//! AppState.

use std::env;

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Free-tier generation cap; dev-mode profiles bypass it
    pub free_generation_limit: i64,
    /// TTL for signed output URLs handed to clients
    pub generated_url_ttl_secs: u32,
    pub upload_bucket: String,
    pub generated_bucket: String,
    /// Shared passkey required to activate developer mode
    pub dev_passkey: String,
    pub supabase_url: String,
    pub supabase_service_role_key: String,
    /// Primary provider credential; when absent the chain starts at the
    /// fallback Space
    pub replicate_api_token: Option<String>,
    pub replicate_base_url: String,
    pub hf_api_token: Option<String>,
    pub hf_space: String,
    pub default_model: String,
    /// Hard ceiling on a single provider generation attempt
    pub generation_timeout_secs: u64,
    pub worker_poll_interval_secs: u64,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let replicate_api_token = env::var("REPLICATE_API_TOKEN").ok().filter(|v| !v.is_empty());
        let hf_api_token = env::var("HF_API_TOKEN").ok().filter(|v| !v.is_empty());

        Self {
            free_generation_limit: env::var("FREE_GENERATION_LIMIT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(5),
            generated_url_ttl_secs: env::var("GENERATED_URL_TTL_SECONDS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(600),
            upload_bucket: env::var("SUPABASE_STORAGE_BUCKET")
                .unwrap_or_else(|_| "uploaded_images".to_string()),
            generated_bucket: env::var("SUPABASE_GENERATED_BUCKET")
                .unwrap_or_else(|_| "generated_images".to_string()),
            dev_passkey: env::var("DEV_PASSKEY").unwrap_or_else(|_| "artmorph-dev-2026".to_string()),
            supabase_url: env::var("SUPABASE_URL").expect("SUPABASE_URL must be set"),
            supabase_service_role_key: env::var("SUPABASE_SERVICE_ROLE_KEY")
                .expect("SUPABASE_SERVICE_ROLE_KEY must be set"),
            replicate_api_token,
            replicate_base_url: env::var("REPLICATE_BASE_URL")
                .unwrap_or_else(|_| "https://api.replicate.com/v1".to_string()),
            hf_api_token,
            hf_space: env::var("HF_DEFAULT_SPACE")
                .unwrap_or_else(|_| "black-forest-labs/FLUX.1-Kontext-Dev".to_string()),
            default_model: env::var("HF_DEFAULT_MODEL")
                .unwrap_or_else(|_| "black-forest-labs/FLUX.1-Kontext-dev".to_string()),
            generation_timeout_secs: env::var("GENERATION_TIMEOUT_SECONDS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(180),
            worker_poll_interval_secs: env::var("WORKER_POLL_INTERVAL_SECONDS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(2),
        }
    }
}
