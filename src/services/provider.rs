//! Image-generation provider interface and fallback chain
//!
//! Backends are capability-compatible implementations of one trait; the
//! chain tries them in order until one succeeds. Selection policy lives in
//! main: the primary provider is only added when its credential is
//! configured, so the chain order encodes "primary first, fall through to
//! the Space".

use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine;

use crate::services::storage::detect_content_type;

/// Normalized generation parameters handed to every backend
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub model: String,
    pub prompt: String,
    pub negative_prompt: Option<String>,
    pub input_image: Vec<u8>,
    /// Only set when the style uses structural conditioning
    pub control_image: Option<Vec<u8>>,
    pub guidance_scale: Option<f64>,
    pub num_inference_steps: Option<u32>,
    pub strength: Option<f64>,
    pub seed: Option<i64>,
    pub controlnet_conditioning_scale: Option<f64>,
}

/// Raw output bytes plus a detected or provider-reported content type
#[derive(Debug, Clone)]
pub struct GeneratedOutput {
    pub image: Vec<u8>,
    pub content_type: String,
}

#[derive(Debug)]
pub enum ProviderError {
    /// Generation exceeded the backend's time budget
    Timeout(String),
    /// Backend signaled capacity or queue exhaustion
    Busy(String),
    /// Backend requires a license/gate the credential does not satisfy
    PermissionDenied(String),
    /// Any other upstream failure
    Upstream(String),
}

impl std::fmt::Display for ProviderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderError::Timeout(msg) => write!(f, "Generation timed out: {}", msg),
            ProviderError::Busy(msg) => write!(f, "Generation backend busy: {}", msg),
            ProviderError::PermissionDenied(msg) => write!(f, "Generation not permitted: {}", msg),
            ProviderError::Upstream(msg) => write!(f, "Generation failed: {}", msg),
        }
    }
}

impl std::error::Error for ProviderError {}

/// Classify an upstream error message into the provider taxonomy
pub fn classify_upstream(message: String) -> ProviderError {
    let lower = message.to_lowercase();
    if lower.contains("timeout") || lower.contains("timed out") || lower.contains("abort") {
        ProviderError::Timeout(message)
    } else if lower.contains("queue") || lower.contains("busy") || lower.contains("capacity") {
        ProviderError::Busy(message)
    } else if lower.contains("license") || lower.contains("gated") || lower.contains("accept") {
        ProviderError::PermissionDenied(message)
    } else {
        ProviderError::Upstream(message)
    }
}

/// Encode image bytes as a data URL for backends that take inline files
pub fn to_data_url(bytes: &[u8]) -> String {
    let mime = detect_content_type(bytes);
    let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
    format!("data:{};base64,{}", mime, encoded)
}

#[async_trait]
pub trait ImageProvider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn generate(&self, request: &GenerationRequest) -> Result<GeneratedOutput, ProviderError>;
}

/// Ordered fallback chain over the configured backends
#[derive(Clone)]
pub struct ProviderChain {
    providers: Arc<Vec<Arc<dyn ImageProvider>>>,
}

impl ProviderChain {
    pub fn new(providers: Vec<Arc<dyn ImageProvider>>) -> Self {
        Self {
            providers: Arc::new(providers),
        }
    }

    pub async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<GeneratedOutput, ProviderError> {
        let mut last_error = ProviderError::Upstream("No image providers configured".to_string());

        for provider in self.providers.iter() {
            tracing::info!("Attempting generation via {}", provider.name());
            match provider.generate(request).await {
                Ok(output) => {
                    tracing::info!(
                        "{} produced {} bytes ({})",
                        provider.name(),
                        output.image.len(),
                        output.content_type
                    );
                    return Ok(output);
                }
                Err(err) => {
                    tracing::warn!("{} failed, falling through: {}", provider.name(), err);
                    last_error = err;
                }
            }
        }

        Err(last_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_upstream_messages() {
        assert!(matches!(
            classify_upstream("request timed out after 180s".to_string()),
            ProviderError::Timeout(_)
        ));
        assert!(matches!(
            classify_upstream("The queue is full".to_string()),
            ProviderError::Busy(_)
        ));
        assert!(matches!(
            classify_upstream("model is gated, accept the license first".to_string()),
            ProviderError::PermissionDenied(_)
        ));
        assert!(matches!(
            classify_upstream("connection reset by peer".to_string()),
            ProviderError::Upstream(_)
        ));
    }

    #[test]
    fn data_url_carries_detected_mime() {
        let url = to_data_url(&[0x89, 0x50, 0x4e, 0x47]);
        assert!(url.starts_with("data:image/png;base64,"));
    }
}
