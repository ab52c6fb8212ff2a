//! Primary generation backend: Replicate-style REST predictions
//!
//! Flow: submit a prediction, receive its id, poll until a terminal status
//! or the time budget runs out, then download the output asset. The budget
//! is enforced here so a slow backend surfaces as a classified failure, not
//! a hung worker.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tokio::time::{sleep, Instant};

use crate::services::provider::{
    classify_upstream, to_data_url, GeneratedOutput, GenerationRequest, ImageProvider,
    ProviderError,
};
use crate::services::storage::detect_content_type;

const POLL_INTERVAL: Duration = Duration::from_secs(2);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone)]
pub struct ReplicateProvider {
    client: Client,
    base_url: String,
    api_token: String,
    timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct Prediction {
    id: String,
    status: String,
    #[serde(default)]
    output: Option<Value>,
    #[serde(default)]
    error: Option<Value>,
}

impl ReplicateProvider {
    pub fn new(base_url: String, api_token: String, timeout: Duration) -> Self {
        Self {
            client: Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .unwrap_or_else(|_| Client::new()),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_token,
            timeout,
        }
    }

    fn build_input(&self, request: &GenerationRequest) -> Value {
        let mut input = Map::new();
        input.insert("prompt".to_string(), json!(request.prompt));
        input.insert("image".to_string(), json!(to_data_url(&request.input_image)));
        if let Some(negative) = &request.negative_prompt {
            input.insert("negative_prompt".to_string(), json!(negative));
        }
        if let Some(guidance) = request.guidance_scale {
            input.insert("guidance_scale".to_string(), json!(guidance));
        }
        if let Some(steps) = request.num_inference_steps {
            input.insert("num_inference_steps".to_string(), json!(steps));
        }
        if let Some(strength) = request.strength {
            input.insert("strength".to_string(), json!(strength));
        }
        if let Some(seed) = request.seed {
            input.insert("seed".to_string(), json!(seed));
        }
        if let Some(control) = &request.control_image {
            input.insert("control_image".to_string(), json!(to_data_url(control)));
        }
        if let Some(scale) = request.controlnet_conditioning_scale {
            input.insert("controlnet_conditioning_scale".to_string(), json!(scale));
        }
        Value::Object(input)
    }

    async fn create_prediction(&self, request: &GenerationRequest) -> Result<Prediction, ProviderError> {
        // "owner/name:version" pins a version; a bare model id uses the
        // model's latest deployment
        let (url, body) = match request.model.split_once(':') {
            Some((_, version)) => (
                format!("{}/predictions", self.base_url),
                json!({ "version": version, "input": self.build_input(request) }),
            ),
            None => (
                format!("{}/models/{}/predictions", self.base_url, request.model),
                json!({ "input": self.build_input(request) }),
            ),
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.classify_transport(e))?;

        self.parse_prediction(response).await
    }

    async fn fetch_prediction(&self, id: &str) -> Result<Prediction, ProviderError> {
        let url = format!("{}/predictions/{}", self.base_url, id);
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.api_token)
            .send()
            .await
            .map_err(|e| self.classify_transport(e))?;

        self.parse_prediction(response).await
    }

    async fn parse_prediction(&self, response: reqwest::Response) -> Result<Prediction, ProviderError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(match status {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::PAYMENT_REQUIRED => {
                    ProviderError::PermissionDenied(format!("replicate returned {}: {}", status, body))
                }
                StatusCode::TOO_MANY_REQUESTS => {
                    ProviderError::Busy(format!("replicate returned {}: {}", status, body))
                }
                _ => ProviderError::Upstream(format!("replicate returned {}: {}", status, body)),
            });
        }

        response
            .json()
            .await
            .map_err(|e| ProviderError::Upstream(format!("malformed prediction response: {}", e)))
    }

    fn classify_transport(&self, err: reqwest::Error) -> ProviderError {
        if err.is_timeout() {
            ProviderError::Timeout(err.to_string())
        } else {
            ProviderError::Upstream(err.to_string())
        }
    }

    /// Output is a url string or an array of url strings depending on the model
    fn output_url(prediction: &Prediction) -> Option<String> {
        match prediction.output.as_ref()? {
            Value::String(url) => Some(url.clone()),
            Value::Array(items) => items.iter().find_map(|v| v.as_str().map(str::to_string)),
            _ => None,
        }
    }

    async fn download_output(&self, url: &str) -> Result<GeneratedOutput, ProviderError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| self.classify_transport(e))?;

        if !response.status().is_success() {
            return Err(ProviderError::Upstream(format!(
                "output download returned {}",
                response.status()
            )));
        }

        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = response
            .bytes()
            .await
            .map_err(|e| ProviderError::Upstream(format!("output download failed: {}", e)))?
            .to_vec();
        let content_type =
            content_type.unwrap_or_else(|| detect_content_type(&bytes).to_string());

        Ok(GeneratedOutput { image: bytes, content_type })
    }

    async fn cancel_prediction(&self, id: &str) {
        let url = format!("{}/predictions/{}/cancel", self.base_url, id);
        if let Err(err) = self.client.post(&url).bearer_auth(&self.api_token).send().await {
            tracing::debug!("Failed to cancel prediction {}: {}", id, err);
        }
    }
}

#[async_trait]
impl ImageProvider for ReplicateProvider {
    fn name(&self) -> &'static str {
        "replicate"
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<GeneratedOutput, ProviderError> {
        let prediction = self.create_prediction(request).await?;
        tracing::debug!("Created prediction {} ({})", prediction.id, prediction.status);

        let deadline = Instant::now() + self.timeout;
        let mut current = prediction;

        loop {
            match current.status.as_str() {
                "succeeded" => {
                    let url = Self::output_url(&current).ok_or_else(|| {
                        ProviderError::Upstream("prediction succeeded without output".to_string())
                    })?;
                    return self.download_output(&url).await;
                }
                "failed" | "canceled" => {
                    let message = current
                        .error
                        .as_ref()
                        .map(|e| e.to_string())
                        .unwrap_or_else(|| format!("prediction {}", current.status));
                    return Err(classify_upstream(message));
                }
                _ => {
                    if Instant::now() >= deadline {
                        self.cancel_prediction(&current.id).await;
                        return Err(ProviderError::Timeout(format!(
                            "prediction {} still {} after {}s",
                            current.id,
                            current.status,
                            self.timeout.as_secs()
                        )));
                    }
                    sleep(POLL_INTERVAL).await;
                    current = self.fetch_prediction(&current.id).await?;
                }
            }
        }
    }
}
