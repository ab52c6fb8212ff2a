//! Fallback generation backend: HuggingFace Space over the Gradio queue API
//!
//! Flow: resolve the Space's execution host, submit the job to the queued
//! /infer endpoint, follow the server-sent event stream until a complete or
//! error event, then download the produced asset from the URL in the event
//! payload. The whole attempt runs under one hard timeout.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::services::provider::{
    classify_upstream, to_data_url, GeneratedOutput, GenerationRequest, ImageProvider,
    ProviderError,
};
use crate::services::storage::detect_content_type;

const DEFAULT_GUIDANCE_SCALE: f64 = 2.5;
const DEFAULT_STEPS: u32 = 28;
const DEFAULT_PROMPT: &str = "Transform this image into an artistic style";

#[derive(Clone)]
pub struct HfSpaceProvider {
    client: Client,
    space_id: String,
    api_token: Option<String>,
    timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct HostResponse {
    host: String,
}

#[derive(Debug, Deserialize)]
struct CallResponse {
    event_id: String,
}

impl HfSpaceProvider {
    pub fn new(space_id: String, api_token: Option<String>, timeout: Duration) -> Self {
        Self {
            client: Client::new(),
            space_id,
            api_token,
            timeout,
        }
    }

    fn authed(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    fn classify_transport(err: reqwest::Error) -> ProviderError {
        if err.is_timeout() {
            ProviderError::Timeout(err.to_string())
        } else {
            ProviderError::Upstream(err.to_string())
        }
    }

    /// Spaces run on dynamically assigned hosts; ask the hub where this one
    /// currently lives
    async fn resolve_host(&self) -> Result<String, ProviderError> {
        let url = format!("https://huggingface.co/api/spaces/{}/host", self.space_id);
        let response = self
            .authed(self.client.get(&url))
            .send()
            .await
            .map_err(Self::classify_transport)?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(if status.as_u16() == 401 || status.as_u16() == 403 {
                ProviderError::PermissionDenied(format!("space host lookup returned {}", status))
            } else {
                ProviderError::Upstream(format!("space host lookup returned {}", status))
            });
        }

        let host: HostResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Upstream(format!("malformed host response: {}", e)))?;

        if host.host.starts_with("http") {
            Ok(host.host.trim_end_matches('/').to_string())
        } else {
            Ok(format!("https://{}", host.host))
        }
    }

    async fn submit_job(
        &self,
        base_url: &str,
        request: &GenerationRequest,
    ) -> Result<String, ProviderError> {
        let prompt = if request.prompt.is_empty() {
            DEFAULT_PROMPT.to_string()
        } else {
            request.prompt.clone()
        };
        let seed = request.seed.unwrap_or(0);
        let guidance = request.guidance_scale.unwrap_or(DEFAULT_GUIDANCE_SCALE);
        let steps = request.num_inference_steps.unwrap_or(DEFAULT_STEPS);

        // /infer signature: input_image, prompt, seed, randomize_seed,
        // guidance_scale, steps
        let body = json!({
            "data": [
                { "url": to_data_url(&request.input_image), "meta": { "_type": "gradio.FileData" } },
                prompt,
                seed,
                seed == 0,
                guidance,
                steps,
            ]
        });

        let url = format!("{}/gradio_api/call/infer", base_url);
        let response = self
            .authed(self.client.post(&url))
            .json(&body)
            .send()
            .await
            .map_err(Self::classify_transport)?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(classify_upstream(format!("space call returned {}: {}", status, text)));
        }

        let call: CallResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Upstream(format!("malformed call response: {}", e)))?;
        Ok(call.event_id)
    }

    /// Follow the event stream until a terminal event; returns the asset URL
    async fn await_completion(&self, base_url: &str, event_id: &str) -> Result<String, ProviderError> {
        let url = format!("{}/gradio_api/call/infer/{}", base_url, event_id);
        let response = self
            .authed(self.client.get(&url))
            .send()
            .await
            .map_err(Self::classify_transport)?;

        if !response.status().is_success() {
            return Err(ProviderError::Upstream(format!(
                "event stream returned {}",
                response.status()
            )));
        }

        let mut stream = response.bytes_stream();
        let mut buffer = String::new();
        let mut current_event = String::new();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(Self::classify_transport)?;
            buffer.push_str(&String::from_utf8_lossy(&chunk));

            while let Some(pos) = buffer.find('\n') {
                let line = buffer[..pos].trim_end_matches('\r').to_string();
                buffer.drain(..=pos);

                if let Some(event) = line.strip_prefix("event:") {
                    current_event = event.trim().to_string();
                } else if let Some(data) = line.strip_prefix("data:") {
                    let data = data.trim();
                    match current_event.as_str() {
                        "complete" => return Self::extract_asset_url(data),
                        "error" => {
                            let message = if data.is_empty() || data == "null" {
                                "space reported an error event".to_string()
                            } else {
                                data.to_string()
                            };
                            return Err(classify_upstream(message));
                        }
                        _ => {}
                    }
                }
            }
        }

        Err(ProviderError::Upstream(
            "event stream ended without a completion event".to_string(),
        ))
    }

    fn extract_asset_url(data: &str) -> Result<String, ProviderError> {
        let payload: Value = serde_json::from_str(data)
            .map_err(|e| ProviderError::Upstream(format!("malformed complete event: {}", e)))?;

        payload
            .as_array()
            .and_then(|items| items.first())
            .and_then(|item| item.get("url"))
            .and_then(|url| url.as_str())
            .map(str::to_string)
            .ok_or_else(|| ProviderError::Upstream("no image returned from the space".to_string()))
    }

    async fn download_asset(&self, url: &str) -> Result<GeneratedOutput, ProviderError> {
        let response = self
            .authed(self.client.get(url))
            .send()
            .await
            .map_err(Self::classify_transport)?;

        if !response.status().is_success() {
            return Err(ProviderError::Upstream(format!(
                "asset download returned {}",
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
            .map_err(|e| ProviderError::Upstream(format!("asset download failed: {}", e)))?
            .to_vec();
        let content_type =
            content_type.unwrap_or_else(|| detect_content_type(&bytes).to_string());

        Ok(GeneratedOutput { image: bytes, content_type })
    }

    async fn run(&self, request: &GenerationRequest) -> Result<GeneratedOutput, ProviderError> {
        let base_url = self.resolve_host().await?;
        let event_id = self.submit_job(&base_url, request).await?;
        tracing::debug!("Space {} accepted job, event {}", self.space_id, event_id);

        let asset_url = self.await_completion(&base_url, &event_id).await?;
        self.download_asset(&asset_url).await
    }
}

#[async_trait]
impl ImageProvider for HfSpaceProvider {
    fn name(&self) -> &'static str {
        "hf-space"
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<GeneratedOutput, ProviderError> {
        match tokio::time::timeout(self.timeout, self.run(request)).await {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Timeout(format!(
                "space {} did not complete within {}s",
                self.space_id,
                self.timeout.as_secs()
            ))),
        }
    }
}
