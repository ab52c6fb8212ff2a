//! Object storage client
//!
//! The pipeline only touches storage for the generated-artifact lifecycle:
//! download the input, upload the output, sign read URLs, delete on job
//! deletion. The trait keeps the backend swappable (and stubbable in tests);
//! the shipped implementation talks to the Supabase Storage REST API.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

#[derive(Debug)]
pub struct StorageError(pub String);

impl std::fmt::Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Storage failure: {}", self.0)
    }
}

impl std::error::Error for StorageError {}

#[async_trait]
pub trait ObjectStorage: Send + Sync {
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StorageError>;

    async fn download(&self, bucket: &str, path: &str) -> Result<Vec<u8>, StorageError>;

    async fn create_signed_url(
        &self,
        bucket: &str,
        path: &str,
        ttl_secs: u32,
    ) -> Result<String, StorageError>;

    async fn delete(&self, bucket: &str, path: &str) -> Result<(), StorageError>;
}

/// Detect an image content type from magic bytes; defaults to PNG
pub fn detect_content_type(bytes: &[u8]) -> &'static str {
    match bytes {
        [0xff, 0xd8, ..] => "image/jpeg",
        [0x89, 0x50, ..] => "image/png",
        [0x52, 0x49, ..] => "image/webp",
        [0x47, 0x49, ..] => "image/gif",
        _ => "image/png",
    }
}

/// File extension for a content type, used when naming stored objects
pub fn extension_for(content_type: &str) -> &'static str {
    if content_type.contains("webp") {
        ".webp"
    } else if content_type.contains("jpeg") || content_type.contains("jpg") {
        ".jpg"
    } else if content_type.contains("gif") {
        ".gif"
    } else {
        ".png"
    }
}

#[derive(Clone)]
pub struct SupabaseStorageService {
    client: Client,
    base_url: String,
    service_role_key: String,
}

#[derive(Debug, Serialize)]
struct SignRequest {
    #[serde(rename = "expiresIn")]
    expires_in: u32,
}

#[derive(Debug, Deserialize)]
struct SignResponse {
    #[serde(rename = "signedURL")]
    signed_url: String,
}

impl SupabaseStorageService {
    pub fn new(base_url: String, service_role_key: String) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            service_role_key,
        }
    }

    fn object_url(&self, bucket: &str, path: &str) -> String {
        format!("{}/storage/v1/object/{}/{}", self.base_url, bucket, path)
    }
}

#[async_trait]
impl ObjectStorage for SupabaseStorageService {
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StorageError> {
        let response = self
            .client
            .post(self.object_url(bucket, path))
            .bearer_auth(&self.service_role_key)
            .header("content-type", content_type)
            .header("x-upsert", "false")
            .body(bytes)
            .send()
            .await
            .map_err(|e| StorageError(format!("upload request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(StorageError(format!("upload returned {}: {}", status, body)));
        }
        Ok(())
    }

    async fn download(&self, bucket: &str, path: &str) -> Result<Vec<u8>, StorageError> {
        let response = self
            .client
            .get(self.object_url(bucket, path))
            .bearer_auth(&self.service_role_key)
            .send()
            .await
            .map_err(|e| StorageError(format!("download request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(StorageError(format!("download returned {}: {}", status, body)));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| StorageError(format!("download body failed: {}", e)))?;
        Ok(bytes.to_vec())
    }

    async fn create_signed_url(
        &self,
        bucket: &str,
        path: &str,
        ttl_secs: u32,
    ) -> Result<String, StorageError> {
        let url = format!("{}/storage/v1/object/sign/{}/{}", self.base_url, bucket, path);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.service_role_key)
            .json(&SignRequest { expires_in: ttl_secs })
            .send()
            .await
            .map_err(|e| StorageError(format!("sign request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(StorageError(format!("sign returned {}: {}", status, body)));
        }

        let signed: SignResponse = response
            .json()
            .await
            .map_err(|e| StorageError(format!("sign response malformed: {}", e)))?;

        // The API returns a path relative to /storage/v1
        Ok(format!("{}/storage/v1{}", self.base_url, signed.signed_url))
    }

    async fn delete(&self, bucket: &str, path: &str) -> Result<(), StorageError> {
        let response = self
            .client
            .delete(self.object_url(bucket, path))
            .bearer_auth(&self.service_role_key)
            .send()
            .await
            .map_err(|e| StorageError(format!("delete request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(StorageError(format!("delete returned {}: {}", status, body)));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_common_image_types() {
        assert_eq!(detect_content_type(&[0xff, 0xd8, 0xff, 0xe0]), "image/jpeg");
        assert_eq!(detect_content_type(&[0x89, 0x50, 0x4e, 0x47]), "image/png");
        assert_eq!(detect_content_type(&[0x52, 0x49, 0x46, 0x46]), "image/webp");
        assert_eq!(detect_content_type(&[0x00, 0x01]), "image/png");
    }

    #[test]
    fn extension_matches_content_type() {
        assert_eq!(extension_for("image/webp"), ".webp");
        assert_eq!(extension_for("image/jpeg"), ".jpg");
        assert_eq!(extension_for("image/png"), ".png");
        assert_eq!(extension_for("application/octet-stream"), ".png");
    }
}
