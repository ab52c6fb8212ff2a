//! Generation job DTOs and status enum
//!
//! Status progresses: QUEUED -> PROCESSING -> COMPLETED | FAILED
//!                                                      ↘ back to QUEUED via explicit retry

use serde::{Deserialize, Serialize};

/// Job status values stored in the generation_jobs.status column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum GenerationStatus {
    /// Waiting in the queue for the worker
    Queued,
    /// Claimed by the worker, generation in flight
    Processing,
    /// Terminal: output artifact stored
    Completed,
    /// Terminal: generation failed, error_message set
    Failed,
}

impl GenerationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GenerationStatus::Queued => "QUEUED",
            GenerationStatus::Processing => "PROCESSING",
            GenerationStatus::Completed => "COMPLETED",
            GenerationStatus::Failed => "FAILED",
        }
    }
}

impl std::fmt::Display for GenerationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for GenerationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "QUEUED" => Ok(GenerationStatus::Queued),
            "PROCESSING" => Ok(GenerationStatus::Processing),
            "COMPLETED" => Ok(GenerationStatus::Completed),
            "FAILED" => Ok(GenerationStatus::Failed),
            _ => Err(format!("Unknown generation status: {}", s)),
        }
    }
}

/// Request body for POST /api/jobs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateJobRequest {
    pub input_image_id: String,
    pub style_config_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
}

/// Response for job queries; output_url is a short-lived signed URL,
/// present only for completed jobs whose artifact could be signed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobResponse {
    pub id: String,
    pub status: String,
    pub prompt: Option<String>,
    pub style_key: Option<String>,
    pub style_name: Option<String>,
    pub output_url: Option<String>,
    pub error_message: Option<String>,
    pub retry_count: i32,
    pub max_retries: i32,
    pub queued_at: Option<String>,
    pub started_at: Option<String>,
    pub completed_at: Option<String>,
    pub created_at: String,
}

/// Response for job history queries
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntryResponse {
    pub id: i32,
    pub job_id: String,
    pub status: String,
    pub message: Option<String>,
    pub created_at: String,
}

impl From<crate::entities::generation_history::Model> for HistoryEntryResponse {
    fn from(model: crate::entities::generation_history::Model) -> Self {
        Self {
            id: model.id,
            job_id: model.job_id,
            status: model.status,
            message: model.message,
            created_at: model.created_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
