//! Quota DTOs

use serde::{Deserialize, Serialize};

/// Result of the generation-limit check.
///
/// `used` counts the user's currently existing job rows; `remaining` is -1
/// (unbounded) when dev mode is active.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GenerationLimit {
    pub limit: i64,
    pub used: i64,
    pub remaining: i64,
    pub is_dev_mode: bool,
    pub can_generate: bool,
}

/// Request body for POST /api/profile/dev-mode
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DevModeRequest {
    pub passkey: String,
    pub activate: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DevModeResponse {
    pub is_dev_mode: bool,
}
