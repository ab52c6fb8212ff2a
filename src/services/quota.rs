//! Generation quota guard
//!
//! Free-tier users get a fixed number of generations; dev-mode profiles are
//! unbounded. `used` counts the user's currently existing job rows, so
//! deleting jobs restores headroom (see DESIGN.md for the decision record).

use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, IntoActiveModel, PaginatorTrait, QueryFilter, Set};

use crate::config::AppConfig;
use crate::entities::{generation_jobs, prelude::*};
use crate::models::quota::GenerationLimit;
use crate::services::job_service::JobServiceError;

/// Sentinel for unbounded remaining quota (dev mode)
pub const UNLIMITED: i64 = -1;

/// Read-only check of whether the user may start another generation
pub async fn check_generation_limit(
    db: &DatabaseConnection,
    config: &AppConfig,
    user_id: &str,
) -> Result<GenerationLimit, JobServiceError> {
    let profile = UserProfiles::find_by_id(user_id)
        .one(db)
        .await?
        .ok_or(JobServiceError::NotFound("Profile not found"))?;

    let used = GenerationJobs::find()
        .filter(generation_jobs::Column::UserId.eq(user_id))
        .count(db)
        .await? as i64;

    let limit = config.free_generation_limit;
    let is_dev_mode = profile.is_dev_mode;

    Ok(GenerationLimit {
        limit,
        used,
        remaining: if is_dev_mode { UNLIMITED } else { (limit - used).max(0) },
        is_dev_mode,
        can_generate: is_dev_mode || used < limit,
    })
}

/// Toggle developer mode. Activation requires the shared passkey;
/// deactivation is always allowed.
pub async fn toggle_dev_mode(
    db: &DatabaseConnection,
    config: &AppConfig,
    user_id: &str,
    passkey: &str,
    activate: bool,
) -> Result<bool, JobServiceError> {
    if activate && passkey != config.dev_passkey {
        return Err(JobServiceError::InvalidPasskey);
    }

    let profile = UserProfiles::find_by_id(user_id)
        .one(db)
        .await?
        .ok_or(JobServiceError::NotFound("Profile not found"))?;

    let mut active = profile.into_active_model();
    active.is_dev_mode = Set(activate);
    active.updated_at = Set(chrono::Utc::now().fixed_offset());
    let updated = active.update(db).await?;

    tracing::info!(
        "Dev mode {} for user {}",
        if updated.is_dev_mode { "activated" } else { "deactivated" },
        user_id
    );
    Ok(updated.is_dev_mode)
}
