//! SeaORM Entity for the generation_jobs table
//!
//! Status lifecycle: QUEUED -> PROCESSING -> COMPLETED | FAILED, with
//! FAILED -> QUEUED only via explicit user retry. The worker claims rows
//! by conditional update on status, so status is stored as a plain string
//! column rather than a DB enum.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "generation_jobs")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub user_id: String,
    pub input_image_id: String,
    pub style_config_id: String,
    /// Optional user-supplied prompt woven into the style template
    #[sea_orm(column_type = "Text", nullable)]
    pub prompt: Option<String>,
    pub status: String,
    #[sea_orm(column_type = "Text", nullable)]
    pub error_message: Option<String>,
    pub retry_count: i32,
    pub max_retries: i32,
    pub queued_at: Option<DateTimeWithTimeZone>,
    pub started_at: Option<DateTimeWithTimeZone>,
    pub completed_at: Option<DateTimeWithTimeZone>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
