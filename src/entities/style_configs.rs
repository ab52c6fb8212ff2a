//! SeaORM Entity for the style_configs table
//!
//! Administrator-curated style presets: prompt template plus generation
//! parameters. prompt_template and params are free-form JSON so presets
//! can carry provider-specific overrides without schema changes.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "style_configs")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    #[sea_orm(unique)]
    pub key: String,
    pub name: String,
    pub base_model: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub prompt_prefix: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub prompt_suffix: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub negative_prompt: Option<String>,
    /// Set when the preset uses structural conditioning; the provider only
    /// receives a control image when this is present
    pub controlnet_module: Option<String>,
    pub controlnet_weight: Option<f64>,
    pub guidance_scale: Option<f64>,
    pub strength: Option<f64>,
    /// Structured template with {{prompt}}/{{prefix}}/{{suffix}} placeholders;
    /// takes priority over prompt_prefix/prompt_suffix when present
    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub prompt_template: Option<Json>,
    /// Provider-specific parameter overrides (steps, seed, model, ...)
    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub params: Option<Json>,
    pub is_active: bool,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
