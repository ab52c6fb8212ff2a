//! Migration to create the style_configs table
//!
//! Style presets are curated by administrators; the pipeline treats them
//! as read-only prompt/parameter bundles.

use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(StyleConfigs::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(StyleConfigs::Id).string().not_null().primary_key())
                    .col(string_uniq(StyleConfigs::Key))
                    .col(string(StyleConfigs::Name))
                    .col(string_null(StyleConfigs::BaseModel))
                    .col(text_null(StyleConfigs::PromptPrefix))
                    .col(text_null(StyleConfigs::PromptSuffix))
                    .col(text_null(StyleConfigs::NegativePrompt))
                    .col(string_null(StyleConfigs::ControlnetModule))
                    .col(double_null(StyleConfigs::ControlnetWeight))
                    .col(double_null(StyleConfigs::GuidanceScale))
                    .col(double_null(StyleConfigs::Strength))
                    .col(json_binary_null(StyleConfigs::PromptTemplate))
                    .col(json_binary_null(StyleConfigs::Params))
                    .col(boolean(StyleConfigs::IsActive).default(true))
                    .col(
                        timestamp_with_time_zone(StyleConfigs::CreatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // Index for the active-catalog listing
        manager
            .create_index(
                Index::create()
                    .name("idx_style_configs_is_active")
                    .table(StyleConfigs::Table)
                    .col(StyleConfigs::IsActive)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(StyleConfigs::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum StyleConfigs {
    Table,
    Id,
    Key,
    Name,
    BaseModel,
    PromptPrefix,
    PromptSuffix,
    NegativePrompt,
    ControlnetModule,
    ControlnetWeight,
    GuidanceScale,
    Strength,
    PromptTemplate,
    Params,
    IsActive,
    CreatedAt,
}
