//! Migration to create the generation_jobs table
//!
//! One row per generation request. The worker loop claims rows by
//! conditional update on status, so (status, created_at) is indexed for
//! the FIFO poll.

use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(GenerationJobs::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(GenerationJobs::Id).string().not_null().primary_key())
                    .col(string(GenerationJobs::UserId))
                    .col(string(GenerationJobs::InputImageId))
                    .col(string(GenerationJobs::StyleConfigId))
                    .col(text_null(GenerationJobs::Prompt))
                    .col(string(GenerationJobs::Status))
                    .col(text_null(GenerationJobs::ErrorMessage))
                    .col(integer(GenerationJobs::RetryCount).default(0))
                    .col(integer(GenerationJobs::MaxRetries).default(3))
                    .col(timestamp_with_time_zone_null(GenerationJobs::QueuedAt))
                    .col(timestamp_with_time_zone_null(GenerationJobs::StartedAt))
                    .col(timestamp_with_time_zone_null(GenerationJobs::CompletedAt))
                    .col(
                        timestamp_with_time_zone(GenerationJobs::CreatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        timestamp_with_time_zone(GenerationJobs::UpdatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_generation_jobs_user")
                            .from(GenerationJobs::Table, GenerationJobs::UserId)
                            .to(UserProfiles::Table, UserProfiles::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_generation_jobs_input_image")
                            .from(GenerationJobs::Table, GenerationJobs::InputImageId)
                            .to(UploadedImages::Table, UploadedImages::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_generation_jobs_style_config")
                            .from(GenerationJobs::Table, GenerationJobs::StyleConfigId)
                            .to(StyleConfigs::Table, StyleConfigs::Id),
                    )
                    .to_owned(),
            )
            .await?;

        // Index for the worker's oldest-queued-first poll
        manager
            .create_index(
                Index::create()
                    .name("idx_generation_jobs_status_created_at")
                    .table(GenerationJobs::Table)
                    .col(GenerationJobs::Status)
                    .col(GenerationJobs::CreatedAt)
                    .to_owned(),
            )
            .await?;

        // Index for per-user listings and quota counting
        manager
            .create_index(
                Index::create()
                    .name("idx_generation_jobs_user_id")
                    .table(GenerationJobs::Table)
                    .col(GenerationJobs::UserId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(GenerationJobs::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum GenerationJobs {
    Table,
    Id,
    UserId,
    InputImageId,
    StyleConfigId,
    Prompt,
    Status,
    ErrorMessage,
    RetryCount,
    MaxRetries,
    QueuedAt,
    StartedAt,
    CompletedAt,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum UserProfiles {
    Table,
    Id,
}

#[derive(DeriveIden)]
enum UploadedImages {
    Table,
    Id,
}

#[derive(DeriveIden)]
enum StyleConfigs {
    Table,
    Id,
}
