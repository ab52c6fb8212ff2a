//! Migration to create the generation_history table
//!
//! Append-only audit trail of job status transitions. Rows are only ever
//! removed when the owning job is deleted.

use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(GenerationHistory::Table)
                    .if_not_exists()
                    .col(pk_auto(GenerationHistory::Id))
                    .col(string(GenerationHistory::JobId))
                    .col(string(GenerationHistory::UserId))
                    .col(string(GenerationHistory::Status))
                    .col(text_null(GenerationHistory::Message))
                    .col(
                        timestamp_with_time_zone(GenerationHistory::CreatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_generation_history_job")
                            .from(GenerationHistory::Table, GenerationHistory::JobId)
                            .to(GenerationJobs::Table, GenerationJobs::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_generation_history_job_id")
                    .table(GenerationHistory::Table)
                    .col(GenerationHistory::JobId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(GenerationHistory::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum GenerationHistory {
    Table,
    Id,
    JobId,
    UserId,
    Status,
    Message,
    CreatedAt,
}

#[derive(DeriveIden)]
enum GenerationJobs {
    Table,
    Id,
}
