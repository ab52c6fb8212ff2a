//! Migration to create the generated_images table
//!
//! Output artifact references (bucket + path, never bytes). Exactly one
//! row exists per successfully completed job.

use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(GeneratedImages::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(GeneratedImages::Id).string().not_null().primary_key())
                    .col(string(GeneratedImages::UserId))
                    .col(string_null(GeneratedImages::JobId))
                    .col(string_null(GeneratedImages::SourceImageId))
                    .col(string(GeneratedImages::StorageBucket))
                    .col(string(GeneratedImages::StoragePath))
                    .col(
                        timestamp_with_time_zone(GeneratedImages::CreatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_generated_images_job")
                            .from(GeneratedImages::Table, GeneratedImages::JobId)
                            .to(GenerationJobs::Table, GenerationJobs::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_generated_images_job_id")
                    .table(GeneratedImages::Table)
                    .col(GeneratedImages::JobId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(GeneratedImages::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum GeneratedImages {
    Table,
    Id,
    UserId,
    JobId,
    SourceImageId,
    StorageBucket,
    StoragePath,
    CreatedAt,
}

#[derive(DeriveIden)]
enum GenerationJobs {
    Table,
    Id,
}
