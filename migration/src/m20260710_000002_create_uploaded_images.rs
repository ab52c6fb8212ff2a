//! Migration to create the uploaded_images table
//!
//! Upload itself happens outside the pipeline; jobs reference these rows
//! as their input image.

use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(UploadedImages::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(UploadedImages::Id).string().not_null().primary_key())
                    .col(string(UploadedImages::UserId))
                    .col(string(UploadedImages::StorageBucket))
                    .col(string(UploadedImages::StoragePath))
                    .col(string_null(UploadedImages::ContentType))
                    .col(
                        timestamp_with_time_zone(UploadedImages::CreatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_uploaded_images_user")
                            .from(UploadedImages::Table, UploadedImages::UserId)
                            .to(UserProfiles::Table, UserProfiles::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_uploaded_images_user_id")
                    .table(UploadedImages::Table)
                    .col(UploadedImages::UserId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(UploadedImages::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum UploadedImages {
    Table,
    Id,
    UserId,
    StorageBucket,
    StoragePath,
    ContentType,
    CreatedAt,
}

#[derive(DeriveIden)]
enum UserProfiles {
    Table,
    Id,
}
