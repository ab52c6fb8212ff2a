//! Migration to create the user_profiles table
//!
//! Profiles are owned by the auth boundary; the pipeline only reads
//! is_dev_mode and counts jobs against them.

use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(UserProfiles::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(UserProfiles::Id).string().not_null().primary_key())
                    .col(string_uniq(UserProfiles::Email))
                    .col(string_null(UserProfiles::DisplayName))
                    .col(boolean(UserProfiles::IsDevMode).default(false))
                    .col(
                        timestamp_with_time_zone(UserProfiles::CreatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        timestamp_with_time_zone(UserProfiles::UpdatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(UserProfiles::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum UserProfiles {
    Table,
    Id,
    Email,
    DisplayName,
    IsDevMode,
    CreatedAt,
    UpdatedAt,
}
