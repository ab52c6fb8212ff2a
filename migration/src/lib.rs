pub use sea_orm_migration::prelude::*;

mod m20260710_000001_create_user_profiles;
mod m20260710_000002_create_uploaded_images;
mod m20260711_000001_create_style_configs;
mod m20260712_000001_create_generation_jobs;
mod m20260712_000002_create_generation_history;
mod m20260712_000003_create_generated_images;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260710_000001_create_user_profiles::Migration),
            Box::new(m20260710_000002_create_uploaded_images::Migration),
            Box::new(m20260711_000001_create_style_configs::Migration),
            Box::new(m20260712_000001_create_generation_jobs::Migration),
            Box::new(m20260712_000002_create_generation_history::Migration),
            Box::new(m20260712_000003_create_generated_images::Migration),
        ]
    }
}
