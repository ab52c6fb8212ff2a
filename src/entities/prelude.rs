pub use super::generated_images::Entity as GeneratedImages;
pub use super::generation_history::Entity as GenerationHistory;
pub use super::generation_jobs::Entity as GenerationJobs;
pub use super::style_configs::Entity as StyleConfigs;
pub use super::uploaded_images::Entity as UploadedImages;
pub use super::user_profiles::Entity as UserProfiles;
