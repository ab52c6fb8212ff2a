use std::env;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    routing::{get, post},
    Router,
};
use sea_orm::Database;
use sea_orm_migration::MigratorTrait;
use tokio::sync::watch;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use artmorph_backend::config::AppConfig;
use artmorph_backend::handlers::{job, profile};
use artmorph_backend::jobs::generation_worker::start_generation_worker;
use artmorph_backend::services::generation::GenerationService;
use artmorph_backend::services::hf_space::HfSpaceProvider;
use artmorph_backend::services::provider::{ImageProvider, ProviderChain};
use artmorph_backend::services::replicate::ReplicateProvider;
use artmorph_backend::services::storage::SupabaseStorageService;
use artmorph_backend::services::style_catalog::StyleCatalogService;
use artmorph_backend::AppState;

/// Style lookups are cached this long; presets rarely change
const STYLE_CACHE_TTL_SECS: u64 = 300;

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,artmorph_backend=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment variables
    dotenvy::dotenv().ok();

    let config = AppConfig::from_env();

    // Connect to database
    let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    tracing::info!("Connecting to database...");
    let db = Database::connect(&database_url)
        .await
        .expect("Failed to connect to database");

    // Run migrations
    tracing::info!("Running migrations...");
    migration::Migrator::up(&db, None)
        .await
        .expect("Failed to run migrations");

    let storage = Arc::new(SupabaseStorageService::new(
        config.supabase_url.clone(),
        config.supabase_service_role_key.clone(),
    ));

    // Primary provider first when its credential is configured, then the
    // Space fallback
    let generation_timeout = Duration::from_secs(config.generation_timeout_secs);
    let mut providers: Vec<Arc<dyn ImageProvider>> = Vec::new();
    if let Some(token) = config.replicate_api_token.clone() {
        providers.push(Arc::new(ReplicateProvider::new(
            config.replicate_base_url.clone(),
            token,
            generation_timeout,
        )));
    }
    providers.push(Arc::new(HfSpaceProvider::new(
        config.hf_space.clone(),
        config.hf_api_token.clone(),
        generation_timeout,
    )));

    let generation = GenerationService::new(
        storage.clone(),
        ProviderChain::new(providers),
        config.generated_bucket.clone(),
        config.generated_url_ttl_secs,
        config.default_model.clone(),
    );

    // Start the background worker with its shutdown token
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let worker = start_generation_worker(
        db.clone(),
        generation,
        config.worker_poll_interval_secs,
        shutdown_rx,
    );

    let state = AppState {
        db,
        config,
        storage,
        styles: StyleCatalogService::new(STYLE_CACHE_TTL_SECS),
    };

    // Build router
    let app = Router::new()
        .route("/", get(health))
        .route("/api/jobs", post(job::create_job).get(job::list_jobs))
        .route("/api/jobs/{id}", get(job::get_job).delete(job::delete_job))
        .route("/api/jobs/{id}/history", get(job::get_job_history))
        .route("/api/jobs/{id}/retry", post(job::retry_job))
        .route("/api/profile/limit", get(profile::get_generation_limit))
        .route("/api/profile/dev-mode", post(profile::toggle_dev_mode))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Start server
    let port: u16 = env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(3000);
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port))
        .await
        .unwrap();

    tracing::info!("Server listening on {}", listener.local_addr().unwrap());

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .unwrap();

    // Server is down; let the worker finish its current cycle and exit
    let _ = shutdown_tx.send(true);
    let _ = worker.await;
}

async fn health() -> &'static str {
    "artmorph backend is running"
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    tracing::info!("Shutdown signal received");
}
