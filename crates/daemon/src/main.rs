//! Tracklab Batch Engine - Main Entry Point

mod config;

use anyhow::Result;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use config::DaemonConfig;
use tracklab_api_http::AppState;
use tracklab_core::application::ProgressEventBus;
use tracklab_core::port::id_provider::UuidProvider;
use tracklab_core::port::time_provider::SystemTimeProvider;
use tracklab_infra_sqlite::{create_pool, run_migrations, SqliteJobStore};
use tracklab_providers::selection::ProviderConfig;

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Load configuration
    let config = DaemonConfig::from_env()?;

    // 2. Initialize logging
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("tracklab=info"))
        .expect("Failed to create env filter");

    match config.log_format.as_str() {
        "json" => {
            // Production: JSON structured logging
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json())
                .init();
        }
        _ => {
            // Development: Pretty formatting with colors
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().pretty())
                .init();
        }
    }

    info!("Tracklab Batch Engine v{} starting...", VERSION);

    // 3. Initialize database
    info!(db_path = %config.db_path, "Initializing database...");
    let pool = create_pool(&config.db_path)
        .await
        .map_err(|e| anyhow::anyhow!("DB pool creation failed: {}", e))?;
    run_migrations(&pool)
        .await
        .map_err(|e| anyhow::anyhow!("Migration failed: {}", e))?;

    // 4. Setup dependencies (DI wiring)
    let time_provider = Arc::new(SystemTimeProvider);
    let id_provider = Arc::new(UuidProvider);
    let store = Arc::new(SqliteJobStore::new(pool, id_provider, time_provider));
    let bus = Arc::new(ProgressEventBus::new());

    // 5. Provider bootstrap
    let provider = tracklab_providers::active_provider(&ProviderConfig::from_env())
        .map_err(|e| anyhow::anyhow!("Provider bootstrap failed: {}", e))?;
    let metadata = provider.metadata();
    info!(
        provider = %metadata.name,
        embedding_model = %metadata.embedding_model,
        available = provider.is_available().await,
        "Embedding provider ready"
    );

    // 6. Serve HTTP API
    let app = tracklab_api_http::router(AppState::new(store, bus));
    let listener = tokio::net::TcpListener::bind(config.http_addr).await?;
    info!(addr = %config.http_addr, "HTTP API listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Tracklab Batch Engine stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = ?e, "Failed to listen for shutdown signal");
        return;
    }
    info!("Shutdown signal received");
}
