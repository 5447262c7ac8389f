//! Quill API server
//!
//! REST API server for the Quill blog platform.

use quill_api::auth::{PgCredentialStore, RedisSessionCache};
use quill_api::{create_router, state::AppState};
use quill_core::AppConfig;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "quill_api=debug,tower_http=debug".into()),
        )
        .init();

    // Load configuration; a missing JWT secret aborts startup here.
    let config = AppConfig::from_env()?;
    let addr = format!("{}:{}", config.server.host, config.server.port);

    // Connect to the credential store
    let pool = PgPoolOptions::new()
        .max_connections(config.database.pool_size)
        .connect(&config.database.postgres_url)
        .await?;
    let store = Arc::new(PgCredentialStore::new(
        pool,
        Duration::from_millis(config.database.command_timeout_ms),
    ));

    // Connect to the session cache
    let cache = Arc::new(
        RedisSessionCache::connect(
            &config.cache.redis_url,
            Duration::from_millis(config.cache.command_timeout_ms),
        )
        .await?,
    );

    // Create application state and router
    let state = Arc::new(AppState::new(config, store, cache));
    let app = create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Quill API server starting on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
