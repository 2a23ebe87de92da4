/// Auth Service - Main entry point
use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use auth_service::{
    build_router,
    config::Config,
    db::{CredentialStore, MemoryCredentialStore, PgCredentialStore},
    metrics,
    security::RevocationRegistry,
    AppState, AuthService,
};

const LOCKOUT_PRUNE_INTERVAL: Duration = Duration::from_secs(300);

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env before reading configuration
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("auth_service=info,info")),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    let config = Config::from_env().context("Failed to load configuration from environment")?;
    tracing::info!(config = ?config, "Starting auth service on {}", config.bind_addr());

    let store: Arc<dyn CredentialStore> = match &config.database_url {
        Some(url) => {
            let pool = PgPoolOptions::new()
                .max_connections(config.database_max_connections)
                .acquire_timeout(Duration::from_millis(config.store_timeout_ms))
                .connect(url)
                .await
                .context("Failed to connect to database")?;
            let store = PgCredentialStore::new(pool);
            store.migrate().await.context("Failed to run migrations")?;
            tracing::info!("Postgres credential store initialized");
            Arc::new(store)
        }
        None => {
            tracing::warn!("AUTH_DATABASE_URL not set; principals are kept in memory only");
            Arc::new(MemoryCredentialStore::new())
        }
    };

    let keys = Arc::new(config.key_ring().context("Failed to load signing key")?);
    tracing::info!(key_version = keys.current_version(), "Signing key loaded");

    let revocations = Arc::new(RevocationRegistry::new());
    let engine = Arc::new(
        AuthService::new(store, keys, Arc::clone(&revocations), config.engine_settings())
            .context("Failed to build auth engine")?,
    );

    metrics::initialize_auth_metrics();
    let sweeper = revocations.spawn_sweeper(config.revocation_sweep_interval());
    let pruner = engine.lockout().spawn_pruner(LOCKOUT_PRUNE_INTERVAL);

    let app = build_router(AppState::new(engine, config.admin_key.clone()));

    let listener = TcpListener::bind(config.bind_addr())
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr()))?;
    tracing::info!("REST API listening on {}", config.bind_addr());

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    sweeper.abort();
    pruner.abort();
    tracing::info!("Auth service stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
