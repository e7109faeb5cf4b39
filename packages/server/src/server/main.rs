// Main entry point for the login API server

use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use server_core::domains::login::{LoginOrchestrator, models::SessionRecordStore};
use server_core::kernel::ServerDeps;
use server_core::server::{build_app, AppState};
use server_core::Config;
use telegram_auth::{BridgeConnector, BridgeOptions};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,server_core=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting ForGifts login API");

    // Load configuration
    let config = Config::from_env().context("Failed to load configuration")?;
    tracing::info!("Configuration loaded");

    // Connect to database
    let connect_options = SqliteConnectOptions::from_str(&config.database_url)
        .context("DATABASE_URL must be a valid sqlite URL")?
        .create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(connect_options)
        .await
        .context("Failed to connect to database")?;
    tracing::info!("Database connected");

    // Run migrations
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run migrations")?;
    tracing::info!("Migrations complete");

    // Wire up the login subsystem
    let connector = Arc::new(BridgeConnector::new(BridgeOptions {
        base_url: config.bridge_url.clone(),
        api_id: config.api_id,
        api_hash: config.api_hash.clone(),
    }));
    let deps = ServerDeps {
        connector,
        sessions: Arc::new(SessionRecordStore::new(pool.clone())),
        proxy: config.proxy.clone(),
    };
    let orchestrator = Arc::new(LoginOrchestrator::new(deps, config.login.clone()));

    let app = build_app(AppState {
        db_pool: pool,
        orchestrator,
    });

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("Starting server on {}", addr);
    tracing::info!("Health check: http://localhost:{}/health", config.port);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
