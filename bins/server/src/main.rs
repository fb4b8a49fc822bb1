//! Enerbudget API Server
//!
//! Main entry point for the Enerbudget backend service.

use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use enerbudget_api::{AppState, create_router};
use enerbudget_core::{BudgetingService, EngineConfig};
use enerbudget_core::feed::FeedPolicy;
use enerbudget_db::{BudgetRepository, MeterFeedRepository, connect_with};
use enerbudget_shared::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "enerbudget=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = AppConfig::load()?;

    // Connect to database
    let db = connect_with(&config.database).await?;
    info!(
        max_connections = config.database.max_connections,
        "Connected to database"
    );

    // Create budgeting service
    let engine_config = EngineConfig::from(&config.budgeting);
    let feed_policy = FeedPolicy::from(&config.feeds);
    info!(
        warning = %engine_config.thresholds.warning,
        danger = %engine_config.thresholds.danger,
        feed_timeout_ms = config.feeds.timeout_ms,
        "Budget engine configured"
    );

    let feeds = MeterFeedRepository::new(db.clone());
    let service = BudgetingService::new(
        Arc::new(BudgetRepository::new(db)),
        feeds.clone(),
        feeds,
        engine_config,
        feed_policy,
    );

    // Create router
    let app = create_router(AppState::new(service));

    // Start server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
