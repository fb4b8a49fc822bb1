//! HTTP API layer with Axum routes.
//!
//! This crate provides:
//! - REST routes for budget preview, commit, summary, rollover and maintenance
//! - JSON error responses mapped from the domain errors

pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use enerbudget_core::BudgetingService;
use enerbudget_core::feed::{BillingFeed, PriceFeed};
use enerbudget_core::store::BudgetStore;
use enerbudget_db::{BudgetRepository, MeterFeedRepository};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use error::ApiError;

/// Application state shared across handlers.
pub struct AppState<S, P, B> {
    /// Budgeting service over the configured store and feeds.
    pub budgets: Arc<BudgetingService<S, P, B>>,
}

impl<S, P, B> Clone for AppState<S, P, B> {
    fn clone(&self) -> Self {
        Self {
            budgets: Arc::clone(&self.budgets),
        }
    }
}

impl<S, P, B> AppState<S, P, B> {
    /// Wraps a service.
    #[must_use]
    pub fn new(budgets: BudgetingService<S, P, B>) -> Self {
        Self {
            budgets: Arc::new(budgets),
        }
    }
}

/// State of the PostgreSQL-backed server.
pub type PgAppState = AppState<BudgetRepository, MeterFeedRepository, MeterFeedRepository>;

/// Creates the main application router.
pub fn create_router<S, P, B>(state: AppState<S, P, B>) -> Router
where
    S: BudgetStore + 'static,
    P: PriceFeed + 'static,
    B: BillingFeed + 'static,
{
    Router::new()
        .nest("/api/v1", routes::api_routes())
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
