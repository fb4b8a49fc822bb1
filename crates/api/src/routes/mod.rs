//! API route definitions.

use axum::Router;
use enerbudget_core::feed::{BillingFeed, PriceFeed};
use enerbudget_core::store::BudgetStore;

use crate::AppState;

pub mod budgets;
pub mod health;

/// Creates the API router with all routes.
pub fn api_routes<S, P, B>() -> Router<AppState<S, P, B>>
where
    S: BudgetStore + 'static,
    P: PriceFeed + 'static,
    B: BillingFeed + 'static,
{
    Router::new()
        .merge(health::routes())
        .merge(budgets::routes())
}
