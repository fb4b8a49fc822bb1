//! Budget routes.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post, put},
};
use chrono::{NaiveDate, Utc};
use enerbudget_core::budget::{
    BudgetDraft, BudgetPreviewResponse, PrepareNextPeriodBudget, RealizationReport,
};
use enerbudget_core::feed::{BillingFeed, PriceFeed};
use enerbudget_core::store::BudgetStore;
use enerbudget_shared::types::BudgetId;
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use crate::{ApiError, AppState};

/// Creates the budget routes.
pub fn routes<S, P, B>() -> Router<AppState<S, P, B>>
where
    S: BudgetStore + 'static,
    P: PriceFeed + 'static,
    B: BillingFeed + 'static,
{
    Router::new()
        .route("/budgets", post(create_budget::<S, P, B>))
        .route("/budgets/preview", post(preview_budget::<S, P, B>))
        .route("/budgets/summary", get(budget_summary::<S, P, B>))
        .route("/budgets/{budget_id}", delete(deactivate_budget::<S, P, B>))
        .route("/budgets/{budget_id}/next-period", get(next_period::<S, P, B>))
        .route("/budgets/{budget_id}/realization", post(recompute_realization::<S, P, B>))
        .route("/budgets/{budget_id}/parent", put(reparent_budget::<S, P, B>))
}

// ============================================================================
// Request Types
// ============================================================================

/// Query for the yearly summary.
#[derive(Debug, Deserialize)]
pub struct SummaryQuery {
    /// Calendar year.
    pub year: i32,
    /// Cut-off for `allocated_to_date`; defaults to today.
    pub as_of: Option<NaiveDate>,
}

/// Query carrying an optional reference date.
#[derive(Debug, Deserialize)]
pub struct AsOfQuery {
    /// Reference date; defaults to today.
    pub as_of: Option<NaiveDate>,
}

/// Request body for moving a budget.
#[derive(Debug, Deserialize)]
pub struct ReparentRequest {
    /// New parent, or `null` for top level.
    pub parent_budget_id: Option<BudgetId>,
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

// ============================================================================
// Route Handlers
// ============================================================================

/// POST `/budgets/preview` - Evaluates a draft without saving it.
async fn preview_budget<S, P, B>(
    State(state): State<AppState<S, P, B>>,
    Json(draft): Json<BudgetDraft>,
) -> Result<Json<BudgetPreviewResponse>, ApiError>
where
    S: BudgetStore,
    P: PriceFeed,
    B: BillingFeed,
{
    Ok(Json(state.budgets.preview(&draft).await?))
}

/// POST `/budgets` - Commits a draft.
async fn create_budget<S, P, B>(
    State(state): State<AppState<S, P, B>>,
    Json(draft): Json<BudgetDraft>,
) -> Result<impl IntoResponse, ApiError>
where
    S: BudgetStore,
    P: PriceFeed,
    B: BillingFeed,
{
    let id = state.budgets.commit(&draft).await?;
    Ok((StatusCode::CREATED, Json(json!({ "id": id }))))
}

/// GET `/budgets/summary` - Yearly totals per energy type.
async fn budget_summary<S, P, B>(
    State(state): State<AppState<S, P, B>>,
    Query(query): Query<SummaryQuery>,
) -> Result<impl IntoResponse, ApiError>
where
    S: BudgetStore,
    P: PriceFeed,
    B: BillingFeed,
{
    let as_of = query.as_of.unwrap_or_else(today);
    let items = state.budgets.summary(query.year, as_of).await?;
    Ok(Json(json!({
        "year": query.year,
        "as_of": as_of,
        "items": items
    })))
}

/// GET `/budgets/{budget_id}/next-period` - Proposes the next child budget.
async fn next_period<S, P, B>(
    State(state): State<AppState<S, P, B>>,
    Path(budget_id): Path<BudgetId>,
    Query(query): Query<AsOfQuery>,
) -> Result<Json<PrepareNextPeriodBudget>, ApiError>
where
    S: BudgetStore,
    P: PriceFeed,
    B: BillingFeed,
{
    let as_of = query.as_of.unwrap_or_else(today);
    Ok(Json(state.budgets.prepare_next_period(budget_id, as_of).await?))
}

/// POST `/budgets/{budget_id}/realization` - Recomputes realization from billing data.
async fn recompute_realization<S, P, B>(
    State(state): State<AppState<S, P, B>>,
    Path(budget_id): Path<BudgetId>,
) -> Result<Json<RealizationReport>, ApiError>
where
    S: BudgetStore,
    P: PriceFeed,
    B: BillingFeed,
{
    Ok(Json(state.budgets.recompute(budget_id).await?))
}

/// PUT `/budgets/{budget_id}/parent` - Moves a budget in the hierarchy.
async fn reparent_budget<S, P, B>(
    State(state): State<AppState<S, P, B>>,
    Path(budget_id): Path<BudgetId>,
    Json(payload): Json<ReparentRequest>,
) -> Result<StatusCode, ApiError>
where
    S: BudgetStore,
    P: PriceFeed,
    B: BillingFeed,
{
    state
        .budgets
        .reparent(budget_id, payload.parent_budget_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE `/budgets/{budget_id}` - Soft-deactivates a budget.
async fn deactivate_budget<S, P, B>(
    State(state): State<AppState<S, P, B>>,
    Path(budget_id): Path<BudgetId>,
) -> Result<StatusCode, ApiError>
where
    S: BudgetStore,
    P: PriceFeed,
    B: BillingFeed,
{
    state.budgets.deactivate(budget_id).await?;
    info!(budget_id = %budget_id, "Budget deactivated via API");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use enerbudget_core::budget::EngineConfig;
    use enerbudget_core::feed::{ActualCost, DailyConsumption, FeedError, FeedPolicy};
    use enerbudget_core::service::BudgetingService;
    use enerbudget_core::store::InMemoryBudgetStore;
    use enerbudget_shared::types::{EnergyTypeId, MeterId};
    use http_body_util::BodyExt;
    use rust_decimal::Decimal;
    use serde_json::Value;
    use std::sync::Arc;
    use tower::ServiceExt;

    use crate::create_router;

    struct NoFeeds;

    impl PriceFeed for NoFeeds {
        async fn unit_price(&self, _: MeterId, _: NaiveDate) -> Result<Option<Decimal>, FeedError> {
            Ok(None)
        }

        async fn historical_consumption(
            &self,
            _: MeterId,
            _: NaiveDate,
            _: NaiveDate,
        ) -> Result<Vec<DailyConsumption>, FeedError> {
            Ok(vec![])
        }
    }

    impl BillingFeed for NoFeeds {
        async fn actual_costs(
            &self,
            _: &[MeterId],
            _: NaiveDate,
            _: NaiveDate,
        ) -> Result<Vec<ActualCost>, FeedError> {
            Ok(vec![])
        }
    }

    fn app() -> Router {
        let store = InMemoryBudgetStore::new();
        store
            .register_meters(EnergyTypeId(1), [MeterId(1), MeterId(2)])
            .unwrap();
        let service = BudgetingService::new(
            Arc::new(store),
            NoFeeds,
            NoFeeds,
            EngineConfig::default(),
            FeedPolicy::default(),
        );
        create_router(AppState::new(service))
    }

    async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("Content-Type", "application/json")
            .body(body.map_or_else(Body::empty, |b| Body::from(b.to_string())))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    fn draft(total: &str, start: &str, end: &str) -> Value {
        json!({
            "energy_type_id": 1,
            "total_budget": total,
            "period_start": start,
            "period_end": end
        })
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = send(&app(), "GET", "/api/v1/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
    }

    #[tokio::test]
    async fn test_preview_returns_monthly_split() {
        let app = app();
        let (status, body) = send(
            &app,
            "POST",
            "/api/v1/budgets/preview",
            Some(draft("9000000", "2024-01-01", "2024-03-31")),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total_days"], 91);
        assert_eq!(body["monthly_allocations"][0]["allocated_budget"], "3065934.06");
        assert_eq!(body["meter_allocation_preview"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_invalid_period_is_bad_request() {
        let (status, body) = send(
            &app(),
            "POST",
            "/api/v1/budgets/preview",
            Some(draft("100", "2024-03-31", "2024-01-01")),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "INVALID_PERIOD");
    }

    #[tokio::test]
    async fn test_commit_then_child_over_remaining_conflicts() {
        let app = app();
        let (status, body) = send(
            &app,
            "POST",
            "/api/v1/budgets",
            Some(draft("1000", "2024-01-01", "2024-12-31")),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let parent = body["id"].as_str().unwrap().to_string();

        let mut child = draft("1000.01", "2024-02-01", "2024-02-29");
        child["parent_budget_id"] = json!(parent);
        let (status, body) = send(&app, "POST", "/api/v1/budgets", Some(child)).await;

        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "BUDGET_EXCEEDED");
    }

    #[tokio::test]
    async fn test_next_period_and_summary() {
        let app = app();
        let (_, body) = send(
            &app,
            "POST",
            "/api/v1/budgets",
            Some(draft("12000000", "2024-01-01", "2024-12-31")),
        )
        .await;
        let parent = body["id"].as_str().unwrap().to_string();

        let (status, body) = send(
            &app,
            "GET",
            &format!("/api/v1/budgets/{parent}/next-period?as_of=2024-06-01"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["available_budget_for_next_period"], "12000000");
        assert_eq!(body["remaining_months"], 7);

        let (status, body) = send(
            &app,
            "GET",
            "/api/v1/budgets/summary?year=2024&as_of=2024-01-31",
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["items"][0]["budget_count"], 1);
        assert_eq!(body["items"][0]["status"], "SAFE");
    }

    #[tokio::test]
    async fn test_reparent_cycle_and_deactivate() {
        let app = app();
        let (_, body) = send(
            &app,
            "POST",
            "/api/v1/budgets",
            Some(draft("1000", "2024-01-01", "2024-12-31")),
        )
        .await;
        let parent = body["id"].as_str().unwrap().to_string();
        let mut child = draft("100", "2024-01-01", "2024-06-30");
        child["parent_budget_id"] = json!(parent);
        let (_, body) = send(&app, "POST", "/api/v1/budgets", Some(child)).await;
        let child = body["id"].as_str().unwrap().to_string();

        let (status, body) = send(
            &app,
            "PUT",
            &format!("/api/v1/budgets/{parent}/parent"),
            Some(json!({ "parent_budget_id": child })),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"], "HIERARCHY_CYCLE");

        let (status, _) = send(&app, "DELETE", &format!("/api/v1/budgets/{parent}"), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(&app, "DELETE", &format!("/api/v1/budgets/{child}"), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = send(&app, "DELETE", &format!("/api/v1/budgets/{parent}"), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
    }
}
