//! JSON error responses.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use enerbudget_core::BudgetError;
use enerbudget_shared::AppError;
use serde_json::json;
use tracing::error;

/// Error returned by handlers, rendered as `{"error": code, "message": text}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl ApiError {
    /// Returns the HTTP status of the response.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Returns the machine-readable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        self.code
    }
}

impl From<BudgetError> for ApiError {
    fn from(err: BudgetError) -> Self {
        let code = err.error_code();
        let app = AppError::from(err);
        let status =
            StatusCode::from_u16(app.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        let message = match &app {
            AppError::Database(_) | AppError::Internal(_) => {
                error!(error = %app, "Request failed");
                "An error occurred".to_string()
            }
            AppError::Validation(m)
            | AppError::Conflict(m)
            | AppError::NotFound(m)
            | AppError::UpstreamUnavailable(m)
            | AppError::Integrity(m) => m.clone(),
        };

        Self {
            status,
            code,
            message,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(json!({
                "error": self.code,
                "message": self.message
            })),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use enerbudget_shared::types::BudgetId;
    use rstest::rstest;
    use rust_decimal_macros::dec;

    #[rstest]
    #[case(BudgetError::NegativeBudget(dec!(-1)), StatusCode::BAD_REQUEST, "NEGATIVE_BUDGET")]
    #[case(
        BudgetError::BudgetTooLarge { amount: dec!(2000000000000000), max: dec!(1000000000000000) },
        StatusCode::BAD_REQUEST,
        "BUDGET_TOO_LARGE"
    )]
    #[case(BudgetError::HasActiveChildren(BudgetId::new()), StatusCode::BAD_REQUEST, "HAS_ACTIVE_CHILDREN")]
    #[case(
        BudgetError::BudgetExceeded { requested: dec!(2), available: dec!(1) },
        StatusCode::CONFLICT,
        "BUDGET_EXCEEDED"
    )]
    #[case(BudgetError::NotFound(BudgetId::new()), StatusCode::NOT_FOUND, "BUDGET_NOT_FOUND")]
    #[case(BudgetError::Store("pool timed out".into()), StatusCode::INTERNAL_SERVER_ERROR, "STORE_ERROR")]
    fn test_status_and_code(
        #[case] err: BudgetError,
        #[case] status: StatusCode,
        #[case] code: &str,
    ) {
        let api = ApiError::from(err);
        assert_eq!(api.status(), status);
        assert_eq!(api.code(), code);
    }

    #[test]
    fn test_backend_details_are_hidden() {
        let api = ApiError::from(BudgetError::Store("password=hunter2".into()));
        assert_eq!(api.message, "An error occurred");
    }
}
