//! Budget error types.

use chrono::NaiveDate;
use enerbudget_shared::AppError;
use enerbudget_shared::types::{BudgetId, EnergyTypeId, MeterId};
use rust_decimal::Decimal;
use thiserror::Error;

use crate::feed::FeedError;
use crate::store::StoreError;

/// Budget-related errors.
#[derive(Debug, Error)]
pub enum BudgetError {
    /// Period end is not after its start.
    #[error("Invalid period: end {end} must be after start {start}")]
    InvalidPeriod {
        /// Requested start.
        start: NaiveDate,
        /// Requested end.
        end: NaiveDate,
    },

    /// Budget amount is negative.
    #[error("Budget amount must not be negative, got {0}")]
    NegativeBudget(Decimal),

    /// Budget amount is above the configured ceiling.
    #[error("Budget amount {amount} exceeds the maximum of {max}")]
    BudgetTooLarge {
        /// Requested amount.
        amount: Decimal,
        /// Configured maximum.
        max: Decimal,
    },

    /// Budget amount has more decimal places than the currency.
    #[error("Budget amount {amount} has more than {scale} decimal places")]
    AmountPrecision {
        /// Requested amount.
        amount: Decimal,
        /// Currency scale.
        scale: u32,
    },

    /// Efficiency tag outside `[0, 1]`.
    #[error("Efficiency tag must be between 0 and 1, got {0}")]
    InvalidEfficiencyTag(Decimal),

    /// Explicit weights are unusable.
    #[error("Weight mismatch: {0}")]
    WeightMismatch(String),

    /// The same meter appears twice in a draft.
    #[error("Meter {0} is listed more than once")]
    DuplicateMeter(MeterId),

    /// No meters exist to allocate to.
    #[error("No meters registered for energy type {0}")]
    NoMeters(EnergyTypeId),

    /// Meter unknown for the draft's energy type.
    #[error("Meter not found: {0}")]
    MeterNotFound(MeterId),

    /// Budget not found or inactive.
    #[error("Budget not found: {0}")]
    NotFound(BudgetId),

    /// Child period does not lie inside the parent's period.
    #[error("Period {start}..{end} lies outside parent budget {parent}")]
    PeriodOutsideParent {
        /// Parent budget.
        parent: BudgetId,
        /// Requested start.
        start: NaiveDate,
        /// Requested end.
        end: NaiveDate,
    },

    /// Child energy type differs from the parent's.
    #[error("Energy type {got} does not match parent energy type {expected}")]
    EnergyTypeMismatch {
        /// Parent energy type.
        expected: EnergyTypeId,
        /// Draft energy type.
        got: EnergyTypeId,
    },

    /// Requested amount exceeds what the parent can still fund.
    #[error("Budget exceeded: requested {requested}, available {available}")]
    BudgetExceeded {
        /// Requested amount.
        requested: Decimal,
        /// Amount the parent can still fund.
        available: Decimal,
    },

    /// Another commit consumed the parent's funds first.
    #[error("Concurrent commit on parent budget {0} left insufficient funds")]
    CommitRace(BudgetId),

    /// Parent assignment would create a cycle.
    #[error("Assigning parent {parent} to budget {budget} would create a cycle")]
    HierarchyCycle {
        /// Budget being re-parented.
        budget: BudgetId,
        /// Rejected parent.
        parent: BudgetId,
    },

    /// Budget still funds active children.
    #[error("Budget {0} has active child budgets")]
    HasActiveChildren(BudgetId),

    /// Year outside the supported range.
    #[error("Invalid year: {0}")]
    InvalidYear(i32),

    /// External feed exhausted with nothing to degrade to.
    #[error("Upstream unavailable: {0}")]
    Upstream(String),

    /// Durable store failure.
    #[error("Store error: {0}")]
    Store(String),
}

impl BudgetError {
    /// Returns the error code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidPeriod { .. } => "INVALID_PERIOD",
            Self::NegativeBudget(_) => "NEGATIVE_BUDGET",
            Self::BudgetTooLarge { .. } => "BUDGET_TOO_LARGE",
            Self::AmountPrecision { .. } => "AMOUNT_PRECISION",
            Self::InvalidEfficiencyTag(_) => "INVALID_EFFICIENCY_TAG",
            Self::WeightMismatch(_) => "WEIGHT_MISMATCH",
            Self::DuplicateMeter(_) => "DUPLICATE_METER",
            Self::NoMeters(_) => "NO_METERS",
            Self::MeterNotFound(_) => "METER_NOT_FOUND",
            Self::NotFound(_) => "BUDGET_NOT_FOUND",
            Self::PeriodOutsideParent { .. } => "PERIOD_OUTSIDE_PARENT",
            Self::EnergyTypeMismatch { .. } => "ENERGY_TYPE_MISMATCH",
            Self::BudgetExceeded { .. } => "BUDGET_EXCEEDED",
            Self::CommitRace(_) => "COMMIT_RACE",
            Self::HierarchyCycle { .. } => "HIERARCHY_CYCLE",
            Self::HasActiveChildren(_) => "HAS_ACTIVE_CHILDREN",
            Self::InvalidYear(_) => "INVALID_YEAR",
            Self::Upstream(_) => "UPSTREAM_UNAVAILABLE",
            Self::Store(_) => "STORE_ERROR",
        }
    }
}

impl From<StoreError> for BudgetError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => Self::NotFound(id),
            StoreError::InsufficientFunds { parent, .. } => Self::CommitRace(parent),
            StoreError::HasActiveChildren(id) => Self::HasActiveChildren(id),
            StoreError::Backend(msg) => Self::Store(msg),
        }
    }
}

impl From<FeedError> for BudgetError {
    fn from(err: FeedError) -> Self {
        Self::Upstream(err.to_string())
    }
}

impl From<BudgetError> for AppError {
    fn from(err: BudgetError) -> Self {
        let message = err.to_string();
        match err {
            BudgetError::InvalidPeriod { .. }
            | BudgetError::NegativeBudget(_)
            | BudgetError::BudgetTooLarge { .. }
            | BudgetError::AmountPrecision { .. }
            | BudgetError::InvalidEfficiencyTag(_)
            | BudgetError::WeightMismatch(_)
            | BudgetError::DuplicateMeter(_)
            | BudgetError::NoMeters(_)
            | BudgetError::PeriodOutsideParent { .. }
            | BudgetError::EnergyTypeMismatch { .. }
            | BudgetError::HasActiveChildren(_)
            | BudgetError::InvalidYear(_) => Self::Validation(message),
            BudgetError::BudgetExceeded { .. } | BudgetError::CommitRace(_) => {
                Self::Conflict(message)
            }
            BudgetError::NotFound(_) | BudgetError::MeterNotFound(_) => Self::NotFound(message),
            BudgetError::Upstream(_) => Self::UpstreamUnavailable(message),
            BudgetError::HierarchyCycle { .. } => Self::Integrity(message),
            BudgetError::Store(_) => Self::Database(message),
        }
    }
}
