//! Explicit engine configuration.
//!
//! Thresholds, the lookback window and the normalization epsilon are passed
//! into every engine call as a value. Nothing here reads global state.

use enerbudget_shared::BudgetingConfig;
use rust_decimal::Decimal;

use super::types::BudgetStatus;

/// Realization percentages at which a budget changes status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusThresholds {
    /// WARNING from this percentage on.
    pub warning: Decimal,
    /// DANGER from this percentage on.
    pub danger: Decimal,
}

impl Default for StatusThresholds {
    fn default() -> Self {
        Self {
            warning: Decimal::from(80),
            danger: Decimal::ONE_HUNDRED,
        }
    }
}

impl StatusThresholds {
    /// Classifies a realization percentage.
    ///
    /// A missing percentage means nothing was allocated: any spend against it
    /// is DANGER, no spend is SAFE.
    #[must_use]
    pub fn classify(&self, percentage: Option<Decimal>, realization_cost: Decimal) -> BudgetStatus {
        match percentage {
            None if realization_cost > Decimal::ZERO => BudgetStatus::Danger,
            None => BudgetStatus::Safe,
            Some(p) if p >= self.danger => BudgetStatus::Danger,
            Some(p) if p >= self.warning => BudgetStatus::Warning,
            Some(_) => BudgetStatus::Safe,
        }
    }
}

/// Configuration passed into allocation, realization and rollover calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Status thresholds.
    pub thresholds: StatusThresholds,
    /// Days of history used for default weights.
    pub lookback_days: u32,
    /// Tolerance for explicit weights summing to one.
    pub weight_epsilon: Decimal,
    /// Decimal places of the currency.
    pub currency_scale: u32,
    /// Largest budget total accepted in a draft.
    pub max_total_budget: Decimal,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            thresholds: StatusThresholds::default(),
            lookback_days: 90,
            weight_epsilon: Decimal::new(1, 6),
            currency_scale: 2,
            max_total_budget: Decimal::new(1_000_000_000_000_000, 0),
        }
    }
}

impl From<&BudgetingConfig> for EngineConfig {
    fn from(config: &BudgetingConfig) -> Self {
        Self {
            thresholds: StatusThresholds {
                warning: config.warning_threshold,
                danger: config.danger_threshold,
            },
            lookback_days: config.lookback_days,
            weight_epsilon: config.weight_epsilon,
            currency_scale: config.currency_scale,
            max_total_budget: config.max_total_budget,
        }
    }
}
