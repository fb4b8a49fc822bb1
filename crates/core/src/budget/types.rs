//! Budget data types.

use chrono::{DateTime, NaiveDate, Utc};
use enerbudget_shared::types::{BudgetId, EnergyTypeId, MeterId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::period::Period;

/// Risk classification of realized spend against an allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BudgetStatus {
    /// Spend is comfortably below the allocation.
    Safe,
    /// Spend is approaching the allocation.
    Warning,
    /// Spend has reached or exceeded the allocation.
    Danger,
}

impl BudgetStatus {
    /// Returns the persisted representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Safe => "SAFE",
            Self::Warning => "WARNING",
            Self::Danger => "DANGER",
        }
    }
}

impl std::fmt::Display for BudgetStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for BudgetStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "SAFE" => Ok(Self::Safe),
            "WARNING" => Ok(Self::Warning),
            "DANGER" => Ok(Self::Danger),
            _ => Err(format!("Unknown budget status: {s}")),
        }
    }
}

/// A committed budget, either a top-level annual budget or a child period budget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnualBudget {
    /// Budget ID.
    pub id: BudgetId,
    /// Parent budget this one draws funds from.
    pub parent_budget_id: Option<BudgetId>,
    /// Display name.
    pub name: String,
    /// Energy type the budget covers.
    pub energy_type_id: EnergyTypeId,
    /// First day covered.
    pub period_start: NaiveDate,
    /// Last day covered (inclusive).
    pub period_end: NaiveDate,
    /// Total budget amount.
    pub total_budget: Decimal,
    /// Fraction of the parent budget this period may draw.
    pub efficiency_tag: Option<Decimal>,
    /// False once soft-deactivated.
    pub is_active: bool,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl AnnualBudget {
    /// Returns the covered period.
    #[must_use]
    pub const fn period(&self) -> Period {
        Period::new(self.period_start, self.period_end)
    }

    /// Returns true for budgets without a parent.
    #[must_use]
    pub const fn is_top_level(&self) -> bool {
        self.parent_budget_id.is_none()
    }
}

/// Fractional share of a budget assigned to one meter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeterAllocation {
    /// Owning budget.
    pub budget_id: BudgetId,
    /// Meter receiving the share.
    pub meter_id: MeterId,
    /// Normalized weight (0-1).
    pub weight: Decimal,
}

/// Budget apportioned to one calendar month, with its realization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthlyBudgetAllocation {
    /// First day of the calendar month.
    pub month: NaiveDate,
    /// Budget apportioned to the month.
    pub allocated_budget: Decimal,
    /// Actual cost billed in the month.
    pub realization_cost: Decimal,
    /// `allocated_budget - realization_cost`.
    pub remaining_budget: Decimal,
    /// `realization_cost / allocated_budget * 100`, absent for a zero allocation.
    pub realization_percentage: Option<Decimal>,
    /// Risk status derived from the percentage.
    pub status: BudgetStatus,
}

impl MonthlyBudgetAllocation {
    /// A freshly planned month with no realization yet.
    #[must_use]
    pub fn planned(month: NaiveDate, allocated_budget: Decimal) -> Self {
        Self {
            month,
            allocated_budget,
            realization_cost: Decimal::ZERO,
            remaining_budget: allocated_budget,
            realization_percentage: if allocated_budget.is_zero() {
                None
            } else {
                Some(Decimal::ZERO)
            },
            status: BudgetStatus::Safe,
        }
    }
}

/// Explicit weight for one meter in a draft.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeterWeightInput {
    /// Meter ID.
    pub meter_id: MeterId,
    /// Requested weight, renormalized if the set does not sum to one.
    pub weight: Decimal,
}

/// A budget proposal that has not been committed yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetDraft {
    /// Parent budget to draw from, if any.
    #[serde(default)]
    pub parent_budget_id: Option<BudgetId>,
    /// Energy type covered.
    pub energy_type_id: EnergyTypeId,
    /// Optional display name.
    #[serde(default)]
    pub name: Option<String>,
    /// Total budget amount.
    pub total_budget: Decimal,
    /// First day covered.
    pub period_start: NaiveDate,
    /// Last day covered (inclusive).
    pub period_end: NaiveDate,
    /// Fraction of the parent budget this period may draw.
    #[serde(default)]
    pub efficiency_tag: Option<Decimal>,
    /// Explicit meter weights; derived from history when absent.
    #[serde(default)]
    pub allocations: Option<Vec<MeterWeightInput>>,
}

impl BudgetDraft {
    /// Returns the requested period.
    #[must_use]
    pub const fn period(&self) -> Period {
        Period::new(self.period_start, self.period_end)
    }
}

/// Where a meter weight came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeightSource {
    /// Supplied in the draft.
    Explicit,
    /// Derived from average historical consumption.
    Historical,
    /// Equal split, no history available.
    EqualSplit,
}

/// Preview of one meter's share of a draft.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeterAllocationPreview {
    /// Meter ID.
    pub meter_id: MeterId,
    /// Normalized weight.
    pub weight: Decimal,
    /// Where the weight came from.
    pub weight_source: WeightSource,
    /// `total_budget * weight`, rounded to the currency scale.
    pub allocated_budget: Decimal,
    /// `allocated_budget / total_days`.
    pub daily_budget_allocation: Decimal,
    /// Unit price used for the kWh estimate.
    pub unit_price: Option<Decimal>,
    /// `daily_budget_allocation / unit_price`, absent without a price.
    pub estimated_daily_kwh: Option<Decimal>,
}

/// Parent-budget figures behind a child draft.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalculationDetails {
    /// Parent total budget.
    pub parent_total_budget: Decimal,
    /// `parent_total_budget * efficiency_tag`.
    pub efficiency_budget: Decimal,
    /// Parent realization before the draft period starts.
    pub realization_to_date: Decimal,
    /// `efficiency_budget - realization_to_date`.
    pub remaining_budget_for_period: Decimal,
    /// Sum of the parent's active children.
    pub allocated_to_children: Decimal,
    /// `parent_total_budget - allocated_to_children`.
    pub remaining_after_children: Decimal,
    /// Remaining budget spread over the parent's remaining months.
    pub budget_per_month: Decimal,
    /// `budget_per_month` times the months in the draft period, capped.
    pub suggested_budget_for_period: Decimal,
}

/// Result of previewing a draft.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetPreviewResponse {
    /// Total budget.
    pub total_budget: Decimal,
    /// First day covered.
    pub period_start: NaiveDate,
    /// Last day covered.
    pub period_end: NaiveDate,
    /// Days in the period.
    pub total_days: i64,
    /// Allocation per calendar month.
    pub monthly_allocations: Vec<MonthlyBudgetAllocation>,
    /// Allocation per meter, ordered by meter ID.
    pub meter_allocation_preview: Vec<MeterAllocationPreview>,
    /// Parent figures, for child drafts only.
    pub calculation_details: Option<CalculationDetails>,
}

/// Proposal for the next child budget of a parent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrepareNextPeriodBudget {
    /// Parent budget.
    pub parent_budget_id: BudgetId,
    /// Parent total.
    pub parent_total_budget: Decimal,
    /// Sum of active children.
    pub total_allocated_to_children: Decimal,
    /// `max(0, parent_total_budget - total_allocated_to_children)`.
    pub available_budget_for_next_period: Decimal,
    /// Proposed amount for the next period.
    pub prepare_next_period_budget: Decimal,
    /// Calendar months left in the parent from the next period on.
    pub remaining_months: u32,
    /// Suggested start of the next period.
    pub next_period_start: Option<NaiveDate>,
    /// Suggested end of the next period.
    pub next_period_end: Option<NaiveDate>,
    /// Amount by which children exceed the parent, if they do.
    pub over_allocation: Option<Decimal>,
}

/// Yearly totals for one energy type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetSummaryItem {
    /// Energy type.
    pub energy_type_id: EnergyTypeId,
    /// Calendar year summarized.
    pub year: i32,
    /// Number of top-level budgets included.
    pub budget_count: usize,
    /// Sum of top-level budgets.
    pub total_budget: Decimal,
    /// Monthly allocations up to the reference date.
    pub allocated_to_date: Decimal,
    /// Realized cost.
    pub realization_cost: Decimal,
    /// `total_budget - realization_cost`.
    pub remaining_budget: Decimal,
    /// `realization_cost / allocated_to_date * 100`.
    pub realization_percentage: Option<Decimal>,
    /// Risk status.
    pub status: BudgetStatus,
}

/// Realized cost of one meter against its share.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeterRealization {
    /// Meter ID.
    pub meter_id: MeterId,
    /// Meter share of the budget.
    pub allocated_budget: Decimal,
    /// Billed cost.
    pub realization_cost: Decimal,
    /// Billed consumption.
    pub realization_kwh: Decimal,
    /// `allocated_budget - realization_cost`.
    pub remaining_budget: Decimal,
    /// `realization_cost / allocated_budget * 100`.
    pub realization_percentage: Option<Decimal>,
    /// Risk status.
    pub status: BudgetStatus,
}

/// Outcome of recomputing a budget's realization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RealizationReport {
    /// Budget recomputed.
    pub budget_id: BudgetId,
    /// Months in date order.
    pub months: Vec<MonthlyBudgetAllocation>,
    /// Meters in ID order; empty when served from persisted figures.
    pub meters: Vec<MeterRealization>,
    /// Sum of monthly allocations.
    pub total_allocated: Decimal,
    /// Sum of monthly realization.
    pub total_realization: Decimal,
    /// Overall percentage.
    pub realization_percentage: Option<Decimal>,
    /// Overall status.
    pub status: BudgetStatus,
    /// True when the billing feed was unavailable and older figures were used.
    pub stale: bool,
}
