//! Proposing the next child budget from a parent's unspent funds.

use chrono::{Days, NaiveDate};
use rust_decimal::Decimal;
use tracing::warn;

use crate::allocation::truncate;
use crate::budget::{AnnualBudget, BudgetError, EngineConfig, PrepareNextPeriodBudget};
use crate::period::{Period, last_of_month};

/// Rollover proposals.
pub struct RolloverPlanner;

impl RolloverPlanner {
    /// Proposes the next period budget under `parent`.
    ///
    /// The next period starts on `as_of` or the day after the latest active
    /// child ends, whichever is later, and runs to the end of that month. The
    /// unallocated remainder of the parent is spread evenly over the months
    /// left in the parent from there on.
    ///
    /// Children exceeding the parent are reported in `over_allocation` and
    /// logged; the proposal is then zero.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the parent is inactive.
    pub fn prepare_next(
        parent: &AnnualBudget,
        children: &[AnnualBudget],
        as_of: NaiveDate,
        config: &EngineConfig,
    ) -> Result<PrepareNextPeriodBudget, BudgetError> {
        if !parent.is_active {
            return Err(BudgetError::NotFound(parent.id));
        }

        let active: Vec<&AnnualBudget> = children
            .iter()
            .filter(|c| c.is_active && c.parent_budget_id == Some(parent.id))
            .collect();

        let total_allocated_to_children: Decimal = active.iter().map(|c| c.total_budget).sum();
        let raw_available = parent.total_budget - total_allocated_to_children;
        let over_allocation = if raw_available < Decimal::ZERO {
            warn!(
                parent_budget_id = %parent.id,
                parent_total = %parent.total_budget,
                allocated = %total_allocated_to_children,
                "Children exceed parent budget"
            );
            Some(-raw_available)
        } else {
            None
        };
        let available = raw_available.max(Decimal::ZERO);

        let after_children = active
            .iter()
            .map(|c| c.period_end)
            .max()
            .and_then(|end| end.checked_add_days(Days::new(1)));
        let next_start = [Some(as_of), after_children, Some(parent.period_start)]
            .into_iter()
            .flatten()
            .max()
            .unwrap_or(as_of);

        let (remaining_months, next_period_start, next_period_end) =
            if next_start > parent.period_end {
                (0, None, None)
            } else {
                let months = Period::new(next_start, parent.period_end)
                    .month_slices()
                    .len();
                (
                    u32::try_from(months).unwrap_or(u32::MAX),
                    Some(next_start),
                    Some(last_of_month(next_start).min(parent.period_end)),
                )
            };

        let prepare_next_period_budget = if remaining_months == 0 {
            available
        } else {
            truncate(
                available / Decimal::from(remaining_months),
                config.currency_scale,
            )
        };

        Ok(PrepareNextPeriodBudget {
            parent_budget_id: parent.id,
            parent_total_budget: parent.total_budget,
            total_allocated_to_children,
            available_budget_for_next_period: available,
            prepare_next_period_budget,
            remaining_months,
            next_period_start,
            next_period_end,
            over_allocation,
        })
    }
}
