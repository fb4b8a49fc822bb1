//! Realization recompute and yearly summaries.

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};
use enerbudget_shared::types::{BudgetId, EnergyTypeId, MeterId};
use futures::future::try_join_all;
use rust_decimal::Decimal;
use tracing::{info, warn};

use super::BudgetingService;
use crate::budget::{BudgetError, BudgetSummaryItem, RealizationReport};
use crate::feed::{BillingFeed, Fetched, PriceFeed};
use crate::hierarchy::BudgetHierarchy;
use crate::realization::{RealizationTracker, assess};
use crate::store::BudgetStore;

#[derive(Default)]
struct SummaryTotals {
    budget_count: usize,
    total_budget: Decimal,
    allocated_to_date: Decimal,
    realization_cost: Decimal,
}

impl<S, P, B> BudgetingService<S, P, B>
where
    S: BudgetStore,
    P: PriceFeed,
    B: BillingFeed,
{
    /// Recomputes a budget's realization from the billing feed.
    ///
    /// Fresh actuals are persisted. If the feed is down, stale cached actuals
    /// are used without persisting them; with no cache the persisted figures
    /// are returned. Degraded reports have `stale` set.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown budget, or a store error.
    pub async fn recompute(&self, budget_id: BudgetId) -> Result<RealizationReport, BudgetError> {
        let budget = self
            .store
            .find_budget(budget_id)
            .await?
            .ok_or(BudgetError::NotFound(budget_id))?;
        let plan = self.store.monthly_allocations(budget_id).await?;
        let allocations = self.store.meter_allocations(budget_id).await?;
        let meter_ids: Vec<MeterId> = allocations.iter().map(|a| a.meter_id).collect();

        let actuals = self
            .billing
            .actual_costs(&meter_ids, budget.period_start, budget.period_end)
            .await;

        let report = match actuals {
            Fetched::Fresh(actuals) => {
                let report = RealizationTracker::recompute(
                    &budget,
                    &plan,
                    &allocations,
                    &actuals,
                    &self.config,
                );
                self.store.save_realization(budget_id, &report.months).await?;
                report
            }
            Fetched::Stale(actuals) => {
                let mut report = RealizationTracker::recompute(
                    &budget,
                    &plan,
                    &allocations,
                    &actuals,
                    &self.config,
                );
                report.stale = true;
                report
            }
            Fetched::Unavailable => RealizationTracker::from_persisted(&budget, &plan, &self.config),
        };

        if report.stale {
            warn!(budget_id = %budget_id, "Realization served from stale data");
        } else {
            info!(
                budget_id = %budget_id,
                realization = %report.total_realization,
                status = %report.status,
                "Realization recomputed"
            );
        }

        Ok(report)
    }

    /// Yearly totals per energy type over active top-level budgets.
    ///
    /// Budgets spanning a year boundary count only their months in `year`:
    /// `total_budget` sums those monthly allocations, and `allocated_to_date`
    /// the ones starting on or before `as_of`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidYear` for a year chrono cannot represent, or a store
    /// error.
    pub async fn summary(
        &self,
        year: i32,
        as_of: NaiveDate,
    ) -> Result<Vec<BudgetSummaryItem>, BudgetError> {
        let (Some(year_start), Some(year_end)) = (
            NaiveDate::from_ymd_opt(year, 1, 1),
            NaiveDate::from_ymd_opt(year, 12, 31),
        ) else {
            return Err(BudgetError::InvalidYear(year));
        };

        let hierarchy = BudgetHierarchy::new(self.store.list_in_range(year_start, year_end).await?);
        let roots = hierarchy.roots();
        let plans = try_join_all(roots.iter().map(|b| self.store.monthly_allocations(b.id))).await?;

        let mut totals: BTreeMap<EnergyTypeId, SummaryTotals> = BTreeMap::new();
        for (budget, plan) in roots.iter().zip(plans) {
            let entry = totals.entry(budget.energy_type_id).or_default();
            entry.budget_count += 1;

            for month in plan.iter().filter(|m| m.month.year() == year) {
                entry.total_budget += month.allocated_budget;
                if month.month <= as_of {
                    entry.allocated_to_date += month.allocated_budget;
                }
                entry.realization_cost += month.realization_cost;
            }
        }

        Ok(totals
            .into_iter()
            .map(|(energy_type_id, t)| {
                let (percentage, status) =
                    assess(t.realization_cost, t.allocated_to_date, &self.config.thresholds);
                BudgetSummaryItem {
                    energy_type_id,
                    year,
                    budget_count: t.budget_count,
                    total_budget: t.total_budget,
                    allocated_to_date: t.allocated_to_date,
                    realization_cost: t.realization_cost,
                    remaining_budget: t.total_budget - t.realization_cost,
                    realization_percentage: percentage,
                    status,
                }
            })
            .collect())
    }
}
