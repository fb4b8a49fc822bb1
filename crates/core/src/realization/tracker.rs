//! Recomputing realized cost against a committed budget.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use enerbudget_shared::types::MeterId;
use rust_decimal::Decimal;

use super::status::{assess, realized_month};
use crate::allocation::allocate_by_weights;
use crate::budget::{
    AnnualBudget, EngineConfig, MeterAllocation, MeterRealization, MonthlyBudgetAllocation,
    RealizationReport,
};
use crate::feed::ActualCost;
use crate::period::first_of_month;

#[derive(Default)]
struct MeterTotals {
    cost: Decimal,
    kwh: Decimal,
}

/// Pure realization recomputation.
///
/// Output depends only on the inputs: the planned allocations are never
/// changed and actuals are summed per key, so calling it again with the same
/// actuals, in any order, gives the same report.
pub struct RealizationTracker;

impl RealizationTracker {
    /// Recomputes monthly and per-meter realization from billed actuals.
    ///
    /// Actuals outside the budget period or for meters without a weight row
    /// are ignored.
    #[must_use]
    pub fn recompute(
        budget: &AnnualBudget,
        plan: &[MonthlyBudgetAllocation],
        allocations: &[MeterAllocation],
        actuals: &[ActualCost],
        config: &EngineConfig,
    ) -> RealizationReport {
        let period = budget.period();
        let allocated_meters: BTreeSet<MeterId> = allocations.iter().map(|a| a.meter_id).collect();

        let mut by_month: BTreeMap<NaiveDate, Decimal> = BTreeMap::new();
        let mut by_meter: BTreeMap<MeterId, MeterTotals> = BTreeMap::new();

        for actual in actuals
            .iter()
            .filter(|a| period.contains_date(a.date) && allocated_meters.contains(&a.meter_id))
        {
            *by_month.entry(first_of_month(actual.date)).or_default() += actual.cost;
            let totals = by_meter.entry(actual.meter_id).or_default();
            totals.cost += actual.cost;
            totals.kwh += actual.consumption_kwh;
        }

        let mut planned: Vec<&MonthlyBudgetAllocation> = plan.iter().collect();
        planned.sort_by_key(|m| m.month);

        let months: Vec<MonthlyBudgetAllocation> = planned
            .iter()
            .map(|m| {
                let cost = by_month.get(&m.month).copied().unwrap_or_default();
                realized_month(m.month, m.allocated_budget, cost, &config.thresholds)
            })
            .collect();

        let meters = Self::meter_realization(budget, allocations, &by_meter, config);

        let total_allocated: Decimal = months.iter().map(|m| m.allocated_budget).sum();
        let total_realization: Decimal = months.iter().map(|m| m.realization_cost).sum();
        let (percentage, status) = assess(total_realization, total_allocated, &config.thresholds);

        RealizationReport {
            budget_id: budget.id,
            months,
            meters,
            total_allocated,
            total_realization,
            realization_percentage: percentage,
            status,
            stale: false,
        }
    }

    /// Builds a report from persisted month rows, flagged as stale.
    #[must_use]
    pub fn from_persisted(
        budget: &AnnualBudget,
        plan: &[MonthlyBudgetAllocation],
        config: &EngineConfig,
    ) -> RealizationReport {
        let mut months = plan.to_vec();
        months.sort_by_key(|m| m.month);

        let total_allocated: Decimal = months.iter().map(|m| m.allocated_budget).sum();
        let total_realization: Decimal = months.iter().map(|m| m.realization_cost).sum();
        let (percentage, status) = assess(total_realization, total_allocated, &config.thresholds);

        RealizationReport {
            budget_id: budget.id,
            months,
            meters: vec![],
            total_allocated,
            total_realization,
            realization_percentage: percentage,
            status,
            stale: true,
        }
    }

    fn meter_realization(
        budget: &AnnualBudget,
        allocations: &[MeterAllocation],
        by_meter: &BTreeMap<MeterId, MeterTotals>,
        config: &EngineConfig,
    ) -> Vec<MeterRealization> {
        let mut ordered: Vec<&MeterAllocation> = allocations.iter().collect();
        ordered.sort_by_key(|a| a.meter_id);

        let weights: Vec<Decimal> = ordered.iter().map(|a| a.weight).collect();
        let shares = allocate_by_weights(budget.total_budget, &weights, config.currency_scale);

        ordered
            .iter()
            .zip(shares)
            .map(|(allocation, allocated_budget)| {
                let (cost, kwh) = by_meter
                    .get(&allocation.meter_id)
                    .map_or((Decimal::ZERO, Decimal::ZERO), |t| (t.cost, t.kwh));
                let (percentage, status) = assess(cost, allocated_budget, &config.thresholds);
                MeterRealization {
                    meter_id: allocation.meter_id,
                    allocated_budget,
                    realization_cost: cost,
                    realization_kwh: kwh,
                    remaining_budget: allocated_budget - cost,
                    realization_percentage: percentage,
                    status,
                }
            })
            .collect()
    }
}
