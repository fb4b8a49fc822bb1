//! Draft evaluation: monthly split, meter shares and parent limits.

use rayon::prelude::*;
use rust_decimal::Decimal;

use super::monthly::split_by_days;
use super::rounding::{allocate_by_weights, truncate};
use super::weights::{MeterProfile, ResolvedWeight, derive_from_history, normalize_explicit};
use crate::budget::{
    AnnualBudget, BudgetDraft, BudgetError, BudgetPreviewResponse, CalculationDetails,
    EngineConfig, MeterAllocationPreview,
};
use crate::period::Period;

/// Decimal places kept for daily amounts and kWh estimates.
const DAILY_SCALE: u32 = 4;

/// The parent of a child draft, as seen when the draft is evaluated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParentSnapshot {
    /// Parent budget.
    pub budget: AnnualBudget,
    /// Sum of the parent's active children.
    pub allocated_to_children: Decimal,
    /// Parent realization in months before the draft period.
    pub realization_to_date: Decimal,
}

/// Everything a draft evaluation reads from collaborators.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllocationContext {
    /// Parent snapshot, for child drafts.
    pub parent: Option<ParentSnapshot>,
    /// Meters of the draft's energy type.
    pub meters: Vec<MeterProfile>,
}

/// Pure evaluation of budget drafts.
///
/// Preview and commit both go through [`AllocationEngine::compute_preview`],
/// so a committed budget is exactly what was previewed.
pub struct AllocationEngine;

impl AllocationEngine {
    /// Checks the parts of a draft that need no collaborator data.
    ///
    /// # Errors
    ///
    /// Returns `InvalidPeriod`, `NegativeBudget`, `BudgetTooLarge`,
    /// `AmountPrecision` or `InvalidEfficiencyTag`.
    pub fn validate_draft(draft: &BudgetDraft, config: &EngineConfig) -> Result<(), BudgetError> {
        if !draft.period().is_valid() {
            return Err(BudgetError::InvalidPeriod {
                start: draft.period_start,
                end: draft.period_end,
            });
        }

        if draft.total_budget < Decimal::ZERO {
            return Err(BudgetError::NegativeBudget(draft.total_budget));
        }

        if draft.total_budget > config.max_total_budget {
            return Err(BudgetError::BudgetTooLarge {
                amount: draft.total_budget,
                max: config.max_total_budget,
            });
        }

        if draft.total_budget.normalize().scale() > config.currency_scale {
            return Err(BudgetError::AmountPrecision {
                amount: draft.total_budget,
                scale: config.currency_scale,
            });
        }

        if let Some(tag) = draft.efficiency_tag
            && (tag < Decimal::ZERO || tag > Decimal::ONE)
        {
            return Err(BudgetError::InvalidEfficiencyTag(tag));
        }

        Ok(())
    }

    /// Computes how much of the parent a child draft may draw.
    ///
    /// The draft may use at most the smaller of the efficiency-scaled budget
    /// left after realization and the parent total left after its children.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an inactive parent, `PeriodOutsideParent`,
    /// `EnergyTypeMismatch`, or `BudgetExceeded` when the draft asks for more
    /// than is available.
    pub fn calculation_details(
        draft: &BudgetDraft,
        parent: &ParentSnapshot,
        config: &EngineConfig,
    ) -> Result<CalculationDetails, BudgetError> {
        let budget = &parent.budget;
        if !budget.is_active {
            return Err(BudgetError::NotFound(budget.id));
        }

        if !budget.period().contains(&draft.period()) {
            return Err(BudgetError::PeriodOutsideParent {
                parent: budget.id,
                start: draft.period_start,
                end: draft.period_end,
            });
        }

        if budget.energy_type_id != draft.energy_type_id {
            return Err(BudgetError::EnergyTypeMismatch {
                expected: budget.energy_type_id,
                got: draft.energy_type_id,
            });
        }

        let scale = config.currency_scale;
        let tag = draft.efficiency_tag.unwrap_or(Decimal::ONE);
        let efficiency_budget = truncate(budget.total_budget * tag, scale);
        let remaining_budget_for_period = efficiency_budget - parent.realization_to_date;
        let remaining_after_children = budget.total_budget - parent.allocated_to_children;
        let available = remaining_budget_for_period
            .min(remaining_after_children)
            .max(Decimal::ZERO);

        // Months from the draft start through the parent end; at least one
        // because the draft lies inside the parent.
        let parent_months = Period::new(draft.period_start, budget.period_end)
            .month_slices()
            .len()
            .max(1);
        let draft_months = draft.period().month_slices().len();

        let budget_per_month = truncate(available / Decimal::from(parent_months), scale);
        let suggested_budget_for_period =
            (budget_per_month * Decimal::from(draft_months)).min(available);

        if draft.total_budget > available {
            return Err(BudgetError::BudgetExceeded {
                requested: draft.total_budget,
                available,
            });
        }

        Ok(CalculationDetails {
            parent_total_budget: budget.total_budget,
            efficiency_budget,
            realization_to_date: parent.realization_to_date,
            remaining_budget_for_period,
            allocated_to_children: parent.allocated_to_children,
            remaining_after_children,
            budget_per_month,
            suggested_budget_for_period,
        })
    }

    /// Resolves normalized meter weights for a draft, in meter order.
    ///
    /// # Errors
    ///
    /// Returns `NoMeters` when the energy type has no meters, or the errors of
    /// [`normalize_explicit`].
    pub fn resolve_weights(
        draft: &BudgetDraft,
        meters: &[MeterProfile],
        config: &EngineConfig,
    ) -> Result<Vec<ResolvedWeight>, BudgetError> {
        match draft.allocations.as_deref() {
            Some(inputs) if !inputs.is_empty() => {
                let known: Vec<_> = meters.iter().map(|m| m.meter_id).collect();
                normalize_explicit(inputs, &known, config.weight_epsilon)
            }
            _ => {
                if meters.is_empty() {
                    return Err(BudgetError::NoMeters(draft.energy_type_id));
                }
                Ok(derive_from_history(meters))
            }
        }
    }

    /// Evaluates a draft without side effects.
    ///
    /// # Errors
    ///
    /// Returns any validation, parent-limit or weight error for the draft.
    pub fn compute_preview(
        draft: &BudgetDraft,
        context: &AllocationContext,
        config: &EngineConfig,
    ) -> Result<BudgetPreviewResponse, BudgetError> {
        Self::validate_draft(draft, config)?;

        let calculation_details = match (draft.parent_budget_id, &context.parent) {
            (None, _) => None,
            (Some(id), Some(parent)) if parent.budget.id == id => {
                Some(Self::calculation_details(draft, parent, config)?)
            }
            (Some(id), _) => return Err(BudgetError::NotFound(id)),
        };

        let weights = Self::resolve_weights(draft, &context.meters, config)?;
        let period = draft.period();
        let total_days = period.total_days();
        let scale = config.currency_scale;

        let monthly_allocations = split_by_days(draft.total_budget, &period, scale);

        let raw_weights: Vec<Decimal> = weights.iter().map(|w| w.weight).collect();
        let amounts = allocate_by_weights(draft.total_budget, &raw_weights, scale);

        let meter_allocation_preview = weights
            .par_iter()
            .zip(amounts.par_iter())
            .map(|(weight, amount)| {
                let unit_price = context
                    .meters
                    .iter()
                    .find(|m| m.meter_id == weight.meter_id)
                    .and_then(|m| m.unit_price);
                Self::meter_preview(weight, *amount, unit_price, total_days)
            })
            .collect();

        Ok(BudgetPreviewResponse {
            total_budget: draft.total_budget,
            period_start: draft.period_start,
            period_end: draft.period_end,
            total_days,
            monthly_allocations,
            meter_allocation_preview,
            calculation_details,
        })
    }

    fn meter_preview(
        weight: &ResolvedWeight,
        allocated_budget: Decimal,
        unit_price: Option<Decimal>,
        total_days: i64,
    ) -> MeterAllocationPreview {
        let daily_budget_allocation =
            (allocated_budget / Decimal::from(total_days)).round_dp(DAILY_SCALE);
        let estimated_daily_kwh = unit_price
            .filter(|p| *p > Decimal::ZERO)
            .and_then(|p| daily_budget_allocation.checked_div(p))
            .map(|kwh| kwh.round_dp(DAILY_SCALE));

        MeterAllocationPreview {
            meter_id: weight.meter_id,
            weight: weight.weight,
            weight_source: weight.source,
            allocated_budget,
            daily_budget_allocation,
            unit_price,
            estimated_daily_kwh,
        }
    }
}
