//! Preview, commit and rollover.

use chrono::{Days, NaiveDate, Utc};
use enerbudget_shared::types::{BudgetId, MeterId};
use futures::future::join_all;
use rust_decimal::Decimal;
use tracing::{debug, info, instrument};

use super::BudgetingService;
use crate::allocation::{AllocationContext, AllocationEngine, MeterProfile, ParentSnapshot};
use crate::budget::{
    AnnualBudget, BudgetDraft, BudgetError, BudgetPreviewResponse, MeterAllocation,
    PrepareNextPeriodBudget,
};
use crate::feed::{BillingFeed, PriceFeed};
use crate::period::first_of_month;
use crate::rollover::RolloverPlanner;
use crate::store::{BudgetStore, NewBudget};

impl<S, P, B> BudgetingService<S, P, B>
where
    S: BudgetStore,
    P: PriceFeed,
    B: BillingFeed,
{
    /// Evaluates a draft without writing anything.
    ///
    /// # Errors
    ///
    /// Returns the draft's validation, parent-limit or weight error, or a
    /// store error.
    #[instrument(skip(self, draft), fields(energy_type_id = %draft.energy_type_id))]
    pub async fn preview(&self, draft: &BudgetDraft) -> Result<BudgetPreviewResponse, BudgetError> {
        AllocationEngine::validate_draft(draft, &self.config)?;
        let context = self.load_context(draft).await?;
        AllocationEngine::compute_preview(draft, &context, &self.config)
    }

    /// Commits a draft and returns the new budget's ID.
    ///
    /// The draft is evaluated again under the parent's lock with the same
    /// function as [`Self::preview`]; the budget, its weights and its monthly
    /// plan are then written in one store transaction.
    ///
    /// # Errors
    ///
    /// Returns `BudgetExceeded` if the parent cannot fund the draft and
    /// `CommitRace` if a concurrent write consumed the funds first.
    #[instrument(skip(self, draft), fields(parent_budget_id = ?draft.parent_budget_id))]
    pub async fn commit(&self, draft: &BudgetDraft) -> Result<BudgetId, BudgetError> {
        AllocationEngine::validate_draft(draft, &self.config)?;

        let lock = draft.parent_budget_id.map(|id| self.parent_lock(id));
        let _guard = match &lock {
            Some(lock) => Some(lock.lock().await),
            None => None,
        };

        let context = self.load_context(draft).await?;
        let preview = AllocationEngine::compute_preview(draft, &context, &self.config)?;

        let budget = AnnualBudget {
            id: BudgetId::new(),
            parent_budget_id: draft.parent_budget_id,
            name: draft
                .name
                .clone()
                .unwrap_or_else(|| format!("Budget {} - {}", draft.period_start, draft.period_end)),
            energy_type_id: draft.energy_type_id,
            period_start: draft.period_start,
            period_end: draft.period_end,
            total_budget: draft.total_budget,
            efficiency_tag: draft.efficiency_tag,
            is_active: true,
            created_at: Utc::now(),
        };
        let allocations = preview
            .meter_allocation_preview
            .iter()
            .map(|m| MeterAllocation {
                budget_id: budget.id,
                meter_id: m.meter_id,
                weight: m.weight,
            })
            .collect();

        let id = self
            .store
            .commit(NewBudget {
                budget,
                allocations,
                monthly: preview.monthly_allocations,
            })
            .await?;

        info!(budget_id = %id, total_budget = %draft.total_budget, "Budget committed");
        Ok(id)
    }

    /// Proposes the next child budget of a parent.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the parent does not exist or is inactive.
    pub async fn prepare_next_period(
        &self,
        parent_id: BudgetId,
        as_of: NaiveDate,
    ) -> Result<PrepareNextPeriodBudget, BudgetError> {
        let parent = self.active_budget(parent_id).await?;
        let children = self.store.list_children(parent_id).await?;
        RolloverPlanner::prepare_next(&parent, &children, as_of, &self.config)
    }

    pub(super) async fn active_budget(&self, id: BudgetId) -> Result<AnnualBudget, BudgetError> {
        self.store
            .find_budget(id)
            .await?
            .filter(|b| b.is_active)
            .ok_or(BudgetError::NotFound(id))
    }

    async fn load_context(&self, draft: &BudgetDraft) -> Result<AllocationContext, BudgetError> {
        let parent = match draft.parent_budget_id {
            Some(parent_id) => Some(self.parent_snapshot(parent_id, draft.period_start).await?),
            None => None,
        };

        let meter_ids = self
            .store
            .meters_for_energy_type(draft.energy_type_id)
            .await?;
        let needs_history = draft.allocations.as_ref().is_none_or(Vec::is_empty);

        let meters = join_all(
            meter_ids
                .into_iter()
                .map(|meter_id| self.meter_profile(meter_id, draft.period_start, needs_history)),
        )
        .await;

        Ok(AllocationContext { parent, meters })
    }

    async fn parent_snapshot(
        &self,
        parent_id: BudgetId,
        draft_start: NaiveDate,
    ) -> Result<ParentSnapshot, BudgetError> {
        let budget = self.active_budget(parent_id).await?;
        let children = self.store.list_children(parent_id).await?;
        let months = self.store.monthly_allocations(parent_id).await?;

        let cutoff = first_of_month(draft_start);
        let realization_to_date: Decimal = months
            .iter()
            .filter(|m| m.month < cutoff)
            .map(|m| m.realization_cost)
            .sum();

        Ok(ParentSnapshot {
            allocated_to_children: children.iter().map(|c| c.total_budget).sum(),
            realization_to_date,
            budget,
        })
    }

    async fn meter_profile(
        &self,
        meter_id: MeterId,
        start: NaiveDate,
        needs_history: bool,
    ) -> MeterProfile {
        let unit_price = self.prices.unit_price(meter_id, start).await.into_option().flatten();

        let average_daily_kwh = if needs_history {
            self.average_daily_kwh(meter_id, start).await
        } else {
            None
        };

        MeterProfile {
            meter_id,
            unit_price,
            average_daily_kwh,
        }
    }

    async fn average_daily_kwh(&self, meter_id: MeterId, start: NaiveDate) -> Option<Decimal> {
        let to = start.checked_sub_days(Days::new(1))?;
        let from = start.checked_sub_days(Days::new(u64::from(self.config.lookback_days)))?;

        let history = self
            .prices
            .historical_consumption(meter_id, from, to)
            .await
            .into_option()?;

        if history.is_empty() {
            debug!(meter_id = %meter_id, "No consumption history in lookback window");
            return None;
        }

        // Days without a record count as zero consumption.
        let total = history
            .iter()
            .try_fold(Decimal::ZERO, |acc, d| acc.checked_add(d.kwh))?;
        total.checked_div(Decimal::from(self.config.lookback_days))
    }
}
