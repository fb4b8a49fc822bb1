//! Re-parenting and soft deactivation.

use enerbudget_shared::types::BudgetId;
use rust_decimal::Decimal;
use tracing::info;

use super::BudgetingService;
use crate::budget::BudgetError;
use crate::feed::{BillingFeed, PriceFeed};
use crate::hierarchy::BudgetHierarchy;
use crate::store::BudgetStore;

impl<S, P, B> BudgetingService<S, P, B>
where
    S: BudgetStore,
    P: PriceFeed,
    B: BillingFeed,
{
    /// Moves a budget under a new parent, or to the top level with `None`.
    ///
    /// # Errors
    ///
    /// - `HierarchyCycle` if the budget is the new parent or one of its ancestors
    /// - `PeriodOutsideParent` or `EnergyTypeMismatch` if the budget does not fit
    /// - `BudgetExceeded` if the new parent cannot fund it
    /// - `NotFound` if either budget is unknown or inactive
    pub async fn reparent(
        &self,
        budget_id: BudgetId,
        new_parent: Option<BudgetId>,
    ) -> Result<(), BudgetError> {
        let budget = self.active_budget(budget_id).await?;

        let Some(parent_id) = new_parent else {
            self.store.set_parent(budget_id, None).await?;
            info!(budget_id = %budget_id, "Budget moved to top level");
            return Ok(());
        };

        let lock = self.parent_lock(parent_id);
        let _guard = lock.lock().await;

        let mut hierarchy = self.ancestor_chain(parent_id).await?;
        hierarchy.insert(budget.clone());
        hierarchy.validate_parent_assignment(budget_id, Some(parent_id))?;

        let parent = self.active_budget(parent_id).await?;
        if !parent.period().contains(&budget.period()) {
            return Err(BudgetError::PeriodOutsideParent {
                parent: parent_id,
                start: budget.period_start,
                end: budget.period_end,
            });
        }
        if parent.energy_type_id != budget.energy_type_id {
            return Err(BudgetError::EnergyTypeMismatch {
                expected: parent.energy_type_id,
                got: budget.energy_type_id,
            });
        }

        let allocated: Decimal = self
            .store
            .list_children(parent_id)
            .await?
            .iter()
            .filter(|c| c.id != budget_id)
            .map(|c| c.total_budget)
            .sum();
        let available = (parent.total_budget - allocated).max(Decimal::ZERO);
        if budget.total_budget > available {
            return Err(BudgetError::BudgetExceeded {
                requested: budget.total_budget,
                available,
            });
        }

        self.store.set_parent(budget_id, Some(parent_id)).await?;
        info!(budget_id = %budget_id, parent_budget_id = %parent_id, "Budget re-parented");
        Ok(())
    }

    /// Soft-deactivates a budget.
    ///
    /// # Errors
    ///
    /// Returns `HasActiveChildren` if active children still draw on it, or
    /// `NotFound` if it is unknown or already inactive.
    pub async fn deactivate(&self, budget_id: BudgetId) -> Result<(), BudgetError> {
        // Same lock as child commits and re-parents onto this budget.
        let lock = self.parent_lock(budget_id);
        let _guard = lock.lock().await;

        self.active_budget(budget_id).await?;

        if !self.store.list_children(budget_id).await?.is_empty() {
            return Err(BudgetError::HasActiveChildren(budget_id));
        }

        self.store.deactivate(budget_id).await?;
        info!(budget_id = %budget_id, "Budget deactivated");
        Ok(())
    }

    /// Loads `start` and every ancestor up to its root.
    ///
    /// Stops early only on a budget already loaded (a stored loop) or one the
    /// store does not know; both leave the chain without a root.
    async fn ancestor_chain(&self, start: BudgetId) -> Result<BudgetHierarchy, BudgetError> {
        let mut hierarchy = BudgetHierarchy::default();
        let mut cursor = Some(start);

        while let Some(id) = cursor {
            if hierarchy.get(id).is_some() {
                break;
            }
            let Some(budget) = self.store.find_budget(id).await? else {
                break;
            };
            cursor = budget.parent_budget_id;
            hierarchy.insert(budget);
        }

        if hierarchy.get(start).is_none() {
            return Err(BudgetError::NotFound(start));
        }
        Ok(hierarchy)
    }
}
