//! In-memory budget store.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::NaiveDate;
use enerbudget_shared::types::{BudgetId, EnergyTypeId, MeterId};
use rust_decimal::Decimal;

use super::{BudgetStore, NewBudget, StoreError};
use crate::budget::{AnnualBudget, MeterAllocation, MonthlyBudgetAllocation};

#[derive(Default)]
struct State {
    budgets: HashMap<BudgetId, AnnualBudget>,
    allocations: HashMap<BudgetId, Vec<MeterAllocation>>,
    monthly: HashMap<BudgetId, Vec<MonthlyBudgetAllocation>>,
    meters: BTreeMap<EnergyTypeId, BTreeSet<MeterId>>,
}

impl State {
    fn active_parent(&self, parent_id: BudgetId) -> Result<&AnnualBudget, StoreError> {
        self.budgets
            .get(&parent_id)
            .filter(|b| b.is_active)
            .ok_or(StoreError::NotFound(parent_id))
    }

    /// Parent funds not yet given to active children, ignoring `excluding`.
    fn available_under(
        &self,
        parent_id: BudgetId,
        excluding: Option<BudgetId>,
    ) -> Result<Decimal, StoreError> {
        let parent = self.active_parent(parent_id)?;
        let allocated: Decimal = self
            .budgets
            .values()
            .filter(|b| b.is_active && b.parent_budget_id == Some(parent_id))
            .filter(|b| Some(b.id) != excluding)
            .map(|b| b.total_budget)
            .sum();
        Ok(parent.total_budget - allocated)
    }

    fn check_funds(
        &self,
        parent_id: BudgetId,
        requested: Decimal,
        excluding: Option<BudgetId>,
    ) -> Result<(), StoreError> {
        let available = self.available_under(parent_id, excluding)?;
        if requested > available {
            return Err(StoreError::InsufficientFunds {
                parent: parent_id,
                requested,
                available,
            });
        }
        Ok(())
    }
}

/// Budget store kept in process memory.
///
/// A single write lock covers each mutation, so the funds check and the
/// insert of a commit are atomic.
#[derive(Default)]
pub struct InMemoryBudgetStore {
    state: RwLock<State>,
}

impl InMemoryBudgetStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers meters for an energy type.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Backend` if the lock is poisoned.
    pub fn register_meters(
        &self,
        energy_type_id: EnergyTypeId,
        meter_ids: impl IntoIterator<Item = MeterId>,
    ) -> Result<(), StoreError> {
        let mut state = self.write()?;
        state
            .meters
            .entry(energy_type_id)
            .or_default()
            .extend(meter_ids);
        Ok(())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, State>, StoreError> {
        self.state
            .read()
            .map_err(|e| StoreError::Backend(e.to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, State>, StoreError> {
        self.state
            .write()
            .map_err(|e| StoreError::Backend(e.to_string()))
    }
}

impl BudgetStore for InMemoryBudgetStore {
    async fn find_budget(&self, id: BudgetId) -> Result<Option<AnnualBudget>, StoreError> {
        Ok(self.read()?.budgets.get(&id).cloned())
    }

    async fn list_children(&self, parent_id: BudgetId) -> Result<Vec<AnnualBudget>, StoreError> {
        let state = self.read()?;
        let mut children: Vec<AnnualBudget> = state
            .budgets
            .values()
            .filter(|b| b.is_active && b.parent_budget_id == Some(parent_id))
            .cloned()
            .collect();
        children.sort_by_key(|b| (b.created_at, b.id));
        Ok(children)
    }

    async fn list_in_range(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<AnnualBudget>, StoreError> {
        let state = self.read()?;
        let mut budgets: Vec<AnnualBudget> = state
            .budgets
            .values()
            .filter(|b| b.is_active && b.period_start <= to && b.period_end >= from)
            .cloned()
            .collect();
        budgets.sort_by_key(|b| (b.period_start, b.id));
        Ok(budgets)
    }

    async fn meters_for_energy_type(
        &self,
        energy_type_id: EnergyTypeId,
    ) -> Result<Vec<MeterId>, StoreError> {
        let state = self.read()?;
        Ok(state
            .meters
            .get(&energy_type_id)
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default())
    }

    async fn meter_allocations(
        &self,
        budget_id: BudgetId,
    ) -> Result<Vec<MeterAllocation>, StoreError> {
        let state = self.read()?;
        let mut rows = state.allocations.get(&budget_id).cloned().unwrap_or_default();
        rows.sort_by_key(|a| a.meter_id);
        Ok(rows)
    }

    async fn monthly_allocations(
        &self,
        budget_id: BudgetId,
    ) -> Result<Vec<MonthlyBudgetAllocation>, StoreError> {
        let state = self.read()?;
        let mut rows = state.monthly.get(&budget_id).cloned().unwrap_or_default();
        rows.sort_by_key(|m| m.month);
        Ok(rows)
    }

    async fn commit(&self, new_budget: NewBudget) -> Result<BudgetId, StoreError> {
        let mut state = self.write()?;
        let NewBudget {
            budget,
            allocations,
            monthly,
        } = new_budget;

        if let Some(parent_id) = budget.parent_budget_id {
            state.check_funds(parent_id, budget.total_budget, None)?;
        }

        let id = budget.id;
        state.allocations.insert(id, allocations);
        state.monthly.insert(id, monthly);
        state.budgets.insert(id, budget);
        Ok(id)
    }

    async fn save_realization(
        &self,
        budget_id: BudgetId,
        months: &[MonthlyBudgetAllocation],
    ) -> Result<(), StoreError> {
        let mut state = self.write()?;
        let rows = state
            .monthly
            .get_mut(&budget_id)
            .ok_or(StoreError::NotFound(budget_id))?;

        for row in rows.iter_mut() {
            if let Some(update) = months.iter().find(|m| m.month == row.month) {
                row.realization_cost = update.realization_cost;
                row.remaining_budget = update.remaining_budget;
                row.realization_percentage = update.realization_percentage;
                row.status = update.status;
            }
        }
        Ok(())
    }

    async fn set_parent(
        &self,
        budget_id: BudgetId,
        parent_id: Option<BudgetId>,
    ) -> Result<(), StoreError> {
        let mut state = self.write()?;
        let total = state
            .budgets
            .get(&budget_id)
            .filter(|b| b.is_active)
            .map(|b| b.total_budget)
            .ok_or(StoreError::NotFound(budget_id))?;

        if let Some(parent_id) = parent_id {
            state.check_funds(parent_id, total, Some(budget_id))?;
        }

        if let Some(budget) = state.budgets.get_mut(&budget_id) {
            budget.parent_budget_id = parent_id;
        }
        Ok(())
    }

    async fn deactivate(&self, budget_id: BudgetId) -> Result<(), StoreError> {
        let mut state = self.write()?;
        if state
            .budgets
            .values()
            .any(|b| b.is_active && b.parent_budget_id == Some(budget_id))
        {
            return Err(StoreError::HasActiveChildren(budget_id));
        }

        let budget = state
            .budgets
            .get_mut(&budget_id)
            .ok_or(StoreError::NotFound(budget_id))?;
        budget.is_active = false;
        Ok(())
    }
}
