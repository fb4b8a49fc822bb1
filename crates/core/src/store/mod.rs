//! Durable budget store interface.
//!
//! The service only talks to persistence through [`BudgetStore`]. The
//! PostgreSQL implementation lives in `enerbudget-db`; [`InMemoryBudgetStore`]
//! backs tests and local runs.

mod memory;

use std::future::Future;

use chrono::NaiveDate;
use enerbudget_shared::types::{BudgetId, EnergyTypeId, MeterId};
use rust_decimal::Decimal;
use thiserror::Error;

use crate::budget::{AnnualBudget, MeterAllocation, MonthlyBudgetAllocation};

pub use memory::InMemoryBudgetStore;

/// Store failures.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Budget missing or inactive.
    #[error("Budget not found: {0}")]
    NotFound(BudgetId),

    /// Parent funds were consumed before the write could be applied.
    #[error("Parent {parent} has {available} left, {requested} requested")]
    InsufficientFunds {
        /// Parent budget.
        parent: BudgetId,
        /// Amount the write needed.
        requested: Decimal,
        /// Amount left at write time.
        available: Decimal,
    },

    /// Budget still has active children at write time.
    #[error("Budget {0} has active child budgets")]
    HasActiveChildren(BudgetId),

    /// Backend failure.
    #[error("Store backend error: {0}")]
    Backend(String),
}

/// Everything written when a budget is committed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBudget {
    /// Budget record.
    pub budget: AnnualBudget,
    /// Normalized meter weights.
    pub allocations: Vec<MeterAllocation>,
    /// Planned monthly allocations.
    pub monthly: Vec<MonthlyBudgetAllocation>,
}

/// Durable storage of budgets and their allocation rows.
pub trait BudgetStore: Send + Sync {
    /// Finds a budget by ID, active or not.
    fn find_budget(
        &self,
        id: BudgetId,
    ) -> impl Future<Output = Result<Option<AnnualBudget>, StoreError>> + Send;

    /// Active children of a parent, oldest first.
    fn list_children(
        &self,
        parent_id: BudgetId,
    ) -> impl Future<Output = Result<Vec<AnnualBudget>, StoreError>> + Send;

    /// Active budgets whose period overlaps `[from, to]`.
    fn list_in_range(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> impl Future<Output = Result<Vec<AnnualBudget>, StoreError>> + Send;

    /// Meters registered for an energy type, in ascending ID order.
    fn meters_for_energy_type(
        &self,
        energy_type_id: EnergyTypeId,
    ) -> impl Future<Output = Result<Vec<MeterId>, StoreError>> + Send;

    /// Weight rows of a budget, in ascending meter order.
    fn meter_allocations(
        &self,
        budget_id: BudgetId,
    ) -> impl Future<Output = Result<Vec<MeterAllocation>, StoreError>> + Send;

    /// Monthly rows of a budget, in month order.
    fn monthly_allocations(
        &self,
        budget_id: BudgetId,
    ) -> impl Future<Output = Result<Vec<MonthlyBudgetAllocation>, StoreError>> + Send;

    /// Inserts a budget with its weight and monthly rows, all or nothing.
    ///
    /// For a child budget the parent's remaining funds are re-checked under
    /// an exclusive lock on the parent; if they no longer cover the new total
    /// nothing is written and [`StoreError::InsufficientFunds`] is returned.
    fn commit(
        &self,
        new_budget: NewBudget,
    ) -> impl Future<Output = Result<BudgetId, StoreError>> + Send;

    /// Overwrites the realization fields of a budget's monthly rows.
    fn save_realization(
        &self,
        budget_id: BudgetId,
        months: &[MonthlyBudgetAllocation],
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Moves a budget under a new parent, or to the top level.
    ///
    /// Applies the same funds check as [`BudgetStore::commit`].
    fn set_parent(
        &self,
        budget_id: BudgetId,
        parent_id: Option<BudgetId>,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Soft-deactivates a budget.
    ///
    /// Active children are re-checked under the same lock that child commits
    /// take on their parent; if any exist nothing is written and
    /// [`StoreError::HasActiveChildren`] is returned.
    fn deactivate(&self, budget_id: BudgetId) -> impl Future<Output = Result<(), StoreError>> + Send;
}
