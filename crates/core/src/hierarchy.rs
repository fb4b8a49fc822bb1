//! Parent/child budget graph.
//!
//! Budgets are held in a map keyed by ID and linked only through
//! `parent_budget_id`. Every walk up the tree is bounded by the number of
//! budgets held, so a corrupt chain cannot loop forever.

use std::collections::HashMap;

use enerbudget_shared::types::BudgetId;
use rust_decimal::Decimal;

use crate::budget::{AnnualBudget, BudgetError};

/// An indexed collection of budgets.
#[derive(Debug, Clone, Default)]
pub struct BudgetHierarchy {
    budgets: HashMap<BudgetId, AnnualBudget>,
}

impl BudgetHierarchy {
    /// Builds a hierarchy from budget records.
    pub fn new(budgets: impl IntoIterator<Item = AnnualBudget>) -> Self {
        Self {
            budgets: budgets.into_iter().map(|b| (b.id, b)).collect(),
        }
    }

    /// Adds or replaces a budget.
    pub fn insert(&mut self, budget: AnnualBudget) {
        self.budgets.insert(budget.id, budget);
    }

    /// Looks up a budget.
    #[must_use]
    pub fn get(&self, id: BudgetId) -> Option<&AnnualBudget> {
        self.budgets.get(&id)
    }

    /// Number of budgets held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.budgets.len()
    }

    /// Returns true if no budgets are held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.budgets.is_empty()
    }

    /// Active top-level budgets, by period start.
    #[must_use]
    pub fn roots(&self) -> Vec<&AnnualBudget> {
        let mut roots: Vec<&AnnualBudget> = self
            .budgets
            .values()
            .filter(|b| b.is_active && b.is_top_level())
            .collect();
        roots.sort_by_key(|b| (b.period_start, b.id));
        roots
    }

    /// Active children of a budget, by period start.
    #[must_use]
    pub fn children(&self, parent_id: BudgetId) -> Vec<&AnnualBudget> {
        let mut children: Vec<&AnnualBudget> = self
            .budgets
            .values()
            .filter(|b| b.is_active && b.parent_budget_id == Some(parent_id))
            .collect();
        children.sort_by_key(|b| (b.period_start, b.id));
        children
    }

    /// Ancestors of a budget, nearest first.
    ///
    /// Stops at the first parent that is not held, and after `len()` steps.
    #[must_use]
    pub fn ancestors(&self, id: BudgetId) -> Vec<&AnnualBudget> {
        let mut chain = Vec::new();
        let mut cursor = self.get(id).and_then(|b| b.parent_budget_id);

        while let Some(parent_id) = cursor {
            if chain.len() >= self.budgets.len() {
                break;
            }
            let Some(parent) = self.get(parent_id) else {
                break;
            };
            chain.push(parent);
            cursor = parent.parent_budget_id;
        }

        chain
    }

    /// Sum of the active children's totals.
    #[must_use]
    pub fn allocated_to_children(&self, parent_id: BudgetId) -> Decimal {
        self.children(parent_id)
            .iter()
            .map(|b| b.total_budget)
            .sum()
    }

    /// Parent total minus the active children's totals.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the parent is not held.
    pub fn remaining_budget(&self, parent_id: BudgetId) -> Result<Decimal, BudgetError> {
        let parent = self
            .get(parent_id)
            .ok_or(BudgetError::NotFound(parent_id))?;
        Ok(parent.total_budget - self.allocated_to_children(parent_id))
    }

    /// Checks that `candidate` may become the parent of `budget_id`.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the candidate is not held, and `HierarchyCycle`
    /// if the budget is the candidate or one of its ancestors, or if the
    /// candidate's chain never reaches a root.
    pub fn validate_parent_assignment(
        &self,
        budget_id: BudgetId,
        candidate: Option<BudgetId>,
    ) -> Result<(), BudgetError> {
        let Some(candidate_id) = candidate else {
            return Ok(());
        };

        let cycle = BudgetError::HierarchyCycle {
            budget: budget_id,
            parent: candidate_id,
        };

        if candidate_id == budget_id {
            return Err(cycle);
        }

        let candidate = self
            .get(candidate_id)
            .ok_or(BudgetError::NotFound(candidate_id))?;

        let mut cursor = candidate.parent_budget_id;
        let mut steps = 0;
        while let Some(ancestor_id) = cursor {
            if ancestor_id == budget_id || steps >= self.budgets.len() {
                return Err(cycle);
            }
            steps += 1;
            // An ancestor that is not held means the chain was cut short and
            // cannot be shown to end at a root.
            let Some(ancestor) = self.get(ancestor_id) else {
                return Err(cycle);
            };
            cursor = ancestor.parent_budget_id;
        }

        Ok(())
    }
}
