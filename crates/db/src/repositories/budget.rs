//! PostgreSQL budget store.

use chrono::{NaiveDate, Utc};
use enerbudget_core::budget::{AnnualBudget, MeterAllocation, MonthlyBudgetAllocation};
use enerbudget_core::store::{BudgetStore, NewBudget, StoreError};
use enerbudget_shared::types::{BudgetId, EnergyTypeId, MeterId};
use rust_decimal::Decimal;
use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DatabaseTransaction, DbErr, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use tracing::{debug, warn};

use crate::entities::{annual_budgets, meter_allocations, meters, monthly_budget_allocations};

/// Budget store backed by `SeaORM`.
///
/// Writes that consume a parent's funds take a row lock on the parent
/// (`SELECT ... FOR UPDATE`) inside the write transaction, so two racing
/// commits against the same parent are serialized by the database.
#[derive(Debug, Clone)]
pub struct BudgetRepository {
    db: DatabaseConnection,
}

impl BudgetRepository {
    /// Creates a new budget repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Locks the parent row and checks it can fund `requested`.
    async fn ensure_funds(
        txn: &DatabaseTransaction,
        parent_id: BudgetId,
        requested: Decimal,
        excluding: Option<BudgetId>,
    ) -> Result<(), StoreError> {
        let parent = annual_budgets::Entity::find_by_id(parent_id.into_inner())
            .filter(annual_budgets::Column::IsActive.eq(true))
            .lock_exclusive()
            .one(txn)
            .await
            .map_err(db_err)?
            .ok_or(StoreError::NotFound(parent_id))?;

        let mut children = annual_budgets::Entity::find()
            .filter(annual_budgets::Column::ParentBudgetId.eq(parent_id.into_inner()))
            .filter(annual_budgets::Column::IsActive.eq(true));
        if let Some(excluded) = excluding {
            children = children.filter(annual_budgets::Column::Id.ne(excluded.into_inner()));
        }
        let allocated: Decimal = children
            .all(txn)
            .await
            .map_err(db_err)?
            .iter()
            .map(|c| c.total_budget)
            .sum();

        let available = parent.total_budget - allocated;
        if requested > available {
            warn!(
                parent_budget_id = %parent_id,
                requested = %requested,
                available = %available,
                "Parent funds consumed by a concurrent write"
            );
            return Err(StoreError::InsufficientFunds {
                parent: parent_id,
                requested,
                available,
            });
        }
        Ok(())
    }

    async fn find_active(
        txn: &DatabaseTransaction,
        budget_id: BudgetId,
    ) -> Result<annual_budgets::Model, StoreError> {
        annual_budgets::Entity::find_by_id(budget_id.into_inner())
            .filter(annual_budgets::Column::IsActive.eq(true))
            .lock_exclusive()
            .one(txn)
            .await
            .map_err(db_err)?
            .ok_or(StoreError::NotFound(budget_id))
    }
}

impl BudgetStore for BudgetRepository {
    async fn find_budget(&self, id: BudgetId) -> Result<Option<AnnualBudget>, StoreError> {
        annual_budgets::Entity::find_by_id(id.into_inner())
            .one(&self.db)
            .await
            .map_err(db_err)
            .map(|m| m.map(to_budget))
    }

    async fn list_children(&self, parent_id: BudgetId) -> Result<Vec<AnnualBudget>, StoreError> {
        let rows = annual_budgets::Entity::find()
            .filter(annual_budgets::Column::ParentBudgetId.eq(parent_id.into_inner()))
            .filter(annual_budgets::Column::IsActive.eq(true))
            .order_by_asc(annual_budgets::Column::CreatedAt)
            .order_by_asc(annual_budgets::Column::Id)
            .all(&self.db)
            .await
            .map_err(db_err)?;
        Ok(rows.into_iter().map(to_budget).collect())
    }

    async fn list_in_range(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<AnnualBudget>, StoreError> {
        let rows = annual_budgets::Entity::find()
            .filter(annual_budgets::Column::IsActive.eq(true))
            .filter(annual_budgets::Column::PeriodStart.lte(to))
            .filter(annual_budgets::Column::PeriodEnd.gte(from))
            .order_by_asc(annual_budgets::Column::PeriodStart)
            .order_by_asc(annual_budgets::Column::Id)
            .all(&self.db)
            .await
            .map_err(db_err)?;
        Ok(rows.into_iter().map(to_budget).collect())
    }

    async fn meters_for_energy_type(
        &self,
        energy_type_id: EnergyTypeId,
    ) -> Result<Vec<MeterId>, StoreError> {
        let rows = meters::Entity::find()
            .filter(meters::Column::EnergyTypeId.eq(energy_type_id.into_inner()))
            .filter(meters::Column::IsActive.eq(true))
            .order_by_asc(meters::Column::Id)
            .all(&self.db)
            .await
            .map_err(db_err)?;
        Ok(rows.into_iter().map(|m| MeterId(m.id)).collect())
    }

    async fn meter_allocations(
        &self,
        budget_id: BudgetId,
    ) -> Result<Vec<MeterAllocation>, StoreError> {
        let rows = meter_allocations::Entity::find()
            .filter(meter_allocations::Column::BudgetId.eq(budget_id.into_inner()))
            .order_by_asc(meter_allocations::Column::MeterId)
            .all(&self.db)
            .await
            .map_err(db_err)?;
        Ok(rows
            .into_iter()
            .map(|r| MeterAllocation {
                budget_id,
                meter_id: MeterId(r.meter_id),
                weight: r.weight,
            })
            .collect())
    }

    async fn monthly_allocations(
        &self,
        budget_id: BudgetId,
    ) -> Result<Vec<MonthlyBudgetAllocation>, StoreError> {
        let rows = monthly_budget_allocations::Entity::find()
            .filter(monthly_budget_allocations::Column::BudgetId.eq(budget_id.into_inner()))
            .order_by_asc(monthly_budget_allocations::Column::Month)
            .all(&self.db)
            .await
            .map_err(db_err)?;
        rows.into_iter().map(to_month).collect()
    }

    async fn commit(&self, new_budget: NewBudget) -> Result<BudgetId, StoreError> {
        let NewBudget {
            budget,
            allocations,
            monthly,
        } = new_budget;
        let id = budget.id;

        let txn = self.db.begin().await.map_err(db_err)?;

        if let Some(parent_id) = budget.parent_budget_id {
            Self::ensure_funds(&txn, parent_id, budget.total_budget, None).await?;
        }

        let created_at: DateTimeWithTimeZone = budget.created_at.into();
        annual_budgets::ActiveModel {
            id: Set(id.into_inner()),
            parent_budget_id: Set(budget.parent_budget_id.map(BudgetId::into_inner)),
            name: Set(budget.name),
            energy_type_id: Set(budget.energy_type_id.into_inner()),
            period_start: Set(budget.period_start),
            period_end: Set(budget.period_end),
            total_budget: Set(budget.total_budget),
            efficiency_tag: Set(budget.efficiency_tag),
            is_active: Set(budget.is_active),
            created_at: Set(created_at),
            updated_at: Set(created_at),
        }
        .insert(&txn)
        .await
        .map_err(db_err)?;

        if !allocations.is_empty() {
            meter_allocations::Entity::insert_many(allocations.into_iter().map(|a| {
                meter_allocations::ActiveModel {
                    budget_id: Set(id.into_inner()),
                    meter_id: Set(a.meter_id.into_inner()),
                    weight: Set(a.weight),
                }
            }))
            .exec(&txn)
            .await
            .map_err(db_err)?;
        }

        if !monthly.is_empty() {
            monthly_budget_allocations::Entity::insert_many(monthly.into_iter().map(|m| {
                monthly_budget_allocations::ActiveModel {
                    budget_id: Set(id.into_inner()),
                    month: Set(m.month),
                    allocated_budget: Set(m.allocated_budget),
                    realization_cost: Set(m.realization_cost),
                    remaining_budget: Set(m.remaining_budget),
                    realization_percentage: Set(m.realization_percentage),
                    status: Set(m.status.as_str().to_string()),
                    updated_at: Set(created_at),
                }
            }))
            .exec(&txn)
            .await
            .map_err(db_err)?;
        }

        txn.commit().await.map_err(db_err)?;
        debug!(budget_id = %id, "Budget rows written");
        Ok(id)
    }

    async fn save_realization(
        &self,
        budget_id: BudgetId,
        months: &[MonthlyBudgetAllocation],
    ) -> Result<(), StoreError> {
        let txn = self.db.begin().await.map_err(db_err)?;
        let now: DateTimeWithTimeZone = Utc::now().into();

        for month in months {
            let row = monthly_budget_allocations::Entity::find_by_id((budget_id.into_inner(), month.month))
                .one(&txn)
                .await
                .map_err(db_err)?
                .ok_or(StoreError::NotFound(budget_id))?;

            let mut active: monthly_budget_allocations::ActiveModel = row.into();
            active.realization_cost = Set(month.realization_cost);
            active.remaining_budget = Set(month.remaining_budget);
            active.realization_percentage = Set(month.realization_percentage);
            active.status = Set(month.status.as_str().to_string());
            active.updated_at = Set(now);
            active.update(&txn).await.map_err(db_err)?;
        }

        txn.commit().await.map_err(db_err)
    }

    async fn set_parent(
        &self,
        budget_id: BudgetId,
        parent_id: Option<BudgetId>,
    ) -> Result<(), StoreError> {
        let txn = self.db.begin().await.map_err(db_err)?;
        let budget = Self::find_active(&txn, budget_id).await?;

        if let Some(parent_id) = parent_id {
            Self::ensure_funds(&txn, parent_id, budget.total_budget, Some(budget_id)).await?;
        }

        let mut active: annual_budgets::ActiveModel = budget.into();
        active.parent_budget_id = Set(parent_id.map(BudgetId::into_inner));
        active.updated_at = Set(Utc::now().into());
        active.update(&txn).await.map_err(db_err)?;

        txn.commit().await.map_err(db_err)
    }

    async fn deactivate(&self, budget_id: BudgetId) -> Result<(), StoreError> {
        let txn = self.db.begin().await.map_err(db_err)?;
        // Child commits lock this row before inserting, so the count below
        // sees every child that committed first.
        let budget = Self::find_active(&txn, budget_id).await?;

        let active_children = annual_budgets::Entity::find()
            .filter(annual_budgets::Column::ParentBudgetId.eq(budget_id.into_inner()))
            .filter(annual_budgets::Column::IsActive.eq(true))
            .count(&txn)
            .await
            .map_err(db_err)?;
        if active_children > 0 {
            return Err(StoreError::HasActiveChildren(budget_id));
        }

        let mut active: annual_budgets::ActiveModel = budget.into();
        active.is_active = Set(false);
        active.updated_at = Set(Utc::now().into());
        active.update(&txn).await.map_err(db_err)?;

        txn.commit().await.map_err(db_err)
    }
}

fn db_err(e: DbErr) -> StoreError {
    StoreError::Backend(e.to_string())
}

fn to_budget(model: annual_budgets::Model) -> AnnualBudget {
    AnnualBudget {
        id: BudgetId::from_uuid(model.id),
        parent_budget_id: model.parent_budget_id.map(BudgetId::from_uuid),
        name: model.name,
        energy_type_id: EnergyTypeId(model.energy_type_id),
        period_start: model.period_start,
        period_end: model.period_end,
        total_budget: model.total_budget,
        efficiency_tag: model.efficiency_tag,
        is_active: model.is_active,
        created_at: model.created_at.with_timezone(&Utc),
    }
}

fn to_month(model: monthly_budget_allocations::Model) -> Result<MonthlyBudgetAllocation, StoreError> {
    Ok(MonthlyBudgetAllocation {
        month: model.month,
        allocated_budget: model.allocated_budget,
        realization_cost: model.realization_cost,
        remaining_budget: model.remaining_budget,
        realization_percentage: model.realization_percentage,
        status: model.status.parse().map_err(StoreError::Backend)?,
    })
}
