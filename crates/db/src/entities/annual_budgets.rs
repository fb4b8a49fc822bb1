//! `SeaORM` Entity for annual_budgets table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "annual_budgets")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub parent_budget_id: Option<Uuid>,
    pub name: String,
    pub energy_type_id: i64,
    pub period_start: Date,
    pub period_end: Date,
    #[sea_orm(column_type = "Decimal(Some((20, 2)))")]
    pub total_budget: Decimal,
    #[sea_orm(column_type = "Decimal(Some((5, 4)))", nullable)]
    pub efficiency_tag: Option<Decimal>,
    pub is_active: bool,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "Entity",
        from = "Column::ParentBudgetId",
        to = "Column::Id"
    )]
    Parent,
    #[sea_orm(has_many = "super::meter_allocations::Entity")]
    MeterAllocations,
    #[sea_orm(has_many = "super::monthly_budget_allocations::Entity")]
    MonthlyBudgetAllocations,
}

impl Related<super::meter_allocations::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::MeterAllocations.def()
    }
}

impl Related<super::monthly_budget_allocations::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::MonthlyBudgetAllocations.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
