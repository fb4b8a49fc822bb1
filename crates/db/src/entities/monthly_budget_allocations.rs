//! `SeaORM` Entity for monthly_budget_allocations table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "monthly_budget_allocations")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub budget_id: Uuid,
    #[sea_orm(primary_key, auto_increment = false)]
    pub month: Date,
    #[sea_orm(column_type = "Decimal(Some((20, 2)))")]
    pub allocated_budget: Decimal,
    #[sea_orm(column_type = "Decimal(Some((20, 2)))")]
    pub realization_cost: Decimal,
    #[sea_orm(column_type = "Decimal(Some((20, 2)))")]
    pub remaining_budget: Decimal,
    #[sea_orm(column_type = "Decimal(Some((10, 2)))", nullable)]
    pub realization_percentage: Option<Decimal>,
    pub status: String,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::annual_budgets::Entity",
        from = "Column::BudgetId",
        to = "super::annual_budgets::Column::Id"
    )]
    AnnualBudgets,
}

impl Related<super::annual_budgets::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::AnnualBudgets.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
