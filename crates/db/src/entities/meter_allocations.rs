//! `SeaORM` Entity for meter_allocations table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "meter_allocations")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub budget_id: Uuid,
    #[sea_orm(primary_key, auto_increment = false)]
    pub meter_id: i64,
    #[sea_orm(column_type = "Decimal(Some((29, 28)))")]
    pub weight: Decimal,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::annual_budgets::Entity",
        from = "Column::BudgetId",
        to = "super::annual_budgets::Column::Id"
    )]
    AnnualBudgets,
    #[sea_orm(
        belongs_to = "super::meters::Entity",
        from = "Column::MeterId",
        to = "super::meters::Column::Id"
    )]
    Meters,
}

impl Related<super::annual_budgets::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::AnnualBudgets.def()
    }
}

impl Related<super::meters::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Meters.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
