//! `SeaORM` Entity for meter_daily_usage table.
//!
//! Imported billing data: one row per meter per day.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "meter_daily_usage")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub meter_id: i64,
    #[sea_orm(primary_key, auto_increment = false)]
    pub usage_date: Date,
    #[sea_orm(column_type = "Decimal(Some((20, 4)))")]
    pub consumption_kwh: Decimal,
    #[sea_orm(column_type = "Decimal(Some((20, 2)))")]
    pub cost: Decimal,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::meters::Entity",
        from = "Column::MeterId",
        to = "super::meters::Column::Id"
    )]
    Meters,
}

impl Related<super::meters::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Meters.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
