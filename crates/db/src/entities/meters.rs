//! `SeaORM` Entity for meters table.
//!
//! Meters are master data maintained outside this service; rows are read only.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "meters")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: i64,
    pub energy_type_id: i64,
    pub name: String,
    pub is_active: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::meter_prices::Entity")]
    MeterPrices,
    #[sea_orm(has_many = "super::meter_daily_usage::Entity")]
    MeterDailyUsage,
}

impl Related<super::meter_prices::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::MeterPrices.def()
    }
}

impl Related<super::meter_daily_usage::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::MeterDailyUsage.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
