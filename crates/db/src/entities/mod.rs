//! `SeaORM` entities.

pub mod annual_budgets;
pub mod meter_allocations;
pub mod meter_daily_usage;
pub mod meter_prices;
pub mod meters;
pub mod monthly_budget_allocations;
