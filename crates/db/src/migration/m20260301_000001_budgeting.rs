//! Budgeting schema.
//!
//! Meter, price and daily usage tables mirror master and billing data that
//! other systems import; budgets and their allocation rows are owned here.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();

        // Imported master and billing data
        db.execute_unprepared(METERS_SQL).await?;
        db.execute_unprepared(METER_PRICES_SQL).await?;
        db.execute_unprepared(METER_DAILY_USAGE_SQL).await?;

        // Budgets
        db.execute_unprepared(ANNUAL_BUDGETS_SQL).await?;
        db.execute_unprepared(METER_ALLOCATIONS_SQL).await?;
        db.execute_unprepared(MONTHLY_BUDGET_ALLOCATIONS_SQL).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(DROP_ALL_SQL).await?;
        Ok(())
    }
}

const METERS_SQL: &str = r"
CREATE TABLE meters (
    id BIGINT PRIMARY KEY,
    energy_type_id BIGINT NOT NULL,
    name VARCHAR(255) NOT NULL,
    is_active BOOLEAN NOT NULL DEFAULT true
);

CREATE INDEX idx_meters_energy_type ON meters(energy_type_id) WHERE is_active;
";

const METER_PRICES_SQL: &str = r"
CREATE TABLE meter_prices (
    id BIGSERIAL PRIMARY KEY,
    meter_id BIGINT NOT NULL REFERENCES meters(id),
    effective_from DATE NOT NULL,
    unit_price NUMERIC(20, 4) NOT NULL CHECK (unit_price > 0),
    UNIQUE (meter_id, effective_from)
);
";

const METER_DAILY_USAGE_SQL: &str = r"
CREATE TABLE meter_daily_usage (
    meter_id BIGINT NOT NULL REFERENCES meters(id),
    usage_date DATE NOT NULL,
    consumption_kwh NUMERIC(20, 4) NOT NULL DEFAULT 0,
    cost NUMERIC(20, 2) NOT NULL DEFAULT 0,
    PRIMARY KEY (meter_id, usage_date)
);
";

const ANNUAL_BUDGETS_SQL: &str = r"
CREATE TABLE annual_budgets (
    id UUID PRIMARY KEY,
    parent_budget_id UUID REFERENCES annual_budgets(id),
    name VARCHAR(255) NOT NULL,
    energy_type_id BIGINT NOT NULL,
    period_start DATE NOT NULL,
    period_end DATE NOT NULL,
    total_budget NUMERIC(20, 2) NOT NULL CHECK (total_budget >= 0),
    efficiency_tag NUMERIC(5, 4) CHECK (efficiency_tag IS NULL OR efficiency_tag BETWEEN 0 AND 1),
    is_active BOOLEAN NOT NULL DEFAULT true,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT chk_budget_period CHECK (period_end > period_start),
    CONSTRAINT chk_budget_not_own_parent CHECK (parent_budget_id IS DISTINCT FROM id)
);

CREATE INDEX idx_annual_budgets_parent ON annual_budgets(parent_budget_id) WHERE is_active;
CREATE INDEX idx_annual_budgets_period ON annual_budgets(period_start, period_end) WHERE is_active;
";

const METER_ALLOCATIONS_SQL: &str = r"
CREATE TABLE meter_allocations (
    budget_id UUID NOT NULL REFERENCES annual_budgets(id),
    meter_id BIGINT NOT NULL REFERENCES meters(id),
    weight NUMERIC(29, 28) NOT NULL CHECK (weight BETWEEN 0 AND 1),
    PRIMARY KEY (budget_id, meter_id)
);
";

const MONTHLY_BUDGET_ALLOCATIONS_SQL: &str = r"
CREATE TABLE monthly_budget_allocations (
    budget_id UUID NOT NULL REFERENCES annual_budgets(id),
    month DATE NOT NULL CHECK (EXTRACT(DAY FROM month) = 1),
    allocated_budget NUMERIC(20, 2) NOT NULL,
    realization_cost NUMERIC(20, 2) NOT NULL DEFAULT 0,
    remaining_budget NUMERIC(20, 2) NOT NULL,
    realization_percentage NUMERIC(10, 2),
    status VARCHAR(16) NOT NULL DEFAULT 'SAFE' CHECK (status IN ('SAFE', 'WARNING', 'DANGER')),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    PRIMARY KEY (budget_id, month)
);
";

const DROP_ALL_SQL: &str = r"
DROP TABLE IF EXISTS monthly_budget_allocations CASCADE;
DROP TABLE IF EXISTS meter_allocations CASCADE;
DROP TABLE IF EXISTS annual_budgets CASCADE;
DROP TABLE IF EXISTS meter_daily_usage CASCADE;
DROP TABLE IF EXISTS meter_prices CASCADE;
DROP TABLE IF EXISTS meters CASCADE;
";
