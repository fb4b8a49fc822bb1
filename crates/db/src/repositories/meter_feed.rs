//! Price, consumption and billing feeds read from imported meter tables.

use chrono::NaiveDate;
use enerbudget_core::feed::{ActualCost, BillingFeed, DailyConsumption, FeedError, PriceFeed};
use enerbudget_shared::types::MeterId;
use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, QueryOrder};

use crate::entities::{meter_daily_usage, meter_prices};

/// Serves [`PriceFeed`] and [`BillingFeed`] from `meter_prices` and
/// `meter_daily_usage`.
#[derive(Debug, Clone)]
pub struct MeterFeedRepository {
    db: DatabaseConnection,
}

impl MeterFeedRepository {
    /// Creates a new meter feed repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    async fn usage(
        &self,
        meter_ids: &[i64],
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<meter_daily_usage::Model>, FeedError> {
        meter_daily_usage::Entity::find()
            .filter(meter_daily_usage::Column::MeterId.is_in(meter_ids.iter().copied()))
            .filter(meter_daily_usage::Column::UsageDate.between(from, to))
            .order_by_asc(meter_daily_usage::Column::MeterId)
            .order_by_asc(meter_daily_usage::Column::UsageDate)
            .all(&self.db)
            .await
            .map_err(feed_err)
    }
}

impl PriceFeed for MeterFeedRepository {
    /// Price in effect on `on`: the latest row with `effective_from <= on`.
    async fn unit_price(&self, meter_id: MeterId, on: NaiveDate) -> Result<Option<Decimal>, FeedError> {
        let row = meter_prices::Entity::find()
            .filter(meter_prices::Column::MeterId.eq(meter_id.into_inner()))
            .filter(meter_prices::Column::EffectiveFrom.lte(on))
            .order_by_desc(meter_prices::Column::EffectiveFrom)
            .one(&self.db)
            .await
            .map_err(feed_err)?;
        Ok(row.map(|r| r.unit_price))
    }

    async fn historical_consumption(
        &self,
        meter_id: MeterId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<DailyConsumption>, FeedError> {
        let rows = self.usage(&[meter_id.into_inner()], from, to).await?;
        Ok(rows
            .into_iter()
            .map(|r| DailyConsumption {
                meter_id,
                date: r.usage_date,
                kwh: r.consumption_kwh,
            })
            .collect())
    }
}

impl BillingFeed for MeterFeedRepository {
    async fn actual_costs(
        &self,
        meter_ids: &[MeterId],
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<ActualCost>, FeedError> {
        if meter_ids.is_empty() {
            return Ok(Vec::new());
        }
        let keys: Vec<i64> = meter_ids.iter().map(|m| m.into_inner()).collect();
        let rows = self.usage(&keys, from, to).await?;
        Ok(rows
            .into_iter()
            .map(|r| ActualCost {
                meter_id: MeterId(r.meter_id),
                date: r.usage_date,
                cost: r.cost,
                consumption_kwh: r.consumption_kwh,
            })
            .collect())
    }
}

fn feed_err(e: DbErr) -> FeedError {
    FeedError::Unavailable(e.to_string())
}
