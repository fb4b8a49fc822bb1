//! Price, consumption and billing feed interfaces.

use std::future::Future;

use chrono::NaiveDate;
use enerbudget_shared::types::MeterId;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Feed call failures.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FeedError {
    /// The call did not finish within its timeout.
    #[error("Feed call timed out after {0} ms")]
    Timeout(u64),

    /// The feed reported an error.
    #[error("Feed unavailable: {0}")]
    Unavailable(String),
}

/// One day of metered consumption.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyConsumption {
    /// Meter ID.
    pub meter_id: MeterId,
    /// Day measured.
    pub date: NaiveDate,
    /// Consumption in kWh.
    pub kwh: Decimal,
}

/// Billed cost and consumption for one meter and day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActualCost {
    /// Meter ID.
    pub meter_id: MeterId,
    /// Day billed.
    pub date: NaiveDate,
    /// Billed cost.
    pub cost: Decimal,
    /// Billed consumption in kWh.
    pub consumption_kwh: Decimal,
}

/// Source of unit prices and historical consumption.
pub trait PriceFeed: Send + Sync {
    /// Unit price in effect for the meter on the given day, if a price scheme applies.
    fn unit_price(
        &self,
        meter_id: MeterId,
        on: NaiveDate,
    ) -> impl Future<Output = Result<Option<Decimal>, FeedError>> + Send;

    /// Daily consumption of a meter between `from` and `to`, both included.
    fn historical_consumption(
        &self,
        meter_id: MeterId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> impl Future<Output = Result<Vec<DailyConsumption>, FeedError>> + Send;
}

/// Source of billed actuals.
pub trait BillingFeed: Send + Sync {
    /// Billed cost per meter per day between `from` and `to`, both included.
    fn actual_costs(
        &self,
        meter_ids: &[MeterId],
        from: NaiveDate,
        to: NaiveDate,
    ) -> impl Future<Output = Result<Vec<ActualCost>, FeedError>> + Send;
}

/// Outcome of a feed call made through [`super::ResilientFeed`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fetched<T> {
    /// Value from a successful call.
    Fresh(T),
    /// Last known good value, served after the feed failed.
    Stale(T),
    /// Feed failed and nothing was cached.
    Unavailable,
}

impl<T> Fetched<T> {
    /// Returns the value, fresh or stale.
    pub fn into_option(self) -> Option<T> {
        match self {
            Self::Fresh(v) | Self::Stale(v) => Some(v),
            Self::Unavailable => None,
        }
    }

    /// Returns true unless the value came from a successful call.
    #[must_use]
    pub const fn is_degraded(&self) -> bool {
        !matches!(self, Self::Fresh(_))
    }
}
