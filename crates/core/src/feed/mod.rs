//! External price, consumption and billing feeds.

pub mod resilient;
pub mod types;

pub use resilient::{FeedPolicy, ResilientFeed};
pub use types::{ActualCost, BillingFeed, DailyConsumption, FeedError, Fetched, PriceFeed};
