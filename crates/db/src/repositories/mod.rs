//! Repository implementations of the core store and feed traits.
//!
//! Repositories hide the `SeaORM` details from the rest of the application;
//! callers only see `BudgetStore`, `PriceFeed` and `BillingFeed`.

pub mod budget;
pub mod meter_feed;

pub use budget::BudgetRepository;
pub use meter_feed::MeterFeedRepository;
