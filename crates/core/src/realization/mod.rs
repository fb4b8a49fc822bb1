//! Realized spend against committed budgets.

pub mod status;
pub mod tracker;


pub use status::{assess, realization_percentage, realization_ratio, realized_month};
pub use tracker::RealizationTracker;
