//! Core budgeting logic for Enerbudget.
//!
//! Everything here is independent of the web and database layers. The pure
//! engines take fully resolved inputs; [`service::BudgetingService`] resolves
//! those inputs through the [`store::BudgetStore`] and feed traits.
//!
//! # Modules
//!
//! - `allocation` - Draft validation, parent limits, monthly and per-meter splits
//! - `budget` - Domain types, errors and engine configuration
//! - `feed` - Price and billing feed traits with retry and stale fallback
//! - `hierarchy` - Parent/child structure and cycle checks
//! - `period` - Date ranges and month slicing
//! - `realization` - Actual cost against plan
//! - `rollover` - Next-period proposals from a parent's unspent funds
//! - `service` - Orchestration over store and feeds
//! - `store` - Persistence trait and in-memory implementation

pub mod allocation;
pub mod budget;
pub mod feed;
pub mod hierarchy;
pub mod period;
pub mod realization;
pub mod rollover;
pub mod service;
pub mod store;

pub use budget::{BudgetError, EngineConfig};
pub use period::Period;
pub use service::BudgetingService;
