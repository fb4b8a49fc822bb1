//! Shared types, errors, and configuration for Enerbudget.
//!
//! This crate provides common types used across all other crates:
//! - Typed IDs for budgets, meters and energy types
//! - Application-wide error taxonomy
//! - Configuration management

pub mod config;
pub mod error;
pub mod types;

pub use config::{AppConfig, BudgetingConfig, FeedConfig};
pub use error::{AppError, AppResult};
