//! Budget domain types, errors and engine configuration.

pub mod config;
pub mod error;
pub mod types;

pub use config::{EngineConfig, StatusThresholds};
pub use error::BudgetError;
pub use types::{
    AnnualBudget, BudgetDraft, BudgetPreviewResponse, BudgetStatus, BudgetSummaryItem,
    CalculationDetails, MeterAllocation, MeterAllocationPreview, MeterRealization,
    MeterWeightInput, MonthlyBudgetAllocation, PrepareNextPeriodBudget, RealizationReport,
    WeightSource,
};
