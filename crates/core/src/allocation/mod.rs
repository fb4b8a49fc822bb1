//! Turning a budget draft into monthly and per-meter allocations.

pub mod engine;
pub mod monthly;
pub mod rounding;
pub mod weights;


pub use engine::{AllocationContext, AllocationEngine, ParentSnapshot};
pub use monthly::split_by_days;
pub use rounding::{allocate_by_weights, truncate};
pub use weights::{MeterProfile, ResolvedWeight};
