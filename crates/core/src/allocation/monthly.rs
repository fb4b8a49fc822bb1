//! Splitting a budget across calendar months.

use rust_decimal::Decimal;

use super::rounding::truncate;
use crate::budget::MonthlyBudgetAllocation;
use crate::period::Period;

/// Allocates `total` to each calendar month of `period` in proportion to the
/// month's day count inside the period.
///
/// Every month but the last is truncated to `scale`; the last month takes
/// whatever is left, so the months sum exactly to `total`.
#[must_use]
pub fn split_by_days(total: Decimal, period: &Period, scale: u32) -> Vec<MonthlyBudgetAllocation> {
    let slices = period.month_slices();
    let total_days = Decimal::from(period.total_days());
    let mut assigned = Decimal::ZERO;
    let last = slices.len().saturating_sub(1);

    slices
        .iter()
        .enumerate()
        .map(|(i, slice)| {
            let amount = if i == last {
                total - assigned
            } else {
                truncate(total * Decimal::from(slice.days) / total_days, scale)
            };
            assigned += amount;
            MonthlyBudgetAllocation::planned(slice.month, amount)
        })
        .collect()
}
