//! Realization percentages and the month rows built from them.

use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::budget::{BudgetStatus, MonthlyBudgetAllocation, StatusThresholds};

/// `cost / allocated * 100` at full precision, or `None` for a zero
/// allocation or a ratio beyond the decimal range.
#[must_use]
pub fn realization_ratio(cost: Decimal, allocated: Decimal) -> Option<Decimal> {
    cost.checked_div(allocated)?.checked_mul(Decimal::ONE_HUNDRED)
}

/// [`realization_ratio`] rounded to two decimals for reporting.
#[must_use]
pub fn realization_percentage(cost: Decimal, allocated: Decimal) -> Option<Decimal> {
    realization_ratio(cost, allocated).map(|p| p.round_dp(2))
}

/// Reported percentage and status for a realized cost.
///
/// The status is classified on the unrounded ratio, so spend just under a
/// threshold never crosses it through rounding.
#[must_use]
pub fn assess(
    cost: Decimal,
    allocated: Decimal,
    thresholds: &StatusThresholds,
) -> (Option<Decimal>, BudgetStatus) {
    let ratio = realization_ratio(cost, allocated);
    (ratio.map(|p| p.round_dp(2)), thresholds.classify(ratio, cost))
}

/// Builds a month row from its allocation and realized cost.
#[must_use]
pub fn realized_month(
    month: NaiveDate,
    allocated_budget: Decimal,
    realization_cost: Decimal,
    thresholds: &StatusThresholds,
) -> MonthlyBudgetAllocation {
    let (realization_percentage, status) = assess(realization_cost, allocated_budget, thresholds);
    MonthlyBudgetAllocation {
        month,
        allocated_budget,
        realization_cost,
        remaining_budget: allocated_budget - realization_cost,
        realization_percentage,
        status,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use rust_decimal_macros::dec;

    #[test]
    fn test_percentage_rounds_to_two_places() {
        assert_eq!(realization_percentage(dec!(1), dec!(3)), Some(dec!(33.33)));
        assert_eq!(realization_percentage(dec!(2), dec!(3)), Some(dec!(66.67)));
        assert_eq!(realization_percentage(dec!(150), dec!(100)), Some(dec!(150)));
        assert_eq!(realization_percentage(dec!(5), dec!(0)), None);
    }

    #[test]
    fn test_realized_month_fields() {
        let month = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let row = realized_month(month, dec!(1000), dec!(850), &StatusThresholds::default());

        assert_eq!(row.remaining_budget, dec!(150));
        assert_eq!(row.realization_percentage, Some(dec!(85)));
        assert_eq!(row.status, BudgetStatus::Warning);

        let overspent = realized_month(month, dec!(0), dec!(10), &StatusThresholds::default());
        assert_eq!(overspent.remaining_budget, dec!(-10));
        assert_eq!(overspent.status, BudgetStatus::Danger);
    }

    #[rstest]
    #[case(dec!(99999.50), dec!(100.00), BudgetStatus::Warning)]
    #[case(dec!(100000), dec!(100), BudgetStatus::Danger)]
    #[case(dec!(79995.00), dec!(80.00), BudgetStatus::Safe)]
    #[case(dec!(80000), dec!(80), BudgetStatus::Warning)]
    fn test_status_uses_unrounded_ratio(
        #[case] cost: Decimal,
        #[case] reported: Decimal,
        #[case] expected: BudgetStatus,
    ) {
        let month = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let row = realized_month(month, dec!(100000), cost, &StatusThresholds::default());

        assert_eq!(row.realization_percentage, Some(reported));
        assert_eq!(row.status, expected);
    }

    #[test]
    fn test_ratio_beyond_decimal_range_is_danger() {
        let (percentage, status) = assess(
            Decimal::MAX,
            dec!(0.01),
            &StatusThresholds::default(),
        );
        assert!(percentage.is_none());
        assert_eq!(status, BudgetStatus::Danger);
    }
}
