//! Currency rounding that never loses or invents a unit.
//!
//! Amounts are split with the Largest Remainder Method:
//! 1. Compute exact shares
//! 2. Truncate each share to the currency scale
//! 3. Hand the leftover units, one each, to the shares with the largest
//!    truncated fraction; ties go to the earlier share

use rust_decimal::prelude::*;

/// Truncates an amount toward zero at the given scale.
#[must_use]
pub fn truncate(amount: Decimal, scale: u32) -> Decimal {
    amount.round_dp_with_strategy(scale, RoundingStrategy::ToZero)
}

/// Splits `total` by `weights` so the parts sum exactly to `total` at `scale`.
///
/// Weights need not sum to one; each part is proportional to its weight over
/// the weight sum. A zero weight sum yields all-zero parts.
#[must_use]
pub fn allocate_by_weights(total: Decimal, weights: &[Decimal], scale: u32) -> Vec<Decimal> {
    if weights.is_empty() {
        return vec![];
    }

    let total = truncate(total, scale);
    let weight_sum: Decimal = weights.iter().copied().sum();
    if weight_sum.is_zero() {
        return vec![Decimal::ZERO; weights.len()];
    }

    let unit = Decimal::new(1, scale);
    let exact: Vec<Decimal> = weights.iter().map(|w| total * *w / weight_sum).collect();
    let mut parts: Vec<Decimal> = exact.iter().map(|a| truncate(*a, scale)).collect();

    let distributed: Decimal = parts.iter().copied().sum();
    let leftover_units = ((total - distributed) / unit)
        .trunc()
        .to_usize()
        .unwrap_or(0);

    if leftover_units == 0 {
        return parts;
    }

    let mut fractions: Vec<(usize, Decimal)> = exact
        .iter()
        .zip(parts.iter())
        .enumerate()
        .map(|(i, (e, p))| (i, *e - *p))
        .collect();

    // Stable sort keeps earlier shares ahead on equal fractions.
    fractions.sort_by(|a, b| b.1.cmp(&a.1));

    for (idx, _) in fractions.iter().cycle().take(leftover_units) {
        parts[*idx] += unit;
    }

    parts
}
