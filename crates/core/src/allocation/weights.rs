//! Meter weight resolution.

use std::collections::BTreeSet;

use enerbudget_shared::types::MeterId;
use rust_decimal::Decimal;

use crate::budget::{BudgetError, MeterWeightInput, WeightSource};

/// What the engine knows about a meter when a draft is evaluated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeterProfile {
    /// Meter ID.
    pub meter_id: MeterId,
    /// Unit price on the first day of the draft period.
    pub unit_price: Option<Decimal>,
    /// Average daily kWh over the lookback window, if any history exists.
    pub average_daily_kwh: Option<Decimal>,
}

/// A normalized weight for one meter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedWeight {
    /// Meter ID.
    pub meter_id: MeterId,
    /// Weight; all resolved weights of a draft sum to one.
    pub weight: Decimal,
    /// Where the weight came from.
    pub source: WeightSource,
}

/// Validates explicit weights and renormalizes them if they do not sum to one.
///
/// # Errors
///
/// - `WeightMismatch` for a negative weight, an all-zero set or weights
///   whose sum overflows
/// - `DuplicateMeter` if a meter is listed twice
/// - `MeterNotFound` if a meter is not in `known`
pub fn normalize_explicit(
    inputs: &[MeterWeightInput],
    known: &[MeterId],
    epsilon: Decimal,
) -> Result<Vec<ResolvedWeight>, BudgetError> {
    let mut seen = BTreeSet::new();
    for input in inputs {
        if input.weight < Decimal::ZERO {
            return Err(BudgetError::WeightMismatch(format!(
                "weight for meter {} is negative: {}",
                input.meter_id, input.weight
            )));
        }
        if !seen.insert(input.meter_id) {
            return Err(BudgetError::DuplicateMeter(input.meter_id));
        }
        if !known.contains(&input.meter_id) {
            return Err(BudgetError::MeterNotFound(input.meter_id));
        }
    }

    let sum = checked_sum(inputs.iter().map(|i| i.weight)).ok_or_else(|| {
        BudgetError::WeightMismatch("weights are too large to sum".to_string())
    })?;
    if sum.is_zero() {
        return Err(BudgetError::WeightMismatch(
            "at least one weight must be positive".to_string(),
        ));
    }

    let renormalize = (sum - Decimal::ONE).abs() > epsilon;
    let mut weights: Vec<ResolvedWeight> = inputs
        .iter()
        .map(|i| ResolvedWeight {
            meter_id: i.meter_id,
            weight: if renormalize { i.weight / sum } else { i.weight },
            source: WeightSource::Explicit,
        })
        .collect();
    weights.sort_by_key(|w| w.meter_id);
    Ok(weights)
}

/// Derives weights from average historical consumption.
///
/// Meters without history are imputed the mean of those with history. If no
/// meter has usable history every meter gets an equal share.
#[must_use]
pub fn derive_from_history(meters: &[MeterProfile]) -> Vec<ResolvedWeight> {
    let mut ordered: Vec<&MeterProfile> = meters.iter().collect();
    ordered.sort_by_key(|m| m.meter_id);

    let observed: Vec<Decimal> = ordered
        .iter()
        .filter_map(|m| m.average_daily_kwh)
        .collect();
    let Some(observed_sum) = checked_sum(observed.iter().copied()) else {
        return equal_split(&ordered);
    };

    if observed.is_empty() || observed_sum <= Decimal::ZERO {
        return equal_split(&ordered);
    }

    let mean = observed_sum / Decimal::from(observed.len());
    let basis: Vec<Decimal> = ordered
        .iter()
        .map(|m| m.average_daily_kwh.unwrap_or(mean))
        .collect();
    let Some(basis_sum) = checked_sum(basis.iter().copied()) else {
        return equal_split(&ordered);
    };

    ordered
        .iter()
        .zip(basis)
        .map(|(m, b)| ResolvedWeight {
            meter_id: m.meter_id,
            weight: b / basis_sum,
            source: WeightSource::Historical,
        })
        .collect()
}

fn checked_sum(values: impl IntoIterator<Item = Decimal>) -> Option<Decimal> {
    values
        .into_iter()
        .try_fold(Decimal::ZERO, |acc, v| acc.checked_add(v))
}

fn equal_split(meters: &[&MeterProfile]) -> Vec<ResolvedWeight> {
    if meters.is_empty() {
        return vec![];
    }
    let share = Decimal::ONE / Decimal::from(meters.len());
    meters
        .iter()
        .map(|m| ResolvedWeight {
            meter_id: m.meter_id,
            weight: share,
            source: WeightSource::EqualSplit,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn input(meter: i64, weight: Decimal) -> MeterWeightInput {
        MeterWeightInput {
            meter_id: MeterId(meter),
            weight,
        }
    }

    fn profile(meter: i64, kwh: Option<Decimal>) -> MeterProfile {
        MeterProfile {
            meter_id: MeterId(meter),
            unit_price: None,
            average_daily_kwh: kwh,
        }
    }

    const KNOWN: [MeterId; 3] = [MeterId(1), MeterId(2), MeterId(3)];

    #[test]
    fn test_weights_summing_to_one_are_kept() {
        let weights =
            normalize_explicit(&[input(2, dec!(0.4)), input(1, dec!(0.6))], &KNOWN, dec!(0.000001))
                .unwrap();

        assert_eq!(weights[0].meter_id, MeterId(1));
        assert_eq!(weights[0].weight, dec!(0.6));
        assert_eq!(weights[1].weight, dec!(0.4));
        assert!(weights.iter().all(|w| w.source == WeightSource::Explicit));
    }

    #[test]
    fn test_weights_are_renormalized_by_their_sum() {
        let weights =
            normalize_explicit(&[input(1, dec!(3)), input(2, dec!(1))], &KNOWN, dec!(0.000001))
                .unwrap();

        assert_eq!(weights[0].weight, dec!(0.75));
        assert_eq!(weights[1].weight, dec!(0.25));
    }

    #[test]
    fn test_sum_within_epsilon_is_not_renormalized() {
        let weights = normalize_explicit(
            &[input(1, dec!(0.5)), input(2, dec!(0.5000005))],
            &KNOWN,
            dec!(0.000001),
        )
        .unwrap();
        assert_eq!(weights[1].weight, dec!(0.5000005));
    }

    #[test]
    fn test_invalid_explicit_weights() {
        let eps = dec!(0.000001);
        assert!(matches!(
            normalize_explicit(&[input(1, dec!(-0.1)), input(2, dec!(1.1))], &KNOWN, eps),
            Err(BudgetError::WeightMismatch(_))
        ));
        assert!(matches!(
            normalize_explicit(&[input(1, dec!(0)), input(2, dec!(0))], &KNOWN, eps),
            Err(BudgetError::WeightMismatch(_))
        ));
        assert!(matches!(
            normalize_explicit(&[input(1, dec!(0.5)), input(1, dec!(0.5))], &KNOWN, eps),
            Err(BudgetError::DuplicateMeter(MeterId(1)))
        ));
        assert!(matches!(
            normalize_explicit(&[input(9, dec!(1))], &KNOWN, eps),
            Err(BudgetError::MeterNotFound(MeterId(9)))
        ));
    }

    #[test]
    fn test_overflowing_weight_sum_is_rejected() {
        let huge = Decimal::MAX;
        assert!(matches!(
            normalize_explicit(&[input(1, huge), input(2, huge)], &KNOWN, dec!(0.000001)),
            Err(BudgetError::WeightMismatch(_))
        ));
    }

    #[test]
    fn test_history_weights_follow_consumption() {
        let weights = derive_from_history(&[profile(2, Some(dec!(30))), profile(1, Some(dec!(10)))]);

        assert_eq!(weights[0].meter_id, MeterId(1));
        assert_eq!(weights[0].weight, dec!(0.25));
        assert_eq!(weights[1].weight, dec!(0.75));
        assert!(weights.iter().all(|w| w.source == WeightSource::Historical));
    }

    #[test]
    fn test_missing_history_is_imputed_the_mean() {
        let weights = derive_from_history(&[
            profile(1, Some(dec!(10))),
            profile(2, Some(dec!(30))),
            profile(3, None),
        ]);

        // Meter 3 counts as 20 kWh/day: 10 + 30 + 20 = 60
        assert_eq!(weights[2].weight, dec!(20) / dec!(60));
        assert_eq!(weights[0].weight, dec!(10) / dec!(60));
    }

    #[test]
    fn test_no_history_falls_back_to_equal_split() {
        let weights = derive_from_history(&[profile(1, None), profile(2, Some(dec!(0)))]);

        assert_eq!(weights.len(), 2);
        assert!(weights.iter().all(|w| w.weight == dec!(0.5)));
        assert!(weights.iter().all(|w| w.source == WeightSource::EqualSplit));
        assert!(derive_from_history(&[]).is_empty());
    }
}
