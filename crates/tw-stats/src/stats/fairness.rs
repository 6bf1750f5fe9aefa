//! Group-conditioned fairness metrics.
//!
//! Each metric compares positive-outcome rates across the groups of one
//! protected attribute. Rates are keyed by group value in a BTreeMap so
//! results are stable regardless of input order. The parity score is the
//! min-rate/max-rate ratio in [0, 1]; 1 means perfectly equal rates.

use std::collections::BTreeMap;

use serde::Serialize;
use tw_common::{Error, Result};

use crate::MIN_GROUP_SIZE;

/// A single observation for fairness analysis: the group a prediction's
/// protected attribute falls into, the predicted outcome, and (when ground
/// truth exists) the actual outcome.
#[derive(Debug, Clone)]
pub struct GroupOutcome {
    pub group: String,
    pub predicted_positive: bool,
    pub actual_positive: Option<bool>,
}

/// Per-group positive rates plus the parity summary.
#[derive(Debug, Clone, Serialize)]
pub struct GroupRates {
    /// Positive-outcome rate per group.
    pub rates: BTreeMap<String, f64>,
    /// min-rate / max-rate, in [0, 1].
    pub parity: f64,
    /// max-rate − min-rate, in [0, 1].
    pub max_diff: f64,
}

/// Demographic parity: positive-prediction rate per group.
///
/// Fails with `InsufficientGroupSize` if any group has fewer than
/// [`MIN_GROUP_SIZE`] observations, and with `InsufficientData` if fewer
/// than two groups are present.
pub fn demographic_parity(attribute: &str, outcomes: &[GroupOutcome]) -> Result<GroupRates> {
    let mut tallies: BTreeMap<String, (usize, usize)> = BTreeMap::new();
    for o in outcomes {
        let entry = tallies.entry(o.group.clone()).or_insert((0, 0));
        entry.0 += 1;
        if o.predicted_positive {
            entry.1 += 1;
        }
    }
    rates_from_tallies(attribute, tallies)
}

/// Equal opportunity: positive-prediction rate per group, restricted to the
/// observations whose true label is positive (the true-positive-eligible
/// subset). Observations without ground truth are skipped.
pub fn equal_opportunity(attribute: &str, outcomes: &[GroupOutcome]) -> Result<GroupRates> {
    let mut tallies: BTreeMap<String, (usize, usize)> = BTreeMap::new();
    for o in outcomes {
        if o.actual_positive != Some(true) {
            continue;
        }
        let entry = tallies.entry(o.group.clone()).or_insert((0, 0));
        entry.0 += 1;
        if o.predicted_positive {
            entry.1 += 1;
        }
    }
    rates_from_tallies(attribute, tallies)
}

/// Disparate impact: the min/max ratio of positive-prediction rates, the
/// four-fifths-rule statistic. 1.0 = no disparity.
pub fn disparate_impact(attribute: &str, outcomes: &[GroupOutcome]) -> Result<f64> {
    Ok(demographic_parity(attribute, outcomes)?.parity)
}

fn rates_from_tallies(
    attribute: &str,
    tallies: BTreeMap<String, (usize, usize)>,
) -> Result<GroupRates> {
    if tallies.len() < 2 {
        return Err(Error::InsufficientData {
            needed: 2,
            got: tallies.len(),
        });
    }
    for (group, (total, _)) in &tallies {
        if *total < MIN_GROUP_SIZE {
            return Err(Error::InsufficientGroupSize {
                attribute: attribute.to_string(),
                group: group.clone(),
                needed: MIN_GROUP_SIZE,
                got: *total,
            });
        }
    }

    let rates: BTreeMap<String, f64> = tallies
        .into_iter()
        .map(|(group, (total, positive))| (group, positive as f64 / total as f64))
        .collect();

    let min = rates.values().cloned().fold(f64::INFINITY, f64::min);
    let max = rates.values().cloned().fold(0.0_f64, f64::max);
    let parity = if max > 0.0 { (min / max).clamp(0.0, 1.0) } else { 1.0 };

    Ok(GroupRates {
        rates,
        parity,
        max_diff: (max - min).clamp(0.0, 1.0),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcomes(spec: &[(&str, usize, usize)]) -> Vec<GroupOutcome> {
        // (group, positives, negatives); ground truth mirrors prediction.
        let mut out = Vec::new();
        for (group, pos, neg) in spec {
            for _ in 0..*pos {
                out.push(GroupOutcome {
                    group: group.to_string(),
                    predicted_positive: true,
                    actual_positive: Some(true),
                });
            }
            for _ in 0..*neg {
                out.push(GroupOutcome {
                    group: group.to_string(),
                    predicted_positive: false,
                    actual_positive: Some(false),
                });
            }
        }
        out
    }

    #[test]
    fn equal_rates_give_full_parity() {
        let data = outcomes(&[("a", 30, 30), ("b", 15, 15)]);
        let result = demographic_parity("gender", &data).unwrap();
        assert!((result.parity - 1.0).abs() < 1e-12);
        assert!(result.max_diff.abs() < 1e-12);
    }

    #[test]
    fn skewed_rates_reduce_parity() {
        let data = outcomes(&[("a", 40, 10), ("b", 10, 40)]);
        let result = demographic_parity("gender", &data).unwrap();
        assert!((result.rates["a"] - 0.8).abs() < 1e-12);
        assert!((result.rates["b"] - 0.2).abs() < 1e-12);
        assert!((result.parity - 0.25).abs() < 1e-12);
    }

    #[test]
    fn small_group_is_rejected() {
        let data = outcomes(&[("a", 30, 30), ("b", 2, 3)]);
        let err = demographic_parity("gender", &data).unwrap_err();
        assert!(matches!(err, Error::InsufficientGroupSize { got: 5, .. }));
    }

    #[test]
    fn single_group_is_rejected() {
        let data = outcomes(&[("a", 30, 30)]);
        assert!(demographic_parity("gender", &data).is_err());
    }

    #[test]
    fn equal_opportunity_conditions_on_true_positives() {
        // Group a: 20 true positives, all predicted positive.
        // Group b: 20 true positives, half predicted positive.
        let mut data = Vec::new();
        for _ in 0..20 {
            data.push(GroupOutcome {
                group: "a".to_string(),
                predicted_positive: true,
                actual_positive: Some(true),
            });
        }
        for i in 0..20 {
            data.push(GroupOutcome {
                group: "b".to_string(),
                predicted_positive: i % 2 == 0,
                actual_positive: Some(true),
            });
        }
        // True negatives should not influence the metric.
        for _ in 0..50 {
            data.push(GroupOutcome {
                group: "b".to_string(),
                predicted_positive: false,
                actual_positive: Some(false),
            });
        }
        let result = equal_opportunity("region", &data).unwrap();
        assert!((result.rates["a"] - 1.0).abs() < 1e-12);
        assert!((result.rates["b"] - 0.5).abs() < 1e-12);
        assert!((result.parity - 0.5).abs() < 1e-12);
    }

    #[test]
    fn disparate_impact_matches_parity_ratio() {
        let data = outcomes(&[("a", 40, 10), ("b", 20, 30)]);
        let di = disparate_impact("age_band", &data).unwrap();
        assert!((di - 0.5).abs() < 1e-12);
    }
}
