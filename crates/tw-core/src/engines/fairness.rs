//! Fairness evaluation.
//!
//! Groups the window's predictions by each protected attribute from the
//! registry and scores three sub-metrics per attribute:
//!
//! - demographic parity: `1 − (max rate − min rate)`
//! - equal opportunity: the same difference restricted to true positives
//! - disparate impact: min-rate / max-rate (the four-fifths-rule ratio)
//!
//! Sub-metrics are averaged across attributes, then combined per the
//! configured policy (worst-case min by default). Equal opportunity is
//! skipped when ground truth is too sparse to support it; the other two
//! propagate their data errors and fail the run.

use tw_common::{Error, EvalKey, Result};
use tw_config::FairnessCombine;
use tw_stats::{demographic_parity, equal_opportunity, GroupOutcome};

use crate::engines::{window_predictions, EngineContext, EngineOutcome};
use crate::schema::{MetricDetail, PredictionRecord, TimeWindow};

/// Disparate-impact ratio below which the four-fifths rule is violated.
const FOUR_FIFTHS: f64 = 0.8;

pub fn evaluate(
    ctx: &EngineContext<'_>,
    key: &EvalKey,
    window: TimeWindow,
) -> Result<EngineOutcome> {
    let predictions = window_predictions(ctx, key, &window)?;
    let info = ctx.registry.model_info(&key.model)?;
    if info.protected_attributes.is_empty() {
        return Err(Error::InvalidConfig(format!(
            "no protected attributes configured for {}",
            key.model
        )));
    }

    let mut detail = Vec::new();
    let mut recommendations = Vec::new();
    let mut parity_scores = Vec::new();
    let mut opportunity_scores = Vec::new();
    let mut impact_scores = Vec::new();

    for attribute in &info.protected_attributes {
        ctx.cancel.check()?;
        let outcomes = group_outcomes(&predictions, attribute, &info.positive_label);
        if outcomes.is_empty() {
            return Err(Error::NoData {
                key: format!("{} attribute {}", key, attribute),
            });
        }

        let rates = demographic_parity(attribute, &outcomes)?;
        let parity = 1.0 - rates.max_diff;
        let impact = rates.parity;
        parity_scores.push(parity);
        impact_scores.push(impact);
        detail.push(
            MetricDetail::new(format!("demographic_parity:{}", attribute), parity)
                .with_breakdown(&rates),
        );
        detail.push(
            MetricDetail::new(format!("disparate_impact:{}", attribute), impact)
                .with_threshold(FOUR_FIFTHS),
        );

        if impact < FOUR_FIFTHS {
            recommendations.push(format!(
                "disparate impact {:.2} for '{}' violates the four-fifths rule; review training data balance for this attribute",
                impact, attribute
            ));
        }
        if rates.max_diff > 0.2 {
            recommendations.push(format!(
                "positive-rate gap of {:.0}% across '{}' groups; consider group-aware thresholding",
                rates.max_diff * 100.0,
                attribute
            ));
        }

        // The true-positive subset is naturally sparse; a thin subset skips
        // the sub-metric rather than failing the whole run.
        if outcomes.iter().any(|o| o.actual_positive.is_some()) {
            match equal_opportunity(attribute, &outcomes) {
                Ok(eo) => {
                    let score = 1.0 - eo.max_diff;
                    opportunity_scores.push(score);
                    detail.push(
                        MetricDetail::new(format!("equal_opportunity:{}", attribute), score)
                            .with_breakdown(&eo),
                    );
                }
                Err(
                    Error::InsufficientData { .. } | Error::InsufficientGroupSize { .. },
                ) => {
                    recommendations.push(format!(
                        "too little ground truth to score equal opportunity for '{}'",
                        attribute
                    ));
                }
                Err(e) => return Err(e),
            }
        }
    }

    let mut sub_metrics = vec![mean(&parity_scores), mean(&impact_scores)];
    if !opportunity_scores.is_empty() {
        sub_metrics.push(mean(&opportunity_scores));
    }
    let overall_score = match ctx.config.fairness_combine {
        FairnessCombine::Min => sub_metrics.iter().cloned().fold(f64::INFINITY, f64::min),
        FairnessCombine::Mean => mean(&sub_metrics),
    }
    .clamp(0.0, 1.0);

    Ok(EngineOutcome {
        overall_score,
        detail,
        recommendations,
        sample_size: predictions.len(),
    })
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Project predictions onto (group, predicted positive, actual positive) for
/// one protected attribute. Predictions missing the attribute are skipped.
fn group_outcomes(
    predictions: &[PredictionRecord],
    attribute: &str,
    positive_label: &str,
) -> Vec<GroupOutcome> {
    predictions
        .iter()
        .filter_map(|p| {
            let value = p.features.get(attribute)?;
            Some(GroupOutcome {
                group: value.group_label(),
                predicted_positive: p.prediction == positive_label,
                actual_positive: p.true_label.as_deref().map(|l| l == positive_label),
            })
        })
        .collect()
}
