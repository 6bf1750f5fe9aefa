//! Data drift evaluation.
//!
//! Compares the evaluation window against a reference window that ends
//! where the evaluation window starts. Numeric features are scored with PSI
//! over equal-frequency reference bins, the prediction label distribution
//! with Jensen-Shannon divergence. Every sub-score is stability-oriented
//! (1 = no drift) and the overall score is the worst of them, so one badly
//! drifting feature cannot hide behind stable ones.

use std::collections::BTreeMap;

use tw_common::{Error, EvalKey, Result};
use tw_stats::{categorical_distribution, jensen_shannon_divergence, population_stability_index};

use crate::engines::{numeric_feature_names, window_predictions, EngineContext, EngineOutcome};
use crate::schema::{MetricDetail, PredictionRecord, TimeWindow};

/// PSI above this is conventionally "significant shift"; used only for
/// recommendations, not scoring.
const PSI_SIGNIFICANT: f64 = 0.2;

pub fn evaluate(
    ctx: &EngineContext<'_>,
    key: &EvalKey,
    window: TimeWindow,
) -> Result<EngineOutcome> {
    let current = window_predictions(ctx, key, &window)?;
    let reference_window = window.preceding(ctx.config.reference_window_secs);
    let reference = ctx.predictions.query(&key.model, &reference_window)?;
    if reference.is_empty() {
        return Err(Error::NoData {
            key: format!("{} reference window", key),
        });
    }

    let psi_cap = ctx.config.psi_cap;
    let mut detail = Vec::new();
    let mut recommendations = Vec::new();
    let mut scores: Vec<(String, f64)> = Vec::new();

    for feature in numeric_feature_names(&reference) {
        ctx.cancel.check()?;
        let ref_values = feature_values(&reference, &feature);
        let cur_values = feature_values(&current, &feature);
        let result =
            match population_stability_index(&ref_values, &cur_values, ctx.config.psi_bins) {
                Ok(result) => result,
                // A feature too thin to bin is skipped, not fatal; the
                // window-level sample checks already passed.
                Err(Error::InsufficientData { .. }) => {
                    recommendations.push(format!(
                        "feature '{}' has too few samples for drift scoring",
                        feature
                    ));
                    continue;
                }
                Err(e) => return Err(e),
            };
        let score = 1.0 - (result.psi / psi_cap).min(1.0);
        detail.push(
            MetricDetail::new(format!("psi:{}", feature), result.psi)
                .with_threshold(psi_cap)
                .with_breakdown(&result),
        );
        if result.psi > PSI_SIGNIFICANT {
            recommendations.push(format!(
                "significant distribution shift in '{}' (PSI {:.3}); compare against the reference period before retraining",
                feature, result.psi
            ));
        }
        scores.push((feature, score));
    }

    if let Some(label_score) = label_distribution_score(&reference, &current) {
        detail.push(MetricDetail::new(
            "prediction_distribution_js",
            1.0 - label_score,
        ));
        scores.push(("prediction_distribution".to_string(), label_score));
    }

    if scores.is_empty() {
        return Err(Error::Computation(format!(
            "no scorable features for drift on {}",
            key
        )));
    }

    scores.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
    let overall_score = scores[0].1.clamp(0.0, 1.0);
    let top_drifting: Vec<&str> = scores
        .iter()
        .take(3)
        .filter(|(_, s)| *s < 1.0)
        .map(|(f, _)| f.as_str())
        .collect();
    if !top_drifting.is_empty() {
        detail.push(
            MetricDetail::new("overall_score", overall_score).with_breakdown(&top_drifting),
        );
    }

    Ok(EngineOutcome {
        overall_score,
        detail,
        recommendations,
        sample_size: current.len(),
    })
}

fn feature_values(records: &[PredictionRecord], feature: &str) -> Vec<f64> {
    records
        .iter()
        .filter_map(|r| r.features.get(feature).and_then(|v| v.as_number()))
        .collect()
}

/// Stability of the predicted label distribution: `1 − JS/ln 2`, or `None`
/// when a window carries no labels.
fn label_distribution_score(
    reference: &[PredictionRecord],
    current: &[PredictionRecord],
) -> Option<f64> {
    let ref_labels: Vec<String> = reference.iter().map(|r| r.prediction.clone()).collect();
    let cur_labels: Vec<String> = current.iter().map(|r| r.prediction.clone()).collect();
    if ref_labels.is_empty() || cur_labels.is_empty() {
        return None;
    }
    let ref_dist: BTreeMap<String, f64> = categorical_distribution(&ref_labels);
    let cur_dist: BTreeMap<String, f64> = categorical_distribution(&cur_labels);
    let js = jensen_shannon_divergence(&ref_dist, &cur_dist);
    let normalized = (js / std::f64::consts::LN_2).clamp(0.0, 1.0);
    Some(1.0 - normalized)
}
