//! Explainability evaluation.
//!
//! A model whose explanation for its own behavior keeps changing is not
//! explainable in any useful sense. This engine splits the evaluation
//! window into successive snapshots, derives a feature-importance ranking
//! for each, and scores how consistent those rankings are over time.
//!
//! Importance is a correlation proxy: |Pearson correlation| between each
//! numeric feature and the positive-prediction indicator. It needs no model
//! access and is deterministic, which is what the pipeline requires; a
//! deployment with real attribution scores can feed them in upstream as
//! features.

use std::collections::BTreeMap;

use tw_common::{Error, EvalKey, Result};
use tw_stats::attribution_consistency;

use crate::engines::{numeric_feature_names, window_predictions, EngineContext, EngineOutcome};
use crate::schema::{MetricDetail, PredictionRecord, TimeWindow};

pub fn evaluate(
    ctx: &EngineContext<'_>,
    key: &EvalKey,
    window: TimeWindow,
) -> Result<EngineOutcome> {
    let predictions = window_predictions(ctx, key, &window)?;
    let info = ctx.registry.model_info(&key.model)?;
    let features = numeric_feature_names(&predictions);
    if features.is_empty() {
        return Err(Error::Computation(format!(
            "no numeric features to attribute for {}",
            key
        )));
    }

    let snapshots =
        importance_snapshots(ctx, &predictions, &window, &features, &info.positive_label)?;
    if snapshots.len() < 2 {
        return Err(Error::InsufficientData {
            needed: 2,
            got: snapshots.len(),
        });
    }

    let consistency = attribution_consistency(&snapshots)?;

    let latest = &snapshots[snapshots.len() - 1];
    let covered = latest.values().filter(|v| **v > 0.0).count();
    let coverage = covered as f64 / features.len() as f64;

    let detail = vec![
        MetricDetail::new("attribution_consistency", consistency.consistency)
            .with_breakdown(&consistency.pairwise),
        MetricDetail::new("feature_coverage", coverage).with_breakdown(latest),
    ];

    let mut recommendations = Vec::new();
    if consistency.consistency < 0.7 {
        recommendations.push(format!(
            "feature importance rankings shifted across the window (consistency {:.2}); inspect recent data changes before trusting explanations",
            consistency.consistency
        ));
    }
    if coverage < 0.5 {
        recommendations.push(
            "more than half of the numeric features show no attributable signal; prune unused inputs or revisit the feature set"
                .to_string(),
        );
    }

    Ok(EngineOutcome {
        overall_score: consistency.consistency.clamp(0.0, 1.0),
        detail,
        recommendations,
        sample_size: predictions.len(),
    })
}

/// Split the window into the configured number of sub-windows and build one
/// importance map per sub-window that holds enough records to correlate.
fn importance_snapshots(
    ctx: &EngineContext<'_>,
    predictions: &[PredictionRecord],
    window: &TimeWindow,
    features: &[String],
    positive_label: &str,
) -> Result<Vec<BTreeMap<String, f64>>> {
    let parts = ctx.config.attribution_snapshots;
    let span = (window.end - window.start).num_seconds().max(1);
    let mut snapshots = Vec::new();
    for part in 0..parts {
        ctx.cancel.check()?;
        let start = window.start + chrono::Duration::seconds(span * part as i64 / parts as i64);
        let end =
            window.start + chrono::Duration::seconds(span * (part as i64 + 1) / parts as i64);
        let slice: Vec<&PredictionRecord> = predictions
            .iter()
            .filter(|p| p.timestamp >= start && p.timestamp < end)
            .collect();
        if slice.len() < 2 {
            continue;
        }
        snapshots.push(importance_map(
            &slice,
            features,
            positive_label,
            ctx.config.attribution_top_n,
        ));
    }
    Ok(snapshots)
}

/// |Pearson correlation| of each feature against the positive-prediction
/// indicator, truncated to the top-N features by importance.
fn importance_map(
    records: &[&PredictionRecord],
    features: &[String],
    positive_label: &str,
    top_n: usize,
) -> BTreeMap<String, f64> {
    let indicator: Vec<f64> = records
        .iter()
        .map(|p| if p.prediction == positive_label { 1.0 } else { 0.0 })
        .collect();

    let mut scored: Vec<(String, f64)> = features
        .iter()
        .map(|feature| {
            let values: Vec<f64> = records
                .iter()
                .map(|p| {
                    p.features
                        .get(feature)
                        .and_then(|v| v.as_number())
                        .unwrap_or(0.0)
                })
                .collect();
            (feature.clone(), pearson(&values, &indicator).abs())
        })
        .collect();
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(top_n);
    scored.into_iter().collect()
}

/// Pearson correlation, 0.0 when either side is constant.
fn pearson(a: &[f64], b: &[f64]) -> f64 {
    let n = a.len() as f64;
    if n < 2.0 {
        return 0.0;
    }
    let mean_a = a.iter().sum::<f64>() / n;
    let mean_b = b.iter().sum::<f64>() / n;
    let mut cov = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    for (x, y) in a.iter().zip(b.iter()) {
        let dx = x - mean_a;
        let dy = y - mean_b;
        cov += dx * dy;
        var_a += dx * dx;
        var_b += dy * dy;
    }
    if var_a == 0.0 || var_b == 0.0 {
        return 0.0;
    }
    cov / (var_a.sqrt() * var_b.sqrt())
}
