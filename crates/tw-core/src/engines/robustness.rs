//! Robustness evaluation.
//!
//! Perturbs the window's numeric feature vectors with seeded noise and
//! measures how much the scoring output moves. The pipeline has no access
//! to the deployed model, so scoring goes through the [`ModelScorer`] trait:
//! deployments that can call the model inject their own scorer, and the
//! default [`ProxyScorer`] approximates the model's confidence surface from
//! the window itself by nearest-neighbor lookup.
//!
//! The overall score is the mean agreement across configured noise levels.
//! Confidence stability (1 − stddev of reported confidences) is kept as a
//! sub-metric.

use tw_common::{Error, EvalKey, Result};
use tw_stats::{confidence_stability, noise_sensitivity};

use crate::engines::{window_predictions, EngineContext, EngineOutcome};
use crate::schema::{MetricDetail, PredictionRecord, TimeWindow};

/// Maps a numeric feature vector to a score in [0, 1].
pub trait ModelScorer: Send + Sync {
    fn score(&self, features: &[f64]) -> f64;
}

/// Nearest-neighbor confidence proxy built from the window's own records.
///
/// Each dimension is scaled by its observed spread before distance is
/// computed, so a large-magnitude feature cannot dominate the lookup.
pub struct ProxyScorer {
    samples: Vec<Vec<f64>>,
    confidences: Vec<f64>,
    scales: Vec<f64>,
}

impl ProxyScorer {
    /// Build from parallel (feature vector, confidence) observations.
    pub fn from_observations(samples: Vec<Vec<f64>>, confidences: Vec<f64>) -> Result<Self> {
        if samples.is_empty() || samples.len() != confidences.len() {
            return Err(Error::Computation(
                "proxy scorer needs matching samples and confidences".to_string(),
            ));
        }
        let width = samples[0].len();
        let mut scales = vec![1.0; width];
        for (i, scale) in scales.iter_mut().enumerate() {
            let mut min = f64::INFINITY;
            let mut max = f64::NEG_INFINITY;
            for s in &samples {
                min = min.min(s[i]);
                max = max.max(s[i]);
            }
            if max > min {
                *scale = max - min;
            }
        }
        Ok(ProxyScorer {
            samples,
            confidences,
            scales,
        })
    }
}

impl ModelScorer for ProxyScorer {
    fn score(&self, features: &[f64]) -> f64 {
        let mut best = 0usize;
        let mut best_dist = f64::INFINITY;
        for (i, sample) in self.samples.iter().enumerate() {
            let dist: f64 = sample
                .iter()
                .zip(features.iter())
                .zip(self.scales.iter())
                .map(|((a, b), s)| ((a - b) / s).powi(2))
                .sum();
            if dist < best_dist {
                best_dist = dist;
                best = i;
            }
        }
        self.confidences[best].clamp(0.0, 1.0)
    }
}

pub fn evaluate(
    ctx: &EngineContext<'_>,
    key: &EvalKey,
    window: TimeWindow,
) -> Result<EngineOutcome> {
    let predictions = window_predictions(ctx, key, &window)?;
    let (features, samples, confidences) = feature_matrix(&predictions);
    if features.is_empty() {
        return Err(Error::Computation(format!(
            "no numeric features shared across the window for {}",
            key
        )));
    }
    ctx.cancel.check()?;

    let proxy;
    let scorer: &dyn ModelScorer = match ctx.scorer {
        Some(scorer) => scorer,
        None => {
            proxy = ProxyScorer::from_observations(samples.clone(), confidences.clone())?;
            &proxy
        }
    };

    let curve = noise_sensitivity(
        |sample| scorer.score(sample),
        &samples,
        &ctx.config.noise_levels,
        ctx.config.noise_seed,
    )?;

    let mut detail: Vec<MetricDetail> = curve
        .points
        .iter()
        .map(|p| MetricDetail::new(format!("noise_agreement:{}", p.noise_level), p.agreement))
        .collect();

    let stability = confidence_stability(&confidences);
    detail.push(MetricDetail::new("confidence_stability", stability));

    let mut recommendations = Vec::new();
    if curve.aggregate < 0.7 {
        recommendations.push(format!(
            "output moves sharply under small input noise (agreement {:.2}); consider input smoothing or adversarial training",
            curve.aggregate
        ));
    }
    if stability < 0.5 {
        recommendations.push(
            "reported confidences vary widely across the window; calibrate the confidence output"
                .to_string(),
        );
    }

    Ok(EngineOutcome {
        overall_score: curve.aggregate.clamp(0.0, 1.0),
        detail,
        recommendations,
        sample_size: curve.samples_n,
    })
}

/// Feature vectors over the numeric features present in every record, plus
/// the confidence per record (default 1.0 when unreported).
fn feature_matrix(
    predictions: &[PredictionRecord],
) -> (Vec<String>, Vec<Vec<f64>>, Vec<f64>) {
    let mut features: Vec<String> = predictions
        .first()
        .map(|p| {
            p.features
                .iter()
                .filter(|(_, v)| v.as_number().is_some())
                .map(|(k, _)| k.clone())
                .collect()
        })
        .unwrap_or_default();
    features.retain(|f| {
        predictions
            .iter()
            .all(|p| p.features.get(f).and_then(|v| v.as_number()).is_some())
    });
    features.sort();

    if features.is_empty() {
        return (features, Vec::new(), Vec::new());
    }
    let samples: Vec<Vec<f64>> = predictions
        .iter()
        .map(|p| {
            features
                .iter()
                .map(|f| {
                    p.features
                        .get(f)
                        .and_then(|v| v.as_number())
                        .unwrap_or(0.0)
                })
                .collect()
        })
        .collect();
    let confidences: Vec<f64> = predictions
        .iter()
        .map(|p| p.confidence.unwrap_or(1.0))
        .collect();
    (features, samples, confidences)
}
