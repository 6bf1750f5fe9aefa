//! Perturbation-sensitivity scoring.
//!
//! Measures how much a model's output moves when its numeric inputs are
//! nudged. The perturbation RNG is seeded explicitly, so a given
//! (samples, noise_levels, seed) triple always produces the same curve —
//! required for evaluation reproducibility.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tw_common::{Error, Result};

use crate::MIN_SAMPLES;

/// Stability at one noise level.
#[derive(Debug, Clone, Serialize)]
pub struct SensitivityPoint {
    /// Relative perturbation magnitude applied to each feature.
    pub noise_level: f64,
    /// Mean output agreement with the unperturbed score, in [0, 1].
    pub agreement: f64,
}

/// Sensitivity curve over all configured noise levels.
#[derive(Debug, Clone, Serialize)]
pub struct SensitivityCurve {
    pub points: Vec<SensitivityPoint>,
    /// Mean agreement across levels, in [0, 1]. 1 = fully stable.
    pub aggregate: f64,
    pub samples_n: usize,
}

/// Score feature perturbation sensitivity.
///
/// `score_fn` maps a feature vector to a score in [0, 1]. For each noise
/// level, every feature is perturbed by a uniform draw in
/// `±level · scale` where `scale` is the per-feature sample spread (or the
/// absolute value for constant features), then re-scored. Agreement at a
/// level is `1 − mean(|perturbed − base|)` clamped to [0, 1].
pub fn noise_sensitivity<F>(
    score_fn: F,
    samples: &[Vec<f64>],
    noise_levels: &[f64],
    seed: u64,
) -> Result<SensitivityCurve>
where
    F: Fn(&[f64]) -> f64,
{
    if samples.len() < MIN_SAMPLES {
        return Err(Error::InsufficientData {
            needed: MIN_SAMPLES,
            got: samples.len(),
        });
    }
    if noise_levels.is_empty() {
        return Err(Error::InvalidConfig(
            "noise_levels must not be empty".to_string(),
        ));
    }
    let width = samples[0].len();
    if width == 0 || samples.iter().any(|s| s.len() != width) {
        return Err(Error::Computation(
            "robustness samples must be non-empty and uniform width".to_string(),
        ));
    }

    let scales = feature_scales(samples, width);
    let base: Vec<f64> = samples.iter().map(|s| score_fn(s)).collect();

    let mut rng = StdRng::seed_from_u64(seed);
    let mut points = Vec::with_capacity(noise_levels.len());
    for &level in noise_levels {
        let mut divergence_sum = 0.0;
        for (sample, base_score) in samples.iter().zip(base.iter()) {
            let mut perturbed = sample.clone();
            for (value, scale) in perturbed.iter_mut().zip(scales.iter()) {
                let magnitude = level * scale;
                if magnitude > 0.0 {
                    *value += rng.random_range(-magnitude..=magnitude);
                }
            }
            let new_score = score_fn(&perturbed);
            if !new_score.is_finite() {
                return Err(Error::Computation(format!(
                    "score function returned non-finite value at noise level {}",
                    level
                )));
            }
            divergence_sum += (new_score - base_score).abs();
        }
        let agreement = (1.0 - divergence_sum / samples.len() as f64).clamp(0.0, 1.0);
        points.push(SensitivityPoint {
            noise_level: level,
            agreement,
        });
    }

    let aggregate =
        points.iter().map(|p| p.agreement).sum::<f64>() / points.len() as f64;
    Ok(SensitivityCurve {
        points,
        aggregate: aggregate.clamp(0.0, 1.0),
        samples_n: samples.len(),
    })
}

/// Stability of reported confidences: `1 − stddev`, clamped to [0, 1].
pub fn confidence_stability(confidences: &[f64]) -> f64 {
    if confidences.len() < 2 {
        return 1.0;
    }
    let n = confidences.len() as f64;
    let mean = confidences.iter().sum::<f64>() / n;
    let var = confidences.iter().map(|c| (c - mean).powi(2)).sum::<f64>() / n;
    (1.0 - var.sqrt()).clamp(0.0, 1.0)
}

/// Per-feature perturbation scale: half the observed range, falling back to
/// the mean absolute value for constant features.
fn feature_scales(samples: &[Vec<f64>], width: usize) -> Vec<f64> {
    let mut scales = Vec::with_capacity(width);
    for i in 0..width {
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        let mut abs_sum = 0.0;
        for s in samples {
            min = min.min(s[i]);
            max = max.max(s[i]);
            abs_sum += s[i].abs();
        }
        let half_range = (max - min) / 2.0;
        let scale = if half_range > 0.0 {
            half_range
        } else {
            abs_sum / samples.len() as f64
        };
        scales.push(scale);
    }
    scales
}

#[cfg(test)]
mod tests {
    use super::*;

    fn samples(n: usize) -> Vec<Vec<f64>> {
        (0..n).map(|i| vec![i as f64 / n as f64, 1.0]).collect()
    }

    #[test]
    fn constant_score_fn_is_fully_stable() {
        let curve = noise_sensitivity(|_| 0.5, &samples(50), &[0.01, 0.05, 0.1], 7).unwrap();
        assert!((curve.aggregate - 1.0).abs() < 1e-12);
        for p in &curve.points {
            assert!((p.agreement - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn jittery_score_fn_loses_agreement() {
        // Score flips hard on small input changes.
        let score = |s: &[f64]| if (s[0] * 1000.0) as i64 % 2 == 0 { 1.0 } else { 0.0 };
        let curve = noise_sensitivity(score, &samples(100), &[0.1], 7).unwrap();
        assert!(curve.aggregate < 0.9);
    }

    #[test]
    fn deterministic_for_same_seed() {
        let score = |s: &[f64]| (s[0]).clamp(0.0, 1.0);
        let a = noise_sensitivity(score, &samples(60), &[0.05, 0.1], 42).unwrap();
        let b = noise_sensitivity(score, &samples(60), &[0.05, 0.1], 42).unwrap();
        assert_eq!(a.aggregate, b.aggregate);
        for (pa, pb) in a.points.iter().zip(b.points.iter()) {
            assert_eq!(pa.agreement, pb.agreement);
        }
    }

    #[test]
    fn aggregate_within_unit_interval() {
        let score = |s: &[f64]| (s[0] * 3.0).clamp(0.0, 1.0);
        let curve = noise_sensitivity(score, &samples(40), &[0.01, 0.5, 1.0], 3).unwrap();
        assert!((0.0..=1.0).contains(&curve.aggregate));
    }

    #[test]
    fn rejects_undersized_sample() {
        let err = noise_sensitivity(|_| 0.5, &samples(5), &[0.1], 1).unwrap_err();
        assert!(matches!(err, Error::InsufficientData { .. }));
    }

    #[test]
    fn confidence_stability_bounds() {
        assert!((confidence_stability(&[0.8, 0.8, 0.8]) - 1.0).abs() < 1e-12);
        let spread = confidence_stability(&[0.0, 1.0, 0.0, 1.0]);
        assert!(spread < 0.6);
        assert!((0.0..=1.0).contains(&spread));
    }
}
