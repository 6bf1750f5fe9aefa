//! Divergence and distance measures between empirical distributions.
//!
//! KL and Jensen-Shannon divergences operate on categorical distributions
//! aligned over the union of observed labels. The 1-D Wasserstein distance
//! operates on numeric samples, with linear quantile interpolation when the
//! two samples differ in size.

use std::collections::BTreeMap;

use tw_common::{Error, Result};

use crate::{MIN_SAMPLES, PROPORTION_EPSILON};

/// Normalized label frequencies, keyed by label. BTreeMap keeps iteration
/// order stable for reproducibility.
pub fn categorical_distribution(values: &[String]) -> BTreeMap<String, f64> {
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for v in values {
        *counts.entry(v.clone()).or_insert(0) += 1;
    }
    let total = values.len().max(1) as f64;
    counts
        .into_iter()
        .map(|(k, c)| (k, c as f64 / total))
        .collect()
}

/// KL divergence D(current || reference) over the union of labels.
///
/// Proportions are floored at [`PROPORTION_EPSILON`] so labels absent from
/// one side contribute a large but finite term.
pub fn kl_divergence(
    reference: &BTreeMap<String, f64>,
    current: &BTreeMap<String, f64>,
) -> f64 {
    let mut kl = 0.0;
    for label in reference.keys().chain(current.keys()) {
        let q = reference.get(label).copied().unwrap_or(0.0).max(PROPORTION_EPSILON);
        let p = current.get(label).copied().unwrap_or(0.0).max(PROPORTION_EPSILON);
        kl += p * (p / q).ln();
    }
    kl.max(0.0)
}

/// KL divergence between two categorical samples, with the minimum-sample
/// guard applied.
pub fn kl_divergence_samples(reference: &[String], current: &[String]) -> Result<f64> {
    guard_sample_sizes(reference.len(), current.len())?;
    let ref_dist = categorical_distribution(reference);
    let curr_dist = categorical_distribution(current);
    Ok(kl_divergence(&ref_dist, &curr_dist))
}

/// Jensen-Shannon divergence: symmetric, bounded by ln(2).
pub fn jensen_shannon_divergence(
    reference: &BTreeMap<String, f64>,
    current: &BTreeMap<String, f64>,
) -> f64 {
    let mut mixture = BTreeMap::new();
    for label in reference.keys().chain(current.keys()) {
        let q = reference.get(label).copied().unwrap_or(0.0);
        let p = current.get(label).copied().unwrap_or(0.0);
        mixture.insert(label.clone(), 0.5 * (p + q));
    }
    0.5 * kl_divergence(&mixture, current) + 0.5 * kl_divergence(&mixture, reference)
}

/// 1-D Wasserstein distance between two numeric samples.
///
/// Equal sizes reduce to the mean absolute difference of sorted values;
/// unequal sizes are compared on a common quantile grid via linear
/// interpolation. Fails with `InsufficientData` below [`MIN_SAMPLES`].
pub fn wasserstein_distance(reference: &[f64], current: &[f64]) -> Result<f64> {
    guard_sample_sizes(reference.len(), current.len())?;

    let mut p: Vec<f64> = reference.to_vec();
    let mut q: Vec<f64> = current.to_vec();
    p.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    q.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let distance = if p.len() == q.len() {
        let n = p.len() as f64;
        p.iter().zip(q.iter()).map(|(a, b)| (a - b).abs()).sum::<f64>() / n
    } else {
        let n = p.len().max(q.len());
        let mut total = 0.0;
        for i in 0..n {
            let u = (i as f64 + 0.5) / n as f64;
            total += (quantile_interpolate(&p, u) - quantile_interpolate(&q, u)).abs();
        }
        total / n as f64
    };

    if !distance.is_finite() {
        return Err(Error::Computation(
            "non-finite Wasserstein distance".to_string(),
        ));
    }
    Ok(distance)
}

fn guard_sample_sizes(reference_n: usize, current_n: usize) -> Result<()> {
    if reference_n < MIN_SAMPLES {
        return Err(Error::InsufficientData {
            needed: MIN_SAMPLES,
            got: reference_n,
        });
    }
    if current_n < MIN_SAMPLES {
        return Err(Error::InsufficientData {
            needed: MIN_SAMPLES,
            got: current_n,
        });
    }
    Ok(())
}

/// Linear interpolation of the empirical quantile function.
fn quantile_interpolate(sorted: &[f64], u: f64) -> f64 {
    if sorted.len() == 1 {
        return sorted[0];
    }
    let pos = u.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    sorted[lo] * (1.0 - frac) + sorted[hi] * frac
}
