//! Population Stability Index over equal-frequency bins.
//!
//! Bins are derived from the reference sample only, so the index answers
//! "how far has the current distribution moved from where the reference
//! mass sits". Current values outside the reference range are clamped into
//! the outermost bins rather than dropped.

use serde::Serialize;
use tw_common::{Error, Result};

use crate::{MIN_SAMPLES, PROPORTION_EPSILON};

/// Default number of equal-frequency bins.
pub const DEFAULT_BINS: usize = 10;

/// Result of a PSI computation.
#[derive(Debug, Clone, Serialize)]
pub struct PsiResult {
    /// The index value. 0 = identical distributions.
    pub psi: f64,
    /// Number of bins actually used (duplicate edges are merged).
    pub bins: usize,
    /// Interior bin edges derived from the reference sample.
    pub edges: Vec<f64>,
    pub reference_n: usize,
    pub current_n: usize,
}

/// Compute the Population Stability Index between two numeric samples.
///
/// `bins` is the requested number of equal-frequency bins; reference samples
/// with heavy ties may yield fewer. Fails with `InsufficientData` when either
/// sample is below [`MIN_SAMPLES`].
pub fn population_stability_index(
    reference: &[f64],
    current: &[f64],
    bins: usize,
) -> Result<PsiResult> {
    let needed = MIN_SAMPLES;
    if reference.len() < needed {
        return Err(Error::InsufficientData {
            needed,
            got: reference.len(),
        });
    }
    if current.len() < needed {
        return Err(Error::InsufficientData {
            needed,
            got: current.len(),
        });
    }
    let bins = bins.max(2);

    let mut sorted_ref: Vec<f64> = reference.to_vec();
    sorted_ref.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let edges = equal_frequency_edges(&sorted_ref, bins);
    let bin_count = edges.len() + 1;

    let ref_hist = histogram(reference, &edges);
    let curr_hist = histogram(current, &edges);

    let mut psi = 0.0;
    for i in 0..bin_count {
        let q = (ref_hist[i] as f64 / reference.len() as f64).max(PROPORTION_EPSILON);
        let p = (curr_hist[i] as f64 / current.len() as f64).max(PROPORTION_EPSILON);
        let term = (p - q) * (p / q).ln();
        if !term.is_finite() {
            return Err(Error::Computation(format!(
                "non-finite PSI term in bin {} (p={}, q={})",
                i, p, q
            )));
        }
        psi += term;
    }

    Ok(PsiResult {
        psi,
        bins: bin_count,
        edges,
        reference_n: reference.len(),
        current_n: current.len(),
    })
}

/// Interior edges splitting a sorted reference sample into equal-frequency
/// bins. Duplicate edges (heavy ties) are merged.
pub fn equal_frequency_edges(sorted_reference: &[f64], bins: usize) -> Vec<f64> {
    let n = sorted_reference.len();
    let mut edges = Vec::with_capacity(bins.saturating_sub(1));
    for i in 1..bins {
        let q = i as f64 / bins as f64;
        let pos = q * (n - 1) as f64;
        let lo = pos.floor() as usize;
        let hi = pos.ceil() as usize;
        let frac = pos - lo as f64;
        let edge = sorted_reference[lo] * (1.0 - frac) + sorted_reference[hi] * frac;
        if edges.last().is_none_or(|last: &f64| edge > *last) {
            edges.push(edge);
        }
    }
    edges
}

/// Count samples per bin. Bin `i` covers `(edges[i-1], edges[i]]`; values
/// below the first edge land in bin 0, values above the last edge in the
/// final bin.
fn histogram(values: &[f64], edges: &[f64]) -> Vec<usize> {
    let mut counts = vec![0usize; edges.len() + 1];
    for &v in values {
        let idx = edges.partition_point(|&e| e < v);
        counts[idx] += 1;
    }
    counts
}
