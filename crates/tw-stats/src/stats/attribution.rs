//! Feature-attribution stability via rank correlation.
//!
//! Explanations are only trustworthy if the model tells a consistent story
//! over time: the same features should matter, in roughly the same order.
//! We compare successive feature-importance snapshots with Spearman rank
//! correlation and map the mean correlation into [0, 1].

use std::collections::BTreeMap;

use serde::Serialize;
use tw_common::{Error, Result};

/// Consistency of feature-importance rankings over time.
#[derive(Debug, Clone, Serialize)]
pub struct AttributionConsistency {
    /// Spearman correlation of each successive snapshot pair.
    pub pairwise: Vec<f64>,
    /// Mean pairwise correlation mapped to [0, 1]; 1 = identical rankings.
    pub consistency: f64,
    pub snapshots_n: usize,
}

/// Rank-correlation consistency across importance snapshots, ordered oldest
/// to newest. Features missing from a snapshot are treated as importance 0.
/// Fails with `InsufficientData` when fewer than two snapshots exist.
pub fn attribution_consistency(
    snapshots: &[BTreeMap<String, f64>],
) -> Result<AttributionConsistency> {
    if snapshots.len() < 2 {
        return Err(Error::InsufficientData {
            needed: 2,
            got: snapshots.len(),
        });
    }

    let mut pairwise = Vec::with_capacity(snapshots.len() - 1);
    for pair in snapshots.windows(2) {
        let (prev, next) = (&pair[0], &pair[1]);
        let features: Vec<&String> = prev.keys().chain(next.keys()).collect();
        let mut features: Vec<&String> = features;
        features.sort();
        features.dedup();
        if features.len() < 2 {
            pairwise.push(1.0);
            continue;
        }
        let a: Vec<f64> = features
            .iter()
            .map(|f| prev.get(*f).copied().unwrap_or(0.0))
            .collect();
        let b: Vec<f64> = features
            .iter()
            .map(|f| next.get(*f).copied().unwrap_or(0.0))
            .collect();
        pairwise.push(spearman_rank_correlation(&a, &b)?);
    }

    let mean_rho = pairwise.iter().sum::<f64>() / pairwise.len() as f64;
    Ok(AttributionConsistency {
        pairwise,
        consistency: ((mean_rho + 1.0) / 2.0).clamp(0.0, 1.0),
        snapshots_n: snapshots.len(),
    })
}

/// Spearman rank correlation between two equal-length vectors, with average
/// ranks for ties. Returns a value in [-1, 1].
pub fn spearman_rank_correlation(a: &[f64], b: &[f64]) -> Result<f64> {
    if a.len() != b.len() {
        return Err(Error::Computation(format!(
            "rank correlation requires equal lengths, got {} and {}",
            a.len(),
            b.len()
        )));
    }
    if a.len() < 2 {
        return Err(Error::InsufficientData {
            needed: 2,
            got: a.len(),
        });
    }

    let ra = average_ranks(a);
    let rb = average_ranks(b);

    let n = ra.len() as f64;
    let mean_a = ra.iter().sum::<f64>() / n;
    let mean_b = rb.iter().sum::<f64>() / n;

    let mut cov = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    for (x, y) in ra.iter().zip(rb.iter()) {
        let dx = x - mean_a;
        let dy = y - mean_b;
        cov += dx * dy;
        var_a += dx * dx;
        var_b += dy * dy;
    }
    if var_a == 0.0 || var_b == 0.0 {
        // A constant ranking carries no ordering information; treat as
        // perfectly consistent with anything.
        return Ok(1.0);
    }
    Ok((cov / (var_a.sqrt() * var_b.sqrt())).clamp(-1.0, 1.0))
}

/// Ranks with ties receiving the average of their positions (1-based).
fn average_ranks(values: &[f64]) -> Vec<f64> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&i, &j| {
        values[i]
            .partial_cmp(&values[j])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut ranks = vec![0.0; values.len()];
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && values[order[j + 1]] == values[order[i]] {
            j += 1;
        }
        let avg_rank = (i + j) as f64 / 2.0 + 1.0;
        for &idx in &order[i..=j] {
            ranks[idx] = avg_rank;
        }
        i = j + 1;
    }
    ranks
}
