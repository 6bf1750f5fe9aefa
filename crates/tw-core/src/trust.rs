//! Trust score aggregation.
//!
//! Folds the latest completed evaluation of each type into one weighted
//! score per model. Every component is stability-oriented (1 = healthy), so
//! no component is inverted here; an evaluation type with no completed
//! record is unknown and is excluded with its weight renormalized away
//! rather than defaulted.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

use tracing::debug;
use tw_common::{Error, EvaluationType, ModelKey, Result};
use tw_config::TrustConfig;

use crate::schema::{TrendDirection, TrustScore, SCHEMA_VERSION};
use crate::store::MonitorStore;

/// Aggregate the model's current trust score.
///
/// Reads only durably completed evaluation records. Fails with `NoData`
/// when no evaluation type has ever completed for the model.
pub fn aggregate(
    store: &MonitorStore,
    config: &TrustConfig,
    model: &ModelKey,
    now: DateTime<Utc>,
) -> Result<TrustScore> {
    let mut components = BTreeMap::new();
    let mut component_evaluations = BTreeMap::new();
    for ty in EvaluationType::ALL {
        let key = model.eval_key(ty);
        if let Some(record) = store.latest_completed_evaluation(&key) {
            components.insert(ty, record.overall_score.clamp(0.0, 1.0));
            component_evaluations.insert(ty, record.evaluation_id.clone());
        } else {
            debug!(model = %model, evaluation_type = %ty, "component unknown, excluded");
        }
    }
    if components.is_empty() {
        return Err(Error::NoData {
            key: model.to_string(),
        });
    }

    let score = weighted_score(config, &components);
    let previous = store.latest_trust_score(model);
    let (trend_direction, trend_percentage) = trend(
        previous.as_ref().map(|p| p.score),
        score,
        config.dead_band_pct,
    );

    Ok(TrustScore {
        schema_version: SCHEMA_VERSION.to_string(),
        model: model.clone(),
        score,
        components,
        component_evaluations,
        trend_direction,
        trend_percentage,
        threshold: config.threshold,
        alert_triggered: score < config.threshold,
        timestamp: now,
    })
}

/// `Σ wᵢ·cᵢ / Σ wᵢ` over the known components.
fn weighted_score(config: &TrustConfig, components: &BTreeMap<EvaluationType, f64>) -> f64 {
    let mut weighted_sum = 0.0;
    let mut weight_sum = 0.0;
    for (ty, component) in components {
        let weight = config.weight(*ty);
        weighted_sum += weight * component;
        weight_sum += weight;
    }
    if weight_sum <= 0.0 {
        return 0.0;
    }
    (weighted_sum / weight_sum).clamp(0.0, 1.0)
}

/// Trend versus the previous score: signed percent change, with changes
/// inside the dead band reported as stable. The first score is stable at 0%.
fn trend(previous: Option<f64>, current: f64, dead_band_pct: f64) -> (TrendDirection, f64) {
    let Some(previous) = previous else {
        return (TrendDirection::Stable, 0.0);
    };
    if previous <= 0.0 {
        return (TrendDirection::Stable, 0.0);
    }
    let pct = (current - previous) / previous * 100.0;
    let direction = if pct.abs() < dead_band_pct {
        TrendDirection::Stable
    } else if pct > 0.0 {
        TrendDirection::Improving
    } else {
        TrendDirection::Declining
    };
    (direction, pct)
}
