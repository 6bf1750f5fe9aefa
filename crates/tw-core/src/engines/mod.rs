//! Evaluation engines.
//!
//! One engine per evaluation type, all behind the same contract: read the
//! window's predictions, compute a bounded overall score (1 = healthy) plus
//! per-metric detail, and return recommendations. Engines never write to the
//! store and never raise past their boundary; the caller turns an `Err` into
//! a failed evaluation record.
//!
//! Identical inputs produce identical outputs. The only randomness in any
//! engine is the robustness perturbation RNG, which is explicitly seeded
//! from configuration.

pub mod drift;
pub mod explainability;
pub mod fairness;
pub mod robustness;

use tw_common::{Error, EvalKey, EvaluationType, Result};
use tw_config::EvaluationConfig;

use crate::registry::ModelRegistry;
use crate::scheduler::CancelToken;
use crate::schema::{MetricDetail, PredictionRecord, TimeWindow};
use crate::store::PredictionStore;

pub use robustness::{ModelScorer, ProxyScorer};

/// Shared collaborators handed to every engine run.
pub struct EngineContext<'a> {
    pub predictions: &'a dyn PredictionStore,
    pub registry: &'a dyn ModelRegistry,
    pub config: &'a EvaluationConfig,
    pub cancel: &'a CancelToken,
    /// Optional external scorer for robustness; when absent the engine
    /// builds a proxy scorer from the window itself.
    pub scorer: Option<&'a dyn ModelScorer>,
}

/// What a successful engine run produces.
#[derive(Debug, Clone)]
pub struct EngineOutcome {
    /// Bounded [0, 1]; 1 = healthy.
    pub overall_score: f64,
    pub detail: Vec<MetricDetail>,
    pub recommendations: Vec<String>,
    pub sample_size: usize,
}

/// Run the engine for `key.evaluation_type` over `window`.
pub fn run_evaluation(
    ctx: &EngineContext<'_>,
    key: &EvalKey,
    window: TimeWindow,
) -> Result<EngineOutcome> {
    ctx.cancel.check()?;
    match key.evaluation_type {
        EvaluationType::Fairness => fairness::evaluate(ctx, key, window),
        EvaluationType::Drift => drift::evaluate(ctx, key, window),
        EvaluationType::Robustness => robustness::evaluate(ctx, key, window),
        EvaluationType::Explainability => explainability::evaluate(ctx, key, window),
    }
}

/// Fetch the window's predictions, rejecting empty windows.
pub(crate) fn window_predictions(
    ctx: &EngineContext<'_>,
    key: &EvalKey,
    window: &TimeWindow,
) -> Result<Vec<PredictionRecord>> {
    let records = ctx.predictions.query(&key.model, window)?;
    if records.is_empty() {
        return Err(Error::NoData {
            key: key.to_string(),
        });
    }
    Ok(records)
}

/// Numeric feature names observed across a set of predictions, sorted.
pub(crate) fn numeric_feature_names(records: &[PredictionRecord]) -> Vec<String> {
    let mut names: Vec<String> = records
        .iter()
        .flat_map(|r| {
            r.features
                .iter()
                .filter(|(_, v)| v.as_number().is_some())
                .map(|(k, _)| k.clone())
        })
        .collect();
    names.sort();
    names.dedup();
    names
}
