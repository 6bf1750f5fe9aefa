//! Trustwatch monitor configuration.
//!
//! This crate provides:
//! - Typed structs for the monitor configuration file (TOML)
//! - Defaults matching the documented evaluation policy
//! - Semantic validation (weight sums, threshold ranges, cadences)
//!
//! Malformed configuration is rejected here, at load time; it never reaches
//! a running evaluation job.

pub mod validate;

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use tw_common::EvaluationType;

pub use validate::{validate_config, ValidationError, ValidationResult};

/// Schema version for configuration files.
pub const CONFIG_SCHEMA_VERSION: &str = "1.0.0";

/// Root monitor configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Schema version for forward compatibility.
    pub schema_version: String,
    /// Trust score weighting and thresholding.
    pub trust: TrustConfig,
    /// Evaluation engine parameters.
    pub evaluation: EvaluationConfig,
    /// Scheduling cadences and worker pool sizing.
    pub schedule: ScheduleConfig,
    /// Alerting windows and escalation policy.
    pub alerting: AlertingConfig,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            schema_version: CONFIG_SCHEMA_VERSION.to_string(),
            trust: TrustConfig::default(),
            evaluation: EvaluationConfig::default(),
            schedule: ScheduleConfig::default(),
            alerting: AlertingConfig::default(),
        }
    }
}

impl MonitorConfig {
    /// Load and validate a configuration file.
    pub fn load(path: &Path) -> ValidationResult<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| ValidationError::Io(format!("{}: {}", path.display(), e)))?;
        let config: MonitorConfig =
            toml::from_str(&raw).map_err(|e| ValidationError::Parse(e.to_string()))?;
        validate_config(&config)?;
        Ok(config)
    }
}

/// Per-type weights and the trust threshold.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrustConfig {
    /// Weight applied to each evaluation type's component score. Weights
    /// need not sum to 1; the aggregate renormalizes over known components.
    pub fairness_weight: f64,
    pub drift_weight: f64,
    pub robustness_weight: f64,
    pub explainability_weight: f64,
    /// Minimum acceptable trust score; below this, alert_triggered is set.
    pub threshold: f64,
    /// Trend dead band in percent: |trend| below this is "stable".
    pub dead_band_pct: f64,
}

impl Default for TrustConfig {
    fn default() -> Self {
        Self {
            fairness_weight: 1.0,
            drift_weight: 1.0,
            robustness_weight: 1.0,
            explainability_weight: 1.0,
            threshold: 0.7,
            dead_band_pct: 1.0,
        }
    }
}

impl TrustConfig {
    /// The configured weight for one evaluation type.
    pub fn weight(&self, evaluation_type: EvaluationType) -> f64 {
        match evaluation_type {
            EvaluationType::Fairness => self.fairness_weight,
            EvaluationType::Drift => self.drift_weight,
            EvaluationType::Robustness => self.robustness_weight,
            EvaluationType::Explainability => self.explainability_weight,
        }
    }
}

/// How fairness sub-metrics combine into one overall score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FairnessCombine {
    /// Worst-case bias: minimum of the sub-metrics.
    Min,
    /// Average bias across sub-metrics.
    Mean,
}

/// Evaluation engine parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationConfig {
    /// Length of the current evaluation window, seconds.
    pub window_secs: u64,
    /// Length of the drift reference window, seconds. It ends where the
    /// current window starts.
    pub reference_window_secs: u64,
    /// Equal-frequency bins for PSI.
    pub psi_bins: usize,
    /// PSI value treated as total drift when normalizing to [0, 1].
    pub psi_cap: f64,
    /// Noise magnitudes for robustness perturbation.
    pub noise_levels: Vec<f64>,
    /// Seed for the perturbation RNG, for reproducible robustness scores.
    pub noise_seed: u64,
    /// Fairness sub-metric combination policy.
    pub fairness_combine: FairnessCombine,
    /// Number of importance snapshots compared for explainability. The
    /// evaluation window is split into this many sub-windows.
    pub attribution_snapshots: usize,
    /// Top-N features kept in importance rankings.
    pub attribution_top_n: usize,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            window_secs: 7 * 24 * 3600,
            reference_window_secs: 30 * 24 * 3600,
            psi_bins: 10,
            psi_cap: 0.25,
            noise_levels: vec![0.01, 0.05, 0.1],
            noise_seed: 17,
            fairness_combine: FairnessCombine::Min,
            attribution_snapshots: 4,
            attribution_top_n: 20,
        }
    }
}

/// Scheduling cadences and worker pool sizing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Default cadence per evaluation type, seconds.
    pub fairness_cadence_secs: u64,
    pub drift_cadence_secs: u64,
    pub robustness_cadence_secs: u64,
    pub explainability_cadence_secs: u64,
    /// Number of evaluation workers.
    pub workers: usize,
    /// Maximum duration of one evaluation job, seconds. Timeout counts as
    /// failure and releases the per-key claim.
    pub job_timeout_secs: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            fairness_cadence_secs: 24 * 3600,
            drift_cadence_secs: 6 * 3600,
            robustness_cadence_secs: 24 * 3600,
            explainability_cadence_secs: 24 * 3600,
            workers: 4,
            job_timeout_secs: 300,
        }
    }
}

impl ScheduleConfig {
    /// Cadence for one evaluation type.
    pub fn cadence(&self, evaluation_type: EvaluationType) -> Duration {
        let secs = match evaluation_type {
            EvaluationType::Fairness => self.fairness_cadence_secs,
            EvaluationType::Drift => self.drift_cadence_secs,
            EvaluationType::Robustness => self.robustness_cadence_secs,
            EvaluationType::Explainability => self.explainability_cadence_secs,
        };
        Duration::from_secs(secs)
    }
}

/// Alerting windows and escalation policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertingConfig {
    /// De-duplication window, seconds: a qualifying event within this span
    /// of an existing active alert escalates it instead of duplicating.
    pub dedup_window_secs: u64,
    /// Minimum seconds between firings of the same rule.
    pub cooldown_secs: u64,
    /// Auto-resolve an alert after this many consecutive clean cycles.
    /// 0 disables auto-resolve.
    pub auto_resolve_clean_cycles: u32,
}

impl Default for AlertingConfig {
    fn default() -> Self {
        Self {
            dedup_window_secs: 3600,
            cooldown_secs: 1800,
            auto_resolve_clean_cycles: 0,
        }
    }
}
