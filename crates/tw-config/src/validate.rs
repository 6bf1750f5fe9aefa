//! Semantic validation for monitor configuration.

use thiserror::Error;

use crate::MonitorConfig;

/// Validation result type.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Configuration validation errors.
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Semantic validation failed: {0}")]
    Semantic(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("Version mismatch: expected {expected}, got {actual}")]
    VersionMismatch { expected: String, actual: String },
}

impl ValidationError {
    /// Error code for structured error reporting.
    pub fn code(&self) -> u32 {
        match self {
            ValidationError::Io(_) => 60,
            ValidationError::Parse(_) => 61,
            ValidationError::Semantic(_) => 62,
            ValidationError::InvalidValue { .. } => 63,
            ValidationError::VersionMismatch { .. } => 64,
        }
    }
}

impl From<ValidationError> for tw_common::Error {
    fn from(err: ValidationError) -> Self {
        tw_common::Error::ScheduleConfig(err.to_string())
    }
}

/// Validate a monitor configuration semantically.
pub fn validate_config(config: &MonitorConfig) -> ValidationResult<()> {
    if config.schema_version != crate::CONFIG_SCHEMA_VERSION {
        return Err(ValidationError::VersionMismatch {
            expected: crate::CONFIG_SCHEMA_VERSION.to_string(),
            actual: config.schema_version.clone(),
        });
    }

    let trust = &config.trust;
    for (field, weight) in [
        ("trust.fairness_weight", trust.fairness_weight),
        ("trust.drift_weight", trust.drift_weight),
        ("trust.robustness_weight", trust.robustness_weight),
        ("trust.explainability_weight", trust.explainability_weight),
    ] {
        if !weight.is_finite() || weight < 0.0 {
            return Err(ValidationError::InvalidValue {
                field: field.to_string(),
                message: format!("Must be a finite non-negative number, got {}", weight),
            });
        }
    }
    let weight_sum = trust.fairness_weight
        + trust.drift_weight
        + trust.robustness_weight
        + trust.explainability_weight;
    if weight_sum <= 0.0 {
        return Err(ValidationError::Semantic(format!(
            "Trust weights must sum to a positive total, got {}",
            weight_sum
        )));
    }
    check_unit_interval("trust.threshold", trust.threshold)?;
    if !trust.dead_band_pct.is_finite() || trust.dead_band_pct < 0.0 {
        return Err(ValidationError::InvalidValue {
            field: "trust.dead_band_pct".to_string(),
            message: format!("Must be non-negative, got {}", trust.dead_band_pct),
        });
    }

    let eval = &config.evaluation;
    if eval.window_secs == 0 {
        return Err(ValidationError::InvalidValue {
            field: "evaluation.window_secs".to_string(),
            message: "Must be positive".to_string(),
        });
    }
    if eval.reference_window_secs == 0 {
        return Err(ValidationError::InvalidValue {
            field: "evaluation.reference_window_secs".to_string(),
            message: "Must be positive".to_string(),
        });
    }
    if eval.psi_bins < 2 {
        return Err(ValidationError::InvalidValue {
            field: "evaluation.psi_bins".to_string(),
            message: format!("Need at least 2 bins, got {}", eval.psi_bins),
        });
    }
    if !eval.psi_cap.is_finite() || eval.psi_cap <= 0.0 {
        return Err(ValidationError::InvalidValue {
            field: "evaluation.psi_cap".to_string(),
            message: format!("Must be positive, got {}", eval.psi_cap),
        });
    }
    if eval.noise_levels.is_empty() {
        return Err(ValidationError::Semantic(
            "evaluation.noise_levels must not be empty".to_string(),
        ));
    }
    for (i, level) in eval.noise_levels.iter().enumerate() {
        if !level.is_finite() || *level <= 0.0 {
            return Err(ValidationError::InvalidValue {
                field: format!("evaluation.noise_levels[{}]", i),
                message: format!("Must be positive, got {}", level),
            });
        }
    }
    if eval.attribution_snapshots < 2 {
        return Err(ValidationError::InvalidValue {
            field: "evaluation.attribution_snapshots".to_string(),
            message: "Need at least 2 snapshots to compare rankings".to_string(),
        });
    }
    if eval.attribution_top_n == 0 {
        return Err(ValidationError::InvalidValue {
            field: "evaluation.attribution_top_n".to_string(),
            message: "Must be positive".to_string(),
        });
    }

    let schedule = &config.schedule;
    for (field, cadence) in [
        ("schedule.fairness_cadence_secs", schedule.fairness_cadence_secs),
        ("schedule.drift_cadence_secs", schedule.drift_cadence_secs),
        ("schedule.robustness_cadence_secs", schedule.robustness_cadence_secs),
        (
            "schedule.explainability_cadence_secs",
            schedule.explainability_cadence_secs,
        ),
    ] {
        if cadence == 0 {
            return Err(ValidationError::InvalidValue {
                field: field.to_string(),
                message: "Cadence must be positive".to_string(),
            });
        }
    }
    if schedule.workers == 0 {
        return Err(ValidationError::InvalidValue {
            field: "schedule.workers".to_string(),
            message: "Need at least one worker".to_string(),
        });
    }
    if schedule.job_timeout_secs == 0 {
        return Err(ValidationError::InvalidValue {
            field: "schedule.job_timeout_secs".to_string(),
            message: "Must be positive".to_string(),
        });
    }

    Ok(())
}

fn check_unit_interval(field: &str, value: f64) -> ValidationResult<()> {
    if !value.is_finite() || !(0.0..=1.0).contains(&value) {
        return Err(ValidationError::InvalidValue {
            field: field.to_string(),
            message: format!("Must be in [0, 1], got {}", value),
        });
    }
    Ok(())
}
