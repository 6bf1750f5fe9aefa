//! Error types for Trustwatch.
//!
//! This module provides structured error handling with:
//! - Stable error codes for machine parsing
//! - Category classification for error grouping
//! - Recoverability hints for the scheduler and operators
//! - Suggested actions for automation
//!
//! Statistical and data errors are terminal for the evaluation run that hit
//! them: the engine boundary converts them into a failed evaluation record,
//! and the cadence still advances. They are never retried in a tight loop.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for Trustwatch operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error categories for grouping related errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Configuration errors (weights, thresholds, cadences, rules).
    Config,
    /// Input data errors (empty or undersized windows, missing groups).
    Data,
    /// Statistical computation errors (NaN propagation, degenerate bins).
    Computation,
    /// Scheduling errors (claim races, unknown schedules).
    Schedule,
    /// Alert dispatch errors (channel unreachable).
    Dispatch,
    /// File I/O and serialization errors.
    Io,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorCategory::Config => "config",
            ErrorCategory::Data => "data",
            ErrorCategory::Computation => "computation",
            ErrorCategory::Schedule => "schedule",
            ErrorCategory::Dispatch => "dispatch",
            ErrorCategory::Io => "io",
        };
        write!(f, "{}", s)
    }
}

/// Suggested actions for automation in response to errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestedAction {
    /// Wait for more data to accumulate; next cadence will retry.
    WaitForData,
    /// Fix the configuration and reload.
    FixConfig,
    /// Skip this cycle; another worker holds the claim.
    Skip,
    /// Inspect the diagnostic context; manual intervention required.
    Inspect,
    /// Delivery is retried by the notification collaborator, not here.
    DeferToNotifier,
    /// No action needed.
    None,
}

/// Unified error type for Trustwatch.
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors (10-19)
    #[error("schedule configuration error: {0}")]
    ScheduleConfig(String),

    #[error("invalid monitor configuration: {0}")]
    InvalidConfig(String),

    // Data errors (20-29)
    #[error("no predictions in window for {key}")]
    NoData { key: String },

    #[error("insufficient data: {got} samples, need at least {needed}")]
    InsufficientData { needed: usize, got: usize },

    #[error("insufficient group size for {attribute}={group}: {got} samples, need at least {needed}")]
    InsufficientGroupSize {
        attribute: String,
        group: String,
        needed: usize,
        got: usize,
    },

    // Computation errors (30-39)
    #[error("computation failed: {0}")]
    Computation(String),

    // Scheduling errors (40-49)
    #[error("claim conflict for {key}: another worker is running this evaluation")]
    ClaimConflict { key: String },

    #[error("schedule not found: {key}")]
    ScheduleNotFound { key: String },

    #[error("evaluation timed out after {seconds}s")]
    EvaluationTimeout { seconds: u64 },

    #[error("evaluation cancelled by operator")]
    Cancelled,

    // Dispatch errors (50-59)
    #[error("notification dispatch failed for channel {channel}: {reason}")]
    Dispatch { channel: String, reason: String },

    // I/O errors (60-69)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Returns the stable error code for this error type.
    ///
    /// Codes are grouped by category:
    /// - 10-19: Configuration errors
    /// - 20-29: Data errors
    /// - 30-39: Computation errors
    /// - 40-49: Scheduling errors
    /// - 50-59: Dispatch errors
    /// - 60-69: I/O errors
    pub fn code(&self) -> u32 {
        match self {
            Error::ScheduleConfig(_) => 10,
            Error::InvalidConfig(_) => 11,
            Error::NoData { .. } => 20,
            Error::InsufficientData { .. } => 21,
            Error::InsufficientGroupSize { .. } => 22,
            Error::Computation(_) => 30,
            Error::ClaimConflict { .. } => 40,
            Error::ScheduleNotFound { .. } => 41,
            Error::EvaluationTimeout { .. } => 42,
            Error::Cancelled => 43,
            Error::Dispatch { .. } => 50,
            Error::Io(_) => 60,
            Error::Json(_) => 61,
        }
    }

    /// Category for grouping and audit reporting.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::ScheduleConfig(_) | Error::InvalidConfig(_) => ErrorCategory::Config,
            Error::NoData { .. }
            | Error::InsufficientData { .. }
            | Error::InsufficientGroupSize { .. } => ErrorCategory::Data,
            Error::Computation(_) => ErrorCategory::Computation,
            Error::ClaimConflict { .. }
            | Error::ScheduleNotFound { .. }
            | Error::EvaluationTimeout { .. }
            | Error::Cancelled => ErrorCategory::Schedule,
            Error::Dispatch { .. } => ErrorCategory::Dispatch,
            Error::Io(_) | Error::Json(_) => ErrorCategory::Io,
        }
    }

    /// Whether the condition clears on its own (next cadence or more data).
    pub fn recoverable(&self) -> bool {
        matches!(
            self,
            Error::NoData { .. }
                | Error::InsufficientData { .. }
                | Error::InsufficientGroupSize { .. }
                | Error::ClaimConflict { .. }
                | Error::EvaluationTimeout { .. }
                | Error::Dispatch { .. }
        )
    }

    /// Suggested response for automated callers.
    pub fn suggested_action(&self) -> SuggestedAction {
        match self {
            Error::ScheduleConfig(_) | Error::InvalidConfig(_) => SuggestedAction::FixConfig,
            Error::NoData { .. }
            | Error::InsufficientData { .. }
            | Error::InsufficientGroupSize { .. } => SuggestedAction::WaitForData,
            Error::Computation(_) => SuggestedAction::Inspect,
            Error::ClaimConflict { .. } => SuggestedAction::Skip,
            Error::ScheduleNotFound { .. } => SuggestedAction::FixConfig,
            Error::EvaluationTimeout { .. } | Error::Cancelled => SuggestedAction::None,
            Error::Dispatch { .. } => SuggestedAction::DeferToNotifier,
            Error::Io(_) | Error::Json(_) => SuggestedAction::Inspect,
        }
    }

    /// Serialize to the structured JSON shape used in audit events.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "code": self.code(),
            "category": self.category(),
            "message": self.to_string(),
            "recoverable": self.recoverable(),
            "suggested_action": self.suggested_action(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_grouped_by_category() {
        let err = Error::InsufficientData { needed: 30, got: 5 };
        assert_eq!(err.code(), 21);
        assert_eq!(err.category(), ErrorCategory::Data);
        assert!(err.recoverable());
        assert_eq!(err.suggested_action(), SuggestedAction::WaitForData);
    }

    #[test]
    fn test_claim_conflict_is_silent_skip() {
        let err = Error::ClaimConflict {
            key: "p/m/drift".to_string(),
        };
        assert_eq!(err.category(), ErrorCategory::Schedule);
        assert_eq!(err.suggested_action(), SuggestedAction::Skip);
        assert!(err.recoverable());
    }

    #[test]
    fn test_config_errors_not_recoverable() {
        let err = Error::ScheduleConfig("cadence must be positive".to_string());
        assert_eq!(err.code(), 10);
        assert!(!err.recoverable());
        assert_eq!(err.suggested_action(), SuggestedAction::FixConfig);
    }

    #[test]
    fn test_structured_json_shape() {
        let err = Error::Computation("NaN in PSI term".to_string());
        let v = err.to_json();
        assert_eq!(v["code"], 30);
        assert_eq!(v["category"], "computation");
        assert_eq!(v["recoverable"], false);
    }
}
