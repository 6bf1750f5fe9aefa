//! Trustwatch shared types.
//!
//! This crate provides the pieces every other Trustwatch crate needs:
//! - Identity newtypes for projects, models, and evaluation runs
//! - The `EvaluationType` tagged variant and alert severity scale
//! - The unified error type with stable codes and category grouping

pub mod error;
pub mod id;
pub mod types;

pub use error::{Error, ErrorCategory, Result, SuggestedAction};
pub use id::{EvalKey, EvaluationId, ModelId, ModelKey, ProjectId};
pub use types::{EvaluationType, Severity};
