//! Project, model, and evaluation identity types.
//!
//! Evaluation state is keyed by (project, model) or by
//! (project, model, evaluation_type); these wrappers keep the compound keys
//! from degrading into loose string tuples across the codebase.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::EvaluationType;

/// Project identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectId(pub String);

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ProjectId {
    fn from(s: &str) -> Self {
        ProjectId(s.to_string())
    }
}

/// Model identifier within a project.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelId(pub String);

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ModelId {
    fn from(s: &str) -> Self {
        ModelId(s.to_string())
    }
}

/// Unique identifier for one evaluation run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EvaluationId(pub String);

impl EvaluationId {
    /// Generate a fresh evaluation ID.
    pub fn new() -> Self {
        EvaluationId(uuid::Uuid::new_v4().to_string())
    }
}

impl Default for EvaluationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EvaluationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Compound key identifying a monitored model.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModelKey {
    pub project_id: ProjectId,
    pub model_id: ModelId,
}

impl ModelKey {
    pub fn new(project_id: impl Into<String>, model_id: impl Into<String>) -> Self {
        ModelKey {
            project_id: ProjectId(project_id.into()),
            model_id: ModelId(model_id.into()),
        }
    }

    /// The schedule key for a specific evaluation type of this model.
    pub fn eval_key(&self, evaluation_type: EvaluationType) -> EvalKey {
        EvalKey {
            model: self.clone(),
            evaluation_type,
        }
    }
}

impl fmt::Display for ModelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.project_id, self.model_id)
    }
}

/// Compound key identifying one scheduled evaluation stream.
///
/// Evaluation types for the same model are independent keys: the scheduler
/// enforces at-most-one concurrent run per `EvalKey`, not per model.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EvalKey {
    #[serde(flatten)]
    pub model: ModelKey,
    pub evaluation_type: EvaluationType,
}

impl fmt::Display for EvalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.model, self.evaluation_type)
    }
}
