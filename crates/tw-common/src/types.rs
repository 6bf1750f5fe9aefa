//! Evaluation axes and alert severity scale.

use serde::{Deserialize, Serialize};

/// The four quality axes a model is evaluated along. Ordered so the type
/// can key component maps; the ordering matches [`EvaluationType::ALL`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationType {
    Fairness,
    Drift,
    Robustness,
    Explainability,
}

impl EvaluationType {
    /// All evaluation types, in aggregation order.
    pub const ALL: [EvaluationType; 4] = [
        EvaluationType::Fairness,
        EvaluationType::Drift,
        EvaluationType::Robustness,
        EvaluationType::Explainability,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EvaluationType::Fairness => "fairness",
            EvaluationType::Drift => "drift",
            EvaluationType::Robustness => "robustness",
            EvaluationType::Explainability => "explainability",
        }
    }
}

impl std::fmt::Display for EvaluationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for EvaluationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fairness" => Ok(EvaluationType::Fairness),
            "drift" => Ok(EvaluationType::Drift),
            "robustness" => Ok(EvaluationType::Robustness),
            "explainability" => Ok(EvaluationType::Explainability),
            other => Err(format!("unknown evaluation type: {}", other)),
        }
    }
}

/// Alert severity. Ordering matters: escalation moves strictly upward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// The next severity up, saturating at `Critical`.
    pub fn escalated(&self) -> Severity {
        match self {
            Severity::Low => Severity::Medium,
            Severity::Medium => Severity::High,
            Severity::High => Severity::Critical,
            Severity::Critical => Severity::Critical,
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        };
        write!(f, "{}", s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evaluation_type_round_trip() {
        for ty in EvaluationType::ALL {
            let parsed: EvaluationType = ty.as_str().parse().unwrap();
            assert_eq!(parsed, ty);
        }
    }

    #[test]
    fn test_evaluation_type_keys_component_maps() {
        let components: std::collections::BTreeMap<EvaluationType, f64> =
            EvaluationType::ALL.iter().map(|ty| (*ty, 1.0)).collect();
        let keys: Vec<EvaluationType> = components.keys().copied().collect();
        assert_eq!(keys, EvaluationType::ALL);
    }

    #[test]
    fn test_severity_escalation_is_monotonic() {
        assert_eq!(Severity::Low.escalated(), Severity::Medium);
        assert_eq!(Severity::High.escalated(), Severity::Critical);
        assert_eq!(Severity::Critical.escalated(), Severity::Critical);
        assert!(Severity::Medium.escalated() > Severity::Medium);
    }
}
