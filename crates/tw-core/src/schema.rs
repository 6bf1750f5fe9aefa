//! Persisted entity types for the evaluation pipeline.
//!
//! Prediction records are read-only inputs created by ingestion. Evaluation
//! records, trust scores, alerts, and schedule metadata are each written by
//! exactly one component (engines, aggregator, alert engine, scheduler).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use tw_common::{ErrorCategory, EvalKey, EvaluationId, EvaluationType, ModelKey, Severity};

/// Schema version for persisted records.
pub const SCHEMA_VERSION: &str = "1.0.0";

// ---------------------------------------------------------------------------
// Predictions (read-only input)
// ---------------------------------------------------------------------------

/// A single feature value. Numeric features feed drift and robustness;
/// text/flag features feed fairness grouping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeatureValue {
    Number(f64),
    Flag(bool),
    Text(String),
}

impl FeatureValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            FeatureValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Group label for fairness analysis.
    pub fn group_label(&self) -> String {
        match self {
            FeatureValue::Number(n) => format!("{}", n),
            FeatureValue::Flag(b) => b.to_string(),
            FeatureValue::Text(s) => s.clone(),
        }
    }
}

/// An ingested prediction. Immutable; never mutated by this core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionRecord {
    pub project_id: String,
    pub model_id: String,
    pub prediction_id: String,
    pub features: BTreeMap<String, FeatureValue>,
    /// Predicted label.
    pub prediction: String,
    /// Ground-truth label when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub true_label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

impl PredictionRecord {
    pub fn model_key(&self) -> ModelKey {
        ModelKey::new(self.project_id.clone(), self.model_id.clone())
    }
}

/// A half-open time window `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        TimeWindow { start, end }
    }

    /// The window of `secs` seconds ending at `end`.
    pub fn ending_at(end: DateTime<Utc>, secs: u64) -> Self {
        TimeWindow {
            start: end - chrono::Duration::seconds(secs as i64),
            end,
        }
    }

    /// The window of `secs` seconds ending where this one starts.
    pub fn preceding(&self, secs: u64) -> Self {
        TimeWindow {
            start: self.start - chrono::Duration::seconds(secs as i64),
            end: self.start,
        }
    }

    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        ts >= self.start && ts < self.end
    }
}

// ---------------------------------------------------------------------------
// Evaluation records
// ---------------------------------------------------------------------------

/// Lifecycle of one evaluation run. Transitions are monotonic:
/// pending → running → {completed | failed}, never backwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl EvaluationStatus {
    /// Whether this status may transition to `next`.
    pub fn can_transition_to(&self, next: EvaluationStatus) -> bool {
        matches!(
            (self, next),
            (EvaluationStatus::Pending, EvaluationStatus::Running)
                | (EvaluationStatus::Running, EvaluationStatus::Completed)
                | (EvaluationStatus::Running, EvaluationStatus::Failed)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, EvaluationStatus::Completed | EvaluationStatus::Failed)
    }
}

/// One named metric inside an evaluation's detail map.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricDetail {
    pub name: String,
    pub value: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f64>,
    /// Per-feature or per-attribute breakdown.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub breakdown: Option<serde_json::Value>,
}

impl MetricDetail {
    pub fn new(name: impl Into<String>, value: f64) -> Self {
        MetricDetail {
            name: name.into(),
            value,
            threshold: None,
            breakdown: None,
        }
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = Some(threshold);
        self
    }

    pub fn with_breakdown(mut self, breakdown: impl Serialize) -> Self {
        self.breakdown = serde_json::to_value(breakdown).ok();
        self
    }
}

/// Failure diagnostics kept on a failed evaluation record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationError {
    pub code: u32,
    pub category: ErrorCategory,
    pub message: String,
}

impl From<&tw_common::Error> for EvaluationError {
    fn from(err: &tw_common::Error) -> Self {
        EvaluationError {
            code: err.code(),
            category: err.category(),
            message: err.to_string(),
        }
    }
}

/// Result of one evaluation run. Immutable once terminal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationRecord {
    pub schema_version: String,
    #[serde(flatten)]
    pub key: EvalKey,
    pub evaluation_id: EvaluationId,
    pub status: EvaluationStatus,
    /// Bounded [0, 1]; 1 = healthy. Meaningful only when completed.
    pub overall_score: f64,
    pub detail: Vec<MetricDetail>,
    pub recommendations: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<EvaluationError>,
    pub sample_size: usize,
    pub window: TimeWindow,
    pub timestamp: DateTime<Utc>,
}

impl EvaluationRecord {
    /// A fresh pending record for a claimed job.
    pub fn pending(key: EvalKey, window: TimeWindow, now: DateTime<Utc>) -> Self {
        EvaluationRecord {
            schema_version: SCHEMA_VERSION.to_string(),
            key,
            evaluation_id: EvaluationId::new(),
            status: EvaluationStatus::Pending,
            overall_score: 0.0,
            detail: Vec::new(),
            recommendations: Vec::new(),
            error: None,
            sample_size: 0,
            window,
            timestamp: now,
        }
    }
}

// ---------------------------------------------------------------------------
// Trust scores
// ---------------------------------------------------------------------------

/// Direction of the trust trend versus the previous score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Improving,
    Declining,
    Stable,
}

/// One aggregation result. The per-model history is append-only and
/// strictly time-ordered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrustScore {
    pub schema_version: String,
    #[serde(flatten)]
    pub model: ModelKey,
    /// Weighted aggregate in [0, 1].
    pub score: f64,
    /// Known component scores; failed or missing evaluation types are
    /// absent rather than defaulted.
    pub components: BTreeMap<EvaluationType, f64>,
    /// Evaluation IDs backing each component.
    pub component_evaluations: BTreeMap<EvaluationType, EvaluationId>,
    pub trend_direction: TrendDirection,
    /// Signed percent change versus the previous score.
    pub trend_percentage: f64,
    pub threshold: f64,
    pub alert_triggered: bool,
    pub timestamp: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Schedules
// ---------------------------------------------------------------------------

/// Scheduler state for one (project, model, evaluation_type) key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleState {
    Idle,
    Due,
    Running,
}

/// Per-key evaluation schedule. The claim (→ running) is a compare-and-set
/// against the store, so at most one worker executes a key at a time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationSchedule {
    #[serde(flatten)]
    pub key: EvalKey,
    pub cadence_secs: u64,
    pub is_active: bool,
    pub state: ScheduleState,
    pub next_run: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_completed: Option<DateTime<Utc>>,
}

impl EvaluationSchedule {
    pub fn new(key: EvalKey, cadence_secs: u64, next_run: DateTime<Utc>) -> Self {
        EvaluationSchedule {
            key,
            cadence_secs,
            is_active: true,
            state: ScheduleState::Idle,
            next_run,
            last_completed: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Alerts
// ---------------------------------------------------------------------------

/// What a rule or alert is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    TrustScore,
    Fairness,
    Drift,
    Robustness,
    Explainability,
}

impl From<EvaluationType> for AlertType {
    fn from(ty: EvaluationType) -> Self {
        match ty {
            EvaluationType::Fairness => AlertType::Fairness,
            EvaluationType::Drift => AlertType::Drift,
            EvaluationType::Robustness => AlertType::Robustness,
            EvaluationType::Explainability => AlertType::Explainability,
        }
    }
}

impl std::fmt::Display for AlertType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AlertType::TrustScore => "trust_score",
            AlertType::Fairness => "fairness",
            AlertType::Drift => "drift",
            AlertType::Robustness => "robustness",
            AlertType::Explainability => "explainability",
        };
        write!(f, "{}", s)
    }
}

/// Comparison operator in a rule condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonOp {
    Gt,
    Lt,
    Ge,
    Le,
    Eq,
    Ne,
}

impl ComparisonOp {
    pub fn evaluate(&self, value: f64, threshold: f64) -> bool {
        match self {
            ComparisonOp::Gt => value > threshold,
            ComparisonOp::Lt => value < threshold,
            ComparisonOp::Ge => value >= threshold,
            ComparisonOp::Le => value <= threshold,
            ComparisonOp::Eq => value == threshold,
            ComparisonOp::Ne => value != threshold,
        }
    }
}

/// A single (metric, operator, threshold) condition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertCondition {
    pub metric: String,
    pub op: ComparisonOp,
    pub threshold: f64,
    pub severity: Severity,
}

/// Delivery channel kind. The wire format is the notification
/// collaborator's concern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelType {
    Email,
    Webhook,
    Chat,
}

/// One configured delivery channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelConfig {
    pub channel_type: ChannelType,
    /// Recipient address, webhook URL, or chat target.
    pub target: String,
}

/// An operator-configured alert rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertRuleConfig {
    pub rule_id: String,
    pub name: String,
    #[serde(flatten)]
    pub model: ModelKey,
    pub alert_type: AlertType,
    pub condition: AlertCondition,
    pub channels: Vec<ChannelConfig>,
    pub is_active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_triggered: Option<DateTime<Utc>>,
}

/// Alert lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertStatus {
    Active,
    Acknowledged,
    Resolved,
    Suppressed,
}

/// A raised alert. Never deleted; status transitions only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub alert_id: String,
    #[serde(flatten)]
    pub model: ModelKey,
    pub alert_type: AlertType,
    pub severity: Severity,
    pub status: AlertStatus,
    pub is_suppressed: bool,
    pub escalation_level: u32,
    pub title: String,
    pub description: String,
    pub metric: String,
    pub metric_value: f64,
    pub threshold: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule_id: Option<String>,
    /// Consecutive non-triggering cycles, for auto-resolve.
    pub clean_cycles: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acknowledged_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acknowledged_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_by: Option<String>,
}

/// Delivery outcome for one channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Pending,
    Sent,
    Failed,
}

/// Per-channel notification record for an alert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertNotification {
    pub notification_id: String,
    pub alert_id: String,
    pub channel_type: ChannelType,
    pub target: String,
    pub status: DeliveryStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sent_at: Option<DateTime<Utc>>,
}

/// Operator-set, time-boxed alert suppression for a model key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Suppression {
    #[serde(flatten)]
    pub model: ModelKey,
    /// None suppresses all alert types for the model.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alert_type: Option<AlertType>,
    pub until: DateTime<Utc>,
    pub reason: String,
    pub set_by: String,
}
