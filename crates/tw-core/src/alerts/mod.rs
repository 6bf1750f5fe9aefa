//! Alert creation, escalation, suppression, and lifecycle.
//!
//! The engine consumes new trust scores and evaluation records, evaluates
//! the configured rules plus the built-in trust threshold, and maintains
//! alert state: a qualifying event that matches an open alert inside the
//! de-duplication window escalates it instead of duplicating, operator
//! suppressions park alerts without dispatching, and clean cycles can
//! auto-resolve when configured. Alerts are never deleted.

pub mod notify;

use chrono::{DateTime, Utc};
use std::sync::Arc;

use tracing::{error, info, warn};
use tw_common::{Error, ModelKey, Result, Severity};
use tw_config::AlertingConfig;

use crate::audit::{AuditEntry, AuditEvent, AuditSink};
use crate::schema::{
    Alert, AlertNotification, AlertStatus, AlertType, ChannelConfig, DeliveryStatus,
    EvaluationRecord, EvaluationStatus, TrustScore,
};
use crate::store::MonitorStore;

pub use notify::{LogNotifier, Notifier, RecordingNotifier};

/// A qualifying condition, before dedup and suppression are applied.
struct AlertEvent {
    model: ModelKey,
    alert_type: AlertType,
    severity: Severity,
    title: String,
    description: String,
    metric: String,
    metric_value: f64,
    threshold: f64,
    rule_id: Option<String>,
    channels: Vec<ChannelConfig>,
}

pub struct AlertEngine {
    store: Arc<MonitorStore>,
    config: AlertingConfig,
    notifier: Arc<dyn Notifier>,
    audit: Arc<dyn AuditSink>,
}

impl AlertEngine {
    pub fn new(
        store: Arc<MonitorStore>,
        config: AlertingConfig,
        notifier: Arc<dyn Notifier>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        AlertEngine {
            store,
            config,
            notifier,
            audit,
        }
    }

    /// React to a freshly aggregated trust score: the built-in threshold
    /// check plus any configured trust-score rules. A score that clears
    /// everything counts as a clean cycle for open trust alerts.
    pub fn process_trust_score(&self, score: &TrustScore, now: DateTime<Utc>) -> Result<()> {
        let mut fired = false;

        if score.alert_triggered {
            fired = true;
            self.raise(
                AlertEvent {
                    model: score.model.clone(),
                    alert_type: AlertType::TrustScore,
                    severity: trust_severity(score.score, score.threshold),
                    title: format!("trust score below threshold for {}", score.model),
                    description: format!(
                        "trust score {:.3} is below the {:.2} threshold (trend {:.1}%)",
                        score.score, score.threshold, score.trend_percentage
                    ),
                    metric: "trust_score".to_string(),
                    metric_value: score.score,
                    threshold: score.threshold,
                    rule_id: None,
                    channels: Vec::new(),
                },
                now,
            )?;
        }

        for rule in self
            .store
            .matching_rules(&score.model, AlertType::TrustScore)
        {
            if !rule.condition.op.evaluate(score.score, rule.condition.threshold) {
                continue;
            }
            if self.in_cooldown(&rule.last_triggered, now) {
                continue;
            }
            fired = true;
            self.store.mark_rule_triggered(&rule.rule_id, now);
            self.raise(
                AlertEvent {
                    model: score.model.clone(),
                    alert_type: AlertType::TrustScore,
                    severity: rule.condition.severity,
                    title: rule.name.clone(),
                    description: format!(
                        "rule '{}' matched: trust_score {:.3} {:?} {:.3}",
                        rule.name, score.score, rule.condition.op, rule.condition.threshold
                    ),
                    metric: rule.condition.metric.clone(),
                    metric_value: score.score,
                    threshold: rule.condition.threshold,
                    rule_id: Some(rule.rule_id.clone()),
                    channels: rule.channels.clone(),
                },
                now,
            )?;
        }

        if !fired {
            self.note_clean_cycle(&score.model, AlertType::TrustScore, now);
        }
        Ok(())
    }

    /// React to a completed evaluation record: rules for the record's
    /// evaluation type, matched against `overall_score` or a named detail
    /// metric. Failed records never fire rules.
    pub fn process_evaluation(&self, record: &EvaluationRecord, now: DateTime<Utc>) -> Result<()> {
        if record.status != EvaluationStatus::Completed {
            return Ok(());
        }
        let alert_type = AlertType::from(record.key.evaluation_type);
        let mut fired = false;

        for rule in self.store.matching_rules(&record.key.model, alert_type) {
            let Some(value) = metric_value(record, &rule.condition.metric) else {
                warn!(
                    rule_id = %rule.rule_id,
                    metric = %rule.condition.metric,
                    "rule metric absent from evaluation record"
                );
                continue;
            };
            if !rule.condition.op.evaluate(value, rule.condition.threshold) {
                continue;
            }
            if self.in_cooldown(&rule.last_triggered, now) {
                continue;
            }
            fired = true;
            self.store.mark_rule_triggered(&rule.rule_id, now);
            self.raise(
                AlertEvent {
                    model: record.key.model.clone(),
                    alert_type,
                    severity: rule.condition.severity,
                    title: rule.name.clone(),
                    description: format!(
                        "rule '{}' matched: {} {:.3} {:?} {:.3} on {} evaluation",
                        rule.name,
                        rule.condition.metric,
                        value,
                        rule.condition.op,
                        rule.condition.threshold,
                        record.key.evaluation_type
                    ),
                    metric: rule.condition.metric.clone(),
                    metric_value: value,
                    threshold: rule.condition.threshold,
                    rule_id: Some(rule.rule_id.clone()),
                    channels: rule.channels.clone(),
                },
                now,
            )?;
        }

        if !fired {
            self.note_clean_cycle(&record.key.model, alert_type, now);
        }
        Ok(())
    }

    /// Operator acknowledgement: active → acknowledged.
    pub fn acknowledge(&self, alert_id: &str, by: &str, now: DateTime<Utc>) -> Result<Alert> {
        let mut alert = self.get(alert_id)?;
        if alert.status != AlertStatus::Active {
            return Err(Error::Computation(format!(
                "cannot acknowledge alert {} in status {:?}",
                alert_id, alert.status
            )));
        }
        alert.status = AlertStatus::Acknowledged;
        alert.acknowledged_at = Some(now);
        alert.acknowledged_by = Some(by.to_string());
        alert.updated_at = now;
        self.store.update_alert(alert.clone());
        info!(alert_id, by, "alert acknowledged");
        Ok(alert)
    }

    /// Operator resolution: active or acknowledged → resolved.
    pub fn resolve(&self, alert_id: &str, by: &str, now: DateTime<Utc>) -> Result<Alert> {
        let mut alert = self.get(alert_id)?;
        if !matches!(
            alert.status,
            AlertStatus::Active | AlertStatus::Acknowledged
        ) {
            return Err(Error::Computation(format!(
                "cannot resolve alert {} in status {:?}",
                alert_id, alert.status
            )));
        }
        alert.status = AlertStatus::Resolved;
        alert.resolved_at = Some(now);
        alert.resolved_by = Some(by.to_string());
        alert.updated_at = now;
        self.store.update_alert(alert.clone());
        info!(alert_id, by, "alert resolved");
        self.record_audit(
            AuditEntry::new(AuditEvent::AlertResolved, alert.model.to_string(), now)
                .with_detail(serde_json::json!({
                    "alert_id": alert.alert_id,
                    "resolved_by": by,
                })),
        );
        Ok(alert)
    }

    fn get(&self, alert_id: &str) -> Result<Alert> {
        self.store
            .alert(alert_id)
            .ok_or_else(|| Error::Computation(format!("unknown alert: {}", alert_id)))
    }

    fn in_cooldown(&self, last_triggered: &Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
        last_triggered.is_some_and(|last| {
            now - last < chrono::Duration::seconds(self.config.cooldown_secs as i64)
        })
    }

    /// Create, escalate, or suppress depending on current state.
    fn raise(&self, event: AlertEvent, now: DateTime<Utc>) -> Result<()> {
        let dedup_window = chrono::Duration::seconds(self.config.dedup_window_secs as i64);
        if let Some(mut open) = self.store.open_alert(&event.model, event.alert_type) {
            if now - open.updated_at < dedup_window {
                open.severity = open.severity.escalated().max(event.severity);
                open.escalation_level += 1;
                open.metric_value = event.metric_value;
                open.clean_cycles = 0;
                open.updated_at = now;
                info!(
                    alert_id = %open.alert_id,
                    severity = %open.severity,
                    escalation_level = open.escalation_level,
                    "alert escalated"
                );
                self.store.update_alert(open.clone());
                self.record_audit(
                    AuditEntry::new(AuditEvent::AlertEscalated, open.model.to_string(), now)
                        .with_detail(serde_json::json!({
                            "alert_id": open.alert_id,
                            "severity": open.severity,
                            "escalation_level": open.escalation_level,
                        })),
                );
                self.dispatch(&open, &event.channels, now);
                return Ok(());
            }
        }

        let suppressed = self
            .store
            .is_suppressed(&event.model, event.alert_type, now);
        let alert = Alert {
            alert_id: uuid::Uuid::new_v4().to_string(),
            model: event.model,
            alert_type: event.alert_type,
            severity: event.severity,
            status: if suppressed {
                AlertStatus::Suppressed
            } else {
                AlertStatus::Active
            },
            is_suppressed: suppressed,
            escalation_level: 0,
            title: event.title,
            description: event.description,
            metric: event.metric,
            metric_value: event.metric_value,
            threshold: event.threshold,
            rule_id: event.rule_id,
            clean_cycles: 0,
            created_at: now,
            updated_at: now,
            acknowledged_at: None,
            acknowledged_by: None,
            resolved_at: None,
            resolved_by: None,
        };
        info!(
            alert_id = %alert.alert_id,
            model = %alert.model,
            alert_type = %alert.alert_type,
            severity = %alert.severity,
            suppressed,
            "alert created"
        );
        self.store.insert_alert(alert.clone());
        self.record_audit(
            AuditEntry::new(
                if suppressed {
                    AuditEvent::AlertSuppressed
                } else {
                    AuditEvent::AlertCreated
                },
                alert.model.to_string(),
                now,
            )
            .with_detail(serde_json::json!({
                "alert_id": alert.alert_id,
                "alert_type": alert.alert_type,
                "severity": alert.severity,
                "metric": alert.metric,
                "metric_value": alert.metric_value,
            })),
        );
        if !suppressed {
            self.dispatch(&alert, &event.channels, now);
        }
        Ok(())
    }

    /// One notification per channel; failures stay on the notification.
    fn dispatch(&self, alert: &Alert, channels: &[ChannelConfig], now: DateTime<Utc>) {
        for channel in channels {
            let mut notification = AlertNotification {
                notification_id: uuid::Uuid::new_v4().to_string(),
                alert_id: alert.alert_id.clone(),
                channel_type: channel.channel_type,
                target: channel.target.clone(),
                status: DeliveryStatus::Pending,
                error: None,
                created_at: now,
                sent_at: None,
            };
            match self.notifier.dispatch(alert, channel) {
                Ok(()) => {
                    notification.status = DeliveryStatus::Sent;
                    notification.sent_at = Some(now);
                }
                Err(e) => {
                    warn!(
                        alert_id = %alert.alert_id,
                        target = %channel.target,
                        error = %e,
                        "notification delivery failed"
                    );
                    notification.status = DeliveryStatus::Failed;
                    notification.error = Some(e.to_string());
                }
            }
            self.store.record_notification(notification);
        }
    }

    /// A cycle that raised nothing: bump clean cycles on the open alert and
    /// auto-resolve once the configured streak is reached.
    fn note_clean_cycle(&self, model: &ModelKey, alert_type: AlertType, now: DateTime<Utc>) {
        let Some(mut open) = self.store.open_alert(model, alert_type) else {
            return;
        };
        open.clean_cycles += 1;
        open.updated_at = now;
        let auto = self.config.auto_resolve_clean_cycles;
        if auto > 0 && open.clean_cycles >= auto {
            open.status = AlertStatus::Resolved;
            open.resolved_at = Some(now);
            open.resolved_by = Some("auto_resolve".to_string());
            info!(
                alert_id = %open.alert_id,
                clean_cycles = open.clean_cycles,
                "alert auto-resolved"
            );
            self.record_audit(
                AuditEntry::new(AuditEvent::AlertResolved, open.model.to_string(), now)
                    .with_detail(serde_json::json!({
                        "alert_id": open.alert_id,
                        "resolved_by": "auto_resolve",
                        "clean_cycles": open.clean_cycles,
                    })),
            );
        }
        self.store.update_alert(open);
    }

    fn record_audit(&self, entry: AuditEntry) {
        if let Err(e) = self.audit.record(entry) {
            error!(error = %e, "audit write failed");
        }
    }
}

/// Severity for the built-in trust threshold alert, by how far below the
/// threshold the score fell. The tolerance keeps bucket edges exact when
/// the f64 subtraction lands a hair under them (0.7 - 0.65 < 0.05).
fn trust_severity(score: f64, threshold: f64) -> Severity {
    const EDGE_TOLERANCE: f64 = 1e-9;
    let gap = threshold - score + EDGE_TOLERANCE;
    if gap >= 0.3 {
        Severity::Critical
    } else if gap >= 0.15 {
        Severity::High
    } else if gap >= 0.05 {
        Severity::Medium
    } else {
        Severity::Low
    }
}

/// Look up a rule's metric on a completed record: `overall_score` itself,
/// or a named entry in the detail list.
fn metric_value(record: &EvaluationRecord, metric: &str) -> Option<f64> {
    if metric == "overall_score" {
        return Some(record.overall_score);
    }
    record
        .detail
        .iter()
        .find(|d| d.name == metric)
        .map(|d| d.value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::MemoryAuditSink;
    use crate::schema::{
        AlertCondition, AlertRuleConfig, ChannelType, ComparisonOp, MetricDetail, TimeWindow,
        TrendDirection,
    };
    use chrono::TimeZone;
    use std::collections::BTreeMap;
    use tw_common::EvaluationType;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    fn model() -> ModelKey {
        ModelKey::new("proj", "model")
    }

    fn trust_score(score: f64) -> TrustScore {
        TrustScore {
            schema_version: crate::schema::SCHEMA_VERSION.to_string(),
            model: model(),
            score,
            components: BTreeMap::new(),
            component_evaluations: BTreeMap::new(),
            trend_direction: TrendDirection::Stable,
            trend_percentage: 0.0,
            threshold: 0.7,
            alert_triggered: score < 0.7,
            timestamp: now(),
        }
    }

    fn engine_with(
        config: AlertingConfig,
        notifier: Arc<dyn Notifier>,
    ) -> (Arc<MonitorStore>, AlertEngine) {
        let store = Arc::new(MonitorStore::new());
        let engine = AlertEngine::new(
            Arc::clone(&store),
            config,
            notifier,
            Arc::new(crate::audit::NullAuditSink),
        );
        (store, engine)
    }

    #[test]
    fn test_low_trust_creates_one_alert() {
        let (store, engine) =
            engine_with(AlertingConfig::default(), Arc::new(RecordingNotifier::new()));
        engine.process_trust_score(&trust_score(0.65), now()).unwrap();

        let alerts = store.alerts_for_model(&model());
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].alert_type, AlertType::TrustScore);
        assert_eq!(alerts[0].severity, Severity::Medium);
        assert_eq!(alerts[0].status, AlertStatus::Active);
    }

    #[test]
    fn test_duplicate_event_escalates() {
        let (store, engine) =
            engine_with(AlertingConfig::default(), Arc::new(RecordingNotifier::new()));
        engine.process_trust_score(&trust_score(0.65), now()).unwrap();
        engine
            .process_trust_score(&trust_score(0.60), now() + chrono::Duration::minutes(10))
            .unwrap();

        let alerts = store.alerts_for_model(&model());
        assert_eq!(alerts.len(), 1, "second event must not duplicate");
        assert_eq!(alerts[0].escalation_level, 1);
        assert_eq!(alerts[0].severity, Severity::High);
    }

    #[test]
    fn test_event_outside_dedup_window_creates_new_alert() {
        let (store, engine) =
            engine_with(AlertingConfig::default(), Arc::new(RecordingNotifier::new()));
        engine.process_trust_score(&trust_score(0.65), now()).unwrap();
        engine
            .process_trust_score(&trust_score(0.65), now() + chrono::Duration::hours(2))
            .unwrap();
        assert_eq!(store.alerts_for_model(&model()).len(), 2);
    }

    #[test]
    fn test_suppressed_alert_skips_dispatch() {
        let notifier = Arc::new(RecordingNotifier::new());
        let (store, engine) = engine_with(AlertingConfig::default(), notifier.clone());
        store.add_suppression(crate::schema::Suppression {
            model: model(),
            alert_type: None,
            until: now() + chrono::Duration::hours(1),
            reason: "maintenance".to_string(),
            set_by: "ops".to_string(),
        });
        store.upsert_rule(rule("r-1", 0.7));
        engine.process_trust_score(&trust_score(0.5), now()).unwrap();

        let alerts = store.alerts_for_model(&model());
        assert!(!alerts.is_empty());
        assert!(alerts.iter().all(|a| a.is_suppressed));
        assert!(notifier.dispatched().is_empty());
    }

    fn rule(rule_id: &str, threshold: f64) -> AlertRuleConfig {
        AlertRuleConfig {
            rule_id: rule_id.to_string(),
            name: format!("trust below {}", threshold),
            model: model(),
            alert_type: AlertType::TrustScore,
            condition: AlertCondition {
                metric: "trust_score".to_string(),
                op: ComparisonOp::Lt,
                threshold,
                severity: Severity::High,
            },
            channels: vec![ChannelConfig {
                channel_type: ChannelType::Email,
                target: "ops@example.com".to_string(),
            }],
            is_active: true,
            last_triggered: None,
        }
    }

    #[test]
    fn test_rule_cooldown_gates_refiring() {
        let (store, engine) = engine_with(
            AlertingConfig {
                dedup_window_secs: 1,
                cooldown_secs: 1800,
                auto_resolve_clean_cycles: 0,
            },
            Arc::new(RecordingNotifier::new()),
        );
        store.upsert_rule(rule("r-1", 0.8));
        // Score above the built-in 0.7 threshold so only the rule fires.
        engine.process_trust_score(&trust_score(0.75), now()).unwrap();
        engine
            .process_trust_score(&trust_score(0.75), now() + chrono::Duration::minutes(5))
            .unwrap();
        // Cooldown blocked the second firing; the dedup window is tiny so a
        // refire would have created a second alert.
        assert_eq!(store.alerts_for_model(&model()).len(), 1);

        engine
            .process_trust_score(&trust_score(0.75), now() + chrono::Duration::hours(1))
            .unwrap();
        assert_eq!(store.alerts_for_model(&model()).len(), 2);
    }

    #[test]
    fn test_rule_dispatch_records_notifications() {
        let notifier = Arc::new(RecordingNotifier::new());
        let (store, engine) = engine_with(AlertingConfig::default(), notifier.clone());
        store.upsert_rule(rule("r-1", 0.8));
        engine.process_trust_score(&trust_score(0.75), now()).unwrap();

        let alerts = store.alerts_for_model(&model());
        let sent = store.notifications_for_alert(&alerts[0].alert_id);
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].status, DeliveryStatus::Sent);
        assert_eq!(notifier.dispatched().len(), 1);
    }

    #[test]
    fn test_failed_dispatch_recorded_not_raised() {
        let (store, engine) = engine_with(
            AlertingConfig::default(),
            Arc::new(RecordingNotifier::failing()),
        );
        store.upsert_rule(rule("r-1", 0.8));
        engine.process_trust_score(&trust_score(0.75), now()).unwrap();

        let alerts = store.alerts_for_model(&model());
        assert_eq!(alerts[0].status, AlertStatus::Active);
        let sent = store.notifications_for_alert(&alerts[0].alert_id);
        assert_eq!(sent[0].status, DeliveryStatus::Failed);
        assert!(sent[0].error.is_some());
    }

    #[test]
    fn test_auto_resolve_after_clean_cycles() {
        let (store, engine) = engine_with(
            AlertingConfig {
                dedup_window_secs: 3600,
                cooldown_secs: 0,
                auto_resolve_clean_cycles: 2,
            },
            Arc::new(RecordingNotifier::new()),
        );
        engine.process_trust_score(&trust_score(0.65), now()).unwrap();
        let t1 = now() + chrono::Duration::hours(1);
        engine.process_trust_score(&trust_score(0.85), t1).unwrap();
        let open = store.open_alert(&model(), AlertType::TrustScore).unwrap();
        assert_eq!(open.clean_cycles, 1);

        let t2 = now() + chrono::Duration::hours(2);
        engine.process_trust_score(&trust_score(0.85), t2).unwrap();
        assert!(store.open_alert(&model(), AlertType::TrustScore).is_none());
    }

    #[test]
    fn test_acknowledge_then_resolve() {
        let (store, engine) =
            engine_with(AlertingConfig::default(), Arc::new(RecordingNotifier::new()));
        engine.process_trust_score(&trust_score(0.65), now()).unwrap();
        let alert_id = store.alerts_for_model(&model())[0].alert_id.clone();

        let acked = engine.acknowledge(&alert_id, "oncall", now()).unwrap();
        assert_eq!(acked.status, AlertStatus::Acknowledged);
        assert!(engine.acknowledge(&alert_id, "oncall", now()).is_err());

        let resolved = engine.resolve(&alert_id, "oncall", now()).unwrap();
        assert_eq!(resolved.status, AlertStatus::Resolved);
        assert!(engine.resolve(&alert_id, "oncall", now()).is_err());
    }

    #[test]
    fn test_trust_severity_tracks_threshold_gap() {
        assert_eq!(trust_severity(0.69, 0.7), Severity::Low);
        assert_eq!(trust_severity(0.65, 0.7), Severity::Medium);
        assert_eq!(trust_severity(0.55, 0.7), Severity::High);
        assert_eq!(trust_severity(0.40, 0.7), Severity::Critical);
    }

    fn completed_drift_record(overall: f64, psi: f64) -> EvaluationRecord {
        let key = model().eval_key(EvaluationType::Drift);
        let mut record =
            EvaluationRecord::pending(key, TimeWindow::ending_at(now(), 3600), now());
        record.status = EvaluationStatus::Completed;
        record.overall_score = overall;
        record.detail = vec![MetricDetail::new("psi:income", psi)];
        record
    }

    fn drift_rule(rule_id: &str, metric: &str, op: ComparisonOp, threshold: f64) -> AlertRuleConfig {
        AlertRuleConfig {
            rule_id: rule_id.to_string(),
            name: format!("drift {} breach", metric),
            model: model(),
            alert_type: AlertType::Drift,
            condition: AlertCondition {
                metric: metric.to_string(),
                op,
                threshold,
                severity: Severity::Medium,
            },
            channels: Vec::new(),
            is_active: true,
            last_triggered: None,
        }
    }

    #[test]
    fn test_evaluation_rule_on_overall_score() {
        let (store, engine) =
            engine_with(AlertingConfig::default(), Arc::new(RecordingNotifier::new()));
        store.upsert_rule(drift_rule("r-d1", "overall_score", ComparisonOp::Lt, 0.6));
        engine
            .process_evaluation(&completed_drift_record(0.4, 0.1), now())
            .unwrap();

        let alerts = store.alerts_for_model(&model());
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].alert_type, AlertType::Drift);
        assert_eq!(alerts[0].metric_value, 0.4);
    }

    #[test]
    fn test_evaluation_rule_on_detail_metric() {
        let (store, engine) =
            engine_with(AlertingConfig::default(), Arc::new(RecordingNotifier::new()));
        store.upsert_rule(drift_rule("r-d2", "psi:income", ComparisonOp::Gt, 0.25));
        engine
            .process_evaluation(&completed_drift_record(0.9, 0.31), now())
            .unwrap();

        let alerts = store.alerts_for_model(&model());
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].metric, "psi:income");
        assert_eq!(alerts[0].metric_value, 0.31);
    }

    #[test]
    fn test_evaluation_rule_with_absent_metric_is_skipped() {
        let (store, engine) =
            engine_with(AlertingConfig::default(), Arc::new(RecordingNotifier::new()));
        store.upsert_rule(drift_rule("r-d3", "psi:age", ComparisonOp::Gt, 0.25));
        engine
            .process_evaluation(&completed_drift_record(0.9, 0.31), now())
            .unwrap();
        assert!(store.alerts_for_model(&model()).is_empty());
    }

    #[test]
    fn test_alert_lifecycle_is_audited() {
        let store = Arc::new(MonitorStore::new());
        let audit = Arc::new(MemoryAuditSink::new());
        let engine = AlertEngine::new(
            Arc::clone(&store),
            AlertingConfig {
                dedup_window_secs: 3600,
                cooldown_secs: 0,
                auto_resolve_clean_cycles: 1,
            },
            Arc::new(RecordingNotifier::new()),
            audit.clone(),
        );
        engine.process_trust_score(&trust_score(0.65), now()).unwrap();
        engine
            .process_trust_score(&trust_score(0.60), now() + chrono::Duration::minutes(10))
            .unwrap();
        engine
            .process_trust_score(&trust_score(0.85), now() + chrono::Duration::minutes(20))
            .unwrap();

        let events: Vec<AuditEvent> = audit.entries().iter().map(|e| e.event).collect();
        assert_eq!(
            events,
            vec![
                AuditEvent::AlertCreated,
                AuditEvent::AlertEscalated,
                AuditEvent::AlertResolved,
            ]
        );
    }
}
