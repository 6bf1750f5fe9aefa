//! Storage for monitor state.
//!
//! Predictions come in through the read-only [`PredictionStore`] trait so
//! tests and the CLI can swap sources. Everything the pipeline writes
//! (evaluations, trust scores, schedules, alerts) lives in [`MonitorStore`],
//! a mutex-guarded in-process store. The per-key claim used by the scheduler
//! is a compare-and-set against the schedule row, taken under the same lock,
//! so two workers can never both move a key to running.

pub mod jsonl;
pub mod memory;

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;

use tw_common::{Error, EvalKey, EvaluationId, ModelKey, Result};

use crate::schema::{
    Alert, AlertNotification, AlertRuleConfig, AlertStatus, AlertType, EvaluationRecord,
    EvaluationSchedule, EvaluationStatus, PredictionRecord, ScheduleState, Suppression,
    TimeWindow, TrustScore,
};

pub use jsonl::{load_predictions, JsonlWriter};
pub use memory::InMemoryPredictionStore;

/// Read-only access to ingested predictions.
pub trait PredictionStore: Send + Sync {
    /// Predictions for one model inside a half-open window, in timestamp
    /// order.
    fn query(&self, model: &ModelKey, window: &TimeWindow) -> Result<Vec<PredictionRecord>>;
}

#[derive(Default)]
struct StoreInner {
    evaluations: HashMap<EvalKey, Vec<EvaluationRecord>>,
    trust_scores: HashMap<ModelKey, Vec<TrustScore>>,
    schedules: HashMap<EvalKey, EvaluationSchedule>,
    /// Evaluation currently holding each key's claim.
    running: HashMap<EvalKey, EvaluationId>,
    alerts: HashMap<String, Alert>,
    rules: HashMap<String, AlertRuleConfig>,
    notifications: Vec<AlertNotification>,
    suppressions: Vec<Suppression>,
}

/// In-process store for everything the pipeline writes.
#[derive(Default)]
pub struct MonitorStore {
    inner: Mutex<StoreInner>,
}

impl MonitorStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, StoreInner> {
        // Mutex poisoning would mean a panicked writer; the surviving state
        // is still consistent because every mutation completes under the lock.
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    // -- evaluations --------------------------------------------------------

    /// Insert a fresh evaluation record or apply a status update to an
    /// existing one. Status transitions must be monotonic; anything else is
    /// rejected without touching the stored record.
    pub fn put_evaluation(&self, record: EvaluationRecord) -> Result<()> {
        let mut inner = self.lock();
        let records = inner.evaluations.entry(record.key.clone()).or_default();
        if let Some(existing) = records
            .iter_mut()
            .find(|r| r.evaluation_id == record.evaluation_id)
        {
            if existing.status != record.status
                && !existing.status.can_transition_to(record.status)
            {
                return Err(Error::Computation(format!(
                    "invalid evaluation status transition {:?} -> {:?} for {}",
                    existing.status, record.status, record.evaluation_id
                )));
            }
            *existing = record;
        } else {
            records.push(record);
        }
        Ok(())
    }

    /// The most recent completed evaluation for a key, if any.
    pub fn latest_completed_evaluation(&self, key: &EvalKey) -> Option<EvaluationRecord> {
        let inner = self.lock();
        inner
            .evaluations
            .get(key)?
            .iter()
            .filter(|r| r.status == EvaluationStatus::Completed)
            .max_by_key(|r| r.timestamp)
            .cloned()
    }

    /// All evaluation records for a key, oldest first.
    pub fn evaluations_for(&self, key: &EvalKey) -> Vec<EvaluationRecord> {
        let inner = self.lock();
        inner.evaluations.get(key).cloned().unwrap_or_default()
    }

    // -- trust scores -------------------------------------------------------

    /// Append a trust score to the model's history. The history is strictly
    /// time-ordered; an out-of-order append is rejected.
    pub fn append_trust_score(&self, score: TrustScore) -> Result<()> {
        let mut inner = self.lock();
        let history = inner.trust_scores.entry(score.model.clone()).or_default();
        if let Some(last) = history.last() {
            if score.timestamp <= last.timestamp {
                return Err(Error::Computation(format!(
                    "trust score for {} at {} is not after the latest at {}",
                    score.model, score.timestamp, last.timestamp
                )));
            }
        }
        history.push(score);
        Ok(())
    }

    /// The latest trust score for a model.
    pub fn latest_trust_score(&self, model: &ModelKey) -> Option<TrustScore> {
        let inner = self.lock();
        inner.trust_scores.get(model)?.last().cloned()
    }

    /// Up to `limit` most recent trust scores, newest first.
    pub fn trust_score_history(&self, model: &ModelKey, limit: usize) -> Vec<TrustScore> {
        let inner = self.lock();
        let Some(history) = inner.trust_scores.get(model) else {
            return Vec::new();
        };
        history.iter().rev().take(limit).cloned().collect()
    }

    // -- schedules ----------------------------------------------------------

    /// Create or replace a schedule row. An existing running claim survives
    /// the upsert so the current job's release still finds it.
    pub fn upsert_schedule(&self, schedule: EvaluationSchedule) {
        let mut inner = self.lock();
        let key = schedule.key.clone();
        match inner.schedules.get_mut(&key) {
            Some(existing) if existing.state == ScheduleState::Running => {
                existing.cadence_secs = schedule.cadence_secs;
                existing.is_active = schedule.is_active;
            }
            _ => {
                inner.schedules.insert(key, schedule);
            }
        }
    }

    pub fn schedule(&self, key: &EvalKey) -> Option<EvaluationSchedule> {
        self.lock().schedules.get(key).cloned()
    }

    pub fn all_schedules(&self) -> Vec<EvaluationSchedule> {
        self.lock().schedules.values().cloned().collect()
    }

    /// Keys whose next_run has passed and are not already running.
    pub fn due_keys(&self, now: DateTime<Utc>) -> Vec<EvalKey> {
        let mut inner = self.lock();
        let mut due = Vec::new();
        for schedule in inner.schedules.values_mut() {
            if schedule.is_active
                && schedule.state != ScheduleState::Running
                && schedule.next_run <= now
            {
                schedule.state = ScheduleState::Due;
                due.push(schedule.key.clone());
            }
        }
        due.sort_by_key(|k| k.to_string());
        due
    }

    /// Pull a key's next run forward to `now`. Refused with `Ok(false)`
    /// while the key is running, since a release would overwrite the write
    /// with `now + cadence` and the request would be lost.
    pub fn advance_next_run(&self, key: &EvalKey, now: DateTime<Utc>) -> Result<bool> {
        let mut inner = self.lock();
        let schedule = inner
            .schedules
            .get_mut(key)
            .filter(|s| s.is_active)
            .ok_or_else(|| Error::ScheduleNotFound {
                key: key.to_string(),
            })?;
        if schedule.state == ScheduleState::Running {
            return Ok(false);
        }
        schedule.next_run = now;
        Ok(true)
    }

    /// Atomically claim a key for execution. Exactly one caller wins for a
    /// concurrently contested key; the rest get [`Error::ClaimConflict`].
    /// The winner's claim is tagged with `evaluation_id` so a stale release
    /// from an earlier job cannot free a newer claim.
    pub fn try_claim(
        &self,
        key: &EvalKey,
        evaluation_id: &EvaluationId,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let mut inner = self.lock();
        let schedule = inner
            .schedules
            .get_mut(key)
            .ok_or_else(|| Error::ScheduleNotFound {
                key: key.to_string(),
            })?;
        if !schedule.is_active {
            return Err(Error::ScheduleNotFound {
                key: key.to_string(),
            });
        }
        if schedule.state == ScheduleState::Running {
            return Err(Error::ClaimConflict {
                key: key.to_string(),
            });
        }
        if schedule.next_run > now {
            return Err(Error::ClaimConflict {
                key: key.to_string(),
            });
        }
        schedule.state = ScheduleState::Running;
        inner.running.insert(key.clone(), evaluation_id.clone());
        Ok(())
    }

    /// Release a claim and advance the cadence. No-op if `evaluation_id`
    /// does not hold the claim.
    pub fn release_claim(
        &self,
        key: &EvalKey,
        evaluation_id: &EvaluationId,
        now: DateTime<Utc>,
        completed: bool,
    ) {
        let mut inner = self.lock();
        match inner.running.get(key) {
            Some(holder) if holder == evaluation_id => {
                inner.running.remove(key);
            }
            _ => return,
        }
        if let Some(schedule) = inner.schedules.get_mut(key) {
            schedule.state = ScheduleState::Idle;
            schedule.next_run = now + chrono::Duration::seconds(schedule.cadence_secs as i64);
            if completed {
                schedule.last_completed = Some(now);
            }
        }
    }

    /// The evaluation currently holding a key's claim.
    pub fn running_evaluation(&self, key: &EvalKey) -> Option<EvaluationId> {
        self.lock().running.get(key).cloned()
    }

    // -- alerts -------------------------------------------------------------

    pub fn insert_alert(&self, alert: Alert) {
        self.lock().alerts.insert(alert.alert_id.clone(), alert);
    }

    pub fn update_alert(&self, alert: Alert) {
        self.lock().alerts.insert(alert.alert_id.clone(), alert);
    }

    pub fn alert(&self, alert_id: &str) -> Option<Alert> {
        self.lock().alerts.get(alert_id).cloned()
    }

    /// The open (active or acknowledged) alert for a model and alert type,
    /// if one exists. Dedup keys on this lookup.
    pub fn open_alert(&self, model: &ModelKey, alert_type: AlertType) -> Option<Alert> {
        let inner = self.lock();
        inner
            .alerts
            .values()
            .filter(|a| {
                a.model == *model
                    && a.alert_type == alert_type
                    && matches!(a.status, AlertStatus::Active | AlertStatus::Acknowledged)
            })
            .max_by_key(|a| a.created_at)
            .cloned()
    }

    pub fn alerts_for_model(&self, model: &ModelKey) -> Vec<Alert> {
        let inner = self.lock();
        let mut alerts: Vec<Alert> = inner
            .alerts
            .values()
            .filter(|a| a.model == *model)
            .cloned()
            .collect();
        alerts.sort_by_key(|a| a.created_at);
        alerts
    }

    // -- rules --------------------------------------------------------------

    pub fn upsert_rule(&self, rule: AlertRuleConfig) {
        self.lock().rules.insert(rule.rule_id.clone(), rule);
    }

    /// Active rules matching a model and alert type.
    pub fn matching_rules(&self, model: &ModelKey, alert_type: AlertType) -> Vec<AlertRuleConfig> {
        let inner = self.lock();
        let mut rules: Vec<AlertRuleConfig> = inner
            .rules
            .values()
            .filter(|r| r.is_active && r.model == *model && r.alert_type == alert_type)
            .cloned()
            .collect();
        rules.sort_by(|a, b| a.rule_id.cmp(&b.rule_id));
        rules
    }

    /// Record that a rule fired, for cooldown tracking.
    pub fn mark_rule_triggered(&self, rule_id: &str, now: DateTime<Utc>) {
        if let Some(rule) = self.lock().rules.get_mut(rule_id) {
            rule.last_triggered = Some(now);
        }
    }

    // -- notifications ------------------------------------------------------

    pub fn record_notification(&self, notification: AlertNotification) {
        self.lock().notifications.push(notification);
    }

    pub fn notifications_for_alert(&self, alert_id: &str) -> Vec<AlertNotification> {
        let inner = self.lock();
        inner
            .notifications
            .iter()
            .filter(|n| n.alert_id == alert_id)
            .cloned()
            .collect()
    }

    // -- suppressions -------------------------------------------------------

    pub fn add_suppression(&self, suppression: Suppression) {
        self.lock().suppressions.push(suppression);
    }

    /// Whether alerts of this type are currently suppressed for the model.
    pub fn is_suppressed(
        &self,
        model: &ModelKey,
        alert_type: AlertType,
        now: DateTime<Utc>,
    ) -> bool {
        let inner = self.lock();
        inner.suppressions.iter().any(|s| {
            s.model == *model
                && s.until > now
                && s.alert_type.map_or(true, |ty| ty == alert_type)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{EvaluationRecord, TimeWindow};
    use chrono::TimeZone;
    use std::collections::BTreeMap;
    use std::sync::Arc;
    use tw_common::{EvaluationType, Severity};

    fn key() -> EvalKey {
        ModelKey::new("proj", "model").eval_key(EvaluationType::Drift)
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    fn window() -> TimeWindow {
        TimeWindow::ending_at(now(), 3600)
    }

    #[test]
    fn test_evaluation_status_regression_rejected() {
        let store = MonitorStore::new();
        let mut record = EvaluationRecord::pending(key(), window(), now());
        store.put_evaluation(record.clone()).unwrap();

        record.status = EvaluationStatus::Running;
        store.put_evaluation(record.clone()).unwrap();
        record.status = EvaluationStatus::Completed;
        store.put_evaluation(record.clone()).unwrap();

        record.status = EvaluationStatus::Running;
        assert!(store.put_evaluation(record.clone()).is_err());
        let stored = store.latest_completed_evaluation(&key()).unwrap();
        assert_eq!(stored.status, EvaluationStatus::Completed);
    }

    #[test]
    fn test_trust_history_strictly_ordered() {
        let store = MonitorStore::new();
        let model = ModelKey::new("proj", "model");
        let score = |ts: DateTime<Utc>| TrustScore {
            schema_version: crate::schema::SCHEMA_VERSION.to_string(),
            model: model.clone(),
            score: 0.8,
            components: BTreeMap::new(),
            component_evaluations: BTreeMap::new(),
            trend_direction: crate::schema::TrendDirection::Stable,
            trend_percentage: 0.0,
            threshold: 0.7,
            alert_triggered: false,
            timestamp: ts,
        };
        store.append_trust_score(score(now())).unwrap();
        assert!(store.append_trust_score(score(now())).is_err());
        store
            .append_trust_score(score(now() + chrono::Duration::seconds(1)))
            .unwrap();
        assert_eq!(store.trust_score_history(&model, 10).len(), 2);
    }

    #[test]
    fn test_claim_is_exclusive() {
        let store = MonitorStore::new();
        store.upsert_schedule(EvaluationSchedule::new(key(), 3600, now()));

        let winner = EvaluationId::new();
        let loser = EvaluationId::new();
        store.try_claim(&key(), &winner, now()).unwrap();
        let err = store.try_claim(&key(), &loser, now()).unwrap_err();
        assert!(matches!(err, Error::ClaimConflict { .. }));

        // Stale release from the loser must not free the winner's claim.
        store.release_claim(&key(), &loser, now(), true);
        assert_eq!(store.running_evaluation(&key()), Some(winner.clone()));

        store.release_claim(&key(), &winner, now(), true);
        assert!(store.running_evaluation(&key()).is_none());
        let schedule = store.schedule(&key()).unwrap();
        assert_eq!(schedule.state, ScheduleState::Idle);
        assert_eq!(schedule.next_run, now() + chrono::Duration::seconds(3600));
        assert_eq!(schedule.last_completed, Some(now()));
    }

    #[test]
    fn test_concurrent_claims_single_winner() {
        let store = Arc::new(MonitorStore::new());
        store.upsert_schedule(EvaluationSchedule::new(key(), 3600, now()));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    store.try_claim(&key(), &EvaluationId::new(), now()).is_ok()
                })
            })
            .collect();
        let wins: usize = handles
            .into_iter()
            .map(|h| h.join().unwrap_or(false))
            .filter(|&won| won)
            .count();
        assert_eq!(wins, 1);
    }

    #[test]
    fn test_advance_next_run_refused_while_running() {
        let store = MonitorStore::new();
        store.upsert_schedule(EvaluationSchedule::new(key(), 3600, now()));
        let id = EvaluationId::new();
        store.try_claim(&key(), &id, now()).unwrap();
        assert!(!store.advance_next_run(&key(), now()).unwrap());

        store.release_claim(&key(), &id, now(), true);
        let later = now() + chrono::Duration::minutes(5);
        assert!(store.advance_next_run(&key(), later).unwrap());
        assert_eq!(store.schedule(&key()).unwrap().next_run, later);
    }

    #[test]
    fn test_claim_respects_next_run() {
        let store = MonitorStore::new();
        let future = now() + chrono::Duration::hours(1);
        store.upsert_schedule(EvaluationSchedule::new(key(), 3600, future));
        let err = store
            .try_claim(&key(), &EvaluationId::new(), now())
            .unwrap_err();
        assert!(matches!(err, Error::ClaimConflict { .. }));
    }

    #[test]
    fn test_upsert_preserves_running_claim() {
        let store = MonitorStore::new();
        store.upsert_schedule(EvaluationSchedule::new(key(), 3600, now()));
        let id = EvaluationId::new();
        store.try_claim(&key(), &id, now()).unwrap();

        let mut replacement = EvaluationSchedule::new(key(), 7200, now());
        replacement.state = ScheduleState::Idle;
        store.upsert_schedule(replacement);

        let schedule = store.schedule(&key()).unwrap();
        assert_eq!(schedule.state, ScheduleState::Running);
        assert_eq!(schedule.cadence_secs, 7200);
    }

    #[test]
    fn test_open_alert_ignores_resolved() {
        let store = MonitorStore::new();
        let model = ModelKey::new("proj", "model");
        let mut alert = Alert {
            alert_id: "a-1".to_string(),
            model: model.clone(),
            alert_type: AlertType::Drift,
            severity: Severity::Medium,
            status: AlertStatus::Resolved,
            is_suppressed: false,
            escalation_level: 0,
            title: "drift".to_string(),
            description: String::new(),
            metric: "overall_score".to_string(),
            metric_value: 0.4,
            threshold: 0.6,
            rule_id: None,
            clean_cycles: 0,
            created_at: now(),
            updated_at: now(),
            acknowledged_at: None,
            acknowledged_by: None,
            resolved_at: Some(now()),
            resolved_by: None,
        };
        store.insert_alert(alert.clone());
        assert!(store.open_alert(&model, AlertType::Drift).is_none());

        alert.alert_id = "a-2".to_string();
        alert.status = AlertStatus::Active;
        alert.resolved_at = None;
        alert.created_at = now() + chrono::Duration::seconds(5);
        store.insert_alert(alert);
        let open = store.open_alert(&model, AlertType::Drift).unwrap();
        assert_eq!(open.alert_id, "a-2");
    }

    #[test]
    fn test_suppression_scoping() {
        let store = MonitorStore::new();
        let model = ModelKey::new("proj", "model");
        store.add_suppression(Suppression {
            model: model.clone(),
            alert_type: Some(AlertType::Drift),
            until: now() + chrono::Duration::hours(1),
            reason: "planned retrain".to_string(),
            set_by: "ops".to_string(),
        });
        assert!(store.is_suppressed(&model, AlertType::Drift, now()));
        assert!(!store.is_suppressed(&model, AlertType::Fairness, now()));
        assert!(!store.is_suppressed(
            &model,
            AlertType::Drift,
            now() + chrono::Duration::hours(2)
        ));
    }
}
