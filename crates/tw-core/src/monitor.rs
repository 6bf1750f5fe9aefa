//! Pipeline orchestration.
//!
//! One [`Monitor`] owns the store, scheduler, alert engine, and audit sink,
//! and drives the cycle: find due keys, run their evaluations on the worker
//! pool, aggregate trust per model, and feed results to the alert engine.
//! Each evaluation job is claimed, executed, persisted, and released as a
//! unit; a claim lost to a concurrent worker is a silent skip.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{debug, error, info, warn};
use tw_common::{Error, EvalKey, ModelKey, Result};
use tw_config::MonitorConfig;

use crate::alerts::{AlertEngine, Notifier};
use crate::audit::{AuditEntry, AuditEvent, AuditSink};
use crate::engines::{run_evaluation, EngineContext};
use crate::registry::ModelRegistry;
use crate::scheduler::{CancelToken, EvalJob, JobOutcome, JobRunner, Scheduler, WorkerPool};
use crate::schema::{
    EvaluationError, EvaluationRecord, EvaluationSchedule, EvaluationStatus, TimeWindow,
};
use crate::store::{MonitorStore, PredictionStore};
use crate::trust;

/// Outcome counts for one monitor cycle.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CycleSummary {
    pub due: usize,
    pub completed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub trust_scores: usize,
}

pub struct Monitor {
    store: Arc<MonitorStore>,
    predictions: Arc<dyn PredictionStore>,
    registry: Arc<dyn ModelRegistry>,
    config: MonitorConfig,
    models: Vec<ModelKey>,
    scheduler: Scheduler,
    alerts: AlertEngine,
    audit: Arc<dyn AuditSink>,
}

impl Monitor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<MonitorStore>,
        predictions: Arc<dyn PredictionStore>,
        registry: Arc<dyn ModelRegistry>,
        config: MonitorConfig,
        models: Vec<ModelKey>,
        notifier: Arc<dyn Notifier>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        let scheduler = Scheduler::new(Arc::clone(&store), config.schedule.clone());
        let alerts = AlertEngine::new(
            Arc::clone(&store),
            config.alerting.clone(),
            notifier,
            Arc::clone(&audit),
        );
        Monitor {
            store,
            predictions,
            registry,
            config,
            models,
            scheduler,
            alerts,
            audit,
        }
    }

    pub fn store(&self) -> &Arc<MonitorStore> {
        &self.store
    }

    pub fn alerts(&self) -> &AlertEngine {
        &self.alerts
    }

    pub fn trust_config(&self) -> &tw_config::TrustConfig {
        &self.config.trust
    }

    pub fn evaluation_config(&self) -> &tw_config::EvaluationConfig {
        &self.config.evaluation
    }

    pub fn schedule_config(&self) -> &tw_config::ScheduleConfig {
        &self.config.schedule
    }

    /// Materialize schedules for every registered model and return the
    /// current cadence plan.
    pub fn schedules(&self, now: DateTime<Utc>) -> Vec<EvaluationSchedule> {
        self.scheduler.ensure_schedules(&self.models, now);
        self.store.all_schedules()
    }

    /// Request an on-demand evaluation. `token` de-duplicates repeated
    /// requests; a duplicate inside the pending window returns `false`.
    pub fn request_evaluation(
        &self,
        key: &EvalKey,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        self.scheduler.request_run(key, token, now)
    }

    /// Run one full cycle at logical time `now`: due keys on the worker
    /// pool, then one trust aggregation per model that completed work.
    pub fn run_cycle(self: &Arc<Self>, now: DateTime<Utc>) -> CycleSummary {
        self.scheduler.ensure_schedules(&self.models, now);
        let due = self.scheduler.due_keys(now);
        let mut summary = CycleSummary {
            due: due.len(),
            ..CycleSummary::default()
        };
        if due.is_empty() {
            debug!("no evaluations due");
            return summary;
        }
        info!(due = due.len(), "cycle started");

        let pool = WorkerPool::new(
            self.config.schedule.workers,
            Arc::clone(self) as Arc<dyn JobRunner>,
        );
        let window = TimeWindow::ending_at(now, self.config.evaluation.window_secs);
        let mut submitted = 0;
        for key in due {
            let job = EvalJob {
                key,
                window,
                requested_at: now,
            };
            match pool.submit(job) {
                Ok(()) => submitted += 1,
                Err(e) => error!(error = %e, "failed to submit evaluation job"),
            }
        }

        let mut touched_models = BTreeSet::new();
        for outcome in pool.collect_outcomes(submitted) {
            match &outcome.result {
                Ok(()) => {
                    summary.completed += 1;
                    touched_models.insert(outcome.key.model.to_string());
                }
                Err(Error::ClaimConflict { .. }) => summary.skipped += 1,
                Err(e) => {
                    summary.failed += 1;
                    warn!(key = %outcome.key, error = %e, "evaluation failed");
                    touched_models.insert(outcome.key.model.to_string());
                }
            }
        }
        pool.shutdown();

        for model in &self.models {
            if !touched_models.contains(&model.to_string()) {
                continue;
            }
            match self.aggregate_model(model, now) {
                Ok(true) => summary.trust_scores += 1,
                Ok(false) => {}
                Err(e) => error!(model = %model, error = %e, "trust aggregation failed"),
            }
        }

        info!(
            completed = summary.completed,
            failed = summary.failed,
            skipped = summary.skipped,
            trust_scores = summary.trust_scores,
            "cycle finished"
        );
        summary
    }

    /// Keep running cycles every `poll_interval` until `max_cycles` is
    /// reached (forever when `None`).
    pub fn run(self: &Arc<Self>, poll_interval: std::time::Duration, max_cycles: Option<u64>) {
        let run_id = crate::logging::generate_run_id();
        info!(
            run_id = %run_id,
            poll_secs = poll_interval.as_secs(),
            models = self.models.len(),
            "monitor loop started"
        );
        let mut cycles = 0u64;
        loop {
            self.run_cycle(Utc::now());
            cycles += 1;
            if max_cycles.is_some_and(|max| cycles >= max) {
                break;
            }
            std::thread::sleep(poll_interval);
        }
    }

    /// Aggregate and persist the model's trust score, then hand it to the
    /// alert engine. `Ok(false)` means no component has ever completed.
    fn aggregate_model(&self, model: &ModelKey, now: DateTime<Utc>) -> Result<bool> {
        let score = match trust::aggregate(&self.store, &self.config.trust, model, now) {
            Ok(score) => score,
            Err(Error::NoData { .. }) => return Ok(false),
            Err(e) => return Err(e),
        };
        self.store.append_trust_score(score.clone())?;
        self.record_audit(
            AuditEntry::new(AuditEvent::TrustScoreComputed, model.to_string(), now)
                .with_detail(serde_json::json!({
                    "score": score.score,
                    "components": score.components,
                    "trend_direction": score.trend_direction,
                    "trend_percentage": score.trend_percentage,
                    "alert_triggered": score.alert_triggered,
                })),
        );
        self.alerts.process_trust_score(&score, now)?;
        Ok(true)
    }

    /// Run one evaluation end to end at logical time `now`. Exposed for
    /// the CLI's single-shot mode; the worker pool goes through the same
    /// path via [`JobRunner`].
    pub fn execute_job(&self, job: EvalJob) -> Result<EvaluationRecord> {
        let now = job.requested_at;
        let mut record = EvaluationRecord::pending(job.key.clone(), job.window, now);

        if let Err(e) = self.store.try_claim(&job.key, &record.evaluation_id, now) {
            if matches!(e, Error::ClaimConflict { .. }) {
                debug!(key = %job.key, "claim lost, skipping");
                self.record_audit(AuditEntry::new(
                    AuditEvent::EvaluationSkipped,
                    job.key.to_string(),
                    now,
                ));
            }
            return Err(e);
        }

        self.store.put_evaluation(record.clone())?;
        record.status = EvaluationStatus::Running;
        self.store.put_evaluation(record.clone())?;
        self.record_audit(AuditEntry::new(
            AuditEvent::EvaluationStarted,
            job.key.to_string(),
            now,
        ));

        let cancel = CancelToken::with_timeout(std::time::Duration::from_secs(
            self.config.schedule.job_timeout_secs,
        ));
        let ctx = EngineContext {
            predictions: self.predictions.as_ref(),
            registry: self.registry.as_ref(),
            config: &self.config.evaluation,
            cancel: &cancel,
            scorer: None,
        };

        match run_evaluation(&ctx, &job.key, job.window) {
            Ok(outcome) => {
                record.status = EvaluationStatus::Completed;
                record.overall_score = outcome.overall_score;
                record.detail = outcome.detail;
                record.recommendations = outcome.recommendations;
                record.sample_size = outcome.sample_size;
                self.store.put_evaluation(record.clone())?;
                self.store
                    .release_claim(&job.key, &record.evaluation_id, now, true);
                self.record_audit(
                    AuditEntry::new(AuditEvent::EvaluationCompleted, job.key.to_string(), now)
                        .with_detail(serde_json::json!({
                            "evaluation_id": record.evaluation_id,
                            "overall_score": record.overall_score,
                            "sample_size": record.sample_size,
                        })),
                );
                self.alerts.process_evaluation(&record, now)?;
                Ok(record)
            }
            Err(e) => {
                record.status = EvaluationStatus::Failed;
                record.error = Some(EvaluationError::from(&e));
                let evaluation_id = record.evaluation_id.clone();
                self.store.put_evaluation(record)?;
                self.store.release_claim(&job.key, &evaluation_id, now, false);
                self.record_audit(
                    AuditEntry::new(AuditEvent::EvaluationFailed, job.key.to_string(), now)
                        .with_detail(e.to_json()),
                );
                Err(e)
            }
        }
    }

    fn record_audit(&self, entry: AuditEntry) {
        if let Err(e) = self.audit.record(entry) {
            error!(error = %e, "audit write failed");
        }
    }
}

impl JobRunner for Monitor {
    fn run(&self, job: EvalJob) -> JobOutcome {
        let key = job.key.clone();
        let result = self.execute_job(job).map(|_| ());
        JobOutcome { key, result }
    }
}
