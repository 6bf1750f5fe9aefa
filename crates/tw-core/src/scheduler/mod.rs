//! Cadence scheduling.
//!
//! Every (project, model, evaluation type) key owns an independent schedule
//! row. The scheduler decides which keys are due; the actual exclusivity
//! guarantee lives in the store's compare-and-set claim, so concurrent
//! schedulers or workers cannot double-run a key.

pub mod worker;

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tracing::{debug, info};
use tw_common::{Error, EvalKey, EvaluationType, ModelKey, Result};
use tw_config::ScheduleConfig;

use crate::schema::EvaluationSchedule;
use crate::store::MonitorStore;

pub use worker::{EvalJob, JobOutcome, JobRunner, WorkerPool};

/// Cooperative cancellation handle checked at engine boundaries.
///
/// Carries both an explicit cancel flag and an optional deadline; a job that
/// overruns its deadline fails with `EvaluationTimeout` at the next check
/// and releases its claim like any other failure.
#[derive(Clone)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
    deadline: Option<Instant>,
    timeout_secs: u64,
}

impl CancelToken {
    /// A token that never cancels; used by the CLI and tests.
    pub fn unlimited() -> Self {
        CancelToken {
            flag: Arc::new(AtomicBool::new(false)),
            deadline: None,
            timeout_secs: 0,
        }
    }

    /// A token that trips once `timeout` has elapsed.
    pub fn with_timeout(timeout: Duration) -> Self {
        CancelToken {
            flag: Arc::new(AtomicBool::new(false)),
            deadline: Some(Instant::now() + timeout),
            timeout_secs: timeout.as_secs(),
        }
    }

    /// Request cancellation; the running job fails at its next check.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Fail fast if cancelled or past the deadline.
    pub fn check(&self) -> Result<()> {
        if self.flag.load(Ordering::SeqCst) {
            return Err(Error::Cancelled);
        }
        if let Some(deadline) = self.deadline {
            if Instant::now() > deadline {
                return Err(Error::EvaluationTimeout {
                    seconds: self.timeout_secs,
                });
            }
        }
        Ok(())
    }
}

/// Decides which evaluation keys are due and accepts on-demand requests.
pub struct Scheduler {
    store: Arc<MonitorStore>,
    config: ScheduleConfig,
    /// Idempotency tokens for on-demand requests, with the time each was
    /// first seen. A repeated token inside the pending window is a no-op.
    tokens: Mutex<HashMap<String, DateTime<Utc>>>,
}

/// How long an idempotency token stays effective.
const TOKEN_WINDOW_SECS: i64 = 3600;

impl Scheduler {
    pub fn new(store: Arc<MonitorStore>, config: ScheduleConfig) -> Self {
        Scheduler {
            store,
            config,
            tokens: Mutex::new(HashMap::new()),
        }
    }

    /// Make sure every evaluation type of each model has a schedule row,
    /// first run due immediately. Existing rows keep their cadence.
    pub fn ensure_schedules(&self, models: &[ModelKey], now: DateTime<Utc>) {
        for model in models {
            for ty in EvaluationType::ALL {
                let key = model.eval_key(ty);
                if self.store.schedule(&key).is_none() {
                    let cadence = self.config.cadence(ty).as_secs();
                    self.store
                        .upsert_schedule(EvaluationSchedule::new(key.clone(), cadence, now));
                    debug!(key = %key, cadence_secs = cadence, "schedule created");
                }
            }
        }
    }

    /// Keys whose next_run has passed, in deterministic order.
    pub fn due_keys(&self, now: DateTime<Utc>) -> Vec<EvalKey> {
        self.store.due_keys(now)
    }

    /// Request an immediate run for a key. Returns `true` when the request
    /// was accepted, `false` when `token` already requested a run inside
    /// the idempotency window or an evaluation for the key is in flight.
    /// A refused request leaves the token unconsumed so it can be retried.
    pub fn request_run(&self, key: &EvalKey, token: &str, now: DateTime<Utc>) -> Result<bool> {
        let mut tokens = match self.tokens.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        tokens.retain(|_, seen| now - *seen < chrono::Duration::seconds(TOKEN_WINDOW_SECS));
        if tokens.contains_key(token) {
            debug!(key = %key, token, "duplicate on-demand request ignored");
            return Ok(false);
        }
        if !self.store.advance_next_run(key, now)? {
            debug!(key = %key, token, "on-demand request refused, evaluation in flight");
            return Ok(false);
        }
        tokens.insert(token.to_string(), now);
        info!(key = %key, token, "on-demand evaluation requested");
        Ok(true)
    }

    pub fn config(&self) -> &ScheduleConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_ensure_schedules_covers_all_types() {
        let store = Arc::new(MonitorStore::new());
        let scheduler = Scheduler::new(Arc::clone(&store), ScheduleConfig::default());
        scheduler.ensure_schedules(&[ModelKey::new("proj", "model")], now());

        let due = scheduler.due_keys(now());
        assert_eq!(due.len(), 4);
        let drift = ModelKey::new("proj", "model").eval_key(EvaluationType::Drift);
        assert!(due.contains(&drift));
    }

    #[test]
    fn test_duplicate_token_is_noop() {
        let store = Arc::new(MonitorStore::new());
        let scheduler = Scheduler::new(Arc::clone(&store), ScheduleConfig::default());
        let model = ModelKey::new("proj", "model");
        scheduler.ensure_schedules(&[model.clone()], now());
        let key = model.eval_key(EvaluationType::Drift);

        assert!(scheduler.request_run(&key, "tok-1", now()).unwrap());
        assert!(!scheduler.request_run(&key, "tok-1", now()).unwrap());
        // Same token outside the window is accepted again.
        let later = now() + chrono::Duration::seconds(TOKEN_WINDOW_SECS + 1);
        assert!(scheduler.request_run(&key, "tok-1", later).unwrap());
    }

    #[test]
    fn test_request_refused_while_running_keeps_token() {
        let store = Arc::new(MonitorStore::new());
        let scheduler = Scheduler::new(Arc::clone(&store), ScheduleConfig::default());
        let model = ModelKey::new("proj", "model");
        scheduler.ensure_schedules(&[model.clone()], now());
        let key = model.eval_key(EvaluationType::Drift);

        let id = tw_common::EvaluationId::new();
        store.try_claim(&key, &id, now()).unwrap();
        assert!(!scheduler.request_run(&key, "tok-r", now()).unwrap());

        // The refusal left the token unconsumed: after release the same
        // token is accepted and the key becomes due at the request time.
        store.release_claim(&key, &id, now(), true);
        let later = now() + chrono::Duration::minutes(1);
        assert!(scheduler.request_run(&key, "tok-r", later).unwrap());
        assert_eq!(store.schedule(&key).unwrap().next_run, later);
    }

    #[test]
    fn test_request_for_unknown_key_fails() {
        let store = Arc::new(MonitorStore::new());
        let scheduler = Scheduler::new(store, ScheduleConfig::default());
        let key = ModelKey::new("proj", "ghost").eval_key(EvaluationType::Drift);
        let err = scheduler.request_run(&key, "tok", now()).unwrap_err();
        assert!(matches!(err, Error::ScheduleNotFound { .. }));
    }

    #[test]
    fn test_cancel_token_trips_on_flag() {
        let token = CancelToken::unlimited();
        token.check().unwrap();
        token.cancel();
        assert!(matches!(token.check(), Err(Error::Cancelled)));
    }

    #[test]
    fn test_cancel_token_trips_on_deadline() {
        let token = CancelToken::with_timeout(Duration::from_millis(0));
        std::thread::sleep(Duration::from_millis(5));
        assert!(matches!(
            token.check(),
            Err(Error::EvaluationTimeout { .. })
        ));
    }
}
