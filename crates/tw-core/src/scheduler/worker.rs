//! Fixed worker pool for evaluation jobs.
//!
//! Workers are plain threads pulling jobs off a shared `mpsc` receiver and
//! pushing outcomes onto a completion channel. The pool knows nothing about
//! evaluations; the [`JobRunner`] it is given does the work.

use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use tracing::{debug, warn};
use tw_common::{Error, EvalKey, Result};

use crate::schema::TimeWindow;

/// One unit of work: evaluate `key` over `window`.
#[derive(Debug, Clone)]
pub struct EvalJob {
    pub key: EvalKey,
    pub window: TimeWindow,
    pub requested_at: chrono::DateTime<chrono::Utc>,
}

/// What a finished job reports back.
#[derive(Debug)]
pub struct JobOutcome {
    pub key: EvalKey,
    pub result: Result<()>,
}

/// Executes one job end to end (claim, evaluate, persist, release).
pub trait JobRunner: Send + Sync {
    fn run(&self, job: EvalJob) -> JobOutcome;
}

/// Fixed-size pool of evaluation workers.
pub struct WorkerPool {
    sender: Option<mpsc::Sender<EvalJob>>,
    results: mpsc::Receiver<JobOutcome>,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    pub fn new(workers: usize, runner: Arc<dyn JobRunner>) -> Self {
        let (sender, receiver) = mpsc::channel::<EvalJob>();
        let (result_sender, results) = mpsc::channel::<JobOutcome>();
        let receiver = Arc::new(Mutex::new(receiver));

        let handles = (0..workers.max(1))
            .map(|worker_id| {
                let receiver = Arc::clone(&receiver);
                let result_sender = result_sender.clone();
                let runner = Arc::clone(&runner);
                std::thread::spawn(move || loop {
                    let job = {
                        let guard = match receiver.lock() {
                            Ok(guard) => guard,
                            Err(poisoned) => poisoned.into_inner(),
                        };
                        guard.recv()
                    };
                    let Ok(job) = job else {
                        debug!(worker_id, "job channel closed, worker exiting");
                        break;
                    };
                    let outcome = runner.run(job);
                    if result_sender.send(outcome).is_err() {
                        break;
                    }
                })
            })
            .collect();

        WorkerPool {
            sender: Some(sender),
            results,
            handles,
        }
    }

    /// Queue a job. Fails once the pool is shut down.
    pub fn submit(&self, job: EvalJob) -> Result<()> {
        let sender = self.sender.as_ref().ok_or_else(|| {
            Error::Computation("worker pool is shut down".to_string())
        })?;
        sender.send(job).map_err(|e| {
            Error::Computation(format!("worker pool rejected job for {}: {}", e.0.key, e))
        })
    }

    /// Block until `count` outcomes have arrived.
    pub fn collect_outcomes(&self, count: usize) -> Vec<JobOutcome> {
        let mut outcomes = Vec::with_capacity(count);
        for _ in 0..count {
            match self.results.recv() {
                Ok(outcome) => outcomes.push(outcome),
                Err(_) => {
                    warn!("worker pool result channel closed early");
                    break;
                }
            }
        }
        outcomes
    }

    /// Stop accepting jobs, let queued work drain, and join the workers.
    pub fn shutdown(mut self) {
        self.sender.take();
        for handle in self.handles.drain(..) {
            if handle.join().is_err() {
                warn!("worker thread panicked during shutdown");
            }
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.sender.take();
        for handle in self.handles.drain(..) {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tw_common::{EvaluationType, ModelKey};

    struct Recorder {
        runs: AtomicUsize,
    }

    impl JobRunner for Recorder {
        fn run(&self, job: EvalJob) -> JobOutcome {
            self.runs.fetch_add(1, Ordering::SeqCst);
            JobOutcome {
                key: job.key,
                result: Ok(()),
            }
        }
    }

    fn job(model: &str, ty: EvaluationType) -> EvalJob {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap();
        EvalJob {
            key: ModelKey::new("proj", model).eval_key(ty),
            window: TimeWindow::ending_at(now, 3600),
            requested_at: now,
        }
    }

    #[test]
    fn test_all_jobs_run_exactly_once() {
        let runner = Arc::new(Recorder {
            runs: AtomicUsize::new(0),
        });
        let pool = WorkerPool::new(3, Arc::clone(&runner) as Arc<dyn JobRunner>);
        for i in 0..10 {
            pool.submit(job(&format!("m{}", i), EvaluationType::Drift))
                .unwrap();
        }
        let outcomes = pool.collect_outcomes(10);
        assert_eq!(outcomes.len(), 10);
        assert_eq!(runner.runs.load(Ordering::SeqCst), 10);
        let keys: HashSet<String> = outcomes.iter().map(|o| o.key.to_string()).collect();
        assert_eq!(keys.len(), 10);
        pool.shutdown();
    }

    #[test]
    fn test_submit_after_shutdown_fails() {
        let runner = Arc::new(Recorder {
            runs: AtomicUsize::new(0),
        });
        let mut pool = WorkerPool::new(1, runner as Arc<dyn JobRunner>);
        pool.sender.take();
        assert!(pool.submit(job("m", EvaluationType::Drift)).is_err());
    }
}
