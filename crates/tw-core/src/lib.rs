//! Trustwatch Core - Evaluation and Trust-Scoring Pipeline
//!
//! The core library for tw-core, handling:
//! - Time-windowed evaluation of deployed models along four quality axes
//!   (fairness, drift, robustness, explainability)
//! - Cadence-based scheduling with per-key claim exclusivity
//! - Weighted trust-score aggregation with trend tracking
//! - Threshold-driven alert creation, escalation, and suppression
//!
//! Ingestion, user management, notification delivery, and the dashboard are
//! external collaborators; this crate consumes stored predictions and hands
//! finished alerts to a [`alerts::notify::Notifier`].

pub mod alerts;
pub mod audit;
pub mod engines;
pub mod logging;
pub mod monitor;
pub mod registry;
pub mod scheduler;
pub mod schema;
pub mod store;
pub mod trust;

pub use tw_common::{Error, Result};
