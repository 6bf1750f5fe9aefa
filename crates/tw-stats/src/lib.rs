//! Trustwatch statistical comparison primitives.
//!
//! Pure, stateless functions over numeric and categorical samples. Every
//! function sorts or aggregates its inputs internally, so results are
//! deterministic regardless of input order.

pub mod stats;

pub use stats::attribution::*;
pub use stats::divergence::*;
pub use stats::fairness::*;
pub use stats::psi::*;
pub use stats::robustness::*;

/// Minimum sample count for distributional comparisons.
pub const MIN_SAMPLES: usize = 30;

/// Minimum per-group sample count for fairness metrics.
pub const MIN_GROUP_SIZE: usize = 10;

/// Floor applied to bin proportions to avoid log(0) and division by zero.
pub const PROPORTION_EPSILON: f64 = 1e-6;
