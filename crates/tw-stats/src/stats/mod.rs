//! Core statistics modules.

pub mod attribution;
pub mod divergence;
pub mod fairness;
pub mod psi;
pub mod robustness;
