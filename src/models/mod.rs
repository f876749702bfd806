//! Deterministic signal models fitted ahead of smoothing.
//!
//! - `mask`: inclusion flags shared across all column models
//! - `terms`: fitted harmonic and envelope records
//! - `regression`: polynomial + harmonic weighted least squares

pub mod mask;
pub mod regression;
pub mod terms;

pub use mask::*;
pub use regression::*;
pub use terms::*;
