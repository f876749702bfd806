//! Maximum-entropy (autoregressive) spectral estimation.
//!
//! Responsibilities:
//!
//! - turn a validated series into complex samples (optionally de-meaned or
//!   de-trended)
//! - estimate AR coefficients with one of four algorithms
//! - evaluate PSD and FPE, and scan filter orders

use num_complex::Complex64;

pub mod estimator;
pub mod least_squares;
pub mod recursive;
pub mod selection;

pub use estimator::*;
pub use selection::*;

/// Complex AR coefficients `a_1..a_M` and innovation power.
#[derive(Debug, Clone, PartialEq)]
pub struct ArModel {
    pub coeffs: Vec<Complex64>,
    pub power: f64,
}
