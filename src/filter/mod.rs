//! Gaussian-kernel smoothing and model-aware residuals.

pub mod gauss;

pub use gauss::*;
