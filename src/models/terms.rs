//! Fitted term records of a regression model.
//!
//! Each harmonic carries its own `keep` flag, which selects it for the
//! "kept" reconstruction used to re-inject deliberately retained signal
//! after model subtraction.

use serde::{Deserialize, Serialize};

use crate::math::{amplitude_phase, fill_powers, harmonic, poly_arg};

/// A `cos`/`sin` pair at a known period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HarmonicTerm {
    pub period: f64,
    pub cos: f64,
    pub sin: f64,
    pub cos_err: f64,
    pub sin_err: f64,
    pub keep: bool,
}

impl HarmonicTerm {
    pub fn new(period: f64, keep: bool) -> Self {
        Self {
            period,
            cos: 0.0,
            sin: 0.0,
            cos_err: 0.0,
            sin_err: 0.0,
            keep,
        }
    }

    pub fn eval(&self, t: f64, t0: f64) -> f64 {
        let (c, s) = harmonic(t, t0, self.period);
        self.cos * c + self.sin * s
    }

    pub fn amplitude(&self) -> f64 {
        amplitude_phase(self.cos, self.sin).0
    }

    /// Phase in radians relative to the model epoch.
    pub fn phase(&self) -> f64 {
        amplitude_phase(self.cos, self.sin).1
    }
}

/// Harmonic at one period whose `cos`/`sin` amplitudes are polynomials in
/// `(t - t0) / 365.25`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvelopeTerm {
    pub period: f64,
    /// Highest envelope power.
    pub order: usize,
    /// `(cos, sin)` coefficient per power `0..=order`.
    pub coeffs: Vec<(f64, f64)>,
    pub errors: Vec<(f64, f64)>,
    pub keep: bool,
}

impl EnvelopeTerm {
    pub fn new(period: f64, order: usize, keep: bool) -> Self {
        Self {
            period,
            order,
            coeffs: vec![(0.0, 0.0); order + 1],
            errors: vec![(0.0, 0.0); order + 1],
            keep,
        }
    }

    pub fn n_params(&self) -> usize {
        2 * (self.order + 1)
    }

    pub fn eval(&self, t: f64, t0: f64) -> f64 {
        let (c, s) = harmonic(t, t0, self.period);
        let mut powers = vec![0.0; self.order + 1];
        fill_powers(poly_arg(t, t0), &mut powers);
        self.coeffs
            .iter()
            .zip(&powers)
            .map(|((a, b), p)| p * (a * c + b * s))
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_of_order_zero_is_plain_harmonic() {
        let mut env = EnvelopeTerm::new(100.0, 0, false);
        env.coeffs[0] = (1.5, -0.5);
        let mut h = HarmonicTerm::new(100.0, false);
        h.cos = 1.5;
        h.sin = -0.5;
        for t in [0.0, 12.0, 77.5] {
            assert!((env.eval(t, 0.0) - h.eval(t, 0.0)).abs() < 1e-12);
        }
    }

    #[test]
    fn envelope_grows_with_time() {
        let mut env = EnvelopeTerm::new(365.25, 1, true);
        env.coeffs[1] = (1.0, 0.0);
        // At whole periods cos = 1, so the value is the envelope itself.
        assert!((env.eval(365.25, 0.0) - 1.0).abs() < 1e-9);
        assert!((env.eval(2.0 * 365.25, 0.0) - 2.0).abs() < 1e-9);
    }
}
