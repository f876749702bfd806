//! Basis functions for the harmonic + polynomial regression design.
//!
//! - polynomial terms are powers of `x = (t - t0) / 365.25` (years since epoch
//!   when `t` is in days)
//! - harmonic terms are `cos(2π (t - t0) / P)` and `sin(2π (t - t0) / P)`

use std::f64::consts::PI;

/// Days per Julian year; scales polynomial arguments.
pub const DAYS_PER_YEAR: f64 = 365.25;

/// Polynomial argument `(t - t0) / 365.25`.
pub fn poly_arg(t: f64, t0: f64) -> f64 {
    (t - t0) / DAYS_PER_YEAR
}

/// Fill `out` with `x^0, x^1, ...`.
pub fn fill_powers(x: f64, out: &mut [f64]) {
    let mut p = 1.0;
    for v in out.iter_mut() {
        *v = p;
        p *= x;
    }
}

/// `(cos, sin)` of the phase `2π (t - t0) / period`.
pub fn harmonic(t: f64, t0: f64, period: f64) -> (f64, f64) {
    let phase = 2.0 * PI * (t - t0) / period;
    (phase.cos(), phase.sin())
}

/// Amplitude and phase (radians) of `c·cos + s·sin`, written as `A·cos(φ - ψ)`.
pub fn amplitude_phase(c: f64, s: f64) -> (f64, f64) {
    (c.hypot(s), s.atan2(c))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn powers_start_at_one() {
        let mut out = [0.0; 4];
        fill_powers(2.0, &mut out);
        assert_eq!(out, [1.0, 2.0, 4.0, 8.0]);
    }

    #[test]
    fn harmonic_is_periodic() {
        let (c0, s0) = harmonic(10.0, 0.0, 365.25);
        let (c1, s1) = harmonic(10.0 + 365.25, 0.0, 365.25);
        assert!((c0 - c1).abs() < 1e-12);
        assert!((s0 - s1).abs() < 1e-12);
    }

    #[test]
    fn amplitude_phase_of_pure_sine() {
        let (a, psi) = amplitude_phase(0.0, 2.0);
        assert!((a - 2.0).abs() < 1e-12);
        assert!((psi - PI / 2.0).abs() < 1e-12);
    }
}
