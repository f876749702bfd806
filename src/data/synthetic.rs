//! Seeded synthetic series: AR processes and harmonic + trend signals.
//!
//! Generation is deterministic for a given seed, so the same command line
//! (or test) always reproduces the same series.

use std::f64::consts::PI;

use num_complex::Complex64;
use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Normal;

use crate::error::AppError;
use crate::math::{DAYS_PER_YEAR, harmonic};
use crate::series::{Observation, Series};

/// Samples discarded before recording so the AR recursion forgets its zero start.
const BURN_IN: usize = 500;

/// Real AR process `x_n = Σ a_k x_{n-k} + e_n`, `e_n ~ N(0, sigma²)`, Δt = 1.
///
/// Fields are `(real, imag = 0)`.
pub fn ar_process(coeffs: &[f64], sigma: f64, n: usize, seed: u64) -> Result<Series, AppError> {
    let coeffs: Vec<Complex64> = coeffs.iter().map(|&a| Complex64::new(a, 0.0)).collect();
    complex_ar_process(&coeffs, sigma, n, 1.0, seed, false)
}

/// Complex AR process with circular Gaussian innovations.
///
/// With `complex_noise == false` the innovations are real, which keeps a real
/// coefficient set producing a purely real series.
pub fn complex_ar_process(
    coeffs: &[Complex64],
    sigma: f64,
    n: usize,
    dt: f64,
    seed: u64,
    complex_noise: bool,
) -> Result<Series, AppError> {
    if n == 0 {
        return Err(AppError::new(2, "Sample count must be > 0."));
    }
    if !(dt.is_finite() && dt > 0.0) {
        return Err(AppError::new(2, "Sample interval must be finite and > 0."));
    }
    let normal = Normal::new(0.0, sigma)
        .map_err(|e| AppError::new(2, format!("Noise distribution error: {e}")))?;
    let mut rng = StdRng::seed_from_u64(seed);

    let total = n + BURN_IN;
    let mut x: Vec<Complex64> = Vec::with_capacity(total);
    for i in 0..total {
        let mut v = if complex_noise {
            // Split the variance evenly between both parts.
            Complex64::new(normal.sample(&mut rng), normal.sample(&mut rng)) / 2f64.sqrt()
        } else {
            Complex64::new(normal.sample(&mut rng), 0.0)
        };
        for (k, a) in coeffs.iter().enumerate() {
            if i > k {
                v += a * x[i - k - 1];
            }
        }
        x.push(v);
    }

    let obs = x[BURN_IN..]
        .iter()
        .enumerate()
        .map(|(i, z)| Observation::new(i as f64 * dt, vec![z.re, z.im]))
        .collect();
    Ok(Series::from_observations(obs))
}

/// One harmonic component `c·cos + s·sin` at `period`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HarmonicComponent {
    pub period: f64,
    pub cos: f64,
    pub sin: f64,
}

/// Parameters of a harmonic + linear-trend signal.
#[derive(Debug, Clone)]
pub struct HarmonicSignal {
    pub t0: f64,
    pub dt: f64,
    pub n: usize,
    pub offset: f64,
    /// Slope per year of `(t - t0)`.
    pub rate: f64,
    pub components: Vec<HarmonicComponent>,
    pub noise_sigma: f64,
    /// Append the per-observation sigma as a second field.
    pub with_sigma: bool,
}

impl HarmonicSignal {
    /// Noise-free value at `t`.
    pub fn value(&self, t: f64) -> f64 {
        let x = (t - self.t0) / DAYS_PER_YEAR;
        let mut y = self.offset + self.rate * x;
        for c in &self.components {
            let (cs, sn) = harmonic(t, self.t0, c.period);
            y += c.cos * cs + c.sin * sn;
        }
        y
    }
}

/// Sample a `HarmonicSignal` with Gaussian noise.
pub fn harmonic_series(signal: &HarmonicSignal, seed: u64) -> Result<Series, AppError> {
    if signal.n == 0 {
        return Err(AppError::new(2, "Sample count must be > 0."));
    }
    if !(signal.dt.is_finite() && signal.dt > 0.0) {
        return Err(AppError::new(2, "Sample interval must be finite and > 0."));
    }
    if signal.components.iter().any(|c| !(c.period.is_finite() && c.period > 0.0)) {
        return Err(AppError::new(2, "Harmonic periods must be finite and > 0."));
    }
    let normal = Normal::new(0.0, signal.noise_sigma)
        .map_err(|e| AppError::new(2, format!("Noise distribution error: {e}")))?;
    let mut rng = StdRng::seed_from_u64(seed);

    let obs = (0..signal.n)
        .map(|i| {
            let t = signal.t0 + i as f64 * signal.dt;
            let y = signal.value(t) + normal.sample(&mut rng);
            let mut fields = vec![y];
            if signal.with_sigma {
                fields.push(signal.noise_sigma.max(f64::MIN_POSITIVE));
            }
            Observation::new(t, fields)
        })
        .collect();
    Ok(Series::from_observations(obs))
}

/// Pure sinusoid `sin(2π t / period)` with a zero imaginary column.
pub fn sinusoid(n: usize, dt: f64, period: f64) -> Series {
    let obs = (0..n)
        .map(|i| {
            let t = i as f64 * dt;
            Observation::new(t, vec![(2.0 * PI * t / period).sin(), 0.0])
        })
        .collect();
    Series::from_observations(obs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ar_process_is_reproducible() {
        let a = ar_process(&[0.5], 1.0, 100, 9).unwrap();
        let b = ar_process(&[0.5], 1.0, 100, 9).unwrap();
        assert_eq!(a.observations(), b.observations());
        assert!(a.is_equidistant());
        assert_eq!(a.num_data_columns(), 2);
        assert!(a.column(1).iter().all(|v| *v == 0.0));
    }

    #[test]
    fn harmonic_series_carries_sigma_column() {
        let signal = HarmonicSignal {
            t0: 58000.0,
            dt: 1.0,
            n: 50,
            offset: 1.0,
            rate: 2.0,
            components: vec![HarmonicComponent {
                period: 365.25,
                cos: 1.0,
                sin: 0.0,
            }],
            noise_sigma: 0.0,
            with_sigma: true,
        };
        let series = harmonic_series(&signal, 1).unwrap();
        assert_eq!(series.num_data_columns(), 2);
        let first = series.get(0).unwrap();
        assert!((first.fields[0] - 2.0).abs() < 1e-12);
        assert!(first.fields[1] > 0.0);
    }

    #[test]
    fn rejects_bad_parameters() {
        assert!(ar_process(&[0.5], -1.0, 10, 0).is_err());
        assert!(ar_process(&[0.5], 1.0, 0, 0).is_err());
    }
}
