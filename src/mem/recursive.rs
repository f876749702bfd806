//! Order-recursive (Burg-type) AR estimation.
//!
//! Forward and backward prediction errors start as the data itself. Each order
//! step picks the reflection coefficient minimising the summed forward and
//! backward error power, updates the lower-order coefficients with the
//! Levinson recursion and shortens both error sequences by one sample.
//!
//! Two `Generation` buffers hold the previous and the current order; the
//! order index selects which one is written.

use num_complex::Complex64;
use tracing::{debug, warn};

use super::ArModel;

#[derive(Debug, Clone, Default)]
struct Generation {
    forward: Vec<Complex64>,
    backward: Vec<Complex64>,
    coeffs: Vec<Complex64>,
    power: f64,
}

/// Split the two generations into `(previous, current)` for order step `m`.
fn generations(gens: &mut [Generation; 2], m: usize) -> (&Generation, &mut Generation) {
    let (first, second) = gens.split_at_mut(1);
    if m % 2 == 1 {
        (&first[0], &mut second[0])
    } else {
        (&second[0], &mut first[0])
    }
}

/// Estimate `order` complex AR coefficients.
///
/// Returns `None` for an empty or all-zero input, or an order the data cannot
/// support (`order > n - 2`).
pub fn estimate(data: &[Complex64], order: usize) -> Option<ArModel> {
    let n = data.len();
    if order == 0 || n < 2 || order > n - 2 {
        warn!(order, samples = n, "recursive AR order out of range");
        return None;
    }

    let p0 = data.iter().map(|z| z.norm_sqr()).sum::<f64>() / n as f64;
    if p0 == 0.0 {
        warn!("recursive AR estimation on an all-zero series");
        return None;
    }

    let mut gens: [Generation; 2] = [
        Generation {
            forward: data.to_vec(),
            backward: data.to_vec(),
            coeffs: Vec::with_capacity(order),
            power: p0,
        },
        Generation::default(),
    ];

    for m in 1..=order {
        let (prev, cur) = generations(&mut gens, m);
        let len = prev.forward.len();

        let mut num = Complex64::new(0.0, 0.0);
        let mut den = 0.0;
        for j in 0..len - 1 {
            let b = prev.backward[j];
            let f = prev.forward[j + 1];
            num += b.conj() * f;
            den += b.norm_sqr() + f.norm_sqr();
        }

        let k = if den > 0.0 {
            num * (2.0 / den)
        } else {
            warn!(order = m, "vanishing prediction error; reflection coefficient set to zero");
            Complex64::new(0.0, 0.0)
        };

        cur.coeffs.clear();
        for i in 0..m - 1 {
            cur.coeffs.push(prev.coeffs[i] - k * prev.coeffs[m - 2 - i].conj());
        }
        cur.coeffs.push(k);

        cur.power = prev.power * (1.0 - k.norm_sqr());

        cur.forward.clear();
        cur.backward.clear();
        for j in 0..len - 1 {
            let b = prev.backward[j];
            let f = prev.forward[j + 1];
            cur.forward.push(f - k * b);
            cur.backward.push(b - k.conj() * f);
        }

        debug!(order = m, reflection = k.norm(), power = cur.power, "Burg order step");
    }

    let last = &gens[order % 2];
    Some(ArModel {
        coeffs: last.coeffs.clone(),
        power: last.power,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::prelude::*;
    use rand::rngs::StdRng;
    use rand_distr::Normal;

    #[test]
    fn ar1_coefficient_is_recovered() {
        let mut rng = StdRng::seed_from_u64(7);
        let normal = Normal::new(0.0, 1.0).unwrap();
        let mut x = 0.0;
        let data: Vec<Complex64> = (0..4000)
            .map(|_| {
                x = 0.9 * x + normal.sample(&mut rng);
                Complex64::new(x, 0.0)
            })
            .collect();

        let model = estimate(&data, 1).unwrap();
        assert!((model.coeffs[0].re - 0.9).abs() < 0.03, "got {}", model.coeffs[0]);
        assert!(model.coeffs[0].im.abs() < 1e-12);
        // Innovation variance of the generating process is 1.
        assert!((model.power - 1.0).abs() < 0.15, "power {}", model.power);
    }

    #[test]
    fn complex_rotation_is_recovered() {
        // x_n = exp(i ω n): predicted exactly by a_1 = exp(i ω).
        let omega = 0.3;
        let data: Vec<Complex64> = (0..64)
            .map(|i| Complex64::from_polar(1.0, omega * i as f64))
            .collect();
        let model = estimate(&data, 1).unwrap();
        let expected = Complex64::from_polar(1.0, omega);
        assert!((model.coeffs[0] - expected).norm() < 1e-9);
        assert!(model.power < 1e-12);
    }

    #[test]
    fn reflection_magnitudes_keep_power_non_negative() {
        let data: Vec<Complex64> = (0..50)
            .map(|i| Complex64::new((i as f64 * 0.7).sin() + 0.3 * ((i * i) as f64 * 0.013).sin(), 0.0))
            .collect();
        let model = estimate(&data, 20).unwrap();
        assert_eq!(model.coeffs.len(), 20);
        assert!(model.power >= 0.0 && model.power.is_finite());
    }

    #[test]
    fn rejects_unsupported_orders() {
        let data = vec![Complex64::new(1.0, 0.0); 5];
        assert!(estimate(&data, 0).is_none());
        assert!(estimate(&data, 4).is_none());
        assert!(estimate(&[Complex64::new(0.0, 0.0); 10], 2).is_none());
    }
}
