//! Least-squares AR estimation (forward, backward, forward+backward).
//!
//! The complex prediction `x_n ≈ Σ a_k x_{n-k}` is written as a real system
//! with a 2×2 block per lag:
//!
//! ```text
//! re:  [ xr  -xi ] · [ar]  =  xr_n
//! im:  [ xi   xr ]   [ai]     xi_n
//! ```
//!
//! The backward system predicts `conj(x_n)` from `conj(x_{n+k})` with the
//! same unknowns, so all three variants estimate forward coefficients.
//! Rows are folded into the Householder accumulator; only the solution and
//! the residual power are kept.

use nalgebra::{DMatrix, DVector};
use num_complex::Complex64;
use tracing::{debug, warn};

use super::ArModel;
use crate::math::{DEFAULT_REGULARIZATION, HouseholderSolver};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Forward,
    Backward,
}

/// Which prediction directions enter the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sides {
    Forward,
    Backward,
    Both,
}

impl Sides {
    fn directions(self) -> &'static [Direction] {
        match self {
            Sides::Forward => &[Direction::Forward],
            Sides::Backward => &[Direction::Backward],
            Sides::Both => &[Direction::Forward, Direction::Backward],
        }
    }
}

/// Estimate `order` complex AR coefficients by least squares.
pub fn estimate(data: &[Complex64], order: usize, sides: Sides) -> Option<ArModel> {
    let n = data.len();
    if order == 0 || order >= n {
        warn!(order, samples = n, "least-squares AR order out of range");
        return None;
    }

    let windows = n - order;
    let directions = sides.directions();
    let n_rows = 2 * windows * directions.len();
    let n_params = 2 * order;

    let mut a = DMatrix::<f64>::zeros(n_rows, n_params);
    let mut z = DVector::<f64>::zeros(n_rows);

    let mut row = 0;
    for &dir in directions {
        fill_rows(data, order, dir, &mut a, &mut z, row);
        row += 2 * windows;
    }

    let mut solver = HouseholderSolver::new(n_params, DEFAULT_REGULARIZATION);
    solver.accumulate(&mut a, &mut z);
    let x = solver.solve()?;

    let coeffs: Vec<Complex64> = (0..order)
        .map(|k| Complex64::new(x[2 * k], x[2 * k + 1]))
        .collect();

    let mut power = solver.vtpv() / windows as f64;
    if sides == Sides::Both {
        power /= 2.0;
    }

    debug!(order, rows = n_rows, vtpv = solver.vtpv(), power, "least-squares AR solve");
    Some(ArModel { coeffs, power })
}

fn fill_rows(
    data: &[Complex64],
    order: usize,
    dir: Direction,
    a: &mut DMatrix<f64>,
    z: &mut DVector<f64>,
    row0: usize,
) {
    let windows = data.len() - order;

    for w in 0..windows {
        let target = match dir {
            Direction::Forward => data[w + order],
            Direction::Backward => data[w].conj(),
        };

        let re = row0 + 2 * w;
        let im = re + 1;
        for k in 1..=order {
            let x = match dir {
                Direction::Forward => data[w + order - k],
                Direction::Backward => data[w + k].conj(),
            };
            let c = 2 * (k - 1);
            a[(re, c)] = x.re;
            a[(re, c + 1)] = -x.im;
            a[(im, c)] = x.im;
            a[(im, c + 1)] = x.re;
        }
        z[re] = target.re;
        z[im] = target.im;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rotation(n: usize, omega: f64) -> Vec<Complex64> {
        (0..n)
            .map(|i| Complex64::from_polar(1.0, omega * i as f64))
            .collect()
    }

    #[test]
    fn forward_recovers_rotation() {
        let data = rotation(40, 0.4);
        let model = estimate(&data, 1, Sides::Forward).unwrap();
        let expected = Complex64::from_polar(1.0, 0.4);
        assert!((model.coeffs[0] - expected).norm() < 1e-8);
        assert!(model.power < 1e-12);
    }

    #[test]
    fn backward_and_both_agree_on_exact_data() {
        let data = rotation(40, -0.25);
        let expected = Complex64::from_polar(1.0, -0.25);
        for sides in [Sides::Backward, Sides::Both] {
            let model = estimate(&data, 1, sides).unwrap();
            assert!((model.coeffs[0] - expected).norm() < 1e-8, "{sides:?}");
        }
    }

    #[test]
    fn innovation_power_matches_noise_variance_for_every_side() {
        let series = crate::data::synthetic::ar_process(&[0.5], 1.0, 4000, 11).unwrap();
        let data: Vec<Complex64> = series
            .column(0)
            .into_iter()
            .zip(series.column(1))
            .map(|(re, im)| Complex64::new(re, im))
            .collect();

        let powers: Vec<f64> = [Sides::Forward, Sides::Backward, Sides::Both]
            .into_iter()
            .map(|sides| {
                let model = estimate(&data, 1, sides).unwrap();
                assert!((model.coeffs[0].re - 0.5).abs() < 0.05, "{sides:?}: {}", model.coeffs[0]);
                assert!((model.power - 1.0).abs() < 0.1, "{sides:?}: {}", model.power);
                model.power
            })
            .collect();

        // Forward+backward stacks twice the rows over the same windows.
        assert!((powers[2] - powers[0]).abs() < 0.02 * powers[0], "{powers:?}");
        assert!((powers[2] - powers[1]).abs() < 0.02 * powers[1], "{powers:?}");
    }

    #[test]
    fn real_input_gives_real_coefficients() {
        let data: Vec<Complex64> = (0..60)
            .map(|i| Complex64::new((i as f64 * 0.5).sin() + 0.2 * ((i * i) as f64 * 0.01).cos(), 0.0))
            .collect();
        let model = estimate(&data, 4, Sides::Both).unwrap();
        assert!(model.coeffs.iter().all(|c| c.im.abs() < 1e-9));
        assert!(model.power.is_finite() && model.power >= 0.0);
    }
}
