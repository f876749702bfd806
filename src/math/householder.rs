//! Regularized weighted least squares by sequential Householder reflections.
//!
//! We solve problems of the form
//!
//! ```text
//! minimize Σ (z_i - a_i^T x)^2      (rows already scaled by their weight)
//! ```
//!
//! without forming the normal equations. The accumulator keeps an upper
//! triangular `R` and a right-hand side `Z`; each batch of observation rows is
//! folded in with one reflection per column, which zeroes the batch's
//! columns and leaves the residual in the batch's right-hand side.
//!
//! `R` starts as `regularization * I`. This acts as a weak a-priori
//! constraint `x ≈ 0` and keeps `R` invertible even when a column carries no
//! information.

use nalgebra::{DMatrix, DVector};
use tracing::{debug, warn};

/// Default diagonal seed of `R`.
pub const DEFAULT_REGULARIZATION: f64 = 1e-10;

/// In-place Householder least-squares accumulator.
#[derive(Debug, Clone)]
pub struct HouseholderSolver {
    r: DMatrix<f64>,
    z: DVector<f64>,
    vtpv: f64,
    rows: usize,
    regularization: f64,
}

impl HouseholderSolver {
    /// New accumulator for `n` parameters.
    pub fn new(n: usize, regularization: f64) -> Self {
        Self {
            r: DMatrix::from_diagonal_element(n, n, regularization),
            z: DVector::zeros(n),
            vtpv: 0.0,
            rows: 0,
            regularization,
        }
    }

    pub fn reset(&mut self) {
        let n = self.r.nrows();
        self.r = DMatrix::from_diagonal_element(n, n, self.regularization);
        self.z = DVector::zeros(n);
        self.vtpv = 0.0;
        self.rows = 0;
    }

    pub fn n_params(&self) -> usize {
        self.r.nrows()
    }

    /// Number of observation rows accumulated so far.
    pub fn n_rows(&self) -> usize {
        self.rows
    }

    /// Weighted residual sum of squares of everything accumulated so far.
    pub fn vtpv(&self) -> f64 {
        self.vtpv
    }

    pub fn r(&self) -> &DMatrix<f64> {
        &self.r
    }

    /// Fold observation rows `a` (k × n) and observations `obs` (k) into the
    /// triangular system. Both are overwritten: on return `a` is zero in every
    /// processed column and `obs` holds the residuals.
    ///
    /// # Panics
    /// Panics if `a.ncols()` differs from the parameter count or `obs.len()`
    /// differs from `a.nrows()`. Callers build both from the same design.
    pub fn accumulate(&mut self, a: &mut DMatrix<f64>, obs: &mut DVector<f64>) {
        let n = self.r.nrows();
        let k = a.nrows();
        assert_eq!(a.ncols(), n, "design column count must match parameter count");
        assert_eq!(obs.len(), k, "observation count must match design rows");

        for l in 0..n {
            let rll = self.r[(l, l)];
            let col_sq: f64 = a.column(l).iter().map(|v| v * v).sum();
            let mut s = (rll * rll + col_sq).sqrt();
            if s == 0.0 {
                warn!(column = l, "zero-norm column in Householder step; skipping");
                continue;
            }
            if rll >= 0.0 {
                s = -s;
            }
            let u = rll - s;
            self.r[(l, l)] = s;
            let beta = 1.0 / (s * u);

            for j in (l + 1)..n {
                let dot: f64 = (0..k).map(|i| a[(i, l)] * a[(i, j)]).sum();
                let gamma = beta * (u * self.r[(l, j)] + dot);
                self.r[(l, j)] += gamma * u;
                for i in 0..k {
                    let al = a[(i, l)];
                    a[(i, j)] += gamma * al;
                }
            }

            let dot: f64 = (0..k).map(|i| a[(i, l)] * obs[i]).sum();
            let gamma = beta * (u * self.z[l] + dot);
            self.z[l] += gamma * u;
            for i in 0..k {
                obs[i] += gamma * a[(i, l)];
            }

            for i in 0..k {
                a[(i, l)] = 0.0;
            }
        }

        let batch_vtpv: f64 = obs.iter().map(|v| v * v).sum();
        self.vtpv += batch_vtpv;
        self.rows += k;
        debug!(rows = k, total_rows = self.rows, batch_vtpv, "accumulated Householder batch");
    }

    /// Back-substitute `R x = Z`.
    pub fn solve(&self) -> Option<DVector<f64>> {
        let x = self.r.solve_upper_triangular(&self.z)?;
        if x.iter().all(|v| v.is_finite()) {
            Some(x)
        } else {
            warn!("non-finite least-squares solution");
            None
        }
    }

    /// Unscaled parameter covariance `R⁻¹ (R⁻¹)ᵀ`.
    pub fn covariance(&self) -> Option<DMatrix<f64>> {
        let n = self.r.nrows();
        let r_inv = self
            .r
            .solve_upper_triangular(&DMatrix::identity(n, n))?;
        Some(&r_inv * r_inv.transpose())
    }

    /// A-posteriori variance of unit weight `VTPV / (k - n)`.
    ///
    /// Returns `None` when there are no redundant observations.
    pub fn variance_factor(&self) -> Option<f64> {
        let n = self.r.nrows();
        if self.rows <= n {
            return None;
        }
        Some(self.vtpv / (self.rows - n) as f64)
    }

    /// Standard errors `sqrt(σ0² · C_ii)` for every parameter.
    pub fn standard_errors(&self) -> Option<DVector<f64>> {
        let sigma0_sq = self.variance_factor()?;
        let cov = self.covariance()?;
        Some(DVector::from_iterator(
            cov.nrows(),
            (0..cov.nrows()).map(|i| (sigma0_sq * cov[(i, i)]).max(0.0).sqrt()),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn solves_straight_line() {
        // Fit y = 2 + 3x on x = [0,1,2,3]
        let mut a = DMatrix::from_row_slice(4, 2, &[1.0, 0.0, 1.0, 1.0, 1.0, 2.0, 1.0, 3.0]);
        let mut y = DVector::from_row_slice(&[2.0, 5.0, 8.0, 11.0]);

        let mut solver = HouseholderSolver::new(2, DEFAULT_REGULARIZATION);
        solver.accumulate(&mut a, &mut y);
        let x = solver.solve().unwrap();

        assert!((x[0] - 2.0).abs() < 1e-8);
        assert!((x[1] - 3.0).abs() < 1e-8);
        assert!(solver.vtpv() < 1e-12);
    }

    #[test]
    fn batches_match_single_pass() {
        let rows = [
            (1.0, 0.0, 1.1),
            (1.0, 1.0, 1.9),
            (1.0, 2.0, 3.2),
            (1.0, 3.0, 3.9),
            (1.0, 4.0, 5.1),
            (1.0, 5.0, 5.8),
        ];

        let mut single = HouseholderSolver::new(2, DEFAULT_REGULARIZATION);
        let mut a = DMatrix::from_fn(rows.len(), 2, |i, j| if j == 0 { rows[i].0 } else { rows[i].1 });
        let mut z = DVector::from_iterator(rows.len(), rows.iter().map(|r| r.2));
        single.accumulate(&mut a, &mut z);

        let mut batched = HouseholderSolver::new(2, DEFAULT_REGULARIZATION);
        for chunk in rows.chunks(2) {
            let mut a = DMatrix::from_fn(chunk.len(), 2, |i, j| if j == 0 { chunk[i].0 } else { chunk[i].1 });
            let mut z = DVector::from_iterator(chunk.len(), chunk.iter().map(|r| r.2));
            batched.accumulate(&mut a, &mut z);
        }

        let x1 = single.solve().unwrap();
        let x2 = batched.solve().unwrap();
        assert!((x1 - x2).norm() < 1e-9);
        assert!((single.vtpv() - batched.vtpv()).abs() < 1e-9);
        assert_eq!(batched.n_rows(), 6);
    }

    #[test]
    fn residual_sum_matches_direct_computation() {
        let xs = [0.0, 1.0, 2.0, 3.0, 4.0];
        let ys = [0.1, 0.9, 2.2, 2.8, 4.1];
        let mut a = DMatrix::from_fn(5, 2, |i, j| if j == 0 { 1.0 } else { xs[i] });
        let mut z = DVector::from_row_slice(&ys);

        let mut solver = HouseholderSolver::new(2, DEFAULT_REGULARIZATION);
        solver.accumulate(&mut a, &mut z);
        let x = solver.solve().unwrap();

        let direct: f64 = xs
            .iter()
            .zip(ys.iter())
            .map(|(&t, &y)| {
                let r = y - x[0] - x[1] * t;
                r * r
            })
            .sum();
        assert!((solver.vtpv() - direct).abs() < 1e-9);

        let se = solver.standard_errors().unwrap();
        assert!(se.iter().all(|v| v.is_finite() && *v > 0.0));
    }

    #[test]
    fn degenerate_column_keeps_prior() {
        // Second column is all zeros: the regularization prior pins it at 0.
        let mut a = DMatrix::from_row_slice(3, 2, &[1.0, 0.0, 1.0, 0.0, 1.0, 0.0]);
        let mut z = DVector::from_row_slice(&[1.0, 2.0, 3.0]);

        let mut solver = HouseholderSolver::new(2, DEFAULT_REGULARIZATION);
        solver.accumulate(&mut a, &mut z);
        let x = solver.solve().unwrap();

        assert!((x[0] - 2.0).abs() < 1e-8);
        assert!(x[1].abs() < 1e-12);
    }

    #[test]
    fn variance_factor_needs_redundancy() {
        let mut a = DMatrix::from_row_slice(2, 2, &[1.0, 0.0, 0.0, 1.0]);
        let mut z = DVector::from_row_slice(&[1.0, 2.0]);
        let mut solver = HouseholderSolver::new(2, DEFAULT_REGULARIZATION);
        solver.accumulate(&mut a, &mut z);
        assert!(solver.variance_factor().is_none());
    }
}
