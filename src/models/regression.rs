//! Polynomial + harmonic regression of one data column.
//!
//! Design columns, in order:
//!
//! 1. polynomial powers `x^0..x^(p-1)` with `x = (t - t0) / 365.25`
//! 2. `cos`/`sin` pairs at every declared period
//! 3. optional envelope: `x^j cos`, `x^j sin` at one extra period, `j = 0..=order`
//!
//! Rows are weighted by `1/sigma` from the sigma column (unit weights without
//! one) and folded into a `HouseholderSolver`.
//!
//! Outlier elimination never deletes data: it clears entries of the shared
//! `InclusionMask` lent by the caller.

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::mask::InclusionMask;
use super::terms::{EnvelopeTerm, HarmonicTerm};
use crate::math::{DEFAULT_REGULARIZATION, HouseholderSolver, fill_powers, harmonic, poly_arg};
use crate::series::Series;

/// Observations whose sigma exceeds this multiple of the mean sigma are
/// excluded before fitting.
pub const SIGMA_REJECTION_FACTOR: f64 = 5.0;

/// Observations whose weighted residual exceeds this multiple of the fit's
/// standard deviation are excluded after fitting.
pub const RESIDUAL_REJECTION_FACTOR: f64 = 5.0;

/// A declared harmonic period.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PeriodSpec {
    pub period: f64,
    pub keep: bool,
}

/// The optional polynomial-enveloped harmonic.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnvelopeSpec {
    pub period: f64,
    pub order: usize,
    pub keep: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionConfig {
    pub column: usize,
    pub sigma_column: Option<usize>,
    /// Model epoch `t0`, in the series' time unit.
    pub epoch: f64,
    /// Number of polynomial terms (1 = offset, 2 = offset + rate, ...).
    pub poly_terms: usize,
    pub periods: Vec<PeriodSpec>,
    pub envelope: Option<EnvelopeSpec>,
    pub eliminate_before: bool,
    pub eliminate_after: bool,
}

/// Diagnostics of the last successful fit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FitSummary {
    pub rows: usize,
    pub params: usize,
    /// Weighted residual sum of squares.
    pub vtpv: f64,
    /// Standard deviation of unit weight.
    pub sigma0: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionModel {
    config: RegressionConfig,
    poly: Vec<f64>,
    poly_err: Vec<f64>,
    harmonics: Vec<HarmonicTerm>,
    envelope: Option<EnvelopeTerm>,
    summary: Option<FitSummary>,
}

impl RegressionModel {
    pub fn new(config: RegressionConfig) -> Self {
        let harmonics = config
            .periods
            .iter()
            .map(|p| HarmonicTerm::new(p.period, p.keep))
            .collect();
        let envelope = config
            .envelope
            .map(|e| EnvelopeTerm::new(e.period, e.order, e.keep));
        Self {
            poly: vec![0.0; config.poly_terms],
            poly_err: vec![0.0; config.poly_terms],
            harmonics,
            envelope,
            summary: None,
            config,
        }
    }

    pub fn config(&self) -> &RegressionConfig {
        &self.config
    }

    pub fn column(&self) -> usize {
        self.config.column
    }

    pub fn n_params(&self) -> usize {
        self.config.poly_terms
            + 2 * self.harmonics.len()
            + self.envelope.as_ref().map(|e| e.n_params()).unwrap_or(0)
    }

    /// Check every prerequisite of `fit`, logging each one that is missing.
    pub fn can_run(&self, series: &Series, mask: &InclusionMask) -> bool {
        let mut ok = true;
        if self.config.poly_terms == 0 {
            warn!(column = self.config.column, "regression model has no polynomial terms");
            ok = false;
        }
        if self.harmonics.is_empty() {
            warn!(column = self.config.column, "regression model has no harmonic periods");
            ok = false;
        }
        if !series.is_valid() || series.is_empty() {
            warn!(column = self.config.column, "regression model has no valid series");
            ok = false;
        }
        if mask.len() != series.len() {
            warn!(
                column = self.config.column,
                mask = mask.len(),
                observations = series.len(),
                "inclusion mask does not match the series"
            );
            ok = false;
        }
        if series.is_valid() && self.config.column >= series.num_data_columns() {
            warn!(
                column = self.config.column,
                columns = series.num_data_columns(),
                "regression column out of range"
            );
            ok = false;
        }
        ok
    }

    /// Exclude observations whose sigma exceeds 5× the mean sigma.
    ///
    /// Returns the number of newly excluded observations.
    pub fn eliminate_before(&self, series: &Series, mask: &mut InclusionMask) -> usize {
        if !self.config.eliminate_before {
            return 0;
        }
        let Some(sc) = self.config.sigma_column else {
            debug!(column = self.config.column, "no sigma column; skipping sigma elimination");
            return 0;
        };

        let sigmas: Vec<f64> = series
            .column(sc)
            .into_iter()
            .filter(|s| s.is_finite())
            .collect();
        if sigmas.is_empty() {
            return 0;
        }
        let mean = sigmas.iter().sum::<f64>() / sigmas.len() as f64;
        let threshold = SIGMA_REJECTION_FACTOR * mean;

        let mut excluded = 0;
        for (i, obs) in series.observations().iter().enumerate() {
            let Some(&sigma) = obs.fields.get(sc) else {
                continue;
            };
            if sigma > threshold && mask.exclude(i) {
                warn!(
                    index = i,
                    time = obs.time(),
                    sigma,
                    threshold,
                    "observation excluded: sigma above threshold"
                );
                excluded += 1;
            }
        }
        if excluded > 0 {
            info!(column = self.config.column, excluded, "sigma elimination done");
        }
        excluded
    }

    /// Weighted least-squares fit over the included observations.
    pub fn fit(&mut self, series: &Series, mask: &InclusionMask) -> bool {
        self.summary = None;
        if !self.can_run(series, mask) {
            return false;
        }

        let p = self.n_params();
        let mut rows: Vec<(usize, f64)> = Vec::new();
        for i in mask.included_indices() {
            let Some(y) = series.value(i, self.config.column) else {
                continue;
            };
            if !y.is_finite() {
                continue;
            }
            match self.weight(series, i) {
                Some(w) => rows.push((i, w)),
                None => debug!(index = i, "skipping observation with non-positive sigma"),
            }
        }

        if rows.len() <= p {
            warn!(
                column = self.config.column,
                rows = rows.len(),
                params = p,
                "not enough observations for regression"
            );
            return false;
        }

        let obs = series.observations();
        let mut a = DMatrix::<f64>::zeros(rows.len(), p);
        let mut z = DVector::<f64>::zeros(rows.len());
        let mut design = vec![0.0; p];
        for (r, &(i, w)) in rows.iter().enumerate() {
            let t = obs[i].time();
            self.fill_design_row(t, &mut design);
            for (c, v) in design.iter().enumerate() {
                a[(r, c)] = v * w;
            }
            z[r] = obs[i].fields[self.config.column] * w;
        }

        let mut solver = HouseholderSolver::new(p, DEFAULT_REGULARIZATION);
        solver.accumulate(&mut a, &mut z);
        let (Some(x), Some(se), Some(var)) = (
            solver.solve(),
            solver.standard_errors(),
            solver.variance_factor(),
        ) else {
            warn!(column = self.config.column, "regression solve failed");
            return false;
        };

        self.store(&x, &se);
        let summary = FitSummary {
            rows: rows.len(),
            params: p,
            vtpv: solver.vtpv(),
            sigma0: var.sqrt(),
        };
        info!(
            column = self.config.column,
            rows = summary.rows,
            params = p,
            sigma0 = summary.sigma0,
            "regression fit done"
        );
        self.summary = Some(summary);
        true
    }

    /// Exclude observations whose weighted residual exceeds 5× the fit sigma.
    pub fn eliminate_after(&self, series: &Series, mask: &mut InclusionMask) -> usize {
        if !self.config.eliminate_after {
            return 0;
        }
        let Some(summary) = self.summary else {
            debug!(column = self.config.column, "no fit; skipping residual elimination");
            return 0;
        };
        let threshold = RESIDUAL_REJECTION_FACTOR * summary.sigma0;

        let candidates: Vec<usize> = mask.included_indices().collect();
        let mut excluded = 0;
        for i in candidates {
            let (Some(r), Some(w)) = (self.residual_at(series, i), self.weight(series, i)) else {
                continue;
            };
            let weighted = (r * w).abs();
            if weighted > threshold && mask.exclude(i) {
                warn!(
                    index = i,
                    residual = r,
                    weighted,
                    threshold,
                    "observation excluded: residual above threshold"
                );
                excluded += 1;
            }
        }
        if excluded > 0 {
            info!(column = self.config.column, excluded, "residual elimination done");
        }
        excluded
    }

    /// Full model: polynomial + harmonics + envelope.
    pub fn evaluate_full(&self, t: f64) -> f64 {
        let t0 = self.config.epoch;
        let mut powers = vec![0.0; self.poly.len()];
        fill_powers(poly_arg(t, t0), &mut powers);
        let trend: f64 = self.poly.iter().zip(&powers).map(|(c, p)| c * p).sum();
        let periodic: f64 = self.harmonics.iter().map(|h| h.eval(t, t0)).sum();
        let envelope = self.envelope.as_ref().map(|e| e.eval(t, t0)).unwrap_or(0.0);
        trend + periodic + envelope
    }

    /// Only the harmonic terms (and envelope) flagged `keep`; no polynomial.
    pub fn evaluate_kept(&self, t: f64) -> f64 {
        let t0 = self.config.epoch;
        let periodic: f64 = self
            .harmonics
            .iter()
            .filter(|h| h.keep)
            .map(|h| h.eval(t, t0))
            .sum();
        let envelope = match &self.envelope {
            Some(e) if e.keep => e.eval(t, t0),
            _ => 0.0,
        };
        periodic + envelope
    }

    /// Observed minus full model at observation `index`.
    pub fn residual_at(&self, series: &Series, index: usize) -> Option<f64> {
        let obs = series.get(index)?;
        let y = obs.fields.get(self.config.column)?;
        Some(y - self.evaluate_full(obs.time()))
    }

    pub fn is_fitted(&self) -> bool {
        self.summary.is_some()
    }

    pub fn summary(&self) -> Option<&FitSummary> {
        self.summary.as_ref()
    }

    pub fn polynomial(&self) -> &[f64] {
        &self.poly
    }

    pub fn polynomial_errors(&self) -> &[f64] {
        &self.poly_err
    }

    pub fn harmonics(&self) -> &[HarmonicTerm] {
        &self.harmonics
    }

    pub fn harmonics_mut(&mut self) -> &mut [HarmonicTerm] {
        &mut self.harmonics
    }

    pub fn envelope(&self) -> Option<&EnvelopeTerm> {
        self.envelope.as_ref()
    }

    fn weight(&self, series: &Series, index: usize) -> Option<f64> {
        match self.config.sigma_column {
            None => Some(1.0),
            Some(sc) => {
                let sigma = series.value(index, sc)?;
                (sigma.is_finite() && sigma > 0.0).then(|| 1.0 / sigma)
            }
        }
    }

    fn fill_design_row(&self, t: f64, out: &mut [f64]) {
        let t0 = self.config.epoch;
        let np = self.config.poly_terms;
        fill_powers(poly_arg(t, t0), &mut out[..np]);

        let mut c = np;
        for h in &self.harmonics {
            let (cs, sn) = harmonic(t, t0, h.period);
            out[c] = cs;
            out[c + 1] = sn;
            c += 2;
        }

        if let Some(env) = &self.envelope {
            let (cs, sn) = harmonic(t, t0, env.period);
            let mut powers = vec![0.0; env.order + 1];
            fill_powers(poly_arg(t, t0), &mut powers);
            for p in powers {
                out[c] = p * cs;
                out[c + 1] = p * sn;
                c += 2;
            }
        }
    }

    fn store(&mut self, x: &DVector<f64>, se: &DVector<f64>) {
        let np = self.config.poly_terms;
        self.poly = x.rows(0, np).iter().copied().collect();
        self.poly_err = se.rows(0, np).iter().copied().collect();

        let mut c = np;
        for h in &mut self.harmonics {
            h.cos = x[c];
            h.sin = x[c + 1];
            h.cos_err = se[c];
            h.sin_err = se[c + 1];
            c += 2;
        }

        if let Some(env) = &mut self.envelope {
            for j in 0..=env.order {
                env.coeffs[j] = (x[c], x[c + 1]);
                env.errors[j] = (se[c], se[c + 1]);
                c += 2;
            }
        }
    }
}
