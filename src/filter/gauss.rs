//! Gaussian-kernel smoothing with optional model subtraction.
//!
//! `GaussFilter` owns the series, a "series minus models" working copy, the
//! regression models keyed by target column and the inclusion mask they
//! share. `prepare_models` drives the mask phases in a fixed order:
//!
//! 1. sigma elimination for every model
//! 2. every fit
//! 3. residual elimination for every model
//!
//! and then subtracts each full model from its column of the working copy.

use std::collections::BTreeMap;
use std::f64::consts::PI;

use tracing::{debug, info, warn};

use crate::domain::SigmaLayout;
use crate::models::{InclusionMask, RegressionConfig, RegressionModel};
use crate::series::{LoadReport, Observation, Series};

/// FWHM / σ of a Gaussian: `2·sqrt(2·ln 2)`.
pub const FWHM_TO_SIGMA: f64 = 2.35482;

/// Interpolation support extends this many mean spacings past either end.
const SUPPORT_MARGIN: f64 = 2.0;

/// Residuals beyond this multiple of the column RMS are clipped.
const CLIP_FACTOR: f64 = 3.0;

const MIN_OBSERVATIONS: usize = 3;

/// Upper bound on `smooth_grid` points.
pub const MAX_GRID_POINTS: usize = 1_000_000;

/// One kernel estimate. All zeros is the out-of-range sentinel.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Interpolated {
    pub value: f64,
    pub std_error: f64,
    /// Observations that carried weight.
    pub n_used: usize,
}

/// Per-column residual statistics from `calc_sigma`.
#[derive(Debug, Clone, PartialEq)]
struct ClipState {
    rms: f64,
    /// Observed minus smoothed, per observation (NaN where unavailable).
    residuals: Vec<f64>,
}

#[derive(Debug, Clone)]
pub struct GaussFilter {
    series: Series,
    working: Series,
    models: BTreeMap<usize, RegressionModel>,
    mask: InclusionMask,
    fwhm: f64,
    clipping: bool,
    clip: BTreeMap<usize, ClipState>,
    valid: bool,
}

impl GaussFilter {
    pub fn new(fwhm: f64) -> Self {
        let mut filter = Self {
            series: Series::new(),
            working: Series::new(),
            models: BTreeMap::new(),
            mask: InclusionMask::default(),
            fwhm: 1.0,
            clipping: false,
            clip: BTreeMap::new(),
            valid: false,
        };
        filter.set_fwhm(fwhm);
        filter
    }

    /// Parse `text` into the owned series.
    ///
    /// Needs at least three observations, a positive mean spacing and one
    /// data column; otherwise the filter stays invalid.
    pub fn load(&mut self, text: &str) -> LoadReport {
        let mut series = Series::new();
        let report = series.load(text);
        self.set_series(series);
        report
    }

    pub fn set_series(&mut self, series: Series) -> bool {
        self.series = series;
        self.clip.clear();
        self.valid = false;

        if !self.series.is_valid() || self.series.len() < MIN_OBSERVATIONS {
            warn!(
                observations = self.series.len(),
                min = MIN_OBSERVATIONS,
                "filter needs more valid observations"
            );
        } else if !(self.series.mean_spacing().is_finite() && self.series.mean_spacing() > 0.0) {
            warn!(spacing = self.series.mean_spacing(), "filter needs a positive mean spacing");
        } else if self.series.num_data_columns() == 0 {
            warn!("filter needs at least one data column");
        } else {
            self.valid = true;
        }

        if !self.valid {
            self.series.clear();
        }
        self.working = self.series.clone();
        self.mask.reset(self.series.len());
        self.valid
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn series(&self) -> &Series {
        &self.series
    }

    /// Series after model subtraction.
    pub fn working(&self) -> &Series {
        &self.working
    }

    pub fn mask(&self) -> &InclusionMask {
        &self.mask
    }

    /// Register a model for its target column, replacing any previous one.
    pub fn add_model(&mut self, config: RegressionConfig) {
        let column = config.column;
        if self.models.insert(column, RegressionModel::new(config)).is_some() {
            debug!(column, "replaced regression model");
        }
    }

    pub fn model(&self, column: usize) -> Option<&RegressionModel> {
        self.models.get(&column)
    }

    pub fn models(&self) -> impl Iterator<Item = &RegressionModel> {
        self.models.values()
    }

    /// Run elimination and fitting for all models, then build the working copy.
    ///
    /// Returns true if every registered model fitted.
    pub fn prepare_models(&mut self) -> bool {
        self.mask.reset(self.series.len());
        self.working = self.series.clone();
        if !self.valid {
            warn!("prepare_models on an invalid filter");
            return false;
        }

        for model in self.models.values() {
            model.eliminate_before(&self.series, &mut self.mask);
        }

        let mut all_fitted = true;
        for model in self.models.values_mut() {
            if !model.fit(&self.series, &self.mask) {
                warn!(column = model.column(), "regression model did not fit");
                all_fitted = false;
            }
        }

        for model in self.models.values() {
            if model.is_fitted() {
                model.eliminate_after(&self.series, &mut self.mask);
            }
        }

        for model in self.models.values().filter(|m| m.is_fitted()) {
            let column = model.column();
            for i in self.mask.included_indices() {
                if let Some(obs) = self.working.get_mut(i) {
                    let t = obs.time();
                    if let Some(v) = obs.fields.get_mut(column) {
                        *v -= model.evaluate_full(t);
                    }
                }
            }
        }

        info!(
            models = self.models.len(),
            included = self.mask.count_included(),
            observations = self.series.len(),
            "models prepared"
        );
        all_fitted
    }

    /// Non-positive or non-finite widths are ignored.
    pub fn set_fwhm(&mut self, fwhm: f64) {
        if fwhm.is_finite() && fwhm > 0.0 {
            self.fwhm = fwhm;
            self.clip.clear();
        } else {
            warn!(fwhm, "ignoring invalid FWHM");
        }
    }

    pub fn fwhm(&self) -> f64 {
        self.fwhm
    }

    pub fn kernel_sigma(&self) -> f64 {
        self.fwhm / FWHM_TO_SIGMA
    }

    /// Restrict kernel sums to observations that passed `calc_sigma` clipping.
    pub fn set_clipping(&mut self, on: bool) {
        self.clipping = on;
    }

    /// Gain of the kernel at frequency `f`.
    pub fn resp_func(&self, f: f64) -> f64 {
        let x = PI * f * self.kernel_sigma();
        (-2.0 * x * x).exp()
    }

    /// Kernel estimate of `column` at `t` over the raw series.
    pub fn interpolate(&self, t: f64, column: usize, sigma_column: Option<usize>) -> Interpolated {
        self.kernel_average(&self.series, t, column, sigma_column, false)
    }

    /// Kernel estimate over the working copy (included rows only), plus the
    /// column model's kept terms.
    pub fn interpolate_minus_model(
        &self,
        t: f64,
        column: usize,
        sigma_column: Option<usize>,
    ) -> Interpolated {
        let mut est = self.kernel_average(&self.working, t, column, sigma_column, true);
        if est.n_used == 0 {
            return est;
        }
        if let Some(model) = self.models.get(&column).filter(|m| m.is_fitted()) {
            est.value += model.evaluate_kept(t);
        }
        est
    }

    /// RMS of observed minus smoothed for `column`; stored for clipping.
    pub fn calc_sigma(&mut self, column: usize, sigma_column: Option<usize>) -> Option<f64> {
        if !self.valid || column >= self.series.num_data_columns() {
            return None;
        }
        self.clip.remove(&column);

        let residuals: Vec<f64> = self
            .series
            .observations()
            .iter()
            .map(|obs| {
                let est = self.interpolate(obs.time(), column, sigma_column);
                if est.n_used == 0 {
                    f64::NAN
                } else {
                    obs.fields[column] - est.value
                }
            })
            .collect();

        let finite: Vec<f64> = residuals.iter().copied().filter(|r| r.is_finite()).collect();
        if finite.is_empty() {
            return None;
        }
        let rms = (finite.iter().map(|r| r * r).sum::<f64>() / finite.len() as f64).sqrt();
        debug!(column, rms, "column residual RMS");
        self.clip.insert(column, ClipState { rms, residuals });
        Some(rms)
    }

    /// Smoothed curve from series start to end every `step` (mean spacing
    /// when `None`).
    pub fn smooth_grid(
        &self,
        column: usize,
        sigma_column: Option<usize>,
        step: Option<f64>,
        minus_model: bool,
    ) -> Vec<(f64, Interpolated)> {
        let (Some(start), Some(end)) = (self.series.start(), self.series.end()) else {
            return Vec::new();
        };
        let step = step.unwrap_or(self.series.mean_spacing());
        if !(step.is_finite() && step > 0.0) {
            warn!(step, "invalid smoothing grid step");
            return Vec::new();
        }

        let span = ((end - start) / step).floor();
        if !(span < MAX_GRID_POINTS as f64) {
            warn!(step, points = span + 1.0, max = MAX_GRID_POINTS, "smoothing grid too dense");
            return Vec::new();
        }
        let n = span as usize + 1;
        (0..n)
            .map(|i| {
                let t = start + i as f64 * step;
                let est = if minus_model {
                    self.interpolate_minus_model(t, column, sigma_column)
                } else {
                    self.interpolate(t, column, sigma_column)
                };
                (t, est)
            })
            .collect()
    }

    /// Residual series at the observation epochs.
    ///
    /// Every value column named by `layout` has its kernel estimate (with its
    /// own sigma column as weight) subtracted; sigma columns are copied.
    pub fn subtract_filter(&self, use_model: bool, layout: SigmaLayout) -> Option<Series> {
        if !self.valid {
            warn!("subtract_filter on an invalid filter");
            return None;
        }
        let pairs = layout.column_pairs(self.series.num_data_columns());
        if pairs.is_empty() {
            warn!(
                ?layout,
                columns = self.series.num_data_columns(),
                "sigma layout selects no value columns"
            );
            return None;
        }

        let obs = self
            .series
            .observations()
            .iter()
            .map(|o| {
                let t = o.time();
                let mut fields = o.fields.clone();
                for &(c, s) in &pairs {
                    let est = if use_model {
                        self.interpolate_minus_model(t, c, Some(s))
                    } else {
                        self.interpolate(t, c, Some(s))
                    };
                    fields[c] -= est.value;
                }
                Observation::new(t, fields)
            })
            .collect();
        Some(Series::from_observations(obs))
    }

    fn in_support(&self, t: f64) -> bool {
        let (Some(start), Some(end)) = (self.series.start(), self.series.end()) else {
            return false;
        };
        let margin = SUPPORT_MARGIN * self.series.mean_spacing();
        t >= start - margin && t <= end + margin
    }

    fn kernel_average(
        &self,
        source: &Series,
        t: f64,
        column: usize,
        sigma_column: Option<usize>,
        included_only: bool,
    ) -> Interpolated {
        if !self.valid || column >= source.num_data_columns() || !self.in_support(t) {
            return Interpolated::default();
        }
        let clip = if self.clipping {
            self.clip.get(&column)
        } else {
            None
        };
        let ks = self.kernel_sigma();

        // (log weight, value) per contributing observation.
        let mut terms: Vec<(f64, f64)> = Vec::with_capacity(source.len());
        for (i, obs) in source.observations().iter().enumerate() {
            if included_only && !self.mask.is_included(i) {
                continue;
            }
            if let Some(state) = clip {
                let r = state.residuals.get(i).copied().unwrap_or(f64::NAN);
                if !(r.abs() <= CLIP_FACTOR * state.rms) {
                    continue;
                }
            }
            let y = obs.fields[column];
            if !y.is_finite() {
                continue;
            }
            let log_prior = match sigma_column.and_then(|s| obs.fields.get(s).copied()) {
                None if sigma_column.is_none() => 0.0,
                Some(sigma) if sigma.is_finite() && sigma > 0.0 => -2.0 * sigma.ln(),
                _ => continue,
            };
            let u = (t - obs.time()) / ks;
            terms.push((log_prior - 0.5 * u * u, y));
        }

        let Some(max_log) = terms.iter().map(|(lw, _)| *lw).reduce(f64::max) else {
            return Interpolated::default();
        };

        let mut sw = 0.0;
        let mut swy = 0.0;
        for (lw, y) in &mut terms {
            *lw = (*lw - max_log).exp();
            sw += *lw;
            swy += *lw * *y;
        }
        let value = swy / sw;
        let var: f64 = terms
            .iter()
            .map(|(w, y)| (w * (y - value)).powi(2))
            .sum();
        let n_used = terms.iter().filter(|(w, _)| *w > 0.0).count();

        Interpolated {
            value,
            std_error: var.sqrt() / sw,
            n_used,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::synthetic::{HarmonicComponent, HarmonicSignal, harmonic_series};
    use crate::models::PeriodSpec;

    fn ramp_text() -> String {
        // t, y, sigma
        [(0.0, 1.0), (1.0, 3.0), (2.0, 2.0), (3.0, 6.0), (4.0, 4.0)]
            .iter()
            .map(|(t, y)| format!("{t} {y} 0.5\n"))
            .collect()
    }

    #[test]
    fn rejects_short_series() {
        let mut filter = GaussFilter::new(2.0);
        filter.load("0 1\n1 2\n");
        assert!(!filter.is_valid());
        assert_eq!(filter.interpolate(0.5, 0, None), Interpolated::default());
    }

    #[test]
    fn non_finite_epochs_never_widen_the_support() {
        let mut filter = GaussFilter::new(1.0);
        let report = filter.load("0 1\n1 2\n2 3\ninf 4\n");
        assert_eq!(report.rejected.len(), 1);
        assert!(filter.is_valid());
        assert_eq!(filter.interpolate(1e9, 0, None), Interpolated::default());

        let mut series = Series::new();
        series.load("0 1\n1 2\n2 3\n");
        series.push(Observation::new(f64::INFINITY, vec![4.0]));
        assert!(!filter.set_series(series));
        assert_eq!(filter.interpolate(1.0, 0, None), Interpolated::default());
    }

    #[test]
    fn wide_kernel_gives_the_mean() {
        let mut filter = GaussFilter::new(1e6);
        filter.load(&ramp_text());
        assert!(filter.is_valid());
        let est = filter.interpolate(2.0, 0, None);
        assert!((est.value - 3.2).abs() < 1e-6, "{}", est.value);
        assert_eq!(est.n_used, 5);
    }

    #[test]
    fn narrow_kernel_gives_nearest_observation() {
        let mut filter = GaussFilter::new(1e-3);
        filter.load(&ramp_text());
        assert!((filter.interpolate(2.9, 0, Some(1)).value - 6.0).abs() < 1e-12);
        assert!((filter.interpolate(1.2, 0, None).value - 3.0).abs() < 1e-12);
    }

    #[test]
    fn outside_support_and_bad_column_are_zero() {
        let mut filter = GaussFilter::new(1.0);
        filter.load(&ramp_text());
        // Support is [-2, 6] for unit spacing.
        assert_eq!(filter.interpolate(6.5, 0, None), Interpolated::default());
        assert_eq!(filter.interpolate(-2.5, 0, None), Interpolated::default());
        assert!(filter.interpolate(5.5, 0, None).n_used > 0);
        assert_eq!(filter.interpolate(2.0, 7, None), Interpolated::default());
    }

    #[test]
    fn response_function_halves_at_expected_frequency() {
        let filter = GaussFilter::new(10.0);
        assert_eq!(filter.resp_func(0.0), 1.0);
        let ks = filter.kernel_sigma();
        let f_half = (0.5f64.ln() / -2.0).sqrt() / (PI * ks);
        assert!((filter.resp_func(f_half) - 0.5).abs() < 1e-12);
        assert!(filter.resp_func(1.0) < 1e-6);
    }

    #[test]
    fn clipping_drops_outlier() {
        let mut text = String::new();
        for i in 0..40 {
            let y = if i == 20 { 100.0 } else { 1.0 + 0.01 * (i % 3) as f64 };
            text.push_str(&format!("{i} {y}\n"));
        }
        let mut filter = GaussFilter::new(6.0);
        filter.load(&text);
        let raw = filter.interpolate(20.0, 0, None).value;
        assert!(filter.calc_sigma(0, None).unwrap() > 1.0);
        filter.set_clipping(true);
        let clipped = filter.interpolate(20.0, 0, None);
        assert!(raw > 5.0);
        assert!((clipped.value - 1.01).abs() < 0.02, "{}", clipped.value);
        assert_eq!(clipped.n_used, 39);
    }

    #[test]
    fn model_subtraction_keeps_only_flagged_terms() {
        let signal = HarmonicSignal {
            t0: 0.0,
            dt: 1.0,
            n: 400,
            offset: 10.0,
            rate: 3.0,
            components: vec![
                HarmonicComponent { period: 50.0, cos: 2.0, sin: 0.0 },
                HarmonicComponent { period: 7.0, cos: 0.0, sin: 1.0 },
            ],
            noise_sigma: 0.0,
            with_sigma: false,
        };
        let series = harmonic_series(&signal, 3).unwrap();
        let mut filter = GaussFilter::new(3.0);
        assert!(filter.set_series(series));
        filter.add_model(RegressionConfig {
            column: 0,
            sigma_column: None,
            epoch: 0.0,
            poly_terms: 2,
            periods: vec![
                PeriodSpec { period: 50.0, keep: true },
                PeriodSpec { period: 7.0, keep: false },
            ],
            envelope: None,
            eliminate_before: true,
            eliminate_after: false,
        });
        assert!(filter.prepare_models());
        assert_eq!(filter.mask().count_included(), 400);

        // Working copy is flat; the kept 50-day term comes back.
        for t in [100.0, 137.0, 250.0] {
            let est = filter.interpolate_minus_model(t, 0, None);
            let kept = 2.0 * (2.0 * PI * t / 50.0).cos();
            assert!((est.value - kept).abs() < 1e-6, "t={t}: {} vs {kept}", est.value);
        }
    }

    #[test]
    fn subtract_filter_copies_sigmas() {
        let text = "0 1 0.1\n1 2 0.1\n2 3 0.1\n3 4 0.1\n";
        let mut filter = GaussFilter::new(1e-3);
        filter.load(text);
        let residuals = filter.subtract_filter(false, SigmaLayout::Pairs).unwrap();
        assert_eq!(residuals.len(), 4);
        for obs in residuals.observations() {
            assert!(obs.fields[0].abs() < 1e-12);
            assert_eq!(obs.fields[1], 0.1);
        }
        assert!(filter.subtract_filter(false, SigmaLayout::Offset(5)).is_none());
    }

    #[test]
    fn smooth_grid_spans_the_series() {
        let mut filter = GaussFilter::new(2.0);
        filter.load(&ramp_text());
        let grid = filter.smooth_grid(0, Some(1), Some(0.5), false);
        assert_eq!(grid.len(), 9);
        assert_eq!(grid[0].0, 0.0);
        assert_eq!(grid[8].0, 4.0);
        assert!(grid.iter().all(|(_, e)| e.n_used == 5));
    }

    #[test]
    fn smooth_grid_refuses_overly_dense_steps() {
        let mut filter = GaussFilter::new(2.0);
        filter.load(&ramp_text());
        assert!(filter.smooth_grid(0, None, Some(1e-12), false).is_empty());
        assert_eq!(filter.smooth_grid(0, None, Some(1e-3), false).len(), 4001);
    }
}
