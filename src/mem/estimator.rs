//! MEM spectral estimator: owns a series, its complex samples and the AR model.
//!
//! Lifecycle:
//!
//! ```text
//! Empty --load()--> Loaded --estimate()--> Ready
//!                     ^                      |
//!                     +-- set_order/variant -+
//! ```
//!
//! `psd()` and `fpe()` only produce values in the `Ready` state.

use std::f64::consts::PI;

use nalgebra::{DMatrix, DVector};
use num_complex::Complex64;
use tracing::{debug, info, warn};

use super::{ArModel, least_squares, recursive};
use crate::domain::{ArVariant, ImagPolicy, TrendRemoval};
use crate::math::{DEFAULT_REGULARIZATION, HouseholderSolver};
use crate::series::Series;

/// Minimum number of observations accepted by `load`.
pub const MIN_SAMPLES: usize = 6;

/// Lowest filter order `estimate` accepts.
pub const MIN_ORDER: usize = 2;

/// Load-time options.
#[derive(Debug, Clone, Copy, Default)]
pub struct MemOptions {
    pub trend: TrendRemoval,
    pub imag: ImagPolicy,
    /// Accept a non-equidistant series (the mean spacing is used as Δt).
    pub allow_uneven: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemState {
    Empty,
    Loaded,
    Ready,
}

/// What was removed from one channel before estimation.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ChannelTrend {
    /// Mean, or the line's value at the first epoch.
    pub shift: f64,
    /// Slope per time unit (zero unless a linear trend was removed).
    pub slope: f64,
}

#[derive(Debug, Clone, Default)]
pub struct MemEstimator {
    series: Series,
    data: Vec<Complex64>,
    dt: f64,
    order: usize,
    variant: ArVariant,
    trend: TrendRemoval,
    real_trend: ChannelTrend,
    imag_trend: ChannelTrend,
    sample_variance: Option<f64>,
    model: Option<ArModel>,
    loaded: bool,
}

impl MemEstimator {
    pub fn new() -> Self {
        Self {
            order: MIN_ORDER,
            ..Self::default()
        }
    }

    /// Parse text into a series and load it.
    pub fn load_text(&mut self, text: &str, options: MemOptions) -> bool {
        let mut series = Series::new();
        series.load(text);
        self.load(series, options)
    }

    /// Take ownership of `series` and prepare complex samples.
    ///
    /// On any validity failure the estimator is reset to `Empty`.
    pub fn load(&mut self, series: Series, options: MemOptions) -> bool {
        let order = self.order;
        let variant = self.variant;
        *self = Self {
            order,
            variant,
            ..Self::default()
        };

        if !series.is_valid() {
            warn!("MEM load rejected: series is not valid");
            return false;
        }
        let n = series.len();
        if n < MIN_SAMPLES {
            warn!(samples = n, required = MIN_SAMPLES, "MEM load rejected: too few samples");
            return false;
        }
        if !series.is_equidistant() && !options.allow_uneven {
            warn!(
                mean_spacing = series.mean_spacing(),
                "MEM load rejected: series is not equidistant"
            );
            return false;
        }
        let columns = series.num_data_columns();
        let has_imag = match (columns, options.imag) {
            (2, _) => true,
            (1, ImagPolicy::Zero) => false,
            _ => {
                warn!(
                    columns,
                    policy = ?options.imag,
                    "MEM load rejected: need two data columns (or one with imaginary part zero)"
                );
                return false;
            }
        };

        let times = series.times();
        let t0 = times[0];
        let mut re = series.column(0);
        let mut im = if has_imag { series.column(1) } else { vec![0.0; n] };

        let real_trend = remove_trend(&times, t0, &mut re, options.trend);
        let imag_trend = remove_trend(&times, t0, &mut im, options.trend);

        self.sample_variance = match options.trend {
            TrendRemoval::None => None,
            t => {
                let ss: f64 = re.iter().zip(&im).map(|(r, i)| r * r + i * i).sum();
                Some(ss / (n - t.n_params()) as f64)
            }
        };

        self.data = re
            .iter()
            .zip(&im)
            .map(|(&r, &i)| Complex64::new(r, i))
            .collect();
        self.dt = series.mean_spacing();
        self.trend = options.trend;
        self.real_trend = real_trend;
        self.imag_trend = imag_trend;
        self.series = series;
        self.loaded = true;
        self.order = self.order.min(self.max_order());

        info!(
            samples = n,
            dt = self.dt,
            trend = ?options.trend,
            complex = has_imag,
            "MEM series loaded"
        );
        true
    }

    pub fn state(&self) -> MemState {
        match (self.loaded, self.model.is_some()) {
            (false, _) => MemState::Empty,
            (true, false) => MemState::Loaded,
            (true, true) => MemState::Ready,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.loaded
    }

    pub fn is_ready(&self) -> bool {
        self.state() == MemState::Ready
    }

    /// Set the filter order, clamped to the variant maximum. Returns the
    /// order actually set.
    pub fn set_order(&mut self, order: usize) -> usize {
        let clamped = if self.loaded {
            order.min(self.max_order())
        } else {
            order
        };
        if clamped != order {
            debug!(requested = order, clamped, "filter order clamped");
        }
        if clamped != self.order {
            self.order = clamped;
            self.model = None;
        }
        clamped
    }

    pub fn set_variant(&mut self, variant: ArVariant) {
        if variant != self.variant {
            self.variant = variant;
            self.model = None;
            if self.loaded {
                self.order = self.order.min(self.max_order());
            }
        }
    }

    /// Run the selected algorithm at the current order.
    pub fn estimate(&mut self) -> bool {
        self.model = None;
        if !self.loaded {
            warn!("MEM estimate requested before a successful load");
            return false;
        }
        if self.order < MIN_ORDER {
            warn!(order = self.order, min = MIN_ORDER, "filter order below minimum");
            return false;
        }

        let model = match self.variant {
            ArVariant::Recursive => recursive::estimate(&self.data, self.order),
            ArVariant::Forward => {
                least_squares::estimate(&self.data, self.order, least_squares::Sides::Forward)
            }
            ArVariant::Backward => {
                least_squares::estimate(&self.data, self.order, least_squares::Sides::Backward)
            }
            ArVariant::ForwardBackward => {
                least_squares::estimate(&self.data, self.order, least_squares::Sides::Both)
            }
        };

        match model {
            Some(m) if m.power.is_finite() => {
                debug!(order = self.order, variant = ?self.variant, power = m.power, "AR model ready");
                self.model = Some(m);
                true
            }
            _ => {
                warn!(order = self.order, variant = ?self.variant, "AR estimation failed");
                false
            }
        }
    }

    /// Power spectral density at frequency `f` (cycles per time unit).
    ///
    /// Zero beyond Nyquist or when no model is ready.
    pub fn psd(&self, f: f64) -> f64 {
        let Some(model) = &self.model else {
            return 0.0;
        };
        if f.abs() > self.nyquist() {
            return 0.0;
        }
        psd_from_coeffs(&model.coeffs, model.power, self.dt, f)
    }

    /// PSD on `points` equally spaced frequencies over `[0, Nyquist]`, or
    /// `[-Nyquist, Nyquist]` when `two_sided`.
    pub fn psd_curve(&self, points: usize, two_sided: bool) -> Vec<(f64, f64)> {
        frequency_grid(self.nyquist(), points, two_sided)
            .into_iter()
            .map(|f| (f, self.psd(f)))
            .collect()
    }

    /// Final prediction error of the current model.
    pub fn fpe(&self) -> Option<f64> {
        let model = self.model.as_ref()?;
        let n = self.data.len() as f64;
        let m = self.order as f64;
        let value = if self.trend == TrendRemoval::None {
            model.power * (n + m) / (n - m)
        } else {
            model.power * (n + m + 1.0) / (n - m - 1.0)
        };
        Some(value)
    }

    pub fn n(&self) -> usize {
        self.data.len()
    }

    pub fn order(&self) -> usize {
        self.order
    }

    pub fn min_order(&self) -> usize {
        MIN_ORDER
    }

    /// Largest order the current variant supports for the loaded samples.
    pub fn max_order(&self) -> usize {
        self.variant.max_order(self.data.len())
    }

    pub fn variant(&self) -> ArVariant {
        self.variant
    }

    pub fn trend_removal(&self) -> TrendRemoval {
        self.trend
    }

    pub fn sample_interval(&self) -> f64 {
        self.dt
    }

    pub fn nyquist(&self) -> f64 {
        if self.dt > 0.0 { 0.5 / self.dt } else { 0.0 }
    }

    pub fn coefficients(&self) -> Option<&[Complex64]> {
        self.model.as_ref().map(|m| m.coeffs.as_slice())
    }

    pub fn power(&self) -> Option<f64> {
        self.model.as_ref().map(|m| m.power)
    }

    pub fn real_trend(&self) -> ChannelTrend {
        self.real_trend
    }

    pub fn imag_trend(&self) -> ChannelTrend {
        self.imag_trend
    }

    pub fn sample_variance(&self) -> Option<f64> {
        self.sample_variance
    }

    pub fn series(&self) -> &Series {
        &self.series
    }

    /// Samples after trend removal.
    pub fn samples(&self) -> &[Complex64] {
        &self.data
    }
}

/// `P·Δt / |1 - Σ a_k e^{-2πi f k Δt}|²`.
pub fn psd_from_coeffs(coeffs: &[Complex64], power: f64, dt: f64, f: f64) -> f64 {
    let mut denom = Complex64::new(1.0, 0.0);
    for (k, a) in coeffs.iter().enumerate() {
        let phase = -2.0 * PI * f * (k + 1) as f64 * dt;
        denom -= a * Complex64::from_polar(1.0, phase);
    }
    let d = denom.norm_sqr();
    if d > 0.0 { power * dt / d } else { f64::INFINITY }
}

/// Equally spaced frequencies up to `nyquist`.
pub fn frequency_grid(nyquist: f64, points: usize, two_sided: bool) -> Vec<f64> {
    let points = points.max(2);
    let (lo, hi) = if two_sided { (-nyquist, nyquist) } else { (0.0, nyquist) };
    (0..points)
        .map(|i| lo + (hi - lo) * i as f64 / (points - 1) as f64)
        .collect()
}

fn remove_trend(times: &[f64], t0: f64, values: &mut [f64], trend: TrendRemoval) -> ChannelTrend {
    match trend {
        TrendRemoval::None => ChannelTrend::default(),
        TrendRemoval::Mean => {
            let mean = values.iter().sum::<f64>() / values.len() as f64;
            values.iter_mut().for_each(|v| *v -= mean);
            ChannelTrend {
                shift: mean,
                slope: 0.0,
            }
        }
        TrendRemoval::Linear => {
            let k = values.len();
            let mut a = DMatrix::from_fn(k, 2, |i, j| if j == 0 { 1.0 } else { times[i] - t0 });
            let mut z = DVector::from_column_slice(values);
            let mut solver = HouseholderSolver::new(2, DEFAULT_REGULARIZATION);
            solver.accumulate(&mut a, &mut z);
            let Some(x) = solver.solve() else {
                warn!("linear trend fit failed; leaving channel unchanged");
                return ChannelTrend::default();
            };
            for (v, &t) in values.iter_mut().zip(times) {
                *v -= x[0] + x[1] * (t - t0);
            }
            ChannelTrend {
                shift: x[0],
                slope: x[1],
            }
        }
    }
}
