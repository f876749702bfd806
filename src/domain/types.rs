//! Shared domain types.
//!
//! These types are kept lightweight and serializable so they can be:
//!
//! - selected from the command line (`clap::ValueEnum`)
//! - carried through the engine
//! - written to JSON exports and read back

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::ValueEnum;
use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use crate::models::RegressionConfig;

/// Algorithm used to estimate the AR coefficients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ArVariant {
    /// Order-recursive (Burg-type) estimation.
    #[default]
    Recursive,
    /// Least-squares forward prediction.
    Forward,
    /// Least-squares backward prediction.
    Backward,
    /// Least-squares forward and backward prediction combined.
    ForwardBackward,
}

impl ArVariant {
    pub const ALL: [ArVariant; 4] = [
        ArVariant::Recursive,
        ArVariant::Forward,
        ArVariant::Backward,
        ArVariant::ForwardBackward,
    ];

    /// Largest usable filter order for `n` samples.
    pub fn max_order(self, n: usize) -> usize {
        match self {
            ArVariant::Recursive => n.saturating_sub(2),
            ArVariant::Forward | ArVariant::Backward => (n / 2).saturating_sub(1),
            ArVariant::ForwardBackward => (2 * n / 3).saturating_sub(1),
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            ArVariant::Recursive => "recursive (Burg)",
            ArVariant::Forward => "least-squares forward",
            ArVariant::Backward => "least-squares backward",
            ArVariant::ForwardBackward => "least-squares forward+backward",
        }
    }
}

/// What to remove from each channel before AR estimation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum, Default)]
#[serde(rename_all = "lowercase")]
pub enum TrendRemoval {
    /// Use the data as-is.
    #[default]
    None,
    /// Subtract the mean.
    Mean,
    /// Subtract the best-fit straight line (mean included).
    Linear,
}

impl TrendRemoval {
    /// Number of parameters estimated per channel.
    pub fn n_params(self) -> usize {
        match self {
            TrendRemoval::None => 0,
            TrendRemoval::Mean => 1,
            TrendRemoval::Linear => 2,
        }
    }
}

/// How a single-column series is turned into complex samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum, Default)]
#[serde(rename_all = "lowercase")]
pub enum ImagPolicy {
    /// Require two data columns (real, imaginary).
    #[default]
    Require,
    /// Accept one data column and treat the imaginary part as zero.
    Zero,
}

/// Where the sigma of each data column lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SigmaLayout {
    /// First half of the columns are values, second half their sigmas.
    ErrorColumns,
    /// The sigma of column `c` is column `c + k`.
    Offset(usize),
    /// `(value, sigma)` pairs in adjacent columns.
    Pairs,
}

impl SigmaLayout {
    /// `(value column, sigma column)` pairs for a series with `n_fields` fields.
    pub fn column_pairs(self, n_fields: usize) -> Vec<(usize, usize)> {
        match self {
            SigmaLayout::ErrorColumns => {
                let half = n_fields / 2;
                (0..half).map(|c| (c, c + half)).collect()
            }
            SigmaLayout::Offset(k) => {
                if k == 0 || k >= n_fields {
                    return Vec::new();
                }
                (0..n_fields - k).filter(|c| *c < k).map(|c| (c, c + k)).collect()
            }
            SigmaLayout::Pairs => (0..n_fields / 2).map(|p| (2 * p, 2 * p + 1)).collect(),
        }
    }
}

/// CLI-facing selector for `SigmaLayout` (the offset travels separately).
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SigmaLayoutKind {
    ErrorColumns,
    Offset,
    Pairs,
}

impl SigmaLayoutKind {
    pub fn with_offset(self, offset: usize) -> SigmaLayout {
        match self {
            SigmaLayoutKind::ErrorColumns => SigmaLayout::ErrorColumns,
            SigmaLayoutKind::Offset => SigmaLayout::Offset(offset),
            SigmaLayoutKind::Pairs => SigmaLayout::Pairs,
        }
    }
}

/// Resolved configuration for a MEM run (`tsa spectrum` / `tsa orders`).
#[derive(Debug, Clone)]
pub struct MemConfig {
    pub input: PathBuf,
    pub variant: ArVariant,
    pub order: usize,
    pub trend: TrendRemoval,
    pub imag: ImagPolicy,
    pub allow_uneven: bool,
    /// Number of PSD grid points.
    pub points: usize,
    /// Evaluate over `[-Nyquist, Nyquist]` instead of `[0, Nyquist]`.
    pub two_sided: bool,
    /// Order range scanned by `tsa orders`.
    pub scan_min: usize,
    pub scan_max: Option<usize>,
    pub export_psd: Option<PathBuf>,
    pub export_json: Option<PathBuf>,
}

/// Resolved configuration for the Gaussian filter (`tsa smooth`).
#[derive(Debug, Clone)]
pub struct SmoothConfig {
    pub input: PathBuf,
    pub fwhm: f64,
    pub column: usize,
    pub sigma_column: Option<usize>,
    /// Grid step from the first epoch; `None` uses the mean spacing.
    pub step: Option<f64>,
    pub minus_model: bool,
    pub clip: bool,
    /// Produce a residual series instead of a smoothed curve.
    pub residuals: Option<SigmaLayout>,
    /// Models fitted and subtracted before smoothing.
    pub models: Vec<RegressionConfig>,
    /// Model epoch; `None` uses the first observation.
    pub epoch: Option<f64>,
    pub export: Option<PathBuf>,
}

/// Resolved configuration for a standalone regression (`tsa fit`).
#[derive(Debug, Clone)]
pub struct FitConfig {
    pub input: PathBuf,
    pub model: RegressionConfig,
    /// Model epoch; `None` uses the first observation.
    pub epoch: Option<f64>,
    /// Largest residuals shown.
    pub top_n: usize,
    /// Observed-minus-model residuals CSV.
    pub export: Option<PathBuf>,
}

/// Kind of synthetic series written by `tsa simulate`.
#[derive(Debug, Clone, PartialEq)]
pub enum SimulateKind {
    /// Real AR process with the given coefficients, Δt = 1.
    Ar { coeffs: Vec<f64> },
    /// Linear trend plus harmonics at the given periods, with a sigma column.
    Harmonic {
        t0: f64,
        dt: f64,
        offset: f64,
        rate: f64,
        /// `(period, cos, sin)` per component.
        components: Vec<(f64, f64, f64)>,
    },
}

#[derive(Debug, Clone)]
pub struct SimulateConfig {
    pub kind: SimulateKind,
    pub n: usize,
    pub noise_sigma: f64,
    pub seed: u64,
    pub output: PathBuf,
}

/// Evaluated PSD grid stored alongside the AR model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpectrumGrid {
    pub frequency: Vec<f64>,
    pub psd: Vec<f64>,
}

/// Portable AR spectrum: enough to re-evaluate the PSD without the data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpectrumFile {
    pub tool: String,
    pub generated_at: DateTime<Utc>,
    pub source: String,
    pub variant: ArVariant,
    pub trend: TrendRemoval,
    pub samples: usize,
    pub order: usize,
    pub sample_interval: f64,
    pub power: f64,
    pub fpe: Option<f64>,
    /// `a_1..a_M`, each serialized as `[re, im]`.
    pub coefficients: Vec<Complex64>,
    pub grid: SpectrumGrid,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn max_orders_follow_variant_rules() {
        assert_eq!(ArVariant::Recursive.max_order(100), 98);
        assert_eq!(ArVariant::Forward.max_order(100), 49);
        assert_eq!(ArVariant::Backward.max_order(101), 49);
        assert_eq!(ArVariant::ForwardBackward.max_order(100), 65);
        assert_eq!(ArVariant::Recursive.max_order(1), 0);
    }

    #[test]
    fn sigma_layout_pairs() {
        assert_eq!(SigmaLayout::ErrorColumns.column_pairs(4), vec![(0, 2), (1, 3)]);
        assert_eq!(SigmaLayout::Pairs.column_pairs(5), vec![(0, 1), (2, 3)]);
        assert_eq!(SigmaLayout::Offset(3).column_pairs(6), vec![(0, 3), (1, 4), (2, 5)]);
        assert_eq!(SigmaLayout::Offset(4).column_pairs(6), vec![(0, 4), (1, 5)]);
        assert!(SigmaLayout::Offset(0).column_pairs(6).is_empty());
    }
}
