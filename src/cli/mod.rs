//! Command-line parsing for the `tsa` time-series analysis tool.
//!
//! The goal of this module is to keep **argument parsing** and **command dispatch**
//! separate from the estimation code. Arguments are mapped into plain config
//! structs in `app`.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::domain::{ArVariant, ImagPolicy, SigmaLayoutKind, TrendRemoval};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "tsa", version, about = "Time-series analysis: MEM spectra, harmonic regression, Gaussian smoothing")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Estimate an AR model at one order and print/export its spectrum.
    Spectrum(MemArgs),
    /// Scan AR orders and pick the one with the smallest FPE.
    Orders(OrdersArgs),
    /// Re-evaluate a spectrum JSON file on a new frequency grid.
    Psd(PsdArgs),
    /// Fit polynomial + harmonic regression to one column.
    Fit(FitArgs),
    /// Gaussian-kernel smoothing, optionally after model subtraction.
    Smooth(SmoothArgs),
    /// Write a seeded synthetic series.
    Simulate(SimulateArgs),
}

/// Options shared by the MEM subcommands.
#[derive(Debug, Args, Clone)]
pub struct MemArgs {
    /// Series file: `time real [imag]` per line.
    #[arg(value_name = "FILE")]
    pub input: PathBuf,

    /// AR estimation algorithm.
    #[arg(long, value_enum, default_value_t = ArVariant::Recursive)]
    pub variant: ArVariant,

    /// Filter order (clamped to the variant's maximum).
    #[arg(short = 'm', long, default_value_t = 10)]
    pub order: usize,

    /// Remove mean or linear trend from each channel first.
    #[arg(long, value_enum, default_value_t = TrendRemoval::None)]
    pub trend: TrendRemoval,

    /// Accept a single data column with zero imaginary part.
    #[arg(long, value_enum, default_value_t = ImagPolicy::Require)]
    pub imag: ImagPolicy,

    /// Accept non-equidistant epochs (mean spacing is used as Δt).
    #[arg(long)]
    pub allow_uneven: bool,

    /// PSD grid points.
    #[arg(long, default_value_t = 512)]
    pub points: usize,

    /// Evaluate over [-Nyquist, Nyquist].
    #[arg(long)]
    pub two_sided: bool,

    /// Export the PSD curve to CSV.
    #[arg(long)]
    pub export: Option<PathBuf>,

    /// Export the AR model and PSD grid to JSON.
    #[arg(long = "export-json")]
    pub export_json: Option<PathBuf>,
}

#[derive(Debug, Args, Clone)]
pub struct OrdersArgs {
    #[command(flatten)]
    pub mem: MemArgs,

    /// Smallest order scanned.
    #[arg(long, default_value_t = 2)]
    pub min: usize,

    /// Largest order scanned (defaults to the variant's maximum).
    #[arg(long)]
    pub max: Option<usize>,
}

#[derive(Debug, Args, Clone)]
pub struct PsdArgs {
    /// Spectrum JSON produced by `tsa spectrum --export-json`.
    #[arg(value_name = "JSON")]
    pub spectrum: PathBuf,

    #[arg(long, default_value_t = 512)]
    pub points: usize,

    #[arg(long)]
    pub two_sided: bool,

    /// Export the PSD curve to CSV.
    #[arg(long)]
    pub export: Option<PathBuf>,
}

/// Regression model options (shared by `fit` and `smooth`).
#[derive(Debug, Args, Clone)]
pub struct ModelArgs {
    /// Model epoch t0: a number in the series' time unit or YYYY-MM-DD (MJD).
    /// Defaults to the first epoch.
    #[arg(long)]
    pub epoch: Option<String>,

    /// Polynomial terms (1 = offset, 2 = offset + rate, ...).
    #[arg(long, default_value_t = 2)]
    pub poly: usize,

    /// Harmonic period (repeatable or comma-separated).
    #[arg(long = "period", value_delimiter = ',')]
    pub periods: Vec<f64>,

    /// Periods whose harmonic is kept when the model is subtracted.
    #[arg(long = "keep", value_delimiter = ',')]
    pub keep: Vec<f64>,

    /// Period of an extra harmonic with polynomial amplitude envelope.
    #[arg(long)]
    pub envelope_period: Option<f64>,

    /// Highest power of the envelope polynomial.
    #[arg(long, default_value_t = 1)]
    pub envelope_order: usize,

    /// Keep the envelope term when the model is subtracted.
    #[arg(long)]
    pub keep_envelope: bool,

    /// Exclude observations with sigma above 5x the mean sigma.
    #[arg(long)]
    pub eliminate_before: bool,

    /// Exclude observations with weighted residual above 5x sigma0.
    #[arg(long)]
    pub eliminate_after: bool,
}

#[derive(Debug, Args, Clone)]
pub struct FitArgs {
    #[arg(value_name = "FILE")]
    pub input: PathBuf,

    /// Data column (0-based, after the time column).
    #[arg(short = 'c', long, default_value_t = 0)]
    pub column: usize,

    /// Column holding the sigma of `--column`.
    #[arg(short = 's', long)]
    pub sigma_column: Option<usize>,

    #[command(flatten)]
    pub model: ModelArgs,

    /// Show the N largest residuals.
    #[arg(long, default_value_t = 10)]
    pub top: usize,

    /// Export observed-minus-model residuals to CSV.
    #[arg(long)]
    pub export: Option<PathBuf>,
}

#[derive(Debug, Args, Clone)]
pub struct SmoothArgs {
    #[arg(value_name = "FILE")]
    pub input: PathBuf,

    /// Kernel full width at half maximum, in the series' time unit.
    #[arg(long)]
    pub fwhm: f64,

    #[arg(short = 'c', long, default_value_t = 0)]
    pub column: usize,

    #[arg(short = 's', long)]
    pub sigma_column: Option<usize>,

    /// Output grid step (defaults to the mean spacing).
    #[arg(long)]
    pub step: Option<f64>,

    /// Clip observations beyond 3x the column's residual RMS.
    #[arg(long)]
    pub clip: bool,

    /// Fit the model for `--column` and smooth the model-subtracted series.
    #[arg(long)]
    pub minus_model: bool,

    /// Additional columns that get the same model (sigma from `--residuals`).
    #[arg(long = "model-column", value_delimiter = ',')]
    pub model_columns: Vec<usize>,

    #[command(flatten)]
    pub model: ModelArgs,

    /// Write a residual series instead of a smoothed curve.
    #[arg(long, value_enum)]
    pub residuals: Option<SigmaLayoutKind>,

    /// Column offset for `--residuals offset`.
    #[arg(long, default_value_t = 1)]
    pub sigma_offset: usize,

    /// Export to CSV.
    #[arg(long)]
    pub export: Option<PathBuf>,
}

/// Kind of synthetic series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SimKind {
    Ar,
    Harmonic,
}

#[derive(Debug, Args, Clone)]
pub struct SimulateArgs {
    #[arg(long, value_enum, default_value_t = SimKind::Ar)]
    pub kind: SimKind,

    /// Output series file.
    #[arg(short = 'o', long)]
    pub output: PathBuf,

    #[arg(short = 'n', long, default_value_t = 1000)]
    pub samples: usize,

    /// Innovation / noise standard deviation.
    #[arg(long, default_value_t = 1.0)]
    pub sigma: f64,

    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// AR coefficients a_1..a_M (comma-separated).
    #[arg(long = "coeff", value_delimiter = ',', allow_negative_numbers = true, default_value = "0.5")]
    pub coeffs: Vec<f64>,

    /// First epoch (number or YYYY-MM-DD) for harmonic series.
    #[arg(long, default_value = "58000")]
    pub t0: String,

    #[arg(long, default_value_t = 1.0)]
    pub dt: f64,

    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    pub offset: f64,

    /// Trend per year.
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    pub rate: f64,

    /// Harmonic component `period:cos:sin` (repeatable).
    #[arg(long = "component", allow_hyphen_values = true)]
    pub components: Vec<String>,
}
