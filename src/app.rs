//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - sets up logging
//! - parses CLI arguments into config structs
//! - runs the subcommand pipeline
//! - prints reports
//! - writes optional exports

use clap::Parser;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use crate::cli::{Command, FitArgs, MemArgs, ModelArgs, OrdersArgs, PsdArgs, SimKind, SimulateArgs, SmoothArgs};
use crate::data::synthetic::{HarmonicComponent, HarmonicSignal, ar_process, harmonic_series};
use crate::domain::{FitConfig, MemConfig, SimulateConfig, SimulateKind, SmoothConfig, parse_epoch};
use crate::error::AppError;
use crate::models::{EnvelopeSpec, PeriodSpec, RegressionConfig};

pub mod pipeline;

use pipeline::SmoothOutput;

/// Periods closer than this are treated as equal when matching `--keep`.
const PERIOD_MATCH_TOLERANCE: f64 = 1e-9;

/// Entry point for the `tsa` binary.
pub fn run() -> Result<(), AppError> {
    init_logging();
    let cli = crate::cli::Cli::parse();

    match cli.command {
        Command::Spectrum(args) => handle_spectrum(args),
        Command::Orders(args) => handle_orders(args),
        Command::Psd(args) => handle_psd(args),
        Command::Fit(args) => handle_fit(args),
        Command::Smooth(args) => handle_smooth(args),
        Command::Simulate(args) => handle_simulate(args),
    }
}

/// `.env` first, then `RUST_LOG` (default `geo_tsa=info`); logs go to stderr.
fn init_logging() {
    dotenvy::dotenv().ok();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("geo_tsa=info"));
    // A second init (e.g. from tests) is harmless.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .try_init();
}

fn handle_spectrum(args: MemArgs) -> Result<(), AppError> {
    let config = mem_config_from_args(&args, 2, None);
    let run = pipeline::run_spectrum(&config)?;

    let source = config.input.display().to_string();
    println!("{}", crate::report::format_series_summary(&source, &run.ingest));
    println!("{}", crate::report::format_mem_summary(&run.mem, run.peak));

    write_mem_exports(&config, &run)
}

fn handle_orders(args: OrdersArgs) -> Result<(), AppError> {
    let config = mem_config_from_args(&args.mem, args.min, args.max);
    let run = pipeline::run_orders(&config)?;

    let source = config.input.display().to_string();
    println!("{}", crate::report::format_series_summary(&source, &run.ingest));
    if let Some(scan) = &run.scan {
        println!("{}", crate::report::format_order_scan(scan));
    }
    println!("{}", crate::report::format_mem_summary(&run.mem, run.peak));

    write_mem_exports(&config, &run)
}

fn write_mem_exports(config: &MemConfig, run: &pipeline::SpectrumRun) -> Result<(), AppError> {
    if let Some(path) = &config.export_psd {
        crate::io::write_psd_csv(path, &run.curve)?;
    }
    if let Some(path) = &config.export_json {
        let source = config.input.display().to_string();
        let spec = crate::io::spectrum_from_estimator(&run.mem, &source, config.points, config.two_sided)
            .ok_or_else(|| AppError::new(4, "No AR model to export."))?;
        crate::io::write_spectrum_json(path, &spec)?;
    }
    Ok(())
}

fn handle_psd(args: PsdArgs) -> Result<(), AppError> {
    let spec = crate::io::read_spectrum_json(&args.spectrum)?;
    let curve = crate::io::evaluate_spectrum(&spec, args.points, args.two_sided);

    println!(
        "Spectrum: {} | variant={} order={} dt={} N={}",
        spec.source,
        spec.variant.display_name(),
        spec.order,
        spec.sample_interval,
        spec.samples
    );
    if let Some((f, p)) = crate::report::peak_frequency(&curve) {
        println!("Peak: f={f:.6} psd={p:.6e}");
    }

    match &args.export {
        Some(path) => crate::io::write_psd_csv(path, &curve)?,
        None => {
            for (f, p) in &curve {
                println!("{f:.6} {p:.6e}");
            }
        }
    }
    Ok(())
}

fn handle_fit(args: FitArgs) -> Result<(), AppError> {
    let config = fit_config_from_args(&args)?;
    let run = pipeline::run_fit(&config)?;

    let source = config.input.display().to_string();
    println!("{}", crate::report::format_series_summary(&source, &run.ingest));
    println!("{}", crate::report::format_fit_summary(&run.model));
    println!(
        "Included: {} of {}",
        run.mask.count_included(),
        run.ingest.series.len()
    );
    println!("\nLargest residuals:");
    println!("{}", crate::report::format_residual_table(&run.largest));

    if let Some(path) = &config.export {
        crate::io::write_residuals_csv(path, &run.residuals)?;
    }
    Ok(())
}

fn handle_smooth(args: SmoothArgs) -> Result<(), AppError> {
    let config = smooth_config_from_args(&args)?;
    let run = pipeline::run_smooth(&config)?;

    let points = match &run.output {
        SmoothOutput::Grid(grid) => grid.len(),
        SmoothOutput::Residuals(series) => series.len(),
    };
    println!("{}", crate::report::format_smooth_summary(&run.filter, points));
    for model in run.filter.models() {
        println!("{}", crate::report::format_fit_summary(model));
    }

    match (&run.output, &config.export) {
        (SmoothOutput::Grid(grid), Some(path)) => crate::io::write_smooth_csv(path, grid)?,
        (SmoothOutput::Residuals(series), Some(path)) => crate::io::write_series_csv(path, series)?,
        (SmoothOutput::Grid(grid), None) => {
            for (t, est) in grid {
                println!("{t} {:.6} {:.6} {}", est.value, est.std_error, est.n_used);
            }
        }
        (SmoothOutput::Residuals(series), None) => print!("{}", series.to_text()),
    }
    Ok(())
}

fn handle_simulate(args: SimulateArgs) -> Result<(), AppError> {
    let config = simulate_config_from_args(&args)?;
    let series = match &config.kind {
        SimulateKind::Ar { coeffs } => ar_process(coeffs, config.noise_sigma, config.n, config.seed)?,
        SimulateKind::Harmonic {
            t0,
            dt,
            offset,
            rate,
            components,
        } => {
            let signal = HarmonicSignal {
                t0: *t0,
                dt: *dt,
                n: config.n,
                offset: *offset,
                rate: *rate,
                components: components
                    .iter()
                    .map(|&(period, cos, sin)| HarmonicComponent { period, cos, sin })
                    .collect(),
                noise_sigma: config.noise_sigma,
                with_sigma: true,
            };
            harmonic_series(&signal, config.seed)?
        }
    };
    crate::io::write_series_text(&config.output, &series)?;
    println!(
        "Wrote {} observations ({} columns) to {}",
        series.len(),
        series.num_data_columns(),
        config.output.display()
    );
    Ok(())
}

pub fn mem_config_from_args(args: &MemArgs, scan_min: usize, scan_max: Option<usize>) -> MemConfig {
    MemConfig {
        input: args.input.clone(),
        variant: args.variant,
        order: args.order,
        trend: args.trend,
        imag: args.imag,
        allow_uneven: args.allow_uneven,
        points: args.points,
        two_sided: args.two_sided,
        scan_min,
        scan_max,
        export_psd: args.export.clone(),
        export_json: args.export_json.clone(),
    }
}

/// Regression config for `column`; the epoch is resolved separately.
pub fn regression_config_from_args(
    args: &ModelArgs,
    column: usize,
    sigma_column: Option<usize>,
) -> Result<RegressionConfig, AppError> {
    if let Some(p) = args
        .periods
        .iter()
        .chain(args.envelope_period.iter())
        .find(|p| !(p.is_finite() && **p > 0.0))
    {
        return Err(AppError::new(2, format!("Periods must be finite and > 0 (got {p}).")));
    }
    for k in &args.keep {
        if !args.periods.iter().any(|p| (p - k).abs() <= PERIOD_MATCH_TOLERANCE * p.abs().max(1.0)) {
            return Err(AppError::new(2, format!("--keep {k} does not match any --period.")));
        }
    }

    let periods = args
        .periods
        .iter()
        .map(|&period| PeriodSpec {
            period,
            keep: args
                .keep
                .iter()
                .any(|k| (period - k).abs() <= PERIOD_MATCH_TOLERANCE * period.abs().max(1.0)),
        })
        .collect();

    Ok(RegressionConfig {
        column,
        sigma_column,
        epoch: 0.0,
        poly_terms: args.poly,
        periods,
        envelope: args.envelope_period.map(|period| EnvelopeSpec {
            period,
            order: args.envelope_order,
            keep: args.keep_envelope,
        }),
        eliminate_before: args.eliminate_before,
        eliminate_after: args.eliminate_after,
    })
}

fn epoch_from_args(args: &ModelArgs) -> Result<Option<f64>, AppError> {
    args.epoch.as_deref().map(parse_epoch).transpose()
}

pub fn fit_config_from_args(args: &FitArgs) -> Result<FitConfig, AppError> {
    Ok(FitConfig {
        input: args.input.clone(),
        model: regression_config_from_args(&args.model, args.column, args.sigma_column)?,
        epoch: epoch_from_args(&args.model)?,
        top_n: args.top,
        export: args.export.clone(),
    })
}

pub fn smooth_config_from_args(args: &SmoothArgs) -> Result<SmoothConfig, AppError> {
    if !(args.fwhm.is_finite() && args.fwhm > 0.0) {
        return Err(AppError::new(2, format!("--fwhm must be finite and > 0 (got {}).", args.fwhm)));
    }

    let wants_models = args.minus_model || !args.model.periods.is_empty();
    if args.minus_model && args.model.periods.is_empty() {
        return Err(AppError::new(2, "--minus-model needs at least one --period."));
    }

    let mut models = Vec::new();
    if wants_models {
        models.push(regression_config_from_args(&args.model, args.column, args.sigma_column)?);
        for &c in args.model_columns.iter().filter(|c| **c != args.column) {
            models.push(regression_config_from_args(&args.model, c, None)?);
        }
    }

    Ok(SmoothConfig {
        input: args.input.clone(),
        fwhm: args.fwhm,
        column: args.column,
        sigma_column: args.sigma_column,
        step: args.step,
        minus_model: args.minus_model,
        clip: args.clip,
        residuals: args.residuals.map(|k| k.with_offset(args.sigma_offset)),
        models,
        epoch: epoch_from_args(&args.model)?,
        export: args.export.clone(),
    })
}

pub fn simulate_config_from_args(args: &SimulateArgs) -> Result<SimulateConfig, AppError> {
    let kind = match args.kind {
        SimKind::Ar => SimulateKind::Ar {
            coeffs: args.coeffs.clone(),
        },
        SimKind::Harmonic => SimulateKind::Harmonic {
            t0: parse_epoch(&args.t0)?,
            dt: args.dt,
            offset: args.offset,
            rate: args.rate,
            components: args
                .components
                .iter()
                .map(|c| parse_component(c))
                .collect::<Result<_, _>>()?,
        },
    };
    Ok(SimulateConfig {
        kind,
        n: args.samples,
        noise_sigma: args.sigma,
        seed: args.seed,
        output: args.output.clone(),
    })
}

/// `period:cos:sin`.
fn parse_component(s: &str) -> Result<(f64, f64, f64), AppError> {
    let parts: Vec<&str> = s.split(':').map(str::trim).collect();
    let bad = || AppError::new(2, format!("Invalid --component `{s}` (expected period:cos:sin)."));
    let [p, c, sn] = parts.as_slice() else {
        return Err(bad());
    };
    let parse = |v: &str| v.parse::<f64>().map_err(|_| bad());
    Ok((parse(*p)?, parse(*c)?, parse(*sn)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model_args() -> ModelArgs {
        ModelArgs {
            epoch: Some("2000-01-01".to_string()),
            poly: 2,
            periods: vec![365.25, 182.625],
            keep: vec![182.625],
            envelope_period: None,
            envelope_order: 1,
            keep_envelope: false,
            eliminate_before: true,
            eliminate_after: false,
        }
    }

    #[test]
    fn keep_flags_follow_periods() {
        let config = regression_config_from_args(&model_args(), 1, Some(3)).unwrap();
        assert_eq!(config.periods.len(), 2);
        assert!(!config.periods[0].keep);
        assert!(config.periods[1].keep);
        assert_eq!(config.sigma_column, Some(3));
        assert_eq!(epoch_from_args(&model_args()).unwrap(), Some(51544.0));

        let mut args = model_args();
        args.keep = vec![30.0];
        assert_eq!(regression_config_from_args(&args, 0, None).unwrap_err().exit_code(), 2);

        let mut args = model_args();
        args.periods.push(-1.0);
        assert!(regression_config_from_args(&args, 0, None).is_err());
    }

    #[test]
    fn components_parse() {
        assert_eq!(parse_component("365.25:1:-0.5").unwrap(), (365.25, 1.0, -0.5));
        assert!(parse_component("365.25:1").is_err());
        assert!(parse_component("a:b:c").is_err());
    }
}
