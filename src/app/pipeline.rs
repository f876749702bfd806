//! Shared pipelines behind the subcommands.
//!
//! Each function performs the full workflow for one subcommand:
//! ingest -> engine setup -> estimation -> derived outputs
//!
//! and returns everything the caller needs to print or export. Nothing here
//! prints.

use tracing::{info, warn};

use crate::domain::{FitConfig, MemConfig, SmoothConfig};
use crate::error::AppError;
use crate::filter::{GaussFilter, Interpolated};
use crate::io::{IngestedSeries, load_series};
use crate::mem::{MemEstimator, MemOptions, OrderScan, scan_orders};
use crate::models::{InclusionMask, RegressionConfig, RegressionModel};
use crate::report::{ResidualRow, compute_residuals, peak_frequency, rank_residuals};
use crate::series::Series;

/// Outputs of `tsa spectrum` and `tsa orders`.
#[derive(Debug, Clone)]
pub struct SpectrumRun {
    pub ingest: IngestedSeries,
    pub mem: MemEstimator,
    /// Present for order scans.
    pub scan: Option<OrderScan>,
    pub curve: Vec<(f64, f64)>,
    pub peak: Option<(f64, f64)>,
}

/// Outputs of `tsa fit`.
#[derive(Debug, Clone)]
pub struct FitRun {
    pub ingest: IngestedSeries,
    pub model: RegressionModel,
    pub mask: InclusionMask,
    pub residuals: Vec<ResidualRow>,
    pub largest: Vec<ResidualRow>,
}

#[derive(Debug, Clone)]
pub enum SmoothOutput {
    Grid(Vec<(f64, Interpolated)>),
    Residuals(Series),
}

/// Outputs of `tsa smooth`.
#[derive(Debug, Clone)]
pub struct SmoothRun {
    pub ingest: IngestedSeries,
    pub filter: GaussFilter,
    pub output: SmoothOutput,
}

fn load_estimator(config: &MemConfig) -> Result<(IngestedSeries, MemEstimator), AppError> {
    let ingest = load_series(&config.input)?;
    let mut mem = MemEstimator::new();
    mem.set_variant(config.variant);
    let options = MemOptions {
        trend: config.trend,
        imag: config.imag,
        allow_uneven: config.allow_uneven,
    };
    if !mem.load(ingest.series.clone(), options) {
        return Err(AppError::new(
            3,
            format!(
                "Series '{}' is not usable for MEM (needs >= 6 equidistant samples with real+imag columns; \
                 see --imag zero and --allow-uneven).",
                config.input.display()
            ),
        ));
    }
    Ok((ingest, mem))
}

/// Estimate at the configured order.
pub fn run_spectrum(config: &MemConfig) -> Result<SpectrumRun, AppError> {
    let (ingest, mut mem) = load_estimator(config)?;

    let order = mem.set_order(config.order);
    if order != config.order {
        warn!(requested = config.order, used = order, "filter order clamped");
    }
    if !mem.estimate() {
        return Err(AppError::new(4, format!("AR estimation failed at order {order}.")));
    }

    let curve = mem.psd_curve(config.points, config.two_sided);
    let peak = peak_frequency(&curve);
    info!(order, points = curve.len(), "spectrum evaluated");
    Ok(SpectrumRun {
        ingest,
        mem,
        scan: None,
        curve,
        peak,
    })
}

/// Scan orders; the estimator is left at the FPE-minimising order.
pub fn run_orders(config: &MemConfig) -> Result<SpectrumRun, AppError> {
    let (ingest, mut mem) = load_estimator(config)?;

    let max = config.scan_max.unwrap_or(mem.max_order());
    let scan = scan_orders(&mut mem, config.scan_min, max);
    if scan.best.is_none() {
        return Err(AppError::new(
            4,
            format!("No AR order in {}..={max} could be estimated.", config.scan_min),
        ));
    }

    let curve = mem.psd_curve(config.points, config.two_sided);
    let peak = peak_frequency(&curve);
    Ok(SpectrumRun {
        ingest,
        mem,
        scan: Some(scan),
        curve,
        peak,
    })
}

/// Standalone regression with both elimination phases.
pub fn run_fit(config: &FitConfig) -> Result<FitRun, AppError> {
    let ingest = load_series(&config.input)?;
    let series = &ingest.series;

    let mut model_config = config.model.clone();
    resolve_epoch(&mut model_config, config.epoch, series);
    let mut model = RegressionModel::new(model_config);
    let mut mask = InclusionMask::new(series.len());

    model.eliminate_before(series, &mut mask);
    if !model.fit(series, &mask) {
        return Err(AppError::new(
            4,
            format!("Regression of column {} did not fit (see log).", config.model.column),
        ));
    }
    if model.eliminate_after(series, &mut mask) > 0 {
        // Refit without the rejected rows.
        if !model.fit(series, &mask) {
            return Err(AppError::new(4, "Regression refit after elimination failed."));
        }
    }

    let residuals = compute_residuals(series, &model, &mask)?;
    let largest = rank_residuals(&residuals, config.top_n);
    Ok(FitRun {
        ingest,
        model,
        mask,
        residuals,
        largest,
    })
}

/// Gaussian smoothing, optionally after model preparation.
pub fn run_smooth(config: &SmoothConfig) -> Result<SmoothRun, AppError> {
    let ingest = load_series(&config.input)?;

    let mut filter = GaussFilter::new(config.fwhm);
    if !filter.set_series(ingest.series.clone()) {
        return Err(AppError::new(
            3,
            "Series needs >= 3 observations with positive spacing for smoothing.",
        ));
    }
    if config.column >= filter.series().num_data_columns() {
        return Err(AppError::new(
            2,
            format!(
                "Column {} out of range ({} data columns).",
                config.column,
                filter.series().num_data_columns()
            ),
        ));
    }

    let n_fields = filter.series().num_data_columns();
    let layout_sigmas = config.residuals.map(|l| l.column_pairs(n_fields)).unwrap_or_default();
    for model in &config.models {
        let mut model = model.clone();
        resolve_epoch(&mut model, config.epoch, filter.series());
        if model.sigma_column.is_none() && model.column != config.column {
            model.sigma_column = layout_sigmas
                .iter()
                .find(|(c, _)| *c == model.column)
                .map(|(_, s)| *s);
        }
        filter.add_model(model);
    }
    if !config.models.is_empty() && !filter.prepare_models() {
        return Err(AppError::new(4, "Model preparation failed (see log)."));
    }

    if config.clip {
        match filter.calc_sigma(config.column, config.sigma_column) {
            Some(rms) => info!(column = config.column, rms, "clipping at 3x residual RMS"),
            None => warn!(column = config.column, "no residual RMS; clipping disabled"),
        }
        filter.set_clipping(true);
    }

    let output = match config.residuals {
        Some(layout) => {
            let residuals = filter
                .subtract_filter(config.minus_model, layout)
                .ok_or_else(|| AppError::new(2, format!("Sigma layout {layout:?} selects no columns.")))?;
            SmoothOutput::Residuals(residuals)
        }
        None => {
            let grid = filter.smooth_grid(config.column, config.sigma_column, config.step, config.minus_model);
            if grid.is_empty() {
                return Err(AppError::new(
                    2,
                    format!("No smoothing grid for step {:?} (see log).", config.step),
                ));
            }
            SmoothOutput::Grid(grid)
        }
    };

    Ok(SmoothRun {
        ingest,
        filter,
        output,
    })
}

fn resolve_epoch(model: &mut RegressionConfig, epoch: Option<f64>, series: &Series) {
    model.epoch = epoch.or(series.start()).unwrap_or(0.0);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::synthetic::{HarmonicComponent, HarmonicSignal, harmonic_series};
    use crate::domain::{ArVariant, ImagPolicy, TrendRemoval};
    use crate::models::PeriodSpec;
    use std::path::PathBuf;

    fn temp_file(name: &str, text: &str) -> PathBuf {
        let path = std::env::temp_dir().join(name);
        std::fs::write(&path, text).unwrap();
        path
    }

    fn mem_config(input: PathBuf) -> MemConfig {
        MemConfig {
            input,
            variant: ArVariant::Recursive,
            order: 4,
            trend: TrendRemoval::Mean,
            imag: ImagPolicy::Zero,
            allow_uneven: false,
            points: 201,
            two_sided: false,
            scan_min: 2,
            scan_max: Some(10),
            export_psd: None,
            export_json: None,
        }
    }

    #[test]
    fn spectrum_of_single_column_sinusoid() {
        let signal = HarmonicSignal {
            t0: 0.0,
            dt: 1.0,
            n: 200,
            offset: 0.5,
            rate: 0.0,
            components: vec![HarmonicComponent { period: 10.0, cos: 0.0, sin: 1.0 }],
            noise_sigma: 0.2,
            with_sigma: false,
        };
        let text = harmonic_series(&signal, 17).unwrap().to_text();
        let path = temp_file("geo_tsa_pipeline_sine.txt", &text);

        let run = run_spectrum(&mem_config(path.clone())).unwrap();
        let (f, _) = run.peak.unwrap();
        assert!((f - 0.1).abs() < 0.01, "peak at {f}");

        let run = run_orders(&mem_config(path.clone())).unwrap();
        let scan = run.scan.unwrap();
        assert_eq!(run.mem.order(), scan.best.unwrap());
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn fit_requires_periods() {
        let text: String = (0..50).map(|i| format!("{i} {}\n", i % 7)).collect();
        let path = temp_file("geo_tsa_pipeline_fit.txt", &text);
        let config = FitConfig {
            input: path.clone(),
            model: RegressionConfig {
                column: 0,
                sigma_column: None,
                epoch: 0.0,
                poly_terms: 1,
                periods: vec![],
                envelope: None,
                eliminate_before: false,
                eliminate_after: false,
            },
            epoch: None,
            top_n: 5,
            export: None,
        };
        assert_eq!(run_fit(&config).unwrap_err().exit_code(), 4);

        let mut config = config;
        config.model.periods = vec![PeriodSpec { period: 7.0, keep: false }];
        let run = run_fit(&config).unwrap();
        assert_eq!(run.model.config().epoch, 0.0);
        assert_eq!(run.largest.len(), 5);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn smooth_rejects_bad_column() {
        let path = temp_file("geo_tsa_pipeline_smooth.txt", "0 1\n1 2\n2 3\n3 4\n");
        let config = SmoothConfig {
            input: path.clone(),
            fwhm: 2.0,
            column: 3,
            sigma_column: None,
            step: None,
            minus_model: false,
            clip: false,
            residuals: None,
            models: vec![],
            epoch: None,
            export: None,
        };
        assert_eq!(run_smooth(&config).unwrap_err().exit_code(), 2);

        let mut config = config;
        config.column = 0;
        let run = run_smooth(&config).unwrap();
        let SmoothOutput::Grid(grid) = run.output else {
            panic!("expected a grid");
        };
        assert_eq!(grid.len(), 4);

        config.step = Some(1e-12);
        assert_eq!(run_smooth(&config).unwrap_err().exit_code(), 2);
        let _ = std::fs::remove_file(&path);
    }
}
