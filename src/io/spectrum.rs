//! Read/write AR spectrum JSON files.
//!
//! A spectrum file carries the AR model (variant, order, Δt, Pm and the
//! complex coefficients) plus the PSD grid evaluated at export time. `tsa psd`
//! reads it back to evaluate the PSD on a new grid without the data.

use std::fs::File;
use std::path::Path;

use chrono::Utc;

use crate::domain::{SpectrumFile, SpectrumGrid};
use crate::error::AppError;
use crate::mem::{MemEstimator, frequency_grid, psd_from_coeffs};

/// Snapshot a `Ready` estimator; `None` if no model is available.
pub fn spectrum_from_estimator(
    mem: &MemEstimator,
    source: &str,
    points: usize,
    two_sided: bool,
) -> Option<SpectrumFile> {
    let coefficients = mem.coefficients()?.to_vec();
    let power = mem.power()?;
    let curve = mem.psd_curve(points, two_sided);
    let (frequency, psd) = curve.into_iter().unzip();
    Some(SpectrumFile {
        tool: "tsa".to_string(),
        generated_at: Utc::now(),
        source: source.to_string(),
        variant: mem.variant(),
        trend: mem.trend_removal(),
        samples: mem.n(),
        order: mem.order(),
        sample_interval: mem.sample_interval(),
        power,
        fpe: mem.fpe(),
        coefficients,
        grid: SpectrumGrid { frequency, psd },
    })
}

/// Evaluate a stored spectrum on a fresh `[0 | -Nyquist, Nyquist]` grid.
pub fn evaluate_spectrum(spec: &SpectrumFile, points: usize, two_sided: bool) -> Vec<(f64, f64)> {
    if !(spec.sample_interval > 0.0) {
        return Vec::new();
    }
    let nyquist = 0.5 / spec.sample_interval;
    frequency_grid(nyquist, points, two_sided)
        .into_iter()
        .map(|f| {
            (
                f,
                psd_from_coeffs(&spec.coefficients, spec.power, spec.sample_interval, f),
            )
        })
        .collect()
}

pub fn write_spectrum_json(path: &Path, spec: &SpectrumFile) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create spectrum JSON '{}': {e}", path.display())))?;
    serde_json::to_writer_pretty(file, spec)
        .map_err(|e| AppError::new(2, format!("Failed to write spectrum JSON: {e}")))?;
    Ok(())
}

pub fn read_spectrum_json(path: &Path) -> Result<SpectrumFile, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open spectrum JSON '{}': {e}", path.display())))?;
    let spec: SpectrumFile =
        serde_json::from_reader(file).map_err(|e| AppError::new(2, format!("Invalid spectrum JSON: {e}")))?;
    if spec.coefficients.len() != spec.order {
        return Err(AppError::new(
            2,
            format!(
                "Spectrum JSON lists {} coefficients for order {}.",
                spec.coefficients.len(),
                spec.order
            ),
        ));
    }
    Ok(spec)
}
