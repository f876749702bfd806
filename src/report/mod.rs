//! Reporting utilities: model residuals, rankings and spectral peaks.
//!
//! Formatting lives in `format`; this module only computes what gets shown.

pub mod format;

pub use format::*;

use crate::error::AppError;
use crate::models::{InclusionMask, RegressionModel};
use crate::series::Series;

/// Observed vs fitted value of one observation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResidualRow {
    pub index: usize,
    pub time: f64,
    pub observed: f64,
    pub fitted: f64,
    pub residual: f64,
    pub included: bool,
}

/// Full-model residuals for every observation of the model's column.
pub fn compute_residuals(
    series: &Series,
    model: &RegressionModel,
    mask: &InclusionMask,
) -> Result<Vec<ResidualRow>, AppError> {
    let column = model.column();
    let mut out = Vec::with_capacity(series.len());
    for (index, obs) in series.observations().iter().enumerate() {
        let Some(&observed) = obs.fields.get(column) else {
            continue;
        };
        let fitted = model.evaluate_full(obs.time());
        if !fitted.is_finite() {
            return Err(AppError::new(4, "Non-finite model value during residual computation."));
        }
        out.push(ResidualRow {
            index,
            time: obs.time(),
            observed,
            fitted,
            residual: observed - fitted,
            included: mask.is_included(index),
        });
    }
    Ok(out)
}

/// Largest absolute residuals first.
pub fn rank_residuals(rows: &[ResidualRow], top_n: usize) -> Vec<ResidualRow> {
    let mut sorted = rows.to_vec();
    sorted.sort_by(|a, b| b.residual.abs().total_cmp(&a.residual.abs()));
    sorted.truncate(top_n);
    sorted
}

/// `(frequency, psd)` of the highest PSD value.
pub fn peak_frequency(curve: &[(f64, f64)]) -> Option<(f64, f64)> {
    curve
        .iter()
        .copied()
        .filter(|(_, p)| p.is_finite())
        .max_by(|a, b| a.1.total_cmp(&b.1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PeriodSpec, RegressionConfig};
    use crate::series::Observation;

    #[test]
    fn residuals_and_ranking() {
        let obs = (0..30)
            .map(|i| {
                let t = i as f64;
                let y = if i == 12 { 9.0 } else { 2.0 };
                Observation::new(t, vec![y])
            })
            .collect();
        let series = Series::from_observations(obs);
        let mut mask = InclusionMask::new(series.len());
        mask.exclude(12);

        let mut model = RegressionModel::new(RegressionConfig {
            column: 0,
            sigma_column: None,
            epoch: 0.0,
            poly_terms: 1,
            periods: vec![PeriodSpec { period: 10.0, keep: false }],
            envelope: None,
            eliminate_before: false,
            eliminate_after: false,
        });
        assert!(model.fit(&series, &mask));

        let rows = compute_residuals(&series, &model, &mask).unwrap();
        assert_eq!(rows.len(), 30);
        assert!(!rows[12].included);
        assert!((rows[12].residual - 7.0).abs() < 1e-6);
        assert!(rows[0].residual.abs() < 1e-6);

        let top = rank_residuals(&rows, 2);
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].index, 12);
    }

    #[test]
    fn peak_ignores_non_finite() {
        let curve = [(0.0, 1.0), (0.1, f64::INFINITY), (0.2, 3.0), (0.3, 2.0)];
        assert_eq!(peak_frequency(&curve), Some((0.2, 3.0)));
        assert_eq!(peak_frequency(&[]), None);
    }
}
