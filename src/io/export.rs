//! Result exports.
//!
//! CSV files are meant for spreadsheets and downstream scripts; series text
//! files can be fed straight back into any `tsa` subcommand.

use std::fs;
use std::path::Path;

use csv::Writer;

use crate::error::AppError;
use crate::filter::Interpolated;
use crate::report::ResidualRow;
use crate::series::Series;

fn create_csv(path: &Path) -> Result<Writer<fs::File>, AppError> {
    Writer::from_path(path)
        .map_err(|e| AppError::new(2, format!("Failed to create export CSV '{}': {e}", path.display())))
}

fn row_error(e: csv::Error) -> AppError {
    AppError::new(2, format!("Failed to write export CSV row: {e}"))
}

fn finish(mut w: Writer<fs::File>) -> Result<(), AppError> {
    w.flush()
        .map_err(|e| AppError::new(2, format!("Failed to flush export CSV: {e}")))
}

/// `frequency,psd` per grid point.
pub fn write_psd_csv(path: &Path, curve: &[(f64, f64)]) -> Result<(), AppError> {
    let mut w = create_csv(path)?;
    w.write_record(["frequency", "psd"]).map_err(row_error)?;
    for (f, p) in curve {
        w.write_record([f.to_string(), p.to_string()])
            .map_err(row_error)?;
    }
    finish(w)
}

/// `time,value,std_error,n_used` per grid epoch.
pub fn write_smooth_csv(path: &Path, grid: &[(f64, Interpolated)]) -> Result<(), AppError> {
    let mut w = create_csv(path)?;
    w.write_record(["time", "value", "std_error", "n_used"])
        .map_err(row_error)?;
    for (t, est) in grid {
        w.write_record([
            t.to_string(),
            est.value.to_string(),
            est.std_error.to_string(),
            est.n_used.to_string(),
        ])
        .map_err(row_error)?;
    }
    finish(w)
}

/// `index,time,observed,fitted,residual,included` per observation.
pub fn write_residuals_csv(path: &Path, rows: &[ResidualRow]) -> Result<(), AppError> {
    let mut w = create_csv(path)?;
    w.write_record(["index", "time", "observed", "fitted", "residual", "included"])
        .map_err(row_error)?;
    for r in rows {
        w.write_record([
            r.index.to_string(),
            r.time.to_string(),
            r.observed.to_string(),
            r.fitted.to_string(),
            r.residual.to_string(),
            r.included.to_string(),
        ])
        .map_err(row_error)?;
    }
    finish(w)
}

/// `time,field_1..field_k` for every observation.
pub fn write_series_csv(path: &Path, series: &Series) -> Result<(), AppError> {
    let mut w = create_csv(path)?;
    let mut header = vec!["time".to_string()];
    header.extend((1..=series.num_data_columns()).map(|c| format!("field_{c}")));
    w.write_record(&header).map_err(row_error)?;

    for obs in series.observations() {
        let mut record = Vec::with_capacity(obs.fields.len() + 1);
        record.push(obs.time().to_string());
        record.extend(obs.fields.iter().map(|v| v.to_string()));
        w.write_record(&record).map_err(row_error)?;
    }
    finish(w)
}

/// Series in the whitespace text format.
pub fn write_series_text(path: &Path, series: &Series) -> Result<(), AppError> {
    fs::write(path, series.to_text())
        .map_err(|e| AppError::new(2, format!("Failed to write series '{}': {e}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn psd_csv_has_header_and_rows() {
        let path = std::env::temp_dir().join("geo_tsa_psd_export.csv");
        write_psd_csv(&path, &[(0.0, 1.5), (0.25, 0.5)]).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines, vec!["frequency,psd", "0,1.5", "0.25,0.5"]);
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn series_text_reloads() {
        let mut series = Series::new();
        series.load("1 0.5 0.1\n2 0.25 0.1\n3 -1 0.2\n");
        let path = std::env::temp_dir().join("geo_tsa_series_export.txt");
        write_series_text(&path, &series).unwrap();

        let mut back = Series::new();
        back.load(&fs::read_to_string(&path).unwrap());
        assert_eq!(back.observations(), series.observations());
        let _ = fs::remove_file(&path);
    }
}
