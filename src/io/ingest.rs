//! Series file ingest.
//!
//! The file format is the plain-text observation format of `series::Series`.
//! Parsing never fails on a bad line; this layer only turns "could not read
//! the file" and "nothing usable came out" into `AppError`s.

use std::fs;
use std::path::Path;

use tracing::{debug, info};

use crate::error::AppError;
use crate::series::{LoadReport, Series};

/// Loaded series plus what happened while parsing it.
#[derive(Debug, Clone)]
pub struct IngestedSeries {
    pub series: Series,
    pub report: LoadReport,
}

/// Read and validate a series file.
pub fn load_series(path: &Path) -> Result<IngestedSeries, AppError> {
    let text = read_text(path)?;
    let mut series = Series::new();
    let report = series.load(&text);

    for err in report.rejected.iter().take(10) {
        debug!(line = err.line, "rejected: {}", err.message);
    }

    if !series.is_valid() {
        return Err(AppError::new(
            3,
            format!(
                "No usable series in '{}' ({} of {} lines accepted).",
                path.display(),
                report.accepted,
                report.lines_read
            ),
        ));
    }

    info!(
        path = %path.display(),
        observations = series.len(),
        columns = series.num_data_columns(),
        "series loaded"
    );
    Ok(IngestedSeries { series, report })
}

/// Read a file to a string, mapping failures to exit code 2.
pub fn read_text(path: &Path) -> Result<String, AppError> {
    fs::read_to_string(path)
        .map_err(|e| AppError::new(2, format!("Failed to read '{}': {e}", path.display())))
}
