//! Modified Julian Day helpers.
//!
//! Series timestamps are plain numbers; when they are MJDs we can show
//! calendar dates in reports and accept ISO dates on the command line.

use chrono::{Duration, NaiveDate};

use crate::error::AppError;

/// Calendar date of MJD 0.
pub fn mjd_epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(1858, 11, 17).unwrap_or_default()
}

/// Calendar date containing `mjd`; `None` for non-finite or absurd values.
pub fn mjd_to_date(mjd: f64) -> Option<NaiveDate> {
    if !mjd.is_finite() || mjd.abs() > 1e7 {
        return None;
    }
    mjd_epoch().checked_add_signed(Duration::days(mjd.floor() as i64))
}

pub fn date_to_mjd(date: NaiveDate) -> f64 {
    (date - mjd_epoch()).num_days() as f64
}

/// Parse an epoch given either as a number (MJD or any time unit) or as an
/// ISO date `YYYY-MM-DD` (converted to MJD).
pub fn parse_epoch(s: &str) -> Result<f64, AppError> {
    let s = s.trim();
    if let Ok(v) = s.parse::<f64>() {
        if v.is_finite() {
            return Ok(v);
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map(date_to_mjd)
        .map_err(|e| AppError::new(2, format!("Invalid epoch `{s}` (expected a number or YYYY-MM-DD): {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_mjd_dates() {
        let j2000 = NaiveDate::from_ymd_opt(2000, 1, 1).unwrap();
        assert_eq!(date_to_mjd(j2000), 51544.0);
        assert_eq!(mjd_to_date(51544.75), Some(j2000));
        assert_eq!(mjd_to_date(f64::NAN), None);
    }

    #[test]
    fn epochs_accept_numbers_and_dates() {
        assert_eq!(parse_epoch("58000.5").unwrap(), 58000.5);
        assert_eq!(parse_epoch("2000-01-01").unwrap(), 51544.0);
        assert_eq!(parse_epoch("01/01/2000").unwrap_err().exit_code(), 2);
    }
}
