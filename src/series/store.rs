//! Time-stamped, multi-field observation store.
//!
//! A `Series` is built by streaming parse of whitespace-delimited text:
//!
//! ```text
//! # MJD        north     east    sigma
//! 58000.0      1.25     -0.40    0.10
//! 58001.0      1.31     -0.38    0.12
//! ```
//!
//! Malformed lines are skipped (and reported), never fatal. After loading,
//! `validate()` sorts the observations, prunes rows whose field count differs
//! from the majority, and caches spacing statistics. Downstream components
//! must check `is_valid()` before using a series.

use std::collections::HashMap;
use std::fmt::Write as _;

use tracing::{debug, info, warn};

/// One observation: a timestamp plus a fixed-length list of fields.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    time: f64,
    pub fields: Vec<f64>,
}

impl Observation {
    pub fn new(time: f64, fields: Vec<f64>) -> Self {
        Self { time, fields }
    }

    pub fn time(&self) -> f64 {
        self.time
    }
}

/// Cached statistics of a validated series.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeriesStats {
    pub mean_spacing: f64,
    pub min_spacing: f64,
    pub max_spacing: f64,
    /// True iff every spacing equals the mean spacing exactly.
    pub equidistant: bool,
    /// Common number of data fields per observation.
    pub num_fields: usize,
}

/// A rejected input line.
#[derive(Debug, Clone, PartialEq)]
pub struct RowError {
    pub line: usize,
    pub message: String,
}

/// Outcome of `Series::load`.
#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    /// Non-empty, non-comment lines seen.
    pub lines_read: usize,
    pub accepted: usize,
    pub rejected: Vec<RowError>,
    /// Observations discarded by validation because of a minority field count.
    pub pruned: usize,
}

/// Ordered collection of observations with cached statistics.
#[derive(Debug, Clone, Default)]
pub struct Series {
    obs: Vec<Observation>,
    stats: Option<SeriesStats>,
    validated: bool,
}

impl Series {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a series from observations and validate it.
    pub fn from_observations(obs: Vec<Observation>) -> Self {
        let mut series = Self {
            obs,
            stats: None,
            validated: false,
        };
        series.validate();
        series
    }

    /// Parse text input, appending to the current observations, then validate.
    pub fn load(&mut self, text: &str) -> LoadReport {
        let mut report = LoadReport::default();

        for (idx, raw) in text.lines().enumerate() {
            let line_no = idx + 1;
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            report.lines_read += 1;

            match parse_line(line) {
                Ok(obs) => {
                    self.obs.push(obs);
                    report.accepted += 1;
                }
                Err(message) => {
                    debug!(line = line_no, "skipping input line: {message}");
                    report.rejected.push(RowError {
                        line: line_no,
                        message,
                    });
                }
            }
        }

        if !report.rejected.is_empty() {
            warn!(
                rejected = report.rejected.len(),
                accepted = report.accepted,
                "malformed input lines skipped"
            );
        }

        report.pruned = self.validate();
        report
    }

    /// Sort, prune minority field counts and recompute spacing statistics.
    ///
    /// Returns the number of pruned observations.
    pub fn validate(&mut self) -> usize {
        self.validated = false;
        self.stats = None;

        self.obs.sort_by(|a, b| a.time.total_cmp(&b.time));

        let Some(num_fields) = majority_field_count(&self.obs) else {
            debug!("series is empty; nothing to validate");
            return 0;
        };

        let before = self.obs.len();
        self.obs.retain(|o| o.fields.len() == num_fields);
        let pruned = before - self.obs.len();
        if pruned > 0 {
            warn!(
                pruned,
                expected_fields = num_fields,
                "discarded observations with a minority field count"
            );
        }

        if self.obs.len() < 2 {
            warn!(
                observations = self.obs.len(),
                "series has no spacing sample; marking invalid"
            );
            return pruned;
        }

        let mut min_spacing = f64::INFINITY;
        let mut max_spacing = f64::NEG_INFINITY;
        for pair in self.obs.windows(2) {
            let dt = pair[1].time - pair[0].time;
            min_spacing = min_spacing.min(dt);
            max_spacing = max_spacing.max(dt);
        }
        let n = self.obs.len();
        let mean_spacing = (self.obs[n - 1].time - self.obs[0].time) / (n - 1) as f64;
        let equidistant = self
            .obs
            .windows(2)
            .all(|pair| pair[1].time - pair[0].time == mean_spacing);

        self.stats = Some(SeriesStats {
            mean_spacing,
            min_spacing,
            max_spacing,
            equidistant,
            num_fields,
        });
        self.validated = true;

        info!(
            observations = n,
            fields = num_fields,
            mean_spacing,
            equidistant,
            "series validated"
        );
        pruned
    }

    /// Insert an observation and revalidate.
    pub fn push(&mut self, obs: Observation) {
        self.obs.push(obs);
        self.validate();
    }

    /// Remove the observation at `index` (in time order) and revalidate.
    pub fn remove(&mut self, index: usize) -> Option<Observation> {
        if index >= self.obs.len() {
            return None;
        }
        let removed = self.obs.remove(index);
        self.validate();
        Some(removed)
    }

    pub fn clear(&mut self) {
        self.obs.clear();
        self.stats = None;
        self.validated = false;
    }

    pub fn is_valid(&self) -> bool {
        self.validated && self.stats.is_some()
    }

    pub fn stats(&self) -> Option<&SeriesStats> {
        self.stats.as_ref()
    }

    pub fn len(&self) -> usize {
        self.obs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.obs.is_empty()
    }

    /// Number of data columns (0 when invalid).
    pub fn num_data_columns(&self) -> usize {
        self.stats.map(|s| s.num_fields).unwrap_or(0)
    }

    pub fn mean_spacing(&self) -> f64 {
        self.stats.map(|s| s.mean_spacing).unwrap_or(0.0)
    }

    pub fn is_equidistant(&self) -> bool {
        self.stats.map(|s| s.equidistant).unwrap_or(false)
    }

    pub fn start(&self) -> Option<f64> {
        self.obs.first().map(|o| o.time)
    }

    pub fn end(&self) -> Option<f64> {
        self.obs.last().map(|o| o.time)
    }

    pub fn observations(&self) -> &[Observation] {
        &self.obs
    }

    pub fn get(&self, index: usize) -> Option<&Observation> {
        self.obs.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Observation> {
        self.obs.get_mut(index)
    }

    pub fn times(&self) -> Vec<f64> {
        self.obs.iter().map(|o| o.time).collect()
    }

    /// Value of field `column` at observation `index`, if present.
    pub fn value(&self, index: usize, column: usize) -> Option<f64> {
        self.obs.get(index).and_then(|o| o.fields.get(column).copied())
    }

    /// Copy one data column; missing fields read as NaN.
    pub fn column(&self, column: usize) -> Vec<f64> {
        self.obs
            .iter()
            .map(|o| o.fields.get(column).copied().unwrap_or(f64::NAN))
            .collect()
    }

    /// Render in the input text format.
    ///
    /// Floats use the shortest representation that parses back to the same
    /// value, so `load(to_text())` reproduces the series exactly.
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        out.push_str("# time fields...\n");
        for o in &self.obs {
            let _ = write!(out, "{}", o.time);
            for v in &o.fields {
                let _ = write!(out, " {v}");
            }
            out.push('\n');
        }
        out
    }
}

fn parse_line(line: &str) -> Result<Observation, String> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.len() < 2 {
        return Err(format!(
            "expected a timestamp and at least one field, got {} token(s)",
            tokens.len()
        ));
    }

    let time = parse_number(tokens[0])?;
    let fields = tokens[1..]
        .iter()
        .map(|t| parse_number(t))
        .collect::<Result<Vec<f64>, String>>()?;

    Ok(Observation::new(time, fields))
}

fn parse_number(token: &str) -> Result<f64, String> {
    match token.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        Ok(_) => Err(format!("non-finite number `{token}`")),
        Err(_) => Err(format!("invalid number `{token}`")),
    }
}

/// Most frequent field count; ties go to the larger count.
fn majority_field_count(obs: &[Observation]) -> Option<usize> {
    let mut counts: HashMap<usize, usize> = HashMap::new();
    for o in obs {
        *counts.entry(o.fields.len()).or_insert(0) += 1;
    }
    counts
        .into_iter()
        .max_by(|a, b| a.1.cmp(&b.1).then(a.0.cmp(&b.0)))
        .map(|(fields, _)| fields)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn equidistant_text(n: usize) -> String {
        let mut text = String::from("# t re im\n");
        for i in 0..n {
            text.push_str(&format!("{} {} {}\n", i as f64, (i as f64 * 0.3).sin(), 0.0));
        }
        text
    }

    #[test]
    fn load_skips_comments_and_malformed_lines() {
        let text = "# header\n\n1.0 2.0\n2.0 abc\n3\n3.0 4.0\n";
        let mut series = Series::new();
        let report = series.load(text);

        assert_eq!(report.lines_read, 4);
        assert_eq!(report.accepted, 2);
        assert_eq!(report.rejected.len(), 2);
        assert_eq!(report.rejected[0].line, 4);
        assert_eq!(report.rejected[1].line, 5);
        assert!(series.is_valid());
        assert_eq!(series.len(), 2);
    }

    #[test]
    fn non_finite_tokens_are_rejected() {
        let mut series = Series::new();
        let report = series.load("0 1\n1 2\n2 3\ninf 4\nnan 5\n3 nan\n4 -infinity\n");

        assert_eq!(report.accepted, 3);
        assert_eq!(report.rejected.len(), 4);
        assert_eq!(report.rejected[0].line, 4);
        assert!(report.rejected[0].message.contains("`inf`"));
        assert!(report.rejected[2].message.contains("`nan`"));

        let stats = series.stats().unwrap();
        assert_eq!(stats.mean_spacing, 1.0);
        assert_eq!(stats.max_spacing, 1.0);
    }

    #[test]
    fn validate_sorts_and_computes_spacing() {
        let mut series = Series::new();
        series.load("3.0 1\n1.0 1\n2.0 1\n5.0 1\n");

        assert_eq!(series.times(), vec![1.0, 2.0, 3.0, 5.0]);
        let stats = series.stats().unwrap();
        assert!((stats.mean_spacing - 4.0 / 3.0).abs() < 1e-12);
        assert_eq!(stats.min_spacing, 1.0);
        assert_eq!(stats.max_spacing, 2.0);
        assert!(!stats.equidistant);
    }

    #[test]
    fn minority_field_count_is_pruned_once() {
        let text = "0 1 2\n1 1 2\n2 1 2 3\n3 1 2\n4 1 2\n";
        let mut series = Series::new();
        let report = series.load(text);

        assert_eq!(report.pruned, 1);
        assert_eq!(series.num_data_columns(), 2);
        assert_eq!(series.len(), 4);
        assert!(series.observations().iter().all(|o| o.fields.len() == 2));
    }

    #[test]
    fn single_observation_is_invalid() {
        let mut series = Series::new();
        series.load("1.0 2.0\n");
        assert!(!series.is_valid());
        assert!(series.stats().is_none());
        assert_eq!(series.num_data_columns(), 0);
    }

    #[test]
    fn text_round_trip_preserves_tuples_and_stats() {
        let mut series = Series::new();
        series.load(&equidistant_text(25));
        assert!(series.is_equidistant());

        let mut again = Series::new();
        again.load(&series.to_text());

        assert_eq!(series.observations(), again.observations());
        assert_eq!(series.stats(), again.stats());
    }

    #[test]
    fn push_and_remove_revalidate() {
        let mut series = Series::new();
        series.load("0 1\n1 1\n2 1\n");
        assert!(series.is_equidistant());

        series.push(Observation::new(4.0, vec![1.0]));
        assert!(!series.is_equidistant());
        assert_eq!(series.len(), 4);

        let removed = series.remove(3).unwrap();
        assert_eq!(removed.time(), 4.0);
        assert!(series.is_equidistant());
        assert!(series.remove(10).is_none());
    }
}
