//! Formatted terminal output.
//!
//! We keep formatting code in one place so:
//! - the estimation code stays clean and testable
//! - output changes are localized

use crate::domain::mjd_to_date;
use crate::filter::GaussFilter;
use crate::io::IngestedSeries;
use crate::mem::{MemEstimator, OrderScan};
use crate::models::RegressionModel;
use crate::report::ResidualRow;
use crate::series::Series;

/// Dataset summary: sizes, span, spacing and parse diagnostics.
pub fn format_series_summary(source: &str, ingest: &IngestedSeries) -> String {
    let mut out = String::new();
    let s = &ingest.series;
    let r = &ingest.report;

    out.push_str(&format!("Input: {source}\n"));
    out.push_str(&format!(
        "Lines: read={} accepted={} rejected={} pruned={}\n",
        r.lines_read,
        r.accepted,
        r.rejected.len(),
        r.pruned
    ));
    out.push_str(&format!(
        "Series: n={} | columns={} | span=[{}, {}]\n",
        s.len(),
        s.num_data_columns(),
        fmt_epoch(s.start()),
        fmt_epoch(s.end())
    ));
    out.push_str(&format!("Spacing: {}\n", fmt_spacing(s)));
    out
}

/// MEM run: model state, trend removal and the spectral peak.
pub fn format_mem_summary(mem: &MemEstimator, peak: Option<(f64, f64)>) -> String {
    let mut out = String::new();

    out.push_str("=== tsa - Maximum Entropy Spectrum ===\n");
    out.push_str(&format!(
        "Variant: {} | order={} (range {}..={})\n",
        mem.variant().display_name(),
        mem.order(),
        mem.min_order(),
        mem.max_order()
    ));
    out.push_str(&format!(
        "Samples: N={} | dt={} | Nyquist={:.6}\n",
        mem.n(),
        mem.sample_interval(),
        mem.nyquist()
    ));

    let re = mem.real_trend();
    let im = mem.imag_trend();
    out.push_str(&format!(
        "Trend ({:?}): real shift={:.6} slope={:.6} | imag shift={:.6} slope={:.6}\n",
        mem.trend_removal(),
        re.shift,
        re.slope,
        im.shift,
        im.slope
    ));
    if let Some(var) = mem.sample_variance() {
        out.push_str(&format!("Sample variance: {var:.6}\n"));
    }

    match (mem.power(), mem.fpe()) {
        (Some(p), Some(fpe)) => out.push_str(&format!("Innovation power: {p:.6e} | FPE: {fpe:.6e}\n")),
        _ => out.push_str("Model: not ready\n"),
    }

    if let Some(coeffs) = mem.coefficients() {
        out.push_str("\nCoefficients:\n");
        for (k, a) in coeffs.iter().enumerate() {
            out.push_str(&format!("  a{:<3} {:>+.6} {:>+.6}i\n", k + 1, a.re, a.im));
        }
    }

    if let Some((f, p)) = peak {
        let period = if f != 0.0 { format!("{:.4}", 1.0 / f.abs()) } else { "inf".to_string() };
        out.push_str(&format!("\nPeak: f={f:.6} (period {period}) psd={p:.6e}\n"));
    }
    out
}

/// Order scan table; `*` marks the FPE minimum.
pub fn format_order_scan(scan: &OrderScan) -> String {
    let mut out = String::new();
    out.push_str(format!("{:>6} {:>14} {:>14}", "order", "power", "fpe").trim_end());
    out.push('\n');
    out.push_str(&format!("{:-<6} {:-<14} {:-<14}", "", "", ""));
    out.push('\n');

    for row in &scan.rows {
        let chosen = if Some(row.order) == scan.best { "*" } else { "" };
        out.push_str(
            format!("{:>6} {:>14.6e} {:>14.6e} {chosen}", row.order, row.power, row.fpe)
                .trim_end(),
        );
        out.push('\n');
    }
    if !scan.skipped.is_empty() {
        let skipped: Vec<String> = scan.skipped.iter().map(|m| m.to_string()).collect();
        out.push_str(&format!("(skipped orders: {})\n", skipped.join(", ")));
    }
    match scan.best {
        Some(best) => out.push_str(&format!("Best order by FPE: {best}\n")),
        None => out.push_str("No order could be estimated.\n"),
    }
    out
}

/// Regression fit: diagnostics, coefficients ± errors, amplitude/phase.
pub fn format_fit_summary(model: &RegressionModel) -> String {
    let mut out = String::new();
    let cfg = model.config();

    out.push_str(&format!(
        "=== Regression: column {} (epoch {}) ===\n",
        cfg.column,
        fmt_epoch(Some(cfg.epoch))
    ));
    let Some(summary) = model.summary() else {
        out.push_str("Model: not fitted\n");
        return out;
    };
    out.push_str(&format!(
        "Rows: {} | params={} | sigma0={:.6} | vtpv={:.6}\n",
        summary.rows, summary.params, summary.sigma0, summary.vtpv
    ));

    out.push_str("\nPolynomial (per year^k):\n");
    for (k, (c, e)) in model
        .polynomial()
        .iter()
        .zip(model.polynomial_errors())
        .enumerate()
    {
        out.push_str(&format!("  x^{k:<2} {c:>+14.6} ± {e:.6}\n"));
    }

    out.push_str("\nHarmonics:\n");
    out.push_str(&format!(
        "  {:>12} {:>12} {:>10} {:>12} {:>10} {:>10} {:>9}  keep\n",
        "period", "cos", "±", "sin", "±", "amp", "phase°"
    ));
    for h in model.harmonics() {
        out.push_str(&format!(
            "  {:>12.4} {:>+12.6} {:>10.6} {:>+12.6} {:>10.6} {:>10.6} {:>9.2}  {}\n",
            h.period,
            h.cos,
            h.cos_err,
            h.sin,
            h.sin_err,
            h.amplitude(),
            h.phase().to_degrees(),
            if h.keep { "yes" } else { "no" }
        ));
    }

    if let Some(env) = model.envelope() {
        out.push_str(&format!(
            "\nEnvelope at period {:.4} (keep={}):\n",
            env.period, env.keep
        ));
        for (k, ((a, b), (ea, eb))) in env.coeffs.iter().zip(&env.errors).enumerate() {
            out.push_str(&format!(
                "  x^{k:<2} cos {a:>+12.6} ± {ea:.6} | sin {b:>+12.6} ± {eb:.6}\n"
            ));
        }
    }
    out
}

/// Largest residuals, with calendar dates when the epochs look like MJDs.
pub fn format_residual_table(rows: &[ResidualRow]) -> String {
    let mut out = String::new();
    out.push_str(
        format!(
            "{:>6} {:>14} {:>12} {:>12} {:>12} {:<8}",
            "index", "time", "observed", "fitted", "residual", "included"
        )
        .trim_end(),
    );
    out.push('\n');
    out.push_str(&format!(
        "{:-<6} {:-<14} {:-<12} {:-<12} {:-<12} {:-<8}\n",
        "", "", "", "", "", ""
    ));
    for r in rows {
        out.push_str(
            format!(
                "{:>6} {:>14} {:>12.4} {:>12.4} {:>+12.4} {:<8}",
                r.index,
                fmt_epoch(Some(r.time)),
                r.observed,
                r.fitted,
                r.residual,
                if r.included { "yes" } else { "no" }
            )
            .trim_end(),
        );
        out.push('\n');
    }
    out
}

/// Filter settings plus mask state after model preparation.
pub fn format_smooth_summary(filter: &GaussFilter, points: usize) -> String {
    let mut out = String::new();
    out.push_str("=== tsa - Gaussian Filter ===\n");
    out.push_str(&format!(
        "FWHM: {} | kernel sigma={:.6} | half-power frequency={:.6}\n",
        filter.fwhm(),
        filter.kernel_sigma(),
        half_power_frequency(filter.kernel_sigma())
    ));
    out.push_str(&format!(
        "Observations: {} | included={}\n",
        filter.series().len(),
        filter.mask().count_included()
    ));
    for model in filter.models() {
        let state = match model.summary() {
            Some(s) => format!("sigma0={:.6}", s.sigma0),
            None => "not fitted".to_string(),
        };
        out.push_str(&format!(
            "Model column {}: {} period(s), {state}\n",
            model.column(),
            model.harmonics().len()
        ));
    }
    out.push_str(&format!("Output points: {points}\n"));
    out
}

/// `resp_func(f) = 1/2` for a kernel of standard deviation `ks`.
fn half_power_frequency(ks: f64) -> f64 {
    if ks > 0.0 {
        (std::f64::consts::LN_2 / 2.0).sqrt() / (std::f64::consts::PI * ks)
    } else {
        f64::INFINITY
    }
}

fn fmt_spacing(s: &Series) -> String {
    match s.stats() {
        Some(st) => format!(
            "mean={} min={} max={} equidistant={}",
            st.mean_spacing, st.min_spacing, st.max_spacing, st.equidistant
        ),
        None => "n/a".to_string(),
    }
}

/// MJD-looking epochs (1950..2100) also show their calendar date.
fn fmt_epoch(t: Option<f64>) -> String {
    let Some(t) = t else {
        return "n/a".to_string();
    };
    match mjd_to_date(t) {
        Some(d) if (33282.0..88069.0).contains(&t) => format!("{t} ({d})"),
        _ => format!("{t}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mem::OrderScanRow;

    #[test]
    fn order_scan_marks_best() {
        let scan = OrderScan {
            rows: vec![
                OrderScanRow { order: 2, power: 1.0, fpe: 1.1 },
                OrderScanRow { order: 3, power: 0.9, fpe: 1.0 },
            ],
            skipped: vec![4],
            best: Some(3),
        };
        let text = format_order_scan(&scan);
        let marked: Vec<&str> = text.lines().filter(|l| l.ends_with('*')).collect();
        assert_eq!(marked.len(), 1);
        assert!(marked[0].trim_start().starts_with('3'));
        assert!(text.contains("skipped orders: 4"));
    }

    #[test]
    fn mjd_epochs_show_dates() {
        assert_eq!(fmt_epoch(Some(51544.0)), "51544 (2000-01-01)");
        assert_eq!(fmt_epoch(Some(12.5)), "12.5");
        assert_eq!(fmt_epoch(None), "n/a");
    }

    #[test]
    fn unfitted_model_says_so() {
        let model = RegressionModel::new(crate::models::RegressionConfig {
            column: 1,
            sigma_column: None,
            epoch: 0.0,
            poly_terms: 1,
            periods: vec![],
            envelope: None,
            eliminate_before: false,
            eliminate_after: false,
        });
        assert!(format_fit_summary(&model).contains("not fitted"));
    }
}
