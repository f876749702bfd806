//! AR order selection by Final Prediction Error.
//!
//! The scan is a plain driver loop: for each order in the requested range we
//! set the order, estimate, and record `(order, power, fpe)`. Orders whose
//! estimation fails are listed as skipped. The estimator is left at the
//! FPE-minimising order, in the `Ready` state.

use tracing::{info, warn};

use super::MemEstimator;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrderScanRow {
    pub order: usize,
    pub power: f64,
    pub fpe: f64,
}

#[derive(Debug, Clone, Default)]
pub struct OrderScan {
    pub rows: Vec<OrderScanRow>,
    pub skipped: Vec<usize>,
    /// Order with the smallest FPE, if any order succeeded.
    pub best: Option<usize>,
}

/// Scan `min..=max` (clamped to the estimator's valid range).
pub fn scan_orders(mem: &mut MemEstimator, min: usize, max: usize) -> OrderScan {
    let mut scan = OrderScan::default();
    if !mem.is_ok() {
        warn!("order scan requested on an unloaded estimator");
        return scan;
    }

    let lo = min.max(mem.min_order());
    let hi = max.min(mem.max_order());
    if lo > hi {
        warn!(min = lo, max = hi, "empty order range");
        return scan;
    }

    for order in lo..=hi {
        mem.set_order(order);
        if !mem.estimate() {
            scan.skipped.push(order);
            continue;
        }
        let (Some(power), Some(fpe)) = (mem.power(), mem.fpe()) else {
            scan.skipped.push(order);
            continue;
        };
        scan.rows.push(OrderScanRow { order, power, fpe });
    }

    scan.best = scan
        .rows
        .iter()
        .filter(|r| r.fpe.is_finite())
        .min_by(|a, b| a.fpe.total_cmp(&b.fpe))
        .map(|r| r.order);

    if let Some(best) = scan.best {
        mem.set_order(best);
        mem.estimate();
        info!(best, scanned = scan.rows.len(), "FPE order scan finished");
    }
    scan
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::synthetic::ar_process;
    use crate::mem::MemOptions;
    use crate::series::Series;

    #[test]
    fn overfitting_raises_fpe() {
        // AR(2) with a resonance; N is large enough that the penalty term
        // dominates well past the true order.
        let series = ar_process(&[1.2, -0.6], 1.0, 2000, 11).unwrap();
        let mut mem = MemEstimator::new();
        assert!(mem.load(series, MemOptions::default()));

        let scan = scan_orders(&mut mem, 2, 40);
        assert!(scan.skipped.is_empty());
        let at = |m: usize| scan.rows.iter().find(|r| r.order == m).unwrap().fpe;
        assert!(at(40) > at(2), "fpe(40)={} fpe(2)={}", at(40), at(2));

        let best = scan.best.unwrap();
        assert!(best < 15, "best order {best}");
        assert!(mem.is_ready());
        assert_eq!(mem.order(), best);
    }

    #[test]
    fn unloaded_estimator_scans_nothing() {
        let mut mem = MemEstimator::new();
        let scan = scan_orders(&mut mem, 2, 10);
        assert!(scan.rows.is_empty());
        assert!(scan.best.is_none());

        let mut series = Series::new();
        series.load("0 1 0\n");
        assert!(!mem.load(series, MemOptions::default()));
        assert!(scan_orders(&mut mem, 2, 10).rows.is_empty());
    }
}
