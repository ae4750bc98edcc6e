//! Signal yields extracted from fitted or plain histograms.

use crate::function::CurveFunction;
use rt_core::{CurveModel, Result};
use rt_hist::{CurveRole, Histogram, total_error};
use serde::{Deserialize, Serialize};

/// A yield and its uncertainty.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SignalYield {
    /// Yield
    pub value: f64,
    /// Uncertainty
    pub error: f64,
}

/// Signal yield of a fitted histogram: total minus background curve over the
/// fit range, in counts (curve integrals divided by the bin width), with
/// error `sqrt(t + b)`.
///
/// Returns `Ok(None)` when the histogram carries no total and background curves.
pub fn fit_signal_yield(hist: &Histogram) -> Result<Option<SignalYield>> {
    let find = |role: CurveRole| hist.functions().iter().find(|c| c.role == role);
    let (Some(total), Some(bkg)) = (find(CurveRole::Total), find(CurveRole::Background)) else {
        return Ok(None);
    };
    let (lo, hi) = total.range;
    let width = hist.axis(0).bin_width(hist.axis(0).find_bin(lo).max(1));
    let t = CurveFunction::from_curve(total)?.integral(lo, hi, &total.parameters) / width;
    let b = CurveFunction::from_curve(bkg)?.integral(lo, hi, &bkg.parameters) / width;
    Ok(Some(SignalYield { value: t - b, error: (t + b).abs().sqrt() }))
}

/// Sum of in-range contents with the quadrature sum of the bin errors.
pub fn integral_yield(hist: &Histogram) -> SignalYield {
    let mut error2 = 0.0;
    let ny = if hist.dimension() >= 2 { hist.n_bins_y() } else { 1 };
    let nz = if hist.dimension() == 3 { hist.n_bins_z() } else { 1 };
    if hist.dimension() == 1 {
        let e = total_error(hist, 1, hist.n_bins_x());
        error2 = e * e;
    } else {
        for bz in 1..=nz {
            for by in 1..=ny {
                for bx in 1..=hist.n_bins_x() {
                    error2 += hist.bin_error(hist.global_bin(bx, by, bz)).powi(2);
                }
            }
        }
    }
    SignalYield { value: hist.integral_all(), error: error2.sqrt() }
}
