//! Ready-made fit callbacks.

use crate::differential::{DifferentialFactory, SliceFitStatus};
use crate::distribution::DistributionFactory;
use rt_fit::{SignalYield, fit_signal_yield, integral_yield};
use rt_hist::Histogram;

/// Yield of a slice for a callback status: the fitted signal yield for
/// converged fits, the plain integral for integral-only passes, nothing
/// for failed fits.
pub fn slice_yield(status: SliceFitStatus, hist: &Histogram) -> Option<SignalYield> {
    match status {
        SliceFitStatus::Converged => match fit_signal_yield(hist) {
            Ok(y) => y,
            Err(e) => {
                log::warn!("No yield for {}: {e}", hist.name());
                None
            }
        },
        SliceFitStatus::IntegralOnly => Some(integral_yield(hist)),
        SliceFitStatus::Failed => None,
    }
}

/// Callback storing each slice yield in the signal histogram of the sibling
/// factory, at the native bin `(bx + 1, by + 1, bz + 1)`.
pub fn store_yield_callback() -> impl FnMut(
    &DifferentialFactory,
    Option<&mut DistributionFactory>,
    SliceFitStatus,
    &Histogram,
    usize,
    usize,
    usize,
) + 'static {
    |_: &DifferentialFactory,
     sigfac: Option<&mut DistributionFactory>,
     status: SliceFitStatus,
     hist: &Histogram,
     bx: usize,
     by: usize,
     bz: usize| {
        let (Some(sigfac), Some(y)) = (sigfac, slice_yield(status, hist)) else {
            return;
        };
        if let Some(h) = sigfac.signal_mut() {
            let bin = h.global_bin(bx + 1, by + 1, bz + 1);
            h.set_bin_content(bin, y.value);
            h.set_bin_error(bin, y.error);
            log::debug!("{} -> {} = {} +- {}", hist.name(), h.name(), y.value, y.error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_fits_have_no_yield() {
        let mut h = Histogram::new_1d("h", "", 4, 0.0, 4.0).unwrap();
        h.fill(1.0, 1.0);
        assert!(slice_yield(SliceFitStatus::Failed, &h).is_none());
        assert_eq!(slice_yield(SliceFitStatus::IntegralOnly, &h).unwrap().value, 1.0);
        // converged without attached curves
        assert!(slice_yield(SliceFitStatus::Converged, &h).is_none());
    }
}
