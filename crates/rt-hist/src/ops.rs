//! Error propagation helpers operating on whole histograms.

use rt_core::{Error, Result};

use crate::histogram::Histogram;

/// Quadrature sum of the errors of x bins `[bin_lo, bin_hi]` of a 1D histogram.
pub fn total_error(h: &Histogram, bin_lo: usize, bin_hi: usize) -> f64 {
    (bin_lo..=bin_hi).map(|b| h.bin_error(b).powi(2)).sum::<f64>().sqrt()
}

/// Replace the errors of an efficiency histogram `p` by binomial errors
/// `sqrt(p (1 - p) N) / N` computed from the trial counts in `n`.
///
/// Bins with `N == 0` keep a zero error.
pub fn binomial_errors(p: &mut Histogram, n: &Histogram) -> Result<()> {
    if !p.same_binning(n) {
        return Err(Error::Validation(format!(
            "binomial errors: '{}' and '{}' have different binning",
            p.name(),
            n.name()
        )));
    }
    let ny = if p.dimension() >= 2 { p.n_bins_y() } else { 1 };
    let nz = if p.dimension() == 3 { p.n_bins_z() } else { 1 };
    for k in 1..=nz {
        for j in 1..=ny {
            for i in 1..=p.n_bins_x() {
                let g = p.global_bin(i, j, k);
                let pv = p.bin_content(g);
                let nv = n.bin_content(g);
                let err = if nv == 0.0 { 0.0 } else { (pv * (1.0 - pv) * nv).abs().sqrt() / nv };
                p.set_bin_error(g, err);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_total_error() {
        let mut h = Histogram::new_1d("h", "", 3, 0.0, 3.0).unwrap();
        h.fill(0.5, 3.0);
        h.fill(1.5, 4.0);
        assert_relative_eq!(total_error(&h, 1, 2), 5.0);
        assert_relative_eq!(total_error(&h, 3, 3), 0.0);
    }

    #[test]
    fn test_binomial_errors() {
        let mut p = Histogram::new_2d("p", "", 2, 0.0, 2.0, 1, 0.0, 1.0).unwrap();
        let mut n = Histogram::new_2d("n", "", 2, 0.0, 2.0, 1, 0.0, 1.0).unwrap();
        let g = p.global_bin(1, 1, 0);
        p.set_bin_content(g, 0.5);
        n.set_bin_content(g, 100.0);
        binomial_errors(&mut p, &n).unwrap();
        assert_relative_eq!(p.bin_error(g), 0.05);
        assert_eq!(p.bin_error(p.global_bin(2, 1, 0)), 0.0);
    }

    #[test]
    fn test_binomial_errors_shape_mismatch() {
        let mut p = Histogram::new_1d("p", "", 2, 0.0, 2.0).unwrap();
        let n = Histogram::new_1d("n", "", 3, 0.0, 2.0).unwrap();
        assert!(binomial_errors(&mut p, &n).is_err());
    }
}
