//! Legendre angular distributions `P0 + a2 P2 + a4 P4`.

use rt_core::CurveModel;
use rt_hist::Histogram;

/// Legendre polynomial `P_l(x)` by the Bonnet recursion.
pub fn legendre(l: usize, x: f64) -> f64 {
    match l {
        0 => 1.0,
        1 => x,
        _ => {
            let (mut p0, mut p1) = (1.0, x);
            for k in 1..l {
                let k = k as f64;
                let p2 = ((2.0 * k + 1.0) * x * p1 - k * p0) / (k + 1.0);
                p0 = p1;
                p1 = p2;
            }
            p1
        }
    }
}

/// Angular distribution with even Legendre coefficients `a2`, `a4`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AngularDistribution {
    /// Coefficient of `P2`
    pub a2: f64,
    /// Coefficient of `P4`
    pub a4: f64,
}

impl AngularDistribution {
    /// Distribution with the given coefficients.
    pub fn new(a2: f64, a4: f64) -> Self {
        Self { a2, a4 }
    }

    /// Value at `x`.
    pub fn value(&self, x: f64) -> f64 {
        1.0 + self.a2 * legendre(2, x) + self.a4 * legendre(4, x)
    }

    /// Integral over `[lo, hi]`.
    pub fn integrate(&self, lo: f64, hi: f64) -> f64 {
        self.antiderivative(hi) - self.antiderivative(lo)
    }

    fn antiderivative(&self, x: f64) -> f64 {
        let x3 = x * x * x;
        let x5 = x3 * x * x;
        x + self.a2 * 0.5 * (x3 - x) + self.a4 * (7.0 * x5 - 10.0 * x3 + 3.0 * x) / 8.0
    }
}

impl CurveModel for AngularDistribution {
    fn n_parameters(&self) -> usize {
        2
    }

    fn parameter_names(&self) -> Vec<String> {
        vec!["a2".into(), "a4".into()]
    }

    fn eval(&self, x: f64, params: &[f64]) -> f64 {
        AngularDistribution::new(params[0], params[1]).value(x)
    }

    fn integral(&self, lo: f64, hi: f64, params: &[f64]) -> f64 {
        if hi <= lo {
            return 0.0;
        }
        AngularDistribution::new(params[0], params[1]).integrate(lo, hi)
    }
}

/// Reweight every x column of `hist` by the angular distribution integrated
/// over the column.
///
/// With a correction distribution the factor is the ratio of the two
/// integrals; without one it is the integral divided by the column width.
/// Only contents change.
pub fn apply_angular_distribution(
    hist: &mut Histogram,
    dist: AngularDistribution,
    correction: Option<AngularDistribution>,
) {
    let ny = if hist.dimension() >= 2 { hist.n_bins_y() } else { 1 };
    let nz = if hist.dimension() == 3 { hist.n_bins_z() } else { 1 };
    for bx in 1..=hist.n_bins_x() {
        let axis = hist.axis(0);
        let (l, r) = (axis.bin_low_edge(bx), axis.bin_up_edge(bx));
        let integral = dist.integrate(l, r);
        let factor = match correction {
            Some(corr) => {
                let c = corr.integrate(l, r);
                if c == 0.0 {
                    log::warn!("Correction integral vanishes in column {bx} of '{}'", hist.name());
                    continue;
                }
                integral / c
            }
            None => integral / axis.bin_width(bx),
        };
        for bz in 1..=nz {
            for by in 1..=ny {
                let g = hist.global_bin(bx, by, bz);
                let v = hist.bin_content(g);
                hist.set_bin_content(g, v * factor);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn legendre_values() {
        assert_relative_eq!(legendre(2, 0.5), -0.125);
        assert_relative_eq!(legendre(4, 0.5), (35.0 * 0.0625 - 30.0 * 0.25 + 3.0) / 8.0);
        assert_relative_eq!(legendre(3, 1.0), 1.0);
    }

    #[test]
    fn even_terms_integrate_to_zero_on_full_range() {
        let d = AngularDistribution::new(0.7, -0.3);
        assert_relative_eq!(d.integrate(-1.0, 1.0), 2.0, epsilon = 1e-12);
        let numeric = CurveModel::integral(&Simpson, 0.1, 0.6, &[0.7, -0.3]);
        assert_relative_eq!(d.integrate(0.1, 0.6), numeric, epsilon = 1e-9);
    }

    #[test]
    fn flat_distribution_leaves_contents() {
        let mut h = Histogram::new_2d("h", "", 4, -1.0, 1.0, 2, 0.0, 1.0).unwrap();
        for g in 0..100 {
            h.set_bin_content(g, 3.0);
        }
        apply_angular_distribution(&mut h, AngularDistribution::new(0.0, 0.0), None);
        assert_relative_eq!(h.bin_content(h.global_bin(2, 1, 1)), 3.0, epsilon = 1e-12);
        assert_relative_eq!(h.bin_content(h.global_bin(4, 2, 1)), 3.0, epsilon = 1e-12);
    }

    #[test]
    fn correction_ratio_factor() {
        let mut h = Histogram::new_1d("h", "", 2, -1.0, 1.0).unwrap();
        h.set_bin_content(1, 1.0);
        h.set_bin_content(2, 1.0);
        h.set_bin_error(1, 0.5);
        let d = AngularDistribution::new(1.0, 0.0);
        apply_angular_distribution(&mut h, d, Some(AngularDistribution::new(0.0, 0.0)));
        // P2 integrates to zero over [-1, 0], so the factor is 1
        assert_relative_eq!(h.bin_content(1), 1.0, epsilon = 1e-12);
        assert_relative_eq!(h.bin_error(1), 0.5);
    }

    struct Simpson;

    impl CurveModel for Simpson {
        fn n_parameters(&self) -> usize {
            2
        }
        fn parameter_names(&self) -> Vec<String> {
            Vec::new()
        }
        fn eval(&self, x: f64, params: &[f64]) -> f64 {
            AngularDistribution::new(params[0], params[1]).value(x)
        }
    }
}
