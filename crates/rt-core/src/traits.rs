//! Core traits for roottools
//!
//! Curve models are described here so that the histogram layer can evaluate
//! attached fit curves without knowing which fitter produced them.

/// A parametric curve `f(x; p)` that can be attached to a histogram.
pub trait CurveModel {
    /// Number of parameters
    fn n_parameters(&self) -> usize;

    /// Parameter names, in parameter order
    fn parameter_names(&self) -> Vec<String>;

    /// Evaluate the curve at `x`
    fn eval(&self, x: f64, params: &[f64]) -> f64;

    /// Integral of the curve over `[lo, hi]` (Simpson rule unless overridden)
    fn integral(&self, lo: f64, hi: f64, params: &[f64]) -> f64 {
        const N: usize = 200;
        if hi <= lo {
            return 0.0;
        }
        let h = (hi - lo) / N as f64;
        let mut acc = self.eval(lo, params) + self.eval(hi, params);
        for i in 1..N {
            let w = if i % 2 == 1 { 4.0 } else { 2.0 };
            acc += w * self.eval(lo + h * i as f64, params);
        }
        acc * h / 3.0
    }
}
