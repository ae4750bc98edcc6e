//! Chi-square curve fitting of 1D histograms.
//!
//! The fitter minimizes `sum ((y_i - f(x_i)) / e_i)^2` over the bins of the
//! fit range with non-zero error, `x_i` being the bin center. Only the free
//! parameters of the spec are varied; each stays within its limits.
//! Uncertainties come from the Gauss-Newton covariance `(J^T J)^-1` of the
//! error-weighted model Jacobian `J` at the minimum.

use crate::function::CurveFunction;
use crate::spec::HistogramFitSpec;
use argmin::core::{CostFunction, Executor, Gradient, State, TerminationReason};
use argmin::solver::linesearch::MoreThuenteLineSearch;
use argmin::solver::quasinewton::LBFGS;
use nalgebra::{DMatrix, DVector};
use rt_core::{CurveModel, Error, FitResult, Result};
use rt_hist::{CurveRole, FitCurve, Histogram};
use statrs::distribution::{ChiSquared, ContinuousCDF};
use std::cell::Cell;

/// Something that can fit a histogram according to a [`HistogramFitSpec`].
pub trait CurveFitter {
    /// Fit `hist`. Returns `Ok(true)` on success, in which case the total,
    /// signal and background curves are attached to `hist` in that order.
    /// `Ok(false)` means the fit ran but did not succeed.
    fn fit(&self, hist: &mut Histogram, spec: &HistogramFitSpec) -> Result<bool>;
}

/// Chi-square of `model` over `points` as a function of the free parameters.
#[derive(Clone, Copy)]
struct ChiSquareProblem<'a> {
    model: &'a CurveFunction,
    /// `(bin center, content, error)`
    points: &'a [(f64, f64, f64)],
    /// Full parameter vector; fixed entries keep these values.
    start: &'a [f64],
    free: &'a [usize],
    /// Limits of the free parameters.
    limits: &'a [(f64, f64)],
    evaluations: &'a Cell<usize>,
}

impl ChiSquareProblem<'_> {
    /// Full parameter vector with the free values clamped to their limits.
    fn expand(&self, free_values: &[f64]) -> Vec<f64> {
        let mut full = self.start.to_vec();
        for ((&i, &v), &(lo, hi)) in self.free.iter().zip(free_values).zip(self.limits) {
            full[i] = v.clamp(lo, hi);
        }
        full
    }

    fn residuals(&self, full: &[f64]) -> DVector<f64> {
        DVector::from_iterator(
            self.points.len(),
            self.points.iter().map(|&(x, y, e)| (y - self.model.eval(x, full)) / e),
        )
    }

    fn chi2(&self, full: &[f64]) -> f64 {
        let chi2 = self.residuals(full).norm_squared();
        if chi2.is_finite() { chi2 } else { f64::MAX }
    }

    /// Error-weighted model derivatives, one row per point and one column
    /// per free parameter.
    fn jacobian(&self, full: &[f64]) -> DMatrix<f64> {
        let mut jac = DMatrix::zeros(self.points.len(), self.free.len());
        for (col, &i) in self.free.iter().enumerate() {
            let h = 1e-7 * full[i].abs().max(1.0);
            let (mut up, mut down) = (full.to_vec(), full.to_vec());
            up[i] += h;
            down[i] -= h;
            for (row, &(x, _, e)) in self.points.iter().enumerate() {
                jac[(row, col)] = (self.model.eval(x, &up) - self.model.eval(x, &down)) / (2.0 * h * e);
            }
        }
        jac
    }
}

impl CostFunction for ChiSquareProblem<'_> {
    type Param = Vec<f64>;
    type Output = f64;

    fn cost(&self, params: &Vec<f64>) -> std::result::Result<f64, argmin::core::Error> {
        self.evaluations.set(self.evaluations.get() + 1);
        Ok(self.chi2(&self.expand(params)))
    }
}

impl Gradient for ChiSquareProblem<'_> {
    type Param = Vec<f64>;
    type Gradient = Vec<f64>;

    fn gradient(&self, params: &Vec<f64>) -> std::result::Result<Vec<f64>, argmin::core::Error> {
        let full = self.expand(params);
        let grad = self.jacobian(&full).transpose() * self.residuals(&full) * -2.0;
        // no descent through a limit the parameter already sits on
        Ok(grad
            .iter()
            .zip(self.free)
            .zip(self.limits)
            .map(|((&g, &i), &(lo, hi))| {
                if (full[i] <= lo && g > 0.0) || (full[i] >= hi && g < 0.0) { 0.0 } else { g }
            })
            .collect())
    }
}

/// Upper-tail probability of `chi2` for `ndf` degrees of freedom.
pub fn fit_probability(chi2: f64, ndf: usize) -> f64 {
    if ndf == 0 || !chi2.is_finite() {
        return f64::NAN;
    }
    match ChiSquared::new(ndf as f64) {
        Ok(dist) => dist.sf(chi2.max(0.0)),
        Err(_) => f64::NAN,
    }
}

/// Bounded L-BFGS chi-square fitter.
#[derive(Debug, Clone)]
pub struct ChiSquareFitter {
    /// Iteration limit of the minimizer
    pub max_iter: u64,
    /// Gradient-norm tolerance; the chi-square change tolerance is 1e-3 of it
    pub tolerance: f64,
    /// L-BFGS history length
    pub memory: usize,
}

impl Default for ChiSquareFitter {
    fn default() -> Self {
        Self { max_iter: 1000, tolerance: 1e-6, memory: 10 }
    }
}

impl ChiSquareFitter {
    /// Fit `hist` without modifying it.
    pub fn fit_result(&self, hist: &Histogram, spec: &HistogramFitSpec) -> Result<FitResult> {
        if hist.dimension() != 1 {
            return Err(Error::Validation(format!(
                "curve fits need a 1D histogram, '{}' is {}D",
                hist.name(),
                hist.dimension()
            )));
        }
        let model = spec.total_function()?;
        let init = spec.initial_parameters(hist)?;
        if init.len() != model.n_parameters() {
            return Err(Error::Validation(format!(
                "'{}' needs {} parameters, got {}",
                model.formula(),
                model.n_parameters(),
                init.len()
            )));
        }

        let axis = hist.axis(0);
        let b_lo = axis.find_bin(spec.range.0).max(1);
        let b_hi = axis.find_bin(spec.range.1).min(axis.n_bins());
        let points: Vec<(f64, f64, f64)> = (b_lo..=b_hi)
            .filter_map(|b| {
                let g = hist.global_bin(b, 1, 1);
                let e = hist.bin_error(g);
                (e > 0.0).then(|| (axis.bin_center(b), hist.bin_content(g), e))
            })
            .collect();

        let free: Vec<usize> = (0..init.len()).filter(|&i| !init[i].fixed).collect();
        if points.len() <= free.len() {
            return Err(Error::Computation(format!(
                "'{}' has {} usable bins in [{}, {}] for {} free parameters",
                hist.name(),
                points.len(),
                spec.range.0,
                spec.range.1,
                free.len()
            )));
        }
        let ndf = points.len() - free.len();

        let start: Vec<f64> = init.iter().map(|p| p.value).collect();
        let limits: Vec<(f64, f64)> = free.iter().map(|&i| init[i].bounds()).collect();
        let evaluations = Cell::new(0);
        let problem = ChiSquareProblem {
            model: &model,
            points: &points,
            start: &start,
            free: &free,
            limits: &limits,
            evaluations: &evaluations,
        };

        let (best, converged) = if free.is_empty() {
            (Vec::new(), true)
        } else {
            let x0: Vec<f64> =
                free.iter().zip(&limits).map(|(&i, &(lo, hi))| start[i].clamp(lo, hi)).collect();
            self.minimize(problem, x0)?
        };

        let parameters = problem.expand(&best);
        let chi2 = problem.chi2(&parameters);
        let jac = problem.jacobian(&parameters);
        let normal = jac.tr_mul(&jac);
        let cov_free = invert_normal_matrix(&normal).unwrap_or_else(|| {
            log::warn!("Normal matrix of '{}' is singular, using diagonal errors", hist.name());
            DMatrix::from_fn(free.len(), free.len(), |a, b| {
                if a == b { 1.0 / normal[(a, a)].abs().max(1e-12) } else { 0.0 }
            })
        });

        let n = parameters.len();
        let mut uncertainties = vec![0.0; n];
        let mut covariance = vec![0.0; n * n];
        for (a, &i) in free.iter().enumerate() {
            uncertainties[i] = cov_free[(a, a)].max(0.0).sqrt();
            for (b, &j) in free.iter().enumerate() {
                covariance[i * n + j] = cov_free[(a, b)];
            }
        }
        log::debug!(
            "{}: chi2 = {chi2} / {ndf} after {} evaluations (converged: {converged})",
            hist.name(),
            evaluations.get()
        );

        Ok(FitResult::new(parameters, uncertainties, chi2, ndf, converged, evaluations.get())
            .with_covariance(covariance))
    }

    /// L-BFGS over the free parameters; returns the best free values and
    /// whether the solver met a tolerance.
    fn minimize(&self, problem: ChiSquareProblem<'_>, x0: Vec<f64>) -> Result<(Vec<f64>, bool)> {
        let solver = LBFGS::new(MoreThuenteLineSearch::new(), self.memory)
            .with_tolerance_grad(self.tolerance)
            .and_then(|s| s.with_tolerance_cost(self.tolerance * 1e-3))
            .map_err(|e| Error::Validation(format!("fitter tolerance {}: {e}", self.tolerance)))?;
        let res = Executor::new(problem, solver)
            .configure(|state| state.param(x0).max_iters(self.max_iter))
            .run()
            .map_err(|e| Error::Computation(format!("chi-square minimization: {e}")))?;

        let state = res.state();
        let best = state
            .get_best_param()
            .cloned()
            .ok_or_else(|| Error::Computation("minimizer returned no parameters".into()))?;
        let converged = matches!(
            state.get_termination_reason(),
            Some(TerminationReason::SolverConverged | TerminationReason::TargetCostReached)
        );
        Ok((best, converged))
    }
}

impl CurveFitter for ChiSquareFitter {
    fn fit(&self, hist: &mut Histogram, spec: &HistogramFitSpec) -> Result<bool> {
        let result = match self.fit_result(hist, spec) {
            Ok(r) => r,
            Err(Error::Computation(msg)) => {
                log::warn!("Fit of '{}' failed: {msg}", hist.name());
                return Ok(false);
            }
            Err(e) => return Err(e),
        };
        if !result.converged {
            log::warn!("Fit of '{}' did not converge (chi2 = {})", hist.name(), result.chi2);
            return Ok(false);
        }
        log::debug!(
            "Fit of '{}': chi2/ndf = {}/{}, prob = {:.3}",
            hist.name(),
            result.chi2,
            result.ndf,
            fit_probability(result.chi2, result.ndf)
        );

        let sig = spec.signal_function()?;
        let bkg = spec.background_function()?;
        let n_sig = sig.n_parameters();
        let curve = |name: String, role, formula: String, lo: usize, hi: usize| FitCurve {
            name,
            role,
            formula,
            parameters: result.parameters[lo..hi].to_vec(),
            errors: result.uncertainties[lo..hi].to_vec(),
            range: spec.range,
            chi2: result.chi2,
            ndf: result.ndf,
            drawable: true,
        };
        let n = result.parameters.len();
        let name = hist.name().to_string();
        let total = curve(format!("f_{name}"), CurveRole::Total, spec.total_function()?.formula(), 0, n);
        let signal = curve(format!("f_{name}_sig"), CurveRole::Signal, sig.formula(), 0, n_sig);
        let background = curve(format!("f_{name}_bkg"), CurveRole::Background, bkg.formula(), n_sig, n);

        hist.clear_functions();
        hist.add_function(total);
        hist.add_function(signal);
        hist.add_function(background);
        Ok(true)
    }
}

/// Damped Cholesky inverse with an LU fallback; `None` for non-positive variances.
fn invert_normal_matrix(m: &DMatrix<f64>) -> Option<DMatrix<f64>> {
    let n = m.nrows();
    let identity = DMatrix::identity(n, n);
    let scale = (0..n).map(|i| m[(i, i)].abs()).fold(0.0_f64, f64::max).max(1.0);

    let mut damped = m.clone();
    for step in 0..10 {
        if let Some(chol) = damped.clone().cholesky() {
            return Some(chol.solve(&identity));
        }
        let add = scale * 1e-9 * 10f64.powi(step);
        for i in 0..n {
            damped[(i, i)] += add;
        }
    }

    let cov = damped.lu().try_inverse()?;
    (0..n).all(|i| cov[(i, i)].is_finite() && cov[(i, i)] > 0.0).then_some(cov)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::FitParameter;
    use approx::assert_relative_eq;

    fn line_histogram() -> Histogram {
        let mut h = Histogram::new_1d("h_line", "", 10, 0.0, 10.0).unwrap();
        for b in 1..=10 {
            let x = h.axis(0).bin_center(b);
            h.set_bin_content(b, 2.0 + 0.5 * x);
            h.set_bin_error(b, 1.0);
        }
        h
    }

    #[test]
    fn straight_line_fit_is_exact() {
        let h = line_histogram();
        // gaus fixed at zero amplitude leaves a pure pol1 fit
        let spec = HistogramFitSpec::new("h_line", "gaus", "pol1", (0.0, 10.0))
            .unwrap()
            .with_parameters(vec![
                FitParameter::fixed(0.0),
                FitParameter::fixed(5.0),
                FitParameter::fixed(1.0),
                FitParameter::free(1.0),
                FitParameter::free(0.0),
            ])
            .unwrap();
        let res = ChiSquareFitter::default().fit_result(&h, &spec).unwrap();
        assert_relative_eq!(res.parameters[3], 2.0, epsilon = 1e-3);
        assert_relative_eq!(res.parameters[4], 0.5, epsilon = 1e-3);
        assert_eq!(res.ndf, 8);
        assert!(res.chi2 < 1e-4);
        assert_eq!(res.uncertainties[0], 0.0);
        // slope error of an unweighted least-squares line: 1/sqrt(sum (x - xbar)^2)
        assert_relative_eq!(res.uncertainties[4], 1.0 / 82.5f64.sqrt(), epsilon = 1e-3);
    }

    fn line_spec(intercept: FitParameter, slope: FitParameter) -> HistogramFitSpec {
        HistogramFitSpec::new("h_line", "gaus", "pol1", (0.0, 10.0))
            .unwrap()
            .with_parameters(vec![
                FitParameter::fixed(0.0),
                FitParameter::fixed(5.0),
                FitParameter::fixed(1.0),
                intercept,
                slope,
            ])
            .unwrap()
    }

    #[test]
    fn parameter_limits_hold() {
        let h = line_histogram();
        let spec = line_spec(FitParameter::free(1.0), FitParameter::bounded(0.1, 0.0, 0.3));
        let res = ChiSquareFitter::default().fit_result(&h, &spec).unwrap();
        assert_relative_eq!(res.parameters[4], 0.3, epsilon = 1e-9);
        // best intercept for the slope pinned at 0.3: mean(y) - 0.3 * mean(x)
        assert_relative_eq!(res.parameters[3], 3.0, epsilon = 1e-3);
        assert!(res.n_evaluations > 0);
    }

    #[test]
    fn all_fixed_parameters_skip_the_minimizer() {
        let h = line_histogram();
        let spec = line_spec(FitParameter::fixed(2.0), FitParameter::fixed(0.5));
        let res = ChiSquareFitter::default().fit_result(&h, &spec).unwrap();
        assert!(res.converged);
        assert_eq!(res.n_evaluations, 0);
        assert_eq!(res.ndf, 10);
        assert_relative_eq!(res.chi2, 0.0, epsilon = 1e-12);
        assert!(res.uncertainties.iter().all(|e| *e == 0.0));
    }

    #[test]
    fn covariance_is_symmetric() {
        let h = line_histogram();
        let spec = line_spec(FitParameter::free(1.0), FitParameter::free(0.0));
        let res = ChiSquareFitter::default().fit_result(&h, &spec).unwrap();
        let cov = res.covariance.unwrap();
        assert_relative_eq!(cov[3 * 5 + 4], cov[4 * 5 + 3], epsilon = 1e-12);
        // intercept and slope of a line over positive x anticorrelate
        assert!(cov[3 * 5 + 4] < 0.0);
        assert_eq!(cov[0], 0.0);
    }

    #[test]
    fn too_few_bins_is_not_a_success() {
        let mut h = Histogram::new_1d("h", "", 4, 0.0, 4.0).unwrap();
        h.fill(0.5, 1.0);
        let spec = HistogramFitSpec::new("h", "gaus", "pol1", (0.0, 4.0)).unwrap();
        assert!(!ChiSquareFitter::default().fit(&mut h, &spec).unwrap());
        assert!(h.functions().is_empty());
    }

    #[test]
    fn fit_of_2d_histogram_is_an_error() {
        let mut h = Histogram::new_2d("h2", "", 2, 0.0, 1.0, 2, 0.0, 1.0).unwrap();
        let spec = HistogramFitSpec::new("h2", "gaus", "pol0", (0.0, 1.0)).unwrap();
        assert!(ChiSquareFitter::default().fit(&mut h, &spec).is_err());
    }

    #[test]
    fn probability_bounds() {
        assert_relative_eq!(fit_probability(0.0, 5), 1.0, epsilon = 1e-12);
        assert!(fit_probability(100.0, 2) < 1e-10);
        assert!(fit_probability(1.0, 0).is_nan());
    }
}
