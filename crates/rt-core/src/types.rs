//! Common data types for roottools

use serde::{Deserialize, Serialize};

/// Result of a curve fit to a binned histogram
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FitResult {
    /// Best-fit parameter values
    pub parameters: Vec<f64>,

    /// Parameter uncertainties (sqrt of covariance diagonal)
    pub uncertainties: Vec<f64>,

    /// Covariance matrix (row-major, N×N). `None` if Hessian inversion failed.
    pub covariance: Option<Vec<f64>>,

    /// Chi-square at minimum
    pub chi2: f64,

    /// Number of degrees of freedom (fitted bins minus free parameters)
    pub ndf: usize,

    /// Convergence status
    pub converged: bool,

    /// Number of function evaluations
    pub n_evaluations: usize,
}

impl FitResult {
    /// Create a new fit result
    pub fn new(
        parameters: Vec<f64>,
        uncertainties: Vec<f64>,
        chi2: f64,
        ndf: usize,
        converged: bool,
        n_evaluations: usize,
    ) -> Self {
        Self { parameters, uncertainties, covariance: None, chi2, ndf, converged, n_evaluations }
    }

    /// Attach a covariance matrix
    pub fn with_covariance(mut self, covariance: Vec<f64>) -> Self {
        self.covariance = Some(covariance);
        self
    }

    /// Reduced chi-square, `None` when there are no degrees of freedom.
    pub fn chi2_ndf(&self) -> Option<f64> {
        if self.ndf == 0 { None } else { Some(self.chi2 / self.ndf as f64) }
    }

    /// Get correlation matrix element (i, j). Returns `None` if covariance is unavailable.
    pub fn correlation(&self, i: usize, j: usize) -> Option<f64> {
        let cov = self.covariance.as_ref()?;
        let n = self.parameters.len();
        if i >= n || j >= n {
            return None;
        }
        let sigma_i = self.uncertainties[i];
        let sigma_j = self.uncertainties[j];
        if sigma_i <= 0.0 || sigma_j <= 0.0 {
            return None;
        }
        Some(cov[i * n + j] / (sigma_i * sigma_j))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fit_result() {
        let result = FitResult::new(vec![1.0, 2.0], vec![0.1, 0.2], 12.0, 6, true, 100);
        assert_eq!(result.parameters.len(), 2);
        assert_eq!(result.chi2_ndf(), Some(2.0));
        assert!(result.converged);
        assert!(result.correlation(0, 1).is_none());
    }

    #[test]
    fn test_correlation() {
        let result = FitResult::new(vec![1.0, 2.0], vec![0.5, 2.0], 1.0, 0, true, 10)
            .with_covariance(vec![0.25, 0.5, 0.5, 4.0]);
        assert_eq!(result.chi2_ndf(), None);
        let rho = result.correlation(0, 1).unwrap();
        assert!((rho - 0.5).abs() < 1e-12);
    }
}
