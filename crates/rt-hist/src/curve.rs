//! Fitted curves attached to histograms.

use serde::{Deserialize, Serialize};

/// Role of an attached curve in a signal + background fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CurveRole {
    /// Sum of signal and background.
    Total,
    /// Signal component.
    Signal,
    /// Background component.
    Background,
}

/// A fitted curve: formula, best-fit parameters and fit quality.
///
/// The formula is a `+`-separated list of function names (`"gaus+pol1"`);
/// parameters of the terms are concatenated in the same order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitCurve {
    /// Curve name
    pub name: String,
    /// Role in the fit
    pub role: CurveRole,
    /// Formula
    pub formula: String,
    /// Parameter values
    pub parameters: Vec<f64>,
    /// Parameter uncertainties
    pub errors: Vec<f64>,
    /// Fit range
    pub range: (f64, f64),
    /// Chi-square of the fit the curve comes from
    pub chi2: f64,
    /// Degrees of freedom of the fit the curve comes from
    pub ndf: usize,
    /// Whether canvases draw the curve
    pub drawable: bool,
}

impl FitCurve {
    /// Reduced chi-square (`NaN` without degrees of freedom).
    pub fn chi2_ndf(&self) -> f64 {
        if self.ndf == 0 { f64::NAN } else { self.chi2 / self.ndf as f64 }
    }
}
