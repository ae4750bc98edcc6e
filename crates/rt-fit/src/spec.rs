//! Per-histogram fit specification.

use crate::function::CurveFunction;
use rt_core::{CurveModel, Error, Result};
use rt_hist::Histogram;
use serde::{Deserialize, Serialize};

/// Starting value and limits of one fit parameter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FitParameter {
    /// Initial value
    pub value: f64,
    /// Lower limit
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lower: Option<f64>,
    /// Upper limit
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upper: Option<f64>,
    /// Keep the parameter at its value
    #[serde(default)]
    pub fixed: bool,
}

impl FitParameter {
    /// Free parameter without limits.
    pub fn free(value: f64) -> Self {
        Self { value, lower: None, upper: None, fixed: false }
    }

    /// Free parameter within `[lower, upper]`.
    pub fn bounded(value: f64, lower: f64, upper: f64) -> Self {
        Self { value, lower: Some(lower), upper: Some(upper), fixed: false }
    }

    /// Parameter fixed at `value`.
    pub fn fixed(value: f64) -> Self {
        Self { value, lower: None, upper: None, fixed: true }
    }

    /// Limits each parameter is clamped to while minimizing.
    pub fn bounds(&self) -> (f64, f64) {
        if self.fixed {
            return (self.value, self.value);
        }
        (self.lower.unwrap_or(f64::NEG_INFINITY), self.upper.unwrap_or(f64::INFINITY))
    }
}

/// How to fit one histogram: signal and background formulas, fit range,
/// optional rebinning and starting parameters (signal first).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistogramFitSpec {
    /// Name of the histogram the spec applies to
    pub hist_name: String,
    /// Signal formula
    pub signal: String,
    /// Background formula
    pub background: String,
    /// Fit range
    pub range: (f64, f64),
    /// Rebin factor applied before the fit (0 or 1: none)
    #[serde(default)]
    pub rebin: usize,
    /// Skip the fit entirely
    #[serde(default)]
    pub fit_disabled: bool,
    /// Starting parameters; empty means estimated from the histogram
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<FitParameter>,
}

impl HistogramFitSpec {
    /// New spec with estimated starting parameters.
    pub fn new(
        hist_name: impl Into<String>,
        signal: &str,
        background: &str,
        range: (f64, f64),
    ) -> Result<Self> {
        let spec = Self {
            hist_name: hist_name.into(),
            signal: signal.to_string(),
            background: background.to_string(),
            range,
            rebin: 0,
            fit_disabled: false,
            parameters: Vec::new(),
        };
        spec.validate()?;
        Ok(spec)
    }

    /// Same spec with explicit starting parameters.
    pub fn with_parameters(mut self, parameters: Vec<FitParameter>) -> Result<Self> {
        self.parameters = parameters;
        self.validate()?;
        Ok(self)
    }

    /// Same spec with a rebin factor.
    pub fn with_rebin(mut self, rebin: usize) -> Self {
        self.rebin = rebin;
        self
    }

    /// Same spec with fitting switched off.
    pub fn disabled(mut self) -> Self {
        self.fit_disabled = true;
        self
    }

    /// Copy of the spec for another histogram.
    pub fn clone_for(&self, hist_name: impl Into<String>) -> Self {
        Self { hist_name: hist_name.into(), ..self.clone() }
    }

    /// Check formulas, range and parameter count.
    pub fn validate(&self) -> Result<()> {
        let total = self.total_function()?;
        if !(self.range.0.is_finite() && self.range.1.is_finite()) || self.range.1 <= self.range.0 {
            return Err(Error::Validation(format!(
                "fit range of '{}' must satisfy low < high, got [{}, {}]",
                self.hist_name, self.range.0, self.range.1
            )));
        }
        if !self.parameters.is_empty() && self.parameters.len() != total.n_parameters() {
            return Err(Error::Validation(format!(
                "fit spec of '{}' lists {} parameters, '{}' needs {}",
                self.hist_name,
                self.parameters.len(),
                total.formula(),
                total.n_parameters()
            )));
        }
        for (i, p) in self.parameters.iter().enumerate() {
            let (lo, hi) = p.bounds();
            if lo > hi {
                return Err(Error::Validation(format!(
                    "parameter {i} of '{}' has lower limit above upper limit",
                    self.hist_name
                )));
            }
        }
        Ok(())
    }

    /// Signal function.
    pub fn signal_function(&self) -> Result<CurveFunction> {
        CurveFunction::parse(&self.signal)
    }

    /// Background function.
    pub fn background_function(&self) -> Result<CurveFunction> {
        CurveFunction::parse(&self.background)
    }

    /// Signal followed by background.
    pub fn total_function(&self) -> Result<CurveFunction> {
        Ok(self.signal_function()?.concat(&self.background_function()?))
    }

    /// Store fitted values as the starting point of the next fit, keeping limits.
    pub fn update_parameters(&mut self, values: &[f64]) -> Result<()> {
        let n = self.total_function()?.n_parameters();
        if values.len() != n {
            return Err(Error::Validation(format!(
                "expected {n} values for '{}', got {}",
                self.hist_name,
                values.len()
            )));
        }
        if self.parameters.is_empty() {
            self.parameters = values.iter().map(|&v| FitParameter::free(v)).collect();
        } else {
            for (p, &v) in self.parameters.iter_mut().zip(values) {
                p.value = v;
            }
        }
        Ok(())
    }

    /// Starting parameters for `hist`: the listed ones or estimates from the
    /// contents within the fit range.
    pub fn initial_parameters(&self, hist: &Histogram) -> Result<Vec<FitParameter>> {
        if !self.parameters.is_empty() {
            return Ok(self.parameters.clone());
        }
        let (lo, hi) = self.range;
        let axis = hist.axis(0);
        let b_lo = axis.find_bin(lo).max(1);
        let b_hi = axis.find_bin(hi).min(axis.n_bins());

        let mut peak_x = 0.5 * (lo + hi);
        let mut peak_y = 0.0_f64;
        for b in b_lo..=b_hi {
            let y = hist.bin_content(hist.global_bin(b, 1, 1));
            if y > peak_y {
                peak_y = y;
                peak_x = axis.bin_center(b);
            }
        }
        let edge_lo = hist.bin_content(hist.global_bin(b_lo, 1, 1));
        let edge_hi = hist.bin_content(hist.global_bin(b_hi, 1, 1));
        let level = (0.5 * (edge_lo + edge_hi)).max(0.0);
        let width = hi - lo;

        let mut out = Vec::new();
        for term in self.total_function()?.terms() {
            match term {
                crate::FunctionKind::Gaus => {
                    out.push(FitParameter::bounded((peak_y - level).max(1e-3), 0.0, f64::INFINITY));
                    out.push(FitParameter::bounded(peak_x, lo, hi));
                    out.push(FitParameter::bounded(width / 10.0, width * 1e-3, width));
                }
                crate::FunctionKind::Pol(n) => {
                    out.push(FitParameter::free(level));
                    out.extend((0..*n).map(|_| FitParameter::free(0.0)));
                }
                crate::FunctionKind::Expo => {
                    out.push(FitParameter::free(level.max(1.0).ln()));
                    out.push(FitParameter::free(0.0));
                }
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spec_validation() {
        assert!(HistogramFitSpec::new("h", "gaus", "pol1", (-1.0, 1.0)).is_ok());
        assert!(HistogramFitSpec::new("h", "gaus", "pol1", (1.0, 1.0)).is_err());
        assert!(HistogramFitSpec::new("h", "landau", "pol1", (-1.0, 1.0)).is_err());

        let spec = HistogramFitSpec::new("h", "gaus", "pol0", (-1.0, 1.0)).unwrap();
        assert!(spec.clone().with_parameters(vec![FitParameter::free(1.0)]).is_err());
        let ok = spec.with_parameters(vec![
            FitParameter::free(10.0),
            FitParameter::bounded(0.0, -1.0, 1.0),
            FitParameter::bounded(0.2, 0.01, 1.0),
            FitParameter::fixed(2.0),
        ]);
        assert!(ok.is_ok());
    }

    #[test]
    fn fixed_parameter_bounds() {
        assert_eq!(FitParameter::fixed(2.5).bounds(), (2.5, 2.5));
        assert_eq!(FitParameter::free(0.0).bounds(), (f64::NEG_INFINITY, f64::INFINITY));
    }

    #[test]
    fn json_defaults() {
        let json = r#"{"hist_name":"h","signal":"gaus","background":"pol1","range":[-2.0,2.0]}"#;
        let spec: HistogramFitSpec = serde_json::from_str(json).unwrap();
        assert_eq!(spec.rebin, 0);
        assert!(!spec.fit_disabled);
        assert!(spec.parameters.is_empty());
    }

    #[test]
    fn estimated_parameters_follow_peak() {
        let mut h = Histogram::new_1d("h", "", 20, -5.0, 5.0).unwrap();
        for b in 1..=20 {
            let x = h.axis(0).bin_center(b);
            h.set_bin_content(b, 5.0 + 100.0 * (-0.5 * ((x - 1.0) / 0.5f64).powi(2)).exp());
        }
        let spec = HistogramFitSpec::new("h", "gaus", "pol0", (-5.0, 5.0)).unwrap();
        let p = spec.initial_parameters(&h).unwrap();
        assert_eq!(p.len(), 4);
        assert!((p[1].value - 1.0).abs() < 0.5);
        assert!(p[0].value > 80.0);
        assert!((p[3].value - 5.0).abs() < 1.0);
    }

    #[test]
    fn update_parameters_keeps_limits() {
        let mut spec = HistogramFitSpec::new("h", "gaus", "pol0", (-1.0, 1.0))
            .unwrap()
            .with_parameters(vec![
                FitParameter::free(1.0),
                FitParameter::bounded(0.0, -1.0, 1.0),
                FitParameter::free(0.1),
                FitParameter::free(0.0),
            ])
            .unwrap();
        spec.update_parameters(&[5.0, 0.3, 0.2, 1.0]).unwrap();
        assert_eq!(spec.parameters[1], FitParameter::bounded(0.3, -1.0, 1.0));
        assert!(spec.update_parameters(&[1.0]).is_err());
    }
}
