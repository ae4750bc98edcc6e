//! Named fit functions and `+`-composed formulas.
//!
//! Supported terms:
//! - `gaus`: `c * exp(-0.5 * ((x - mean) / sigma)^2)`
//! - `polN` (`N` in `0..=9`): `p0 + p1 x + ... + pN x^N`
//! - `expo`: `exp(p0 + p1 x)`

use rt_core::{CurveModel, Error, Result};
use rt_hist::FitCurve;
use statrs::function::erf::erf;
use std::fmt;
use std::str::FromStr;

/// A single named function term.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionKind {
    /// Gaussian peak (constant, mean, sigma).
    Gaus,
    /// Polynomial of the given degree.
    Pol(u8),
    /// Exponential of a straight line.
    Expo,
}

impl FunctionKind {
    /// Number of parameters of the term.
    pub fn n_parameters(self) -> usize {
        match self {
            FunctionKind::Gaus => 3,
            FunctionKind::Pol(n) => n as usize + 1,
            FunctionKind::Expo => 2,
        }
    }

    fn parameter_names(self) -> Vec<String> {
        match self {
            FunctionKind::Gaus => vec!["constant".into(), "mean".into(), "sigma".into()],
            FunctionKind::Pol(n) => (0..=n).map(|k| format!("p{k}")).collect(),
            FunctionKind::Expo => vec!["constant".into(), "slope".into()],
        }
    }

    fn eval(self, x: f64, p: &[f64]) -> f64 {
        match self {
            FunctionKind::Gaus => {
                if p[2] == 0.0 {
                    return 0.0;
                }
                let t = (x - p[1]) / p[2];
                p[0] * (-0.5 * t * t).exp()
            }
            // Horner
            FunctionKind::Pol(_) => p.iter().rev().fold(0.0, |acc, &c| acc * x + c),
            FunctionKind::Expo => (p[0] + p[1] * x).exp(),
        }
    }

    fn integral(self, lo: f64, hi: f64, p: &[f64]) -> f64 {
        match self {
            FunctionKind::Gaus => {
                let sigma = p[2].abs();
                if sigma == 0.0 {
                    return 0.0;
                }
                let s = sigma * std::f64::consts::SQRT_2;
                p[0] * sigma
                    * (std::f64::consts::PI / 2.0).sqrt()
                    * (erf((hi - p[1]) / s) - erf((lo - p[1]) / s))
            }
            FunctionKind::Pol(_) => p
                .iter()
                .enumerate()
                .map(|(k, &c)| {
                    let e = k as i32 + 1;
                    c * (hi.powi(e) - lo.powi(e)) / e as f64
                })
                .sum(),
            FunctionKind::Expo => {
                if p[1].abs() < 1e-12 {
                    p[0].exp() * (hi - lo)
                } else {
                    ((p[0] + p[1] * hi).exp() - (p[0] + p[1] * lo).exp()) / p[1]
                }
            }
        }
    }
}

impl FromStr for FunctionKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        match s {
            "gaus" | "gaussian" => Ok(FunctionKind::Gaus),
            "expo" => Ok(FunctionKind::Expo),
            _ => {
                if let Some(deg) = s.strip_prefix("pol")
                    && let Ok(n) = deg.parse::<u8>()
                    && n <= 9
                {
                    return Ok(FunctionKind::Pol(n));
                }
                Err(Error::Validation(format!("unknown fit function '{s}'")))
            }
        }
    }
}

impl fmt::Display for FunctionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FunctionKind::Gaus => f.write_str("gaus"),
            FunctionKind::Pol(n) => write!(f, "pol{n}"),
            FunctionKind::Expo => f.write_str("expo"),
        }
    }
}

/// Sum of function terms with concatenated parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurveFunction {
    terms: Vec<FunctionKind>,
}

impl CurveFunction {
    /// Parse a formula such as `"gaus+pol1"`.
    pub fn parse(formula: &str) -> Result<Self> {
        let terms = formula
            .split('+')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::parse)
            .collect::<Result<Vec<FunctionKind>>>()?;
        if terms.is_empty() {
            return Err(Error::Validation(format!("empty fit formula '{formula}'")));
        }
        Ok(Self { terms })
    }

    /// Function built from the formula of an attached curve.
    pub fn from_curve(curve: &FitCurve) -> Result<Self> {
        let f = Self::parse(&curve.formula)?;
        if f.n_parameters() != curve.parameters.len() {
            return Err(Error::Validation(format!(
                "curve '{}' has {} parameters, formula '{}' needs {}",
                curve.name,
                curve.parameters.len(),
                curve.formula,
                f.n_parameters()
            )));
        }
        Ok(f)
    }

    /// Concatenation of two functions (`self` terms first).
    pub fn concat(&self, other: &CurveFunction) -> Self {
        let mut terms = self.terms.clone();
        terms.extend_from_slice(&other.terms);
        Self { terms }
    }

    /// Terms in parameter order.
    pub fn terms(&self) -> &[FunctionKind] {
        &self.terms
    }

    /// Formula string (`"gaus+pol1"`).
    pub fn formula(&self) -> String {
        self.terms.iter().map(ToString::to_string).collect::<Vec<_>>().join("+")
    }

    fn split_params<'a>(&self, params: &'a [f64]) -> impl Iterator<Item = (FunctionKind, &'a [f64])> {
        let mut offset = 0;
        self.terms.clone().into_iter().map(move |t| {
            let n = t.n_parameters();
            let p = &params[offset..offset + n];
            offset += n;
            (t, p)
        })
    }
}

impl CurveModel for CurveFunction {
    fn n_parameters(&self) -> usize {
        self.terms.iter().map(|t| t.n_parameters()).sum()
    }

    fn parameter_names(&self) -> Vec<String> {
        let multi = self.terms.len() > 1;
        self.terms
            .iter()
            .enumerate()
            .flat_map(|(i, t)| {
                t.parameter_names().into_iter().map(move |n| if multi { format!("{n}_{i}") } else { n })
            })
            .collect()
    }

    fn eval(&self, x: f64, params: &[f64]) -> f64 {
        self.split_params(params).map(|(t, p)| t.eval(x, p)).sum()
    }

    fn integral(&self, lo: f64, hi: f64, params: &[f64]) -> f64 {
        if hi <= lo {
            return 0.0;
        }
        self.split_params(params).map(|(t, p)| t.integral(lo, hi, p)).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn parse_formulas() {
        let f = CurveFunction::parse("gaus + pol1").unwrap();
        assert_eq!(f.terms(), &[FunctionKind::Gaus, FunctionKind::Pol(1)]);
        assert_eq!(f.n_parameters(), 5);
        assert_eq!(f.formula(), "gaus+pol1");
        assert!(CurveFunction::parse("").is_err());
        assert!(CurveFunction::parse("landau").is_err());
        assert!(CurveFunction::parse("pol12").is_err());
    }

    #[test]
    fn polynomial_eval_and_integral() {
        let f = CurveFunction::parse("pol2").unwrap();
        let p = [1.0, 2.0, 3.0];
        assert_relative_eq!(f.eval(2.0, &p), 1.0 + 4.0 + 12.0);
        // x + x^2 + x^3 on [0, 1]
        assert_relative_eq!(f.integral(0.0, 1.0, &p), 3.0, epsilon = 1e-12);
    }

    #[test]
    fn gaussian_integral_matches_normalization() {
        let f = CurveFunction::parse("gaus").unwrap();
        let p = [10.0, 0.5, 0.25];
        let full = f.integral(-10.0, 10.0, &p);
        assert_relative_eq!(full, 10.0 * 0.25 * (2.0 * std::f64::consts::PI).sqrt(), epsilon = 1e-9);
        // Analytic and numeric integrals agree on a partial range.
        let numeric = rt_core::CurveModel::integral(&NumericOnly(f.clone()), 0.2, 0.9, &p);
        assert_relative_eq!(f.integral(0.2, 0.9, &p), numeric, epsilon = 1e-6);
    }

    #[test]
    fn exponential_integral() {
        let f = CurveFunction::parse("expo").unwrap();
        assert_relative_eq!(f.integral(0.0, 1.0, &[0.0, 1.0]), std::f64::consts::E - 1.0, epsilon = 1e-12);
        assert_relative_eq!(f.integral(0.0, 2.0, &[1.0, 0.0]), 2.0 * std::f64::consts::E, epsilon = 1e-12);
    }

    #[test]
    fn parameter_names_are_suffixed_for_sums() {
        let f = CurveFunction::parse("gaus+pol0").unwrap();
        assert_eq!(f.parameter_names(), vec!["constant_0", "mean_0", "sigma_0", "p0_1"]);
    }

    // Uses the default (Simpson) integral of the trait.
    struct NumericOnly(CurveFunction);

    impl CurveModel for NumericOnly {
        fn n_parameters(&self) -> usize {
            self.0.n_parameters()
        }
        fn parameter_names(&self) -> Vec<String> {
            self.0.parameter_names()
        }
        fn eval(&self, x: f64, params: &[f64]) -> f64 {
            self.0.eval(x, params)
        }
    }
}
