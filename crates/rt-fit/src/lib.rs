//! # rt-fit
//!
//! Curve fitting for roottools histograms.
//!
//! - [`ChiSquareFitter`]: bounded L-BFGS chi-square fit of signal + background
//!   formulas, attaching total, signal and background curves
//! - [`FitRegistry`]: per-histogram [`HistogramFitSpec`]s, loaded from JSON
//! - [`AngularDistribution`]: Legendre `P0 + a2 P2 + a4 P4` reweighting
//! - [`fit_signal_yield`] / [`integral_yield`]: yields for aggregation

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod angular;
pub mod fitter;
pub mod function;
pub mod registry;
pub mod spec;
pub mod yields;

pub use angular::{AngularDistribution, apply_angular_distribution, legendre};
pub use fitter::{ChiSquareFitter, CurveFitter, fit_probability};
pub use function::{CurveFunction, FunctionKind};
pub use registry::FitRegistry;
pub use spec::{FitParameter, HistogramFitSpec};
pub use yields::{SignalYield, fit_signal_yield, integral_yield};
