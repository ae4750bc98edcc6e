//! Axis description used by contexts.

use crate::variable::{Variable, VariableRef};
use rt_core::{Error, Result};
use rt_hist::Axis;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One binned axis of a context: label, unit, binning and the variable it is
/// filled from.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AxisSpec {
    /// Axis label
    #[serde(default)]
    pub label: String,
    /// Axis unit
    #[serde(default)]
    pub unit: String,
    /// Number of bins
    #[serde(default)]
    pub bins: usize,
    /// Lower edge
    #[serde(default)]
    pub min: f64,
    /// Upper edge
    #[serde(default)]
    pub max: f64,
    /// Explicit bin edges, overriding the uniform binning
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bin_edges: Option<Vec<f64>>,
    /// Variable the axis is filled from
    #[serde(skip)]
    pub var: Option<VariableRef>,
}

impl AxisSpec {
    /// Uniform axis without a bound variable.
    pub fn new(label: &str, unit: &str, bins: usize, min: f64, max: f64) -> Self {
        Self { label: label.into(), unit: unit.into(), bins, min, max, ..Default::default() }
    }

    /// Same axis bound to `var`.
    pub fn with_var(mut self, var: &Variable) -> Self {
        self.var = Some(var.bind());
        self
    }

    /// Bind the axis to `var`.
    pub fn bind(&mut self, var: &Variable) {
        self.var = Some(var.bind());
    }

    /// Width of a uniform bin, `(max - min) / bins` (0 without bins).
    pub fn bin_width(&self) -> f64 {
        if self.bins == 0 { 0.0 } else { (self.max - self.min) / self.bins as f64 }
    }

    /// `true` for at least one bin over a non-empty range.
    pub fn is_valid(&self) -> bool {
        self.bins > 0 && self.max > self.min
    }

    /// Current value of the bound variable.
    pub fn value(&self) -> Option<f64> {
        self.var.as_ref().and_then(VariableRef::get)
    }

    /// `" [unit]"`, or an empty string without unit.
    pub fn format_unit(&self) -> String {
        format_unit(&self.unit)
    }

    /// Label followed by the formatted unit.
    pub fn format_string(&self) -> String {
        format!("{}{}", self.label, self.format_unit())
    }

    /// Histogram title spec `"title;label [unit];ylabel"`.
    pub fn format_hist_string(&self, title: &str, ylabel: &str) -> String {
        format!("{title};{};{ylabel}", self.format_string())
    }

    /// Histogram axis with this binning, titled with [`format_string`](Self::format_string).
    pub fn to_hist_axis(&self) -> Result<Axis> {
        let mut axis = match &self.bin_edges {
            Some(edges) => Axis::variable(edges.clone())?,
            None => Axis::uniform(self.bins, self.min, self.max)
                .map_err(|e| Error::Config(format!("axis '{}': {e}", self.label)))?,
        };
        axis.set_title(self.format_string());
        Ok(axis)
    }
}

/// `" [unit]"`, or an empty string for an empty unit.
pub fn format_unit(unit: &str) -> String {
    if unit.is_empty() { String::new() } else { format!(" [{unit}]") }
}

impl fmt::Display for AxisSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.bin_edges {
            None => write!(
                f,
                " Axis: {} bins in [ {}; {} ] range -- {}",
                self.bins,
                self.min,
                self.max,
                self.format_string()
            ),
            Some(edges) => {
                let parts: Vec<String> = edges.iter().map(|e| format!("| {e} ")).collect();
                write!(f, " Axis: {} in {}| -- {}", self.bins, parts.concat(), self.format_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derived_width_and_strings() {
        let a = AxisSpec::new("p_{t}", "MeV/c", 10, 0.0, 1000.0);
        assert_eq!(a.bin_width(), 100.0);
        assert_eq!(a.format_unit(), " [MeV/c]");
        assert_eq!(a.format_string(), "p_{t} [MeV/c]");
        assert_eq!(a.format_hist_string("h", "Counts"), "h;p_{t} [MeV/c];Counts");

        let b = AxisSpec::new("y", "", 4, -1.0, 1.0);
        assert_eq!(b.format_string(), "y");
        assert_eq!(AxisSpec::default().bin_width(), 0.0);
    }

    #[test]
    fn width_follows_binning_changes() {
        let mut a = AxisSpec::new("x", "", 4, 0.0, 4.0);
        a.bins = 8;
        assert_eq!(a.bin_width(), 0.5);
        a.max = 8.0;
        assert_eq!(a.bin_width(), 1.0);
    }

    #[test]
    fn hist_axis_conversion() {
        let a = AxisSpec::new("M", "MeV", 10, -5.0, 5.0);
        let axis = a.to_hist_axis().unwrap();
        assert_eq!(axis.n_bins(), 10);
        assert_eq!(axis.title(), "M [MeV]");
        assert!(AxisSpec::new("x", "", 0, 0.0, 1.0).to_hist_axis().is_err());
    }

    #[test]
    fn bound_value() {
        let v = Variable::new(3.0);
        let a = AxisSpec::new("x", "", 4, 0.0, 4.0).with_var(&v);
        assert_eq!(a.value(), Some(3.0));
        assert_eq!(AxisSpec::default().value(), None);
    }
}
