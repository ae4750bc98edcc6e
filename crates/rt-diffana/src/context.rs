//! Analysis contexts: dimensionality, naming and axes of a distribution.

use crate::axis::AxisSpec;
use crate::config;
use crate::variable::{Variable, VariableRef};
use rt_core::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::path::Path;

/// Dimensionality of a distribution.
///
/// `Dim0` fills a 1D histogram on `x` without differential axes.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum Dimensions {
    /// Not configured
    #[default]
    NoInit,
    /// Plain distribution of `x`
    Dim0,
    /// Differential in `x`
    Dim1,
    /// Differential in `x`, `y`
    Dim2,
    /// Differential in `x`, `y`, `z`
    Dim3,
}

impl Dimensions {
    /// Number of axes read when filling.
    pub fn filled_axes(self) -> usize {
        match self {
            Dimensions::NoInit => 0,
            Dimensions::Dim0 | Dimensions::Dim1 => 1,
            Dimensions::Dim2 => 2,
            Dimensions::Dim3 => 3,
        }
    }

    /// Number of differential axes.
    pub fn differential_axes(self) -> usize {
        match self {
            Dimensions::NoInit | Dimensions::Dim0 => 0,
            Dimensions::Dim1 => 1,
            Dimensions::Dim2 => 2,
            Dimensions::Dim3 => 3,
        }
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Dimensions::NoInit => "NoInit",
            Dimensions::Dim0 => "Dim0",
            Dimensions::Dim1 => "Dim1",
            Dimensions::Dim2 => "Dim2",
            Dimensions::Dim3 => "Dim3",
        };
        f.write_str(s)
    }
}

const AXIS_KEYS: [&str; 3] = ["x", "y", "z"];

/// Axes, names and display strings of one distribution.
#[derive(Debug, Clone, Default)]
pub struct DistributionContext {
    /// Dimensionality
    pub dim: Dimensions,
    /// Analysis name
    pub name: String,
    /// Directory of the persisted objects (defaults to `hist_name`)
    pub dir_name: String,
    /// Base name of the histograms (defaults to `name`)
    pub hist_name: String,
    /// Name of the differentiated quantity (`N` in `d^{2}N/dxdy`)
    pub diff_var_name: String,
    /// Histogram title
    pub title: String,
    /// Derived differential label
    pub label: String,
    /// Derived differential unit
    pub unit: String,
    /// Derived `label [unit]`
    pub axis_text: String,
    /// First axis
    pub x: AxisSpec,
    /// Second axis
    pub y: AxisSpec,
    /// Third axis
    pub z: AxisSpec,
    /// Fill weight; unit weight when unbound
    pub weight: Option<VariableRef>,
    object_name: String,
}

impl DistributionContext {
    /// Context named `name` with dimensionality `dim` and empty axes.
    pub fn new(name: impl Into<String>, dim: Dimensions) -> Self {
        Self { name: name.into(), dim, ..Default::default() }
    }

    /// Bind the fill weight.
    pub fn bind_weight(&mut self, var: &Variable) {
        self.weight = Some(var.bind());
    }

    /// Name of the context object (`name` with a `Ctx` suffix), set by [`update`](Self::update).
    pub fn object_name(&self) -> &str {
        &self.object_name
    }

    /// Fill in defaulted names and the derived differential strings.
    pub fn update(&mut self) {
        if self.hist_name.is_empty() {
            self.hist_name = self.name.clone();
        }
        if self.dir_name.is_empty() {
            self.dir_name = self.hist_name.clone();
        }
        self.object_name = if self.name.ends_with("Ctx") {
            self.name.clone()
        } else {
            format!("{}Ctx", self.name)
        };
        self.format_diff_axis();
    }

    /// Axes read when filling, with their keys.
    pub fn active_axes(&self) -> Vec<(&'static str, &AxisSpec)> {
        [&self.x, &self.y, &self.z]
            .into_iter()
            .enumerate()
            .take(self.dim.filled_axes())
            .map(|(i, a)| (AXIS_KEYS[i], a))
            .collect()
    }

    /// Check the context before histograms are allocated.
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(Error::Config("context has no name".into()));
        }
        if self.dim == Dimensions::NoInit {
            return Err(Error::Config(format!("no dimension specified for '{}'", self.name)));
        }
        for (key, axis) in self.active_axes() {
            if !axis.is_valid() {
                return Err(Error::Config(format!(
                    "axis {key} of '{}' needs bins > 0 and max > min (bins={}, range=[{}, {}])",
                    self.name, axis.bins, axis.min, axis.max
                )));
            }
            if axis.var.is_none() {
                return Err(Error::Config(format!(
                    "axis {key} of '{}' has no bound variable",
                    self.name
                )));
            }
        }
        Ok(())
    }

    /// Current values of the active axis variables.
    pub fn coordinates(&self) -> Result<Vec<f64>> {
        self.active_axes()
            .into_iter()
            .map(|(key, axis)| {
                axis.value().ok_or_else(|| {
                    Error::Config(format!("variable of axis {key} of '{}' is not alive", self.name))
                })
            })
            .collect()
    }

    /// Current fill weight (1 without a weight binding).
    pub fn weight_value(&self) -> Result<f64> {
        match &self.weight {
            None => Ok(1.0),
            Some(w) => w.get().ok_or_else(|| {
                Error::Config(format!("weight variable of '{}' is not alive", self.name))
            }),
        }
    }

    /// Derive `label`, `unit` and `axis_text` (`d^{2}N/dxdy [1/...]`).
    pub fn format_diff_axis(&mut self) {
        let n = self.dim.differential_axes();
        let mut label = match n {
            0 => self.diff_var_name.clone(),
            1 => format!("d{}/", self.diff_var_name),
            _ => format!("d^{{{n}}}{}/", self.diff_var_name),
        };
        let axes = [&self.x, &self.y, &self.z];
        let units: String = axes.iter().take(n).map(|a| a.unit.as_str()).collect();
        for a in axes.iter().take(n) {
            label.push('d');
            label.push_str(&a.label);
        }

        self.unit = if units.is_empty() { String::new() } else { format!("1/{units}") };
        self.axis_text =
            if self.unit.is_empty() { label.clone() } else { format!("{label} [{}]", self.unit) };
        self.label = label;
    }

    /// Histogram title spec with axis titles for the dimensionality.
    pub fn format_hist_axes(&self, title: &str) -> String {
        match self.dim {
            Dimensions::Dim3 => format!(
                "{title};{};{};{}",
                self.x.format_string(),
                self.y.format_string(),
                self.z.format_string()
            ),
            Dimensions::Dim2 => {
                format!("{title};{};{}", self.x.format_string(), self.y.format_string())
            }
            Dimensions::Dim1 | Dimensions::Dim0 => {
                format!("{title};{};Counts [aux]", self.x.format_string())
            }
            Dimensions::NoInit => format!("{title};;"),
        }
    }

    /// Same dimensionality and bin counts; mismatches are logged.
    pub fn is_compatible(&self, other: &DistributionContext) -> bool {
        if self.dim != other.dim {
            log::warn!("Not the same dimensions: {} vs {}", self.dim, other.dim);
            return false;
        }
        for (key, a, b) in [("x", &self.x, &other.x), ("y", &self.y, &other.y), ("z", &self.z, &other.z)]
        {
            if a.bins != b.bins {
                log::warn!("Different number of {key} bins: {} vs {}", a.bins, b.bins);
                return false;
            }
        }
        true
    }

    /// Override axes `x`, `y`, `z` from the entry `name` of a JSON file.
    /// Returns `Ok(false)` when the file has no such entry.
    pub fn configure_from_json(&mut self, path: impl AsRef<Path>, name: &str) -> Result<bool> {
        config::configure_axes(
            path.as_ref(),
            name,
            &AXIS_KEYS,
            &mut [&mut self.x, &mut self.y, &mut self.z],
        )
    }

    /// JSON skeleton accepted by [`configure_from_json`](Self::configure_from_json).
    pub fn config_template(name: &str) -> Value {
        config::template(name, "d^{2}N/dp_{t}dy_{cm}", &AXIS_KEYS)
    }
}

impl fmt::Display for DistributionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Context: {}   Dimensions: {}", self.name, self.dim)?;
        writeln!(
            f,
            " Name: {}   Hist name: {}   Dir Name: {}",
            self.name, self.hist_name, self.dir_name
        )?;
        writeln!(f, " Var name: {}", self.diff_var_name)?;
        writeln!(f, "{}", self.x)?;
        writeln!(f, "{}", self.y)?;
        write!(f, "{}", self.z)
    }
}

const DIFF_AXIS_KEYS: [&str; 3] = ["x", "y", "V"];

/// Distribution context with an extra axis `V` sliced per outer bin.
#[derive(Debug, Clone, Default)]
pub struct DifferentialContext {
    /// Outer distribution
    pub base: DistributionContext,
    /// Extra axis
    pub v: AxisSpec,
}

impl DifferentialContext {
    /// Context named `name` with dimensionality `dim` and empty axes.
    pub fn new(name: impl Into<String>, dim: Dimensions) -> Self {
        Self { base: DistributionContext::new(name, dim), v: AxisSpec::default() }
    }

    /// `true` when slices of `V` are kept per outer bin.
    pub fn has_extra_dimension(&self) -> bool {
        self.base.dim > Dimensions::Dim0
    }

    /// See [`DistributionContext::update`].
    pub fn update(&mut self) {
        self.base.update();
    }

    /// Check the outer context and, with an extra dimension, the `V` axis.
    pub fn validate(&self) -> Result<()> {
        self.base.validate()?;
        if self.has_extra_dimension() {
            if !self.v.is_valid() {
                return Err(Error::Config(format!(
                    "axis V of '{}' needs bins > 0 and max > min",
                    self.base.name
                )));
            }
            if self.v.var.is_none() {
                return Err(Error::Config(format!(
                    "axis V of '{}' has no bound variable",
                    self.base.name
                )));
            }
        }
        Ok(())
    }

    /// Current value of the `V` variable.
    pub fn extra_value(&self) -> Result<f64> {
        self.v.value().ok_or_else(|| {
            Error::Config(format!("variable of axis V of '{}' is not alive", self.base.name))
        })
    }

    /// Outer compatibility plus the same number of `V` bins.
    pub fn is_compatible(&self, other: &DifferentialContext) -> bool {
        if !self.base.is_compatible(&other.base) {
            return false;
        }
        if self.v.bins != other.v.bins {
            log::warn!("Different number of V bins: {} vs {}", self.v.bins, other.v.bins);
            return false;
        }
        true
    }

    /// Override axes `x`, `y`, `V` from the entry `name` of a JSON file.
    pub fn configure_from_json(&mut self, path: impl AsRef<Path>, name: &str) -> Result<bool> {
        config::configure_axes(
            path.as_ref(),
            name,
            &DIFF_AXIS_KEYS,
            &mut [&mut self.base.x, &mut self.base.y, &mut self.v],
        )
    }

    /// JSON skeleton accepted by [`configure_from_json`](Self::configure_from_json).
    pub fn config_template(name: &str) -> Value {
        config::template(name, "d^{2}N/dp_{t}dy_{cm}", &DIFF_AXIS_KEYS)
    }
}

impl fmt::Display for DifferentialContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.base)?;
        writeln!(f, "{}", self.v)?;
        write!(f, " label: {}  unit: {}", self.base.label, self.base.unit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx_2d() -> DistributionContext {
        let mut ctx = DistributionContext::new("Lambda", Dimensions::Dim2);
        ctx.diff_var_name = "N".into();
        ctx.x = AxisSpec::new("y_{cm}", "", 10, -1.0, 1.0);
        ctx.y = AxisSpec::new("p_{t}", "MeV/c", 8, 0.0, 800.0);
        ctx
    }

    #[test]
    fn update_defaults_names() {
        let mut ctx = ctx_2d();
        ctx.update();
        assert_eq!(ctx.hist_name, "Lambda");
        assert_eq!(ctx.dir_name, "Lambda");
        assert_eq!(ctx.object_name(), "LambdaCtx");

        let mut named = DistributionContext::new("LambdaCtx", Dimensions::Dim1);
        named.hist_name = "hl".into();
        named.update();
        assert_eq!(named.object_name(), "LambdaCtx");
        assert_eq!(named.dir_name, "hl");
    }

    #[test]
    fn differential_axis_strings() {
        let mut ctx = ctx_2d();
        ctx.update();
        assert_eq!(ctx.label, "d^{2}N/dy_{cm}dp_{t}");
        assert_eq!(ctx.unit, "1/MeV/c");
        assert_eq!(ctx.axis_text, "d^{2}N/dy_{cm}dp_{t} [1/MeV/c]");

        let mut one = DistributionContext::new("a", Dimensions::Dim1);
        one.diff_var_name = "N".into();
        one.x = AxisSpec::new("x", "", 4, 0.0, 4.0);
        one.update();
        assert_eq!(one.label, "dN/dx");
        assert_eq!(one.axis_text, "dN/dx");
    }

    #[test]
    fn hist_axes_format() {
        let ctx = ctx_2d();
        assert_eq!(ctx.format_hist_axes("t"), "t;y_{cm};p_{t} [MeV/c]");
        let mut one = ctx.clone();
        one.dim = Dimensions::Dim1;
        assert_eq!(one.format_hist_axes("t"), "t;y_{cm};Counts [aux]");
    }

    #[test]
    fn validation_rules() {
        let vx = Variable::new(0.0);
        let vy = Variable::new(0.0);
        let mut ctx = ctx_2d();
        assert!(matches!(ctx.validate(), Err(Error::Config(_))));
        ctx.x.bind(&vx);
        assert!(ctx.validate().is_err());
        ctx.y.bind(&vy);
        assert!(ctx.validate().is_ok());

        ctx.y.bins = 0;
        assert!(ctx.validate().is_err());

        let mut unnamed = ctx_2d();
        unnamed.name.clear();
        assert!(unnamed.validate().is_err());
        assert!(DistributionContext::new("a", Dimensions::NoInit).validate().is_err());
    }

    #[test]
    fn live_coordinates_and_weight() {
        let vx = Variable::new(0.25);
        let vy = Variable::new(100.0);
        let w = Variable::new(2.0);
        let mut ctx = ctx_2d();
        ctx.x.bind(&vx);
        ctx.y.bind(&vy);
        assert_eq!(ctx.weight_value().unwrap(), 1.0);
        ctx.bind_weight(&w);
        vx.set(0.5);
        assert_eq!(ctx.coordinates().unwrap(), vec![0.5, 100.0]);
        assert_eq!(ctx.weight_value().unwrap(), 2.0);
    }

    #[test]
    fn compatibility() {
        let a = ctx_2d();
        let mut b = ctx_2d();
        assert!(a.is_compatible(&b));
        b.y.bins = 9;
        assert!(!a.is_compatible(&b));
        b.dim = Dimensions::Dim3;
        assert!(!a.is_compatible(&b));
    }

    #[test]
    fn differential_context_needs_v() {
        let vx = Variable::new(0.0);
        let vv = Variable::new(0.0);
        let mut ctx = DifferentialContext::new("d", Dimensions::Dim1);
        ctx.base.x = AxisSpec::new("x", "", 4, 0.0, 4.0).with_var(&vx);
        assert!(ctx.validate().is_err());
        ctx.v = AxisSpec::new("M", "MeV", 10, -5.0, 5.0).with_var(&vv);
        assert!(ctx.validate().is_ok());
        assert!(ctx.has_extra_dimension());

        let mut plain = DifferentialContext::new("p", Dimensions::Dim0);
        plain.base.x = AxisSpec::new("x", "", 4, 0.0, 4.0).with_var(&vx);
        assert!(plain.validate().is_ok());
        assert!(!plain.has_extra_dimension());
    }

    #[test]
    fn display_dump() {
        let mut ctx = ctx_2d();
        ctx.update();
        let s = ctx.to_string();
        assert!(s.starts_with("Context: Lambda   Dimensions: Dim2"));
        assert!(s.contains(" Axis: 8 bins in [ 0; 800 ] range -- p_{t} [MeV/c]"));
    }
}
