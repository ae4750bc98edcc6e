//! Binned axis with native under/overflow indexing.
//!
//! Bin indices are 1-based: index `0` is the underflow bin and `n_bins + 1`
//! the overflow bin. Bins are half-open `[low, high)`, except the last bin
//! which also contains its upper edge.

use rt_core::{Error, Result};
use serde::{Deserialize, Serialize};

/// One binned axis, uniform or with explicit edges.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Axis {
    n_bins: usize,
    min: f64,
    max: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    edges: Option<Vec<f64>>,
    #[serde(default)]
    title: String,
}

impl Axis {
    /// Uniform axis with `n_bins` bins on `[min, max]`.
    pub fn uniform(n_bins: usize, min: f64, max: f64) -> Result<Self> {
        if n_bins == 0 {
            return Err(Error::Validation("axis must have at least one bin".into()));
        }
        if !(min.is_finite() && max.is_finite()) || max <= min {
            return Err(Error::Validation(format!(
                "invalid axis range: expected min < max, got [{min}, {max}]"
            )));
        }
        Ok(Self { n_bins, min, max, edges: None, title: String::new() })
    }

    /// Axis with explicit bin edges (sorted, length = n_bins + 1).
    pub fn variable(edges: Vec<f64>) -> Result<Self> {
        if edges.len() < 2 {
            return Err(Error::Validation(format!(
                "variable axis needs at least two edges, got {}",
                edges.len()
            )));
        }
        if edges.iter().any(|e| !e.is_finite()) || edges.windows(2).any(|w| w[1] <= w[0]) {
            return Err(Error::Validation("bin edges must be finite and strictly increasing".into()));
        }
        let n_bins = edges.len() - 1;
        let min = edges[0];
        let max = edges[n_bins];
        Ok(Self { n_bins, min, max, edges: Some(edges), title: String::new() })
    }

    /// Single-bin placeholder used for the unused axes of lower-dimensional histograms.
    pub fn degenerate() -> Self {
        Self { n_bins: 1, min: 0.0, max: 1.0, edges: None, title: String::new() }
    }

    /// Number of bins (excluding under/overflow).
    pub fn n_bins(&self) -> usize {
        self.n_bins
    }

    /// Lower edge of the first bin.
    pub fn min(&self) -> f64 {
        self.min
    }

    /// Upper edge of the last bin.
    pub fn max(&self) -> f64 {
        self.max
    }

    /// `true` when all bins have the same width.
    pub fn is_uniform(&self) -> bool {
        self.edges.is_none()
    }

    /// Axis title.
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Set the axis title.
    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
    }

    /// Native bin index for `x` (0 = underflow, `n_bins + 1` = overflow).
    pub fn find_bin(&self, x: f64) -> usize {
        if x.is_nan() || x > self.max {
            return self.n_bins + 1;
        }
        if x < self.min {
            return 0;
        }
        if x == self.max {
            return self.n_bins;
        }
        match &self.edges {
            None => {
                let width = (self.max - self.min) / self.n_bins as f64;
                let b = ((x - self.min) / width) as usize + 1;
                b.min(self.n_bins)
            }
            Some(edges) => match edges.binary_search_by(|e| e.total_cmp(&x)) {
                Ok(i) => i + 1,
                Err(i) => i,
            },
        }
    }

    /// Lower edge of bin `bin` (1-based).
    pub fn bin_low_edge(&self, bin: usize) -> f64 {
        match &self.edges {
            None => self.min + (bin as f64 - 1.0) * self.uniform_width(),
            Some(edges) => {
                let i = bin.clamp(1, self.n_bins + 1) - 1;
                edges[i]
            }
        }
    }

    /// Upper edge of bin `bin` (1-based).
    pub fn bin_up_edge(&self, bin: usize) -> f64 {
        self.bin_low_edge(bin + 1)
    }

    /// Width of bin `bin` (1-based).
    pub fn bin_width(&self, bin: usize) -> f64 {
        match &self.edges {
            None => self.uniform_width(),
            Some(_) => self.bin_up_edge(bin) - self.bin_low_edge(bin),
        }
    }

    /// Center of bin `bin` (1-based).
    pub fn bin_center(&self, bin: usize) -> f64 {
        0.5 * (self.bin_low_edge(bin) + self.bin_up_edge(bin))
    }

    /// All bin edges (length = n_bins + 1).
    pub fn edges(&self) -> Vec<f64> {
        match &self.edges {
            Some(e) => e.clone(),
            None => (0..=self.n_bins).map(|i| self.bin_low_edge(i + 1)).collect(),
        }
    }

    /// Axis obtained by merging `ngroup` consecutive bins.
    ///
    /// Bins that do not fill a complete group are dropped from the range.
    pub(crate) fn rebinned(&self, ngroup: usize) -> Result<Self> {
        if ngroup == 0 || ngroup > self.n_bins {
            return Err(Error::Validation(format!(
                "invalid rebin factor {ngroup} for axis with {} bins",
                self.n_bins
            )));
        }
        let new_n = self.n_bins / ngroup;
        let mut axis = match &self.edges {
            None => {
                let max = self.min + (new_n * ngroup) as f64 * self.uniform_width();
                Self::uniform(new_n, self.min, max)?
            }
            Some(edges) => Self::variable(edges.iter().step_by(ngroup).copied().collect())?,
        };
        axis.title = self.title.clone();
        Ok(axis)
    }

    fn uniform_width(&self) -> f64 {
        (self.max - self.min) / self.n_bins as f64
    }
}
