//! Fit-parameter registry: histogram name to fit specification.
//!
//! The on-disk form is a JSON object with a `fits` array:
//!
//! ```json
//! { "fits": [ { "hist_name": "h_a_X00", "signal": "gaus", "background": "pol1", "range": [-2.0, 2.0] } ] }
//! ```

use crate::spec::HistogramFitSpec;
use rt_core::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Serialize, Deserialize)]
struct RegistryFile {
    fits: Vec<HistogramFitSpec>,
}

/// Collection of fit specifications keyed by histogram name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FitRegistry {
    specs: BTreeMap<String, HistogramFitSpec>,
}

impl FitRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Spec registered for `hist_name`.
    pub fn find(&self, hist_name: &str) -> Option<&HistogramFitSpec> {
        self.specs.get(hist_name)
    }

    /// Mutable spec registered for `hist_name`.
    pub fn find_mut(&mut self, hist_name: &str) -> Option<&mut HistogramFitSpec> {
        self.specs.get_mut(hist_name)
    }

    /// Register a spec, returning the one it replaces.
    pub fn insert(&mut self, spec: HistogramFitSpec) -> Option<HistogramFitSpec> {
        self.specs.insert(spec.hist_name.clone(), spec)
    }

    /// Remove the spec of `hist_name`.
    pub fn remove(&mut self, hist_name: &str) -> Option<HistogramFitSpec> {
        self.specs.remove(hist_name)
    }

    /// Number of registered specs.
    pub fn len(&self) -> usize {
        self.specs.len()
    }

    /// `true` when nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    /// Specs in name order.
    pub fn iter(&self) -> impl Iterator<Item = &HistogramFitSpec> {
        self.specs.values()
    }

    /// Parse a registry from JSON text. Every spec is validated.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let file: RegistryFile = serde_json::from_str(json)?;
        let mut reg = Self::new();
        for spec in file.fits {
            spec.validate()?;
            if reg.insert(spec).is_some() {
                log::warn!("Duplicate fit spec in registry, keeping the last one");
            }
        }
        Ok(reg)
    }

    /// Load a registry from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let reg = Self::from_json_str(&text)?;
        log::info!("Loaded {} fit specs from {}", reg.len(), path.as_ref().display());
        Ok(reg)
    }

    /// Serialize to pretty JSON.
    pub fn to_json_string(&self) -> Result<String> {
        let file = RegistryFile { fits: self.specs.values().cloned().collect() };
        Ok(serde_json::to_string_pretty(&file)?)
    }

    /// Write the registry to a JSON file.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, self.to_json_string()?)?;
        Ok(())
    }
}

impl FromIterator<HistogramFitSpec> for FitRegistry {
    fn from_iter<T: IntoIterator<Item = HistogramFitSpec>>(iter: T) -> Self {
        let mut reg = Self::new();
        for spec in iter {
            reg.insert(spec);
        }
        reg
    }
}
