//! JSON configuration of context axes.
//!
//! A configuration file maps analysis names to axis blocks:
//!
//! ```json
//! {
//!   "LambdaPtY": {
//!     "x": { "label": "y_{cm}", "bins": 10, "min": -1.0, "max": 1.0 },
//!     "y": { "label": "p_{t}", "unit": "MeV/c", "bins": 8, "min": 0.0, "max": 800.0 },
//!     "V": { "label": "M", "unit": "MeV/c^{2}", "bins": 100, "min": 1080.0, "max": 1200.0 }
//!   }
//! }
//! ```
//!
//! Only the keys present in a block override the axis.

use crate::axis::AxisSpec;
use rt_core::Result;
use serde::Deserialize;
use serde_json::{Value, json};
use std::path::{Path, PathBuf};

#[derive(Debug, Default, Deserialize)]
struct AxisPatch {
    label: Option<String>,
    unit: Option<String>,
    bins: Option<usize>,
    min: Option<f64>,
    max: Option<f64>,
}

impl AxisPatch {
    fn apply(self, axis: &mut AxisSpec) {
        if let Some(label) = self.label {
            axis.label = label;
        }
        if let Some(unit) = self.unit {
            axis.unit = unit;
        }
        if let Some(bins) = self.bins {
            axis.bins = bins;
        }
        if let Some(min) = self.min {
            axis.min = min;
        }
        if let Some(max) = self.max {
            axis.max = max;
        }
    }
}

/// Apply the axis blocks of analysis `name` in `path` to `axes`, keyed by
/// `keys`. Returns `Ok(false)` when the file has no entry for `name`.
pub(crate) fn configure_axes(
    path: &Path,
    name: &str,
    keys: &[&str],
    axes: &mut [&mut AxisSpec],
) -> Result<bool> {
    let text = std::fs::read_to_string(path)?;
    let root: Value = serde_json::from_str(&text)?;
    let Some(entry) = root.get(name) else {
        log::info!("No data for {name} in {}", path.display());
        return Ok(false);
    };
    log::info!("Found JSON config for {name} in {}", path.display());

    for (key, axis) in keys.iter().zip(axes.iter_mut()) {
        if let Some(block) = entry.get(*key) {
            let patch: AxisPatch = serde_json::from_value(block.clone())?;
            log::debug!("  {key}: {patch:?}");
            patch.apply(axis);
        }
    }
    Ok(true)
}

/// JSON skeleton for analysis `name` with one empty axis block per key.
pub(crate) fn template(name: &str, title: &str, keys: &[&str]) -> Value {
    let axis = json!({ "label": "", "unit": "", "bins": 0, "min": 0.0, "max": 0.0 });
    let mut cfg = serde_json::Map::new();
    cfg.insert("title".into(), Value::String(title.into()));
    for key in keys {
        cfg.insert((*key).into(), axis.clone());
    }
    let mut root = serde_json::Map::new();
    root.insert(name.into(), Value::Object(cfg));
    Value::Object(root)
}

/// Look for `filename` in `start_dir` and its parents.
///
/// `search_depth` limits how many parent levels are visited (`Some(0)`: only
/// `start_dir`); `None` walks up to the filesystem root.
pub fn find_json_file(
    start_dir: impl AsRef<Path>,
    filename: &str,
    search_depth: Option<usize>,
) -> Option<PathBuf> {
    let mut dir = std::fs::canonicalize(start_dir.as_ref()).ok()?;
    let mut depth = 0usize;
    loop {
        let candidate = dir.join(filename);
        if candidate.is_file() {
            log::info!("Found json config at {}", candidate.display());
            return Some(candidate);
        }
        if !dir.pop() {
            return None;
        }
        depth += 1;
        if let Some(max) = search_depth
            && depth > max
        {
            return None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_blocks_keep_other_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ana.json");
        std::fs::write(&path, r#"{"ana": {"x": {"bins": 20, "unit": "GeV"}}}"#).unwrap();

        let mut x = AxisSpec::new("p", "", 10, 0.0, 1.0);
        let mut y = AxisSpec::new("q", "", 5, 0.0, 1.0);
        assert!(configure_axes(&path, "ana", &["x", "y"], &mut [&mut x, &mut y]).unwrap());
        assert_eq!(x.bins, 20);
        assert_eq!(x.unit, "GeV");
        assert_eq!(x.label, "p");
        assert_eq!(y.bins, 5);

        assert!(!configure_axes(&path, "other", &["x"], &mut [&mut x]).unwrap());
    }

    #[test]
    fn template_has_axis_blocks() {
        let t = template("ana", "d^{2}N/dxdy", &["x", "y", "V"]);
        assert_eq!(t["ana"]["V"]["bins"], 0);
        assert_eq!(t["ana"]["title"], "d^{2}N/dxdy");
    }

    #[test]
    fn find_json_walks_parents() {
        let root = tempfile::tempdir().unwrap();
        let nested = root.path().join("a").join("b");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(root.path().join("cfg.json"), "{}").unwrap();

        let found = find_json_file(&nested, "cfg.json", None).unwrap();
        assert_eq!(found, std::fs::canonicalize(root.path()).unwrap().join("cfg.json"));
        assert!(find_json_file(&nested, "cfg.json", Some(1)).is_none());
        assert!(find_json_file(&nested, "cfg.json", Some(2)).is_some());
        assert!(find_json_file(&nested, "missing.json", Some(2)).is_none());
    }
}
