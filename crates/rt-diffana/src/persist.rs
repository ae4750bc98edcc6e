//! JSON persistence of factory objects.
//!
//! A file holds the groups written by one `write` call:
//! `{"objects": [{"directory": ..., "histograms": [...], "canvases": [...]}]}`.

use rt_core::Result;
use rt_hist::{Canvas, Histogram};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Objects of one directory, borrowed for writing.
#[derive(Debug, Serialize)]
pub struct ObjectGroup<'a> {
    /// Directory name
    pub directory: &'a str,
    /// Histograms
    pub histograms: Vec<&'a Histogram>,
    /// Canvases
    pub canvases: Vec<&'a Canvas>,
}

/// Objects of one directory, as read back.
#[derive(Debug, Clone, Deserialize)]
pub struct StoredGroup {
    /// Directory name
    pub directory: String,
    /// Histograms
    pub histograms: Vec<Histogram>,
    /// Canvases
    pub canvases: Vec<Canvas>,
}

#[derive(Serialize)]
struct Document<'a, 'g> {
    objects: &'g [ObjectGroup<'a>],
}

#[derive(Deserialize)]
struct StoredDocument {
    objects: Vec<StoredGroup>,
}

/// Write `groups` to `path` as pretty-printed JSON, replacing the file.
pub fn write_groups(path: impl AsRef<Path>, groups: &[ObjectGroup<'_>], verbose: bool) -> Result<()> {
    let path = path.as_ref();
    if verbose {
        for g in groups {
            for h in &g.histograms {
                log::info!("Writing {}/{}", g.directory, h.name());
            }
            for c in &g.canvases {
                log::info!("Writing {}/{}", g.directory, c.name());
            }
        }
    }
    std::fs::write(path, serde_json::to_string_pretty(&Document { objects: groups })?)?;
    log::debug!("Wrote {} object groups to {}", groups.len(), path.display());
    Ok(())
}

/// Read the groups of a file written by [`write_groups`].
pub fn read_groups(path: impl AsRef<Path>) -> Result<Vec<StoredGroup>> {
    let text = std::fs::read_to_string(path.as_ref())?;
    let doc: StoredDocument = serde_json::from_str(&text)?;
    Ok(doc.objects)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn groups_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");

        let mut h = Histogram::new_1d("h_a", "a;x;y", 4, 0.0, 4.0).unwrap();
        h.fill(1.5, 2.0);
        let c = Canvas::new("c_a", "a", 800, 600);
        let groups = [ObjectGroup { directory: "a", histograms: vec![&h], canvases: vec![&c] }];
        write_groups(&path, &groups, true).unwrap();

        let back = read_groups(&path).unwrap();
        assert_eq!(back.len(), 1);
        assert_eq!(back[0].directory, "a");
        assert_eq!(back[0].histograms[0].name(), "h_a");
        assert_eq!(back[0].histograms[0].bin_content(2), 2.0);
        assert_eq!(back[0].canvases[0], c);
    }

    #[test]
    fn unwritable_path_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("out.json");
        assert!(write_groups(&path, &[], false).is_err());
    }
}
