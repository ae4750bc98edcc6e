//! N-dimensional (1–3D) weighted histogram with under/overflow bins.

use rt_core::{Error, Result};
use serde::{Deserialize, Serialize};

use crate::axis::Axis;
use crate::curve::FitCurve;
use crate::format::GraphFormat;

/// Running sums used for entries-weighted statistics along x.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
struct Stats {
    sumw: f64,
    sumw2: f64,
    sumwx: f64,
    sumwx2: f64,
}

/// Display attributes consumed by canvases; they never affect bin contents.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DisplayAttributes {
    /// Visible y range, `None` for automatic.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y_range: Option<(f64, f64)>,
    /// Number of y-axis divisions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y_ndivisions: Option<i32>,
    /// Whether the statistics box is shown.
    pub show_stats: bool,
    /// Axis cosmetics.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<GraphFormat>,
}

/// Weighted histogram over one to three axes.
///
/// Bins are addressed by a global index
/// `gx + sx * (gy + sy * gz)` where `g*` are native (1-based, flow-inclusive)
/// axis indices and the strides of unused axes are 1.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Histogram {
    name: String,
    title: String,
    dim: usize,
    axes: [Axis; 3],
    contents: Vec<f64>,
    sumw2: Vec<f64>,
    entries: f64,
    stats: Stats,
    #[serde(default)]
    functions: Vec<FitCurve>,
    #[serde(default)]
    display: DisplayAttributes,
}

impl Histogram {
    /// Create a histogram from one to three axes.
    pub fn from_axes(name: impl Into<String>, title: &str, axes: Vec<Axis>) -> Result<Self> {
        let dim = axes.len();
        if !(1..=3).contains(&dim) {
            return Err(Error::Validation(format!(
                "histograms support 1 to 3 axes, got {dim}"
            )));
        }
        let mut it = axes.into_iter();
        let x = it.next().unwrap_or_else(Axis::degenerate);
        let y = it.next().unwrap_or_else(Axis::degenerate);
        let z = it.next().unwrap_or_else(Axis::degenerate);

        let mut h = Self {
            name: name.into(),
            title: String::new(),
            dim,
            axes: [x, y, z],
            contents: Vec::new(),
            sumw2: Vec::new(),
            entries: 0.0,
            stats: Stats::default(),
            functions: Vec::new(),
            display: DisplayAttributes { show_stats: true, ..Default::default() },
        };
        h.allocate();
        h.set_title(title);
        Ok(h)
    }

    /// 1D histogram with uniform binning.
    pub fn new_1d(name: impl Into<String>, title: &str, nx: usize, xmin: f64, xmax: f64) -> Result<Self> {
        Self::from_axes(name, title, vec![Axis::uniform(nx, xmin, xmax)?])
    }

    /// 2D histogram with uniform binning.
    #[allow(clippy::too_many_arguments)]
    pub fn new_2d(
        name: impl Into<String>,
        title: &str,
        nx: usize,
        xmin: f64,
        xmax: f64,
        ny: usize,
        ymin: f64,
        ymax: f64,
    ) -> Result<Self> {
        Self::from_axes(
            name,
            title,
            vec![Axis::uniform(nx, xmin, xmax)?, Axis::uniform(ny, ymin, ymax)?],
        )
    }

    /// 3D histogram with uniform binning.
    #[allow(clippy::too_many_arguments)]
    pub fn new_3d(
        name: impl Into<String>,
        title: &str,
        nx: usize,
        xmin: f64,
        xmax: f64,
        ny: usize,
        ymin: f64,
        ymax: f64,
        nz: usize,
        zmin: f64,
        zmax: f64,
    ) -> Result<Self> {
        Self::from_axes(
            name,
            title,
            vec![
                Axis::uniform(nx, xmin, xmax)?,
                Axis::uniform(ny, ymin, ymax)?,
                Axis::uniform(nz, zmin, zmax)?,
            ],
        )
    }

    fn allocate(&mut self) {
        let n = self.n_cells();
        self.contents = vec![0.0; n];
        self.sumw2 = vec![0.0; n];
    }

    fn strides(&self) -> (usize, usize, usize) {
        let sx = self.axes[0].n_bins() + 2;
        let sy = if self.dim >= 2 { self.axes[1].n_bins() + 2 } else { 1 };
        let sz = if self.dim == 3 { self.axes[2].n_bins() + 2 } else { 1 };
        (sx, sy, sz)
    }

    fn n_cells(&self) -> usize {
        let (sx, sy, sz) = self.strides();
        sx * sy * sz
    }

    /// Histogram name (its identity for registries and persistence).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Rename the histogram.
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Histogram title.
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Set titles using the `"title;x title;y title;z title"` convention.
    ///
    /// Missing trailing fields leave the axis titles untouched.
    pub fn set_title(&mut self, spec: &str) {
        let mut parts = spec.split(';');
        self.title = parts.next().unwrap_or_default().to_string();
        for (axis, part) in self.axes.iter_mut().zip(parts) {
            axis.set_title(part);
        }
    }

    /// Number of dimensions (1–3).
    pub fn dimension(&self) -> usize {
        self.dim
    }

    /// Axis `i` (0 = x, 1 = y, 2 = z). Unused axes are single-bin placeholders.
    pub fn axis(&self, i: usize) -> &Axis {
        &self.axes[i.min(2)]
    }

    /// Mutable axis `i`, for titles only.
    pub fn axis_mut(&mut self, i: usize) -> &mut Axis {
        &mut self.axes[i.min(2)]
    }

    /// All three axes.
    pub fn axes(&self) -> &[Axis; 3] {
        &self.axes
    }

    /// Number of x bins.
    pub fn n_bins_x(&self) -> usize {
        self.axes[0].n_bins()
    }

    /// Number of y bins (1 for 1D histograms).
    pub fn n_bins_y(&self) -> usize {
        self.axes[1].n_bins()
    }

    /// Number of z bins (1 for 1D and 2D histograms).
    pub fn n_bins_z(&self) -> usize {
        self.axes[2].n_bins()
    }

    /// Global bin from native per-axis indices. Indices of unused axes are ignored.
    pub fn global_bin(&self, bx: usize, by: usize, bz: usize) -> usize {
        let (sx, sy, _) = self.strides();
        let by = if self.dim >= 2 { by } else { 0 };
        let bz = if self.dim == 3 { bz } else { 0 };
        bx + sx * (by + sy * bz)
    }

    /// Native per-axis indices of a global bin. Unused axes report 0.
    pub fn bin_xyz(&self, global: usize) -> (usize, usize, usize) {
        let (sx, sy, _) = self.strides();
        let bx = global % sx;
        let by = (global / sx) % sy;
        let bz = global / (sx * sy);
        (bx, by, bz)
    }

    /// Native per-axis indices for a coordinate. Unused axes report 0.
    pub fn find_bin_xyz(&self, x: f64, y: f64, z: f64) -> (usize, usize, usize) {
        let bx = self.axes[0].find_bin(x);
        let by = if self.dim >= 2 { self.axes[1].find_bin(y) } else { 0 };
        let bz = if self.dim == 3 { self.axes[2].find_bin(z) } else { 0 };
        (bx, by, bz)
    }

    /// Global bin for a coordinate.
    pub fn find_bin(&self, x: f64, y: f64, z: f64) -> usize {
        let (bx, by, bz) = self.find_bin_xyz(x, y, z);
        self.global_bin(bx, by, bz)
    }

    fn in_range(&self, bx: usize, by: usize, bz: usize) -> bool {
        let ok = |b: usize, a: &Axis| b >= 1 && b <= a.n_bins();
        ok(bx, &self.axes[0])
            && (self.dim < 2 || ok(by, &self.axes[1]))
            && (self.dim < 3 || ok(bz, &self.axes[2]))
    }

    /// Fill with weight `w` at the coordinate given by the first `dimension()` values
    /// of `coords` (missing values read as 0). Returns the global bin filled.
    pub fn fill_n(&mut self, coords: &[f64], w: f64) -> usize {
        let c = |i: usize| coords.get(i).copied().unwrap_or(0.0);
        let (x, y, z) = (c(0), c(1), c(2));
        let (bx, by, bz) = self.find_bin_xyz(x, y, z);
        let bin = self.global_bin(bx, by, bz);
        self.contents[bin] += w;
        self.sumw2[bin] += w * w;
        self.entries += 1.0;
        if self.in_range(bx, by, bz) {
            self.stats.sumw += w;
            self.stats.sumw2 += w * w;
            self.stats.sumwx += w * x;
            self.stats.sumwx2 += w * x * x;
        }
        bin
    }

    /// Fill a 1D histogram.
    pub fn fill(&mut self, x: f64, w: f64) -> usize {
        self.fill_n(&[x], w)
    }

    /// Fill a 2D histogram.
    pub fn fill_2d(&mut self, x: f64, y: f64, w: f64) -> usize {
        self.fill_n(&[x, y], w)
    }

    /// Fill a 3D histogram.
    pub fn fill_3d(&mut self, x: f64, y: f64, z: f64, w: f64) -> usize {
        self.fill_n(&[x, y, z], w)
    }

    /// Content of a global bin (0 for indices outside the storage).
    pub fn bin_content(&self, bin: usize) -> f64 {
        self.contents.get(bin).copied().unwrap_or(0.0)
    }

    /// Set the content of a global bin.
    pub fn set_bin_content(&mut self, bin: usize, value: f64) {
        if let Some(c) = self.contents.get_mut(bin) {
            *c = value;
        }
    }

    /// Statistical error of a global bin (`sqrt(sumw2)`).
    pub fn bin_error(&self, bin: usize) -> f64 {
        self.sumw2.get(bin).map(|s| s.sqrt()).unwrap_or(0.0)
    }

    /// Set the error of a global bin.
    pub fn set_bin_error(&mut self, bin: usize, error: f64) {
        if let Some(s) = self.sumw2.get_mut(bin) {
            *s = error * error;
        }
    }

    /// Number of fill calls, including under/overflow.
    pub fn entries(&self) -> f64 {
        self.entries
    }

    /// Weighted mean along x of the in-range fills.
    pub fn mean(&self) -> f64 {
        if self.stats.sumw == 0.0 { 0.0 } else { self.stats.sumwx / self.stats.sumw }
    }

    /// Weighted standard deviation along x of the in-range fills.
    pub fn rms(&self) -> f64 {
        if self.stats.sumw == 0.0 {
            return 0.0;
        }
        let mean = self.mean();
        let var = self.stats.sumwx2 / self.stats.sumw - mean * mean;
        var.max(0.0).sqrt()
    }

    fn in_range_bins(&self) -> impl Iterator<Item = (usize, usize, usize)> + '_ {
        let ny = if self.dim >= 2 { self.n_bins_y() } else { 1 };
        let nz = if self.dim == 3 { self.n_bins_z() } else { 1 };
        let off_y = usize::from(self.dim >= 2);
        let off_z = usize::from(self.dim == 3);
        (0..nz).flat_map(move |k| {
            (0..ny).flat_map(move |j| {
                (1..=self.n_bins_x()).map(move |i| (i, j + off_y, k + off_z))
            })
        })
    }

    /// Sum of contents over x bins `[bin_lo, bin_hi]` (clamped to the flow range),
    /// summed over all in-range bins of the other axes.
    pub fn integral(&self, bin_lo: usize, bin_hi: usize) -> f64 {
        let hi = bin_hi.min(self.n_bins_x() + 1);
        if bin_lo > hi {
            return 0.0;
        }
        let ny = if self.dim >= 2 { self.n_bins_y() } else { 1 };
        let nz = if self.dim == 3 { self.n_bins_z() } else { 1 };
        let off_y = usize::from(self.dim >= 2);
        let off_z = usize::from(self.dim == 3);
        let mut sum = 0.0;
        for k in 0..nz {
            for j in 0..ny {
                for i in bin_lo..=hi {
                    sum += self.contents[self.global_bin(i, j + off_y, k + off_z)];
                }
            }
        }
        sum
    }

    /// Sum of all in-range contents.
    pub fn integral_all(&self) -> f64 {
        self.in_range_bins().map(|(i, j, k)| self.contents[self.global_bin(i, j, k)]).sum()
    }

    /// Global bin holding the largest in-range content.
    pub fn maximum_bin(&self) -> usize {
        let mut best = self.global_bin(1, 1, 1);
        let mut best_val = f64::NEG_INFINITY;
        for (i, j, k) in self.in_range_bins() {
            let g = self.global_bin(i, j, k);
            if self.contents[g] > best_val {
                best_val = self.contents[g];
                best = g;
            }
        }
        best
    }

    /// Largest in-range content.
    pub fn maximum(&self) -> f64 {
        self.bin_content(self.maximum_bin())
    }

    /// Multiply contents by `factor` and errors by `|factor|`.
    pub fn scale(&mut self, factor: f64) {
        for c in &mut self.contents {
            *c *= factor;
        }
        let f2 = factor * factor;
        for s in &mut self.sumw2 {
            *s *= f2;
        }
        self.stats.sumw *= factor;
        self.stats.sumw2 *= f2;
        self.stats.sumwx *= factor;
        self.stats.sumwx2 *= factor;
    }

    /// Merge groups of `ngroup` x bins in place (1D only).
    ///
    /// Bins left over at the top of the range move into the overflow bin.
    pub fn rebin(&mut self, ngroup: usize) -> Result<()> {
        if self.dim != 1 {
            return Err(Error::Validation(format!(
                "rebin is supported for 1D histograms only ('{}' is {}D)",
                self.name, self.dim
            )));
        }
        if ngroup == 1 {
            return Ok(());
        }
        let axis = self.axes[0].rebinned(ngroup)?;
        let n_old = self.n_bins_x();
        let n_new = axis.n_bins();
        let mut contents = vec![0.0; n_new + 2];
        let mut sumw2 = vec![0.0; n_new + 2];
        contents[0] = self.contents[0];
        sumw2[0] = self.sumw2[0];
        for b in 1..=n_old + 1 {
            let target = if b > n_new * ngroup { n_new + 1 } else { (b - 1) / ngroup + 1 };
            contents[target] += self.contents[b];
            sumw2[target] += self.sumw2[b];
        }
        if n_new * ngroup < n_old {
            log::debug!(
                "rebin of '{}': last {} bins moved to overflow",
                self.name,
                n_old - n_new * ngroup
            );
        }
        self.axes[0] = axis;
        self.contents = contents;
        self.sumw2 = sumw2;
        Ok(())
    }

    /// Clear contents, errors, entries, statistics and attached curves.
    pub fn reset(&mut self) {
        self.contents.iter_mut().for_each(|c| *c = 0.0);
        self.sumw2.iter_mut().for_each(|s| *s = 0.0);
        self.entries = 0.0;
        self.stats = Stats::default();
        self.functions.clear();
    }

    /// `true` when both histograms have the same dimension and bin counts.
    pub fn same_binning(&self, other: &Histogram) -> bool {
        self.dim == other.dim
            && self.axes.iter().zip(other.axes.iter()).all(|(a, b)| a.n_bins() == b.n_bins())
    }

    /// Copy in-range contents and errors from `src`, optionally replacing the
    /// attached curves with copies of the source ones.
    pub fn copy_contents_from(&mut self, src: &Histogram, with_functions: bool) -> Result<()> {
        if !self.same_binning(src) {
            return Err(Error::Validation(format!(
                "cannot copy '{}' into '{}': binning differs",
                src.name, self.name
            )));
        }
        let bins: Vec<usize> =
            self.in_range_bins().map(|(i, j, k)| self.global_bin(i, j, k)).collect();
        for g in bins {
            self.contents[g] = src.contents[g];
            self.sumw2[g] = src.sumw2[g];
        }
        if with_functions && !src.functions.is_empty() {
            self.functions = src.functions.clone();
        }
        Ok(())
    }

    /// Attached curves, in attachment order.
    pub fn functions(&self) -> &[FitCurve] {
        &self.functions
    }

    /// Mutable access to the attached curves.
    pub fn functions_mut(&mut self) -> &mut Vec<FitCurve> {
        &mut self.functions
    }

    /// Attach a curve.
    pub fn add_function(&mut self, curve: FitCurve) {
        self.functions.push(curve);
    }

    /// Detach all curves.
    pub fn clear_functions(&mut self) {
        self.functions.clear();
    }

    /// Display attributes.
    pub fn display(&self) -> &DisplayAttributes {
        &self.display
    }

    /// Mutable display attributes.
    pub fn display_mut(&mut self) -> &mut DisplayAttributes {
        &mut self.display
    }

    /// Restrict the visible y range.
    pub fn set_y_range(&mut self, lo: f64, hi: f64) {
        self.display.y_range = Some((lo, hi));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn fill_1d_with_flows() {
        let mut h = Histogram::new_1d("h", "t;x;y", 4, 0.0, 4.0).unwrap();
        h.fill(0.5, 1.0);
        h.fill(0.5, 2.0);
        h.fill(-1.0, 1.0);
        h.fill(4.5, 1.0);
        assert_eq!(h.bin_content(1), 3.0);
        assert_eq!(h.bin_content(0), 1.0);
        assert_eq!(h.bin_content(5), 1.0);
        assert_relative_eq!(h.bin_error(1), 5.0_f64.sqrt());
        assert_eq!(h.entries(), 4.0);
        assert_eq!(h.integral_all(), 3.0);
        assert_eq!(h.integral(0, 5), 5.0);
        assert_eq!(h.axis(0).title(), "x");
        assert_eq!(h.title(), "t");
    }

    #[test]
    fn global_bin_roundtrip_2d() {
        let h = Histogram::new_2d("h", "", 3, 0.0, 3.0, 2, 0.0, 2.0).unwrap();
        let g = h.global_bin(2, 1, 0);
        assert_eq!(h.bin_xyz(g), (2, 1, 0));
        assert_eq!(h.find_bin(1.5, 0.5, 0.0), g);
        assert_eq!(h.n_bins_z(), 1);
    }

    #[test]
    fn fill_3d_and_integral() {
        let mut h = Histogram::new_3d("h", "", 2, 0.0, 2.0, 2, 0.0, 2.0, 2, 0.0, 2.0).unwrap();
        h.fill_3d(0.5, 1.5, 1.5, 2.0);
        h.fill_3d(1.5, 0.5, 0.5, 1.0);
        h.fill_3d(1.5, 0.5, 2.5, 1.0);
        assert_eq!(h.integral_all(), 3.0);
        assert_eq!(h.bin_content(h.global_bin(1, 2, 2)), 2.0);
        assert_eq!(h.bin_content(h.global_bin(2, 1, 3)), 1.0);
    }

    #[test]
    fn mean_rms_and_scale() {
        let mut h = Histogram::new_1d("h", "", 10, 0.0, 10.0).unwrap();
        h.fill(2.0, 1.0);
        h.fill(4.0, 1.0);
        assert_relative_eq!(h.mean(), 3.0);
        assert_relative_eq!(h.rms(), 1.0);
        h.scale(2.0);
        assert_relative_eq!(h.integral_all(), 4.0);
        assert_relative_eq!(h.rms(), 1.0);
        assert_eq!(h.entries(), 2.0);
    }

    #[test]
    fn rebin_moves_leftover_to_overflow() {
        let mut h = Histogram::new_1d("h", "", 5, 0.0, 5.0).unwrap();
        for x in [0.5, 1.5, 2.5, 3.5, 4.5] {
            h.fill(x, 1.0);
        }
        h.rebin(2).unwrap();
        assert_eq!(h.n_bins_x(), 2);
        assert_eq!(h.bin_content(1), 2.0);
        assert_eq!(h.bin_content(2), 2.0);
        assert_eq!(h.bin_content(3), 1.0);
        assert_relative_eq!(h.axis(0).max(), 4.0);
    }

    #[test]
    fn rebin_rejects_2d() {
        let mut h = Histogram::new_2d("h", "", 4, 0.0, 4.0, 2, 0.0, 2.0).unwrap();
        assert!(h.rebin(2).is_err());
    }

    #[test]
    fn reset_and_copy() {
        let mut a = Histogram::new_1d("a", "", 3, 0.0, 3.0).unwrap();
        let mut b = Histogram::new_1d("b", "", 3, 0.0, 3.0).unwrap();
        a.fill(1.5, 4.0);
        b.copy_contents_from(&a, true).unwrap();
        assert_eq!(b.bin_content(2), 4.0);
        assert_eq!(b.bin_error(2), 4.0);
        a.reset();
        assert_eq!(a.integral_all(), 0.0);
        assert_eq!(a.entries(), 0.0);

        let c = Histogram::new_1d("c", "", 4, 0.0, 3.0).unwrap();
        assert!(b.copy_contents_from(&c, false).is_err());
    }

    #[test]
    fn maximum_ignores_flows() {
        let mut h = Histogram::new_1d("h", "", 3, 0.0, 3.0).unwrap();
        h.fill(-5.0, 10.0);
        h.fill(1.5, 2.0);
        assert_eq!(h.maximum_bin(), 2);
        assert_eq!(h.maximum(), 2.0);
    }
}
