//! Slices of an extra dimension, one 1D histogram per outer bin.
//!
//! Outer bins `(bx, by, bz)` are 0-based here and flatten to
//! `bz * nx * ny + by * nx + bx`. Slices live in one vector indexed by that
//! flat index. Canvases group the slices of one row: a 1D mapper has a single
//! canvas with one pad per x bin, a 2D mapper one canvas per x bin with one
//! pad per y bin, and a 3D mapper one canvas per `(x, y)` bin with one pad per
//! z bin.

use crate::axis::AxisSpec;
use crate::context::Dimensions;
use rt_core::{Error, Result};
use rt_hist::{Axis, Canvas, Histogram, Pad};

const CANVAS_WIDTH: u32 = 800;
const CANVAS_HEIGHT: u32 = 600;

/// Per-outer-bin slices of the `V` axis and the canvases displaying them.
#[derive(Debug, Clone)]
pub struct ExtraDimensionMapper {
    dim: Dimensions,
    axis: AxisSpec,
    prefix_name: String,
    directory: String,
    nx: usize,
    ny: usize,
    nz: usize,
    reference: [Axis; 3],
    histograms: Vec<Histogram>,
    canvases: Vec<Canvas>,
}

impl ExtraDimensionMapper {
    /// Allocate the slices of `axis` for every bin of `reference`.
    ///
    /// `prefix` names the objects (`h_<prefix>_X00`, `c_<prefix>`). The
    /// reference binning is copied; later changes to `reference` are not seen.
    pub fn new(
        dim: Dimensions,
        reference: &Histogram,
        axis: &AxisSpec,
        prefix: &str,
        directory: &str,
    ) -> Result<Self> {
        if dim < Dimensions::Dim1 {
            return Err(Error::Config(format!("extra dimension needs Dim1 or higher, got {dim}")));
        }
        if reference.dimension() != dim.differential_axes() {
            return Err(Error::Config(format!(
                "{dim} mapper needs a {}D reference, '{}' is {}D",
                dim.differential_axes(),
                reference.name(),
                reference.dimension()
            )));
        }
        if axis.bin_edges.is_some() {
            return Err(Error::Config(format!(
                "axis '{}': variable bin edges are not supported for slices",
                axis.label
            )));
        }
        if !axis.is_valid() {
            return Err(Error::Config(format!(
                "axis '{}' needs bins > 0 and max > min (bins={}, range=[{}, {}])",
                axis.label, axis.bins, axis.min, axis.max
            )));
        }

        let mut mapper = Self {
            dim,
            axis: axis.clone(),
            prefix_name: prefix.to_string(),
            directory: directory.to_string(),
            nx: reference.n_bins_x(),
            ny: reference.n_bins_y(),
            nz: reference.n_bins_z(),
            reference: reference.axes().clone(),
            histograms: Vec::new(),
            canvases: Vec::new(),
        };
        mapper.allocate()?;
        log::debug!(
            "Mapped {} slices of '{}' into {} canvases",
            mapper.histograms.len(),
            axis.label,
            mapper.canvases.len()
        );
        Ok(mapper)
    }

    fn allocate(&mut self) -> Result<()> {
        let n = self.n_hists();
        let mut histograms = Vec::with_capacity(n);
        for flat in 0..n {
            let (bx, by, bz) = self.split(flat);
            let name = self.slice_name(bx, by, bz);
            let title = self.axis.format_hist_string(&name, "Counts");
            histograms.push(Histogram::new_1d(name, &title, self.axis.bins, self.axis.min, self.axis.max)?);
        }
        self.histograms = histograms;

        let (n_canvases, pads) = match self.dim {
            Dimensions::Dim1 => (1, self.nx),
            Dimensions::Dim2 => (self.nx, self.ny),
            Dimensions::Dim3 => (self.nx * self.ny, self.nz),
            Dimensions::NoInit | Dimensions::Dim0 => (0, 0),
        };
        self.canvases = (0..n_canvases)
            .map(|i| {
                let name = self.canvas_name(i % self.nx, i / self.nx);
                let mut canvas = Canvas::new(name.clone(), name, CANVAS_WIDTH, CANVAS_HEIGHT);
                canvas.divide_square(pads);
                canvas
            })
            .collect();
        Ok(())
    }

    fn split(&self, flat: usize) -> (usize, usize, usize) {
        (flat % self.nx, (flat / self.nx) % self.ny, flat / (self.nx * self.ny))
    }

    fn slice_name(&self, bx: usize, by: usize, bz: usize) -> String {
        match self.dim {
            Dimensions::Dim3 => format!("h_{}_X{bx:02}_Y{by:02}_Z{bz:02}", self.prefix_name),
            Dimensions::Dim2 => format!("h_{}_X{bx:02}_Y{by:02}", self.prefix_name),
            _ => format!("h_{}_X{bx:02}", self.prefix_name),
        }
    }

    fn canvas_name(&self, bx: usize, by: usize) -> String {
        match self.dim {
            Dimensions::Dim3 => format!("c_{}_X{bx:02}_Y{by:02}", self.prefix_name),
            Dimensions::Dim2 => format!("c_{}_X{bx:02}", self.prefix_name),
            _ => format!("c_{}", self.prefix_name),
        }
    }

    /// Dimensionality of the outer binning.
    pub fn dim(&self) -> Dimensions {
        self.dim
    }

    /// The sliced axis.
    pub fn axis(&self) -> &AxisSpec {
        &self.axis
    }

    /// Object name prefix.
    pub fn prefix_name(&self) -> &str {
        &self.prefix_name
    }

    /// Directory the objects are written to.
    pub fn directory(&self) -> &str {
        &self.directory
    }

    /// Outer bin counts `(nx, ny, nz)`; unused axes count 1.
    pub fn bins(&self) -> (usize, usize, usize) {
        (self.nx, self.ny, self.nz)
    }

    /// Number of slices, `nx * ny * nz`.
    pub fn n_hists(&self) -> usize {
        self.nx * self.ny * self.nz
    }

    /// Flat index of the 0-based outer bin. No bounds checks.
    pub fn flat_index(&self, bx: usize, by: usize, bz: usize) -> usize {
        bz * (self.nx * self.ny) + by * self.nx + bx
    }

    /// Outer bin of a flat index, `None` past the last slice.
    ///
    /// Axes beyond the dimensionality report 0.
    pub fn reverse_index(&self, flat: usize) -> Option<(usize, usize, usize)> {
        if flat >= self.n_hists() {
            return None;
        }
        Some(self.split(flat))
    }

    /// x bin of a flat index; 1D mappers only.
    pub fn reverse_index_x(&self, flat: usize) -> Option<usize> {
        if self.dim != Dimensions::Dim1 || flat >= self.n_hists() {
            return None;
        }
        Some(flat % self.nx)
    }

    /// `(x, y)` bin of a flat index; `y` is 0 on 1D mappers, 3D mappers give `None`.
    pub fn reverse_index_xy(&self, flat: usize) -> Option<(usize, usize)> {
        match self.dim {
            Dimensions::Dim1 => self.reverse_index_x(flat).map(|x| (x, 0)),
            Dimensions::Dim2 => self.reverse_index(flat).map(|(x, y, _)| (x, y)),
            _ => None,
        }
    }

    /// Native (1-based, flow-inclusive) outer bin indices of a coordinate.
    /// Unused axes report 0.
    pub fn locate_bin(&self, x: f64, y: f64, z: f64) -> (usize, usize, usize) {
        let n = self.dim.differential_axes();
        let bx = self.reference[0].find_bin(x);
        let by = if n >= 2 { self.reference[1].find_bin(y) } else { 0 };
        let bz = if n >= 3 { self.reference[2].find_bin(z) } else { 0 };
        (bx, by, bz)
    }

    /// 0-based outer bin of native indices when every active index is in range.
    fn in_range(&self, native: (usize, usize, usize)) -> Option<(usize, usize, usize)> {
        let n = self.dim.differential_axes();
        let check = |b: usize, count: usize, active: bool| -> Option<usize> {
            if !active {
                Some(0)
            } else if (1..=count).contains(&b) {
                Some(b - 1)
            } else {
                None
            }
        };
        Some((
            check(native.0, self.nx, true)?,
            check(native.1, self.ny, n >= 2)?,
            check(native.2, self.nz, n >= 3)?,
        ))
    }

    /// Fill the slice of the outer bin holding `coords` with `v`.
    ///
    /// Returns `false` and fills nothing when any active coordinate falls in
    /// an under/overflow bin.
    pub fn fill(&mut self, coords: &[f64], v: f64, w: f64) -> bool {
        let c = |i: usize| coords.get(i).copied().unwrap_or(0.0);
        let native = self.locate_bin(c(0), c(1), c(2));
        let Some((bx, by, bz)) = self.in_range(native) else {
            return false;
        };
        let flat = self.flat_index(bx, by, bz);
        self.histograms[flat].fill(v, w);
        true
    }

    /// Slice of a 0-based outer bin, `None` out of bounds.
    pub fn get(&self, bx: usize, by: usize, bz: usize) -> Option<&Histogram> {
        if bx >= self.nx || by >= self.ny || bz >= self.nz {
            return None;
        }
        self.histograms.get(self.flat_index(bx, by, bz))
    }

    /// Mutable slice of a 0-based outer bin.
    pub fn get_mut(&mut self, bx: usize, by: usize, bz: usize) -> Option<&mut Histogram> {
        if bx >= self.nx || by >= self.ny || bz >= self.nz {
            return None;
        }
        let flat = self.flat_index(bx, by, bz);
        self.histograms.get_mut(flat)
    }

    /// Slice holding a coordinate, `None` outside the outer binning.
    pub fn find(&self, x: f64, y: f64, z: f64) -> Option<&Histogram> {
        let (bx, by, bz) = self.in_range(self.locate_bin(x, y, z))?;
        self.get(bx, by, bz)
    }

    fn canvas_index(&self, bx: usize, by: usize) -> Option<usize> {
        match self.dim {
            Dimensions::Dim3 => (bx < self.nx && by < self.ny).then_some(bx + by * self.nx),
            Dimensions::Dim2 => (bx < self.nx).then_some(bx),
            Dimensions::Dim1 => Some(0),
            Dimensions::NoInit | Dimensions::Dim0 => None,
        }
    }

    /// Canvas holding the outer bin `(bx, by)`.
    pub fn canvas(&self, bx: usize, by: usize) -> Option<&Canvas> {
        self.canvases.get(self.canvas_index(bx, by)?)
    }

    /// Mutable canvas holding the outer bin `(bx, by)`.
    pub fn canvas_mut(&mut self, bx: usize, by: usize) -> Option<&mut Canvas> {
        let i = self.canvas_index(bx, by)?;
        self.canvases.get_mut(i)
    }

    /// 1-based pad number of an outer bin inside its canvas.
    pub fn pad_number(&self, bx: usize, by: usize, bz: usize) -> usize {
        match self.dim {
            Dimensions::Dim3 => bz + 1,
            Dimensions::Dim2 => by + 1,
            Dimensions::Dim1 => bx + 1,
            Dimensions::NoInit | Dimensions::Dim0 => 0,
        }
    }

    /// Pad displaying the slice of an outer bin.
    pub fn pad(&self, bx: usize, by: usize, bz: usize) -> Option<&Pad> {
        self.canvas(bx, by)?.pad(self.pad_number(bx, by, bz))
    }

    /// Mutable pad displaying the slice of an outer bin.
    pub fn pad_mut(&mut self, bx: usize, by: usize, bz: usize) -> Option<&mut Pad> {
        let n = self.pad_number(bx, by, bz);
        self.canvas_mut(bx, by)?.cd(n)
    }

    /// Slice and its pad, borrowed together.
    pub fn slice_and_pad_mut(
        &mut self,
        bx: usize,
        by: usize,
        bz: usize,
    ) -> Option<(&mut Histogram, &mut Pad)> {
        if bx >= self.nx || by >= self.ny || bz >= self.nz {
            return None;
        }
        let flat = self.flat_index(bx, by, bz);
        let pad_number = self.pad_number(bx, by, bz);
        let ci = self.canvas_index(bx, by)?;
        let hist = self.histograms.get_mut(flat)?;
        let pad = self.canvases.get_mut(ci)?.cd(pad_number)?;
        Some((hist, pad))
    }

    /// All slices in flat-index order.
    pub fn histograms(&self) -> &[Histogram] {
        &self.histograms
    }

    /// Mutable slices in flat-index order.
    pub fn histograms_mut(&mut self) -> &mut [Histogram] {
        &mut self.histograms
    }

    /// All canvases.
    pub fn canvases(&self) -> &[Canvas] {
        &self.canvases
    }

    /// Clear every slice.
    pub fn reset(&mut self) {
        self.histograms.iter_mut().for_each(Histogram::reset);
    }

    /// Rename every slice and canvas after a new prefix.
    pub fn rename(&mut self, prefix: &str) {
        self.prefix_name = prefix.to_string();
        for flat in 0..self.histograms.len() {
            let (bx, by, bz) = self.split(flat);
            let name = self.slice_name(bx, by, bz);
            let title = self.axis.format_hist_string(&name, "Counts");
            let h = &mut self.histograms[flat];
            h.set_name(name);
            h.set_title(&title);
        }
        for i in 0..self.canvases.len() {
            let name = self.canvas_name(i % self.nx, i / self.nx);
            let c = &mut self.canvases[i];
            c.set_name(name.clone());
            c.set_title(name);
        }
    }

    /// Move the objects to another directory.
    pub fn chdir(&mut self, directory: &str) {
        self.directory = directory.to_string();
    }
}
