//! Differential factory: a distribution factory plus per-bin slices of an
//! extra dimension, fitted or integrated after the event loop.

use crate::context::{DifferentialContext, Dimensions};
use crate::distribution::{DistributionFactory, FactoryState, angular_models, not_initialized};
use crate::mapper::ExtraDimensionMapper;
use crate::persist;
use rt_core::Result;
use rt_fit::{ChiSquareFitter, CurveFitter, FitRegistry, HistogramFitSpec, apply_angular_distribution};
use rt_hist::{
    Canvas, CurveRole, GraphFormat, Histogram, PadFormat, TextAnnotation, nice_histogram, nice_pad,
};
use std::path::Path;

/// Minimum `entries / RMS` of a slice for it to be fitted.
pub const MIN_FIT_STATISTICS: f64 = 5.0;

const SLICE_PAD_MARGINS: (f64, f64, f64, f64) = (0.10, 0.01, 0.15, 0.10);
const CENTER_ALIGN: u8 = 23;

/// Outcome of one slice handed to the fit callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SliceFitStatus {
    /// The fit succeeded
    Converged,
    /// The fit was attempted and failed, or the fit range was empty
    Failed,
    /// No fit was requested; the callback integrates the slice itself
    IntegralOnly,
}

impl SliceFitStatus {
    /// Numeric code: 1, 0 and -1.
    pub fn code(self) -> i32 {
        match self {
            SliceFitStatus::Converged => 1,
            SliceFitStatus::Failed => 0,
            SliceFitStatus::IntegralOnly => -1,
        }
    }
}

/// Per-slice result handler, called in `bx`, `by`, `bz` scan order with the
/// 0-based outer bin of the slice.
pub type FitCallback = Box<
    dyn FnMut(
        &DifferentialFactory,
        Option<&mut DistributionFactory>,
        SliceFitStatus,
        &Histogram,
        usize,
        usize,
        usize,
    ),
>;

/// Tally of one [`DifferentialFactory::fit_diff_hists`] pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FitSummary {
    /// Slices fitted successfully
    pub converged: usize,
    /// Slices whose fit failed or whose fit range was empty
    pub failed: usize,
    /// Slices below the statistics threshold
    pub no_fit: usize,
    /// Slices with a disabled fit spec
    pub disabled: usize,
    /// Slices handed over for integration
    pub integral_only: usize,
}

impl FitSummary {
    /// Number of slices visited.
    pub fn total(&self) -> usize {
        self.converged + self.failed + self.no_fit + self.disabled + self.integral_only
    }
}

enum SliceNote {
    None,
    NoFit,
    Disabled,
}

/// Distribution factory over a [`DifferentialContext`].
///
/// With `Dim1` to `Dim3` every outer bin gets a 1D histogram of the `V` axis,
/// named `h_<name>_Signal_X00...` and written to `<dir>/diffs`.
pub struct DifferentialFactory {
    /// Outer distribution
    pub base: DistributionFactory,
    /// Context the factory was built from
    pub ctx: DifferentialContext,
    mapper: Option<ExtraDimensionMapper>,
    fitter: Box<dyn CurveFitter>,
    fit_callback: Option<FitCallback>,
}

impl std::fmt::Debug for DifferentialFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DifferentialFactory")
            .field("base", &self.base)
            .field("ctx", &self.ctx)
            .field("mapper", &self.mapper)
            .field("has_fit_callback", &self.fit_callback.is_some())
            .finish()
    }
}

fn slice_prefix(name: &str) -> String {
    format!("{name}_Signal")
}

fn slice_directory(dir: &str) -> String {
    format!("{dir}/diffs")
}

/// `entries / RMS` of a slice, 0 for a vanishing RMS.
fn fit_statistics(hist: &Histogram) -> f64 {
    let rms = hist.rms();
    if rms > 0.0 { hist.entries() / rms } else { 0.0 }
}

/// Format with `digits` significant digits.
fn significant(value: f64, digits: usize) -> String {
    if value == 0.0 || !value.is_finite() {
        return format!("{value}");
    }
    let magnitude = value.abs().log10().floor() as i64;
    let decimals = (digits as i64 - 1 - magnitude).max(0) as usize;
    format!("{value:.decimals$}")
}

impl DifferentialFactory {
    /// Factory for `ctx` using the chi-square fitter.
    pub fn new(mut ctx: DifferentialContext) -> Self {
        ctx.update();
        Self {
            base: DistributionFactory::new(ctx.base.clone()),
            ctx,
            mapper: None,
            fitter: Box::new(ChiSquareFitter::default()),
            fit_callback: None,
        }
    }

    /// Allocate the signal histogram, its canvas and the slices.
    pub fn init(&mut self) -> Result<()> {
        self.ctx.validate()?;
        self.base.init()?;
        self.init_diffs()
    }

    /// Allocate the slices; a no-op for `Dim0` or when already allocated.
    pub fn init_diffs(&mut self) -> Result<()> {
        if !self.ctx.has_extra_dimension() || self.mapper.is_some() {
            return Ok(());
        }
        let reference = self.base.signal().ok_or_else(|| not_initialized(self.base.name()))?;
        let mapper = ExtraDimensionMapper::new(
            self.ctx.base.dim,
            reference,
            &self.ctx.v,
            &slice_prefix(self.base.name()),
            &slice_directory(self.base.directory()),
        )?;
        log::info!("{} slices of {} for {}", mapper.n_hists(), self.ctx.v.label, self.base.name());
        self.mapper = Some(mapper);
        Ok(())
    }

    /// Re-derive titles and names from the context without reallocating.
    pub fn reinit(&mut self) -> Result<()> {
        self.ctx.update();
        self.base.ctx = self.ctx.base.clone();
        self.base.reinit()?;
        if let Some(m) = self.mapper.as_mut() {
            m.rename(&slice_prefix(&self.ctx.base.hist_name));
            m.chdir(&slice_directory(&self.ctx.base.dir_name));
        }
        Ok(())
    }

    /// Fill with the current values of the bound variables.
    pub fn proceed(&mut self) -> Result<()> {
        let coords = self.ctx.base.coordinates()?;
        let w = self.ctx.base.weight_value()?;
        let v = if self.ctx.has_extra_dimension() { self.ctx.extra_value()? } else { 0.0 };
        self.fill(&coords, v, w)?;
        Ok(())
    }

    /// Fill the signal histogram at `coords` and the slice of that bin at `v`.
    /// Returns whether a slice was filled.
    pub fn fill(&mut self, coords: &[f64], v: f64, w: f64) -> Result<bool> {
        self.base.fill(coords, w)?;
        Ok(self.mapper.as_mut().is_some_and(|m| m.fill(coords, v, w)))
    }

    /// Multiply the signal histogram and every slice by `factor`.
    pub fn scale(&mut self, factor: f64) {
        self.base.scale(factor);
        if let Some(m) = self.mapper.as_mut() {
            m.histograms_mut().iter_mut().for_each(|h| h.scale(factor));
        }
    }

    /// Sum of the in-range contents of every slice.
    pub fn slice_counts(&self) -> f64 {
        self.mapper.as_ref().map_or(0.0, |m| m.histograms().iter().map(Histogram::integral_all).sum())
    }

    /// Divide the signal histogram and every slice by the first bin area of
    /// the signal histogram.
    pub fn binnorm(&mut self) {
        if let Some(factor) = self.base.binnorm_factor() {
            self.scale(factor);
        }
    }

    /// Clear the signal histogram and every slice.
    pub fn reset(&mut self) {
        self.base.reset();
        if let Some(m) = self.mapper.as_mut() {
            m.reset();
        }
    }

    /// Angular reweighting of the signal histogram and of every slice.
    pub fn apply_ang_dists(&mut self, a2: f64, a4: f64, corr_a2: f64, corr_a4: f64) {
        self.base.apply_ang_dists(a2, a4, corr_a2, corr_a4);
        let (dist, corr) = angular_models(a2, a4, corr_a2, corr_a4);
        if let Some(m) = self.mapper.as_mut() {
            for h in m.histograms_mut() {
                apply_angular_distribution(h, dist, corr);
            }
        }
    }

    /// Binomial errors on the signal histogram; slices are untouched.
    pub fn apply_binom_errors(&mut self, n: &Histogram) -> Result<()> {
        self.base.apply_binom_errors(n)
    }

    /// Copy signal and slice contents of `other`.
    pub fn copy_contents_from(&mut self, other: &DifferentialFactory) -> Result<()> {
        self.base.copy_contents_from(&other.base)?;
        if let (Some(dst), Some(src)) = (self.mapper.as_mut(), other.mapper.as_ref()) {
            for (d, s) in dst.histograms_mut().iter_mut().zip(src.histograms()) {
                d.copy_contents_from(s, true)?;
            }
        }
        Ok(())
    }

    /// Rename the signal objects and the slices.
    pub fn rename(&mut self, name: &str) {
        self.ctx.base.hist_name = name.to_string();
        self.base.rename(name);
        if let Some(m) = self.mapper.as_mut() {
            m.rename(&slice_prefix(name));
        }
    }

    /// Move the signal objects to `directory` and the slices to `<directory>/diffs`.
    pub fn chdir(&mut self, directory: &str) {
        self.ctx.base.dir_name = directory.to_string();
        self.base.chdir(directory);
        if let Some(m) = self.mapper.as_mut() {
            m.chdir(&slice_directory(directory));
        }
    }

    /// See [`DistributionFactory::finalize`].
    pub fn finalize(&mut self, draw_opts: Option<&str>) -> Result<()> {
        self.base.finalize(draw_opts)
    }

    /// Register the per-slice result handler.
    pub fn set_fit_callback<F>(&mut self, callback: F)
    where
        F: FnMut(
                &DifferentialFactory,
                Option<&mut DistributionFactory>,
                SliceFitStatus,
                &Histogram,
                usize,
                usize,
                usize,
            ) + 'static,
    {
        self.fit_callback = Some(Box::new(callback));
    }

    /// Remove the per-slice result handler.
    pub fn clear_fit_callback(&mut self) {
        self.fit_callback = None;
    }

    /// Replace the curve fitter.
    pub fn set_fitter(&mut self, fitter: Box<dyn CurveFitter>) {
        self.fitter = fitter;
    }

    /// Fit or integrate every slice.
    ///
    /// For each slice in `bx`, `by`, `bz` order the slice is drawn on its pad.
    /// Unless `integral_only` is set, the slice's spec is taken from
    /// `registry` (or `default_spec` renamed for the slice); disabled specs
    /// and slices below [`MIN_FIT_STATISTICS`] are annotated and skipped,
    /// the others are fitted and handed to the callback. With
    /// `integral_only` every slice goes to the callback as
    /// [`SliceFitStatus::IntegralOnly`]. The visible y range of every slice
    /// is set to `[0, 1.1 * max]`.
    pub fn fit_diff_hists(
        &mut self,
        sigfac: Option<&mut DistributionFactory>,
        registry: &FitRegistry,
        default_spec: &HistogramFitSpec,
        integral_only: bool,
    ) -> Result<FitSummary> {
        let mut callback = self.fit_callback.take();
        let result = self.scan_slices(sigfac, registry, default_spec, integral_only, &mut callback);
        self.fit_callback = callback;
        result
    }

    fn scan_slices(
        &mut self,
        mut sigfac: Option<&mut DistributionFactory>,
        registry: &FitRegistry,
        default_spec: &HistogramFitSpec,
        integral_only: bool,
        callback: &mut Option<FitCallback>,
    ) -> Result<FitSummary> {
        let mut summary = FitSummary::default();
        let Some((nx, ny, nz)) = self.mapper.as_ref().map(ExtraDimensionMapper::bins) else {
            return Ok(summary);
        };
        let (mt, mr, mb, ml) = SLICE_PAD_MARGINS;
        let margins = PadFormat::new(mt, mr, mb, ml);

        for bx in 0..nx {
            for by in 0..ny {
                for bz in 0..nz {
                    let mut note = SliceNote::None;
                    let mut status = None;
                    {
                        let fitter = &self.fitter;
                        let Some(mapper) = self.mapper.as_mut() else {
                            return Ok(summary);
                        };
                        let Some((hist, pad)) = mapper.slice_and_pad_mut(bx, by, bz) else {
                            continue;
                        };
                        nice_pad(pad, &margins);
                        hist.display_mut().show_stats = false;
                        pad.clear();
                        pad.draw_histogram(hist.name(), "");

                        if integral_only {
                            status = Some(SliceFitStatus::IntegralOnly);
                        } else {
                            let (spec, custom) = match registry.find(hist.name()) {
                                Some(spec) => (spec.clone(), true),
                                None => (default_spec.clone_for(hist.name()), false),
                            };
                            if spec.fit_disabled {
                                note = SliceNote::Disabled;
                            } else if fit_statistics(hist) < MIN_FIT_STATISTICS {
                                note = SliceNote::NoFit;
                            } else {
                                let kind = if custom { "custom" } else { "standard" };
                                log::info!("+ Fitting {} with {kind} function", hist.name());
                                let ok = match Self::fit_slice(&**fitter, hist, &spec) {
                                    Ok(ok) => ok,
                                    Err(e) => {
                                        log::warn!("Fit of {} failed: {e}", hist.name());
                                        false
                                    }
                                };
                                status = Some(if ok {
                                    SliceFitStatus::Converged
                                } else {
                                    SliceFitStatus::Failed
                                });
                            }
                        }
                    }

                    match (status, &note) {
                        (Some(SliceFitStatus::Converged), _) => summary.converged += 1,
                        (Some(SliceFitStatus::Failed), _) => summary.failed += 1,
                        (Some(SliceFitStatus::IntegralOnly), _) => summary.integral_only += 1,
                        (None, SliceNote::NoFit) => summary.no_fit += 1,
                        (None, SliceNote::Disabled) => summary.disabled += 1,
                        (None, SliceNote::None) => {}
                    }

                    if let (Some(status), Some(cb)) = (status, callback.as_mut()) {
                        let this: &Self = self;
                        if let Some(hist) = this.mapper.as_ref().and_then(|m| m.get(bx, by, bz)) {
                            cb(this, sigfac.as_deref_mut(), status, hist, bx, by, bz);
                        }
                    }

                    if let Some(mapper) = self.mapper.as_mut()
                        && let Some((hist, pad)) = mapper.slice_and_pad_mut(bx, by, bz)
                    {
                        let max = hist.maximum();
                        hist.set_y_range(0.0, max * 1.1);
                        hist.display_mut().y_ndivisions = Some(504);
                        let text = match note {
                            SliceNote::NoFit => Some("No fit"),
                            SliceNote::Disabled => Some("Fit disabled"),
                            SliceNote::None => None,
                        };
                        if let Some(text) = text {
                            pad.draw_text(TextAnnotation::new(0.65, 0.65, text).with_align(CENTER_ALIGN));
                        }
                    }
                }
            }
        }

        if let Some(sig) = sigfac.as_deref()
            && let Some(h) = sig.signal()
        {
            log::info!(
                "Signal/slice counts:  {} / {}  for {}",
                h.integral_all(),
                self.slice_counts(),
                self.ctx.base.hist_name
            );
        }
        log::debug!("Slice fits of {}: {summary:?}", self.base.name());
        Ok(summary)
    }

    fn fit_slice(
        fitter: &dyn CurveFitter,
        hist: &mut Histogram,
        spec: &HistogramFitSpec,
    ) -> Result<bool> {
        if spec.rebin > 1 {
            hist.rebin(spec.rebin)?;
        }
        let axis = hist.axis(0);
        let (lo, hi) = (axis.find_bin(spec.range.0), axis.find_bin(spec.range.1));
        if hist.integral(lo, hi) == 0.0 {
            log::debug!("{}: empty fit range, skipped", hist.name());
            return Ok(false);
        }
        hist.clear_functions();
        if !fitter.fit(hist, spec)? {
            return Ok(false);
        }
        if let Some(signal) =
            hist.functions_mut().iter_mut().find(|c| c.role == CurveRole::Signal)
        {
            signal.drawable = false;
        }
        Ok(true)
    }

    /// Fit one histogram the way [`fit_diff_hists`](Self::fit_diff_hists)
    /// fits a slice: rebin in place, skip an empty fit range, fit, and hide
    /// the signal curve.
    pub fn fit_diff_hist(&self, hist: &mut Histogram, spec: &HistogramFitSpec) -> Result<bool> {
        Self::fit_slice(&*self.fitter, hist, spec)
    }

    /// Apply pad margins and axis cosmetics to every slice.
    pub fn nice_diffs(&mut self, pad: &PadFormat, format: &GraphFormat) {
        let Some(m) = self.mapper.as_mut() else {
            return;
        };
        let (nx, ny, nz) = m.bins();
        for bz in 0..nz {
            for by in 0..ny {
                for bx in 0..nx {
                    if let Some((h, p)) = m.slice_and_pad_mut(bx, by, bz) {
                        nice_pad(p, pad);
                        nice_histogram(h, format);
                    }
                }
            }
        }
    }

    /// Annotate every slice pad: the pad number, and either the slice
    /// statistics with "No fit" or the outer bin ranges, signal parameters
    /// and fit quality.
    pub fn prepare_diff_canvas(&mut self) {
        let Some(m) = self.mapper.as_mut() else {
            return;
        };
        let x = &self.ctx.base.x;
        let y = &self.ctx.base.y;
        let dim = self.ctx.base.dim;

        for flat in 0..m.n_hists() {
            let Some((bx, by, bz)) = m.reverse_index(flat) else {
                continue;
            };
            let Some((h, pad)) = m.slice_and_pad_mut(bx, by, bz) else {
                continue;
            };
            pad.clear();
            pad.draw_histogram(h.name(), "");
            let number = match dim {
                Dimensions::Dim3 => bz,
                Dimensions::Dim2 => by,
                _ => bx,
            };
            pad.draw_text(TextAnnotation::new(0.12, 0.85, format!("{number:02}")));

            let curves = h.functions();
            if curves.len() < 3 {
                let (entries, rms) = (h.entries(), h.rms());
                pad.draw_text(TextAnnotation::new(0.55, 0.85, format!("E={entries}")));
                pad.draw_text(TextAnnotation::new(0.55, 0.80, format!("R={rms}")));
                pad.draw_text(TextAnnotation::new(0.55, 0.75, format!("E/R={}", fit_statistics(h))));
                pad.draw_text(TextAnnotation::new(0.5, 0.5, "No fit").with_align(CENTER_ALIGN));
                continue;
            }

            let (total, signal, background) = (&curves[0], &curves[1], &curves[2]);
            pad.draw_function(&background.name, "same");
            pad.draw_function(&total.name, "same");

            let margins = *pad.margins();
            let center = (1.0 - margins.right + margins.left) / 2.0;
            let (x_lo, x_hi) = (x.min + x.bin_width() * bx as f64, x.min + x.bin_width() * (bx + 1) as f64);
            let (y_lo, y_hi) = (y.min + y.bin_width() * by as f64, y.min + y.bin_width() * (by + 1) as f64);
            pad.draw_text(
                TextAnnotation::new(center, 1.01, format!("{x_lo:.2} < {} < {x_hi:.2}", x.label))
                    .with_size(0.06)
                    .with_align(CENTER_ALIGN),
            );
            if dim >= Dimensions::Dim2 {
                pad.draw_text(
                    TextAnnotation::new(center, 0.96, format!("{y_lo:.0} < {} < {y_hi:.0}", y.label))
                        .with_size(0.06)
                        .with_align(CENTER_ALIGN),
                );
            }
            for (i, (p, e)) in signal.parameters.iter().zip(&signal.errors).enumerate() {
                let text = format!("[{i}] {:>5}#pm{}", significant(*p, 6), significant(*e, 2));
                pad.draw_text(TextAnnotation::new(0.5, 0.81 - 0.05 * i as f64, text).with_size(0.06));
            }
            pad.draw_text(
                TextAnnotation::new(0.5, 0.25, format!("#chi^{{2}}/ndf = {}", total.chi2_ndf()))
                    .with_size(0.06),
            );
            pad.draw_text(
                TextAnnotation::new(0.5, 0.20, format!(" {}/{}", significant(total.chi2, 2), total.ndf))
                    .with_size(0.06),
            );
        }
    }

    /// Write the signal objects and the slices to `path` as JSON.
    pub fn write(&mut self, path: impl AsRef<Path>, verbose: bool) -> Result<()> {
        let mut groups = vec![self.base.object_group()];
        if let Some(m) = self.mapper.as_ref() {
            groups.push(persist::ObjectGroup {
                directory: m.directory(),
                histograms: m.histograms().iter().collect(),
                canvases: m.canvases().iter().collect::<Vec<&Canvas>>(),
            });
        }
        persist::write_groups(path, &groups, verbose)?;
        self.base.mark_written();
        Ok(())
    }

    /// Slice mapper; `None` for `Dim0` or before [`init`](Self::init).
    pub fn mapper(&self) -> Option<&ExtraDimensionMapper> {
        self.mapper.as_ref()
    }

    /// Mutable slice mapper.
    pub fn mapper_mut(&mut self) -> Option<&mut ExtraDimensionMapper> {
        self.mapper.as_mut()
    }

    /// Lifecycle state of the outer distribution.
    pub fn state(&self) -> FactoryState {
        self.base.state()
    }
}
