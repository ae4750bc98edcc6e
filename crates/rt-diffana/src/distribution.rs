//! Distribution factory: the N-D signal counter of one context.

use crate::context::{Dimensions, DistributionContext};
use crate::persist::{self, ObjectGroup};
use rt_core::{Error, Result};
use rt_fit::{AngularDistribution, apply_angular_distribution};
use rt_hist::{
    Axis, Canvas, GraphFormat, Histogram, PadFormat, binomial_errors, nice_histogram, nice_pad,
};
use std::path::Path;

const CANVAS_WIDTH: u32 = 800;
const CANVAS_HEIGHT: u32 = 600;
const DEFAULT_DRAW_OPTIONS: &str = "colz";

/// Lifecycle of a factory. States only move forward.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FactoryState {
    /// Built, names not resolved
    #[default]
    Constructed,
    /// Names resolved from the context
    Prepared,
    /// Histogram and canvas allocated
    Initialized,
    /// At least one fill
    Filling,
    /// Cosmetics applied
    Finalized,
    /// Persisted
    Written,
}

/// Owns the signal histogram of a [`DistributionContext`] and its canvas.
///
/// Objects are named `h_<name>` and `c_<name>` where `<name>` is the
/// context's `hist_name`, and written to the context's `dir_name`.
#[derive(Debug, Clone)]
pub struct DistributionFactory {
    /// Context the factory was built from
    pub ctx: DistributionContext,
    name: String,
    directory: String,
    signal: Option<Histogram>,
    canvas: Option<Canvas>,
    draw_opts: String,
    state: FactoryState,
}

/// Legendre models of an angular reweighting; the correction model is only
/// used when one of its coefficients is non-zero.
pub(crate) fn angular_models(
    a2: f64,
    a4: f64,
    corr_a2: f64,
    corr_a4: f64,
) -> (AngularDistribution, Option<AngularDistribution>) {
    let corr = (corr_a2 != 0.0 || corr_a4 != 0.0).then(|| AngularDistribution::new(corr_a2, corr_a4));
    (AngularDistribution::new(a2, a4), corr)
}

impl DistributionFactory {
    /// Factory for `ctx`; resolves the object and directory names.
    pub fn new(ctx: DistributionContext) -> Self {
        let mut factory = Self {
            ctx,
            name: String::new(),
            directory: String::new(),
            signal: None,
            canvas: None,
            draw_opts: DEFAULT_DRAW_OPTIONS.to_string(),
            state: FactoryState::Constructed,
        };
        factory.prepare();
        factory
    }

    fn prepare(&mut self) {
        self.ctx.update();
        self.name = self.ctx.hist_name.clone();
        self.directory = self.ctx.dir_name.clone();
        self.advance(FactoryState::Prepared);
    }

    fn advance(&mut self, to: FactoryState) {
        if to > self.state {
            self.state = to;
        }
    }

    /// Allocate the signal histogram and canvas.
    ///
    /// Fails with a configuration error when the context does not validate.
    /// Objects already allocated are kept.
    pub fn init(&mut self) -> Result<()> {
        self.ctx.validate()?;

        if self.signal.is_none() {
            let axes: Vec<Axis> = match self.ctx.dim {
                Dimensions::Dim3 => {
                    vec![self.ctx.x.to_hist_axis()?, self.ctx.y.to_hist_axis()?, self.ctx.z.to_hist_axis()?]
                }
                Dimensions::Dim2 => vec![self.ctx.x.to_hist_axis()?, self.ctx.y.to_hist_axis()?],
                Dimensions::Dim1 | Dimensions::Dim0 => vec![self.ctx.x.to_hist_axis()?],
                Dimensions::NoInit => {
                    return Err(Error::Config(format!("no dimension specified for '{}'", self.ctx.name)));
                }
            };
            let title = self.ctx.format_hist_axes(&self.ctx.title);
            self.signal = Some(Histogram::from_axes(format!("h_{}", self.name), &title, axes)?);
            log::debug!("Allocated h_{} in {}", self.name, self.directory);
        }
        if self.canvas.is_none() {
            self.canvas = Some(Canvas::new(
                format!("c_{}", self.name),
                self.ctx.title.clone(),
                CANVAS_WIDTH,
                CANVAS_HEIGHT,
            ));
        }
        self.advance(FactoryState::Initialized);
        Ok(())
    }

    /// Re-derive titles and names from the context without reallocating.
    pub fn reinit(&mut self) -> Result<()> {
        if self.signal.is_none() {
            self.init()?;
        }
        self.ctx.update();
        if let Some(h) = self.signal.as_mut() {
            h.axis_mut(0).set_title(self.ctx.x.format_string());
            h.axis_mut(1).set_title(self.ctx.y.format_string());
            h.axis_mut(2).set_title(self.ctx.z.format_string());
            h.set_title(&self.ctx.title);
        }
        if let Some(c) = self.canvas.as_mut() {
            c.set_title(self.ctx.title.clone());
        }
        let (dir, name) = (self.ctx.dir_name.clone(), self.ctx.hist_name.clone());
        self.chdir(&dir);
        self.rename(&name);
        Ok(())
    }

    /// Fill with the current values of the bound variables.
    pub fn proceed(&mut self) -> Result<()> {
        let coords = self.ctx.coordinates()?;
        let w = self.ctx.weight_value()?;
        self.fill(&coords, w)
    }

    /// Fill the signal histogram at `coords` with weight `w`.
    pub fn fill(&mut self, coords: &[f64], w: f64) -> Result<()> {
        let h = self.signal.as_mut().ok_or_else(|| not_initialized(&self.name))?;
        h.fill_n(coords, w);
        self.advance(FactoryState::Filling);
        Ok(())
    }

    /// Apply the axis titles and draw the signal histogram with `draw_opts`
    /// (the factory's draw options when `None`).
    pub fn finalize(&mut self, draw_opts: Option<&str>) -> Result<()> {
        self.prepare_canvas(draw_opts)?;
        self.advance(FactoryState::Finalized);
        Ok(())
    }

    /// See [`finalize`](Self::finalize).
    pub fn prepare_canvas(&mut self, draw_opts: Option<&str>) -> Result<()> {
        let opts = draw_opts.unwrap_or(&self.draw_opts).to_string();
        let (Some(h), Some(c)) = (self.signal.as_mut(), self.canvas.as_mut()) else {
            return Err(not_initialized(&self.name));
        };

        h.axis_mut(0).set_title(self.ctx.x.format_string());
        match self.ctx.dim {
            Dimensions::Dim0 | Dimensions::Dim1 => {
                h.axis_mut(1).set_title(self.ctx.axis_text.clone());
            }
            Dimensions::Dim2 => {
                h.axis_mut(1).set_title(self.ctx.y.format_string());
                h.axis_mut(2).set_title(self.ctx.axis_text.clone());
            }
            Dimensions::Dim3 => {
                h.axis_mut(1).set_title(self.ctx.y.format_string());
                h.axis_mut(2).set_title(self.ctx.z.format_string());
                h.set_title(&self.ctx.axis_text);
            }
            Dimensions::NoInit => {}
        }

        if let Some(pad) = c.cd(0) {
            pad.clear();
            pad.draw_histogram(h.name(), &opts);
        }
        Ok(())
    }

    /// Divide by the area `x width * y width` of the first bin.
    pub fn binnorm(&mut self) {
        if let Some(factor) = self.binnorm_factor() {
            self.scale(factor);
        }
    }

    pub(crate) fn binnorm_factor(&self) -> Option<f64> {
        let h = self.signal.as_ref()?;
        Some(1.0 / (h.axis(0).bin_width(1) * h.axis(1).bin_width(1)))
    }

    /// Multiply the signal histogram by `factor`.
    pub fn scale(&mut self, factor: f64) {
        if let Some(h) = self.signal.as_mut() {
            h.scale(factor);
        }
    }

    /// Clear the signal histogram in place.
    pub fn reset(&mut self) {
        if let Some(h) = self.signal.as_mut() {
            h.reset();
        }
    }

    /// Reweight the x columns of the signal histogram by the Legendre model
    /// `1 + a2 P2 + a4 P4`, relative to the correction model when one of
    /// `corr_a2`, `corr_a4` is non-zero.
    pub fn apply_ang_dists(&mut self, a2: f64, a4: f64, corr_a2: f64, corr_a4: f64) {
        let (dist, corr) = angular_models(a2, a4, corr_a2, corr_a4);
        if let Some(h) = self.signal.as_mut() {
            apply_angular_distribution(h, dist, corr);
        }
    }

    /// Replace the signal errors by binomial errors for the trial counts `n`.
    pub fn apply_binom_errors(&mut self, n: &Histogram) -> Result<()> {
        let h = self.signal.as_mut().ok_or_else(|| not_initialized(&self.name))?;
        binomial_errors(h, n)
    }

    /// Apply pad margins and axis cosmetics; the y title is centered.
    pub fn nice_hists(&mut self, pad: &PadFormat, format: &GraphFormat) {
        if let Some(p) = self.canvas.as_mut().and_then(|c| c.cd(0)) {
            nice_pad(p, pad);
        }
        if let Some(h) = self.signal.as_mut() {
            nice_histogram(h, &GraphFormat { center_y: true, ..*format });
        }
    }

    /// Copy the signal contents, errors and curves of `other`.
    pub fn copy_contents_from(&mut self, other: &DistributionFactory) -> Result<()> {
        let src = other.signal.as_ref().ok_or_else(|| not_initialized(&other.name))?;
        let dst = self.signal.as_mut().ok_or_else(|| not_initialized(&self.name))?;
        dst.copy_contents_from(src, true)
    }

    /// Rename the objects to `h_<name>` and `c_<name>`.
    pub fn rename(&mut self, name: &str) {
        self.name = name.to_string();
        self.ctx.hist_name = name.to_string();
        if let Some(h) = self.signal.as_mut() {
            h.set_name(format!("h_{name}"));
        }
        if let Some(c) = self.canvas.as_mut() {
            c.set_name(format!("c_{name}"));
        }
    }

    /// Move the objects to another directory.
    pub fn chdir(&mut self, directory: &str) {
        self.directory = directory.to_string();
        self.ctx.dir_name = directory.to_string();
    }

    pub(crate) fn object_group(&self) -> ObjectGroup<'_> {
        ObjectGroup {
            directory: &self.directory,
            histograms: self.signal.iter().collect(),
            canvases: self.canvas.iter().collect(),
        }
    }

    pub(crate) fn mark_written(&mut self) {
        self.advance(FactoryState::Written);
    }

    /// Write the signal histogram and canvas to `path` as JSON.
    pub fn write(&mut self, path: impl AsRef<Path>, verbose: bool) -> Result<()> {
        persist::write_groups(path, &[self.object_group()], verbose)?;
        self.mark_written();
        Ok(())
    }

    /// Object base name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Output directory.
    pub fn directory(&self) -> &str {
        &self.directory
    }

    /// Lifecycle state.
    pub fn state(&self) -> FactoryState {
        self.state
    }

    /// Signal histogram, once initialized.
    pub fn signal(&self) -> Option<&Histogram> {
        self.signal.as_ref()
    }

    /// Mutable signal histogram.
    pub fn signal_mut(&mut self) -> Option<&mut Histogram> {
        self.signal.as_mut()
    }

    /// Signal canvas, once initialized.
    pub fn canvas(&self) -> Option<&Canvas> {
        self.canvas.as_ref()
    }

    /// Draw options used by [`finalize`](Self::finalize).
    pub fn draw_options(&self) -> &str {
        &self.draw_opts
    }

    /// Set the default draw options.
    pub fn set_draw_options(&mut self, opts: &str) {
        self.draw_opts = opts.to_string();
    }
}

pub(crate) fn not_initialized(name: &str) -> Error {
    Error::Validation(format!("factory '{name}' is not initialized"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::axis::AxisSpec;
    use crate::variable::Variable;
    use approx::assert_relative_eq;
    use rt_hist::Primitive;

    struct Vars {
        x: Variable,
        y: Variable,
        w: Variable,
    }

    fn factory_2d() -> (DistributionFactory, Vars) {
        let vars = Vars { x: Variable::new(0.0), y: Variable::new(0.0), w: Variable::new(1.0) };
        let mut ctx = DistributionContext::new("Lambda", Dimensions::Dim2);
        ctx.title = "Lambda yield".into();
        ctx.diff_var_name = "N".into();
        ctx.x = AxisSpec::new("y_{cm}", "", 4, -1.0, 1.0).with_var(&vars.x);
        ctx.y = AxisSpec::new("p_{t}", "MeV/c", 5, 0.0, 500.0).with_var(&vars.y);
        ctx.bind_weight(&vars.w);
        (DistributionFactory::new(ctx), vars)
    }

    #[test]
    fn lifecycle_states() {
        let (mut f, vars) = factory_2d();
        assert_eq!(f.state(), FactoryState::Prepared);
        assert_eq!(f.name(), "Lambda");
        assert!(f.proceed().is_err());

        f.init().unwrap();
        assert_eq!(f.state(), FactoryState::Initialized);
        let h = f.signal().unwrap();
        assert_eq!(h.name(), "h_Lambda");
        assert_eq!(h.title(), "Lambda yield");
        assert_eq!(h.axis(1).title(), "p_{t} [MeV/c]");
        assert_eq!(f.canvas().unwrap().name(), "c_Lambda");
        assert_eq!(f.canvas().unwrap().size(), (800, 600));

        vars.x.set(0.1);
        vars.y.set(120.0);
        vars.w.set(2.0);
        f.proceed().unwrap();
        assert_eq!(f.state(), FactoryState::Filling);
        let h = f.signal().unwrap();
        let g = h.find_bin(0.1, 120.0, 0.0);
        assert_eq!(h.bin_content(g), 2.0);
        assert_eq!(h.bin_error(g), 2.0);

        f.finalize(None).unwrap();
        assert_eq!(f.state(), FactoryState::Finalized);
        f.reset();
        assert_eq!(f.state(), FactoryState::Finalized);
        assert_eq!(f.signal().unwrap().integral_all(), 0.0);
    }

    #[test]
    fn unbound_axis_is_a_config_error() {
        let mut ctx = DistributionContext::new("a", Dimensions::Dim1);
        ctx.x = AxisSpec::new("x", "", 4, 0.0, 4.0);
        let mut f = DistributionFactory::new(ctx);
        assert!(matches!(f.init(), Err(Error::Config(_))));
        assert!(f.signal().is_none());
    }

    #[test]
    fn dim0_fills_one_dimensional_histogram() {
        let x = Variable::new(1.5);
        let mut ctx = DistributionContext::new("plain", Dimensions::Dim0);
        ctx.x = AxisSpec::new("x", "", 4, 0.0, 4.0).with_var(&x);
        let mut f = DistributionFactory::new(ctx);
        f.init().unwrap();
        f.proceed().unwrap();
        let h = f.signal().unwrap();
        assert_eq!(h.dimension(), 1);
        assert_eq!(h.bin_content(2), 1.0);
    }

    #[test]
    fn canvas_shows_signal_with_titles() {
        let (mut f, _vars) = factory_2d();
        f.init().unwrap();
        f.finalize(Some("col,text")).unwrap();
        let h = f.signal().unwrap();
        assert_eq!(h.axis(2).title(), "d^{2}N/dy_{cm}dp_{t} [1/MeV/c]");
        let pad = f.canvas().unwrap().pad(0).unwrap();
        assert_eq!(
            pad.primitives(),
            &[Primitive::Histogram { name: "h_Lambda".into(), options: "col,text".into() }]
        );
        f.finalize(None).unwrap();
        let pad = f.canvas().unwrap().pad(0).unwrap();
        assert_eq!(pad.primitives().len(), 1);
        assert_eq!(
            pad.primitives()[0],
            Primitive::Histogram { name: "h_Lambda".into(), options: "colz".into() }
        );
    }

    #[test]
    fn binnorm_divides_by_first_bin_area() {
        let (mut f, _vars) = factory_2d();
        f.init().unwrap();
        f.fill(&[0.1, 120.0], 10.0).unwrap();
        f.binnorm();
        // x width 0.5, y width 100
        assert_relative_eq!(f.signal().unwrap().integral_all(), 10.0 / 50.0, epsilon = 1e-12);
        f.scale(50.0);
        assert_relative_eq!(f.signal().unwrap().integral_all(), 10.0, epsilon = 1e-12);
    }

    #[test]
    fn angular_reweighting_without_correction() {
        let (mut f, _vars) = factory_2d();
        f.init().unwrap();
        f.fill(&[-0.9, 50.0], 1.0).unwrap();
        f.apply_ang_dists(0.0, 0.0, 0.0, 0.0);
        // flat model integral over a column equals its width
        assert_relative_eq!(f.signal().unwrap().integral_all(), 1.0, epsilon = 1e-12);

        let (dist, corr) = angular_models(0.5, 0.0, 0.0, 0.2);
        assert_eq!(dist, AngularDistribution::new(0.5, 0.0));
        assert_eq!(corr, Some(AngularDistribution::new(0.0, 0.2)));
        assert!(angular_models(0.5, 0.1, 0.0, 0.0).1.is_none());
    }

    #[test]
    fn binomial_errors_on_signal() {
        let (mut f, _vars) = factory_2d();
        f.init().unwrap();
        let mut n = f.signal().unwrap().clone();
        let g = n.find_bin(0.1, 120.0, 0.0);
        n.set_bin_content(g, 100.0);
        f.signal_mut().unwrap().set_bin_content(g, 0.5);
        f.apply_binom_errors(&n).unwrap();
        assert_relative_eq!(f.signal().unwrap().bin_error(g), 0.05, epsilon = 1e-12);
    }

    #[test]
    fn reinit_and_rename() {
        let (mut f, _vars) = factory_2d();
        f.init().unwrap();
        f.ctx.title = "new title".into();
        f.ctx.hist_name = "L2".into();
        f.ctx.dir_name = "out".into();
        f.reinit().unwrap();
        assert_eq!(f.signal().unwrap().name(), "h_L2");
        assert_eq!(f.signal().unwrap().title(), "new title");
        assert_eq!(f.canvas().unwrap().name(), "c_L2");
        assert_eq!(f.canvas().unwrap().title(), "new title");
        assert_eq!(f.directory(), "out");
    }

    #[test]
    fn rename_is_kept_by_reinit() {
        let (mut f, _vars) = factory_2d();
        f.init().unwrap();
        f.rename("L3");
        f.chdir("elsewhere");
        f.reinit().unwrap();
        assert_eq!(f.signal().unwrap().name(), "h_L3");
        assert_eq!(f.canvas().unwrap().name(), "c_L3");
        assert_eq!(f.directory(), "elsewhere");
    }

    #[test]
    fn nice_hists_centers_y_title() {
        let (mut f, _vars) = factory_2d();
        f.init().unwrap();
        f.nice_hists(&PadFormat::new(0.05, 0.12, 0.1, 0.1), &GraphFormat::default());
        assert_eq!(f.canvas().unwrap().pad(0).unwrap().margins().right, 0.12);
        assert!(f.signal().unwrap().display().format.unwrap().center_y);
    }

    #[test]
    fn copy_and_write() {
        let (mut a, _va) = factory_2d();
        let (mut b, _vb) = factory_2d();
        a.init().unwrap();
        b.init().unwrap();
        a.fill(&[0.1, 120.0], 3.0).unwrap();
        b.copy_contents_from(&a).unwrap();
        assert_eq!(b.signal().unwrap().integral_all(), 3.0);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lambda.json");
        b.write(&path, false).unwrap();
        assert_eq!(b.state(), FactoryState::Written);
        let groups = persist::read_groups(&path).unwrap();
        assert_eq!(groups[0].directory, "Lambda");
        assert_eq!(groups[0].histograms[0].integral_all(), 3.0);
        assert_eq!(groups[0].canvases[0].name(), "c_Lambda");
    }
}
