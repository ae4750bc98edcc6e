//! # rt-diffana
//!
//! Differential analysis for roottools.
//!
//! A [`DistributionContext`] names a distribution and describes its axes and
//! the live [`Variable`]s they are filled from. A [`DistributionFactory`]
//! owns the N-D signal histogram of a context. A [`DifferentialFactory`]
//! adds an extra axis `V`: every outer bin gets a 1D slice of `V`, kept by an
//! [`ExtraDimensionMapper`]. After the event loop the slices are fitted (or
//! integrated) one by one and a [`FitCallback`] folds the results back into
//! an aggregate histogram.
//!
//! ## Example
//!
//! ```
//! use rt_diffana::{AxisSpec, DifferentialContext, DifferentialFactory, Dimensions, Variable};
//!
//! let (x, m) = (Variable::new(0.0), Variable::new(0.0));
//! let mut ctx = DifferentialContext::new("lambda", Dimensions::Dim1);
//! ctx.base.x = AxisSpec::new("y_{cm}", "", 4, 0.0, 4.0).with_var(&x);
//! ctx.v = AxisSpec::new("M", "MeV", 10, -5.0, 5.0).with_var(&m);
//!
//! let mut fac = DifferentialFactory::new(ctx);
//! fac.init().unwrap();
//! x.set(0.5);
//! m.set(0.1);
//! fac.proceed().unwrap();
//! assert_eq!(fac.mapper().unwrap().get(0, 0, 0).unwrap().entries(), 1.0);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod axis;
pub mod callbacks;
pub mod config;
pub mod context;
pub mod differential;
pub mod distribution;
pub mod mapper;
pub mod persist;
pub mod variable;

pub use axis::{AxisSpec, format_unit};
pub use callbacks::{slice_yield, store_yield_callback};
pub use config::find_json_file;
pub use context::{DifferentialContext, Dimensions, DistributionContext};
pub use differential::{
    DifferentialFactory, FitCallback, FitSummary, MIN_FIT_STATISTICS, SliceFitStatus,
};
pub use distribution::{DistributionFactory, FactoryState};
pub use mapper::ExtraDimensionMapper;
pub use persist::{ObjectGroup, StoredGroup, read_groups, write_groups};
pub use variable::{Variable, VariableRef};
