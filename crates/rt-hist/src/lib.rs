//! # rt-hist
//!
//! Binned histograms and canvases for roottools.
//!
//! Histograms follow the usual native-bin conventions: 1-based bin indices
//! with under/overflow bins, weighted fills with `sumw2` errors, in-place
//! rebinning and scaling, and a list of attached fit curves. Canvases are
//! display lists that serialize to JSON.
//!
//! ## Example
//!
//! ```
//! use rt_hist::Histogram;
//!
//! let mut h = Histogram::new_1d("h_mass", "Mass;M [MeV];Counts", 10, -5.0, 5.0).unwrap();
//! h.fill(0.1, 1.0);
//! assert_eq!(h.integral_all(), 1.0);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod axis;
pub mod canvas;
pub mod curve;
pub mod format;
pub mod histogram;
pub mod ops;

pub use axis::Axis;
pub use canvas::{Canvas, Pad, Primitive, TextAnnotation};
pub use curve::{CurveRole, FitCurve};
pub use format::{GraphFormat, PadFormat, nice_histogram, nice_pad};
pub use histogram::{DisplayAttributes, Histogram};
pub use ops::{binomial_errors, total_error};
