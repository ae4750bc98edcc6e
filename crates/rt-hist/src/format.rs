//! Pad and histogram cosmetics passed explicitly to the drawing helpers.

use serde::{Deserialize, Serialize};

use crate::canvas::Pad;
use crate::histogram::Histogram;

/// Pad margins as fractions of the pad size.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PadFormat {
    /// Top margin
    pub top: f64,
    /// Right margin
    pub right: f64,
    /// Bottom margin
    pub bottom: f64,
    /// Left margin
    pub left: f64,
}

impl PadFormat {
    /// Margins in top, right, bottom, left order.
    pub fn new(top: f64, right: f64, bottom: f64, left: f64) -> Self {
        Self { top, right, bottom, left }
    }
}

impl Default for PadFormat {
    fn default() -> Self {
        Self::new(0.1, 0.1, 0.1, 0.1)
    }
}

/// Axis divisions, label/title sizes and title offsets of a histogram.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GraphFormat {
    /// x-axis divisions
    pub ndivx: i32,
    /// y-axis divisions
    pub ndivy: i32,
    /// x label size
    pub x_label_size: f64,
    /// x label offset
    pub x_label_offset: f64,
    /// x title size
    pub x_title_size: f64,
    /// x title offset
    pub x_title_offset: f64,
    /// y label size
    pub y_label_size: f64,
    /// y label offset
    pub y_label_offset: f64,
    /// y title size
    pub y_title_size: f64,
    /// y title offset
    pub y_title_offset: f64,
    /// Center the x title
    pub center_x: bool,
    /// Center the y title
    pub center_y: bool,
}

impl Default for GraphFormat {
    fn default() -> Self {
        Self {
            ndivx: 505,
            ndivy: 505,
            x_label_size: 0.05,
            x_label_offset: 0.005,
            x_title_size: 0.05,
            x_title_offset: 1.0,
            y_label_size: 0.05,
            y_label_offset: 0.005,
            y_title_size: 0.05,
            y_title_offset: 1.0,
            center_x: false,
            center_y: false,
        }
    }
}

/// Apply margins to a pad.
pub fn nice_pad(pad: &mut Pad, format: &PadFormat) {
    pad.set_margins(*format);
}

/// Apply axis cosmetics to a histogram.
pub fn nice_histogram(hist: &mut Histogram, format: &GraphFormat) {
    hist.display_mut().format = Some(*format);
}
