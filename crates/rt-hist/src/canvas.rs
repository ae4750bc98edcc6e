//! Canvases as serializable display lists.
//!
//! A canvas owns a main pad (number 0) and, once divided, a grid of
//! sub-pads numbered from 1. Drawing records what would be painted; nothing
//! is rasterized.

use serde::{Deserialize, Serialize};

use crate::format::PadFormat;

/// Text placed in normalized pad coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextAnnotation {
    /// x position in `[0, 1]`
    pub x: f64,
    /// y position in `[0, 1]`
    pub y: f64,
    /// Text
    pub text: String,
    /// Text size as a fraction of the pad height
    pub size: f64,
    /// Alignment code (tens: horizontal, units: vertical)
    pub align: u8,
}

impl TextAnnotation {
    /// Left-bottom aligned text of size 0.07.
    pub fn new(x: f64, y: f64, text: impl Into<String>) -> Self {
        Self { x, y, text: text.into(), size: 0.07, align: 11 }
    }

    /// Override the text size.
    pub fn with_size(mut self, size: f64) -> Self {
        self.size = size;
        self
    }

    /// Override the alignment.
    pub fn with_align(mut self, align: u8) -> Self {
        self.align = align;
        self
    }
}

/// Something drawn on a pad.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Primitive {
    /// A histogram, by name.
    Histogram {
        /// Histogram name
        name: String,
        /// Draw options
        options: String,
    },
    /// An attached curve, by name.
    Function {
        /// Curve name
        name: String,
        /// Draw options
        options: String,
    },
    /// A text annotation.
    Text(TextAnnotation),
}

/// One drawable region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pad {
    number: usize,
    margins: PadFormat,
    primitives: Vec<Primitive>,
}

impl Pad {
    fn new(number: usize) -> Self {
        Self { number, margins: PadFormat::default(), primitives: Vec::new() }
    }

    /// Pad number (0 = canvas main pad).
    pub fn number(&self) -> usize {
        self.number
    }

    /// Pad margins.
    pub fn margins(&self) -> &PadFormat {
        &self.margins
    }

    /// Set the pad margins.
    pub fn set_margins(&mut self, margins: PadFormat) {
        self.margins = margins;
    }

    /// Record a histogram draw.
    pub fn draw_histogram(&mut self, name: &str, options: &str) {
        self.primitives.push(Primitive::Histogram { name: name.into(), options: options.into() });
    }

    /// Record a curve draw.
    pub fn draw_function(&mut self, name: &str, options: &str) {
        self.primitives.push(Primitive::Function { name: name.into(), options: options.into() });
    }

    /// Record a text annotation.
    pub fn draw_text(&mut self, text: TextAnnotation) {
        self.primitives.push(Primitive::Text(text));
    }

    /// Everything drawn so far, in draw order.
    pub fn primitives(&self) -> &[Primitive] {
        &self.primitives
    }

    /// Texts drawn so far.
    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.primitives.iter().filter_map(|p| match p {
            Primitive::Text(t) => Some(t.text.as_str()),
            _ => None,
        })
    }

    /// Remove everything drawn.
    pub fn clear(&mut self) {
        self.primitives.clear();
    }
}

/// A drawing surface, optionally subdivided into a grid of pads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Canvas {
    name: String,
    title: String,
    width: u32,
    height: u32,
    columns: usize,
    rows: usize,
    main: Pad,
    pads: Vec<Pad>,
}

impl Canvas {
    /// Undivided canvas.
    pub fn new(name: impl Into<String>, title: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            name: name.into(),
            title: title.into(),
            width,
            height,
            columns: 0,
            rows: 0,
            main: Pad::new(0),
            pads: Vec::new(),
        }
    }

    /// Canvas name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Rename the canvas.
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Canvas title.
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Set the canvas title.
    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
    }

    /// Canvas size in pixels.
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Divide into the most square grid holding at least `n` pads.
    ///
    /// Any previous subdivision is discarded.
    pub fn divide_square(&mut self, n: usize) {
        if n == 0 {
            self.columns = 0;
            self.rows = 0;
            self.pads.clear();
            return;
        }
        let mut columns = 1;
        while columns * columns < n {
            columns += 1;
        }
        let rows = n.div_ceil(columns);
        self.columns = columns;
        self.rows = rows;
        self.pads = (1..=columns * rows).map(Pad::new).collect();
    }

    /// Grid size as (columns, rows).
    pub fn grid(&self) -> (usize, usize) {
        (self.columns, self.rows)
    }

    /// Number of sub-pads.
    pub fn n_pads(&self) -> usize {
        self.pads.len()
    }

    /// Pad `n` (0 = main pad, sub-pads are 1-based).
    pub fn pad(&self, n: usize) -> Option<&Pad> {
        if n == 0 { Some(&self.main) } else { self.pads.get(n - 1) }
    }

    /// Mutable pad `n` (0 = main pad, sub-pads are 1-based).
    pub fn cd(&mut self, n: usize) -> Option<&mut Pad> {
        if n == 0 { Some(&mut self.main) } else { self.pads.get_mut(n - 1) }
    }

    /// Clear every pad.
    pub fn clear(&mut self) {
        self.main.clear();
        self.pads.iter_mut().for_each(Pad::clear);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn divide_square_grid() {
        let mut c = Canvas::new("c", "c", 800, 600);
        c.divide_square(4);
        assert_eq!(c.grid(), (2, 2));
        c.divide_square(5);
        assert_eq!(c.grid(), (3, 2));
        assert_eq!(c.n_pads(), 6);
        c.divide_square(1);
        assert_eq!(c.grid(), (1, 1));
        assert!(c.pad(1).is_some());
        assert!(c.pad(2).is_none());
    }

    #[test]
    fn pads_are_one_based() {
        let mut c = Canvas::new("c", "c", 800, 600);
        c.divide_square(3);
        c.cd(3).unwrap().draw_text(TextAnnotation::new(0.5, 0.5, "No fit"));
        assert_eq!(c.pad(3).unwrap().number(), 3);
        assert_eq!(c.pad(3).unwrap().texts().collect::<Vec<_>>(), vec!["No fit"]);
        assert_eq!(c.pad(0).unwrap().number(), 0);
        c.clear();
        assert!(c.pad(3).unwrap().primitives().is_empty());
    }
}
