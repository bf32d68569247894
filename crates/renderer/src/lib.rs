//! Figure rendering for band-operation outputs.
//!
//! Implements the panel types the calculators draw with:
//! - Scalar rasters through a colour map, optionally with a colorbar
//! - RGB composites
//! - Density histograms
//! - Labelled line plots
//!
//! Titles and panel captions are drawn on the canvas with an embedded
//! font. The in-crate PNG writer also stores them as text chunks.

pub mod colormap;
pub mod figure;
pub mod png;

pub use colormap::{interpolate_color, Color, Colormap};
pub use figure::{Figure, Histogram, Panel};
