//! Raster bundle: the in-memory band set for one operation invocation.
//!
//! # Architecture
//!
//! ```text
//! BandSources (role -> Option<path>)
//!      │
//!      ▼
//! RasterBundle::load()
//!      │
//!      ├─► decode each present path (TIFF via `tiff`, others via `image`)
//!      │
//!      ├─► record metadata (height, width) per band
//!      │
//!      └─► normalize every band once (min-max)
//!               │
//!               ▼
//!          calculators read raw or normalized arrays
//! ```
//!
//! A bundle is built once per invocation and never mutated afterwards.

pub mod bundle;
pub mod decode;

pub use bundle::{normalize, BandMetadata, BandSources, RasterBundle};
pub use decode::load_band;

/// 2-D raster of floating-point samples (rows x columns).
pub type Band = ndarray::Array2<f64>;
