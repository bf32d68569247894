//! The calculator family: one algorithm per operation type.
//!
//! # Lifecycle
//!
//! ```text
//! new(&RasterBundle)      required bands checked, inputs copied out
//!      │
//!      ▼
//! compute(&ExtraParams)   parameters validated, output stored
//!      │
//!      ▼
//! render(path, title)     one PNG written; NotComputed before compute
//! ```
//!
//! Variants are grouped into families that share a struct and differ by a
//! kind enum. The [`registry`] maps operation names to constructors.

pub mod clustering;
pub mod enhancement;
pub mod exposure;
pub mod filters;
pub mod hsv;
pub mod indices;
pub mod params;
pub mod pca;
pub mod registry;
pub mod spectral_profile;

use std::path::Path;

use openrs_common::{ExtraParams, OpenRsError, OpenRsResult};
use renderer::Figure;

pub use registry::{OperationEntry, OperationFamily, OperationKind, OperationRegistry};

/// Histogram resolution used by every histogram panel.
pub const HISTOGRAM_BINS: usize = 256;

/// A band-operation algorithm bound to one bundle.
pub trait Calculator: Send {
    /// Registry name of the operation.
    fn name(&self) -> &'static str;

    /// Validate parameters and compute the output. Calling it again
    /// recomputes from the same inputs.
    fn compute(&mut self, params: &ExtraParams) -> OpenRsResult<()>;

    /// Build the output figure. Fails with `NotComputed` before `compute`.
    fn figure(&self, title: &str) -> OpenRsResult<Figure>;

    /// Write the output figure as PNG to `output_path`.
    fn render(&self, output_path: &Path, title: &str) -> OpenRsResult<()> {
        self.figure(title)?.save(output_path)
    }
}

/// Borrow computed state or fail with `NotComputed`.
pub(crate) fn computed<'a, T>(state: &'a Option<T>, name: &str) -> OpenRsResult<&'a T> {
    state
        .as_ref()
        .ok_or_else(|| OpenRsError::NotComputed(name.to_string()))
}

/// Check `roles` on the bundle and copy out their normalized arrays, in order.
pub(crate) fn normalized_inputs(
    bundle: &raster::RasterBundle,
    operation: &str,
    roles: &[openrs_common::BandRole],
) -> OpenRsResult<Vec<raster::Band>> {
    bundle.require(operation, roles)?;
    roles
        .iter()
        .map(|role| {
            bundle.normalized(*role).cloned().ok_or_else(|| OpenRsError::MissingBand {
                operation: operation.to_string(),
                missing: vec![*role],
            })
        })
        .collect()
}

/// Check `roles` on the bundle and copy out their raw arrays, in order.
pub(crate) fn raw_inputs(
    bundle: &raster::RasterBundle,
    operation: &str,
    roles: &[openrs_common::BandRole],
) -> OpenRsResult<Vec<raster::Band>> {
    bundle.require(operation, roles)?;
    roles
        .iter()
        .map(|role| {
            bundle.band(*role).cloned().ok_or_else(|| OpenRsError::MissingBand {
                operation: operation.to_string(),
                missing: vec![*role],
            })
        })
        .collect()
}
