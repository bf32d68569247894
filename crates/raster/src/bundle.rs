//! The raster bundle and its min-max normalization.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::{debug, instrument};

use openrs_common::{BandRole, OpenRsError, OpenRsResult};

use crate::decode::load_band;
use crate::Band;

/// Dimensions recorded for a loaded band.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BandMetadata {
    pub height: usize,
    pub width: usize,
}

/// Named, optional band sources for one invocation.
#[derive(Debug, Clone, Default)]
pub struct BandSources {
    paths: BTreeMap<BandRole, PathBuf>,
}

impl BandSources {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a source for a role, replacing any previous one.
    pub fn with(mut self, role: BandRole, path: impl Into<PathBuf>) -> Self {
        self.paths.insert(role, path.into());
        self
    }

    /// Set or clear the source of a role.
    pub fn set(&mut self, role: BandRole, path: Option<PathBuf>) {
        match path {
            Some(path) => {
                self.paths.insert(role, path);
            }
            None => {
                self.paths.remove(&role);
            }
        }
    }

    pub fn get(&self, role: BandRole) -> Option<&Path> {
        self.paths.get(&role).map(PathBuf::as_path)
    }

    pub fn roles(&self) -> impl Iterator<Item = BandRole> + '_ {
        self.paths.keys().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

/// Elementwise `(x - min) / (max - min)` over the whole array.
///
/// A constant band has `max == min` and normalizes to NaN everywhere.
pub fn normalize(band: &Band) -> Band {
    let min = band.iter().copied().fold(f64::INFINITY, f64::min);
    let max = band.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let range = max - min;
    band.mapv(|x| (x - min) / range)
}

/// Loaded bands for one operation invocation.
///
/// Every present band is fully decoded; absent roles are simply not in the
/// bundle. Normalized copies are computed once at construction.
#[derive(Debug, Clone)]
pub struct RasterBundle {
    raw: BTreeMap<BandRole, Band>,
    normalized: BTreeMap<BandRole, Band>,
    metadata: BTreeMap<BandRole, BandMetadata>,
}

impl RasterBundle {
    /// Decode every present source. Absent roles stay absent.
    #[instrument(skip(sources), fields(bands = sources.paths.len()))]
    pub fn load(sources: &BandSources) -> OpenRsResult<Self> {
        let mut bands = Vec::with_capacity(sources.paths.len());
        for (role, path) in &sources.paths {
            debug!(role = %role, path = %path.display(), "Loading band");
            bands.push((*role, load_band(path)?));
        }
        Ok(Self::from_bands(bands))
    }

    /// Build a bundle from already-decoded arrays.
    pub fn from_bands(bands: impl IntoIterator<Item = (BandRole, Band)>) -> Self {
        let raw: BTreeMap<BandRole, Band> = bands.into_iter().collect();
        let normalized = raw
            .iter()
            .map(|(role, band)| (*role, normalize(band)))
            .collect();
        let metadata = raw
            .iter()
            .map(|(role, band)| {
                let (height, width) = band.dim();
                (*role, BandMetadata { height, width })
            })
            .collect();
        Self {
            raw,
            normalized,
            metadata,
        }
    }

    /// Raw samples of a band as decoded.
    pub fn band(&self, role: BandRole) -> Option<&Band> {
        self.raw.get(&role)
    }

    /// Min-max normalized samples of a band.
    pub fn normalized(&self, role: BandRole) -> Option<&Band> {
        self.normalized.get(&role)
    }

    /// Normalized arrays for every role, `None` where the role was not loaded.
    pub fn get_all_normalized(&self) -> BTreeMap<BandRole, Option<&Band>> {
        BandRole::ALL
            .iter()
            .map(|role| (*role, self.normalized.get(role)))
            .collect()
    }

    pub fn metadata(&self, role: BandRole) -> Option<BandMetadata> {
        self.metadata.get(&role).copied()
    }

    pub fn has(&self, role: BandRole) -> bool {
        self.raw.contains_key(&role)
    }

    /// Loaded spectral bands as `(role, raw array)` in wavelength order.
    pub fn spectral_bands(&self) -> Vec<(BandRole, &Band)> {
        BandRole::SPECTRAL
            .iter()
            .filter_map(|role| self.raw.get(role).map(|band| (*role, band)))
            .collect()
    }

    /// Number of loaded bands, including the generic tif.
    pub fn len(&self) -> usize {
        self.raw.len()
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    /// Check that every role is loaded and that they share one shape.
    pub fn require(&self, operation: &str, roles: &[BandRole]) -> OpenRsResult<()> {
        let missing: Vec<BandRole> = roles.iter().copied().filter(|r| !self.has(*r)).collect();
        if !missing.is_empty() {
            return Err(OpenRsError::MissingBand {
                operation: operation.to_string(),
                missing,
            });
        }
        self.check_same_shape(roles)
    }

    /// Check that the given loaded roles share one `(height, width)`.
    pub fn check_same_shape(&self, roles: &[BandRole]) -> OpenRsResult<()> {
        let mut expected: Option<BandMetadata> = None;
        for role in roles {
            let Some(meta) = self.metadata(*role) else {
                continue;
            };
            match expected {
                None => expected = Some(meta),
                Some(exp) if exp != meta => {
                    return Err(OpenRsError::ShapeMismatch {
                        role: *role,
                        height: exp.height,
                        width: exp.width,
                        found_height: meta.height,
                        found_width: meta.width,
                    })
                }
                Some(_) => {}
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_normalize_range() {
        let band = array![[1.0, 2.0], [3.0, 5.0]];
        let n = normalize(&band);
        assert_eq!(n, array![[0.0, 0.25], [0.5, 1.0]]);
    }

    #[test]
    fn test_normalize_constant_band_is_nan() {
        let band = Band::from_elem((2, 3), 7.0);
        assert!(normalize(&band).iter().all(|v| v.is_nan()));
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let band = array![[0.0, 0.2], [0.7, 1.0]];
        assert_eq!(normalize(&band), band);
    }

    #[test]
    fn test_require_reports_every_missing_role() {
        let bundle = RasterBundle::from_bands([(BandRole::Red, Band::zeros((2, 2)))]);
        match bundle.require("bi", &[BandRole::Red, BandRole::Green, BandRole::Nir]) {
            Err(OpenRsError::MissingBand { operation, missing }) => {
                assert_eq!(operation, "bi");
                assert_eq!(missing, vec![BandRole::Green, BandRole::Nir]);
            }
            other => panic!("expected MissingBand, got {:?}", other),
        }
    }

    #[test]
    fn test_require_rejects_shape_mismatch() {
        let bundle = RasterBundle::from_bands([
            (BandRole::Red, Band::zeros((2, 2))),
            (BandRole::Nir, Band::zeros((3, 2))),
        ]);
        let err = bundle.require("ndvi", &[BandRole::Red, BandRole::Nir]).unwrap_err();
        assert!(matches!(err, OpenRsError::ShapeMismatch { role: BandRole::Nir, .. }));
    }

    #[test]
    fn test_get_all_normalized_has_every_role() {
        let bundle = RasterBundle::from_bands([(BandRole::Nir, array![[1.0, 3.0]])]);
        let all = bundle.get_all_normalized();
        assert_eq!(all.len(), BandRole::ALL.len());
        assert_eq!(all[&BandRole::Nir], Some(&array![[0.0, 1.0]]));
        assert!(all[&BandRole::Red].is_none());
    }

    #[test]
    fn test_spectral_bands_skip_tif_and_keep_order() {
        let bundle = RasterBundle::from_bands([
            (BandRole::Tif, Band::zeros((1, 1))),
            (BandRole::Swir1, Band::zeros((1, 1))),
            (BandRole::Blue, Band::zeros((1, 1))),
        ]);
        let roles: Vec<BandRole> = bundle.spectral_bands().into_iter().map(|(r, _)| r).collect();
        assert_eq!(roles, vec![BandRole::Blue, BandRole::Swir1]);
    }
}
