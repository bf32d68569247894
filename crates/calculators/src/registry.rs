//! Static operation registry: wire names to calculator constructors.
//!
//! Built once at startup and shared read-only. Lookups are exact and
//! case-sensitive; the two legacy misspellings clients still send are
//! kept as aliases.

use std::collections::BTreeMap;
use std::fmt;

use openrs_common::{BandRole, OpenRsError, OpenRsResult};
use raster::RasterBundle;

use crate::clustering::ClusteringCalculator;
use crate::enhancement::{
    EnhancementCalculator, EnhancementKind, RgbEnhancementCalculator, RgbEnhancementKind,
    RGB_BANDS,
};
use crate::filters::{FilterCalculator, FilterKind};
use crate::hsv::{operation_name, HsvCalculator, HsvChannel, HsvSource};
use crate::indices::{IndexCalculator, SpectralIndex};
use crate::pca::PcaCalculator;
use crate::spectral_profile::{SpectralProfileCalculator, REQUIRED_BANDS as PROFILE_BANDS};
use crate::Calculator;

/// Grouping of operations sharing one calculator implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationFamily {
    Index,
    Hsv,
    Clustering,
    Pca,
    SpectralProfile,
    Enhancement,
    RgbEnhancement,
    Filter,
}

impl OperationFamily {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Index => "index",
            Self::Hsv => "hsv",
            Self::Clustering => "clustering",
            Self::Pca => "pca",
            Self::SpectralProfile => "spectral_profile",
            Self::Enhancement => "enhancement",
            Self::RgbEnhancement => "rgb_enhancement",
            Self::Filter => "filter",
        }
    }
}

impl fmt::Display for OperationFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The concrete calculator an entry builds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Index(SpectralIndex),
    Hsv(HsvSource, HsvChannel),
    Clustering,
    Pca,
    SpectralProfile,
    Enhancement(EnhancementKind),
    RgbEnhancement(RgbEnhancementKind),
    Filter(FilterKind),
}

impl OperationKind {
    pub fn family(&self) -> OperationFamily {
        match self {
            Self::Index(_) => OperationFamily::Index,
            Self::Hsv(..) => OperationFamily::Hsv,
            Self::Clustering => OperationFamily::Clustering,
            Self::Pca => OperationFamily::Pca,
            Self::SpectralProfile => OperationFamily::SpectralProfile,
            Self::Enhancement(_) => OperationFamily::Enhancement,
            Self::RgbEnhancement(_) => OperationFamily::RgbEnhancement,
            Self::Filter(_) => OperationFamily::Filter,
        }
    }

    /// Canonical wire name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Index(index) => index.name(),
            Self::Hsv(source, channel) => operation_name(*source, *channel),
            Self::Clustering => ClusteringCalculator::NAME,
            Self::Pca => PcaCalculator::NAME,
            Self::SpectralProfile => SpectralProfileCalculator::NAME,
            Self::Enhancement(kind) => kind.name(),
            Self::RgbEnhancement(kind) => kind.name(),
            Self::Filter(kind) => kind.name(),
        }
    }

    pub fn required_bands(&self) -> &'static [BandRole] {
        match self {
            Self::Index(index) => index.required_bands(),
            Self::Hsv(source, _) => source.bands(),
            Self::Pca => &BandRole::SPECTRAL,
            Self::SpectralProfile => &PROFILE_BANDS,
            Self::RgbEnhancement(_) => &RGB_BANDS,
            Self::Clustering | Self::Enhancement(_) | Self::Filter(_) => &[BandRole::Nir],
        }
    }

    /// Construct the calculator. Fails with `MissingBand` before any numeric work.
    pub fn build(&self, bundle: &RasterBundle) -> OpenRsResult<Box<dyn Calculator>> {
        let calculator: Box<dyn Calculator> = match *self {
            Self::Index(index) => Box::new(IndexCalculator::new(index, bundle)?),
            Self::Hsv(source, channel) => Box::new(HsvCalculator::new(source, channel, bundle)?),
            Self::Clustering => Box::new(ClusteringCalculator::new(bundle)?),
            Self::Pca => Box::new(PcaCalculator::new(bundle)?),
            Self::SpectralProfile => Box::new(SpectralProfileCalculator::new(bundle)?),
            Self::Enhancement(kind) => Box::new(EnhancementCalculator::new(kind, bundle)?),
            Self::RgbEnhancement(kind) => Box::new(RgbEnhancementCalculator::new(kind, bundle)?),
            Self::Filter(kind) => Box::new(FilterCalculator::new(kind, bundle)?),
        };
        Ok(calculator)
    }
}

/// One registry key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperationEntry {
    /// Key as sent by clients. Differs from `kind.name()` for aliases.
    pub name: &'static str,
    pub kind: OperationKind,
}

impl OperationEntry {
    pub fn family(&self) -> OperationFamily {
        self.kind.family()
    }

    pub fn required_bands(&self) -> &'static [BandRole] {
        self.kind.required_bands()
    }

    pub fn is_alias(&self) -> bool {
        self.name != self.kind.name()
    }

    pub fn build(&self, bundle: &RasterBundle) -> OpenRsResult<Box<dyn Calculator>> {
        self.kind.build(bundle)
    }
}

const HSV_CHANNELS: [HsvChannel; 4] = [
    HsvChannel::Full,
    HsvChannel::Hue,
    HsvChannel::Saturation,
    HsvChannel::Value,
];

const ALIASES: [(&str, OperationKind); 2] = [
    ("orginal_image", OperationKind::Enhancement(EnhancementKind::Original)),
    ("sigmodid", OperationKind::Enhancement(EnhancementKind::Sigmoid)),
];

/// Immutable name -> operation map.
#[derive(Debug, Clone)]
pub struct OperationRegistry {
    entries: BTreeMap<&'static str, OperationEntry>,
}

impl OperationRegistry {
    /// Every operation openrs ships, plus the legacy aliases.
    pub fn standard() -> Self {
        let mut kinds: Vec<OperationKind> = SpectralIndex::ALL.iter().map(|i| OperationKind::Index(*i)).collect();
        for source in [HsvSource::Visible, HsvSource::Infrared] {
            kinds.extend(HSV_CHANNELS.iter().map(|c| OperationKind::Hsv(source, *c)));
        }
        kinds.extend([
            OperationKind::Clustering,
            OperationKind::Pca,
            OperationKind::SpectralProfile,
        ]);
        kinds.extend(
            [
                EnhancementKind::Float,
                EnhancementKind::Original,
                EnhancementKind::Gamma,
                EnhancementKind::Sigmoid,
                EnhancementKind::LogAdjust,
                EnhancementKind::Adaptive,
                EnhancementKind::Equalize,
            ]
            .map(OperationKind::Enhancement),
        );
        kinds.extend(
            [
                RgbEnhancementKind::Plain,
                RgbEnhancementKind::Gamma,
                RgbEnhancementKind::Adaptive,
                RgbEnhancementKind::Equalize,
            ]
            .map(OperationKind::RgbEnhancement),
        );
        kinds.extend(
            [
                FilterKind::Mean,
                FilterKind::Median,
                FilterKind::Gaussian,
                FilterKind::Laplacian,
                FilterKind::Sobel,
            ]
            .map(OperationKind::Filter),
        );

        let mut registry = Self::empty();
        for kind in kinds {
            registry.register(kind.name(), kind);
        }
        for (name, kind) in ALIASES {
            registry.register(name, kind);
        }
        registry
    }

    pub fn empty() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Add or replace a key.
    pub fn register(&mut self, name: &'static str, kind: OperationKind) {
        self.entries.insert(name, OperationEntry { name, kind });
    }

    pub fn get(&self, name: &str) -> Option<&OperationEntry> {
        self.entries.get(name)
    }

    /// Look up a key, failing with `UnknownOperation` listing the valid keys.
    pub fn lookup(&self, name: &str) -> OpenRsResult<&OperationEntry> {
        self.get(name).ok_or_else(|| OpenRsError::UnknownOperation {
            operation: name.to_string(),
            valid: self.names().into_iter().map(String::from).collect(),
        })
    }

    /// Every key, aliases included, sorted.
    pub fn names(&self) -> Vec<&'static str> {
        self.entries.keys().copied().collect()
    }

    pub fn entries(&self) -> impl Iterator<Item = &OperationEntry> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for OperationRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_registry_size() {
        let registry = OperationRegistry::standard();
        // 33 operations plus two aliases
        assert_eq!(registry.len(), 35);
        assert_eq!(registry.entries().filter(|e| e.is_alias()).count(), 2);
    }

    #[test]
    fn test_aliases_resolve_to_same_kind() {
        let registry = OperationRegistry::standard();
        assert_eq!(
            registry.get("orginal_image").map(|e| e.kind),
            registry.get("original_image").map(|e| e.kind)
        );
        assert_eq!(
            registry.get("sigmodid").map(|e| e.kind),
            registry.get("sigmoid").map(|e| e.kind)
        );
    }

    #[test]
    fn test_lookup_unknown_lists_valid_names() {
        let registry = OperationRegistry::standard();
        match registry.lookup("unknown_xyz") {
            Err(OpenRsError::UnknownOperation { operation, valid }) => {
                assert_eq!(operation, "unknown_xyz");
                assert!(valid.iter().any(|v| v == "ndvi"));
                assert_eq!(valid.len(), registry.len());
            }
            other => panic!("expected UnknownOperation, got {:?}", other.map(|e| e.name)),
        }
    }

    #[test]
    fn test_lookup_is_case_sensitive() {
        assert!(OperationRegistry::standard().get("NDVI").is_none());
    }

    #[test]
    fn test_names_are_sorted() {
        let names = OperationRegistry::standard().names();
        let mut sorted = names.clone();
        sorted.sort_unstable();
        assert_eq!(names, sorted);
    }

    #[test]
    fn test_family_grouping() {
        let registry = OperationRegistry::standard();
        let family = |name: &str| registry.get(name).map(|e| e.family());
        assert_eq!(family("savi"), Some(OperationFamily::Index));
        assert_eq!(family("valueirhsv"), Some(OperationFamily::Hsv));
        assert_eq!(family("rgb_gamma_image"), Some(OperationFamily::RgbEnhancement));
        assert_eq!(family("sobel"), Some(OperationFamily::Filter));
    }
}
