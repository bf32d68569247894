//! Semantic band roles and the per-request band file-id mapping.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::project::FileId;

/// Semantic role of a single-band raster within a bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BandRole {
    Blue,
    Green,
    Red,
    Nir,
    Swir1,
    Swir2,
    /// Generic single-band GeoTIFF, not part of the spectral set.
    Tif,
}

impl BandRole {
    /// Spectral roles in increasing wavelength order.
    pub const SPECTRAL: [BandRole; 6] = [
        BandRole::Blue,
        BandRole::Green,
        BandRole::Red,
        BandRole::Nir,
        BandRole::Swir1,
        BandRole::Swir2,
    ];

    /// Every role a bundle can hold.
    pub const ALL: [BandRole; 7] = [
        BandRole::Blue,
        BandRole::Green,
        BandRole::Red,
        BandRole::Nir,
        BandRole::Swir1,
        BandRole::Swir2,
        BandRole::Tif,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BandRole::Blue => "blue",
            BandRole::Green => "green",
            BandRole::Red => "red",
            BandRole::Nir => "nir",
            BandRole::Swir1 => "swir1",
            BandRole::Swir2 => "swir2",
            BandRole::Tif => "tif_file",
        }
    }

    /// Parse a role name (case-insensitive, accepts the `_band` suffix used by clients).
    pub fn parse(s: &str) -> Option<Self> {
        let lower = s.to_lowercase();
        let name = lower.strip_suffix("_band").unwrap_or(&lower);
        match name {
            "blue" => Some(BandRole::Blue),
            "green" => Some(BandRole::Green),
            "red" => Some(BandRole::Red),
            "nir" => Some(BandRole::Nir),
            "swir1" => Some(BandRole::Swir1),
            "swir2" => Some(BandRole::Swir2),
            "tif" | "tif_file" => Some(BandRole::Tif),
            _ => None,
        }
    }

    pub fn is_spectral(&self) -> bool {
        !matches!(self, BandRole::Tif)
    }
}

impl fmt::Display for BandRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Band file ids supplied with an operation request. All optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BandFileIds {
    #[serde(default, alias = "red_band")]
    pub red: Option<FileId>,
    #[serde(default, alias = "green_band")]
    pub green: Option<FileId>,
    #[serde(default, alias = "blue_band")]
    pub blue: Option<FileId>,
    #[serde(default, alias = "nir_band")]
    pub nir: Option<FileId>,
    #[serde(default, alias = "swir1_band")]
    pub swir1: Option<FileId>,
    #[serde(default, alias = "swir2_band")]
    pub swir2: Option<FileId>,
}

impl BandFileIds {
    pub fn get(&self, role: BandRole) -> Option<FileId> {
        match role {
            BandRole::Blue => self.blue,
            BandRole::Green => self.green,
            BandRole::Red => self.red,
            BandRole::Nir => self.nir,
            BandRole::Swir1 => self.swir1,
            BandRole::Swir2 => self.swir2,
            BandRole::Tif => None,
        }
    }

    pub fn set(&mut self, role: BandRole, id: Option<FileId>) {
        match role {
            BandRole::Blue => self.blue = id,
            BandRole::Green => self.green = id,
            BandRole::Red => self.red = id,
            BandRole::Nir => self.nir = id,
            BandRole::Swir1 => self.swir1 = id,
            BandRole::Swir2 => self.swir2 = id,
            BandRole::Tif => {}
        }
    }

    /// Present `(role, id)` pairs in wavelength order.
    pub fn present(&self) -> Vec<(BandRole, FileId)> {
        BandRole::SPECTRAL
            .iter()
            .filter_map(|role| self.get(*role).map(|id| (*role, id)))
            .collect()
    }
}
