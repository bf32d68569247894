//! Band-ratio spectral indices over normalized bands.
//!
//! Pixels whose denominator is exactly zero yield NaN or ±Inf; they are
//! left as-is and render as background.

use ndarray::Zip;

use openrs_common::{BandRole, ExtraParams, OpenRsResult};
use raster::{Band, RasterBundle};
use renderer::{Colormap, Figure, Panel};

use crate::{computed, normalized_inputs, Calculator};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpectralIndex {
    /// Normalized difference vegetation index.
    Ndvi,
    /// Normalized difference water index.
    Ndwi,
    /// Soil adjusted vegetation index, L = 0.5.
    Savi,
    /// Built-up index.
    Bi,
    /// Aerosol free vegetation index.
    Afvi,
    /// Urban index.
    Ui,
}

impl SpectralIndex {
    pub const ALL: [SpectralIndex; 6] = [
        SpectralIndex::Ndvi,
        SpectralIndex::Ndwi,
        SpectralIndex::Savi,
        SpectralIndex::Bi,
        SpectralIndex::Afvi,
        SpectralIndex::Ui,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            SpectralIndex::Ndvi => "ndvi",
            SpectralIndex::Ndwi => "ndwi",
            SpectralIndex::Savi => "savi",
            SpectralIndex::Bi => "bi",
            SpectralIndex::Afvi => "afvi",
            SpectralIndex::Ui => "ui",
        }
    }

    /// Input bands, in the order [`SpectralIndex::evaluate`] expects them.
    pub fn required_bands(&self) -> &'static [BandRole] {
        match self {
            SpectralIndex::Ndvi | SpectralIndex::Savi => &[BandRole::Red, BandRole::Nir],
            SpectralIndex::Ndwi => &[BandRole::Green, BandRole::Nir],
            SpectralIndex::Bi => &[BandRole::Red, BandRole::Green, BandRole::Nir],
            SpectralIndex::Afvi => &[BandRole::Nir, BandRole::Swir1],
            SpectralIndex::Ui => &[BandRole::Nir, BandRole::Swir2],
        }
    }

    /// Apply the index formula to same-shaped inputs.
    pub fn evaluate(&self, bands: &[Band]) -> Band {
        match self {
            SpectralIndex::Ndvi => {
                Zip::from(&bands[0])
                    .and(&bands[1])
                    .map_collect(|&red, &nir| (nir - red) / (nir + red))
            }
            SpectralIndex::Ndwi => {
                Zip::from(&bands[0])
                    .and(&bands[1])
                    .map_collect(|&green, &nir| (green - nir) / (green + nir))
            }
            SpectralIndex::Savi => {
                Zip::from(&bands[0])
                    .and(&bands[1])
                    .map_collect(|&red, &nir| 1.5 * (nir - red) / (nir + red + 0.5))
            }
            SpectralIndex::Bi => Zip::from(&bands[0])
                .and(&bands[1])
                .and(&bands[2])
                .map_collect(|&red, &green, &nir| ((nir - green) - red) / ((nir + green) + red)),
            SpectralIndex::Afvi => {
                Zip::from(&bands[0])
                    .and(&bands[1])
                    .map_collect(|&nir, &swir1| (nir - 0.66) * (swir1 / (nir + 0.66 * swir1)))
            }
            SpectralIndex::Ui => {
                Zip::from(&bands[0])
                    .and(&bands[1])
                    .map_collect(|&nir, &swir2| (swir2 - nir) / (nir + swir2))
            }
        }
    }
}

/// Computes one [`SpectralIndex`] and renders it in grayscale with a colorbar.
#[derive(Debug)]
pub struct IndexCalculator {
    index: SpectralIndex,
    bands: Vec<Band>,
    output: Option<Band>,
}

impl IndexCalculator {
    pub fn new(index: SpectralIndex, bundle: &RasterBundle) -> OpenRsResult<Self> {
        let bands = normalized_inputs(bundle, index.name(), index.required_bands())?;
        Ok(Self {
            index,
            bands,
            output: None,
        })
    }

    pub fn output(&self) -> Option<&Band> {
        self.output.as_ref()
    }
}

impl Calculator for IndexCalculator {
    fn name(&self) -> &'static str {
        self.index.name()
    }

    fn compute(&mut self, _params: &ExtraParams) -> OpenRsResult<()> {
        self.output = Some(self.index.evaluate(&self.bands));
        Ok(())
    }

    fn figure(&self, title: &str) -> OpenRsResult<Figure> {
        let output = computed(&self.output, self.name())?;
        Ok(Figure::single(
            title,
            Panel::raster_with_colorbar(output.clone(), Colormap::Gray),
        ))
    }
}
