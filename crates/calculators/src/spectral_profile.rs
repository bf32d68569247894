//! Mean intensity per spectral band, plotted in wavelength order.

use openrs_common::{BandRole, ExtraParams, OpenRsResult};
use raster::{Band, RasterBundle};
use renderer::{Colormap, Figure, Panel};

use crate::exposure::{adjust_log, mean};
use crate::{computed, raw_inputs, Calculator};

pub const REQUIRED_BANDS: [BandRole; 5] = [
    BandRole::Blue,
    BandRole::Green,
    BandRole::Red,
    BandRole::Nir,
    BandRole::Swir1,
];

#[derive(Debug, Clone, PartialEq)]
pub struct SpectralProfile {
    /// `(band, mean)` for every loaded spectral band, in wavelength order.
    pub means: Vec<(BandRole, f64)>,
    /// Log-adjusted swir1, shown next to the profile.
    pub swir1_log: Band,
}

#[derive(Debug)]
pub struct SpectralProfileCalculator {
    bands: Vec<(BandRole, Band)>,
    swir1: Band,
    output: Option<SpectralProfile>,
}

impl SpectralProfileCalculator {
    pub const NAME: &'static str = "spectral_profile";

    pub fn new(bundle: &RasterBundle) -> OpenRsResult<Self> {
        let required = raw_inputs(bundle, Self::NAME, &REQUIRED_BANDS)?;
        let swir1 = required[REQUIRED_BANDS.len() - 1].clone();
        let bands = bundle
            .spectral_bands()
            .into_iter()
            .map(|(role, band)| (role, band.clone()))
            .collect();
        Ok(Self {
            bands,
            swir1,
            output: None,
        })
    }

    pub fn output(&self) -> Option<&SpectralProfile> {
        self.output.as_ref()
    }
}

impl Calculator for SpectralProfileCalculator {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn compute(&mut self, _params: &ExtraParams) -> OpenRsResult<()> {
        let means = self.bands.iter().map(|(role, band)| (*role, mean(band))).collect();
        self.output = Some(SpectralProfile {
            means,
            swir1_log: adjust_log(&self.swir1, 1.0, false),
        });
        Ok(())
    }

    fn figure(&self, title: &str) -> OpenRsResult<Figure> {
        let profile = computed(&self.output, self.name())?;
        let points = profile
            .means
            .iter()
            .map(|(role, value)| (role.to_string(), *value))
            .collect();
        Ok(Figure::new(title, 1, 2)
            .with_panel(Panel::line(points))
            .with_panel(Panel::raster(profile.swir1_log.clone(), Colormap::Gray)))
    }
}
