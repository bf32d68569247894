//! Image enhancement of the NIR band and of the red/green/blue composite.

use tracing::debug;

use openrs_common::{BandRole, ExtraParams, OpenRsError, OpenRsResult};
use raster::{Band, RasterBundle};
use renderer::{Colormap, Figure, Panel};

use crate::exposure::{adjust_gamma, adjust_log, adjust_sigmoid, equalize_adapthist, equalize_hist, mean};
use crate::params::ParamReader;
use crate::{computed, normalized_inputs, raw_inputs, Calculator, HISTOGRAM_BINS};

/// Gamma increment applied per correction round.
pub const GAMMA_STEP: f64 = 0.2;
/// Upper bound on correction rounds.
pub const GAMMA_MAX_ITERATIONS: usize = 500;

pub const DEFAULT_CLIP_LIMIT: f64 = 0.9;
const RGB_GAMMA: f64 = 0.5;
const RGB_CLIP_LIMIT: f64 = 0.08;

/// Result of [`auto_gamma`].
#[derive(Debug, Clone)]
pub struct GammaCorrection {
    pub image: Band,
    /// Gamma actually applied.
    pub gamma: f64,
    pub iterations: usize,
}

/// Apply `gain * x^gamma`, raising gamma by [`GAMMA_STEP`] while the output
/// is brighter on average than the input, for at most
/// [`GAMMA_MAX_ITERATIONS`] rounds.
pub fn auto_gamma(image: &Band, gamma: f64, gain: f64) -> GammaCorrection {
    let input_mean = mean(image);
    let mut gamma = gamma;
    let mut output = adjust_gamma(image, gamma, gain);
    let mut iterations = 0;

    while input_mean < mean(&output) && iterations < GAMMA_MAX_ITERATIONS {
        gamma += GAMMA_STEP;
        output = adjust_gamma(image, gamma, gain);
        iterations += 1;
    }

    GammaCorrection {
        image: output,
        gamma,
        iterations,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnhancementKind {
    /// Normalized NIR as-is.
    Float,
    /// Raw NIR samples.
    Original,
    Gamma,
    Sigmoid,
    LogAdjust,
    Adaptive,
    Equalize,
}

impl EnhancementKind {
    pub fn name(&self) -> &'static str {
        match self {
            EnhancementKind::Float => "float_image",
            EnhancementKind::Original => "original_image",
            EnhancementKind::Gamma => "gamma_image",
            EnhancementKind::Sigmoid => "sigmoid",
            EnhancementKind::LogAdjust => "log_adjust",
            EnhancementKind::Adaptive => "adaptive_image",
            EnhancementKind::Equalize => "equalize_image",
        }
    }
}

/// Single-band enhancement of NIR, rendered with its histogram.
#[derive(Debug)]
pub struct EnhancementCalculator {
    kind: EnhancementKind,
    nir: Band,
    output: Option<Band>,
}

impl EnhancementCalculator {
    pub fn new(kind: EnhancementKind, bundle: &RasterBundle) -> OpenRsResult<Self> {
        let mut bands = match kind {
            EnhancementKind::Original => raw_inputs(bundle, kind.name(), &[BandRole::Nir])?,
            _ => normalized_inputs(bundle, kind.name(), &[BandRole::Nir])?,
        };
        Ok(Self {
            kind,
            nir: bands.remove(0),
            output: None,
        })
    }

    pub fn output(&self) -> Option<&Band> {
        self.output.as_ref()
    }
}

impl Calculator for EnhancementCalculator {
    fn name(&self) -> &'static str {
        self.kind.name()
    }

    fn compute(&mut self, params: &ExtraParams) -> OpenRsResult<()> {
        let reader = ParamReader::new(params);
        let output = match self.kind {
            EnhancementKind::Float | EnhancementKind::Original => self.nir.clone(),
            EnhancementKind::Gamma => {
                let gamma = reader.required_f64("gamma")?;
                let gain = reader.required_f64("gain")?;
                if gamma < 0.0 {
                    return Err(OpenRsError::invalid_parameter(
                        "gamma",
                        format!("must be non-negative, got {}", gamma),
                    ));
                }
                let corrected = auto_gamma(&self.nir, gamma, gain);
                debug!(
                    requested = gamma,
                    applied = corrected.gamma,
                    iterations = corrected.iterations,
                    "Gamma corrected"
                );
                corrected.image
            }
            EnhancementKind::Sigmoid => {
                let gain = reader.required_f64("gain")?;
                let inv = reader.required_bool("inv")?;
                let cutoff = reader.required_f64("cutoff")?;
                adjust_sigmoid(&self.nir, cutoff, gain, inv)
            }
            EnhancementKind::LogAdjust => {
                let gain = reader.optional_f64("gain")?.unwrap_or(1.0);
                let inv = reader.optional_bool("inv")?.unwrap_or(false);
                adjust_log(&self.nir, gain, inv)
            }
            EnhancementKind::Adaptive => {
                let clip_limit = reader.optional_f64("clip_limit")?.unwrap_or(DEFAULT_CLIP_LIMIT);
                if clip_limit <= 0.0 || clip_limit > 1.0 {
                    return Err(OpenRsError::invalid_parameter(
                        "clip_limit",
                        format!("must be in (0, 1], got {}", clip_limit),
                    ));
                }
                equalize_adapthist(&self.nir, clip_limit, HISTOGRAM_BINS)
            }
            EnhancementKind::Equalize => equalize_hist(&self.nir, HISTOGRAM_BINS),
        };
        self.output = Some(output);
        Ok(())
    }

    fn figure(&self, title: &str) -> OpenRsResult<Figure> {
        let output = computed(&self.output, self.name())?;
        Ok(Figure::new(title, 1, 2)
            .with_panel(Panel::raster(output.clone(), Colormap::Gray))
            .with_panel(Panel::histogram(output.iter(), HISTOGRAM_BINS)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RgbEnhancementKind {
    Plain,
    Gamma,
    Adaptive,
    Equalize,
}

impl RgbEnhancementKind {
    pub fn name(&self) -> &'static str {
        match self {
            RgbEnhancementKind::Plain => "rgb_image",
            RgbEnhancementKind::Gamma => "rgb_gamma_image",
            RgbEnhancementKind::Adaptive => "rgb_adaptive_image",
            RgbEnhancementKind::Equalize => "rgb_equalize_image",
        }
    }

    fn apply(&self, band: &Band) -> Band {
        match self {
            RgbEnhancementKind::Plain => band.clone(),
            RgbEnhancementKind::Gamma => adjust_gamma(band, RGB_GAMMA, 1.0),
            RgbEnhancementKind::Adaptive => equalize_adapthist(band, RGB_CLIP_LIMIT, HISTOGRAM_BINS),
            RgbEnhancementKind::Equalize => equalize_hist(band, HISTOGRAM_BINS),
        }
    }
}

pub const RGB_BANDS: [BandRole; 3] = [BandRole::Red, BandRole::Green, BandRole::Blue];

/// True-colour composite of normalized red, green and blue, each channel
/// enhanced independently.
#[derive(Debug)]
pub struct RgbEnhancementCalculator {
    kind: RgbEnhancementKind,
    bands: Vec<Band>,
    output: Option<[Band; 3]>,
}

impl RgbEnhancementCalculator {
    pub fn new(kind: RgbEnhancementKind, bundle: &RasterBundle) -> OpenRsResult<Self> {
        let bands = normalized_inputs(bundle, kind.name(), &RGB_BANDS)?;
        Ok(Self {
            kind,
            bands,
            output: None,
        })
    }

    pub fn output(&self) -> Option<&[Band; 3]> {
        self.output.as_ref()
    }
}

impl Calculator for RgbEnhancementCalculator {
    fn name(&self) -> &'static str {
        self.kind.name()
    }

    fn compute(&mut self, _params: &ExtraParams) -> OpenRsResult<()> {
        self.output = Some([
            self.kind.apply(&self.bands[0]),
            self.kind.apply(&self.bands[1]),
            self.kind.apply(&self.bands[2]),
        ]);
        Ok(())
    }

    fn figure(&self, title: &str) -> OpenRsResult<Figure> {
        let [red, green, blue] = computed(&self.output, self.name())?;
        let stacked = red.iter().chain(green.iter()).chain(blue.iter());
        Ok(Figure::new(title, 1, 2)
            .with_panel(Panel::rgb(red.clone(), green.clone(), blue.clone()))
            .with_panel(Panel::histogram(stacked, HISTOGRAM_BINS)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use serde_json::json;
    use test_utils::{gradient_band, scene_bands};

    fn params(value: serde_json::Value) -> ExtraParams {
        value.as_object().cloned().unwrap_or_default()
    }

    fn nir_bundle() -> RasterBundle {
        RasterBundle::from_bands([(BandRole::Nir, gradient_band(8, 8, 100.0, 900.0))])
    }

    #[test]
    fn test_auto_gamma_brightening_start_is_corrected() {
        let image = gradient_band(10, 10, 0.0, 1.0);
        let corrected = auto_gamma(&image, 0.2, 1.0);
        assert!(corrected.iterations > 0);
        assert!(mean(&corrected.image) <= mean(&image));
        assert!((corrected.gamma - (0.2 + GAMMA_STEP * corrected.iterations as f64)).abs() < 1e-9);
    }

    #[test]
    fn test_auto_gamma_is_bounded() {
        // gain so large the output can never drop below the input mean
        let image = array![[0.5, 1.0]];
        let corrected = auto_gamma(&image, 1.0, 1e9);
        assert_eq!(corrected.iterations, GAMMA_MAX_ITERATIONS);
    }

    #[test]
    fn test_auto_gamma_darkening_start_untouched() {
        let image = gradient_band(4, 4, 0.0, 1.0);
        let corrected = auto_gamma(&image, 2.0, 1.0);
        assert_eq!(corrected.iterations, 0);
        assert_eq!(corrected.gamma, 2.0);
    }

    #[test]
    fn test_gamma_requires_both_params() {
        let mut calc = EnhancementCalculator::new(EnhancementKind::Gamma, &nir_bundle()).unwrap();
        let err = calc.compute(&params(json!({"gamma": 1.0}))).unwrap_err();
        assert!(matches!(err, OpenRsError::InvalidParameter { ref param, .. } if param == "gain"));
        let err = calc.compute(&params(json!({"gamma": -1.0, "gain": 1}))).unwrap_err();
        assert!(matches!(err, OpenRsError::InvalidParameter { ref param, .. } if param == "gamma"));
        calc.compute(&params(json!({"gamma": 1.0, "gain": 1}))).unwrap();
    }

    #[test]
    fn test_sigmoid_type_checks() {
        let mut calc = EnhancementCalculator::new(EnhancementKind::Sigmoid, &nir_bundle()).unwrap();
        let err = calc
            .compute(&params(json!({"gain": 10, "inv": "no", "cutoff": 0.5})))
            .unwrap_err();
        assert!(matches!(err, OpenRsError::InvalidParameter { ref param, .. } if param == "inv"));
        calc.compute(&params(json!({"gain": 10, "inv": false, "cutoff": 0.5}))).unwrap();
    }

    #[test]
    fn test_adaptive_clip_limit_range() {
        let mut calc = EnhancementCalculator::new(EnhancementKind::Adaptive, &nir_bundle()).unwrap();
        assert!(calc.compute(&params(json!({"clip_limit": 0}))).is_err());
        assert!(calc.compute(&params(json!({"clip_limit": 1.5}))).is_err());
        calc.compute(&ExtraParams::new()).unwrap();
    }

    #[test]
    fn test_original_uses_raw_samples() {
        let mut calc = EnhancementCalculator::new(EnhancementKind::Original, &nir_bundle()).unwrap();
        calc.compute(&ExtraParams::new()).unwrap();
        assert_eq!(calc.output().unwrap()[[0, 0]], 100.0);

        let mut calc = EnhancementCalculator::new(EnhancementKind::Float, &nir_bundle()).unwrap();
        calc.compute(&ExtraParams::new()).unwrap();
        assert_eq!(calc.output().unwrap()[[0, 0]], 0.0);
    }

    #[test]
    fn test_rgb_gamma_brightens() {
        let bundle = RasterBundle::from_bands(scene_bands(6, 6));
        let mut plain = RgbEnhancementCalculator::new(RgbEnhancementKind::Plain, &bundle).unwrap();
        let mut gamma = RgbEnhancementCalculator::new(RgbEnhancementKind::Gamma, &bundle).unwrap();
        plain.compute(&ExtraParams::new()).unwrap();
        gamma.compute(&ExtraParams::new()).unwrap();
        let plain_red = &plain.output().unwrap()[0];
        let gamma_red = &gamma.output().unwrap()[0];
        assert!(mean(gamma_red) > mean(plain_red));
    }
}
