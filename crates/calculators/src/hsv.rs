//! HSV transforms of a three-band false-colour stack.

use ndarray::Zip;

use openrs_common::{BandRole, ExtraParams, OpenRsResult};
use raster::{Band, RasterBundle};
use renderer::{Colormap, Figure, Panel};

use crate::{computed, normalized_inputs, Calculator};

/// Convert one pixel. Hue is in `[0, 1)`; on ties blue beats green beats red.
pub fn pixel_to_hsv(r: f64, g: f64, b: f64) -> (f64, f64, f64) {
    if r.is_nan() || g.is_nan() || b.is_nan() {
        return (f64::NAN, f64::NAN, f64::NAN);
    }
    let value = r.max(g).max(b);
    let delta = value - r.min(g).min(b);
    if delta == 0.0 {
        return (0.0, 0.0, value);
    }

    let saturation = delta / value;
    let sector = if b == value {
        4.0 + (r - g) / delta
    } else if g == value {
        2.0 + (b - r) / delta
    } else {
        (g - b) / delta
    };
    ((sector / 6.0).rem_euclid(1.0), saturation, value)
}

/// Elementwise RGB to `[hue, saturation, value]`.
pub fn rgb_to_hsv(red: &Band, green: &Band, blue: &Band) -> [Band; 3] {
    let mut hue = Band::zeros(red.raw_dim());
    let mut saturation = Band::zeros(red.raw_dim());
    let mut value = Band::zeros(red.raw_dim());
    Zip::from(&mut hue)
        .and(&mut saturation)
        .and(&mut value)
        .and(red)
        .and(green)
        .and(blue)
        .for_each(|h, s, v, &r, &g, &b| {
            let (hh, ss, vv) = pixel_to_hsv(r, g, b);
            *h = hh;
            *s = ss;
            *v = vv;
        });
    [hue, saturation, value]
}

/// Which bands stand in for red, green and blue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HsvSource {
    /// NIR, green, blue.
    Visible,
    /// SWIR2, SWIR1, red.
    Infrared,
}

impl HsvSource {
    pub fn bands(&self) -> &'static [BandRole] {
        match self {
            HsvSource::Visible => &[BandRole::Nir, BandRole::Green, BandRole::Blue],
            HsvSource::Infrared => &[BandRole::Swir2, BandRole::Swir1, BandRole::Red],
        }
    }
}

/// Which part of the transform is exposed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HsvChannel {
    Full,
    Hue,
    Saturation,
    Value,
}

impl HsvChannel {
    fn index(&self) -> Option<usize> {
        match self {
            HsvChannel::Full => None,
            HsvChannel::Hue => Some(0),
            HsvChannel::Saturation => Some(1),
            HsvChannel::Value => Some(2),
        }
    }
}

pub fn operation_name(source: HsvSource, channel: HsvChannel) -> &'static str {
    match (source, channel) {
        (HsvSource::Visible, HsvChannel::Full) => "hsv",
        (HsvSource::Visible, HsvChannel::Hue) => "hue",
        (HsvSource::Visible, HsvChannel::Saturation) => "saturation",
        (HsvSource::Visible, HsvChannel::Value) => "valuehsv",
        (HsvSource::Infrared, HsvChannel::Full) => "irhsv",
        (HsvSource::Infrared, HsvChannel::Hue) => "irhue",
        (HsvSource::Infrared, HsvChannel::Saturation) => "irsaturation",
        (HsvSource::Infrared, HsvChannel::Value) => "valueirhsv",
    }
}

#[derive(Debug)]
pub struct HsvCalculator {
    source: HsvSource,
    channel: HsvChannel,
    bands: Vec<Band>,
    output: Option<[Band; 3]>,
}

impl HsvCalculator {
    pub fn new(source: HsvSource, channel: HsvChannel, bundle: &RasterBundle) -> OpenRsResult<Self> {
        let bands = normalized_inputs(bundle, operation_name(source, channel), source.bands())?;
        Ok(Self {
            source,
            channel,
            bands,
            output: None,
        })
    }

    /// The full HSV stack, once computed.
    pub fn hsv(&self) -> Option<&[Band; 3]> {
        self.output.as_ref()
    }
}

impl Calculator for HsvCalculator {
    fn name(&self) -> &'static str {
        operation_name(self.source, self.channel)
    }

    fn compute(&mut self, _params: &ExtraParams) -> OpenRsResult<()> {
        self.output = Some(rgb_to_hsv(&self.bands[0], &self.bands[1], &self.bands[2]));
        Ok(())
    }

    fn figure(&self, title: &str) -> OpenRsResult<Figure> {
        let [hue, saturation, value] = computed(&self.output, self.name())?;
        let panel = match self.channel.index() {
            None => Panel::rgb(hue.clone(), saturation.clone(), value.clone()),
            Some(i) => Panel::raster_with_colorbar([hue, saturation, value][i].clone(), Colormap::Viridis),
        };
        Ok(Figure::single(title, panel))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primary_colours() {
        assert_eq!(pixel_to_hsv(1.0, 0.0, 0.0), (0.0, 1.0, 1.0));
        let (h, _, _) = pixel_to_hsv(0.0, 1.0, 0.0);
        assert!((h - 1.0 / 3.0).abs() < 1e-12);
        let (h, _, _) = pixel_to_hsv(0.0, 0.0, 1.0);
        assert!((h - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_gray_has_no_hue_or_saturation() {
        assert_eq!(pixel_to_hsv(0.4, 0.4, 0.4), (0.0, 0.0, 0.4));
        assert_eq!(pixel_to_hsv(0.0, 0.0, 0.0), (0.0, 0.0, 0.0));
    }

    #[test]
    fn test_negative_sector_wraps() {
        // red max, blue above green: hue just below 1
        let (h, s, v) = pixel_to_hsv(1.0, 0.0, 0.5);
        assert!((h - (1.0 - 0.5 / 6.0)).abs() < 1e-12);
        assert_eq!(s, 1.0);
        assert_eq!(v, 1.0);
    }

    #[test]
    fn test_names() {
        assert_eq!(operation_name(HsvSource::Infrared, HsvChannel::Value), "valueirhsv");
        assert_eq!(operation_name(HsvSource::Visible, HsvChannel::Saturation), "saturation");
    }
}
