//! Colour maps for rendering scalar rasters.

use image::Rgba;

/// Color value in RGBA format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub const fn opaque(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub const fn transparent() -> Self {
        Self { r: 0, g: 0, b: 0, a: 0 }
    }

    pub fn to_rgba(self) -> Rgba<u8> {
        Rgba([self.r, self.g, self.b, self.a])
    }
}

pub const WHITE: Color = Color::opaque(255, 255, 255);
pub const BLACK: Color = Color::opaque(0, 0, 0);

/// Linear color interpolation
pub fn interpolate_color(color1: Color, color2: Color, t: f64) -> Color {
    let t = t.clamp(0.0, 1.0);
    let t_inv = 1.0 - t;

    Color::new(
        ((color1.r as f64 * t_inv) + (color2.r as f64 * t)).round() as u8,
        ((color1.g as f64 * t_inv) + (color2.g as f64 * t)).round() as u8,
        ((color1.b as f64 * t_inv) + (color2.b as f64 * t)).round() as u8,
        ((color1.a as f64 * t_inv) + (color2.a as f64 * t)).round() as u8,
    )
}

const GRAY_STOPS: [(f64, Color); 2] = [(0.0, BLACK), (1.0, WHITE)];

// Sampled from matplotlib's viridis at ninths.
const VIRIDIS_STOPS: [(f64, Color); 9] = [
    (0.0, Color::opaque(68, 1, 84)),
    (0.125, Color::opaque(71, 44, 122)),
    (0.25, Color::opaque(59, 81, 139)),
    (0.375, Color::opaque(44, 113, 142)),
    (0.5, Color::opaque(33, 144, 141)),
    (0.625, Color::opaque(39, 173, 129)),
    (0.75, Color::opaque(92, 200, 99)),
    (0.875, Color::opaque(170, 220, 50)),
    (1.0, Color::opaque(253, 231, 37)),
];

/// Named colour map applied to values scaled to `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Colormap {
    Gray,
    Viridis,
}

impl Colormap {
    fn stops(&self) -> &'static [(f64, Color)] {
        match self {
            Colormap::Gray => &GRAY_STOPS,
            Colormap::Viridis => &VIRIDIS_STOPS,
        }
    }

    /// Colour for a scaled value. Values outside `[0, 1]` are clamped.
    pub fn color(&self, t: f64) -> Color {
        let stops = self.stops();
        let t = t.clamp(0.0, 1.0);
        for pair in stops.windows(2) {
            let (lo, c1) = pair[0];
            let (hi, c2) = pair[1];
            if t <= hi {
                return interpolate_color(c1, c2, (t - lo) / (hi - lo));
            }
        }
        stops[stops.len() - 1].1
    }
}

/// Finite `(min, max)` of a set of values, `None` if nothing is finite.
pub fn finite_range<'a>(values: impl IntoIterator<Item = &'a f64>) -> Option<(f64, f64)> {
    values
        .into_iter()
        .filter(|v| v.is_finite())
        .fold(None, |acc, &v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gray_endpoints() {
        assert_eq!(Colormap::Gray.color(0.0), BLACK);
        assert_eq!(Colormap::Gray.color(1.0), WHITE);
        assert_eq!(Colormap::Gray.color(0.5), Color::opaque(128, 128, 128));
    }

    #[test]
    fn test_viridis_clamps() {
        assert_eq!(Colormap::Viridis.color(-3.0), Color::opaque(68, 1, 84));
        assert_eq!(Colormap::Viridis.color(7.0), Color::opaque(253, 231, 37));
    }

    #[test]
    fn test_finite_range_skips_nan() {
        let values = [f64::NAN, 2.0, f64::INFINITY, -1.0];
        assert_eq!(finite_range(values.iter()), Some((-1.0, 2.0)));
        assert_eq!(finite_range([f64::NAN].iter()), None);
    }
}
