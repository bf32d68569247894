//! Test data generators for creating synthetic band data.
//!
//! These generators create predictable, verifiable patterns that can be
//! used across the test suite. All arrays are `(rows, columns)`.

use ndarray::Array2;
use openrs_common::BandRole;

/// Creates a band with predictable values.
///
/// Each cell value is calculated as: `col * 1000 + row`
///
/// This makes it easy to verify that data is being read/written correctly
/// by checking that `band[[row, col]] == col * 1000 + row`.
///
/// # Example
///
/// ```
/// use test_utils::create_test_band;
///
/// let band = create_test_band(5, 10);
/// assert_eq!(band.dim(), (5, 10));
/// assert_eq!(band[[0, 1]], 1000.0);
/// assert_eq!(band[[1, 0]], 1.0);
/// ```
pub fn create_test_band(height: usize, width: usize) -> Array2<f64> {
    Array2::from_shape_fn((height, width), |(row, col)| (col * 1000 + row) as f64)
}

/// Linear ramp from `lo` (first pixel) to `hi` (last pixel) in row-major order.
pub fn gradient_band(height: usize, width: usize, lo: f64, hi: f64) -> Array2<f64> {
    let last = (height * width).saturating_sub(1).max(1) as f64;
    Array2::from_shape_fn((height, width), |(row, col)| {
        let i = (row * width + col) as f64;
        lo + (hi - lo) * i / last
    })
}

/// Every pixel set to `value`.
pub fn constant_band(height: usize, width: usize, value: f64) -> Array2<f64> {
    Array2::from_elem((height, width), value)
}

/// Alternating `a` / `b` cells.
pub fn checkerboard_band(height: usize, width: usize, a: f64, b: f64) -> Array2<f64> {
    Array2::from_shape_fn((height, width), |(row, col)| {
        if (row + col) % 2 == 0 {
            a
        } else {
            b
        }
    })
}

/// Left half near `low`, right half near `high`, with a small deterministic
/// ripple so neither half is constant.
pub fn two_cluster_band(height: usize, width: usize, low: f64, high: f64) -> Array2<f64> {
    let half = width / 2;
    Array2::from_shape_fn((height, width), |(row, col)| {
        let ripple = ((row * 7 + col * 3) % 5) as f64 * 0.01 * (high - low).abs();
        if col < half {
            low + ripple
        } else {
            high - ripple
        }
    })
}

/// Single bright pixel in the centre of a dark field.
pub fn impulse_band(height: usize, width: usize, value: f64) -> Array2<f64> {
    let mut band = Array2::zeros((height, width));
    band[[height / 2, width / 2]] = value;
    band
}

/// A vegetated scene with plausible reflectance ratios.
///
/// NIR is strongly reflected, red absorbed, SWIR moderate. Values vary per
/// pixel so no band is constant and every normalized band spans `[0, 1]`.
pub fn scene_bands(height: usize, width: usize) -> Vec<(BandRole, Array2<f64>)> {
    let base = |scale: f64, offset: f64, phase: usize| {
        Array2::from_shape_fn((height, width), |(row, col)| {
            let wobble = ((row * 5 + col * 11 + phase) % 17) as f64 / 16.0;
            offset + scale * wobble
        })
    };
    vec![
        (BandRole::Blue, base(400.0, 300.0, 1)),
        (BandRole::Green, base(500.0, 500.0, 2)),
        (BandRole::Red, base(450.0, 350.0, 3)),
        (BandRole::Nir, base(1500.0, 2500.0, 4)),
        (BandRole::Swir1, base(900.0, 1200.0, 5)),
        (BandRole::Swir2, base(700.0, 800.0, 6)),
    ]
}
