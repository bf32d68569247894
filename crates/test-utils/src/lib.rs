//! Shared test utilities for the openrs workspace.
//!
//! This crate provides common testing infrastructure including:
//! - Synthetic band generators
//! - GeoTIFF fixture writers for on-disk scenes
//! - Approximate float assertions
//!
//! # Usage
//!
//! Add to your crate's `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! test-utils = { path = "../test-utils" }
//! ```
//!
//! Then import in your tests:
//!
//! ```ignore
//! use test_utils::{scene_bands, write_scene};
//! ```

pub mod fixtures;
pub mod generators;

// Re-export commonly used items at the crate root
pub use fixtures::*;
pub use generators::*;

/// Macro for approximate floating-point equality assertions.
///
/// # Usage
///
/// ```ignore
/// use test_utils::assert_approx_eq;
///
/// assert_approx_eq!(1.0001_f64, 1.0_f64, 0.001_f64); // passes
/// assert_approx_eq!(1.1_f32, 1.0_f32, 0.001_f32);    // fails
/// ```
#[macro_export]
macro_rules! assert_approx_eq {
    ($left:expr, $right:expr, $epsilon:expr) => {{
        let left: f64 = $left as f64;
        let right: f64 = $right as f64;
        let epsilon: f64 = $epsilon as f64;
        let diff = (left - right).abs();
        if diff > epsilon {
            panic!(
                "assertion failed: `(left ≈ right)`\n  left: `{:?}`,\n right: `{:?}`,\n  diff: `{:?}` > epsilon `{:?}`",
                left, right, diff, epsilon
            );
        }
    }};
}

/// Macro for elementwise approximate equality of two arrays of the same shape.
///
/// NaN only matches NaN.
///
/// ```ignore
/// use test_utils::assert_band_approx_eq;
///
/// assert_band_approx_eq!(computed, expected, 1e-9);
/// ```
#[macro_export]
macro_rules! assert_band_approx_eq {
    ($left:expr, $right:expr, $epsilon:expr) => {{
        let left = &$left;
        let right = &$right;
        assert_eq!(left.shape(), right.shape(), "shape mismatch");
        for (idx, (l, r)) in left.iter().zip(right.iter()).enumerate() {
            let (l, r): (f64, f64) = (*l as f64, *r as f64);
            if l.is_nan() || r.is_nan() {
                assert!(
                    l.is_nan() && r.is_nan(),
                    "element {}: left `{:?}` right `{:?}`",
                    idx,
                    l,
                    r
                );
                continue;
            }
            $crate::assert_approx_eq!(l, r, $epsilon);
        }
    }};
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    #[test]
    fn test_assert_approx_eq_passes() {
        assert_approx_eq!(1.0001, 1.0, 0.001);
        assert_approx_eq!(0.0, 0.0, 0.0001);
        assert_approx_eq!(-5.5, -5.500001, 0.0001);
    }

    #[test]
    #[should_panic(expected = "assertion failed")]
    fn test_assert_approx_eq_fails() {
        assert_approx_eq!(1.1, 1.0, 0.001);
    }

    #[test]
    fn test_assert_band_approx_eq_treats_nan_as_equal() {
        let a = array![[1.0, f64::NAN], [0.5, 0.25]];
        let b = array![[1.00001, f64::NAN], [0.5, 0.25]];
        assert_band_approx_eq!(a, b, 0.001);
    }

    #[test]
    #[should_panic(expected = "shape mismatch")]
    fn test_assert_band_approx_eq_checks_shape() {
        let a = array![[1.0, 2.0]];
        let b = array![[1.0], [2.0]];
        assert_band_approx_eq!(a, b, 0.001);
    }
}
