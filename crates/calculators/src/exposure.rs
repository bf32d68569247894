//! Intensity transforms for images scaled to `[0, 1]`.
//!
//! Conventions follow scikit-image's `exposure` module so outputs are
//! comparable with reference processing of the same scenes.

use raster::Band;
use renderer::colormap::finite_range;

/// `gain * x^gamma`.
pub fn adjust_gamma(image: &Band, gamma: f64, gain: f64) -> Band {
    image.mapv(|x| gain * x.powf(gamma))
}

/// `1 / (1 + exp(gain * (cutoff - x)))`, or one minus that when inverted.
pub fn adjust_sigmoid(image: &Band, cutoff: f64, gain: f64, inv: bool) -> Band {
    image.mapv(|x| {
        let s = 1.0 / (1.0 + (gain * (cutoff - x)).exp());
        if inv {
            1.0 - s
        } else {
            s
        }
    })
}

/// `gain * log2(1 + x)`, or `gain * (2^x - 1)` when inverted.
pub fn adjust_log(image: &Band, gain: f64, inv: bool) -> Band {
    image.mapv(|x| {
        if inv {
            gain * (x.exp2() - 1.0)
        } else {
            gain * (1.0 + x).log2()
        }
    })
}

/// Arithmetic mean over every pixel; NaN if any pixel is NaN.
pub fn mean(image: &Band) -> f64 {
    image.mean().unwrap_or(f64::NAN)
}

/// Bin range used for a sample: its finite range, widened by half a unit
/// on each side when constant.
fn bin_range(image: &Band) -> (f64, f64) {
    match finite_range(image.iter()) {
        Some((lo, hi)) if hi > lo => (lo, hi),
        Some((v, _)) => (v - 0.5, v + 0.5),
        None => (0.0, 1.0),
    }
}

/// Global histogram equalization.
///
/// The cumulative histogram over `nbins` equal bins is sampled at each
/// pixel by linear interpolation between bin centres. Output is in `[0, 1]`.
pub fn equalize_hist(image: &Band, nbins: usize) -> Band {
    let nbins = nbins.max(1);
    let (lo, hi) = bin_range(image);
    let width = (hi - lo) / nbins as f64;

    let mut counts = vec![0u64; nbins];
    for v in image.iter().filter(|v| v.is_finite()) {
        counts[(((v - lo) / width) as usize).min(nbins - 1)] += 1;
    }
    let total: u64 = counts.iter().sum();
    if total == 0 {
        return image.clone();
    }

    let mut running = 0u64;
    let cdf: Vec<f64> = counts
        .iter()
        .map(|c| {
            running += c;
            running as f64 / total as f64
        })
        .collect();
    let centres: Vec<f64> = (0..nbins).map(|i| lo + width * (i as f64 + 0.5)).collect();

    image.mapv(|v| {
        if !v.is_finite() {
            return v;
        }
        interp(v, &centres, &cdf)
    })
}

/// Piecewise linear interpolation, clamped to the end values.
fn interp(x: f64, xs: &[f64], ys: &[f64]) -> f64 {
    let last = xs.len() - 1;
    if x <= xs[0] {
        return ys[0];
    }
    if x >= xs[last] {
        return ys[last];
    }
    let i = xs.partition_point(|c| *c <= x) - 1;
    let t = (x - xs[i]) / (xs[i + 1] - xs[i]);
    ys[i] + t * (ys[i + 1] - ys[i])
}

/// Number of contextual regions per axis.
const CLAHE_TILES: usize = 8;

/// Contrast limited adaptive histogram equalization.
///
/// The image is rescaled to `[0, 1]`, split into up to 8x8 tiles, and each
/// tile gets a clipped histogram mapping. The clip limit is
/// `max(1, clip_limit * tile_pixels)` counts; the clipped excess is spread
/// evenly over all bins. Pixels blend the mappings of the four nearest tile
/// centres bilinearly. Output is in `[0, 1]`; non-finite pixels pass through.
pub fn equalize_adapthist(image: &Band, clip_limit: f64, nbins: usize) -> Band {
    let nbins = nbins.max(2);
    let (rows, cols) = image.dim();
    let Some((lo, hi)) = finite_range(image.iter()) else {
        return image.clone();
    };
    let span = hi - lo;
    let bin_of = |v: f64| -> usize {
        if span > 0.0 {
            (((v - lo) / span * nbins as f64) as usize).min(nbins - 1)
        } else {
            0
        }
    };

    let tile_rows = CLAHE_TILES.min(rows);
    let tile_cols = CLAHE_TILES.min(cols);
    let row_edges: Vec<usize> = (0..=tile_rows).map(|i| i * rows / tile_rows).collect();
    let col_edges: Vec<usize> = (0..=tile_cols).map(|j| j * cols / tile_cols).collect();

    // mappings[ti][tj][bin] in [0, 1]
    let mut mappings = vec![vec![Vec::new(); tile_cols]; tile_rows];
    for ti in 0..tile_rows {
        for tj in 0..tile_cols {
            let mut hist = vec![0.0f64; nbins];
            let mut n = 0usize;
            for r in row_edges[ti]..row_edges[ti + 1] {
                for c in col_edges[tj]..col_edges[tj + 1] {
                    let v = image[[r, c]];
                    if v.is_finite() {
                        hist[bin_of(v)] += 1.0;
                        n += 1;
                    }
                }
            }
            mappings[ti][tj] = tile_mapping(hist, n, clip_limit);
        }
    }

    let row_centres: Vec<f64> = (0..tile_rows)
        .map(|i| (row_edges[i] + row_edges[i + 1]) as f64 / 2.0 - 0.5)
        .collect();
    let col_centres: Vec<f64> = (0..tile_cols)
        .map(|j| (col_edges[j] + col_edges[j + 1]) as f64 / 2.0 - 0.5)
        .collect();

    Band::from_shape_fn((rows, cols), |(r, c)| {
        let v = image[[r, c]];
        if !v.is_finite() {
            return v;
        }
        let bin = bin_of(v);
        let (t0, t1, wy) = neighbours(r as f64, &row_centres);
        let (u0, u1, wx) = neighbours(c as f64, &col_centres);
        let top = mappings[t0][u0][bin] * (1.0 - wx) + mappings[t0][u1][bin] * wx;
        let bottom = mappings[t1][u0][bin] * (1.0 - wx) + mappings[t1][u1][bin] * wx;
        top * (1.0 - wy) + bottom * wy
    })
}

/// Clipped, normalized cumulative histogram of one tile.
fn tile_mapping(mut hist: Vec<f64>, n: usize, clip_limit: f64) -> Vec<f64> {
    let nbins = hist.len();
    if n == 0 {
        return (0..nbins).map(|b| b as f64 / (nbins - 1) as f64).collect();
    }

    let limit = (clip_limit * n as f64).max(1.0);
    let mut excess = 0.0;
    for count in hist.iter_mut() {
        if *count > limit {
            excess += *count - limit;
            *count = limit;
        }
    }
    let share = excess / nbins as f64;

    let mut running = 0.0;
    hist.iter()
        .map(|count| {
            running += count + share;
            running / n as f64
        })
        .collect()
}

/// Indices of the tile centres bracketing `x` and the weight of the second.
fn neighbours(x: f64, centres: &[f64]) -> (usize, usize, f64) {
    let last = centres.len() - 1;
    if x <= centres[0] {
        return (0, 0, 0.0);
    }
    if x >= centres[last] {
        return (last, last, 0.0);
    }
    let i = centres.partition_point(|c| *c <= x) - 1;
    let w = (x - centres[i]) / (centres[i + 1] - centres[i]);
    (i, i + 1, w)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use test_utils::{assert_approx_eq, gradient_band};

    #[test]
    fn test_gamma_and_gain() {
        let out = adjust_gamma(&array![[0.25, 1.0]], 0.5, 2.0);
        assert_eq!(out, array![[1.0, 2.0]]);
    }

    #[test]
    fn test_sigmoid_cutoff_is_half() {
        let out = adjust_sigmoid(&array![[0.5]], 0.5, 10.0, false);
        assert_approx_eq!(out[[0, 0]], 0.5, 1e-12);
        let inv = adjust_sigmoid(&array![[1.0]], 0.5, 10.0, true);
        assert!(inv[[0, 0]] < 0.01);
    }

    #[test]
    fn test_log_and_inverse() {
        let out = adjust_log(&array![[0.0, 1.0]], 1.0, false);
        assert_eq!(out, array![[0.0, 1.0]]);
        let inv = adjust_log(&array![[1.0]], 3.0, true);
        assert_eq!(inv[[0, 0]], 3.0);
    }

    #[test]
    fn test_equalize_hist_is_monotonic_and_bounded() {
        let image = gradient_band(16, 16, 0.0, 1.0).mapv(|v| v * v);
        let out = equalize_hist(&image, 256);
        let flat: Vec<f64> = out.iter().cloned().collect();
        assert!(flat.windows(2).all(|w| w[0] <= w[1]));
        assert!(flat.iter().all(|v| (0.0..=1.0).contains(v)));
        assert_approx_eq!(flat[flat.len() - 1], 1.0, 1e-12);
    }

    #[test]
    fn test_equalize_hist_keeps_nan() {
        let out = equalize_hist(&array![[f64::NAN, 0.0], [0.5, 1.0]], 4);
        assert!(out[[0, 0]].is_nan());
    }

    #[test]
    fn test_adapthist_bounded_and_finite() {
        let image = gradient_band(40, 37, 0.0, 1.0);
        let out = equalize_adapthist(&image, 0.03, 256);
        assert_eq!(out.dim(), (40, 37));
        for v in out.iter() {
            assert!(v.is_finite());
            assert!(*v >= 0.0 && *v <= 1.0 + 1e-9, "{}", v);
        }
    }

    #[test]
    fn test_adapthist_tiny_image() {
        let out = equalize_adapthist(&array![[0.2, 0.8]], 0.9, 256);
        assert_eq!(out.dim(), (1, 2));
        assert!(out.iter().all(|v| (0.0..=1.0).contains(v)));
    }

    #[test]
    fn test_interp_clamps() {
        let xs = [0.0, 1.0];
        let ys = [10.0, 20.0];
        assert_eq!(interp(-1.0, &xs, &ys), 10.0);
        assert_eq!(interp(0.5, &xs, &ys), 15.0);
        assert_eq!(interp(2.0, &xs, &ys), 20.0);
    }
}
