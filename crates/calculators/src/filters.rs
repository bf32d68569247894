//! Spatial filters on a single band, with mirrored ("reflect") borders.
//!
//! Reflect mode repeats the edge sample: `d c b a | a b c d | d c b a`.

use ndarray::{Axis, Zip};

use openrs_common::{BandRole, ExtraParams, OpenRsError, OpenRsResult};
use raster::{Band, RasterBundle};
use renderer::{Colormap, Figure, Panel};

use crate::params::{check_int_range, ParamReader};
use crate::{computed, normalized_inputs, Calculator, HISTOGRAM_BINS};

/// Map an out-of-range index back into `[0, n)` by mirroring.
fn reflect(i: isize, n: usize) -> usize {
    let period = 2 * n as isize;
    let m = i.rem_euclid(period) as usize;
    if m < n {
        m
    } else {
        2 * n - 1 - m
    }
}

/// Centred 1-D correlation along `axis`. `weights` must have odd length.
pub fn correlate1d(image: &Band, weights: &[f64], axis: usize) -> Band {
    let radius = (weights.len() / 2) as isize;
    let n = image.len_of(Axis(axis));
    Band::from_shape_fn(image.raw_dim(), |(r, c)| {
        let centre = if axis == 0 { r } else { c } as isize;
        weights
            .iter()
            .enumerate()
            .map(|(k, w)| {
                let i = reflect(centre + k as isize - radius, n);
                let v = if axis == 0 { image[[i, c]] } else { image[[r, i]] };
                w * v
            })
            .sum()
    })
}

/// Box mean over a `size x size` window.
pub fn mean_filter(image: &Band, size: usize) -> Band {
    let weights = vec![1.0 / size as f64; size];
    correlate1d(&correlate1d(image, &weights, 0), &weights, 1)
}

/// Median over a `size x size` window. NaN sorts above every number.
pub fn median_filter(image: &Band, size: usize) -> Band {
    let (rows, cols) = image.dim();
    let radius = (size / 2) as isize;
    let mut window = Vec::with_capacity(size * size);
    Band::from_shape_fn((rows, cols), |(r, c)| {
        window.clear();
        for dr in -radius..=radius {
            let rr = reflect(r as isize + dr, rows);
            for dc in -radius..=radius {
                window.push(image[[rr, reflect(c as isize + dc, cols)]]);
            }
        }
        window.sort_by(|a, b| a.total_cmp(b));
        window[window.len() / 2]
    })
}

/// Normalized Gaussian weights, truncated at four standard deviations.
pub fn gaussian_kernel(sigma: f64) -> Vec<f64> {
    let radius = (4.0 * sigma + 0.5) as isize;
    let raw: Vec<f64> = (-radius..=radius)
        .map(|x| (-0.5 * (x * x) as f64 / (sigma * sigma)).exp())
        .collect();
    let sum: f64 = raw.iter().sum();
    raw.into_iter().map(|w| w / sum).collect()
}

pub fn gaussian_filter(image: &Band, sigma: f64) -> Band {
    let weights = gaussian_kernel(sigma);
    correlate1d(&correlate1d(image, &weights, 0), &weights, 1)
}

/// Sum of second differences along both axes.
pub fn laplace(image: &Band) -> Band {
    let d2 = [1.0, -2.0, 1.0];
    correlate1d(image, &d2, 0) + correlate1d(image, &d2, 1)
}

/// Gradient magnitude `sqrt((gx^2 + gy^2) / 2)` from quarter-scaled Sobel kernels.
pub fn sobel(image: &Band) -> Band {
    let smooth = [0.25, 0.5, 0.25];
    let diff = [1.0, 0.0, -1.0];
    let horizontal = correlate1d(&correlate1d(image, &diff, 0), &smooth, 1);
    let vertical = correlate1d(&correlate1d(image, &smooth, 0), &diff, 1);
    Zip::from(&horizontal)
        .and(&vertical)
        .map_collect(|h, v| ((h * h + v * v) / 2.0).sqrt())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterKind {
    Mean,
    Median,
    Gaussian,
    Laplacian,
    Sobel,
}

impl FilterKind {
    pub fn name(&self) -> &'static str {
        match self {
            FilterKind::Mean => "mean",
            FilterKind::Median => "median",
            FilterKind::Gaussian => "gaussian",
            FilterKind::Laplacian => "laplacian",
            FilterKind::Sobel => "sobel",
        }
    }
}

pub const DEFAULT_WINDOW: i64 = 3;
pub const MAX_WINDOW: i64 = 31;
pub const DEFAULT_SIGMA: f64 = 1.0;
pub const MAX_SIGMA: f64 = 50.0;

fn window_size(reader: &ParamReader<'_>) -> OpenRsResult<usize> {
    let size = reader.optional_int("size")?.unwrap_or(DEFAULT_WINDOW);
    check_int_range("size", size, 1, MAX_WINDOW)?;
    if size % 2 == 0 {
        return Err(OpenRsError::invalid_parameter("size", format!("must be odd, got {}", size)));
    }
    Ok(size as usize)
}

fn sigma(reader: &ParamReader<'_>) -> OpenRsResult<f64> {
    let sigma = reader.optional_f64("sigma")?.unwrap_or(DEFAULT_SIGMA);
    if sigma <= 0.0 || sigma > MAX_SIGMA {
        return Err(OpenRsError::invalid_parameter(
            "sigma",
            format!("must be in (0, {}], got {}", MAX_SIGMA, sigma),
        ));
    }
    Ok(sigma)
}

/// Filters the normalized NIR band.
#[derive(Debug)]
pub struct FilterCalculator {
    kind: FilterKind,
    nir: Band,
    output: Option<Band>,
}

impl FilterCalculator {
    pub fn new(kind: FilterKind, bundle: &RasterBundle) -> OpenRsResult<Self> {
        let mut bands = normalized_inputs(bundle, kind.name(), &[BandRole::Nir])?;
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

impl Calculator for FilterCalculator {
    fn name(&self) -> &'static str {
        self.kind.name()
    }

    fn compute(&mut self, params: &ExtraParams) -> OpenRsResult<()> {
        let reader = ParamReader::new(params);
        let output = match self.kind {
            FilterKind::Mean => mean_filter(&self.nir, window_size(&reader)?),
            FilterKind::Median => median_filter(&self.nir, window_size(&reader)?),
            FilterKind::Gaussian => gaussian_filter(&self.nir, sigma(&reader)?),
            FilterKind::Laplacian => laplace(&self.nir),
            FilterKind::Sobel => sobel(&self.nir),
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
