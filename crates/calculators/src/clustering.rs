//! K-means clustering of the raw NIR band.
//!
//! Pixels are treated as 1-D samples. Initialization is greedy k-means++
//! driven by a seeded `StdRng`, so a fixed `random_state` gives identical
//! labels on every run.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use openrs_common::{BandRole, ExtraParams, OpenRsError, OpenRsResult};
use raster::{Band, RasterBundle};
use renderer::{Colormap, Figure, Panel};

use crate::params::{check_int_range, ParamReader};
use crate::{computed, raw_inputs, Calculator};

pub const MAX_ITERATIONS: usize = 300;
const RELATIVE_TOLERANCE: f64 = 1e-4;
pub const MAX_RANDOM_STATE: i64 = 42;

/// Outcome of a k-means fit.
#[derive(Debug, Clone, PartialEq)]
pub struct KMeansFit {
    pub centers: Vec<f64>,
    pub labels: Vec<usize>,
    pub inertia: f64,
    pub iterations: usize,
}

fn nearest(x: f64, centers: &[f64]) -> (usize, f64) {
    let mut best = (0, f64::INFINITY);
    for (i, c) in centers.iter().enumerate() {
        let d = (x - c) * (x - c);
        if d < best.1 {
            best = (i, d);
        }
    }
    best
}

fn cumulative(weights: &[f64]) -> Vec<f64> {
    let mut total = 0.0;
    weights
        .iter()
        .map(|w| {
            total += w;
            total
        })
        .collect()
}

/// Draw an index with probability proportional to its weight.
fn sample_weighted(rng: &mut StdRng, cumulative: &[f64]) -> usize {
    let total = cumulative[cumulative.len() - 1];
    let r = rng.gen::<f64>() * total;
    cumulative.partition_point(|c| *c <= r).min(cumulative.len() - 1)
}

/// Greedy k-means++: each round draws `2 + ln k` candidates and keeps the
/// one that lowers the total squared distance most.
fn kmeans_plus_plus(samples: &[f64], k: usize, rng: &mut StdRng) -> Vec<f64> {
    let n = samples.len();
    let trials = 2 + (k as f64).ln() as usize;

    let mut centers = Vec::with_capacity(k);
    centers.push(samples[rng.gen_range(0..n)]);
    let mut closest: Vec<f64> = samples.iter().map(|x| (x - centers[0]).powi(2)).collect();

    while centers.len() < k {
        let cum = cumulative(&closest);
        if cum[n - 1] <= 0.0 {
            // every sample already sits on a center
            centers.push(samples[rng.gen_range(0..n)]);
            continue;
        }

        let mut best: Option<(f64, f64)> = None;
        for _ in 0..trials {
            let candidate = samples[sample_weighted(rng, &cum)];
            let potential: f64 = samples
                .iter()
                .zip(&closest)
                .map(|(x, d)| d.min((x - candidate).powi(2)))
                .sum();
            if best.map_or(true, |(_, p)| potential < p) {
                best = Some((candidate, potential));
            }
        }

        if let Some((candidate, _)) = best {
            for (d, x) in closest.iter_mut().zip(samples) {
                *d = d.min((x - candidate).powi(2));
            }
            centers.push(candidate);
        }
    }
    centers
}

/// Fit `k` clusters to 1-D samples.
///
/// Lloyd iterations stop after [`MAX_ITERATIONS`] or once the summed
/// squared center shift drops to `1e-4` times the sample variance. An
/// emptied cluster is re-seeded with the sample farthest from its center.
/// `samples` must be non-empty, finite, and hold at least `k` values.
pub fn kmeans(samples: &[f64], k: usize, seed: u64) -> KMeansFit {
    let n = samples.len();
    let mut rng = StdRng::seed_from_u64(seed);

    let mean = samples.iter().sum::<f64>() / n as f64;
    let variance = samples.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n as f64;
    let tolerance = RELATIVE_TOLERANCE * variance;

    let mut centers = kmeans_plus_plus(samples, k, &mut rng);
    let mut labels = vec![0usize; n];
    let mut iterations = 0;

    while iterations < MAX_ITERATIONS {
        iterations += 1;

        let mut sums = vec![0.0; k];
        let mut counts = vec![0usize; k];
        let mut distances = vec![0.0; n];
        for (i, x) in samples.iter().enumerate() {
            let (label, d) = nearest(*x, &centers);
            labels[i] = label;
            distances[i] = d;
            sums[label] += x;
            counts[label] += 1;
        }

        let mut updated: Vec<f64> = (0..k)
            .map(|j| if counts[j] > 0 { sums[j] / counts[j] as f64 } else { centers[j] })
            .collect();
        for j in (0..k).filter(|j| counts[*j] == 0) {
            let far = distances
                .iter()
                .enumerate()
                .max_by(|a, b| a.1.total_cmp(b.1))
                .map(|(i, _)| i)
                .unwrap_or(0);
            updated[j] = samples[far];
            distances[far] = 0.0;
        }

        let shift: f64 = centers.iter().zip(&updated).map(|(a, b)| (a - b).powi(2)).sum();
        centers = updated;
        if shift <= tolerance {
            break;
        }
    }

    let mut inertia = 0.0;
    for (i, x) in samples.iter().enumerate() {
        let (label, d) = nearest(*x, &centers);
        labels[i] = label;
        inertia += d;
    }

    KMeansFit {
        centers,
        labels,
        inertia,
        iterations,
    }
}

#[derive(Debug)]
pub struct ClusteringCalculator {
    nir: Band,
    fit: Option<KMeansFit>,
    output: Option<Band>,
}

impl ClusteringCalculator {
    pub const NAME: &'static str = "clustering";

    pub fn new(bundle: &RasterBundle) -> OpenRsResult<Self> {
        let mut bands = raw_inputs(bundle, Self::NAME, &[BandRole::Nir])?;
        Ok(Self {
            nir: bands.remove(0),
            fit: None,
            output: None,
        })
    }

    pub fn fit(&self) -> Option<&KMeansFit> {
        self.fit.as_ref()
    }

    /// Per-pixel assigned center value.
    pub fn output(&self) -> Option<&Band> {
        self.output.as_ref()
    }
}

impl Calculator for ClusteringCalculator {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn compute(&mut self, params: &ExtraParams) -> OpenRsResult<()> {
        let reader = ParamReader::new(params);
        let n_clusters = reader.required_int("n_clusters")?;
        let random_state = reader.required_int("random_state")?;

        let pixels = self.nir.len() as i64;
        if n_clusters <= 0 {
            return Err(OpenRsError::invalid_parameter(
                "n_clusters",
                format!("must be greater than 0, got {}", n_clusters),
            ));
        }
        check_int_range("n_clusters", n_clusters, 1, pixels)?;
        check_int_range("random_state", random_state, 0, MAX_RANDOM_STATE)?;

        if self.nir.iter().any(|v| !v.is_finite()) {
            return Err(OpenRsError::InternalError(
                "nir band contains non-finite samples".to_string(),
            ));
        }

        let samples: Vec<f64> = self.nir.iter().copied().collect();
        let fit = kmeans(&samples, n_clusters as usize, random_state as u64);
        debug!(
            n_clusters,
            random_state,
            iterations = fit.iterations,
            inertia = fit.inertia,
            "K-means converged"
        );

        let values: Vec<f64> = fit.labels.iter().map(|l| fit.centers[*l]).collect();
        let output = Band::from_shape_vec(self.nir.raw_dim(), values)
            .map_err(|e| OpenRsError::InternalError(e.to_string()))?;

        self.fit = Some(fit);
        self.output = Some(output);
        Ok(())
    }

    fn figure(&self, title: &str) -> OpenRsResult<Figure> {
        let output = computed(&self.output, self.name())?;
        Ok(Figure::single(
            title,
            Panel::raster_with_colorbar(output.clone(), Colormap::Viridis),
        ))
    }
}
