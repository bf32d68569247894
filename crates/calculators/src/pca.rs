//! Principal component analysis over the six spectral bands.
//!
//! Each band is one sample and each pixel one feature, so the fit works
//! on the 6x6 Gram matrix of the pixel-centred stack instead of the much
//! larger pixel covariance. Component `k` is `X_cᵀ u_k / sqrt(λ_k)`,
//! reshaped back to the raster.

use nalgebra::{DMatrix, SymmetricEigen};

use openrs_common::{BandRole, ExtraParams, OpenRsError, OpenRsResult};
use raster::{Band, RasterBundle};
use renderer::{Colormap, Figure, Panel};

use crate::{computed, raw_inputs, Calculator, HISTOGRAM_BINS};

pub const N_COMPONENTS: usize = 6;
const EIGEN_EPSILON: f64 = 1e-12;
const EIGEN_MAX_ITERATIONS: usize = 10_000;

#[derive(Debug, Clone)]
pub struct PcaFit {
    /// Components in decreasing order of explained variance.
    pub components: Vec<Band>,
    pub explained_variance: Vec<f64>,
}

impl PcaFit {
    pub fn explained_variance_ratio(&self) -> Vec<f64> {
        let total: f64 = self.explained_variance.iter().sum();
        self.explained_variance
            .iter()
            .map(|v| if total > 0.0 { v / total } else { 0.0 })
            .collect()
    }
}

/// Fit principal components to same-shaped bands.
pub fn fit(bands: &[Band]) -> OpenRsResult<PcaFit> {
    let n = bands.len();
    if n == 0 {
        return Err(OpenRsError::InternalError("PCA needs at least one band".to_string()));
    }
    if bands.iter().any(|b| b.iter().any(|v| !v.is_finite())) {
        return Err(OpenRsError::InternalError(
            "PCA input contains non-finite samples".to_string(),
        ));
    }

    let mut mean = Band::zeros(bands[0].raw_dim());
    for band in bands {
        mean += band;
    }
    mean /= n as f64;
    let centred: Vec<Band> = bands.iter().map(|b| b - &mean).collect();

    let gram = DMatrix::from_fn(n, n, |i, j| {
        centred[i]
            .iter()
            .zip(centred[j].iter())
            .map(|(a, b)| a * b)
            .sum::<f64>()
    });
    let eigen = SymmetricEigen::try_new(gram, EIGEN_EPSILON, EIGEN_MAX_ITERATIONS)
        .ok_or_else(|| OpenRsError::InternalError("eigen decomposition did not converge".to_string()))?;

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|a, b| eigen.eigenvalues[*b].total_cmp(&eigen.eigenvalues[*a]));

    let largest = eigen.eigenvalues[order[0]].max(0.0);
    let dof = (n.max(2) - 1) as f64;
    let mut components = Vec::with_capacity(n);
    let mut explained_variance = Vec::with_capacity(n);

    for k in order {
        let lambda = eigen.eigenvalues[k];
        let u = eigen.eigenvectors.column(k);
        let mut component = Band::zeros(mean.raw_dim());

        if lambda > largest * EIGEN_EPSILON && lambda > 0.0 {
            // flip so the largest loading is positive
            let pivot = u
                .iter()
                .copied()
                .max_by(|a, b| a.abs().total_cmp(&b.abs()))
                .unwrap_or(1.0);
            let sign = if pivot < 0.0 { -1.0 } else { 1.0 };
            let scale = sign / lambda.sqrt();
            for (i, band) in centred.iter().enumerate() {
                component.scaled_add(u[i] * scale, band);
            }
            explained_variance.push(lambda / dof);
        } else {
            explained_variance.push(0.0);
        }
        components.push(component);
    }

    Ok(PcaFit {
        components,
        explained_variance,
    })
}

#[derive(Debug)]
pub struct PcaCalculator {
    bands: Vec<Band>,
    fit: Option<PcaFit>,
}

impl PcaCalculator {
    pub const NAME: &'static str = "pca";

    pub fn new(bundle: &RasterBundle) -> OpenRsResult<Self> {
        let bands = raw_inputs(bundle, Self::NAME, &BandRole::SPECTRAL)?;
        Ok(Self { bands, fit: None })
    }

    pub fn fit(&self) -> Option<&PcaFit> {
        self.fit.as_ref()
    }
}

impl Calculator for PcaCalculator {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn compute(&mut self, _params: &ExtraParams) -> OpenRsResult<()> {
        self.fit = Some(fit(&self.bands)?);
        Ok(())
    }

    fn figure(&self, title: &str) -> OpenRsResult<Figure> {
        let fit = computed(&self.fit, self.name())?;
        let mut figure = Figure::new(title, N_COMPONENTS, 2);
        for component in fit.components.iter().take(N_COMPONENTS) {
            figure.push(Panel::raster(component.clone(), Colormap::Gray));
            figure.push(Panel::histogram(component.iter(), HISTOGRAM_BINS));
        }
        Ok(figure)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_utils::scene_bands;

    #[test]
    fn test_six_components_with_raster_shape() {
        let bands: Vec<Band> = scene_bands(4, 5).into_iter().map(|(_, b)| b).collect();
        let fit = fit(&bands).unwrap();
        assert_eq!(fit.components.len(), N_COMPONENTS);
        assert!(fit.components.iter().all(|c| c.dim() == (4, 5)));
    }

    #[test]
    fn test_variance_is_sorted_and_last_is_zero() {
        let bands: Vec<Band> = scene_bands(6, 6).into_iter().map(|(_, b)| b).collect();
        let fit = fit(&bands).unwrap();
        for pair in fit.explained_variance.windows(2) {
            assert!(pair[0] >= pair[1]);
        }
        // pixel centring across six samples leaves rank five at most
        assert_eq!(fit.explained_variance[5], 0.0);
        assert!(fit.components[5].iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_components_are_unit_norm() {
        let bands: Vec<Band> = scene_bands(5, 5).into_iter().map(|(_, b)| b).collect();
        let fit = fit(&bands).unwrap();
        for (component, variance) in fit.components.iter().zip(&fit.explained_variance) {
            if *variance > 0.0 {
                let norm: f64 = component.iter().map(|v| v * v).sum::<f64>().sqrt();
                assert!((norm - 1.0).abs() < 1e-9, "norm {}", norm);
            }
        }
    }

    #[test]
    fn test_identical_bands_have_no_variance() {
        let band = Band::from_shape_fn((3, 3), |(r, c)| (r * 3 + c) as f64);
        let fit = fit(&vec![band; 6]).unwrap();
        assert!(fit.explained_variance.iter().all(|v| *v == 0.0));
        assert_eq!(fit.explained_variance_ratio(), vec![0.0; 6]);
    }

    #[test]
    fn test_non_finite_input_is_rejected() {
        let mut bands: Vec<Band> = scene_bands(3, 3).into_iter().map(|(_, b)| b).collect();
        bands[2][[1, 1]] = f64::NAN;
        assert!(matches!(fit(&bands), Err(OpenRsError::InternalError(_))));
    }

    #[test]
    fn test_figure_before_compute_is_not_computed() {
        let bundle = RasterBundle::from_bands(scene_bands(3, 3));
        let calc = PcaCalculator::new(&bundle).unwrap();
        assert!(matches!(calc.figure("pca"), Err(OpenRsError::NotComputed(_))));
    }
}
