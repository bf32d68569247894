//! Loading bundles from GeoTIFFs on disk.

use ndarray::array;
use openrs_common::{BandRole, OpenRsError};
use raster::{load_band, BandSources, RasterBundle};
use test_utils::{
    assert_approx_eq, assert_band_approx_eq, write_bands, write_rgb_tiff, write_scene,
    write_u16_tiff,
};

#[test]
fn test_load_scene_normalizes_every_band() {
    let scene = write_scene(8, 9);
    let mut sources = BandSources::new();
    for (role, path, _) in &scene.bands {
        sources.set(*role, Some(path.clone()));
    }

    let bundle = RasterBundle::load(&sources).unwrap();
    assert_eq!(bundle.len(), 6);

    for role in BandRole::SPECTRAL {
        let norm = bundle.normalized(role).unwrap();
        let min = norm.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = norm.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        assert_approx_eq!(min, 0.0, 1e-12);
        assert_approx_eq!(max, 1.0, 1e-12);
        assert_eq!(bundle.metadata(role).unwrap().height, 8);
        assert_eq!(bundle.metadata(role).unwrap().width, 9);
    }
}

#[test]
fn test_raw_values_survive_f32_round_trip() {
    let scene = write_bands(vec![(BandRole::Nir, array![[0.1, 0.2], [0.3, 0.4]])]);
    let band = load_band(scene.path(BandRole::Nir).unwrap()).unwrap();
    assert_band_approx_eq!(band, array![[0.1, 0.2], [0.3, 0.4]], 1e-6);
}

#[test]
fn test_red_nir_normalization() {
    // Two-band bundle from the ndvi walkthrough.
    let scene = write_bands(vec![
        (BandRole::Red, array![[0.1, 0.2], [0.3, 0.4]]),
        (BandRole::Nir, array![[0.5, 0.6], [0.7, 0.8]]),
    ]);
    let sources = BandSources::new()
        .with(BandRole::Red, scene.path(BandRole::Red).unwrap())
        .with(BandRole::Nir, scene.path(BandRole::Nir).unwrap());

    let bundle = RasterBundle::load(&sources).unwrap();
    let expected = array![[0.0, 1.0 / 3.0], [2.0 / 3.0, 1.0]];
    assert_band_approx_eq!(bundle.normalized(BandRole::Red).unwrap(), expected, 1e-6);
    assert_band_approx_eq!(bundle.normalized(BandRole::Nir).unwrap(), expected, 1e-6);

    let all = bundle.get_all_normalized();
    for role in [BandRole::Blue, BandRole::Green, BandRole::Swir1, BandRole::Swir2, BandRole::Tif] {
        assert!(all[&role].is_none());
    }
}

#[test]
fn test_u16_tiff_keeps_raw_digital_numbers() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("B04.tif");
    write_u16_tiff(&path, &array![[0.0, 1200.0], [65535.0, 7.0]]);

    let band = load_band(&path).unwrap();
    assert_eq!(band, array![[0.0, 1200.0], [65535.0, 7.0]]);
}

#[test]
fn test_multichannel_source_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rgb.tif");
    write_rgb_tiff(&path, 3, 3);

    let err = load_band(&path).unwrap_err();
    assert!(matches!(err, OpenRsError::DecodeError { .. }));
}

#[test]
fn test_missing_source_fails_load() {
    let sources = BandSources::new().with(BandRole::Red, "/nope/B04.tif");
    let err = RasterBundle::load(&sources).unwrap_err();
    assert!(matches!(err, OpenRsError::SourceNotFound(_)));
}

#[test]
fn test_garbage_file_is_decode_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.tif");
    std::fs::write(&path, b"not a tiff at all").unwrap();

    let err = load_band(&path).unwrap_err();
    assert!(matches!(err, OpenRsError::DecodeError { .. }));
}

#[test]
fn test_empty_sources_give_empty_bundle() {
    let bundle = RasterBundle::load(&BandSources::new()).unwrap();
    assert!(bundle.is_empty());
    assert!(bundle.spectral_bands().is_empty());
}
