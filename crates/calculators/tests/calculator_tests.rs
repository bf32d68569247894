//! Lifecycle tests run against every registered operation.

use ndarray::array;
use serde_json::json;

use calculators::clustering::ClusteringCalculator;
use calculators::indices::{IndexCalculator, SpectralIndex};
use calculators::pca::PcaCalculator;
use calculators::{Calculator, OperationRegistry};
use openrs_common::{BandRole, ExtraParams, OpenRsError};
use raster::{Band, RasterBundle};
use renderer::png::read_text_chunks;
use test_utils::{assert_approx_eq, scene_bands, two_cluster_band};

fn params(value: serde_json::Value) -> ExtraParams {
    value.as_object().cloned().unwrap_or_default()
}

/// Minimal valid parameters for operations that require some.
fn params_for(name: &str) -> ExtraParams {
    match name {
        "clustering" => params(json!({"n_clusters": 3, "random_state": 0})),
        "gamma_image" => params(json!({"gamma": 0.5, "gain": 1.0})),
        "sigmoid" | "sigmodid" => params(json!({"gain": 10.0, "inv": false, "cutoff": 0.5})),
        _ => ExtraParams::new(),
    }
}

fn bundle_with(roles: &[BandRole]) -> RasterBundle {
    RasterBundle::from_bands(
        scene_bands(8, 8)
            .into_iter()
            .filter(|(role, _)| roles.contains(role)),
    )
}

#[test]
fn test_every_operation_rejects_each_missing_band() {
    let registry = OperationRegistry::standard();
    for entry in registry.entries() {
        let required = entry.required_bands();
        for dropped in required {
            let remaining: Vec<BandRole> = required.iter().copied().filter(|r| r != dropped).collect();
            match entry.build(&bundle_with(&remaining)) {
                Err(OpenRsError::MissingBand { operation, missing }) => {
                    assert_eq!(missing, vec![*dropped], "{}", entry.name);
                    assert_eq!(operation, entry.kind.name());
                }
                Err(other) => panic!("{}: expected MissingBand, got {}", entry.name, other),
                Ok(_) => panic!("{}: built without {}", entry.name, dropped),
            }
        }
    }
}

#[test]
fn test_every_operation_runs_with_exactly_its_bands() {
    let registry = OperationRegistry::standard();
    let dir = tempfile::tempdir().unwrap();

    for entry in registry.entries() {
        let bundle = bundle_with(entry.required_bands());
        let mut calc = entry
            .build(&bundle)
            .unwrap_or_else(|e| panic!("{}: {}", entry.name, e));
        assert_eq!(calc.name(), entry.kind.name());

        calc.compute(&params_for(entry.name))
            .unwrap_or_else(|e| panic!("{}: {}", entry.name, e));

        let path = dir.path().join(format!("{}.png", entry.name));
        calc.render(&path, entry.name)
            .unwrap_or_else(|e| panic!("{}: {}", entry.name, e));

        let bytes = std::fs::read(&path).unwrap();
        assert!(image::load_from_memory(&bytes).is_ok(), "{}", entry.name);
        let text = read_text_chunks(&bytes);
        assert_eq!(text[0].text, entry.name);
    }
}

#[test]
fn test_ndvi_scenario() {
    let bundle = RasterBundle::from_bands([
        (BandRole::Red, array![[1.0, 2.0], [3.0, 4.0]]),
        (BandRole::Nir, array![[4.0, 3.0], [2.0, 1.0]]),
    ]);
    let mut calc = IndexCalculator::new(SpectralIndex::Ndvi, &bundle).unwrap();
    calc.compute(&ExtraParams::new()).unwrap();
    let out = calc.output().unwrap();

    // red_n = [[0, 1/3], [2/3, 1]], nir_n = [[1, 2/3], [1/3, 0]]
    assert_approx_eq!(out[[0, 0]], 1.0, 1e-12);
    assert_approx_eq!(out[[0, 1]], 1.0 / 3.0, 1e-12);
    assert_approx_eq!(out[[1, 0]], -1.0 / 3.0, 1e-12);
    assert_approx_eq!(out[[1, 1]], -1.0, 1e-12);
}

#[test]
fn test_clustering_is_deterministic_for_a_seed() {
    let nir = two_cluster_band(12, 12, 100.0, 900.0);
    let bundle = RasterBundle::from_bands([(BandRole::Nir, nir)]);
    let p = params(json!({"n_clusters": 4, "random_state": 17}));

    let run = || {
        let mut calc = ClusteringCalculator::new(&bundle).unwrap();
        calc.compute(&p).unwrap();
        calc.fit().unwrap().labels.clone()
    };
    assert_eq!(run(), run());
}

#[test]
fn test_clustering_accepts_every_documented_seed() {
    let bundle = RasterBundle::from_bands([(BandRole::Nir, two_cluster_band(6, 6, 0.0, 1.0))]);
    for seed in 0..=42 {
        let mut calc = ClusteringCalculator::new(&bundle).unwrap();
        calc.compute(&params(json!({"n_clusters": 2, "random_state": seed})))
            .unwrap_or_else(|e| panic!("seed {}: {}", seed, e));
    }
}

#[test]
fn test_clustering_two_groups_map_to_their_centres() {
    let nir: Band = array![[1.0, 1.0, 9.0], [1.0, 9.0, 9.0]];
    let bundle = RasterBundle::from_bands([(BandRole::Nir, nir)]);
    let mut calc = ClusteringCalculator::new(&bundle).unwrap();
    calc.compute(&params(json!({"n_clusters": 2, "random_state": 42})))
        .unwrap();
    assert_eq!(calc.output().unwrap(), &array![[1.0, 1.0, 9.0], [1.0, 9.0, 9.0]]);
}

#[test]
fn test_clustering_rejects_bad_parameters() {
    let bundle = RasterBundle::from_bands([(BandRole::Nir, two_cluster_band(4, 4, 0.0, 1.0))]);
    let cases = [
        json!({"n_clusters": 0}),
        json!({"n_clusters": 0, "random_state": 1}),
        json!({"n_clusters": 2}),
        json!({"random_state": 3}),
        json!({"n_clusters": 2, "random_state": 43}),
        json!({"n_clusters": 2, "random_state": -1}),
        json!({"n_clusters": 2.5, "random_state": 1}),
        json!({"n_clusters": "2", "random_state": 1}),
        json!({"n_clusters": 17, "random_state": 1}),
    ];
    for case in cases {
        let mut calc = ClusteringCalculator::new(&bundle).unwrap();
        let err = calc.compute(&params(case.clone())).unwrap_err();
        assert!(
            matches!(err, OpenRsError::InvalidParameter { .. }),
            "{} gave {}",
            case,
            err
        );
        assert!(calc.output().is_none());
    }
}

#[test]
fn test_pca_export_before_compute() {
    let bundle = RasterBundle::from_bands(scene_bands(4, 4));
    let calc = PcaCalculator::new(&bundle).unwrap();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pca.png");

    let err = calc.render(&path, "PCA").unwrap_err();
    assert!(matches!(err, OpenRsError::NotComputed(_)));
    assert!(!path.exists());
}

#[test]
fn test_compute_is_repeatable() {
    let registry = OperationRegistry::standard();
    let entry = registry.get("equalize_image").unwrap();
    let bundle = bundle_with(entry.required_bands());
    let mut calc = entry.build(&bundle).unwrap();
    let dir = tempfile::tempdir().unwrap();

    calc.compute(&ExtraParams::new()).unwrap();
    calc.render(&dir.path().join("a.png"), "t").unwrap();
    calc.compute(&ExtraParams::new()).unwrap();
    calc.render(&dir.path().join("b.png"), "t").unwrap();

    assert_eq!(
        std::fs::read(dir.path().join("a.png")).unwrap(),
        std::fs::read(dir.path().join("b.png")).unwrap()
    );
}
