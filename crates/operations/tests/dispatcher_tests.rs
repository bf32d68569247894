//! Dispatcher tests with in-memory collaborators.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::json;

use calculators::OperationRegistry;
use openrs_common::{
    ArtifactRecord, BandRole, ExtraParams, FileId, OpenRsError, OpenRsResult, PendingArtifact,
    Project,
};
use operations::{Dispatcher, DispatcherConfig, OperationRequest};
use renderer::png::read_text_chunks;
use storage::{
    ArtifactStorage, FileResolver, FileStoreConfig, ObjectArtifactStorage, ObjectStorage,
    ProjectFileStore,
};
use test_utils::{write_scene, SceneFiles};

#[derive(Default)]
struct MockResolver {
    paths: HashMap<FileId, PathBuf>,
    calls: AtomicUsize,
}

#[async_trait]
impl FileResolver for MockResolver {
    async fn resolve(&self, file_id: FileId, project: &Project) -> OpenRsResult<PathBuf> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.paths
            .get(&file_id)
            .cloned()
            .ok_or(OpenRsError::FileNotFound {
                file_id,
                project_id: project.id,
            })
    }
}

/// Keeps the bytes of every persisted artifact.
#[derive(Default)]
struct MockStorage {
    persisted: Mutex<Vec<(PendingArtifact, Vec<u8>)>>,
}

#[async_trait]
impl ArtifactStorage for MockStorage {
    async fn persist(
        &self,
        artifact: PendingArtifact,
        project: &Project,
    ) -> OpenRsResult<ArtifactRecord> {
        let bytes = std::fs::read(&artifact.local_path)?;
        let mut persisted = self.persisted.lock().unwrap();
        let record = ArtifactRecord {
            id: persisted.len() as i64 + 1,
            unique_name: artifact.unique_name.clone(),
            extension: artifact.extension.clone(),
            title: artifact.title.clone(),
            project_id: project.id,
            path: format!("{}.{}", artifact.unique_name, artifact.extension),
        };
        persisted.push((artifact, bytes));
        Ok(record)
    }
}

struct Harness {
    dispatcher: Dispatcher,
    resolver: Arc<MockResolver>,
    storage: Arc<MockStorage>,
    work_dir: tempfile::TempDir,
    project: Project,
    _scene: SceneFiles,
}

/// Scene bands registered as file ids 1..=6 in wavelength order.
fn harness() -> Harness {
    let scene = write_scene(12, 12);
    let mut paths = HashMap::new();
    for (i, role) in BandRole::SPECTRAL.iter().enumerate() {
        if let Some(path) = scene.path(*role) {
            paths.insert(i as FileId + 1, path.to_path_buf());
        }
    }
    let resolver = Arc::new(MockResolver {
        paths,
        calls: AtomicUsize::new(0),
    });
    let storage = Arc::new(MockStorage::default());
    let work_dir = tempfile::tempdir().unwrap();
    let config = DispatcherConfig {
        work_dir: work_dir.path().to_path_buf(),
        ..DispatcherConfig::default()
    };
    let dispatcher = Dispatcher::new(
        Arc::new(OperationRegistry::standard()),
        resolver.clone(),
        storage.clone(),
        config,
    );
    Harness {
        dispatcher,
        resolver,
        storage,
        work_dir,
        project: Project::new(1, "scene").with_files(1..=6),
        _scene: scene,
    }
}

fn file_id(role: BandRole) -> FileId {
    BandRole::SPECTRAL.iter().position(|r| *r == role).map(|i| i as FileId + 1).unwrap_or(0)
}

fn request(operation: &str, roles: &[BandRole]) -> OperationRequest {
    roles
        .iter()
        .fold(OperationRequest::new(operation, "Test"), |r, role| r.with_band(*role, file_id(*role)))
}

fn params(value: serde_json::Value) -> ExtraParams {
    value.as_object().cloned().unwrap_or_default()
}

fn is_empty_dir(path: &Path) -> bool {
    std::fs::read_dir(path).map(|mut d| d.next().is_none()).unwrap_or(false)
}

#[tokio::test]
async fn test_unknown_operation_touches_nothing() {
    let h = harness();
    let err = h
        .dispatcher
        .operate(request("unknown_xyz", &[BandRole::Red, BandRole::Nir]), &h.project)
        .await
        .unwrap_err();

    assert!(matches!(err, OpenRsError::UnknownOperation { ref operation, .. } if operation == "unknown_xyz"));
    assert_eq!(err.http_status_code(), 403);
    assert_eq!(h.resolver.calls.load(Ordering::SeqCst), 0);
    assert!(h.storage.persisted.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_clustering_with_zero_clusters_is_rejected() {
    let h = harness();
    let req = request("clustering", &[BandRole::Nir]).with_params(params(json!({"n_clusters": 0})));
    let err = h.dispatcher.operate(req, &h.project).await.unwrap_err();

    assert!(matches!(err, OpenRsError::InvalidParameter { .. }));
    assert!(h.storage.persisted.lock().unwrap().is_empty());
    assert!(is_empty_dir(h.work_dir.path()));
}

#[tokio::test]
async fn test_foreign_file_ids_are_all_reported() {
    let h = harness();
    let req = OperationRequest::new("ndvi", "t")
        .with_band(BandRole::Red, 9)
        .with_band(BandRole::Nir, 5)
        .with_band(BandRole::Green, 2);
    let project = Project::new(1, "small").with_files([2]);

    match h.dispatcher.operate(req, &project).await {
        Err(OpenRsError::BandsNotFound(ids)) => assert_eq!(ids, vec![5, 9]),
        other => panic!("expected BandsNotFound, got {:?}", other),
    }
    assert_eq!(h.resolver.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_title_too_long() {
    let h = harness();
    let mut req = request("ndvi", &[BandRole::Red, BandRole::Nir]);
    req.title = "x".repeat(51);

    match h.dispatcher.operate(req, &h.project).await {
        Err(OpenRsError::InvalidParameter { param, .. }) => assert_eq!(param, "title"),
        other => panic!("expected InvalidParameter, got {:?}", other),
    }
    assert_eq!(h.resolver.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_missing_band_is_reported_after_resolution() {
    let h = harness();
    let err = h
        .dispatcher
        .operate(request("ndvi", &[BandRole::Red]), &h.project)
        .await
        .unwrap_err();
    assert!(matches!(err, OpenRsError::MissingBand { ref missing, .. } if missing == &vec![BandRole::Nir]));
    assert_eq!(err.http_status_code(), 412);
    assert!(h.storage.persisted.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_resolver_errors_propagate_unchanged() {
    let h = harness();
    let project = Project::new(1, "scene").with_files([1, 2, 42]);
    let req = OperationRequest::new("ndwi", "t")
        .with_band(BandRole::Green, 2)
        .with_band(BandRole::Nir, 42);

    let err = h.dispatcher.operate(req, &project).await.unwrap_err();
    assert!(matches!(err, OpenRsError::FileNotFound { file_id: 42, project_id: 1 }));
}

#[tokio::test]
async fn test_ndvi_end_to_end() {
    let h = harness();
    let record = h
        .dispatcher
        .operate(request("ndvi", &[BandRole::Red, BandRole::Nir]), &h.project)
        .await
        .unwrap();

    assert_eq!(record.extension, "png");
    assert_eq!(record.title, "Test");
    assert_eq!(record.project_id, 1);
    assert!(uuid::Uuid::parse_str(&record.unique_name).is_ok());

    let persisted = h.storage.persisted.lock().unwrap();
    assert_eq!(persisted.len(), 1);
    let (artifact, bytes) = &persisted[0];
    assert!(image::load_from_memory(bytes).is_ok());
    assert_eq!(read_text_chunks(bytes)[0].text, "Test");
    assert!(!artifact.local_path.exists());
    assert!(is_empty_dir(h.work_dir.path()));
}

#[tokio::test]
async fn test_legacy_alias_dispatches() {
    let h = harness();
    let req = request("sigmodid", &[BandRole::Nir])
        .with_params(params(json!({"gain": 5, "inv": true, "cutoff": 0.4})));
    assert!(h.dispatcher.operate(req, &h.project).await.is_ok());
}

#[tokio::test]
async fn test_with_object_storage_collaborators() {
    let scene = write_scene(10, 10);
    let cache = tempfile::tempdir().unwrap();
    let work = tempfile::tempdir().unwrap();
    let objects = Arc::new(ObjectStorage::in_memory());
    let config = FileStoreConfig {
        cache_dir: cache.path().to_path_buf(),
        local_save_files: false,
    };
    let files = Arc::new(ProjectFileStore::new(objects.clone(), config.clone()));
    let artifacts = Arc::new(ObjectArtifactStorage::new(objects.clone(), config));

    let mut req = OperationRequest::new("pca", "Components");
    for role in BandRole::SPECTRAL {
        let path = scene.path(role).unwrap();
        let stored = files.register_local(5, path).await.unwrap();
        req = req.with_band(role, stored.id);
    }
    let project = Project::new(5, "landsat").with_files(files.project_files(5).await);

    let dispatcher = Dispatcher::new(
        Arc::new(OperationRegistry::standard()),
        files,
        artifacts.clone(),
        DispatcherConfig {
            work_dir: work.path().to_path_buf(),
            ..DispatcherConfig::default()
        },
    );
    let record = dispatcher.operate(req, &project).await.unwrap();

    assert!(objects.exists(&record.path).await.unwrap());
    assert_eq!(artifacts.records(5).await, vec![record]);
}
