//! Uploaded band files: an in-memory catalog backed by object storage and
//! a local cache directory.

use std::collections::{BTreeSet, HashMap};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use openrs_common::{FileId, OpenRsError, OpenRsResult, Project, ProjectId};

use crate::collaborators::FileResolver;
use crate::object_store::{object_name, ObjectStorage};

/// Where files are cached locally and whether artifacts keep a local copy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileStoreConfig {
    pub cache_dir: PathBuf,
    /// Keep a copy of every persisted artifact in `cache_dir`.
    pub local_save_files: bool,
}

impl Default for FileStoreConfig {
    fn default() -> Self {
        Self {
            cache_dir: PathBuf::from("cache"),
            local_save_files: false,
        }
    }
}

impl FileStoreConfig {
    /// Load configuration from `CACHE_FOLDER` and `LOCAL_SAVE_FILES`.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("CACHE_FOLDER") {
            if !val.is_empty() {
                config.cache_dir = PathBuf::from(val);
            }
        }

        if let Ok(val) = std::env::var("LOCAL_SAVE_FILES") {
            config.local_save_files = val.to_lowercase() == "true" || val == "1";
        }

        config
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.cache_dir.as_os_str().is_empty() {
            return Err("cache_dir must not be empty".to_string());
        }
        Ok(())
    }

    /// Local cache path of a stored object.
    pub fn cache_path(&self, unique_name: &str, extension: &str) -> PathBuf {
        self.cache_dir.join(object_name(unique_name, extension))
    }
}

/// Catalog entry for one uploaded file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredFile {
    pub id: FileId,
    pub project_id: ProjectId,
    pub unique_name: String,
    pub extension: String,
    pub uploaded_at: DateTime<Utc>,
}

impl StoredFile {
    pub fn object_name(&self) -> String {
        object_name(&self.unique_name, &self.extension)
    }
}

/// [`FileResolver`] over an in-memory catalog.
pub struct ProjectFileStore {
    storage: Arc<ObjectStorage>,
    config: FileStoreConfig,
    catalog: RwLock<HashMap<FileId, StoredFile>>,
    next_id: AtomicI64,
}

impl ProjectFileStore {
    pub fn new(storage: Arc<ObjectStorage>, config: FileStoreConfig) -> Self {
        Self {
            storage,
            config,
            catalog: RwLock::new(HashMap::new()),
            next_id: AtomicI64::new(1),
        }
    }

    pub fn config(&self) -> &FileStoreConfig {
        &self.config
    }

    /// Record a file that is already in object storage.
    pub async fn register(
        &self,
        project_id: ProjectId,
        unique_name: impl Into<String>,
        extension: impl Into<String>,
    ) -> StoredFile {
        let file = StoredFile {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            project_id,
            unique_name: unique_name.into(),
            extension: extension.into(),
            uploaded_at: Utc::now(),
        };
        self.catalog.write().await.insert(file.id, file.clone());
        file
    }

    /// Upload a local file under a fresh unique name and record it.
    ///
    /// The file is also placed in the cache so the first resolve is local.
    #[instrument(skip(self), fields(path = %path.display()))]
    pub async fn register_local(&self, project_id: ProjectId, path: &Path) -> OpenRsResult<StoredFile> {
        if !path.exists() {
            return Err(OpenRsError::SourceNotFound(path.to_path_buf()));
        }
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_lowercase)
            .unwrap_or_else(|| "tif".to_string());
        let unique_name = Uuid::new_v4().to_string();

        let data = Bytes::from(tokio::fs::read(path).await?);
        self.storage
            .put(&object_name(&unique_name, &extension), data.clone())
            .await?;

        write_cache_file(
            &self.config.cache_dir,
            &self.config.cache_path(&unique_name, &extension),
            data,
        )
        .await?;

        let file = self.register(project_id, unique_name, extension).await;
        info!(file_id = file.id, project_id, "Registered file");
        Ok(file)
    }

    pub async fn get(&self, file_id: FileId) -> Option<StoredFile> {
        self.catalog.read().await.get(&file_id).cloned()
    }

    /// Ids of every file recorded for a project.
    pub async fn project_files(&self, project_id: ProjectId) -> BTreeSet<FileId> {
        self.catalog
            .read()
            .await
            .values()
            .filter(|f| f.project_id == project_id)
            .map(|f| f.id)
            .collect()
    }
}

#[async_trait]
impl FileResolver for ProjectFileStore {
    #[instrument(skip(self, project), fields(project_id = project.id))]
    async fn resolve(&self, file_id: FileId, project: &Project) -> OpenRsResult<PathBuf> {
        let not_found = || OpenRsError::FileNotFound {
            file_id,
            project_id: project.id,
        };

        if !project.owns(file_id) {
            return Err(not_found());
        }
        let file = self
            .get(file_id)
            .await
            .filter(|f| f.project_id == project.id)
            .ok_or_else(not_found)?;

        let cached = self.config.cache_path(&file.unique_name, &file.extension);
        let name = file.object_name();
        let stored_size = self.storage.size(&name).await?;

        match tokio::fs::metadata(&cached).await {
            Ok(meta) => match stored_size {
                Some(size) if meta.len() != size as u64 => {
                    warn!(
                        file_id,
                        cached = meta.len(),
                        stored = size,
                        "Cached copy does not match stored object, downloading again"
                    );
                }
                _ => {
                    debug!(file_id, path = %cached.display(), "Cache hit");
                    return Ok(cached);
                }
            },
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        if stored_size.is_none() {
            warn!(file_id, object = %name, "File missing from cache and storage");
            return Err(not_found());
        }

        let data = self.storage.get(&name).await?;
        let size = data.len();
        write_cache_file(&self.config.cache_dir, &cached, data).await?;
        debug!(file_id, size, "Downloaded into cache");
        Ok(cached)
    }
}

/// Write `data` to `target` through a temporary file in `dir`, so readers
/// never observe a partially written cache entry.
pub(crate) async fn write_cache_file(dir: &Path, target: &Path, data: Bytes) -> OpenRsResult<()> {
    tokio::fs::create_dir_all(dir).await?;
    let (dir, target) = (dir.to_path_buf(), target.to_path_buf());

    tokio::task::spawn_blocking(move || -> std::io::Result<()> {
        let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
        tmp.write_all(&data)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&target).map_err(|e| e.error)?;
        Ok(())
    })
    .await
    .map_err(|e| OpenRsError::StorageError(format!("Cache write task failed: {}", e)))??;

    Ok(())
}
