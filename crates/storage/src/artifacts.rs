//! Durable storage of rendered operation outputs.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::RwLock;
use tracing::{info, instrument, warn};

use openrs_common::{ArtifactRecord, OpenRsResult, PendingArtifact, Project, ProjectId};

use crate::collaborators::ArtifactStorage;
use crate::files::{write_cache_file, FileStoreConfig};
use crate::object_store::{object_name, ObjectStorage};

/// [`ArtifactStorage`] that uploads to object storage and keeps the
/// records in memory.
pub struct ObjectArtifactStorage {
    storage: Arc<ObjectStorage>,
    config: FileStoreConfig,
    records: RwLock<Vec<ArtifactRecord>>,
    next_id: AtomicI64,
}

impl ObjectArtifactStorage {
    pub fn new(storage: Arc<ObjectStorage>, config: FileStoreConfig) -> Self {
        Self {
            storage,
            config,
            records: RwLock::new(Vec::new()),
            next_id: AtomicI64::new(1),
        }
    }

    /// Records persisted for a project, oldest first.
    pub async fn records(&self, project_id: ProjectId) -> Vec<ArtifactRecord> {
        self.records
            .read()
            .await
            .iter()
            .filter(|r| r.project_id == project_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl ArtifactStorage for ObjectArtifactStorage {
    #[instrument(skip(self, artifact, project), fields(project_id = project.id, unique_name = %artifact.unique_name))]
    async fn persist(
        &self,
        artifact: PendingArtifact,
        project: &Project,
    ) -> OpenRsResult<ArtifactRecord> {
        let path = object_name(&artifact.unique_name, &artifact.extension);
        let data = Bytes::from(tokio::fs::read(&artifact.local_path).await?);
        let size = data.len();
        self.storage.put(&path, data.clone()).await?;

        if self.config.local_save_files {
            let target = self.config.cache_dir.join(&path);
            if let Err(e) = write_cache_file(&self.config.cache_dir, &target, data).await {
                // No record is written, so the uploaded object would be orphaned.
                warn!(error = %e, object = %path, "Local copy failed, removing uploaded object");
                if let Err(cleanup) = self.storage.delete(&path).await {
                    warn!(error = %cleanup, object = %path, "Failed to remove uploaded object");
                }
                return Err(e);
            }
        }

        let record = ArtifactRecord {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            unique_name: artifact.unique_name,
            extension: artifact.extension,
            title: artifact.title,
            project_id: project.id,
            path,
        };
        self.records.write().await.push(record.clone());

        info!(artifact_id = record.id, size, "Artifact persisted");
        Ok(record)
    }
}
