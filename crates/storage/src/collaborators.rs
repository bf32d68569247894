//! Contracts the operation dispatcher depends on.

use std::path::PathBuf;

use async_trait::async_trait;

use openrs_common::{ArtifactRecord, FileId, OpenRsResult, PendingArtifact, Project};

/// Maps an uploaded file id to a readable local raster path.
#[async_trait]
pub trait FileResolver: Send + Sync {
    /// Fails with `FileNotFound` when the id is not in the project or the
    /// file is missing from both the local cache and durable storage.
    async fn resolve(&self, file_id: FileId, project: &Project) -> OpenRsResult<PathBuf>;
}

/// Persists a rendered artifact and returns its record.
#[async_trait]
pub trait ArtifactStorage: Send + Sync {
    async fn persist(
        &self,
        artifact: PendingArtifact,
        project: &Project,
    ) -> OpenRsResult<ArtifactRecord>;
}
