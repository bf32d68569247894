//! Project and artifact value types exchanged with the storage collaborators.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::PathBuf;

/// Identifier of an uploaded file.
pub type FileId = i64;

/// Identifier of a project.
pub type ProjectId = i64;

/// An ownership-validated project together with the ids of its files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
    pub file_ids: BTreeSet<FileId>,
}

impl Project {
    pub fn new(id: ProjectId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            file_ids: BTreeSet::new(),
        }
    }

    pub fn with_files(mut self, ids: impl IntoIterator<Item = FileId>) -> Self {
        self.file_ids.extend(ids);
        self
    }

    pub fn owns(&self, file_id: FileId) -> bool {
        self.file_ids.contains(&file_id)
    }
}

/// Reference to a persisted operation output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRecord {
    pub id: i64,
    pub unique_name: String,
    pub extension: String,
    pub title: String,
    pub project_id: ProjectId,
    /// Object path of the stored artifact (`{unique_name}.{extension}`).
    pub path: String,
}

/// Path of a rendered artifact waiting to be persisted.
#[derive(Debug, Clone)]
pub struct PendingArtifact {
    pub local_path: PathBuf,
    pub unique_name: String,
    pub extension: String,
    pub title: String,
}
