//! Storage collaborators for the operation dispatcher.
//!
//! Provides:
//! - The [`FileResolver`] and [`ArtifactStorage`] contracts
//! - Object storage (MinIO/S3 or a local directory)
//! - A file catalog resolving uploads through a local cache
//! - Artifact persistence on top of object storage

pub mod artifacts;
pub mod collaborators;
pub mod files;
pub mod object_store;

pub use self::object_store::{object_name, ObjectStorage, ObjectStorageConfig};
pub use artifacts::ObjectArtifactStorage;
pub use collaborators::{ArtifactStorage, FileResolver};
pub use files::{FileStoreConfig, ProjectFileStore, StoredFile};
