//! Object storage for uploaded bands and rendered artifacts (S3 compatible).

use bytes::Bytes;
use object_store::{
    aws::AmazonS3Builder, local::LocalFileSystem, memory::InMemory, path::Path, ObjectStore,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, instrument};

use openrs_common::{OpenRsError, OpenRsResult};

/// Configuration for object storage connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectStorageConfig {
    /// S3/MinIO endpoint URL
    pub endpoint: String,
    /// Bucket name
    pub bucket: String,
    /// Access key ID
    pub access_key_id: String,
    /// Secret access key
    pub secret_access_key: String,
    /// AWS region (use "us-east-1" for MinIO)
    pub region: String,
    /// Allow HTTP (for local MinIO)
    pub allow_http: bool,
    /// Store objects under this directory instead of a bucket.
    pub local_root: Option<PathBuf>,
}

impl Default for ObjectStorageConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://minio:9000".to_string(),
            bucket: "openrs".to_string(),
            access_key_id: "minioadmin".to_string(),
            secret_access_key: "minioadmin".to_string(),
            region: "us-east-1".to_string(),
            allow_http: true,
            local_root: None,
        }
    }
}

impl ObjectStorageConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let endpoint = std::env::var("OBJECT_STORAGE_ENDPOINT").unwrap_or(defaults.endpoint);
        Self {
            allow_http: std::env::var("OBJECT_STORAGE_ALLOW_HTTP")
                .map(|v| v.to_lowercase() == "true" || v == "1")
                .unwrap_or_else(|_| endpoint.starts_with("http://")),
            endpoint,
            bucket: std::env::var("OBJECT_STORAGE_BUCKET_NAME").unwrap_or(defaults.bucket),
            access_key_id: std::env::var("OBJECT_STORAGE_ACCESS_KEY")
                .unwrap_or(defaults.access_key_id),
            secret_access_key: std::env::var("OBJECT_STORAGE_SECRET_KEY")
                .unwrap_or(defaults.secret_access_key),
            region: std::env::var("OBJECT_STORAGE_REGION").unwrap_or(defaults.region),
            local_root: std::env::var("OBJECT_STORAGE_LOCAL_ROOT")
                .ok()
                .filter(|v| !v.is_empty())
                .map(PathBuf::from),
        }
    }

    /// Config for a local-directory store.
    pub fn local(root: impl Into<PathBuf>) -> Self {
        Self {
            local_root: Some(root.into()),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.local_root.is_some() {
            return Ok(());
        }
        if self.endpoint.is_empty() {
            return Err("endpoint must not be empty".to_string());
        }
        if self.bucket.is_empty() {
            return Err("bucket must not be empty".to_string());
        }
        Ok(())
    }
}

/// Object storage client.
pub struct ObjectStorage {
    store: Arc<dyn ObjectStore>,
    bucket: String,
}

impl ObjectStorage {
    /// Create a new object storage client from config.
    pub fn new(config: &ObjectStorageConfig) -> OpenRsResult<Self> {
        config.validate().map_err(OpenRsError::StorageError)?;

        if let Some(root) = &config.local_root {
            std::fs::create_dir_all(root)?;
            let store = LocalFileSystem::new_with_prefix(root).map_err(|e| {
                OpenRsError::StorageError(format!("Failed to open {}: {}", root.display(), e))
            })?;
            return Ok(Self {
                store: Arc::new(store),
                bucket: root.display().to_string(),
            });
        }

        let store = AmazonS3Builder::new()
            .with_endpoint(&config.endpoint)
            .with_bucket_name(&config.bucket)
            .with_access_key_id(&config.access_key_id)
            .with_secret_access_key(&config.secret_access_key)
            .with_region(&config.region)
            .with_allow_http(config.allow_http)
            .build()
            .map_err(|e| OpenRsError::StorageError(format!("Failed to create S3 client: {}", e)))?;

        Ok(Self {
            store: Arc::new(store),
            bucket: config.bucket.clone(),
        })
    }

    /// Process-local store, mostly for tests.
    pub fn in_memory() -> Self {
        Self {
            store: Arc::new(InMemory::new()),
            bucket: "memory".to_string(),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Write bytes to a path in the bucket.
    #[instrument(skip(self, data), fields(bucket = %self.bucket, path = %path))]
    pub async fn put(&self, path: &str, data: Bytes) -> OpenRsResult<()> {
        let location = Path::from(path);
        debug!(size = data.len(), "Writing object");

        self.store
            .put(&location, data.into())
            .await
            .map_err(|e| OpenRsError::StorageError(format!("Failed to write {}: {}", path, e)))?;

        Ok(())
    }

    /// Read bytes from a path.
    #[instrument(skip(self), fields(bucket = %self.bucket, path = %path))]
    pub async fn get(&self, path: &str) -> OpenRsResult<Bytes> {
        let location = Path::from(path);

        let result = self
            .store
            .get(&location)
            .await
            .map_err(|e| OpenRsError::StorageError(format!("Failed to read {}: {}", path, e)))?;

        let bytes = result
            .bytes()
            .await
            .map_err(|e| OpenRsError::StorageError(format!("Failed to read bytes: {}", e)))?;

        debug!(size = bytes.len(), "Read object");
        Ok(bytes)
    }

    /// Check if an object exists.
    pub async fn exists(&self, path: &str) -> OpenRsResult<bool> {
        Ok(self.size(path).await?.is_some())
    }

    /// Size in bytes of an object, `None` when it does not exist.
    pub async fn size(&self, path: &str) -> OpenRsResult<Option<usize>> {
        let location = Path::from(path);

        match self.store.head(&location).await {
            Ok(meta) => Ok(Some(meta.size)),
            Err(object_store::Error::NotFound { .. }) => Ok(None),
            Err(e) => Err(OpenRsError::StorageError(format!(
                "Failed to check {}: {}",
                path, e
            ))),
        }
    }

    /// Delete an object.
    #[instrument(skip(self), fields(bucket = %self.bucket, path = %path))]
    pub async fn delete(&self, path: &str) -> OpenRsResult<()> {
        let location = Path::from(path);

        self.store
            .delete(&location)
            .await
            .map_err(|e| OpenRsError::StorageError(format!("Failed to delete {}: {}", path, e)))?;

        Ok(())
    }
}

/// Object name of a stored file: `{unique_name}.{extension}`.
pub fn object_name(unique_name: &str, extension: &str) -> String {
    format!("{}.{}", unique_name, extension)
}
