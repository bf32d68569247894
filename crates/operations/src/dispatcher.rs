//! The operation dispatcher.
//!
//! ```text
//! operate(request, project)
//!   │
//!   ├─► registry lookup           UnknownOperation
//!   ├─► title length              InvalidParameter(title)
//!   ├─► file ids owned by project BandsNotFound
//!   ├─► resolve each file id      FileNotFound (from the resolver)
//!   ├─► spawn_blocking:
//!   │     load bundle → build calculator → compute → render {uuid}.png
//!   └─► persist artifact          record returned unchanged
//! ```
//!
//! Every failure is returned to the caller as-is. Nothing is persisted
//! unless rendering succeeded, and the scratch directory is removed on
//! every exit path.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use metrics::{counter, histogram};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use calculators::{OperationEntry, OperationRegistry};
use openrs_common::{
    ArtifactRecord, ExtraParams, FileId, OpenRsError, OpenRsResult, PendingArtifact, Project,
};
use raster::{BandSources, RasterBundle};
use storage::{ArtifactStorage, FileResolver};

use crate::config::DispatcherConfig;
use crate::request::OperationRequest;

/// Extension of every rendered artifact.
pub const ARTIFACT_EXTENSION: &str = "png";

pub struct Dispatcher {
    registry: Arc<OperationRegistry>,
    files: Arc<dyn FileResolver>,
    artifacts: Arc<dyn ArtifactStorage>,
    config: DispatcherConfig,
}

impl Dispatcher {
    pub fn new(
        registry: Arc<OperationRegistry>,
        files: Arc<dyn FileResolver>,
        artifacts: Arc<dyn ArtifactStorage>,
        config: DispatcherConfig,
    ) -> Self {
        Self {
            registry,
            files,
            artifacts,
            config,
        }
    }

    pub fn registry(&self) -> &OperationRegistry {
        &self.registry
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    /// Run one operation for an ownership-validated project.
    #[instrument(skip(self, request, project), fields(operation = %request.operation_type, project_id = project.id))]
    pub async fn operate(
        &self,
        request: OperationRequest,
        project: &Project,
    ) -> OpenRsResult<ArtifactRecord> {
        let start = Instant::now();
        let operation = request.operation_type.clone();

        let result = self.run(request, project).await;

        let elapsed = start.elapsed().as_secs_f64();
        let outcome = match &result {
            Ok(_) => "success",
            Err(e) if e.is_client_error() => "client_error",
            Err(_) => "server_error",
        };
        // unknown names are not used as labels
        let label = self
            .registry
            .get(&operation)
            .map(|e| e.name)
            .unwrap_or("unknown");
        counter!("openrs_operations_total", "operation" => label, "outcome" => outcome).increment(1);
        histogram!("openrs_operation_duration_seconds", "operation" => label).record(elapsed);

        match &result {
            Ok(record) => info!(
                artifact_id = record.id,
                unique_name = %record.unique_name,
                duration_ms = elapsed * 1000.0,
                "Operation complete"
            ),
            Err(e) => warn!(error = %e, status = e.http_status_code(), "Operation failed"),
        }
        result
    }

    async fn run(&self, request: OperationRequest, project: &Project) -> OpenRsResult<ArtifactRecord> {
        let entry = *self.registry.lookup(&request.operation_type)?;
        self.check_title(&request.title)?;

        let file_ids = request.file_ids();
        let mut unresolved: Vec<FileId> = file_ids
            .iter()
            .map(|(_, id)| *id)
            .filter(|id| !project.owns(*id))
            .collect();
        if !unresolved.is_empty() {
            unresolved.sort_unstable();
            unresolved.dedup();
            return Err(OpenRsError::BandsNotFound(unresolved));
        }

        let mut sources = BandSources::new();
        for (role, file_id) in file_ids {
            let path = self.files.resolve(file_id, project).await?;
            debug!(role = %role, file_id, path = %path.display(), "Resolved band");
            sources.set(role, Some(path));
        }

        tokio::fs::create_dir_all(&self.config.work_dir).await?;
        let scratch = tempfile::Builder::new()
            .prefix("openrs-")
            .tempdir_in(&self.config.work_dir)?;
        let unique_name = Uuid::new_v4().to_string();
        let output = scratch
            .path()
            .join(format!("{}.{}", unique_name, ARTIFACT_EXTENSION));

        let title = request.title.clone();
        let params = request.extra_params;
        let target = output.clone();
        tokio::task::spawn_blocking(move || calculate(entry, &sources, &params, &target, &title))
            .await
            .map_err(|e| OpenRsError::InternalError(format!("Calculation task failed: {}", e)))??;

        let artifact = PendingArtifact {
            local_path: output,
            unique_name,
            extension: ARTIFACT_EXTENSION.to_string(),
            title: request.title,
        };
        let record = self.artifacts.persist(artifact, project).await;
        drop(scratch);
        record
    }

    fn check_title(&self, title: &str) -> OpenRsResult<()> {
        let length = title.chars().count();
        if length > self.config.max_title_length {
            return Err(OpenRsError::invalid_parameter(
                "title",
                format!(
                    "must be at most {} characters, got {}",
                    self.config.max_title_length, length
                ),
            ));
        }
        Ok(())
    }
}

/// Load, compute and render on the blocking pool.
fn calculate(
    entry: OperationEntry,
    sources: &BandSources,
    params: &ExtraParams,
    output: &Path,
    title: &str,
) -> OpenRsResult<()> {
    let bundle = RasterBundle::load(sources)?;
    let mut calculator = entry.build(&bundle)?;
    calculator.compute(params)?;
    calculator.render(output, title)?;
    debug!(operation = entry.name, path = %output.display(), "Rendered");
    Ok(())
}
