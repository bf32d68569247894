//! openrs operator.
//!
//! Runs one band operation against local band files: the files are
//! registered in a fresh project, the operation is dispatched and the
//! persisted artifact record is printed as JSON.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use calculators::OperationRegistry;
use openrs_common::{BandRole, ExtraParams, Project};
use operations::{Dispatcher, DispatcherConfig, OperationRequest};
use storage::{
    FileStoreConfig, ObjectArtifactStorage, ObjectStorage, ObjectStorageConfig, ProjectFileStore,
};

#[derive(Parser, Debug)]
#[command(name = "openrs-operator")]
#[command(about = "Run a remote-sensing band operation and persist the rendered result")]
struct Args {
    /// Operation type (see --list)
    #[arg(short, long, required_unless_present = "list")]
    operation: Option<String>,

    /// Artifact title
    #[arg(short, long, default_value = "")]
    title: String,

    #[arg(long)]
    red: Option<PathBuf>,
    #[arg(long)]
    green: Option<PathBuf>,
    #[arg(long)]
    blue: Option<PathBuf>,
    #[arg(long)]
    nir: Option<PathBuf>,
    #[arg(long)]
    swir1: Option<PathBuf>,
    #[arg(long)]
    swir2: Option<PathBuf>,
    /// Generic single-band GeoTIFF
    #[arg(long)]
    tif: Option<PathBuf>,

    /// Operation parameters as a JSON object
    #[arg(short, long, default_value = "{}")]
    params: String,

    /// Store objects in this directory instead of the configured bucket
    #[arg(long, env = "OBJECT_STORAGE_LOCAL_ROOT")]
    storage_root: Option<PathBuf>,

    /// Local cache for band files
    #[arg(long, env = "CACHE_FOLDER")]
    cache_dir: Option<PathBuf>,

    /// List the available operations and exit
    #[arg(long)]
    list: bool,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Args {
    fn band_paths(&self) -> Vec<(BandRole, &PathBuf)> {
        [
            (BandRole::Blue, &self.blue),
            (BandRole::Green, &self.green),
            (BandRole::Red, &self.red),
            (BandRole::Nir, &self.nir),
            (BandRole::Swir1, &self.swir1),
            (BandRole::Swir2, &self.swir2),
            (BandRole::Tif, &self.tif),
        ]
        .into_iter()
        .filter_map(|(role, path)| path.as_ref().map(|p| (role, p)))
        .collect()
    }

    fn extra_params(&self) -> Result<ExtraParams> {
        let value: serde_json::Value =
            serde_json::from_str(&self.params).context("--params is not valid JSON")?;
        match value {
            serde_json::Value::Object(map) => Ok(map),
            _ => bail!("--params must be a JSON object"),
        }
    }
}

fn init_tracing(log_level: &str) -> Result<()> {
    let level = match log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .json()
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

fn print_registry(registry: &OperationRegistry) -> Result<()> {
    let entries: Vec<serde_json::Value> = registry
        .entries()
        .map(|entry| {
            serde_json::json!({
                "name": entry.name,
                "family": entry.family().name(),
                "bands": entry.required_bands().iter().map(|r| r.as_str()).collect::<Vec<_>>(),
                "alias_of": entry.is_alias().then(|| entry.kind.name()),
            })
        })
        .collect();
    println!("{}", serde_json::to_string_pretty(&entries)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();
    init_tracing(&args.log_level)?;

    let registry = Arc::new(OperationRegistry::standard());
    if args.list {
        return print_registry(&registry);
    }
    let operation = args.operation.clone().context("--operation is required")?;
    let params = args.extra_params()?;

    let storage_config = match &args.storage_root {
        Some(root) => ObjectStorageConfig::local(root),
        None => ObjectStorageConfig::from_env(),
    };
    let mut file_config = FileStoreConfig::from_env();
    if let Some(dir) = &args.cache_dir {
        file_config.cache_dir = dir.clone();
    }
    file_config.validate().map_err(anyhow::Error::msg)?;
    let dispatcher_config = DispatcherConfig::from_env();
    dispatcher_config.validate().map_err(anyhow::Error::msg)?;

    let objects = Arc::new(ObjectStorage::new(&storage_config)?);
    let files = Arc::new(ProjectFileStore::new(objects.clone(), file_config.clone()));
    let artifacts = Arc::new(ObjectArtifactStorage::new(objects.clone(), file_config));

    info!(bucket = objects.bucket(), operation = %operation, "Starting operator");

    let project_id = 1;
    let mut request = OperationRequest::new(operation, args.title.clone()).with_params(params);
    for (role, path) in args.band_paths() {
        let stored = files.register_local(project_id, path).await?;
        request = request.with_band(role, stored.id);
    }
    let project = Project::new(project_id, "operator").with_files(files.project_files(project_id).await);

    let dispatcher = Dispatcher::new(registry, files, artifacts, dispatcher_config);
    match dispatcher.operate(request, &project).await {
        Ok(record) => {
            println!("{}", serde_json::to_string_pretty(&record)?);
            Ok(())
        }
        Err(e) => {
            error!(error = %e, status = e.http_status_code(), "Operation failed");
            Err(e.into())
        }
    }
}
