//! Error types for openrs operations.

use std::path::PathBuf;
use thiserror::Error;

use crate::band::BandRole;
use crate::project::{FileId, ProjectId};

/// Result type alias using OpenRsError.
pub type OpenRsResult<T> = Result<T, OpenRsError>;

/// Primary error type for band operations.
#[derive(Debug, Error)]
pub enum OpenRsError {
    // === Request Errors ===
    #[error("Operation '{operation}' requires band(s) that were not supplied: {}", join_roles(.missing))]
    MissingBand {
        operation: String,
        missing: Vec<BandRole>,
    },

    #[error("Invalid parameter value for '{param}': {message}")]
    InvalidParameter { param: String, message: String },

    #[error("Operation type '{operation}' not allowed (valid: {})", .valid.join(", "))]
    UnknownOperation {
        operation: String,
        valid: Vec<String>,
    },

    #[error("Files with ids {} not found in project", join_ids(.0))]
    BandsNotFound(Vec<FileId>),

    #[error("File {file_id} not found in project {project_id}")]
    FileNotFound { file_id: FileId, project_id: ProjectId },

    #[error("Band '{role}' is {found_height}x{found_width}, expected {height}x{width}")]
    ShapeMismatch {
        role: BandRole,
        height: usize,
        width: usize,
        found_height: usize,
        found_width: usize,
    },

    // === Data Errors ===
    #[error("Source file not found: {}", .0.display())]
    SourceNotFound(PathBuf),

    #[error("Failed to decode raster {}: {message}", .path.display())]
    DecodeError { path: PathBuf, message: String },

    // === Contract Errors ===
    #[error("{0} has not been calculated, call compute first")]
    NotComputed(String),

    // === Infrastructure Errors ===
    #[error("Rendering failed: {0}")]
    RenderError(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Internal server error: {0}")]
    InternalError(String),
}

impl OpenRsError {
    /// Build an InvalidParameter error.
    pub fn invalid_parameter(param: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidParameter {
            param: param.into(),
            message: message.into(),
        }
    }

    /// Build a DecodeError for a path.
    pub fn decode(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::DecodeError {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Get the HTTP status code for this error.
    pub fn http_status_code(&self) -> u16 {
        match self {
            OpenRsError::MissingBand { .. } | OpenRsError::ShapeMismatch { .. } => 412,

            OpenRsError::InvalidParameter { .. } => 412,

            OpenRsError::UnknownOperation { .. } => 403,

            OpenRsError::BandsNotFound(_)
            | OpenRsError::FileNotFound { .. }
            | OpenRsError::SourceNotFound(_) => 404,

            _ => 500,
        }
    }

    /// Whether the caller can correct this error by changing the request.
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.http_status_code())
    }
}

fn join_roles(roles: &[BandRole]) -> String {
    roles.iter().map(|r| r.as_str()).collect::<Vec<_>>().join(", ")
}

fn join_ids(ids: &[FileId]) -> String {
    ids.iter().map(|id| id.to_string()).collect::<Vec<_>>().join(", ")
}

impl From<std::io::Error> for OpenRsError {
    fn from(err: std::io::Error) -> Self {
        OpenRsError::InternalError(err.to_string())
    }
}

impl From<serde_json::Error> for OpenRsError {
    fn from(err: serde_json::Error) -> Self {
        OpenRsError::InternalError(format!("JSON error: {}", err))
    }
}
