//! Common types shared across the openrs crates.
//!
//! Everything that crosses a crate boundary lives here: the semantic band
//! roles, the project / artifact value types exchanged with the storage
//! collaborators, and the error taxonomy surfaced to clients.

pub mod band;
pub mod error;
pub mod project;

pub use band::{BandFileIds, BandRole};
pub use error::{OpenRsError, OpenRsResult};
pub use project::{ArtifactRecord, FileId, PendingArtifact, Project, ProjectId};

/// Open-ended operation parameters, interpreted only by the selected calculator.
pub type ExtraParams = serde_json::Map<String, serde_json::Value>;
