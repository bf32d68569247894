//! Operation dispatch for openrs.
//!
//! [`Dispatcher::operate`] turns an [`OperationRequest`] into a persisted
//! artifact, delegating file resolution and persistence to the
//! collaborators in the `storage` crate.

pub mod config;
pub mod dispatcher;
pub mod request;

pub use config::DispatcherConfig;
pub use dispatcher::{Dispatcher, ARTIFACT_EXTENSION};
pub use request::OperationRequest;
