//! Error types for the session pipeline.

use thiserror::Error;

/// Errors that end a session.
///
/// Per-file problems and missing prerequisites are not errors; they are
/// recorded as diagnostics and the session goes on.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Domain type error
    #[error("Type error: {0}")]
    Types(#[from] tdt_types::TdtError),

    /// Storage operation failed
    #[error("Storage error: {0}")]
    Storage(#[from] tdt_storage::StorageError),

    /// Graph stage failed
    #[error("Graph error: {0}")]
    Graph(#[from] tdt_graph::GraphError),

    /// Facet stage failed
    #[error("Facets error: {0}")]
    Facets(#[from] tdt_facets::FacetsError),

    /// Checkpoint load/save issues
    #[error("Checkpoint error: {0}")]
    Checkpoint(String),

    /// JSON encoding/decoding errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Input directory problems
    #[error("Input error: {0}")]
    Input(String),
}

impl From<serde_json::Error> for PipelineError {
    fn from(err: serde_json::Error) -> Self {
        PipelineError::Serialization(err.to_string())
    }
}
