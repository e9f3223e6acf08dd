//! Retrieval error types.

use thiserror::Error;

/// Errors that can occur while resolving a query.
#[derive(Debug, Error)]
pub enum RetrievalError {
    /// Domain type error
    #[error("Type error: {0}")]
    Types(#[from] tdt_types::TdtError),

    /// Storage error
    #[error("Storage error: {0}")]
    Storage(#[from] tdt_storage::StorageError),

    /// Facet consolidation error
    #[error("Facets error: {0}")]
    Facets(#[from] tdt_facets::FacetsError),

    /// Invalid retrieval parameters
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}
