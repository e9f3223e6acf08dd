//! Facet error types.

use thiserror::Error;

use crate::maker::FacetState;

/// Errors that can occur while making or consolidating facets.
#[derive(Debug, Error)]
pub enum FacetsError {
    /// Domain type error
    #[error("Type error: {0}")]
    Types(#[from] tdt_types::TdtError),

    /// Storage error
    #[error("Storage error: {0}")]
    Storage(#[from] tdt_storage::StorageError),

    /// Graph error
    #[error("Graph error: {0}")]
    Graph(#[from] tdt_graph::GraphError),

    /// A facet maker step was called out of order
    #[error("Invalid facet state transition: {from:?} -> {to:?}")]
    InvalidState {
        /// Current state
        from: FacetState,
        /// Requested state
        to: FacetState,
    },

    /// Window artifacts required for a merge are absent
    #[error("Necessary components are missing: {0:?}")]
    MissingComponents(Vec<String>),
}
