//! Graph error types.

use thiserror::Error;

/// Errors raised while building or analysing the term graph.
#[derive(Debug, Error)]
pub enum GraphError {
    /// Domain type error
    #[error("Type error: {0}")]
    Types(#[from] tdt_types::TdtError),

    /// Storage error
    #[error("Storage error: {0}")]
    Storage(#[from] tdt_storage::StorageError),

    /// A token sits at the last representable position
    #[error("Token position {0} leaves no room for the closing boundary")]
    PositionOverflow(u32),

    /// Baseline list could not be used
    #[error("Baseline error: {0}")]
    Baseline(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
