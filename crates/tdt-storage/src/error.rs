//! Storage layer error types.

use thiserror::Error;

/// Errors that can occur in the storage layer
#[derive(Error, Debug)]
pub enum StorageError {
    /// RocksDB operation failed
    #[error("RocksDB error: {0}")]
    RocksDb(#[from] rocksdb::Error),

    /// Column family not found
    #[error("Column family not found: {0}")]
    ColumnFamilyNotFound(String),

    /// Key encoding/decoding error
    #[error("Key error: {0}")]
    Key(String),

    /// A stored structure could not be encoded or decoded
    #[error("Serialization error in {artifact}: {message}")]
    Serialization {
        /// Artifact name
        artifact: String,
        /// Underlying error
        message: String,
    },
}

impl StorageError {
    pub(crate) fn serialization(artifact: &str, err: serde_json::Error) -> Self {
        StorageError::Serialization {
            artifact: artifact.to_string(),
            message: err.to_string(),
        }
    }
}
