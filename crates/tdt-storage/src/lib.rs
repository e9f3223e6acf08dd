//! Storage layer for topic detection and tracking.
//!
//! Provides RocksDB-backed storage with:
//! - Column family isolation for window artifacts, globals and checkpoints
//! - Community-prefixed keys so several communities share one store
//! - JSON encoding of named structures

pub mod column_families;
pub mod db;
pub mod error;
pub mod keys;

pub use column_families::{ALL_CF_NAMES, CF_CHECKPOINTS, CF_GLOBALS, CF_WINDOWS};
pub use db::{Storage, StorageStats};
pub use error::StorageError;
pub use keys::{ArtifactKey, CheckpointKey};
