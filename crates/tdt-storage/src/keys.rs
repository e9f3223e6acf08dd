//! Key encoding and decoding for the storage layer.
//!
//! Key format: `{community}/{name}`
//! - community: the document community the store section belongs to
//! - name: artifact name (`<scope>_<Kind>.<suffix>` or a global name) or a
//!   checkpoint job name
//!
//! Prefix scans over `{community}/` list everything a community owns.

use crate::error::StorageError;

const SEPARATOR: char = '/';

/// Key of a named structure inside a community.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactKey {
    /// Community name
    pub community: String,
    /// Artifact name
    pub name: String,
}

impl ArtifactKey {
    /// Create a key.
    pub fn new(community: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            community: community.into(),
            name: name.into(),
        }
    }

    /// Encode key to bytes for storage
    pub fn to_bytes(&self) -> Vec<u8> {
        format!("{}{}{}", self.community, SEPARATOR, self.name).into_bytes()
    }

    /// Decode key from bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, StorageError> {
        let s = std::str::from_utf8(bytes)
            .map_err(|e| StorageError::Key(format!("Invalid UTF-8: {}", e)))?;
        let (community, name) = s
            .split_once(SEPARATOR)
            .ok_or_else(|| StorageError::Key(format!("Invalid artifact key format: {}", s)))?;
        if community.is_empty() || name.is_empty() {
            return Err(StorageError::Key(format!("Invalid artifact key format: {}", s)));
        }
        Ok(Self::new(community, name))
    }

    /// Prefix selecting every key of a community.
    pub fn community_prefix(community: &str) -> Vec<u8> {
        format!("{}{}", community, SEPARATOR).into_bytes()
    }
}

/// Key for checkpoint entries
/// Format: {community}/checkpoint:{job_name}
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckpointKey {
    /// Community name
    pub community: String,
    /// Job name (e.g. a scope string)
    pub job_name: String,
}

impl CheckpointKey {
    pub fn new(community: impl Into<String>, job_name: impl Into<String>) -> Self {
        Self {
            community: community.into(),
            job_name: job_name.into(),
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        format!("{}{}checkpoint:{}", self.community, SEPARATOR, self.job_name).into_bytes()
    }
}
