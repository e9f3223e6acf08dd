//! Per-window session checkpoints.
//!
//! A checkpoint records the last stage a window completed and how many
//! input files it had read. A window whose checkpoint reached
//! [`SessionStage::Done`] is skipped on rerun unless forced; any other
//! window is rerun from its input files.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tdt_storage::Storage;
use tdt_types::Scope;

use crate::error::PipelineError;

/// Stages of a window run, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStage {
    /// Input files read
    Traversal,
    /// Vertices and arcs built and stored
    Network,
    /// Information values computed
    InfoValues,
    /// Informative map stored
    Partition,
    /// Informative arcs and associations stored
    Associations,
    /// Window facets stored
    Facets,
    /// Window merged into the global dictionary
    Consolidated,
    /// Globals written
    Done,
}

impl std::fmt::Display for SessionStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SessionStage::Traversal => "traversal",
            SessionStage::Network => "network",
            SessionStage::InfoValues => "info_values",
            SessionStage::Partition => "partition",
            SessionStage::Associations => "associations",
            SessionStage::Facets => "facets",
            SessionStage::Consolidated => "consolidated",
            SessionStage::Done => "done",
        };
        f.write_str(name)
    }
}

/// Progress of one window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionCheckpoint {
    /// Window
    pub scope: Scope,

    /// Last completed stage
    pub stage: Option<SessionStage>,

    /// Input files read so far
    pub files_processed: u64,

    /// Input files found
    pub files_total: u64,

    /// Last update (milliseconds since epoch for JSON compatibility)
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub updated_at: DateTime<Utc>,

    /// When the window was first started
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

impl SessionCheckpoint {
    /// Fresh checkpoint for a window.
    pub fn new(scope: Scope) -> Self {
        let now = Utc::now();
        Self {
            scope,
            stage: None,
            files_processed: 0,
            files_total: 0,
            updated_at: now,
            created_at: now,
        }
    }

    /// Storage job name.
    pub fn job_name(scope: &Scope) -> String {
        format!("session:{}", scope)
    }

    /// Record a completed stage.
    pub fn complete(&mut self, stage: SessionStage) {
        self.stage = Some(stage);
        self.updated_at = Utc::now();
    }

    /// Whether the window finished.
    pub fn is_done(&self) -> bool {
        self.stage == Some(SessionStage::Done)
    }

    /// Serialize to JSON bytes for storage
    pub fn to_bytes(&self) -> Result<Vec<u8>, PipelineError> {
        serde_json::to_vec(self).map_err(PipelineError::from)
    }

    /// Deserialize from JSON bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, PipelineError> {
        serde_json::from_slice(bytes).map_err(PipelineError::from)
    }

    /// Load the checkpoint of a window.
    pub fn load(
        storage: &Storage,
        community: &str,
        scope: &Scope,
    ) -> Result<Option<Self>, PipelineError> {
        storage
            .get_checkpoint(community, &Self::job_name(scope))?
            .map(|bytes| Self::from_bytes(&bytes))
            .transpose()
    }

    /// Save this checkpoint.
    pub fn save(&self, storage: &Storage, community: &str) -> Result<(), PipelineError> {
        storage.put_checkpoint(community, &Self::job_name(&self.scope), &self.to_bytes()?)?;
        Ok(())
    }
}
