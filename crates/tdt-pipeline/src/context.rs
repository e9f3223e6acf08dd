//! Explicit session state.
//!
//! The context owns the community-wide tables for the length of a session
//! and lends them to each stage in turn.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use tdt_facets::UnusedBacklog;
use tdt_storage::Storage;
use tdt_types::{CollectionTable, DocTable, GlobalArtifact, LabelTable, Settings};

use crate::diagnostics::Diagnostics;
use crate::error::PipelineError;

/// State shared by the stages of a session.
pub struct SessionContext {
    /// Backing store
    pub storage: Arc<Storage>,
    /// Loaded settings
    pub settings: Settings,
    /// Community label table
    pub labels: LabelTable,
    /// Community document table
    pub docs: DocTable,
    /// Community collection table
    pub collections: CollectionTable,
    /// Documents waiting for rescan
    pub backlog: UnusedBacklog,
    /// Messages for the user
    pub diagnostics: Diagnostics,
    cancel: CancellationToken,
}

impl SessionContext {
    /// Open a session, reading the community globals.
    #[instrument(skip_all, fields(community = %settings.community))]
    pub fn open(
        storage: Arc<Storage>,
        settings: Settings,
        cancel: CancellationToken,
    ) -> Result<Self, PipelineError> {
        let community = settings.community.as_str();
        let labels: LabelTable = storage
            .get_global(community, GlobalArtifact::AllLabels)?
            .unwrap_or_default();
        let docs: DocTable = storage
            .get_global(community, GlobalArtifact::AllDocs)?
            .unwrap_or_default();
        let collections: CollectionTable = storage
            .get_global(community, GlobalArtifact::AllColls)?
            .unwrap_or_default();
        let backlog: UnusedBacklog = storage
            .get_global(community, GlobalArtifact::Unused)?
            .unwrap_or_default();
        info!(
            labels = labels.len(),
            docs = docs.len(),
            collections = collections.len(),
            unused = backlog.len(),
            "Session opened"
        );

        Ok(Self {
            storage,
            settings,
            labels,
            docs,
            collections,
            backlog,
            diagnostics: Diagnostics::new(),
            cancel,
        })
    }

    /// Community name.
    pub fn community(&self) -> &str {
        &self.settings.community
    }

    /// Cancellation token of the session.
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Whether interruption was requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Write the community globals back.
    pub fn save_globals(&self) -> Result<(), PipelineError> {
        let community = self.community();
        let storage = &self.storage;
        storage.put_global(community, GlobalArtifact::AllLabels, &self.labels)?;
        storage.put_global(community, GlobalArtifact::AllDocs, &self.docs)?;
        storage.put_global(community, GlobalArtifact::AllColls, &self.collections)?;
        storage.put_global(community, GlobalArtifact::Unused, &self.backlog)?;
        debug!(community, "Globals saved");
        Ok(())
    }
}
