//! Names of persisted structures.
//!
//! Window artifacts are named `"<scope>_<Kind>.<suffix>"`; cross-window
//! globals carry one canonical name per community.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ids::SHARD_COUNT;
use crate::scope::Scope;

/// Kinds of per-window artifacts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum WindowArtifact {
    /// Vertex statistics and information values
    Vertices,
    /// Full positional arc table
    Arcs,
    /// Informative vertex weights (infoMap)
    InfoTok,
    /// Informative arcs per document
    InfoArc,
    /// Associations (walks) per document
    Assoc,
    /// Local facet key -> documents
    Topics,
    /// Local facet key -> defining arcs
    TopArcs,
    /// Documents rescanned into this window
    Rescanned,
}

impl WindowArtifact {
    /// All window artifact kinds.
    pub const ALL: [WindowArtifact; 8] = [
        WindowArtifact::Vertices,
        WindowArtifact::Arcs,
        WindowArtifact::InfoTok,
        WindowArtifact::InfoArc,
        WindowArtifact::Assoc,
        WindowArtifact::Topics,
        WindowArtifact::TopArcs,
        WindowArtifact::Rescanned,
    ];

    /// Name component and suffix, e.g. `"Vertices.vrtx"`.
    pub fn file_part(&self) -> &'static str {
        match self {
            WindowArtifact::Vertices => "Vertices.vrtx",
            WindowArtifact::Arcs => "Arcs.arcs",
            WindowArtifact::InfoTok => "InfoTok.info",
            WindowArtifact::InfoArc => "InfoArc.arcs",
            WindowArtifact::Assoc => "Assoc.assc",
            WindowArtifact::Topics => "Topics.tpc",
            WindowArtifact::TopArcs => "TopArcs.tas",
            WindowArtifact::Rescanned => "Rescanned.rse",
        }
    }

    /// Full artifact name for a scope.
    pub fn name(&self, scope: &Scope) -> String {
        format!("{}_{}", scope, self.file_part())
    }

    /// Split an artifact name back into scope and kind.
    pub fn parse_name(name: &str) -> Option<(Scope, WindowArtifact)> {
        let (scope, part) = name.split_once('_')?;
        let scope = scope.parse().ok()?;
        let kind = Self::ALL.into_iter().find(|k| k.file_part() == part)?;
        Some((scope, kind))
    }
}

impl fmt::Display for WindowArtifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.file_part())
    }
}

/// Cross-window structures, one per community.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GlobalArtifact {
    /// Label table
    AllLabels,
    /// Document table
    AllDocs,
    /// Collection table
    AllColls,
    /// Global facet key registry
    FacetKeys,
    /// Global facet key -> source scope index
    ScopeFacet,
    /// Unused document backlog
    Unused,
    /// Vertex -> facet dictionary shard (0-based)
    FacetDictionary(u8),
}

impl GlobalArtifact {
    /// Canonical name.
    pub fn name(&self) -> String {
        match self {
            GlobalArtifact::AllLabels => "AllLabels.lbls".to_string(),
            GlobalArtifact::AllDocs => "AllDocs.dtab".to_string(),
            GlobalArtifact::AllColls => "AllColls.ctab".to_string(),
            GlobalArtifact::FacetKeys => "FacetKeys.dic".to_string(),
            GlobalArtifact::ScopeFacet => "ScopeFacet.scp".to_string(),
            GlobalArtifact::Unused => "Unused.und".to_string(),
            GlobalArtifact::FacetDictionary(shard) => format!("FacetDic{}.dic", shard + 1),
        }
    }

    /// All dictionary shard artifacts.
    pub fn dictionary_shards() -> impl Iterator<Item = GlobalArtifact> {
        (0..SHARD_COUNT as u8).map(GlobalArtifact::FacetDictionary)
    }
}

/// A window file consumed by facet consolidation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FacetFileEntry {
    /// Local topic map
    Topics(String),
    /// Rescanned documents
    Rescanned(String),
    /// Vertex table
    Vertices(String),
    /// Informative vertex weights
    Info(String),
}

impl FacetFileEntry {
    /// The four entries consolidation reads for one window.
    pub fn for_scope(scope: &Scope) -> [FacetFileEntry; 4] {
        [
            FacetFileEntry::Topics(WindowArtifact::Topics.name(scope)),
            FacetFileEntry::Rescanned(WindowArtifact::Rescanned.name(scope)),
            FacetFileEntry::Vertices(WindowArtifact::Vertices.name(scope)),
            FacetFileEntry::Info(WindowArtifact::InfoTok.name(scope)),
        ]
    }

    /// Artifact name the entry points at.
    pub fn name(&self) -> &str {
        match self {
            FacetFileEntry::Topics(n)
            | FacetFileEntry::Rescanned(n)
            | FacetFileEntry::Vertices(n)
            | FacetFileEntry::Info(n) => n,
        }
    }
}
