//! Vertex → facet dictionary, sharded by the vertex id's leading digit.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use tdt_storage::Storage;
use tdt_types::{shard_index, GlobalArtifact, GlobalFacetKey, VertexId, SHARD_COUNT};

use crate::error::FacetsError;

/// One dictionary shard.
pub type ShardMap = BTreeMap<VertexId, BTreeSet<GlobalFacetKey>>;

/// Union `other` into `target`, per vertex.
///
/// Commutative and idempotent: applying the same shard twice changes
/// nothing the second time.
pub fn combine(target: &mut ShardMap, other: &ShardMap) -> usize {
    let mut added = 0;
    for (vertex, keys) in other {
        let entry = target.entry(*vertex).or_default();
        for key in keys {
            if entry.insert(*key) {
                added += 1;
            }
        }
    }
    added
}

/// The nine dictionary shards.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacetDictionary {
    shards: [ShardMap; SHARD_COUNT],
}

impl FacetDictionary {
    /// Create an empty dictionary.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `vertex` occurs in facet `key`. The boundary vertex is
    /// ignored.
    pub fn insert(&mut self, vertex: VertexId, key: GlobalFacetKey) -> bool {
        match shard_index(vertex) {
            Some(shard) => self.shards[shard].entry(vertex).or_default().insert(key),
            None => false,
        }
    }

    /// Facets of a vertex.
    pub fn facets(&self, vertex: VertexId) -> Option<&BTreeSet<GlobalFacetKey>> {
        let shard = shard_index(vertex)?;
        self.shards[shard].get(&vertex)
    }

    /// One shard.
    pub fn shard(&self, index: usize) -> Option<&ShardMap> {
        self.shards.get(index)
    }

    /// Merge another dictionary shard by shard; returns new entries.
    pub fn combine(&mut self, other: &FacetDictionary) -> usize {
        self.shards
            .iter_mut()
            .zip(other.shards.iter())
            .map(|(mine, theirs)| combine(mine, theirs))
            .sum()
    }

    /// Vertices with at least one facet.
    pub fn vertex_count(&self) -> usize {
        self.shards.iter().map(BTreeMap::len).sum()
    }

    /// Total `(vertex, facet)` entries.
    pub fn entry_count(&self) -> usize {
        self.shards
            .iter()
            .flat_map(|s| s.values())
            .map(BTreeSet::len)
            .sum()
    }

    /// Whether the dictionary is empty.
    pub fn is_empty(&self) -> bool {
        self.shards.iter().all(BTreeMap::is_empty)
    }

    /// Load all shards; absent shards are empty.
    #[instrument(skip(storage))]
    pub fn load(storage: &Storage, community: &str) -> Result<Self, FacetsError> {
        let mut dictionary = Self::new();
        for (index, artifact) in GlobalArtifact::dictionary_shards().enumerate() {
            if let Some(shard) = storage.get_global::<ShardMap>(community, artifact)? {
                dictionary.shards[index] = shard;
            }
        }
        debug!(vertices = dictionary.vertex_count(), "Dictionary loaded");
        Ok(dictionary)
    }

    /// Persist every shard.
    #[instrument(skip(self, storage))]
    pub fn store(&self, storage: &Storage, community: &str) -> Result<(), FacetsError> {
        for (shard, artifact) in self.shards.iter().zip(GlobalArtifact::dictionary_shards()) {
            storage.put_global(community, artifact, shard)?;
        }
        Ok(())
    }
}
