//! Per-vertex statistics.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::doc::CollectionKey;
use crate::ids::{VertexId, BOUNDARY_VERTEX};

/// Occurrence counts of a vertex inside one collection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VertexCounts {
    /// Raw token occurrences
    pub occurrences: u64,
    /// Documents containing the vertex
    pub documents: u32,
}

/// A term vertex with its link and occurrence statistics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Vertex {
    /// Vertex id
    pub id: VertexId,
    /// Counts per collection
    #[serde(default)]
    pub counts: BTreeMap<CollectionKey, VertexCounts>,
    /// Distinct left neighbours
    #[serde(default)]
    pub in_links: BTreeSet<VertexId>,
    /// Distinct right neighbours
    #[serde(default)]
    pub out_links: BTreeSet<VertexId>,
    /// Information value per collection
    #[serde(default)]
    pub info_values: BTreeMap<CollectionKey, f64>,
}

impl Vertex {
    /// Create a vertex with no statistics.
    pub fn new(id: VertexId) -> Self {
        Self {
            id,
            ..Default::default()
        }
    }

    /// Occurrences summed over all collections.
    pub fn total_occurrences(&self) -> u64 {
        self.counts.values().map(|c| c.occurrences).sum()
    }

    /// Documents containing the vertex, summed over all collections.
    pub fn total_documents(&self) -> u32 {
        self.counts.values().map(|c| c.documents).sum()
    }

    /// Number of collections the vertex occurs in.
    pub fn collection_count(&self) -> usize {
        self.counts.values().filter(|c| c.occurrences > 0).count()
    }

    /// Distinct neighbours on either side.
    pub fn link_count(&self) -> usize {
        self.in_links.union(&self.out_links).count()
    }

    /// Information value in one collection (0 when never computed).
    pub fn info_value(&self, collection: &str) -> f64 {
        self.info_values.get(collection).copied().unwrap_or(0.0)
    }

    /// Highest information value over all collections.
    pub fn max_info_value(&self) -> f64 {
        self.info_values.values().copied().fold(0.0, f64::max)
    }
}

/// All vertices of a window keyed by id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VerticesTable {
    vertices: BTreeMap<VertexId, Vertex>,
}

impl VerticesTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a vertex.
    pub fn get(&self, id: VertexId) -> Option<&Vertex> {
        self.vertices.get(&id)
    }

    /// Get a vertex mutably.
    pub fn get_mut(&mut self, id: VertexId) -> Option<&mut Vertex> {
        self.vertices.get_mut(&id)
    }

    /// Get or create a vertex.
    pub fn entry(&mut self, id: VertexId) -> &mut Vertex {
        self.vertices.entry(id).or_insert_with(|| Vertex::new(id))
    }

    /// Count one occurrence of `id` in `collection`.
    ///
    /// `first_in_document` bumps the document counter as well.
    pub fn record_occurrence(&mut self, id: VertexId, collection: &str, first_in_document: bool) {
        if id == BOUNDARY_VERTEX {
            return;
        }
        let counts = self
            .entry(id)
            .counts
            .entry(collection.to_string())
            .or_default();
        counts.occurrences += 1;
        if first_in_document {
            counts.documents += 1;
        }
    }

    /// Record a directed link `left -> right` in the link table.
    pub fn record_link(&mut self, left: VertexId, right: VertexId) {
        if left == BOUNDARY_VERTEX || right == BOUNDARY_VERTEX {
            return;
        }
        self.entry(left).out_links.insert(right);
        self.entry(right).in_links.insert(left);
    }

    /// Iterate vertices in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Vertex> {
        self.vertices.values()
    }

    /// Iterate vertices mutably.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Vertex> {
        self.vertices.values_mut()
    }

    /// Number of vertices.
    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }
}
