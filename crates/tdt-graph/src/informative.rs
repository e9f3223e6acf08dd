//! Partition of vertices into informative and rejected sets.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use tdt_storage::Storage;
use tdt_types::{Scope, VertexId, VerticesTable, WindowArtifact, BOUNDARY_VERTEX};

use crate::error::GraphError;

/// Informative vertex weights (`infoMap`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InfoMap {
    weights: BTreeMap<VertexId, f64>,
}

impl InfoMap {
    /// Create an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Weight of an informative vertex.
    pub fn weight(&self, id: VertexId) -> Option<f64> {
        self.weights.get(&id).copied()
    }

    /// Whether `id` is informative.
    pub fn contains(&self, id: VertexId) -> bool {
        self.weights.contains_key(&id)
    }

    /// Set a weight.
    pub fn insert(&mut self, id: VertexId, weight: f64) {
        self.weights.insert(id, weight);
    }

    /// Informative vertex ids.
    pub fn ids(&self) -> BTreeSet<VertexId> {
        self.weights.keys().copied().collect()
    }

    /// Iterate `(id, weight)` in id order.
    pub fn iter(&self) -> impl Iterator<Item = (VertexId, f64)> + '_ {
        self.weights.iter().map(|(k, v)| (*k, *v))
    }

    /// Number of informative vertices.
    pub fn len(&self) -> usize {
        self.weights.len()
    }

    /// Whether nothing is informative.
    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }
}

impl FromIterator<(VertexId, f64)> for InfoMap {
    fn from_iter<I: IntoIterator<Item = (VertexId, f64)>>(iter: I) -> Self {
        Self {
            weights: iter.into_iter().collect(),
        }
    }
}

/// Result of partitioning a vertex table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Partition {
    /// Informative vertices and their weights
    pub info_map: InfoMap,
    /// Everything else
    pub rejected: BTreeSet<VertexId>,
}

/// Threshold filter over computed information values.
#[derive(Debug, Clone)]
pub struct InformativeTokens {
    threshold: f64,
    baseline: BTreeSet<VertexId>,
}

impl InformativeTokens {
    /// Filter with a value threshold.
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold,
            baseline: BTreeSet::new(),
        }
    }

    /// Also reject the given baseline vertices.
    pub fn with_baseline(mut self, baseline: BTreeSet<VertexId>) -> Self {
        self.baseline = baseline;
        self
    }

    /// Threshold in use.
    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Split vertices by `max_info_value > threshold`.
    ///
    /// The weight of an informative vertex is its highest value over the
    /// collections it occurs in.
    pub fn partition(&self, vertices: &VerticesTable) -> Partition {
        let mut partition = Partition::default();
        for vertex in vertices.iter() {
            let value = vertex.max_info_value();
            if vertex.id != BOUNDARY_VERTEX
                && !self.baseline.contains(&vertex.id)
                && value > self.threshold
            {
                partition.info_map.insert(vertex.id, value);
            } else {
                partition.rejected.insert(vertex.id);
            }
        }
        info!(
            informative = partition.info_map.len(),
            rejected = partition.rejected.len(),
            threshold = self.threshold,
            "Vertices partitioned"
        );
        partition
    }
}

/// Persist the informative map of a window.
#[instrument(skip(storage, info_map), fields(scope = %scope))]
pub fn store_info_map(
    storage: &Storage,
    community: &str,
    scope: &Scope,
    info_map: &InfoMap,
) -> Result<(), GraphError> {
    storage.put_window(community, scope, WindowArtifact::InfoTok, info_map)?;
    Ok(())
}

/// Reload the informative map of a window without recomputing values.
#[instrument(skip(storage), fields(scope = %scope))]
pub fn retrieve_info_map(
    storage: &Storage,
    community: &str,
    scope: &Scope,
) -> Result<Option<InfoMap>, GraphError> {
    Ok(storage.get_window(community, scope, WindowArtifact::InfoTok)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tdt_types::Vertex;
    use tempfile::TempDir;

    fn table(values: &[(VertexId, f64)]) -> VerticesTable {
        let mut table = VerticesTable::new();
        for &(id, value) in values {
            let vertex: &mut Vertex = table.entry(id);
            vertex.info_values.insert("c".to_string(), value);
        }
        table
    }

    #[test]
    fn test_partition_by_threshold() {
        let vertices = table(&[(1, 0.05), (2, 0.1), (3, 0.4)]);
        let partition = InformativeTokens::new(0.1).partition(&vertices);
        assert_eq!(partition.info_map.ids(), BTreeSet::from([3]));
        assert_eq!(partition.rejected, BTreeSet::from([1, 2]));
        assert_eq!(partition.info_map.weight(3), Some(0.4));
    }

    #[test]
    fn test_partition_rejects_baseline() {
        let vertices = table(&[(1, 0.9), (2, 0.9)]);
        let partition = InformativeTokens::new(0.1)
            .with_baseline([2].into_iter().collect())
            .partition(&vertices);
        assert!(partition.info_map.contains(1));
        assert!(!partition.info_map.contains(2));
    }

    #[test]
    fn test_partition_is_deterministic() {
        let vertices = table(&[(1, 0.2), (2, 0.3), (3, 0.0)]);
        let filter = InformativeTokens::new(0.1);
        assert_eq!(filter.partition(&vertices), filter.partition(&vertices));
    }

    #[test]
    fn test_info_map_persist_and_retrieve() {
        let temp = TempDir::new().unwrap();
        let storage = Storage::open(temp.path()).unwrap();
        let info_map: InfoMap = [(4, 0.5), (9, 0.25)].into_iter().collect();

        store_info_map(&storage, "news", &Scope::AllDates, &info_map).unwrap();
        let back = retrieve_info_map(&storage, "news", &Scope::AllDates)
            .unwrap()
            .unwrap();
        assert_eq!(back, info_map);
        assert!(retrieve_info_map(&storage, "other", &Scope::AllDates)
            .unwrap()
            .is_none());
    }
}
