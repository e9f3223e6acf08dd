//! Core reduction of the facet–document graph.
//!
//! The bipartite facet/document relation is projected onto documents: two
//! documents are adjacent when they share a retained facet, weighted by the
//! number of facets they share. A k-core decomposition of that projection
//! keeps the densely connected main core and drops weakly attached
//! documents together with facets left with fewer than two of them.

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use tdt_types::{DocId, GlobalFacetKey};

/// Facets must keep at least this many core documents.
const MIN_FACET_DOCS: usize = 2;

/// Unipartite document projection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocGraph {
    /// Shared facet count per unordered document pair `(low, high)`
    pub weights: BTreeMap<(DocId, DocId), u32>,
    /// Adjacency
    pub neighbors: BTreeMap<DocId, BTreeSet<DocId>>,
}

impl DocGraph {
    /// Project facet memberships onto documents.
    pub fn project(facets: &BTreeMap<GlobalFacetKey, BTreeSet<DocId>>) -> Self {
        let mut graph = Self::default();
        for docs in facets.values() {
            for doc in docs {
                graph.neighbors.entry(*doc).or_default();
            }
            let members: Vec<DocId> = docs.iter().copied().collect();
            for (i, a) in members.iter().enumerate() {
                for b in &members[i + 1..] {
                    *graph.weights.entry((*a, *b)).or_insert(0) += 1;
                    graph.neighbors.entry(*a).or_default().insert(*b);
                    graph.neighbors.entry(*b).or_default().insert(*a);
                }
            }
        }
        graph
    }

    /// Shared facet count of two documents.
    pub fn weight(&self, a: DocId, b: DocId) -> u32 {
        let key = if a <= b { (a, b) } else { (b, a) };
        self.weights.get(&key).copied().unwrap_or(0)
    }

    /// Core number of every document.
    ///
    /// Repeatedly removes a vertex of minimum remaining degree; a vertex's
    /// core number is the largest minimum degree seen up to its removal.
    pub fn core_numbers(&self) -> BTreeMap<DocId, u32> {
        let mut degree: BTreeMap<DocId, usize> = self
            .neighbors
            .iter()
            .map(|(doc, n)| (*doc, n.len()))
            .collect();
        let mut queue: BTreeSet<(usize, DocId)> = degree.iter().map(|(d, k)| (*k, *d)).collect();
        let mut removed = BTreeSet::new();
        let mut cores = BTreeMap::new();
        let mut k = 0;

        while let Some((d, doc)) = queue.pop_first() {
            k = k.max(d);
            cores.insert(doc, k as u32);
            removed.insert(doc);
            let Some(neighbors) = self.neighbors.get(&doc) else {
                continue;
            };
            for n in neighbors {
                if removed.contains(n) {
                    continue;
                }
                if let Some(nd) = degree.get_mut(n) {
                    queue.remove(&(*nd, *n));
                    *nd = nd.saturating_sub(1);
                    queue.insert((*nd, *n));
                }
            }
        }
        cores
    }
}

/// Result of core reduction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoreReduction {
    /// Core number of every candidate document
    pub core_numbers: BTreeMap<DocId, u32>,
    /// Core number a document needed to stay
    pub threshold: u32,
    /// Documents of the main core
    pub docs: BTreeSet<DocId>,
    /// Retained facets with their core documents
    pub facets: BTreeMap<GlobalFacetKey, BTreeSet<DocId>>,
    /// Document projection before reduction
    pub graph: DocGraph,
}

impl CoreReduction {
    /// Whether nothing survived.
    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }
}

/// Keep the main core of the facet–document graph.
///
/// Documents stay when their core number reaches
/// `min(core_number, max core)`, so a request deeper than the graph falls
/// back to its densest core.
pub fn reduce_to_core(
    facets: &BTreeMap<GlobalFacetKey, BTreeSet<DocId>>,
    core_number: u32,
) -> CoreReduction {
    let graph = DocGraph::project(facets);
    let core_numbers = graph.core_numbers();
    let max_core = core_numbers.values().copied().max().unwrap_or(0);
    let threshold = core_number.min(max_core);

    let docs: BTreeSet<DocId> = core_numbers
        .iter()
        .filter(|(_, c)| **c >= threshold)
        .map(|(d, _)| *d)
        .collect();
    let kept: BTreeMap<GlobalFacetKey, BTreeSet<DocId>> = facets
        .iter()
        .map(|(key, members)| {
            let core: BTreeSet<DocId> = members.intersection(&docs).copied().collect();
            (*key, core)
        })
        .filter(|(_, members)| members.len() >= MIN_FACET_DOCS)
        .collect();
    // Documents only reachable through dropped facets go too.
    let docs: BTreeSet<DocId> = kept.values().flatten().copied().collect();

    debug!(
        candidates = core_numbers.len(),
        threshold,
        max_core,
        docs = docs.len(),
        facets = kept.len(),
        "Core reduction"
    );
    CoreReduction {
        core_numbers,
        threshold,
        docs,
        facets: kept,
        graph,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn facets(entries: &[(GlobalFacetKey, &[DocId])]) -> BTreeMap<GlobalFacetKey, BTreeSet<DocId>> {
        entries
            .iter()
            .map(|(k, docs)| (*k, docs.iter().copied().collect()))
            .collect()
    }

    #[test]
    fn test_projection_weights() {
        let graph = DocGraph::project(&facets(&[(1, &[1, 2, 3]), (2, &[2, 3])]));
        assert_eq!(graph.weight(2, 3), 2);
        assert_eq!(graph.weight(3, 2), 2);
        assert_eq!(graph.weight(1, 2), 1);
        assert_eq!(graph.weight(1, 4), 0);
    }

    #[test]
    fn test_core_numbers() {
        // Triangle 1-2-3 with a pendant 4 on 3.
        let graph = DocGraph::project(&facets(&[(1, &[1, 2, 3]), (2, &[3, 4])]));
        let cores = graph.core_numbers();
        assert_eq!(cores[&1], 2);
        assert_eq!(cores[&2], 2);
        assert_eq!(cores[&3], 2);
        assert_eq!(cores[&4], 1);
    }

    #[test]
    fn test_weak_documents_and_facets_dropped() {
        let input = facets(&[(1, &[1, 2, 3]), (2, &[2, 3, 4]), (3, &[5, 6])]);
        let reduction = reduce_to_core(&input, 2);
        assert_eq!(reduction.threshold, 2);
        assert_eq!(reduction.docs, BTreeSet::from([1, 2, 3, 4]));
        assert!(reduction.facets.contains_key(&1));
        assert!(reduction.facets.contains_key(&2));
        assert!(!reduction.facets.contains_key(&3));
    }

    #[test]
    fn test_core_request_falls_back_to_max_core() {
        let input = facets(&[(1, &[1, 2]), (2, &[3, 4])]);
        let reduction = reduce_to_core(&input, 5);
        assert_eq!(reduction.threshold, 1);
        assert_eq!(reduction.docs.len(), 4);
    }

    #[test]
    fn test_empty_input() {
        let reduction = reduce_to_core(&BTreeMap::new(), 2);
        assert!(reduction.is_empty());
        assert_eq!(reduction.threshold, 0);
    }
}
