//! Pairwise document similarity over the reduced core.

use std::collections::{BTreeMap, BTreeSet};

use rayon::prelude::*;
use serde::Serialize;
use tracing::debug;

use tdt_types::{ArcKey, DocId, Scope, VertexId};

/// Informative evidence of one core document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocEvidence {
    /// Document id
    pub doc_id: DocId,
    /// Window the evidence was read from
    pub origin: Scope,
    /// Informative vertices with their window weights
    pub vertices: BTreeMap<VertexId, f64>,
    /// Informative arc keys
    pub arcs: BTreeSet<ArcKey>,
    /// Association phrases (vertex sequences of walks)
    pub phrases: BTreeSet<Vec<VertexId>>,
}

/// Weighted Jaccard overlap of two vertex weight maps.
///
/// Weights of a vertex seen in both documents may come from different
/// windows; the smaller counts toward the intersection and the larger
/// toward the union.
pub fn sim_v(a: &BTreeMap<VertexId, f64>, b: &BTreeMap<VertexId, f64>) -> f64 {
    let mut shared = 0.0;
    let mut total = 0.0;
    for (v, wa) in a {
        match b.get(v) {
            Some(wb) => {
                shared += wa.min(*wb);
                total += wa.max(*wb);
            }
            None => total += wa,
        }
    }
    total += b
        .iter()
        .filter(|(v, _)| !a.contains_key(v))
        .map(|(_, w)| w)
        .sum::<f64>();
    if total > 0.0 {
        shared / total
    } else {
        0.0
    }
}

/// Jaccard overlap of two phrase sets; 0 when both are empty.
pub fn sim_w(a: &BTreeSet<Vec<VertexId>>, b: &BTreeSet<Vec<VertexId>>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f64 / union as f64
}

/// Similarity of one document pair and the evidence behind it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocNode {
    /// Lower document id
    pub a: DocId,
    /// Higher document id
    pub b: DocId,
    /// Blended similarity
    pub similarity: f64,
    /// Vertex overlap
    pub sim_v: f64,
    /// Walk overlap
    pub sim_w: f64,
    /// Informative vertices both documents use
    pub shared_vertices: BTreeSet<VertexId>,
    /// Informative arcs both documents use
    pub shared_arcs: BTreeSet<ArcKey>,
}

fn pair_key(a: DocId, b: DocId) -> (DocId, DocId) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Sparse symmetric similarity matrix.
///
/// Each unordered pair is stored once under `(low, high)`; pairs with zero
/// similarity are absent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SimilarityMatrix {
    nodes: BTreeMap<(DocId, DocId), DocNode>,
}

impl SimilarityMatrix {
    /// Create an empty matrix.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a node under its canonical pair; zero similarity is dropped.
    pub fn insert(&mut self, mut node: DocNode) -> bool {
        if node.similarity <= 0.0 || node.a == node.b {
            return false;
        }
        let (a, b) = pair_key(node.a, node.b);
        node.a = a;
        node.b = b;
        self.nodes.insert((a, b), node);
        true
    }

    /// Node of a pair, in either order.
    pub fn get(&self, a: DocId, b: DocId) -> Option<&DocNode> {
        self.nodes.get(&pair_key(a, b))
    }

    /// Similarity of a pair; 1 for a document with itself.
    pub fn similarity(&self, a: DocId, b: DocId) -> f64 {
        if a == b {
            return 1.0;
        }
        self.get(a, b).map_or(0.0, |n| n.similarity)
    }

    /// Sum of similarities of a document to every other.
    pub fn connectivity(&self, doc: DocId) -> f64 {
        self.nodes
            .values()
            .filter(|n| n.a == doc || n.b == doc)
            .map(|n| n.similarity)
            .sum()
    }

    /// Stored nodes in pair order.
    pub fn iter(&self) -> impl Iterator<Item = &DocNode> {
        self.nodes.values()
    }

    /// Number of stored pairs.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether no pair is stored.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Compares the documents of a reduced core.
pub struct DocAnalysis<'a> {
    evidence: &'a BTreeMap<DocId, DocEvidence>,
    alpha: f64,
}

impl<'a> DocAnalysis<'a> {
    /// Analysis with blend factor `alpha` (clamped to `[0, 1]`).
    pub fn new(evidence: &'a BTreeMap<DocId, DocEvidence>, alpha: f64) -> Self {
        Self {
            evidence,
            alpha: alpha.clamp(0.0, 1.0),
        }
    }

    /// Compare two documents.
    pub fn compare(&self, a: &DocEvidence, b: &DocEvidence) -> DocNode {
        let sim_v = sim_v(&a.vertices, &b.vertices);
        let sim_w = sim_w(&a.phrases, &b.phrases);
        let (low, high) = pair_key(a.doc_id, b.doc_id);
        DocNode {
            a: low,
            b: high,
            similarity: self.alpha * sim_v + (1.0 - self.alpha) * sim_w,
            sim_v,
            sim_w,
            shared_vertices: a
                .vertices
                .keys()
                .filter(|v| b.vertices.contains_key(v))
                .copied()
                .collect(),
            shared_arcs: a.arcs.intersection(&b.arcs).copied().collect(),
        }
    }

    /// Similarity of every document pair.
    pub fn matrix(&self) -> SimilarityMatrix {
        let docs: Vec<&DocEvidence> = self.evidence.values().collect();
        let pairs: Vec<(usize, usize)> = (0..docs.len())
            .flat_map(|i| (i + 1..docs.len()).map(move |j| (i, j)))
            .collect();
        let nodes: Vec<DocNode> = pairs
            .par_iter()
            .map(|&(i, j)| self.compare(docs[i], docs[j]))
            .collect();

        let mut matrix = SimilarityMatrix::new();
        for node in nodes {
            matrix.insert(node);
        }
        debug!(
            docs = docs.len(),
            pairs = pairs.len(),
            stored = matrix.len(),
            "Similarity matrix computed"
        );
        matrix
    }
}

/// Documents grouped around a prototype.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Cluster {
    /// Best-connected document of the group
    pub prototype: DocId,
    /// Members, prototype first, then by similarity to it
    pub members: Vec<DocId>,
}

/// Greedy prototype clustering of a similarity matrix.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Clusters {
    clusters: Vec<Cluster>,
}

impl Clusters {
    /// Group `docs` around prototypes.
    ///
    /// The unassigned document with the largest total similarity (ties to
    /// the lowest id) becomes a prototype and takes every unassigned
    /// document at least `threshold` similar to it. At most `max_results`
    /// documents are reported over all clusters; once they are used up no
    /// further cluster is formed.
    pub fn greedy(
        matrix: &SimilarityMatrix,
        docs: &BTreeSet<DocId>,
        threshold: f64,
        max_results: usize,
    ) -> Self {
        let connectivity: BTreeMap<DocId, f64> =
            docs.iter().map(|d| (*d, matrix.connectivity(*d))).collect();
        let mut unassigned = docs.clone();
        let mut clusters = Vec::new();
        let mut budget = max_results.max(1);

        while budget > 0 {
            let Some(prototype) = unassigned.iter().copied().max_by(|a, b| {
                connectivity[a]
                    .total_cmp(&connectivity[b])
                    .then_with(|| b.cmp(a))
            }) else {
                break;
            };
            unassigned.remove(&prototype);
            let mut joined: Vec<(DocId, f64)> = unassigned
                .iter()
                .map(|d| (*d, matrix.similarity(prototype, *d)))
                .filter(|(_, s)| *s > 0.0 && *s >= threshold)
                .collect();
            joined.sort_by(|x, y| y.1.total_cmp(&x.1).then_with(|| x.0.cmp(&y.0)));
            for (doc, _) in &joined {
                unassigned.remove(doc);
            }

            let members: Vec<DocId> = std::iter::once(prototype)
                .chain(joined.into_iter().map(|(d, _)| d))
                .take(budget)
                .collect();
            budget -= members.len();
            clusters.push(Cluster { prototype, members });
        }
        Self { clusters }
    }

    /// Default focus document: the first prototype.
    pub fn focus(&self) -> Option<DocId> {
        self.clusters.first().map(|c| c.prototype)
    }

    /// Clusters in creation order.
    pub fn iter(&self) -> impl Iterator<Item = &Cluster> {
        self.clusters.iter()
    }

    /// Number of clusters.
    pub fn len(&self) -> usize {
        self.clusters.len()
    }

    /// Whether there are no clusters.
    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }
}
