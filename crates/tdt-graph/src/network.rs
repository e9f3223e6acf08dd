//! Network construction: vertices and arcs from tokenized documents.
//!
//! Labels and document ids are allocated sequentially; arcs and per-document
//! counts are built in parallel since documents are independent until facet
//! extraction.

use std::collections::{BTreeMap, BTreeSet};

use rayon::prelude::*;
use tracing::{debug, info};

use tdt_types::{
    Arc, ArcsTable, CollectionKey, CollectionTable, DocArcs, DocId, DocTable, LabelTable,
    TokenizedDocument, VertexId, VerticesTable, BOUNDARY_VERTEX,
};

use crate::error::GraphError;

/// A token resolved to its vertex.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedToken {
    /// Position in the document
    pub position: u32,
    /// Vertex id, or the boundary vertex when unresolvable
    pub vertex: VertexId,
}

/// Resolve every token of a document, interning new labels.
pub fn resolve_tokens(labels: &mut LabelTable, doc: &TokenizedDocument) -> Vec<ResolvedToken> {
    doc.tokens
        .iter()
        .map(|t| ResolvedToken {
            position: t.position,
            vertex: t
                .text
                .as_deref()
                .map(|text| labels.intern(text))
                .unwrap_or(BOUNDARY_VERTEX),
        })
        .collect()
}

/// Build the positional arcs of one document.
///
/// Each arc sits at the position of its right-hand token. The document start,
/// its end and every position gap are bounded by the boundary vertex, so no
/// arc ever spans a gap. Unresolvable tokens are boundary vertices themselves.
pub fn build_doc_arcs(tokens: &[ResolvedToken]) -> Result<DocArcs, GraphError> {
    let mut arcs = DocArcs::new();
    let mut previous: Option<ResolvedToken> = None;

    for token in tokens {
        match previous {
            None => arcs.insert(Arc::new(BOUNDARY_VERTEX, token.vertex, token.position))?,
            Some(prev) if token.position == next_position(prev.position)? => {
                arcs.insert(Arc::new(prev.vertex, token.vertex, token.position))?
            }
            Some(prev) => {
                let end = next_position(prev.position)?;
                arcs.insert(Arc::new(prev.vertex, BOUNDARY_VERTEX, end))?;
                arcs.insert(Arc::new(BOUNDARY_VERTEX, token.vertex, token.position))?;
            }
        }
        previous = Some(*token);
    }
    if let Some(last) = previous {
        let end = next_position(last.position)?;
        arcs.insert(Arc::new(last.vertex, BOUNDARY_VERTEX, end))?;
    }
    Ok(arcs)
}

fn next_position(position: u32) -> Result<u32, GraphError> {
    position
        .checked_add(1)
        .ok_or(GraphError::PositionOverflow(position))
}

/// Per-document output of the parallel pass.
struct DocumentGraph {
    doc_id: DocId,
    collection: CollectionKey,
    arcs: DocArcs,
    occurrences: BTreeMap<VertexId, u64>,
    links: BTreeSet<(VertexId, VertexId)>,
    token_count: u64,
}

fn document_graph(
    doc_id: DocId,
    collection: CollectionKey,
    tokens: &[ResolvedToken],
) -> Result<DocumentGraph, GraphError> {
    let arcs = build_doc_arcs(tokens)?;
    let mut occurrences = BTreeMap::new();
    for token in tokens.iter().filter(|t| t.vertex != BOUNDARY_VERTEX) {
        *occurrences.entry(token.vertex).or_insert(0) += 1;
    }
    let links = arcs
        .iter()
        .filter(|a| !a.key.touches_boundary())
        .map(|a| (a.key.left, a.key.right))
        .collect();
    Ok(DocumentGraph {
        doc_id,
        collection,
        arcs,
        occurrences,
        links,
        token_count: tokens.len() as u64,
    })
}

/// Outcome of adding a batch of documents.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct NetworkReport {
    /// Documents added to the window
    pub added: Vec<DocId>,
    /// Filenames already present in the window and skipped
    pub duplicates: Vec<String>,
}

/// The term network of one window.
#[derive(Debug, Default, Clone)]
pub struct Network {
    /// Community label table
    pub labels: LabelTable,
    /// Community document table
    pub docs: DocTable,
    /// Collections of this window
    pub collections: CollectionTable,
    /// Vertex statistics of this window
    pub vertices: VerticesTable,
    /// Positional arcs of this window
    pub arcs: ArcsTable,
}

/// Builds the network of one window.
///
/// Takes ownership of the community-wide label and document tables and hands
/// them back inside the finished [`Network`].
pub struct NetworkBuilder {
    network: Network,
}

impl NetworkBuilder {
    /// Start a window from the community tables.
    pub fn new(labels: LabelTable, docs: DocTable) -> Self {
        Self {
            network: Network {
                labels,
                docs,
                ..Default::default()
            },
        }
    }

    /// Add a batch of documents.
    ///
    /// A filename already present in this window is skipped, so reprocessing
    /// never counts a document twice.
    pub fn add_documents(
        &mut self,
        documents: &[TokenizedDocument],
    ) -> Result<NetworkReport, GraphError> {
        let mut report = NetworkReport::default();
        let mut pending = Vec::with_capacity(documents.len());

        for doc in documents {
            let collection = doc.collection();
            let doc_id = self
                .network
                .docs
                .attribute_doc_id(&doc.filename, doc.date, &collection);
            if self.network.arcs.get(doc_id).is_some()
                || pending.iter().any(|(id, _, _)| *id == doc_id)
            {
                debug!(filename = %doc.filename, doc_id, "Document already in window");
                report.duplicates.push(doc.filename.clone());
                continue;
            }
            let tokens = resolve_tokens(&mut self.network.labels, doc);
            pending.push((doc_id, collection, tokens));
        }

        let graphs: Vec<DocumentGraph> = pending
            .par_iter()
            .map(|(doc_id, collection, tokens)| document_graph(*doc_id, collection.clone(), tokens))
            .collect::<Result<_, _>>()?;

        for graph in graphs {
            self.merge(graph, &mut report);
        }
        Ok(report)
    }

    fn merge(&mut self, graph: DocumentGraph, report: &mut NetworkReport) {
        let network = &mut self.network;
        for (vertex, count) in &graph.occurrences {
            for n in 0..*count {
                network
                    .vertices
                    .record_occurrence(*vertex, &graph.collection, n == 0);
            }
        }
        for (left, right) in &graph.links {
            network.vertices.record_link(*left, *right);
        }
        network
            .collections
            .record_document(&graph.collection, graph.token_count);
        network.arcs.insert_doc(graph.doc_id, graph.arcs);
        report.added.push(graph.doc_id);
    }

    /// Documents added so far.
    pub fn doc_count(&self) -> usize {
        self.network.arcs.len()
    }

    /// Finish the window and hand the tables over.
    pub fn finish(self) -> Network {
        info!(
            docs = self.network.arcs.len(),
            vertices = self.network.vertices.len(),
            arcs = self.network.arcs.arc_count(),
            "Network built"
        );
        self.network
    }
}
