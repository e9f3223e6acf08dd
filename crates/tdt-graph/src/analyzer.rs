//! Informative arcs and associations (walks).

use std::collections::BTreeMap;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;

use tdt_types::{Arc, ArcKey, ArcsTable, DocArcs, DocId, DocTable, VertexId, VerticesTable};

use crate::informative::InfoMap;

/// Walks shorter than this many arcs are not associations.
pub const MIN_WALK_LENGTH: usize = 2;

/// Set every arc weight to the sum of its endpoint information values.
///
/// Values are taken in the document's collection; documents unknown to
/// `docs` fall back to each vertex's highest value. The boundary vertex
/// contributes 0.
pub fn adjust_all_arc_weights(arcs: &mut ArcsTable, vertices: &VerticesTable, docs: &DocTable) {
    let value = |id: VertexId, collection: Option<&str>| -> f64 {
        vertices
            .get(id)
            .map(|v| match collection {
                Some(c) => v.info_value(c),
                None => v.max_info_value(),
            })
            .unwrap_or(0.0)
    };

    for (doc_id, doc_arcs) in arcs.iter_mut() {
        let collection = docs.get(*doc_id).map(|d| d.collection.as_str());
        for arc in doc_arcs.iter_mut() {
            arc.weight = value(arc.key.left, collection) + value(arc.key.right, collection);
        }
    }
}

/// A run of positionally adjacent informative arcs in one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Association {
    /// Arc keys in text order
    pub arcs: Vec<ArcKey>,
    /// Position of the first arc
    pub start: u32,
    /// Vertex sequence the walk spells
    pub phrase: Vec<VertexId>,
    /// Sum of arc weights
    pub weight: f64,
}

impl Association {
    fn from_walk(walk: &[Arc]) -> Option<Self> {
        let first = walk.first()?;
        let mut phrase = vec![first.key.left];
        phrase.extend(walk.iter().map(|a| a.key.right));
        Some(Self {
            arcs: walk.iter().map(|a| a.key).collect(),
            start: first.position,
            phrase,
            weight: walk.iter().map(|a| a.weight).sum(),
        })
    }

    /// Number of arcs in the walk.
    pub fn len(&self) -> usize {
        self.arcs.len()
    }

    /// Whether the walk is empty.
    pub fn is_empty(&self) -> bool {
        self.arcs.is_empty()
    }
}

/// Associations per document.
pub type AssociationMap = BTreeMap<DocId, Vec<Association>>;

/// Split arcs into walks of consecutive positions.
///
/// Arcs are ordered by position; an arc continues the current walk iff its
/// position is one past the previous arc's. Walks with fewer than
/// `min_length` arcs are dropped.
pub fn connect_arcs<'a, I>(arcs: I, min_length: usize) -> Vec<Vec<Arc>>
where
    I: IntoIterator<Item = &'a Arc>,
{
    let mut sorted: Vec<Arc> = arcs.into_iter().copied().collect();
    sorted.sort_by_key(|a| a.position);

    let mut walks = Vec::new();
    let mut current: Vec<Arc> = Vec::new();
    for arc in sorted {
        if let Some(last) = current.last() {
            if last.position.checked_add(1) != Some(arc.position) {
                let done = std::mem::take(&mut current);
                if done.len() >= min_length {
                    walks.push(done);
                }
            }
        }
        current.push(arc);
    }
    if current.len() >= min_length && !current.is_empty() {
        walks.push(current);
    }
    walks
}

/// Reduces arc tables to their informative part.
pub struct GraphAnalyzer<'a> {
    info_map: &'a InfoMap,
}

impl<'a> GraphAnalyzer<'a> {
    /// Analyzer over an informative vertex map.
    pub fn new(info_map: &'a InfoMap) -> Self {
        Self { info_map }
    }

    /// Whether both endpoints of `key` are informative.
    pub fn is_informative(&self, key: &ArcKey) -> bool {
        self.info_map.contains(key.left) && self.info_map.contains(key.right)
    }

    /// Informative arcs of one document, weighted by the infoMap.
    pub fn doc_info_arcs(&self, arcs: &DocArcs) -> DocArcs {
        arcs.iter()
            .filter(|a| self.is_informative(&a.key))
            .map(|a| {
                let mut arc = *a;
                arc.weight = self.info_map.weight(a.key.left).unwrap_or(0.0)
                    + self.info_map.weight(a.key.right).unwrap_or(0.0);
                arc
            })
            .collect()
    }

    /// The InfoArc table: informative arcs of every document.
    ///
    /// Documents left without informative arcs are omitted.
    pub fn info_arcs(&self, arcs: &ArcsTable) -> ArcsTable {
        let docs: Vec<(&DocId, &DocArcs)> = arcs.iter().collect();
        let table: ArcsTable = docs
            .par_iter()
            .map(|(id, doc_arcs)| (**id, self.doc_info_arcs(doc_arcs)))
            .filter(|(_, doc_arcs)| !doc_arcs.is_empty())
            .collect::<Vec<_>>()
            .into_iter()
            .collect();
        info!(
            docs = table.len(),
            arcs = table.arc_count(),
            "Informative arcs extracted"
        );
        table
    }

    /// Associations of every document of an InfoArc table.
    pub fn associations(&self, info_arcs: &ArcsTable, min_length: usize) -> AssociationMap {
        let docs: Vec<(&DocId, &DocArcs)> = info_arcs.iter().collect();
        let map: AssociationMap = docs
            .par_iter()
            .map(|(id, doc_arcs)| {
                let walks = connect_arcs(doc_arcs.iter(), min_length);
                let assoc: Vec<Association> = walks
                    .iter()
                    .filter_map(|w| Association::from_walk(w))
                    .collect();
                (**id, assoc)
            })
            .filter(|(_, assoc)| !assoc.is_empty())
            .collect::<Vec<_>>()
            .into_iter()
            .collect();
        info!(
            docs = map.len(),
            associations = map.values().map(Vec::len).sum::<usize>(),
            "Associations derived"
        );
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn arcs_at(positions: &[u32]) -> Vec<Arc> {
        positions
            .iter()
            .map(|&p| Arc::new(p, p + 1, p))
            .collect()
    }

    fn positions(walk: &[Arc]) -> Vec<u32> {
        walk.iter().map(|a| a.position).collect()
    }

    #[test]
    fn test_connect_arcs_splits_on_gap() {
        let arcs = arcs_at(&[5, 6, 7, 10, 11]);
        let walks = connect_arcs(arcs.iter(), 2);
        assert_eq!(walks.len(), 2);
        assert_eq!(positions(&walks[0]), vec![5, 6, 7]);
        assert_eq!(positions(&walks[1]), vec![10, 11]);
    }

    #[test]
    fn test_connect_arcs_min_length_three() {
        let arcs = arcs_at(&[5, 6, 7, 10, 11]);
        let walks = connect_arcs(arcs.iter(), 3);
        assert_eq!(walks.len(), 1);
        assert_eq!(positions(&walks[0]), vec![5, 6, 7]);
    }

    #[test]
    fn test_connect_arcs_unsorted_input() {
        let arcs = arcs_at(&[11, 6, 10, 5, 7]);
        let walks = connect_arcs(arcs.iter(), 2);
        assert_eq!(positions(&walks[0]), vec![5, 6, 7]);
    }

    #[test]
    fn test_connect_arcs_at_last_position() {
        let arcs = vec![
            Arc::new(1, 2, u32::MAX - 1),
            Arc::new(2, 3, u32::MAX),
            Arc::new(3, 4, 0),
        ];
        let walks = connect_arcs(arcs.iter(), 2);
        assert_eq!(walks.len(), 1);
        assert_eq!(positions(&walks[0]), vec![u32::MAX - 1, u32::MAX]);
    }

    #[test]
    fn test_connect_arcs_empty() {
        assert!(connect_arcs(Vec::<Arc>::new().iter(), 0).is_empty());
    }

    #[test]
    fn test_adjust_arc_weight_is_endpoint_sum() {
        let mut vertices = VerticesTable::new();
        vertices.entry(1).info_values.insert("wire@20230101".into(), 0.3);
        vertices.entry(2).info_values.insert("wire@20230101".into(), 0.7);
        let mut docs = DocTable::new();
        let doc = docs.attribute_doc_id(
            "a",
            NaiveDate::from_ymd_opt(2023, 1, 1).unwrap(),
            "wire@20230101",
        );
        let mut arcs = ArcsTable::new();
        arcs.insert_doc(
            doc,
            vec![Arc::new(0, 1, 0), Arc::new(1, 2, 1)].into_iter().collect(),
        );

        adjust_all_arc_weights(&mut arcs, &vertices, &docs);
        let arc = arcs.find(doc, &ArcKey::new(1, 2)).unwrap();
        assert!((arc.weight - 1.0).abs() < 1e-12);
        assert!((arcs.find(doc, &ArcKey::new(0, 1)).unwrap().weight - 0.3).abs() < 1e-12);
    }

    #[test]
    fn test_info_arcs_require_both_endpoints() {
        let info_map: InfoMap = [(1, 0.5), (2, 0.25)].into_iter().collect();
        let mut arcs = ArcsTable::new();
        arcs.insert_doc(
            1,
            vec![Arc::new(1, 2, 1), Arc::new(2, 3, 2)].into_iter().collect(),
        );
        arcs.insert_doc(2, vec![Arc::new(3, 4, 1)].into_iter().collect());

        let info = GraphAnalyzer::new(&info_map).info_arcs(&arcs);
        assert_eq!(info.len(), 1);
        let arc = info.find(1, &ArcKey::new(1, 2)).unwrap();
        assert!((arc.weight - 0.75).abs() < 1e-12);
        assert!(info.find(1, &ArcKey::new(2, 3)).is_none());
    }

    #[test]
    fn test_associations_spell_phrases() {
        let info_map: InfoMap = (1..=6).map(|v| (v, 0.5)).collect();
        let mut arcs = ArcsTable::new();
        arcs.insert_doc(
            7,
            vec![
                Arc::new(1, 2, 1),
                Arc::new(2, 3, 2),
                Arc::new(4, 5, 6),
            ]
            .into_iter()
            .collect(),
        );
        let analyzer = GraphAnalyzer::new(&info_map);
        let info = analyzer.info_arcs(&arcs);
        let assoc = analyzer.associations(&info, MIN_WALK_LENGTH);
        let doc = &assoc[&7];
        assert_eq!(doc.len(), 1);
        assert_eq!(doc[0].phrase, vec![1, 2, 3]);
        assert_eq!(doc[0].start, 1);
        assert!((doc[0].weight - 2.0).abs() < 1e-12);
    }
}
