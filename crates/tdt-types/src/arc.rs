//! Directed co-occurrence arcs.
//!
//! An arc links two adjacent vertices of one document and is identified by
//! `(doc_id, "left*right")`. Vertex 0 marks a document boundary or an
//! unresolvable token.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::TdtError;
use crate::ids::{DocId, VertexId, BOUNDARY_VERTEX};

/// Directional arc key, displayed as `"left*right"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArcKey {
    /// Left vertex
    pub left: VertexId,
    /// Right vertex
    pub right: VertexId,
}

impl ArcKey {
    /// Create an arc key.
    pub fn new(left: VertexId, right: VertexId) -> Self {
        Self { left, right }
    }

    /// Whether either endpoint is the boundary vertex.
    pub fn touches_boundary(&self) -> bool {
        self.left == BOUNDARY_VERTEX || self.right == BOUNDARY_VERTEX
    }

    /// Both endpoints.
    pub fn vertices(&self) -> [VertexId; 2] {
        [self.left, self.right]
    }
}

impl fmt::Display for ArcKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}*{}", self.left, self.right)
    }
}

impl FromStr for ArcKey {
    type Err = TdtError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (left, right) = s
            .split_once('*')
            .ok_or_else(|| TdtError::InvalidInput(format!("Invalid arc key: {}", s)))?;
        let left = left
            .parse()
            .map_err(|e| TdtError::InvalidInput(format!("Invalid arc key {}: {}", s, e)))?;
        let right = right
            .parse()
            .map_err(|e| TdtError::InvalidInput(format!("Invalid arc key {}: {}", s, e)))?;
        Ok(Self { left, right })
    }
}

impl Serialize for ArcKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ArcKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct ArcKeyVisitor;

        impl Visitor<'_> for ArcKeyVisitor {
            type Value = ArcKey;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an arc key of the form \"left*right\"")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<ArcKey, E> {
                v.parse().map_err(E::custom)
            }
        }

        deserializer.deserialize_str(ArcKeyVisitor)
    }
}

/// One arc occurrence at a text position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Arc {
    /// Arc key
    pub key: ArcKey,
    /// Position of the right-hand token in the document
    pub position: u32,
    /// Sum of endpoint information values (0 until weights are adjusted)
    #[serde(default)]
    pub weight: f64,
}

impl Arc {
    /// Create an unweighted arc.
    pub fn new(left: VertexId, right: VertexId, position: u32) -> Self {
        Self {
            key: ArcKey::new(left, right),
            position,
            weight: 0.0,
        }
    }
}

/// Arcs of one document ordered by text position.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocArcs {
    arcs: BTreeMap<u32, Arc>,
}

impl DocArcs {
    /// Create an empty arc map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an arc; a second arc at the same position is rejected.
    pub fn insert(&mut self, arc: Arc) -> Result<(), TdtError> {
        if self.arcs.contains_key(&arc.position) {
            return Err(TdtError::InvalidInput(format!(
                "Duplicate arc position {}",
                arc.position
            )));
        }
        self.arcs.insert(arc.position, arc);
        Ok(())
    }

    /// First arc with the given key.
    pub fn find(&self, key: &ArcKey) -> Option<&Arc> {
        self.arcs.values().find(|a| a.key == *key)
    }

    /// Arcs in position order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc> {
        self.arcs.values()
    }

    /// Arcs in position order, mutably.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Arc> {
        self.arcs.values_mut()
    }

    /// Distinct keys of arcs that do not touch a boundary.
    pub fn keys(&self) -> BTreeSet<ArcKey> {
        self.arcs
            .values()
            .map(|a| a.key)
            .filter(|k| !k.touches_boundary())
            .collect()
    }

    /// Distinct non-boundary vertices.
    pub fn vertices(&self) -> BTreeSet<VertexId> {
        self.arcs
            .values()
            .flat_map(|a| a.key.vertices())
            .filter(|v| *v != BOUNDARY_VERTEX)
            .collect()
    }

    /// Keep only arcs matching `predicate`.
    pub fn retain<F: FnMut(&Arc) -> bool>(&mut self, mut predicate: F) {
        self.arcs.retain(|_, arc| predicate(arc));
    }

    /// Number of arcs.
    pub fn len(&self) -> usize {
        self.arcs.len()
    }

    /// Whether the document has no arcs.
    pub fn is_empty(&self) -> bool {
        self.arcs.is_empty()
    }
}

impl FromIterator<Arc> for DocArcs {
    fn from_iter<I: IntoIterator<Item = Arc>>(iter: I) -> Self {
        Self {
            arcs: iter.into_iter().map(|a| (a.position, a)).collect(),
        }
    }
}

/// Arcs of every document in a window.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArcsTable {
    docs: BTreeMap<DocId, DocArcs>,
}

impl ArcsTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the arcs of a document, replacing earlier ones.
    pub fn insert_doc(&mut self, doc_id: DocId, arcs: DocArcs) {
        self.docs.insert(doc_id, arcs);
    }

    /// Arcs of a document.
    pub fn get(&self, doc_id: DocId) -> Option<&DocArcs> {
        self.docs.get(&doc_id)
    }

    /// Arc identified by `(doc_id, key)`.
    pub fn find(&self, doc_id: DocId, key: &ArcKey) -> Option<&Arc> {
        self.docs.get(&doc_id).and_then(|d| d.find(key))
    }

    /// Iterate documents in id order.
    pub fn iter(&self) -> impl Iterator<Item = (&DocId, &DocArcs)> {
        self.docs.iter()
    }

    /// Iterate documents mutably.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&DocId, &mut DocArcs)> {
        self.docs.iter_mut()
    }

    /// Document ids present in the table.
    pub fn doc_ids(&self) -> BTreeSet<DocId> {
        self.docs.keys().copied().collect()
    }

    /// Merge another table into this one; documents in `other` win.
    pub fn extend(&mut self, other: ArcsTable) {
        self.docs.extend(other.docs);
    }

    /// Number of documents.
    pub fn len(&self) -> usize {
        self.docs.len()
    }

    /// Whether the table has no documents.
    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    /// Total arcs across all documents.
    pub fn arc_count(&self) -> usize {
        self.docs.values().map(DocArcs::len).sum()
    }
}

impl FromIterator<(DocId, DocArcs)> for ArcsTable {
    fn from_iter<I: IntoIterator<Item = (DocId, DocArcs)>>(iter: I) -> Self {
        Self {
            docs: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arc_key_display_and_parse() {
        let key = ArcKey::new(12, 7);
        assert_eq!(key.to_string(), "12*7");
        assert_eq!("12*7".parse::<ArcKey>().unwrap(), key);
        assert!("12-7".parse::<ArcKey>().is_err());
        assert!("a*7".parse::<ArcKey>().is_err());
    }

    #[test]
    fn test_arc_key_is_directional() {
        assert_ne!(ArcKey::new(1, 2), ArcKey::new(2, 1));
    }

    #[test]
    fn test_arc_key_as_json_map_key() {
        let mut map = BTreeMap::new();
        map.insert(ArcKey::new(3, 4), 1.5);
        let json = serde_json::to_string(&map).unwrap();
        assert_eq!(json, r#"{"3*4":1.5}"#);
        let back: BTreeMap<ArcKey, f64> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, map);
    }

    #[test]
    fn test_doc_arcs_rejects_duplicate_position() {
        let mut arcs = DocArcs::new();
        arcs.insert(Arc::new(1, 2, 1)).unwrap();
        assert!(arcs.insert(Arc::new(2, 3, 1)).is_err());
        assert_eq!(arcs.len(), 1);
    }

    #[test]
    fn test_doc_arcs_keys_skip_boundary() {
        let arcs: DocArcs = vec![
            Arc::new(BOUNDARY_VERTEX, 1, 0),
            Arc::new(1, 2, 1),
            Arc::new(2, BOUNDARY_VERTEX, 2),
        ]
        .into_iter()
        .collect();
        assert_eq!(arcs.keys().len(), 1);
        assert_eq!(arcs.vertices(), BTreeSet::from([1, 2]));
    }

    #[test]
    fn test_arcs_table_find() {
        let mut table = ArcsTable::new();
        table.insert_doc(5, vec![Arc::new(1, 2, 1), Arc::new(2, 3, 2)].into_iter().collect());
        assert_eq!(table.find(5, &ArcKey::new(2, 3)).unwrap().position, 2);
        assert!(table.find(5, &ArcKey::new(3, 2)).is_none());
        assert!(table.find(6, &ArcKey::new(1, 2)).is_none());
        assert_eq!(table.arc_count(), 2);
    }
}
