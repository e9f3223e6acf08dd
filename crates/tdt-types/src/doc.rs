//! Document and collection tables.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::ids::{DocId, GlobalFacetKey};

/// Collection key: `"<source>@<YYYYMMDD>"`.
pub type CollectionKey = String;

/// Build the collection key for a source and date.
pub fn collection_key(source: &str, date: NaiveDate) -> CollectionKey {
    format!("{}@{}", source, date.format("%Y%m%d"))
}

/// Per-document metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocStats {
    /// Document id
    pub id: DocId,
    /// Original filename
    pub filename: String,
    /// Internal name derived from the id
    pub internal_name: String,
    /// Assigned date
    pub date: NaiveDate,
    /// Collection the document belongs to
    pub collection: CollectionKey,
    /// Global facets the document participates in
    #[serde(default)]
    pub facets: BTreeSet<GlobalFacetKey>,
}

#[derive(Serialize, Deserialize)]
struct DocTableRecord {
    last_id: DocId,
    docs: Vec<DocStats>,
}

/// Documents of a community, with idempotent id attribution by filename.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "DocTableRecord", into = "DocTableRecord")]
pub struct DocTable {
    docs: BTreeMap<DocId, DocStats>,
    by_name: HashMap<String, DocId>,
    last_id: DocId,
}

impl DocTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the id for `filename`, allocating one on first sight.
    ///
    /// Re-attributing a known filename returns the same id and leaves its
    /// metadata untouched.
    pub fn attribute_doc_id(&mut self, filename: &str, date: NaiveDate, collection: &str) -> DocId {
        if let Some(&id) = self.by_name.get(filename) {
            return id;
        }
        self.last_id += 1;
        let id = self.last_id;
        self.docs.insert(
            id,
            DocStats {
                id,
                filename: filename.to_string(),
                internal_name: format!("D{:07}", id),
                date,
                collection: collection.to_string(),
                facets: BTreeSet::new(),
            },
        );
        self.by_name.insert(filename.to_string(), id);
        id
    }

    /// Id of a known filename.
    pub fn lookup(&self, filename: &str) -> Option<DocId> {
        self.by_name.get(filename).copied()
    }

    /// Metadata of a document.
    pub fn get(&self, id: DocId) -> Option<&DocStats> {
        self.docs.get(&id)
    }

    /// Metadata of a document, mutably.
    pub fn get_mut(&mut self, id: DocId) -> Option<&mut DocStats> {
        self.docs.get_mut(&id)
    }

    /// Record that a document takes part in a global facet.
    pub fn add_facet(&mut self, id: DocId, key: GlobalFacetKey) -> bool {
        match self.docs.get_mut(&id) {
            Some(doc) => doc.facets.insert(key),
            None => false,
        }
    }

    /// Iterate documents in id order.
    pub fn iter(&self) -> impl Iterator<Item = &DocStats> {
        self.docs.values()
    }

    /// Number of documents.
    pub fn len(&self) -> usize {
        self.docs.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }
}

impl From<DocTableRecord> for DocTable {
    fn from(record: DocTableRecord) -> Self {
        let by_name = record
            .docs
            .iter()
            .map(|d| (d.filename.clone(), d.id))
            .collect();
        let docs = record.docs.into_iter().map(|d| (d.id, d)).collect();
        Self {
            docs,
            by_name,
            last_id: record.last_id,
        }
    }
}

impl From<DocTable> for DocTableRecord {
    fn from(table: DocTable) -> Self {
        Self {
            last_id: table.last_id,
            docs: table.docs.into_values().collect(),
        }
    }
}

/// Aggregate statistics of one collection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CollectionStats {
    /// Documents in the collection
    pub doc_count: u32,
    /// Tokens in the collection
    pub token_count: u64,
    /// Highest non-baseline occurrence count, set by the info value pass
    #[serde(default)]
    pub max_occurrences: u64,
    /// Vertices with a positive information value, set by the info value pass
    #[serde(default)]
    pub valued_vertices: u32,
}

/// Collections keyed by collection key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CollectionTable {
    collections: BTreeMap<CollectionKey, CollectionStats>,
}

impl CollectionTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Count a document and its tokens.
    pub fn record_document(&mut self, collection: &str, tokens: u64) {
        let stats = self.collections.entry(collection.to_string()).or_default();
        stats.doc_count += 1;
        stats.token_count += tokens;
    }

    /// Statistics of a collection.
    pub fn get(&self, collection: &str) -> Option<&CollectionStats> {
        self.collections.get(collection)
    }

    /// Statistics of a collection, created if missing.
    pub fn entry(&mut self, collection: &str) -> &mut CollectionStats {
        self.collections.entry(collection.to_string()).or_default()
    }

    /// Overwrite entries with those of `other`.
    ///
    /// A window rebuilt from the same documents replaces its collections
    /// instead of counting them twice.
    pub fn merge_from(&mut self, other: CollectionTable) {
        self.collections.extend(other.collections);
    }

    /// Iterate collections in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&CollectionKey, &CollectionStats)> {
        self.collections.iter()
    }

    /// Total documents across collections.
    pub fn total_documents(&self) -> u32 {
        self.collections.values().map(|c| c.doc_count).sum()
    }

    /// Number of collections.
    pub fn len(&self) -> usize {
        self.collections.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.collections.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_collection_key_format() {
        assert_eq!(collection_key("wire", date(2023, 1, 5)), "wire@20230105");
    }

    #[test]
    fn test_attribute_doc_id_is_idempotent() {
        let mut table = DocTable::new();
        let a = table.attribute_doc_id("a.txt", date(2023, 1, 1), "wire@20230101");
        let b = table.attribute_doc_id("b.txt", date(2023, 1, 2), "wire@20230102");
        assert_eq!(a, 1);
        assert_eq!(b, 2);
        assert_eq!(table.attribute_doc_id("a.txt", date(2024, 5, 5), "x"), a);
        assert_eq!(table.get(a).unwrap().date, date(2023, 1, 1));
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_doc_id_stable_across_reload() {
        let mut table = DocTable::new();
        let a = table.attribute_doc_id("a.txt", date(2023, 1, 1), "c");
        let json = serde_json::to_vec(&table).unwrap();
        let mut restored: DocTable = serde_json::from_slice(&json).unwrap();
        assert_eq!(restored.attribute_doc_id("a.txt", date(2023, 1, 1), "c"), a);
        assert_eq!(restored.attribute_doc_id("new.txt", date(2023, 1, 1), "c"), a + 1);
    }

    #[test]
    fn test_add_facet() {
        let mut table = DocTable::new();
        let id = table.attribute_doc_id("a", date(2023, 1, 1), "c");
        assert!(table.add_facet(id, 3));
        assert!(!table.add_facet(id, 3));
        assert!(!table.add_facet(99, 3));
    }

    #[test]
    fn test_collection_table_counts() {
        let mut table = CollectionTable::new();
        table.record_document("c1", 10);
        table.record_document("c1", 5);
        table.record_document("c2", 1);
        assert_eq!(table.get("c1").unwrap().doc_count, 2);
        assert_eq!(table.get("c1").unwrap().token_count, 15);
        assert_eq!(table.total_documents(), 3);
    }

    #[test]
    fn test_merge_from_replaces() {
        let mut global = CollectionTable::new();
        global.record_document("c1", 10);
        let mut window = CollectionTable::new();
        window.record_document("c1", 10);
        window.record_document("c2", 4);
        global.merge_from(window.clone());
        global.merge_from(window);
        assert_eq!(global.get("c1").unwrap().doc_count, 1);
        assert_eq!(global.len(), 2);
    }
}
