//! Unused-document backlog (`Unused.und`).
//!
//! Documents that joined no facet in their window wait here until a later
//! window rescans them or they fall behind the rescan day limit.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use tdt_types::{ArcKey, DocId, Scope};

/// A document waiting for rescan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnusedEntry {
    /// Document id
    pub doc_id: DocId,
    /// Document date
    pub date: NaiveDate,
    /// Window the document was processed in
    pub origin: Scope,
    /// Non-boundary arc keys of the document
    pub arcs: BTreeSet<ArcKey>,
}

/// Unused documents of a community keyed by document id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnusedBacklog {
    entries: BTreeMap<DocId, UnusedEntry>,
}

impl UnusedBacklog {
    /// Create an empty backlog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace an entry.
    pub fn insert(&mut self, entry: UnusedEntry) {
        self.entries.insert(entry.doc_id, entry);
    }

    /// Remove a document.
    pub fn remove(&mut self, doc_id: DocId) -> Option<UnusedEntry> {
        self.entries.remove(&doc_id)
    }

    /// Entry of a document.
    pub fn get(&self, doc_id: DocId) -> Option<&UnusedEntry> {
        self.entries.get(&doc_id)
    }

    /// Whether a document is waiting.
    pub fn contains(&self, doc_id: DocId) -> bool {
        self.entries.contains_key(&doc_id)
    }

    /// Drop entries dated before `limit`, returning their ids.
    pub fn purge_older_than(&mut self, limit: NaiveDate) -> Vec<DocId> {
        let old: Vec<DocId> = self
            .entries
            .values()
            .filter(|e| e.date < limit)
            .map(|e| e.doc_id)
            .collect();
        for id in &old {
            self.entries.remove(id);
        }
        old
    }

    /// Entries from other windows dated in `[limit, before)`.
    pub fn eligible(&self, window: &Scope, limit: NaiveDate, before: NaiveDate) -> Vec<&UnusedEntry> {
        self.entries
            .values()
            .filter(|e| e.origin != *window && e.date >= limit && e.date < before)
            .collect()
    }

    /// Iterate entries in id order.
    pub fn iter(&self) -> impl Iterator<Item = &UnusedEntry> {
        self.entries.values()
    }

    /// Document ids in the backlog.
    pub fn doc_ids(&self) -> BTreeSet<DocId> {
        self.entries.keys().copied().collect()
    }

    /// Number of waiting documents.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the backlog is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2023, 3, d).unwrap()
    }

    fn entry(doc_id: DocId, day: u32, origin: Scope) -> UnusedEntry {
        UnusedEntry {
            doc_id,
            date: date(day),
            origin,
            arcs: BTreeSet::new(),
        }
    }

    #[test]
    fn test_purge_older_than() {
        let mut backlog = UnusedBacklog::new();
        backlog.insert(entry(1, 1, Scope::AllDates));
        backlog.insert(entry(2, 10, Scope::AllDates));
        assert_eq!(backlog.purge_older_than(date(5)), vec![1]);
        assert_eq!(backlog.doc_ids(), BTreeSet::from([2]));
    }

    #[test]
    fn test_eligible_window() {
        let window = Scope::range(date(20), date(25));
        let earlier = Scope::range(date(10), date(12));
        let mut backlog = UnusedBacklog::new();
        backlog.insert(entry(1, 11, earlier));
        backlog.insert(entry(2, 21, window));
        backlog.insert(entry(3, 2, earlier));
        let eligible: Vec<DocId> = backlog
            .eligible(&window, date(5), date(20))
            .into_iter()
            .map(|e| e.doc_id)
            .collect();
        assert_eq!(eligible, vec![1]);
    }

    #[test]
    fn test_serde_roundtrip() {
        let mut backlog = UnusedBacklog::new();
        let mut e = entry(4, 3, Scope::AllDates);
        e.arcs.insert(ArcKey::new(1, 2));
        backlog.insert(e);
        let json = serde_json::to_string(&backlog).unwrap();
        let back: UnusedBacklog = serde_json::from_str(&json).unwrap();
        assert_eq!(back, backlog);
    }
}
