//! Bidirectional interning of term strings and vertex ids.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::ids::{VertexId, BOUNDARY_VERTEX};

/// Interns term labels to 1-based vertex ids.
///
/// Persisted as the ordered label list; the reverse index is rebuilt on load.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct LabelTable {
    labels: Vec<String>,
    by_label: HashMap<String, VertexId>,
}

impl LabelTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve a label, allocating the next id if it is new.
    ///
    /// Empty labels resolve to the boundary vertex.
    pub fn intern(&mut self, label: &str) -> VertexId {
        if label.is_empty() {
            return BOUNDARY_VERTEX;
        }
        if let Some(&id) = self.by_label.get(label) {
            return id;
        }
        self.labels.push(label.to_string());
        let id = self.labels.len() as VertexId;
        self.by_label.insert(label.to_string(), id);
        id
    }

    /// Look up an existing label without allocating.
    pub fn lookup(&self, label: &str) -> Option<VertexId> {
        self.by_label.get(label).copied()
    }

    /// Label for a vertex id.
    pub fn label(&self, id: VertexId) -> Option<&str> {
        if id == BOUNDARY_VERTEX {
            return None;
        }
        self.labels.get(id as usize - 1).map(String::as_str)
    }

    /// Resolve query terms, splitting known ids from unknown terms.
    pub fn resolve_all<S: AsRef<str>>(&self, terms: &[S]) -> (Vec<VertexId>, Vec<String>) {
        let mut known = Vec::new();
        let mut unknown = Vec::new();
        for term in terms {
            match self.lookup(term.as_ref()) {
                Some(id) if !known.contains(&id) => known.push(id),
                Some(_) => {}
                None => unknown.push(term.as_ref().to_string()),
            }
        }
        (known, unknown)
    }

    /// Number of interned labels.
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Whether no label has been interned.
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

impl From<Vec<String>> for LabelTable {
    fn from(labels: Vec<String>) -> Self {
        let by_label = labels
            .iter()
            .enumerate()
            .map(|(i, label)| (label.clone(), i as VertexId + 1))
            .collect();
        Self { labels, by_label }
    }
}

impl From<LabelTable> for Vec<String> {
    fn from(table: LabelTable) -> Self {
        table.labels
    }
}
