//! Information value of vertices: a modified TF-IDF.
//!
//! For vertex `v` in collection `c`:
//!
//! ```text
//! tf     = occ(v, c) / max_occ(c)            max over non-baseline vertices
//! idf    = ln((N + 1) / (df(v) + 1)) + 1     N documents, df documents with v
//! spread = 1 - 1 / collections(v)            0 when confined to one collection
//! focus  = 1 / (1 + ln(1 + links(v) / occ(v)))
//! value  = tf * idf * spread * focus
//! ```
//!
//! Baseline words score 0 and are left out of `max_occ`.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, info};

use tdt_types::{CollectionKey, CollectionTable, VertexId, VerticesTable};

/// Summary of one calculation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InfoValueReport {
    /// Vertices with a positive value in at least one collection
    pub valued: usize,
    /// Vertices scoring 0 everywhere
    pub zero: usize,
    /// Baseline vertices forced to 0
    pub baseline_skipped: usize,
    /// Baseline words the label table does not know
    pub unresolved_baseline: Vec<String>,
}

/// Tables handed back by the calculator.
#[derive(Debug, Clone)]
pub struct InfoValueOutcome {
    /// Vertices with `info_values` populated
    pub vertices: VerticesTable,
    /// Collections with `max_occurrences` and `valued_vertices` set
    pub collections: CollectionTable,
    /// Summary
    pub report: InfoValueReport,
}

/// Computes per-collection information values.
#[derive(Debug, Clone, Default)]
pub struct InfoValueCalculator {
    baseline: BTreeSet<VertexId>,
    unresolved_baseline: Vec<String>,
}

impl InfoValueCalculator {
    /// Calculator without baseline adjustment.
    pub fn new() -> Self {
        Self::default()
    }

    /// Calculator excluding `baseline` vertices; `unresolved` words are
    /// carried into the report.
    pub fn with_baseline(baseline: BTreeSet<VertexId>, unresolved: Vec<String>) -> Self {
        Self {
            baseline,
            unresolved_baseline: unresolved,
        }
    }

    /// Baseline vertex ids in use.
    pub fn baseline(&self) -> &BTreeSet<VertexId> {
        &self.baseline
    }

    /// Recompute every vertex value and return the updated tables.
    pub fn calculate(
        &self,
        mut vertices: VerticesTable,
        mut collections: CollectionTable,
    ) -> InfoValueOutcome {
        let n_docs = f64::from(collections.total_documents());

        let mut max_occ: BTreeMap<CollectionKey, u64> = BTreeMap::new();
        for vertex in vertices.iter().filter(|v| !self.baseline.contains(&v.id)) {
            for (coll, counts) in &vertex.counts {
                let slot = max_occ.entry(coll.clone()).or_insert(0);
                *slot = (*slot).max(counts.occurrences);
            }
        }

        let mut report = InfoValueReport {
            unresolved_baseline: self.unresolved_baseline.clone(),
            ..Default::default()
        };
        let mut valued_per_collection: BTreeMap<CollectionKey, u32> = BTreeMap::new();

        for vertex in vertices.iter_mut() {
            vertex.info_values.clear();
            if self.baseline.contains(&vertex.id) {
                for coll in vertex.counts.keys() {
                    vertex.info_values.insert(coll.clone(), 0.0);
                }
                report.baseline_skipped += 1;
                continue;
            }

            let occ_total = vertex.total_occurrences();
            let df = f64::from(vertex.total_documents());
            let collections_seen = vertex.collection_count();
            let idf = ((n_docs + 1.0) / (df + 1.0)).ln() + 1.0;
            let spread = if collections_seen == 0 {
                0.0
            } else {
                1.0 - 1.0 / collections_seen as f64
            };
            let focus = if occ_total == 0 {
                0.0
            } else {
                1.0 / (1.0 + (1.0 + vertex.link_count() as f64 / occ_total as f64).ln())
            };

            let mut any_positive = false;
            for (coll, counts) in &vertex.counts {
                let max = max_occ.get(coll).copied().unwrap_or(0);
                let tf = if max == 0 {
                    0.0
                } else {
                    counts.occurrences as f64 / max as f64
                };
                let value = (tf * idf * spread * focus).max(0.0);
                if value > 0.0 {
                    any_positive = true;
                    *valued_per_collection.entry(coll.clone()).or_insert(0) += 1;
                }
                vertex.info_values.insert(coll.clone(), value);
            }
            if any_positive {
                report.valued += 1;
            } else {
                report.zero += 1;
            }
        }

        let keys: Vec<CollectionKey> = collections.iter().map(|(k, _)| k.clone()).collect();
        for key in keys {
            let stats = collections.entry(&key);
            stats.max_occurrences = max_occ.get(&key).copied().unwrap_or(0);
            stats.valued_vertices = valued_per_collection.get(&key).copied().unwrap_or(0);
        }

        if !report.unresolved_baseline.is_empty() {
            debug!(
                unresolved = report.unresolved_baseline.len(),
                "Baseline words without a vertex"
            );
        }
        info!(
            valued = report.valued,
            zero = report.zero,
            baseline = report.baseline_skipped,
            "Information values computed"
        );

        InfoValueOutcome {
            vertices,
            collections,
            report,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Three collections, one document each.
    fn fixture() -> (VerticesTable, CollectionTable) {
        let mut vertices = VerticesTable::new();
        let mut collections = CollectionTable::new();
        for coll in ["c1", "c2", "c3"] {
            collections.record_document(coll, 10);
        }
        // vertex 1: everywhere, twice per collection
        for coll in ["c1", "c2", "c3"] {
            vertices.record_occurrence(1, coll, true);
            vertices.record_occurrence(1, coll, false);
        }
        // vertex 2: two collections
        vertices.record_occurrence(2, "c1", true);
        vertices.record_occurrence(2, "c2", true);
        // vertex 3: one collection only
        vertices.record_occurrence(3, "c1", true);
        vertices.record_link(1, 2);
        vertices.record_link(2, 3);
        (vertices, collections)
    }

    #[test]
    fn test_single_collection_vertex_scores_zero() {
        let (vertices, collections) = fixture();
        let outcome = InfoValueCalculator::new().calculate(vertices, collections);
        assert_eq!(outcome.vertices.get(3).unwrap().max_info_value(), 0.0);
        assert!(outcome.vertices.get(2).unwrap().max_info_value() > 0.0);
    }

    #[test]
    fn test_values_non_negative_and_deterministic() {
        let (vertices, collections) = fixture();
        let a = InfoValueCalculator::new().calculate(vertices.clone(), collections.clone());
        let b = InfoValueCalculator::new().calculate(vertices, collections);
        for vertex in a.vertices.iter() {
            for value in vertex.info_values.values() {
                assert!(*value >= 0.0);
            }
            assert_eq!(
                vertex.info_values,
                b.vertices.get(vertex.id).unwrap().info_values
            );
        }
    }

    #[test]
    fn test_baseline_words_score_zero_and_leave_normalisation() {
        let (vertices, collections) = fixture();
        let plain = InfoValueCalculator::new().calculate(vertices.clone(), collections.clone());
        let baseline = InfoValueCalculator::with_baseline(
            [1].into_iter().collect(),
            vec!["unknownword".to_string()],
        )
        .calculate(vertices, collections);

        assert_eq!(baseline.vertices.get(1).unwrap().max_info_value(), 0.0);
        // vertex 1 no longer sets max_occ, so vertex 2 gains tf
        assert!(
            baseline.vertices.get(2).unwrap().info_value("c1")
                > plain.vertices.get(2).unwrap().info_value("c1")
        );
        assert_eq!(baseline.report.baseline_skipped, 1);
        assert_eq!(baseline.report.unresolved_baseline, vec!["unknownword"]);
    }

    #[test]
    fn test_collection_stats_updated() {
        let (vertices, collections) = fixture();
        let outcome = InfoValueCalculator::new().calculate(vertices, collections);
        let c1 = outcome.collections.get("c1").unwrap();
        assert_eq!(c1.max_occurrences, 2);
        assert_eq!(c1.valued_vertices, 2);
        assert_eq!(outcome.report.valued, 2);
        assert_eq!(outcome.report.zero, 1);
    }

    #[test]
    fn test_rarer_vertex_has_higher_idf() {
        // same tf/spread/focus shape, different document frequency
        let mut vertices = VerticesTable::new();
        let mut collections = CollectionTable::new();
        for coll in ["a", "b", "c", "d"] {
            collections.record_document(coll, 4);
            vertices.record_occurrence(1, coll, true);
        }
        vertices.record_occurrence(2, "a", true);
        vertices.record_occurrence(2, "b", true);
        let outcome = InfoValueCalculator::new().calculate(vertices, collections);
        let common = outcome.vertices.get(1).unwrap().info_value("a");
        let rare = outcome.vertices.get(2).unwrap().info_value("a");
        assert!(common > 0.0 && rare > 0.0);
        // spread favours the common vertex; idf favours the rare one
        let idf = |df: f64| ((5.0f64) / (df + 1.0)).ln() + 1.0;
        assert!((rare / common - (idf(2.0) * 0.5) / (idf(4.0) * 0.75)).abs() < 1e-9);
    }
}
