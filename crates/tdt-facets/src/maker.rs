//! Topical facets of one window.
//!
//! Documents sharing at least [`MIN_SHARED_ARCS`] informative arc keys are
//! linked; each connected group of two or more documents is a facet. The
//! maker then rescans unused documents of earlier windows against the new
//! facets and finally records this window's own unused documents.
//!
//! Steps must run in order: `build` → `rescan` → `finalize`.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use tdt_graph::{GraphAnalyzer, InfoMap};
use tdt_storage::Storage;
use tdt_types::{ArcKey, ArcsTable, DocId, DocTable, LocalFacetKey, Scope, WindowArtifact};

use crate::backlog::{UnusedBacklog, UnusedEntry};
use crate::error::FacetsError;

/// Documents must share this many informative arcs to be linked.
pub const MIN_SHARED_ARCS: usize = 2;

/// Local facet key → documents (`<scope>_Topics.tpc`).
pub type TopicMap = BTreeMap<LocalFacetKey, BTreeSet<DocId>>;

/// Local facet key → defining arcs (`<scope>_TopArcs.tas`).
pub type TopicArcsMap = BTreeMap<LocalFacetKey, BTreeSet<ArcKey>>;

/// A document from an earlier window that joined a facet of this one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RescannedDoc {
    /// Document id
    pub doc_id: DocId,
    /// Window the document was processed in
    pub origin: Scope,
    /// Facet it joined
    pub facet: LocalFacetKey,
    /// Informative arcs it shares with the facet
    pub shared: usize,
    /// Document date
    pub date: NaiveDate,
    /// Non-boundary arc keys of the document
    pub arcs: BTreeSet<ArcKey>,
}

impl RescannedDoc {
    /// Backlog entry the document was rescanned from.
    pub fn to_unused(&self) -> UnusedEntry {
        UnusedEntry {
            doc_id: self.doc_id,
            date: self.date,
            origin: self.origin,
            arcs: self.arcs.clone(),
        }
    }
}

/// Rescanned documents of a window (`<scope>_Rescanned.rse`).
pub type RescannedMap = BTreeMap<DocId, RescannedDoc>;

/// Progress of a facet maker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FacetState {
    /// Nothing done yet
    Init,
    /// Facets formed
    Build,
    /// Backlog rescanned
    Rescan,
    /// Outputs assembled
    Finalize,
    /// Outputs handed over
    Done,
}

/// Outcome of a rescan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RescanReport {
    /// Backlog entries considered
    pub eligible: usize,
    /// Entries that joined a facet
    pub matched: Vec<DocId>,
    /// Entries dropped for being older than the limit date
    pub purged: Vec<DocId>,
}

/// Everything a window produces.
#[derive(Debug, Clone, PartialEq)]
pub struct FacetOutput {
    /// Window
    pub scope: Scope,
    /// Facet documents
    pub topics: TopicMap,
    /// Facet arcs
    pub topic_arcs: TopicArcsMap,
    /// Documents rescanned into this window
    pub rescanned: RescannedMap,
    /// Window documents in no facet
    pub unused: BTreeSet<DocId>,
}

impl FacetOutput {
    /// Persist the window files.
    #[instrument(skip(self, storage), fields(scope = %self.scope))]
    pub fn store(&self, storage: &Storage, community: &str) -> Result<(), FacetsError> {
        storage.put_window(community, &self.scope, WindowArtifact::Topics, &self.topics)?;
        storage.put_window(community, &self.scope, WindowArtifact::TopArcs, &self.topic_arcs)?;
        storage.put_window(
            community,
            &self.scope,
            WindowArtifact::Rescanned,
            &self.rescanned,
        )?;
        Ok(())
    }
}

/// Disjoint sets over document ids.
#[derive(Default)]
struct DocUnion {
    parent: BTreeMap<DocId, DocId>,
}

impl DocUnion {
    fn find(&mut self, doc: DocId) -> DocId {
        let parent = *self.parent.entry(doc).or_insert(doc);
        if parent == doc {
            return doc;
        }
        let root = self.find(parent);
        self.parent.insert(doc, root);
        root
    }

    fn union(&mut self, a: DocId, b: DocId) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra != rb {
            let (low, high) = if ra < rb { (ra, rb) } else { (rb, ra) };
            self.parent.insert(high, low);
        }
    }
}

/// Clusters the documents of one window into topical facets.
pub struct FacetMaker<'a> {
    scope: Scope,
    state: FacetState,
    analyzer: GraphAnalyzer<'a>,
    info_arcs: &'a ArcsTable,
    arcs: &'a ArcsTable,
    topics: TopicMap,
    topic_arcs: TopicArcsMap,
    rescanned: RescannedMap,
    unused: BTreeSet<DocId>,
}

impl<'a> FacetMaker<'a> {
    /// Maker for `scope` over its informative and full arc tables.
    pub fn new(
        scope: Scope,
        info_map: &'a InfoMap,
        info_arcs: &'a ArcsTable,
        arcs: &'a ArcsTable,
    ) -> Self {
        Self {
            scope,
            state: FacetState::Init,
            analyzer: GraphAnalyzer::new(info_map),
            info_arcs,
            arcs,
            topics: TopicMap::new(),
            topic_arcs: TopicArcsMap::new(),
            rescanned: RescannedMap::new(),
            unused: BTreeSet::new(),
        }
    }

    /// Current state.
    pub fn state(&self) -> FacetState {
        self.state
    }

    fn advance(&mut self, expected: FacetState, next: FacetState) -> Result<(), FacetsError> {
        if self.state != expected {
            return Err(FacetsError::InvalidState {
                from: self.state,
                to: next,
            });
        }
        self.state = next;
        Ok(())
    }

    /// Form facets from shared informative arcs.
    ///
    /// Returns the number of facets.
    pub fn build(&mut self) -> Result<usize, FacetsError> {
        self.advance(FacetState::Init, FacetState::Build)?;

        let mut by_key: BTreeMap<ArcKey, Vec<DocId>> = BTreeMap::new();
        for (doc_id, doc_arcs) in self.info_arcs.iter() {
            for key in doc_arcs.keys() {
                by_key.entry(key).or_default().push(*doc_id);
            }
        }

        let mut shared: BTreeMap<(DocId, DocId), BTreeSet<ArcKey>> = BTreeMap::new();
        for (key, docs) in &by_key {
            for (i, a) in docs.iter().enumerate() {
                for b in &docs[i + 1..] {
                    shared.entry((*a, *b)).or_default().insert(*key);
                }
            }
        }

        let mut union = DocUnion::default();
        let links: Vec<(&(DocId, DocId), &BTreeSet<ArcKey>)> = shared
            .iter()
            .filter(|(_, keys)| keys.len() >= MIN_SHARED_ARCS)
            .collect();
        for ((a, b), _) in &links {
            union.union(*a, *b);
        }

        let mut groups: BTreeMap<DocId, (BTreeSet<DocId>, BTreeSet<ArcKey>)> = BTreeMap::new();
        for ((a, b), keys) in &links {
            let root = union.find(*a);
            let group = groups.entry(root).or_default();
            group.0.insert(*a);
            group.0.insert(*b);
            group.1.extend(keys.iter().copied());
        }

        // Roots are the smallest member, so key order follows the first document.
        for (key, (docs, arcs)) in (1..).zip(groups.into_values()) {
            self.topics.insert(key, docs);
            self.topic_arcs.insert(key, arcs);
        }

        let clustered: BTreeSet<DocId> = self.topics.values().flatten().copied().collect();
        self.unused = self
            .arcs
            .doc_ids()
            .into_iter()
            .chain(self.info_arcs.doc_ids())
            .filter(|d| !clustered.contains(d))
            .collect();

        info!(
            scope = %self.scope,
            facets = self.topics.len(),
            clustered = clustered.len(),
            unused = self.unused.len(),
            "Facets built"
        );
        Ok(self.topics.len())
    }

    /// Re-attempt backlog documents from earlier windows.
    ///
    /// Entries dated in `[begin - limit_days, begin)` may join the facet
    /// they share most informative arcs with (at least
    /// [`MIN_SHARED_ARCS`], ties to the lowest key). Entries older than the
    /// limit are purged.
    pub fn rescan(
        &mut self,
        backlog: &mut UnusedBacklog,
        limit_days: u32,
    ) -> Result<RescanReport, FacetsError> {
        self.advance(FacetState::Build, FacetState::Rescan)?;

        let mut report = RescanReport::default();
        let (Some(begin), Some(limit)) = (self.scope.begin(), self.scope.limit_date(limit_days))
        else {
            debug!(scope = %self.scope, "Unbounded window, nothing to rescan");
            return Ok(report);
        };

        report.purged = backlog.purge_older_than(limit);
        if !report.purged.is_empty() {
            warn!(
                scope = %self.scope,
                purged = report.purged.len(),
                %limit,
                "Unused documents passed the rescan limit"
            );
        }

        let window_docs = self.arcs.doc_ids();
        let candidates: Vec<UnusedEntry> = backlog
            .eligible(&self.scope, limit, begin)
            .into_iter()
            .filter(|e| !window_docs.contains(&e.doc_id))
            .cloned()
            .collect();
        report.eligible = candidates.len();

        for entry in candidates {
            let informative: BTreeSet<ArcKey> = entry
                .arcs
                .iter()
                .filter(|k| self.analyzer.is_informative(k))
                .copied()
                .collect();

            let mut best: Option<(LocalFacetKey, usize)> = None;
            for (key, arcs) in &self.topic_arcs {
                let overlap = arcs.intersection(&informative).count();
                if overlap >= MIN_SHARED_ARCS && best.map_or(true, |(_, b)| overlap > b) {
                    best = Some((*key, overlap));
                }
            }

            if let Some((facet, shared)) = best {
                if let Some(docs) = self.topics.get_mut(&facet) {
                    docs.insert(entry.doc_id);
                }
                self.rescanned.insert(
                    entry.doc_id,
                    RescannedDoc {
                        doc_id: entry.doc_id,
                        origin: entry.origin,
                        facet,
                        shared,
                        date: entry.date,
                        arcs: entry.arcs.clone(),
                    },
                );
                backlog.remove(entry.doc_id);
                report.matched.push(entry.doc_id);
            }
        }

        info!(
            scope = %self.scope,
            eligible = report.eligible,
            matched = report.matched.len(),
            "Backlog rescanned"
        );
        Ok(report)
    }

    /// Move this window's unused documents into the backlog and assemble
    /// the window output.
    pub fn finalize(
        &mut self,
        docs: &DocTable,
        backlog: &mut UnusedBacklog,
    ) -> Result<FacetOutput, FacetsError> {
        self.advance(FacetState::Rescan, FacetState::Finalize)?;

        for doc_id in self.topics.values().flatten() {
            if !self.rescanned.contains_key(doc_id) {
                backlog.remove(*doc_id);
            }
        }

        for doc_id in &self.unused {
            let Some(stats) = docs.get(*doc_id) else {
                warn!(doc_id, "Unused document missing from document table");
                continue;
            };
            let arcs = self
                .arcs
                .get(*doc_id)
                .map(|a| a.keys())
                .unwrap_or_default();
            backlog.insert(UnusedEntry {
                doc_id: *doc_id,
                date: stats.date,
                origin: self.scope,
                arcs,
            });
        }

        let output = FacetOutput {
            scope: self.scope,
            topics: std::mem::take(&mut self.topics),
            topic_arcs: std::mem::take(&mut self.topic_arcs),
            rescanned: std::mem::take(&mut self.rescanned),
            unused: std::mem::take(&mut self.unused),
        };
        self.advance(FacetState::Finalize, FacetState::Done)?;
        Ok(output)
    }
}
