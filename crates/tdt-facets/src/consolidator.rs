//! Cross-window consolidation of local facets.
//!
//! The [`FacetCollector`] lists the window files of a task scope; the
//! [`Consolidator`] merges each window into the global dictionary. The
//! consolidator owns the key registry, the scope index and the dictionary
//! together, so a merge allocates keys and fills shards in one `&mut self`
//! call.

use std::collections::{BTreeMap, BTreeSet};
use std::num::NonZeroUsize;

use lru::LruCache;
use tracing::{debug, info, instrument, warn};

use tdt_graph::{GraphAnalyzer, InfoMap};
use tdt_storage::Storage;
use tdt_types::{
    ArcKey, ArcsTable, DocArcs, DocId, DocTable, FacetFileEntry, GlobalArtifact, GlobalFacetKey,
    Scope, VertexId, WindowArtifact,
};

use crate::dictionary::FacetDictionary;
use crate::error::FacetsError;
use crate::maker::{RescannedMap, TopicArcsMap, TopicMap};
use crate::registry::{FacetKeyRegistry, ScopeFacetIndex};

const DEFAULT_CACHE_WINDOWS: usize = 8;

/// Lists the windows a consolidation task covers.
pub struct FacetCollector<'a> {
    storage: &'a Storage,
    community: &'a str,
}

impl<'a> FacetCollector<'a> {
    /// Collector over a community.
    pub fn new(storage: &'a Storage, community: &'a str) -> Self {
        Self { storage, community }
    }

    /// Facet file entries of every window with topics inside `task`.
    pub fn collect(&self, task: &Scope) -> Result<Vec<(Scope, [FacetFileEntry; 4])>, FacetsError> {
        let windows = self
            .storage
            .window_scopes(self.community, WindowArtifact::Topics)?;
        Ok(windows
            .into_iter()
            .filter(|w| w.is_in_scope(task))
            .map(|w| (w, FacetFileEntry::for_scope(&w)))
            .collect())
    }

    /// Entries whose artifact is absent.
    pub fn missing(&self, entries: &[FacetFileEntry]) -> Result<Vec<String>, FacetsError> {
        let mut missing = Vec::new();
        for entry in entries {
            let present = self
                .storage
                .get_window_by_name::<serde_json::Value>(self.community, entry.name())?
                .is_some();
            if !present {
                missing.push(entry.name().to_string());
            }
        }
        Ok(missing)
    }
}

/// Historical data of one window used for expansion.
struct WindowEvidence {
    arcs: ArcsTable,
    info_map: InfoMap,
}

/// Outcome of merging one window.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
    /// Newly allocated global keys
    pub new_keys: Vec<GlobalFacetKey>,
    /// Keys reused from an earlier merge of the same file
    pub reused_keys: Vec<GlobalFacetKey>,
    /// Dictionary entries added
    pub entries_added: usize,
    /// Documents whose evidence came from their origin window
    pub expanded_docs: usize,
    /// Documents with no evidence in any window
    pub docs_without_evidence: Vec<DocId>,
}

/// Global facet state of a community.
pub struct Consolidator {
    registry: FacetKeyRegistry,
    scopes: ScopeFacetIndex,
    dictionary: FacetDictionary,
    cache: LruCache<Scope, WindowEvidence>,
}

impl Consolidator {
    /// Empty consolidator.
    pub fn new() -> Self {
        Self::with_parts(
            FacetKeyRegistry::new(),
            ScopeFacetIndex::new(),
            FacetDictionary::new(),
        )
    }

    fn with_parts(
        registry: FacetKeyRegistry,
        scopes: ScopeFacetIndex,
        dictionary: FacetDictionary,
    ) -> Self {
        let capacity = NonZeroUsize::new(DEFAULT_CACHE_WINDOWS).unwrap_or(NonZeroUsize::MIN);
        Self {
            registry,
            scopes,
            dictionary,
            cache: LruCache::new(capacity),
        }
    }

    /// Load the community's registry, scope index and dictionary.
    #[instrument(skip(storage))]
    pub fn load(storage: &Storage, community: &str) -> Result<Self, FacetsError> {
        let registry = storage
            .get_global(community, GlobalArtifact::FacetKeys)?
            .unwrap_or_default();
        let scopes = storage
            .get_global(community, GlobalArtifact::ScopeFacet)?
            .unwrap_or_default();
        let dictionary = FacetDictionary::load(storage, community)?;
        Ok(Self::with_parts(registry, scopes, dictionary))
    }

    /// Persist registry, scope index and dictionary.
    #[instrument(skip(self, storage))]
    pub fn store(&self, storage: &Storage, community: &str) -> Result<(), FacetsError> {
        storage.put_global(community, GlobalArtifact::FacetKeys, &self.registry)?;
        storage.put_global(community, GlobalArtifact::ScopeFacet, &self.scopes)?;
        self.dictionary.store(storage, community)?;
        Ok(())
    }

    /// Key registry.
    pub fn registry(&self) -> &FacetKeyRegistry {
        &self.registry
    }

    /// Scope index.
    pub fn scopes(&self) -> &ScopeFacetIndex {
        &self.scopes
    }

    /// Dictionary.
    pub fn dictionary(&self) -> &FacetDictionary {
        &self.dictionary
    }

    fn evidence(
        &mut self,
        storage: &Storage,
        community: &str,
        scope: &Scope,
    ) -> Result<Option<&WindowEvidence>, FacetsError> {
        if !self.cache.contains(scope) {
            let arcs: Option<ArcsTable> = storage.get_window(community, scope, WindowArtifact::Arcs)?;
            let info_map: Option<InfoMap> =
                storage.get_window(community, scope, WindowArtifact::InfoTok)?;
            match (arcs, info_map) {
                (Some(arcs), Some(info_map)) => {
                    debug!(scope = %scope, "Caching window evidence");
                    self.cache.put(*scope, WindowEvidence { arcs, info_map });
                }
                _ => return Ok(None),
            }
        }
        Ok(self.cache.get(scope))
    }

    /// Informative vertices of a document in its own window.
    pub fn expand_vertices(
        &mut self,
        storage: &Storage,
        community: &str,
        scope: &Scope,
        doc_id: DocId,
    ) -> Result<BTreeSet<VertexId>, FacetsError> {
        Ok(self
            .expand_weighted_vertices(storage, community, scope, doc_id)?
            .into_keys()
            .collect())
    }

    /// Informative vertices of a document with their window weights.
    pub fn expand_weighted_vertices(
        &mut self,
        storage: &Storage,
        community: &str,
        scope: &Scope,
        doc_id: DocId,
    ) -> Result<BTreeMap<VertexId, f64>, FacetsError> {
        let Some(evidence) = self.evidence(storage, community, scope)? else {
            return Ok(BTreeMap::new());
        };
        Ok(evidence
            .arcs
            .get(doc_id)
            .map(|a| a.vertices())
            .unwrap_or_default()
            .into_iter()
            .filter_map(|v| evidence.info_map.weight(v).map(|w| (v, w)))
            .collect())
    }

    /// Informative arcs of a document in its own window.
    pub fn expand_info_arcs(
        &mut self,
        storage: &Storage,
        community: &str,
        scope: &Scope,
        doc_id: DocId,
    ) -> Result<DocArcs, FacetsError> {
        let Some(evidence) = self.evidence(storage, community, scope)? else {
            return Ok(DocArcs::new());
        };
        Ok(evidence
            .arcs
            .get(doc_id)
            .map(|a| GraphAnalyzer::new(&evidence.info_map).doc_info_arcs(a))
            .unwrap_or_default())
    }

    /// Merge one window into the global dictionary.
    ///
    /// Re-merging the same window reuses its keys and adds nothing.
    #[instrument(skip(self, storage, docs), fields(scope = %scope))]
    pub fn merge_window(
        &mut self,
        storage: &Storage,
        community: &str,
        scope: &Scope,
        docs: &mut DocTable,
    ) -> Result<MergeReport, FacetsError> {
        let entries = FacetFileEntry::for_scope(scope);
        let missing = FacetCollector::new(storage, community).missing(&entries)?;
        if !missing.is_empty() {
            return Err(FacetsError::MissingComponents(missing));
        }

        let mut topics = TopicMap::new();
        let mut rescanned = RescannedMap::new();
        let mut window_path = String::new();
        for entry in &entries {
            match entry {
                FacetFileEntry::Topics(name) => {
                    topics = storage
                        .get_window_by_name(community, name)?
                        .unwrap_or_default();
                    window_path = name.clone();
                }
                FacetFileEntry::Rescanned(name) => {
                    rescanned = storage
                        .get_window_by_name(community, name)?
                        .unwrap_or_default();
                }
                FacetFileEntry::Vertices(_) | FacetFileEntry::Info(_) => {}
            }
        }

        let mut report = MergeReport::default();
        let keys = self
            .registry
            .allocate_facet_keys(&window_path, topics.keys().copied());
        let mut window_dictionary = FacetDictionary::new();

        for (local, members) in &topics {
            let Some(&(global, created)) = keys.get(local) else {
                continue;
            };
            if created {
                report.new_keys.push(global);
            } else {
                report.reused_keys.push(global);
            }
            self.scopes.insert(global, *scope);

            for doc_id in members {
                let origin = rescanned.get(doc_id).map(|r| r.origin).unwrap_or(*scope);
                if origin != *scope {
                    report.expanded_docs += 1;
                }
                let vertices = self.expand_vertices(storage, community, &origin, *doc_id)?;
                if vertices.is_empty() {
                    report.docs_without_evidence.push(*doc_id);
                }
                for vertex in vertices {
                    window_dictionary.insert(vertex, global);
                }
                docs.add_facet(*doc_id, global);
            }
        }

        report.entries_added = self.dictionary.combine(&window_dictionary);
        if !report.docs_without_evidence.is_empty() {
            warn!(
                scope = %scope,
                docs = report.docs_without_evidence.len(),
                "Facet documents without informative vertices"
            );
        }
        info!(
            scope = %scope,
            new_keys = report.new_keys.len(),
            reused_keys = report.reused_keys.len(),
            entries = report.entries_added,
            "Window consolidated"
        );
        Ok(report)
    }

    /// Merge every window of `task`; windows missing components are
    /// reported and skipped.
    pub fn consolidate(
        &mut self,
        storage: &Storage,
        community: &str,
        task: &Scope,
        docs: &mut DocTable,
    ) -> Result<ConsolidationReport, FacetsError> {
        let windows = FacetCollector::new(storage, community).collect(task)?;
        let mut report = ConsolidationReport::default();
        for (window, _) in windows {
            match self.merge_window(storage, community, &window, docs) {
                Ok(merge) => {
                    report.merged.insert(window, merge);
                }
                Err(FacetsError::MissingComponents(missing)) => {
                    warn!(scope = %window, ?missing, "Necessary components are missing");
                    report.skipped.insert(window, missing);
                }
                Err(e) => return Err(e),
            }
        }
        Ok(report)
    }

    /// Documents of a global facet, read from its window topic file.
    pub fn facet_documents(
        &self,
        storage: &Storage,
        community: &str,
        key: GlobalFacetKey,
    ) -> Result<BTreeSet<DocId>, FacetsError> {
        let Some(origin) = self.registry.origin(key) else {
            return Ok(BTreeSet::new());
        };
        let topics: TopicMap = storage
            .get_window_by_name(community, &origin.window_path)?
            .unwrap_or_default();
        Ok(topics.get(&origin.local).cloned().unwrap_or_default())
    }

    /// Defining arcs of a global facet.
    pub fn facet_arcs(
        &self,
        storage: &Storage,
        community: &str,
        key: GlobalFacetKey,
    ) -> Result<BTreeSet<ArcKey>, FacetsError> {
        let (Some(origin), Some(scope)) = (self.registry.origin(key), self.scopes.scope_of(key))
        else {
            return Ok(BTreeSet::new());
        };
        let arcs: Option<TopicArcsMap> =
            storage.get_window(community, &scope, WindowArtifact::TopArcs)?;
        Ok(arcs
            .and_then(|mut a| a.remove(&origin.local))
            .unwrap_or_default())
    }
}

impl Default for Consolidator {
    fn default() -> Self {
        Self::new()
    }
}

/// Outcome of consolidating a task scope.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConsolidationReport {
    /// Merged windows
    pub merged: BTreeMap<Scope, MergeReport>,
    /// Windows skipped and the artifacts they lack
    pub skipped: BTreeMap<Scope, Vec<String>>,
}
