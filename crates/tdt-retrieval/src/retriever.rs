//! Query resolution against the consolidated facet dictionary.
//!
//! Per query:
//! 1. look up each token's facets and keep those from windows inside the
//!    task scope
//! 2. keep every token, empty facet sets included, for diagnostics
//! 3. retain pairwise intersections of at least [`MIN_SHARED_FACETS`]
//! 4. rank shared facets by how many tokens reference them
//! 5. reduce the facet–document graph to its main core
//! 6. resolve the defining arcs of the retained facets, read the informative
//!    evidence of every core document and compare

use std::collections::{BTreeMap, BTreeSet};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use tdt_facets::{Consolidator, FacetDictionary, RescannedMap, ScopeFacetIndex};
use tdt_graph::{connect_arcs, MIN_WALK_LENGTH};
use tdt_storage::Storage;
use tdt_types::{
    ArcKey, DocId, GlobalFacetKey, RetrievalSettings, Scope, VertexId, WindowArtifact,
};

use crate::error::RetrievalError;
use crate::reduction::{reduce_to_core, CoreReduction};
use crate::seed::{QuerySeed, SeedReceiver, SeedWait};
use crate::similarity::{Clusters, DocAnalysis, DocEvidence, SimilarityMatrix};

/// A pairwise intersection smaller than this is coincidence.
pub const MIN_SHARED_FACETS: usize = 2;

/// More empty query tokens than this produce a quality warning.
pub const EMPTY_TOKEN_WARNING: usize = 2;

/// Facet set of every query token.
pub type TokenFacets = BTreeMap<VertexId, BTreeSet<GlobalFacetKey>>;

/// Step 1 and 2: in-scope facets of every query token.
pub fn token_facets(
    dictionary: &FacetDictionary,
    scopes: &ScopeFacetIndex,
    task: &Scope,
    seed: &QuerySeed,
) -> TokenFacets {
    seed.tokens
        .iter()
        .map(|token| {
            let facets = dictionary
                .facets(*token)
                .map(|keys| scopes.filter_in_scope(keys, task))
                .unwrap_or_default();
            (*token, facets)
        })
        .collect()
}

/// Step 3: facets each token shares with at least one other token.
///
/// For every token pair the intersection is retained for both tokens only
/// when it holds [`MIN_SHARED_FACETS`] or more facets. Tokens sharing
/// nothing are absent from the result.
pub fn shared_facets(tokens: &TokenFacets) -> TokenFacets {
    let entries: Vec<(&VertexId, &BTreeSet<GlobalFacetKey>)> = tokens.iter().collect();
    let mut shared = TokenFacets::new();
    for (i, (ta, fa)) in entries.iter().enumerate() {
        for (tb, fb) in &entries[i + 1..] {
            let common: BTreeSet<GlobalFacetKey> = fa.intersection(fb).copied().collect();
            if common.len() < MIN_SHARED_FACETS {
                continue;
            }
            shared.entry(**ta).or_default().extend(common.iter().copied());
            shared.entry(**tb).or_default().extend(common);
        }
    }
    shared
}

/// Step 4: shared facets grouped by the number of tokens referencing them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FacetRanking {
    levels: BTreeMap<usize, BTreeSet<GlobalFacetKey>>,
}

impl FacetRanking {
    /// Rank the facets of a shared token map.
    pub fn rank(shared: &TokenFacets) -> Self {
        let mut counts: BTreeMap<GlobalFacetKey, usize> = BTreeMap::new();
        for key in shared.values().flatten() {
            *counts.entry(*key).or_insert(0) += 1;
        }
        let mut levels: BTreeMap<usize, BTreeSet<GlobalFacetKey>> = BTreeMap::new();
        for (key, count) in counts {
            levels.entry(count).or_default().insert(key);
        }
        Self { levels }
    }

    /// `(token count, facets)` from the highest count down.
    pub fn levels(&self) -> impl Iterator<Item = (usize, &BTreeSet<GlobalFacetKey>)> {
        self.levels.iter().rev().map(|(c, keys)| (*c, keys))
    }

    /// Facets from the highest count down, ties by key.
    pub fn facets(&self) -> Vec<GlobalFacetKey> {
        self.levels().flat_map(|(_, keys)| keys.iter().copied()).collect()
    }

    /// Number of ranked facets.
    pub fn len(&self) -> usize {
        self.levels.values().map(BTreeSet::len).sum()
    }

    /// Whether nothing was ranked.
    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }
}

/// Review point between core reduction and similarity.
///
/// Returning `false` ends the task as [`RetrievalOutcome::Aborted`].
pub trait FacetReview: Send + Sync {
    /// Whether to continue with the retained facets.
    fn review(&self, ranking: &FacetRanking, reduction: &CoreReduction) -> bool;
}

/// Review that always continues.
pub struct AcceptAll;

impl FacetReview for AcceptAll {
    fn review(&self, _ranking: &FacetRanking, _reduction: &CoreReduction) -> bool {
        true
    }
}

impl<F> FacetReview for F
where
    F: Fn(&FacetRanking, &CoreReduction) -> bool + Send + Sync,
{
    fn review(&self, ranking: &FacetRanking, reduction: &CoreReduction) -> bool {
        self(ranking, reduction)
    }
}

/// Everything a completed retrieval produces.
#[derive(Debug, Clone)]
pub struct RetrievalResult {
    /// Facets of every query token
    pub token_facets: TokenFacets,
    /// Pairwise shared facets
    pub shared: TokenFacets,
    /// Shared facets by token count
    pub ranking: FacetRanking,
    /// Main core
    pub reduction: CoreReduction,
    /// Defining arcs of every retained facet
    pub facet_arcs: BTreeMap<GlobalFacetKey, BTreeSet<ArcKey>>,
    /// Evidence of every core document
    pub evidence: BTreeMap<DocId, DocEvidence>,
    /// Pairwise similarities
    pub matrix: SimilarityMatrix,
    /// Prototype clusters
    pub clusters: Clusters,
    /// Quality warnings
    pub warnings: Vec<String>,
}

/// How a retrieval task ended.
#[derive(Debug, Clone)]
pub enum RetrievalOutcome {
    /// Similarities were computed
    Completed(Box<RetrievalResult>),
    /// No facet is shared by two query tokens
    NothingToRetrieve {
        /// Facets of every query token
        token_facets: TokenFacets,
        /// Quality warnings
        warnings: Vec<String>,
    },
    /// The review declined to continue, or query input closed
    Aborted,
    /// The task was cancelled
    Cancelled,
}

/// Resolves queries for one community and task scope.
pub struct TopicRetriever<'a> {
    storage: &'a Storage,
    community: &'a str,
    consolidator: &'a mut Consolidator,
    settings: RetrievalSettings,
    task: Scope,
}

impl<'a> TopicRetriever<'a> {
    /// Retriever over a loaded consolidator.
    pub fn new(
        storage: &'a Storage,
        community: &'a str,
        consolidator: &'a mut Consolidator,
        settings: RetrievalSettings,
        task: Scope,
    ) -> Result<Self, RetrievalError> {
        settings
            .validate()
            .map_err(RetrievalError::InvalidParameter)?;
        Ok(Self {
            storage,
            community,
            consolidator,
            settings,
            task,
        })
    }

    /// Task scope.
    pub fn task(&self) -> &Scope {
        &self.task
    }

    /// Wait for the query seed, then retrieve.
    pub async fn retrieve_when_seeded(
        &mut self,
        seeds: SeedReceiver,
        cancel: &CancellationToken,
        review: &dyn FacetReview,
    ) -> Result<RetrievalOutcome, RetrievalError> {
        match seeds.wait(cancel).await {
            SeedWait::Ready(seed) => self.retrieve(&seed, review),
            SeedWait::Cancelled => Ok(RetrievalOutcome::Cancelled),
            SeedWait::Closed => {
                info!("Query input closed before sending a seed");
                Ok(RetrievalOutcome::Aborted)
            }
        }
    }

    /// Run steps 1 to 6 for a resolved query.
    #[instrument(skip_all, fields(task = %self.task, tokens = seed.tokens.len()))]
    pub fn retrieve(
        &mut self,
        seed: &QuerySeed,
        review: &dyn FacetReview,
    ) -> Result<RetrievalOutcome, RetrievalError> {
        let mut warnings = Vec::new();
        if !seed.unknown.is_empty() {
            warnings.push(format!("Unknown query terms: {}", seed.unknown.join(", ")));
        }

        let tokens = token_facets(
            self.consolidator.dictionary(),
            self.consolidator.scopes(),
            &self.task,
            seed,
        );
        let empty = tokens.values().filter(|f| f.is_empty()).count();
        if empty > EMPTY_TOKEN_WARNING {
            let message = format!(
                "{} query tokens connect to no facet in {}",
                empty, self.task
            );
            warn!(task = %self.task, empty, "Query tokens without facets");
            warnings.push(message);
        }

        let shared = shared_facets(&tokens);
        if shared.is_empty() {
            info!(task = %self.task, "Nothing to retrieve");
            return Ok(RetrievalOutcome::NothingToRetrieve {
                token_facets: tokens,
                warnings,
            });
        }
        let ranking = FacetRanking::rank(&shared);

        let mut facet_docs = BTreeMap::new();
        for key in ranking.facets() {
            let docs = self
                .consolidator
                .facet_documents(self.storage, self.community, key)?;
            facet_docs.insert(key, docs);
        }
        let reduction = reduce_to_core(&facet_docs, self.settings.core_number);

        if !review.review(&ranking, &reduction) {
            info!(task = %self.task, "Retrieval aborted at facet review");
            return Ok(RetrievalOutcome::Aborted);
        }

        let mut facet_arcs = BTreeMap::new();
        for key in reduction.facets.keys() {
            let arcs = self
                .consolidator
                .facet_arcs(self.storage, self.community, *key)?;
            facet_arcs.insert(*key, arcs);
        }
        let evidence = self.collect_evidence(&ranking, &reduction)?;
        let matrix = DocAnalysis::new(&evidence, self.settings.alpha).matrix();
        let clusters = Clusters::greedy(
            &matrix,
            &reduction.docs,
            self.settings.cluster_threshold,
            self.settings.max_results,
        );

        info!(
            task = %self.task,
            facets = reduction.facets.len(),
            docs = reduction.docs.len(),
            pairs = matrix.len(),
            clusters = clusters.len(),
            "Retrieval completed"
        );
        Ok(RetrievalOutcome::Completed(Box::new(RetrievalResult {
            token_facets: tokens,
            shared,
            ranking,
            reduction,
            facet_arcs,
            evidence,
            matrix,
            clusters,
            warnings,
        })))
    }

    /// Step 6: evidence of every core document, read from the window the
    /// document was processed in.
    fn collect_evidence(
        &mut self,
        ranking: &FacetRanking,
        reduction: &CoreReduction,
    ) -> Result<BTreeMap<DocId, DocEvidence>, RetrievalError> {
        let mut rescanned: BTreeMap<Scope, RescannedMap> = BTreeMap::new();
        let mut evidence = BTreeMap::new();

        for key in ranking.facets() {
            let Some(docs) = reduction.facets.get(&key) else {
                continue;
            };
            let Some(window) = self.consolidator.scopes().scope_of(key) else {
                warn!(facet = key, "Facet without source window");
                continue;
            };
            if !rescanned.contains_key(&window) {
                let map: Option<RescannedMap> =
                    self.storage
                        .get_window(self.community, &window, WindowArtifact::Rescanned)?;
                rescanned.insert(window, map.unwrap_or_default());
            }

            for doc_id in docs {
                if evidence.contains_key(doc_id) {
                    continue;
                }
                let origin = rescanned
                    .get(&window)
                    .and_then(|m| m.get(doc_id))
                    .map_or(window, |r| r.origin);
                let vertices = self.consolidator.expand_weighted_vertices(
                    self.storage,
                    self.community,
                    &origin,
                    *doc_id,
                )?;
                let info_arcs = self.consolidator.expand_info_arcs(
                    self.storage,
                    self.community,
                    &origin,
                    *doc_id,
                )?;
                let phrases = connect_arcs(info_arcs.iter(), MIN_WALK_LENGTH)
                    .iter()
                    .filter_map(|walk| {
                        let first = walk.first()?;
                        let mut phrase = vec![first.key.left];
                        phrase.extend(walk.iter().map(|a| a.key.right));
                        Some(phrase)
                    })
                    .collect();
                debug!(doc_id, origin = %origin, vertices = vertices.len(), "Document evidence");
                evidence.insert(
                    *doc_id,
                    DocEvidence {
                        doc_id: *doc_id,
                        origin,
                        vertices,
                        arcs: info_arcs.keys(),
                        phrases,
                    },
                );
            }
        }
        Ok(evidence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tdt_facets::FacetKeyRegistry;

    fn set(keys: &[GlobalFacetKey]) -> BTreeSet<GlobalFacetKey> {
        keys.iter().copied().collect()
    }

    fn tokens(entries: &[(VertexId, &[GlobalFacetKey])]) -> TokenFacets {
        entries.iter().map(|(t, keys)| (*t, set(keys))).collect()
    }

    #[test]
    fn test_two_shared_facets_retained() {
        let shared = shared_facets(&tokens(&[(1, &[1, 2, 3]), (2, &[2, 3, 4])]));
        assert_eq!(shared[&1], set(&[2, 3]));
        assert_eq!(shared[&2], set(&[2, 3]));
    }

    #[test]
    fn test_single_shared_facet_discarded() {
        let shared = shared_facets(&tokens(&[(1, &[1, 2]), (2, &[2, 5])]));
        assert!(shared.is_empty());
    }

    #[test]
    fn test_ranking_by_token_count() {
        let shared = shared_facets(&tokens(&[
            (1, &[1, 2, 3]),
            (2, &[1, 2, 3, 4]),
            (3, &[3, 4, 9]),
        ]));
        // 1 and 2 share {1,2,3}; 2 and 3 share {3,4}; 1 and 3 share {3}.
        let ranking = FacetRanking::rank(&shared);
        let levels: Vec<(usize, BTreeSet<GlobalFacetKey>)> =
            ranking.levels().map(|(c, k)| (c, k.clone())).collect();
        assert_eq!(levels, vec![(3, set(&[3])), (2, set(&[1, 2, 4]))]);
        assert_eq!(ranking.facets(), vec![3, 1, 2, 4]);
        assert_eq!(ranking.len(), 4);
    }

    #[test]
    fn test_token_facets_filters_scope_and_keeps_empty_tokens() {
        use chrono::NaiveDate;
        let date = |m, d| NaiveDate::from_ymd_opt(2023, m, d).unwrap();
        let mut dictionary = FacetDictionary::new();
        let mut scopes = ScopeFacetIndex::new();
        let mut registry = FacetKeyRegistry::new();
        let (jan, _) = registry.allocate("jan", 1);
        let (feb, _) = registry.allocate("feb", 1);
        scopes.insert(jan, Scope::range(date(1, 1), date(1, 2)));
        scopes.insert(feb, Scope::range(date(2, 1), date(2, 2)));
        dictionary.insert(10, jan);
        dictionary.insert(10, feb);

        let task = Scope::range(date(1, 1), date(1, 31));
        let result = token_facets(&dictionary, &scopes, &task, &QuerySeed::from_ids([10, 11]));
        assert_eq!(result[&10], set(&[jan]));
        assert!(result[&11].is_empty());
    }
}
