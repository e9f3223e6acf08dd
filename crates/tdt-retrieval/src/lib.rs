//! # tdt-retrieval
//!
//! Resolves a query against the consolidated facets of a community.
//!
//! A query arrives through the [`seed`] hand-off, its tokens are mapped to
//! in-scope global facets, facets shared by several tokens are ranked, and
//! the facet–document graph is reduced to its main core ([`reduction`]).
//! The core documents are compared pairwise and grouped around prototypes
//! ([`similarity`]).
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tdt_retrieval::{seed_channel, AcceptAll, QuerySeed, TopicRetriever};
//!
//! let (tx, rx) = seed_channel();
//! tx.send(QuerySeed::resolve(&labels, &["storm", "coast"])).unwrap();
//! let mut retriever = TopicRetriever::new(&storage, "news", &mut consolidator, settings, task)?;
//! let outcome = retriever.retrieve_when_seeded(rx, &cancel, &AcceptAll).await?;
//! ```

pub mod error;
pub mod reduction;
pub mod retriever;
pub mod seed;
pub mod similarity;

pub use error::RetrievalError;
pub use reduction::{reduce_to_core, CoreReduction, DocGraph};
pub use retriever::{
    shared_facets, token_facets, AcceptAll, FacetRanking, FacetReview, RetrievalOutcome,
    RetrievalResult, TokenFacets, TopicRetriever, EMPTY_TOKEN_WARNING, MIN_SHARED_FACETS,
};
pub use seed::{seed_channel, QuerySeed, SeedReceiver, SeedSender, SeedWait};
pub use similarity::{
    sim_v, sim_w, Cluster, Clusters, DocAnalysis, DocEvidence, DocNode, SimilarityMatrix,
};
