//! # tdt-graph
//!
//! Term graph stages of a window:
//! - [`network`]: vertices and positional arcs from tokenized documents
//! - [`info_value`]: per-collection information values (modified TF-IDF)
//! - [`informative`]: informative/rejected partition and the `infoMap`
//! - [`baseline`]: closed-class word lists excluded from scoring
//! - [`analyzer`]: informative arcs and associations (walks)

pub mod analyzer;
pub mod baseline;
pub mod error;
pub mod info_value;
pub mod informative;
pub mod network;

pub use analyzer::{
    adjust_all_arc_weights, connect_arcs, Association, AssociationMap, GraphAnalyzer,
    MIN_WALK_LENGTH,
};
pub use baseline::{BaselineList, ResolvedBaseline};
pub use error::GraphError;
pub use info_value::{InfoValueCalculator, InfoValueOutcome, InfoValueReport};
pub use informative::{retrieve_info_map, store_info_map, InfoMap, InformativeTokens, Partition};
pub use network::{build_doc_arcs, resolve_tokens, Network, NetworkBuilder, NetworkReport};
