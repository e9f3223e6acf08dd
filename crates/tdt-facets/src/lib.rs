//! # tdt-facets
//!
//! Topical facets: per-window extraction and cross-window consolidation.
//!
//! - [`maker`]: clusters documents sharing informative arcs into local
//!   facets and rescans the unused backlog
//! - [`backlog`]: documents waiting for a later window
//! - [`registry`]: global facet keys and their source windows
//! - [`dictionary`]: the sharded vertex → facet dictionary
//! - [`consolidator`]: merges window facets into the global structures

pub mod backlog;
pub mod consolidator;
pub mod dictionary;
pub mod error;
pub mod maker;
pub mod registry;

pub use backlog::{UnusedBacklog, UnusedEntry};
pub use consolidator::{ConsolidationReport, Consolidator, FacetCollector, MergeReport};
pub use dictionary::{combine, FacetDictionary, ShardMap};
pub use error::FacetsError;
pub use maker::{
    FacetMaker, FacetOutput, FacetState, RescanReport, RescannedDoc, RescannedMap, TopicArcsMap,
    TopicMap, MIN_SHARED_ARCS,
};
pub use registry::{FacetKeyRegistry, FacetOrigin, ScopeFacetIndex};
