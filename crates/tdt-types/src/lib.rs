//! # tdt-types
//!
//! Shared domain types for topic detection and tracking.
//!
//! This crate defines the data model every pipeline stage works on:
//! - Labels: term strings interned to integer vertex ids
//! - Vertices: per-collection occurrence, link and information statistics
//! - Arcs: positional co-occurrence edges between adjacent vertices
//! - Documents and collections: dated metadata and aggregate counts
//! - Scopes: date windows naming persisted artifacts
//! - Settings: layered configuration

pub mod arc;
pub mod artifact;
pub mod config;
pub mod doc;
pub mod error;
pub mod ids;
pub mod label;
pub mod scope;
pub mod token;
pub mod vertex;

pub use arc::{Arc, ArcKey, ArcsTable, DocArcs};
pub use artifact::{FacetFileEntry, GlobalArtifact, WindowArtifact};
pub use config::{PipelineSettings, RetrievalSettings, Settings};
pub use doc::{collection_key, CollectionKey, CollectionStats, CollectionTable, DocStats, DocTable};
pub use error::TdtError;
pub use ids::{
    shard_index, DocId, GlobalFacetKey, LocalFacetKey, VertexId, BOUNDARY_VERTEX, SHARD_COUNT,
};
pub use label::LabelTable;
pub use scope::Scope;
pub use token::{TokenRecord, TokenizedDocument, MAX_POSITION};
pub use vertex::{Vertex, VertexCounts, VerticesTable};
