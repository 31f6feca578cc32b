//! # boe-graph
//!
//! The Graph Adapter (C3): a narrow facade over the document/content graph.
//! The rest of the pipeline depends on the [`GraphAdapter`] trait, never on
//! a specific storage engine — [`DuckDbGraphAdapter`] backs production runs,
//! [`InMemoryGraphAdapter`] backs tests and the simulation/benchmark paths.

pub mod adapter;
pub mod duckdb_adapter;
pub mod error;
pub mod memory;
pub mod types;

pub use adapter::GraphAdapter;
pub use duckdb_adapter::DuckDbGraphAdapter;
pub use error::GraphError;
pub use memory::InMemoryGraphAdapter;
pub use types::{EdgeRecord, NodeRecord, ScoredArticle, VectorSimilarity};
