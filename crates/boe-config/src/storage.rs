//! Where the graph store and the embedding cache persist on disk.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct StorageConfig {
    /// Path to the `DuckDB` file backing the graph adapter.
    #[serde(default = "default_graph_path")]
    pub graph_path: String,
    /// Path to the `DuckDB` file backing the embedding cache.
    #[serde(default = "default_cache_path")]
    pub embedding_cache_path: String,
}

fn default_graph_path() -> String {
    "./boe-graph.duckdb".to_string()
}

fn default_cache_path() -> String {
    "./boe-embedding-cache.duckdb".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            graph_path: default_graph_path(),
            embedding_cache_path: default_cache_path(),
        }
    }
}
