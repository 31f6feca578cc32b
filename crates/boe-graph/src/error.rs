//! Graph adapter error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GraphError {
    #[error("graph backend error: {0}")]
    Backend(#[from] duckdb::Error),

    #[error("graph not initialized: {0}")]
    NotInitialized(String),

    #[error("node not found: {0}")]
    NodeNotFound(String),

    #[error("vector index lifecycle failure: {0}")]
    IndexLifecycle(String),

    #[error("malformed node/edge properties: {0}")]
    MalformedProperties(#[from] serde_json::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}
