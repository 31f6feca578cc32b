//! Embedding cache and provider error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EmbeddingError {
    /// Model/cache initialization failed.
    #[error("embedding provider init failed: {0}")]
    InitFailed(String),

    /// Embedding generation failed for a reason expected to be transient
    /// (rate limit, 5xx, connection error, timeout).
    #[error("transient embedding failure: {0}")]
    Transient(String),

    /// Embedding generation failed permanently (auth, malformed request, or
    /// retries exhausted).
    #[error("permanent embedding failure: {0}")]
    Permanent(String),

    /// Cache I/O failed. Callers treat this as non-fatal (see
    /// `EmbeddingError::is_cache_io`).
    #[error("embedding cache I/O error: {0}")]
    CacheIo(String),
}

impl EmbeddingError {
    #[must_use]
    pub const fn is_cache_io(&self) -> bool {
        matches!(self, Self::CacheIo(_))
    }
}
