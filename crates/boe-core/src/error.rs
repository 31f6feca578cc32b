//! Error kinds shared across the ingestion pipeline.
//!
//! These mirror the "error kinds, not types" taxonomy from the design: each
//! variant is a point where the orchestrator decides between retry,
//! per-document failure, or aborting the whole batch.

use thiserror::Error;

/// Errors that can occur while ingesting a single document or running the
/// batch as a whole.
#[derive(Debug, Error)]
pub enum IngestError {
    /// The external document source returned no body (or an HTTP error).
    #[error("fetch failed for {law_id}: {reason}")]
    FetchFailure { law_id: String, reason: String },

    /// The external parser could not convert the source into a content tree.
    #[error("parse failed for {law_id}: {reason}")]
    ParseFailure { law_id: String, reason: String },

    /// Embedding call failed for a reason expected to be transient
    /// (rate limit, 5xx, connection reset, timeout). Retried locally.
    #[error("transient embedding failure: {0}")]
    EmbedTransient(String),

    /// Embedding call failed permanently (retries exhausted, or a
    /// non-transient failure such as auth or a malformed request).
    #[error("embedding failed permanently: {0}")]
    EmbedPermanent(String),

    /// A graph write (merge, batch merge) failed.
    #[error("graph write failed: {0}")]
    GraphWriteFailure(String),

    /// The embedding cache failed to persist. Logged, never fatal.
    #[error("cache persist failed: {0}")]
    CachePersistFailure(String),

    /// A citation marker could not be resolved to a target article or
    /// document. Logged, never fatal.
    #[error("unresolved reference: {0}")]
    LinkerUnresolvedRef(String),

    /// Vector index drop/create failed. Fatal for the whole batch.
    #[error("vector index lifecycle failure: {0}")]
    IndexLifecycleFailure(String),

    /// Catch-all for infrastructure failures that abort the batch
    /// (cannot open graph, cannot open cache, and similar).
    #[error(transparent)]
    Infrastructure(#[from] anyhow::Error),
}

impl IngestError {
    /// Whether this error kind should retry locally rather than failing the
    /// document or the batch outright.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::EmbedTransient(_))
    }

    /// Whether this error should abort the whole batch rather than being
    /// recorded against a single document.
    #[must_use]
    pub const fn is_batch_fatal(&self) -> bool {
        matches!(self, Self::IndexLifecycleFailure(_) | Self::Infrastructure(_))
    }
}
