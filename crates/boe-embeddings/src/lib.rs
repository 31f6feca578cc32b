//! # boe-embeddings
//!
//! Content-addressed embedding cache and batched embedding provider for the
//! BOE ingestion pipeline. The pipeline's Embed pool talks only to the
//! [`EmbeddingProvider`] trait; caching, retry, simulation, and the real
//! model backend are all swappable behind it.

pub mod cache;
pub mod error;
pub mod provider;

pub use cache::{DuckDbEmbeddingCache, EmbeddingCache, InMemoryEmbeddingCache};
pub use error::EmbeddingError;
pub use provider::{
    CachingProvider, EmbeddingProvider, FastEmbedProvider, SimulatedEmbeddingProvider, chunked,
    simulate_vector, with_retry,
};
