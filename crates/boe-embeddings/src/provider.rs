//! Embedding Provider (C2): batched remote embedding with retry/backoff and
//! an optional deterministic simulation mode, wrapped in transparent
//! caching against an [`EmbeddingCache`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use sha2::{Digest, Sha256};
use tracing::{info, warn};

use crate::cache::EmbeddingCache;
use crate::error::EmbeddingError;

/// `embed_one`/`embed_batch` over a fixed-dimension embedding model.
/// Implementations are stateless across calls: retry/backoff state lives
/// entirely within one `embed_batch` invocation, never shared.
pub trait EmbeddingProvider: Send + Sync {
    /// Output vector dimension, fixed at construction time.
    fn dimension(&self) -> usize;

    /// Embed a batch of texts, aligned with input order. On permanent
    /// failure the whole batch fails — no partial results.
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>;

    fn embed_one(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let mut out = self.embed_batch(std::slice::from_ref(&text.to_string()))?;
        Ok(out.remove(0))
    }
}

/// Exponential backoff schedule for transient failures: 1s, 2s, 4s, ...
fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_secs(1u64 << attempt)
}

/// Run `call` up to `1 + max_retries` times, sleeping with exponential
/// backoff between attempts as long as the error is transient. Promotes to
/// whatever `call` returns on the final attempt.
pub fn with_retry<T>(
    max_retries: u32,
    mut call: impl FnMut(u32) -> Result<T, EmbeddingError>,
) -> Result<T, EmbeddingError> {
    let mut attempt = 0;
    loop {
        match call(attempt) {
            Ok(value) => return Ok(value),
            Err(EmbeddingError::Transient(reason)) if attempt < max_retries => {
                warn!(attempt, reason, "transient embedding failure, retrying after backoff");
                std::thread::sleep(backoff_delay(attempt));
                attempt += 1;
            }
            Err(EmbeddingError::Transient(reason)) => {
                return Err(EmbeddingError::Permanent(format!(
                    "retries exhausted after {attempt} attempts: {reason}"
                )));
            }
            Err(other) => return Err(other),
        }
    }
}

/// Deterministic pseudo-vector derived from the hash of the input, used for
/// benchmarking the pipeline backbone without a network call.
#[must_use]
pub fn simulate_vector(text: &str, dim: usize) -> Vec<f32> {
    let digest = Sha256::digest(text.as_bytes());
    (0..dim)
        .map(|i| {
            let byte = digest[i % digest.len()];
            // Map to [-1.0, 1.0] so vectors look like normalized embeddings.
            (f32::from(byte) / 127.5) - 1.0
        })
        .collect()
}

/// Always-available provider returning deterministic fake vectors. No
/// network call is made; identical input produces identical output across
/// runs and processes.
pub struct SimulatedEmbeddingProvider {
    dim: usize,
}

impl SimulatedEmbeddingProvider {
    #[must_use]
    pub const fn new(dim: usize) -> Self {
        Self { dim }
    }
}

impl EmbeddingProvider for SimulatedEmbeddingProvider {
    fn dimension(&self) -> usize {
        self.dim
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        Ok(texts.iter().map(|t| simulate_vector(t, self.dim)).collect())
    }
}

/// Wraps an inner [`EmbeddingProvider`] with transparent, content-addressed
/// caching. Only cache misses reach the inner provider; hits and misses are
/// reassembled into the original input order.
pub struct CachingProvider<P, C> {
    inner: P,
    cache: C,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<P: EmbeddingProvider, C: EmbeddingCache> CachingProvider<P, C> {
    pub const fn new(inner: P, cache: C) -> Self {
        Self { inner, cache, hits: AtomicU64::new(0), misses: AtomicU64::new(0) }
    }

    #[must_use]
    pub fn cache_hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn cache_misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    /// Flush the underlying cache. Surfaced to the orchestrator as a
    /// `CachePersistFailure` if it fails.
    pub fn flush_cache(&self) -> Result<(), EmbeddingError> {
        self.cache.flush()
    }
}

fn content_key(text: &str) -> String {
    format!("{:x}", Sha256::digest(text.as_bytes()))
}

impl<P: EmbeddingProvider, C: EmbeddingCache> EmbeddingProvider for CachingProvider<P, C> {
    fn dimension(&self) -> usize {
        self.inner.dimension()
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let mut results: Vec<Option<Vec<f32>>> = vec![None; texts.len()];
        let mut miss_indices = Vec::new();
        let mut miss_texts = Vec::new();

        for (i, text) in texts.iter().enumerate() {
            let key = content_key(text);
            if let Some(vector) = self.cache.get(&key) {
                self.hits.fetch_add(1, Ordering::Relaxed);
                results[i] = Some(vector);
            } else {
                self.misses.fetch_add(1, Ordering::Relaxed);
                miss_indices.push(i);
                miss_texts.push(text.clone());
            }
        }

        if !miss_texts.is_empty() {
            let generated = self.inner.embed_batch(&miss_texts)?;
            for (idx, (text, vector)) in miss_indices.into_iter().zip(miss_texts.into_iter().zip(generated)) {
                self.cache.set(&content_key(&text), &vector);
                results[idx] = Some(vector);
            }
        }

        Ok(results.into_iter().map(|v| v.expect("every index was filled from cache or generation")).collect())
    }
}

/// The provider-imposed chunk size. `embed_batch` on any provider wrapper
/// that calls a real upstream API should chunk through this helper so the
/// provider never receives more than `batch_max` texts at once.
#[must_use]
pub fn chunked<'a>(texts: &'a [String], batch_max: usize) -> impl Iterator<Item = &'a [String]> {
    texts.chunks(batch_max.max(1))
}

/// Local embedding via `fastembed`'s bundled ONNX models. `fastembed`'s
/// models are natively 384-dimensional; the configured `embedding_dim` may
/// differ, so output vectors are truncated or zero-padded to match. This
/// keeps `embedding_dim` a true runtime parameter rather than a hard-coded
/// model width, at the cost of wasting (or losing) components when the two
/// disagree — acceptable for local/offline development and benchmarking,
/// not represented as the default provider.
pub struct FastEmbedProvider {
    model: std::sync::Mutex<fastembed::TextEmbedding>,
    dim: usize,
}

impl FastEmbedProvider {
    pub fn try_new(dim: usize) -> Result<Self, EmbeddingError> {
        let cache_dir = dirs::home_dir().unwrap_or_else(|| std::path::PathBuf::from(".")).join(".boe-ingest").join("fastembed");
        let options = fastembed::TextInitOptions::new(fastembed::EmbeddingModel::BGESmallENV15)
            .with_cache_dir(cache_dir)
            .with_show_download_progress(false);
        let model = fastembed::TextEmbedding::try_new(options).map_err(|e| EmbeddingError::InitFailed(e.to_string()))?;
        info!(dim, "fastembed model loaded");
        Ok(Self { model: std::sync::Mutex::new(model), dim })
    }

    fn resize(&self, mut vector: Vec<f32>) -> Vec<f32> {
        vector.resize(self.dim, 0.0);
        vector
    }
}

impl EmbeddingProvider for FastEmbedProvider {
    fn dimension(&self) -> usize {
        self.dim
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let mut model = self.model.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let raw = model.embed(texts.to_vec(), None).map_err(|e| EmbeddingError::Permanent(e.to_string()))?;
        Ok(raw.into_iter().map(|v| self.resize(v)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::InMemoryEmbeddingCache;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case::rate_limit(EmbeddingError::Transient("429".into()), true)]
    #[case::server_error(EmbeddingError::Transient("503".into()), true)]
    #[case::auth_failure(EmbeddingError::Permanent("invalid api key".into()), false)]
    #[case::malformed_request(EmbeddingError::Permanent("400 bad request".into()), false)]
    #[case::init_failed(EmbeddingError::InitFailed("model download failed".into()), false)]
    fn with_retry_classifies_error_kinds_correctly(#[case] error: EmbeddingError, #[case] should_retry: bool) {
        let mut calls = 0;
        let result: Result<(), EmbeddingError> = with_retry(1, |_| {
            calls += 1;
            if calls == 1 { Err(clone_error(&error)) } else { Ok(()) }
        });
        if should_retry {
            assert_eq!(calls, 2, "transient errors must be retried");
            assert!(result.is_ok());
        } else {
            assert_eq!(calls, 1, "non-transient errors must fail fast");
            assert!(result.is_err());
        }
    }

    fn clone_error(error: &EmbeddingError) -> EmbeddingError {
        match error {
            EmbeddingError::Transient(reason) => EmbeddingError::Transient(reason.clone()),
            EmbeddingError::Permanent(reason) => EmbeddingError::Permanent(reason.clone()),
            EmbeddingError::InitFailed(reason) => EmbeddingError::InitFailed(reason.clone()),
            EmbeddingError::CacheIo(reason) => EmbeddingError::CacheIo(reason.clone()),
        }
    }

    #[test]
    fn simulated_vectors_are_deterministic() {
        let provider = SimulatedEmbeddingProvider::new(768);
        let a = provider.embed_one("hola").unwrap();
        let b = provider.embed_one("hola").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 768);
    }

    #[test]
    fn simulated_vectors_differ_by_input() {
        let provider = SimulatedEmbeddingProvider::new(32);
        let a = provider.embed_one("hola").unwrap();
        let b = provider.embed_one("adios").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn with_retry_succeeds_after_transient_failures() {
        let mut calls = 0;
        let result: Result<&str, EmbeddingError> = with_retry(3, |attempt| {
            calls += 1;
            if attempt < 2 { Err(EmbeddingError::Transient("429".into())) } else { Ok("ok") }
        });
        assert_eq!(result.unwrap(), "ok");
        assert_eq!(calls, 3);
    }

    #[test]
    fn with_retry_promotes_to_permanent_after_exhaustion() {
        let result: Result<(), EmbeddingError> =
            with_retry(2, |_| Err(EmbeddingError::Transient("still down".into())));
        assert!(matches!(result, Err(EmbeddingError::Permanent(_))));
    }

    #[test]
    fn with_retry_does_not_retry_permanent_failures() {
        let mut calls = 0;
        let result: Result<(), EmbeddingError> = with_retry(5, |_| {
            calls += 1;
            Err(EmbeddingError::Permanent("bad auth".into()))
        });
        assert!(result.is_err());
        assert_eq!(calls, 1);
    }

    #[test]
    fn caching_provider_only_calls_inner_on_miss() {
        let inner = SimulatedEmbeddingProvider::new(8);
        let cache = InMemoryEmbeddingCache::new();
        let provider = CachingProvider::new(inner, cache);

        let first = provider.embed_batch(&["a".to_string(), "b".to_string()]).unwrap();
        assert_eq!(provider.cache_misses(), 2);
        assert_eq!(provider.cache_hits(), 0);

        let second = provider.embed_batch(&["a".to_string(), "b".to_string()]).unwrap();
        assert_eq!(second, first);
        assert_eq!(provider.cache_hits(), 2);
    }

    #[test]
    fn chunked_respects_batch_max() {
        let texts: Vec<String> = (0..250).map(|i| i.to_string()).collect();
        let chunks: Vec<_> = chunked(&texts, 100).collect();
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].len(), 100);
        assert_eq!(chunks[2].len(), 50);
    }
}
