//! Content-addressed embedding cache (C1): `text_hash -> vector`, persisted
//! as a packed float32 blob.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use duckdb::Connection;
use duckdb::params;
use tracing::warn;

use crate::error::EmbeddingError;

/// `get`/`set`/`flush` over a content-addressed embedding store.
///
/// Misses are not errors. I/O failures on `get` are reported as a miss
/// (logged); I/O failures on `set` are logged but never propagated — the
/// pipeline keeps making progress even if caching degrades. Only `flush`
/// failures are surfaced to the caller.
pub trait EmbeddingCache: Send + Sync {
    fn get(&self, key: &str) -> Option<Vec<f32>>;
    fn set(&self, key: &str, vector: &[f32]);
    fn flush(&self) -> Result<(), EmbeddingError>;
}

/// Pack a float32 vector as little-endian bytes (4 × dim bytes), ~75%
/// smaller than a textual encoding.
#[must_use]
pub fn pack(vector: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vector.len() * 4);
    for f in vector {
        bytes.extend_from_slice(&f.to_le_bytes());
    }
    bytes
}

/// Inverse of [`pack`].
#[must_use]
pub fn unpack(bytes: &[u8]) -> Vec<f32> {
    bytes.chunks_exact(4).map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]])).collect()
}

const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS embedding_cache (
    key TEXT PRIMARY KEY,
    embedding BLOB NOT NULL,
    created_at TEXT NOT NULL
);
";

/// `DuckDB`-backed, file-persisted embedding cache shared by every Embed
/// worker. A single mutex serializes writes; reads and writes both go
/// through the same connection, matching the "single mutex around `flush`"
/// policy in the concurrency model.
pub struct DuckDbEmbeddingCache {
    conn: Mutex<Connection>,
}

impl DuckDbEmbeddingCache {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, EmbeddingError> {
        let conn = Connection::open(path).map_err(|e| EmbeddingError::InitFailed(e.to_string()))?;
        conn.execute_batch(SCHEMA_SQL).map_err(|e| EmbeddingError::InitFailed(e.to_string()))?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    #[must_use]
    pub fn open_in_memory() -> Self {
        let conn = Connection::open_in_memory().expect("in-memory duckdb connection");
        conn.execute_batch(SCHEMA_SQL).expect("embedding_cache schema");
        Self { conn: Mutex::new(conn) }
    }
}

impl EmbeddingCache for DuckDbEmbeddingCache {
    fn get(&self, key: &str) -> Option<Vec<f32>> {
        let conn = self.conn.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let result: Result<Vec<u8>, duckdb::Error> =
            conn.query_row("SELECT embedding FROM embedding_cache WHERE key = ?", params![key], |row| row.get(0));
        match result {
            Ok(bytes) => Some(unpack(&bytes)),
            Err(duckdb::Error::QueryReturnedNoRows) => None,
            Err(e) => {
                warn!(error = %e, key, "embedding cache get failed, treating as miss");
                None
            }
        }
    }

    fn set(&self, key: &str, vector: &[f32]) {
        let conn = self.conn.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let blob = pack(vector);
        if let Err(e) = conn.execute(
            "INSERT INTO embedding_cache (key, embedding, created_at) VALUES (?, ?, strftime('%Y-%m-%dT%H:%M:%S', 'now'))
             ON CONFLICT (key) DO NOTHING",
            params![key, blob],
        ) {
            warn!(error = %e, key, "embedding cache set failed, continuing without caching this entry");
        }
    }

    fn flush(&self) -> Result<(), EmbeddingError> {
        let conn = self.conn.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        conn.execute_batch("CHECKPOINT").map_err(|e| EmbeddingError::CacheIo(e.to_string()))
    }
}

/// In-memory embedding cache used by tests and the simulation/benchmark
/// paths.
#[derive(Default)]
pub struct InMemoryEmbeddingCache {
    entries: Mutex<HashMap<String, Vec<f32>>>,
}

impl InMemoryEmbeddingCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(std::sync::PoisonError::into_inner).len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl EmbeddingCache for InMemoryEmbeddingCache {
    fn get(&self, key: &str) -> Option<Vec<f32>> {
        self.entries.lock().unwrap_or_else(std::sync::PoisonError::into_inner).get(key).cloned()
    }

    fn set(&self, key: &str, vector: &[f32]) {
        self.entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .entry(key.to_string())
            .or_insert_with(|| vector.to_vec());
    }

    fn flush(&self) -> Result<(), EmbeddingError> {
        Ok(())
    }
}
