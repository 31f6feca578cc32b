//! `DuckDB`-backed [`GraphAdapter`]: nodes and edges as typed tables, plus a
//! dedicated `article_embeddings` table for the vector index.
//!
//! Vector search is brute-force cosine over the packed embedding column
//! rather than an HNSW extension index: HNSW persistence across DuckDB
//! sessions is experimental and the indexed dimension is a runtime
//! parameter here, not a fixed schema width. A full table scan is
//! acceptable at the corpus sizes this pipeline targets (well under the
//! 100K-row threshold where brute force remains competitive with an index).

use std::path::Path;
use std::sync::Mutex;

use duckdb::{Connection, params};
use serde_json::Value;
use tracing::warn;

use crate::error::GraphError;
use crate::types::{EdgeRecord, NodeRecord, ScoredArticle, VectorSimilarity};
use crate::GraphAdapter;

const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS nodes (
    id TEXT PRIMARY KEY,
    labels TEXT NOT NULL,
    props_json TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS edges (
    from_id TEXT NOT NULL,
    to_id TEXT NOT NULL,
    rel_type TEXT NOT NULL,
    props_json TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_edges_from ON edges (from_id, rel_type);
CREATE INDEX IF NOT EXISTS idx_edges_to ON edges (to_id, rel_type);
CREATE TABLE IF NOT EXISTS article_embeddings (
    id TEXT PRIMARY KEY,
    embedding BLOB NOT NULL
);
CREATE TABLE IF NOT EXISTS vector_indexes (
    name TEXT PRIMARY KEY,
    label TEXT NOT NULL,
    property TEXT NOT NULL,
    dimensions BIGINT NOT NULL,
    similarity TEXT NOT NULL,
    dropped BOOLEAN NOT NULL DEFAULT FALSE
);
";

fn pack(vector: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vector.len() * 4);
    for f in vector {
        bytes.extend_from_slice(&f.to_le_bytes());
    }
    bytes
}

fn unpack(bytes: &[u8]) -> Vec<f32> {
    bytes.chunks_exact(4).map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]])).collect()
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 { 0.0 } else { f64::from(dot / (norm_a * norm_b)) }
}

fn json_to_param(v: &Value) -> duckdb::types::Value {
    match v {
        Value::Null => duckdb::types::Value::Null,
        Value::Bool(b) => duckdb::types::Value::Boolean(*b),
        Value::Number(n) => n
            .as_i64()
            .map(duckdb::types::Value::BigInt)
            .or_else(|| n.as_f64().map(duckdb::types::Value::Double))
            .unwrap_or(duckdb::types::Value::Null),
        Value::String(s) => duckdb::types::Value::Text(s.clone()),
        other => duckdb::types::Value::Text(other.to_string()),
    }
}

fn duckdb_value_to_json(v: duckdb::types::Value) -> Value {
    match v {
        duckdb::types::Value::Null => Value::Null,
        duckdb::types::Value::Boolean(b) => Value::Bool(b),
        duckdb::types::Value::TinyInt(i) => Value::from(i),
        duckdb::types::Value::SmallInt(i) => Value::from(i),
        duckdb::types::Value::Int(i) => Value::from(i),
        duckdb::types::Value::BigInt(i) => Value::from(i),
        duckdb::types::Value::Float(f) => Value::from(f),
        duckdb::types::Value::Double(f) => Value::from(f),
        duckdb::types::Value::Text(s) => Value::String(s),
        other => Value::String(format!("{other:?}")),
    }
}

pub struct DuckDbGraphAdapter {
    conn: Mutex<Connection>,
}

impl DuckDbGraphAdapter {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, GraphError> {
        let conn = Connection::open(path)?;
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    #[must_use]
    pub fn open_in_memory() -> Self {
        let conn = Connection::open_in_memory().expect("in-memory duckdb connection");
        conn.execute_batch(SCHEMA_SQL).expect("graph schema");
        Self { conn: Mutex::new(conn) }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn upsert_node(conn: &Connection, node: &NodeRecord) -> Result<(), GraphError> {
        let labels = node.labels.join(",");
        let props = serde_json::to_string(&node.properties)?;
        conn.execute(
            "INSERT INTO nodes (id, labels, props_json) VALUES (?, ?, ?)
             ON CONFLICT (id) DO UPDATE SET labels = excluded.labels, props_json = excluded.props_json",
            params![node.id, labels, props],
        )?;
        if let Some(Value::Array(values)) = node.properties.get("embedding") {
            let vector: Vec<f32> = values.iter().filter_map(Value::as_f64).map(|f| f as f32).collect();
            if !vector.is_empty() {
                conn.execute(
                    "INSERT INTO article_embeddings (id, embedding) VALUES (?, ?)
                     ON CONFLICT (id) DO UPDATE SET embedding = excluded.embedding",
                    params![node.id, pack(&vector)],
                )?;
            }
        }
        Ok(())
    }

    fn upsert_edge(conn: &Connection, edge: &EdgeRecord) -> Result<(), GraphError> {
        let exists: bool = conn
            .query_row(
                "SELECT 1 FROM edges WHERE from_id = ? AND to_id = ? AND rel_type = ?",
                params![edge.from_id, edge.to_id, edge.rel_type],
                |_| Ok(true),
            )
            .unwrap_or(false);
        if exists {
            let props = serde_json::to_string(&edge.properties)?;
            conn.execute(
                "UPDATE edges SET props_json = ? WHERE from_id = ? AND to_id = ? AND rel_type = ?",
                params![props, edge.from_id, edge.to_id, edge.rel_type],
            )?;
        } else {
            let props = serde_json::to_string(&edge.properties)?;
            conn.execute(
                "INSERT INTO edges (from_id, to_id, rel_type, props_json) VALUES (?, ?, ?, ?)",
                params![edge.from_id, edge.to_id, edge.rel_type, props],
            )?;
        }
        Ok(())
    }

    fn row_to_node(id: String, labels: String, props_json: String) -> Result<NodeRecord, GraphError> {
        let properties: Value = serde_json::from_str(&props_json)?;
        Ok(NodeRecord::new(id, labels.split(',').map(str::to_string).collect(), properties))
    }

    fn fetch_node(&self, id: &str) -> Result<Option<NodeRecord>, GraphError> {
        let conn = self.lock();
        let row: Option<(String, String, String)> = conn
            .query_row("SELECT id, labels, props_json FROM nodes WHERE id = ?", params![id], |r| {
                Ok((r.get(0)?, r.get(1)?, r.get(2)?))
            })
            .ok();
        row.map(|(id, labels, props)| Self::row_to_node(id, labels, props)).transpose()
    }

    fn related(&self, id: &str, rel_type: &str, outgoing: bool) -> Result<Vec<NodeRecord>, GraphError> {
        let conn = self.lock();
        let sql = if outgoing {
            "SELECT n.id, n.labels, n.props_json FROM edges e JOIN nodes n ON n.id = e.to_id
             WHERE e.from_id = ? AND e.rel_type = ?"
        } else {
            "SELECT n.id, n.labels, n.props_json FROM edges e JOIN nodes n ON n.id = e.from_id
             WHERE e.to_id = ? AND e.rel_type = ?"
        };
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt
            .query_map(params![id, rel_type], |r| Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?, r.get::<_, String>(2)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(|(id, labels, props)| Self::row_to_node(id, labels, props)).collect()
    }
}

impl GraphAdapter for DuckDbGraphAdapter {
    fn merge_node(&self, labels: &[String], properties: Value) -> Result<(), GraphError> {
        let id = properties
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| GraphError::Other(anyhow::anyhow!("merge_node: properties missing \"id\"")))?
            .to_string();
        let node = NodeRecord::new(id, labels.to_vec(), properties);
        Self::upsert_node(&self.lock(), &node)
    }

    fn merge_relationship(&self, from: &str, to: &str, rel_type: &str, properties: Option<Value>) -> Result<(), GraphError> {
        let edge = EdgeRecord::new(from, to, rel_type, properties.unwrap_or(Value::Object(serde_json::Map::new())));
        Self::upsert_edge(&self.lock(), &edge)
    }

    fn batch_merge_nodes(&self, nodes: &[NodeRecord]) -> Result<(), GraphError> {
        let conn = self.lock();
        conn.execute_batch("BEGIN TRANSACTION")?;
        for node in nodes {
            if let Err(e) = Self::upsert_node(&conn, node) {
                conn.execute_batch("ROLLBACK")?;
                return Err(e);
            }
        }
        conn.execute_batch("COMMIT")?;
        Ok(())
    }

    fn batch_merge_relationships(&self, edges: &[EdgeRecord]) -> Result<(), GraphError> {
        let conn = self.lock();
        conn.execute_batch("BEGIN TRANSACTION")?;
        for edge in edges {
            if let Err(e) = Self::upsert_edge(&conn, edge) {
                conn.execute_batch("ROLLBACK")?;
                return Err(e);
            }
        }
        conn.execute_batch("COMMIT")?;
        Ok(())
    }

    fn ensure_constraints(&self) -> Result<(), GraphError> {
        self.lock().execute_batch(SCHEMA_SQL)?;
        Ok(())
    }

    fn create_vector_index(&self, name: &str, label: &str, property: &str, dimensions: usize, similarity: VectorSimilarity) -> Result<(), GraphError> {
        self.lock().execute(
            "INSERT INTO vector_indexes (name, label, property, dimensions, similarity, dropped) VALUES (?, ?, ?, ?, ?, FALSE)
             ON CONFLICT (name) DO UPDATE SET label = excluded.label, property = excluded.property,
                 dimensions = excluded.dimensions, similarity = excluded.similarity, dropped = FALSE",
            params![name, label, property, i64::try_from(dimensions).unwrap_or(i64::MAX), similarity.duckdb_metric()],
        )?;
        Ok(())
    }

    fn drop_vector_index(&self, name: &str) -> Result<(), GraphError> {
        let affected = self.lock().execute("UPDATE vector_indexes SET dropped = TRUE WHERE name = ?", params![name])?;
        if affected == 0 {
            warn!(name, "drop_vector_index called for an index that was never created");
        }
        Ok(())
    }

    fn get_article_by_id(&self, id: &str) -> Result<Option<NodeRecord>, GraphError> {
        self.fetch_node(id)
    }

    fn get_article_with_context(&self, id: &str, window: usize) -> Result<Vec<NodeRecord>, GraphError> {
        let Some(article) = self.fetch_node(id)? else { return Ok(Vec::new()) };
        let mut out = vec![article];
        let mut cursor = id.to_string();
        for _ in 0..window {
            let parents = self.related(&cursor, "PART_OF", true)?;
            let Some(parent) = parents.into_iter().next() else { break };
            cursor = parent.id.clone();
            out.push(parent);
        }
        Ok(out)
    }

    fn get_article_versions(&self, id: &str) -> Result<Vec<NodeRecord>, GraphError> {
        let mut chain = Vec::new();
        let mut cursor = id.to_string();
        while let Some(prev) = self.related(&cursor, "PREVIOUS_VERSION", true)?.into_iter().next() {
            cursor = prev.id.clone();
            chain.push(prev);
        }
        chain.reverse();
        if let Some(current) = self.fetch_node(id)? {
            chain.push(current);
        }
        let mut cursor = id.to_string();
        while let Some(next) = self.related(&cursor, "NEXT_VERSION", true)?.into_iter().next() {
            cursor = next.id.clone();
            chain.push(next);
        }
        Ok(chain)
    }

    fn get_all_next_versions(&self, id: &str) -> Result<Vec<NodeRecord>, GraphError> {
        let mut out = Vec::new();
        let mut cursor = id.to_string();
        while let Some(next) = self.related(&cursor, "NEXT_VERSION", true)?.into_iter().next() {
            cursor = next.id.clone();
            out.push(next);
        }
        Ok(out)
    }

    fn get_previous_version(&self, id: &str) -> Result<Option<NodeRecord>, GraphError> {
        Ok(self.related(id, "PREVIOUS_VERSION", true)?.into_iter().next())
    }

    fn get_latest_version(&self, id: &str) -> Result<Option<NodeRecord>, GraphError> {
        let next_versions = self.get_all_next_versions(id)?;
        Ok(next_versions.into_iter().last().or(self.fetch_node(id)?))
    }

    fn vector_search(&self, _index: &str, query: &[f32], k: usize) -> Result<Vec<ScoredArticle>, GraphError> {
        let conn = self.lock();
        let mut stmt = conn.prepare("SELECT id, embedding FROM article_embeddings")?;
        let mut scored: Vec<(String, Vec<u8>)> = stmt
            .query_map([], |r| Ok((r.get::<_, String>(0)?, r.get::<_, Vec<u8>>(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        drop(stmt);
        let mut results: Vec<ScoredArticle> = Vec::with_capacity(scored.len());
        for (id, blob) in scored.drain(..) {
            let Some(node) = Self::row_to_node_from_conn(&conn, &id)? else { continue };
            let score = cosine_similarity(query, &unpack(&blob));
            results.push(ScoredArticle { node, score });
        }
        results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        results.truncate(k);
        Ok(results)
    }

    fn keyword_search(&self, text: &str, k: usize) -> Result<Vec<ScoredArticle>, GraphError> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT id, labels, props_json FROM nodes WHERE props_json ILIKE ? ORDER BY id LIMIT ?",
        )?;
        let pattern = format!("%{text}%");
        let rows = stmt
            .query_map(params![pattern, i64::try_from(k).unwrap_or(i64::MAX)], |r| {
                Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?, r.get::<_, String>(2)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter()
            .map(|(id, labels, props)| {
                let node = Self::row_to_node(id, labels, props)?;
                let occurrences = node.text().map_or(0, |t| t.to_lowercase().matches(&text.to_lowercase()).count());
                Ok(ScoredArticle { node, score: occurrences as f64 })
            })
            .collect()
    }

    fn get_referred_articles(&self, id: &str) -> Result<Vec<NodeRecord>, GraphError> {
        self.related(id, "REFERS_TO", true)
    }

    fn get_article_rich_text(&self, id: &str) -> Result<Option<String>, GraphError> {
        Ok(self.fetch_node(id)?.and_then(|n| {
            n.property("full_text").and_then(Value::as_str).map(str::to_string).or_else(|| n.text().map(str::to_string))
        }))
    }

    fn get_version_text(&self, id: &str) -> Result<Option<String>, GraphError> {
        self.get_article_rich_text(id)
    }

    fn get_articles_by_structure(&self, path_pattern: &str) -> Result<Vec<NodeRecord>, GraphError> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT id, labels, props_json FROM nodes WHERE json_extract_string(props_json, '$.path') LIKE ?",
        )?;
        let rows = stmt
            .query_map(params![path_pattern], |r| Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?, r.get::<_, String>(2)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(|(id, labels, props)| Self::row_to_node(id, labels, props)).collect()
    }

    fn get_articles_by_subject(&self, materia_code: &str) -> Result<Vec<NodeRecord>, GraphError> {
        self.related(materia_code, "HAS_SUBJECT", false)
    }

    fn run_query(&self, query: &str, params: &[Value]) -> Result<Vec<Value>, GraphError> {
        let conn = self.lock();
        let mut stmt = conn.prepare(query)?;
        let duck_params: Vec<duckdb::types::Value> = params.iter().map(json_to_param).collect();
        let column_names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let rows = stmt.query_map(duckdb::params_from_iter(duck_params), |row| {
            let mut object = serde_json::Map::new();
            for (i, name) in column_names.iter().enumerate() {
                let value: duckdb::types::Value = row.get(i)?;
                object.insert(name.clone(), duckdb_value_to_json(value));
            }
            Ok(Value::Object(object))
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(GraphError::from)
    }

    fn run_write(&self, query: &str, params: &[Value]) -> Result<(), GraphError> {
        let conn = self.lock();
        let duck_params: Vec<duckdb::types::Value> = params.iter().map(json_to_param).collect();
        conn.execute(query, duckdb::params_from_iter(duck_params))?;
        Ok(())
    }
}

impl DuckDbGraphAdapter {
    fn row_to_node_from_conn(conn: &Connection, id: &str) -> Result<Option<NodeRecord>, GraphError> {
        let row: Option<(String, String, String)> = conn
            .query_row("SELECT id, labels, props_json FROM nodes WHERE id = ?", params![id], |r| {
                Ok((r.get(0)?, r.get(1)?, r.get(2)?))
            })
            .ok();
        row.map(|(id, labels, props)| Self::row_to_node(id, labels, props)).transpose()
    }
}
