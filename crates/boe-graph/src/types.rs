//! Wire types exchanged across the [`crate::GraphAdapter`] facade.

use serde_json::Value;

/// A node, keyed by its `id` property. `labels` generalizes the Save
/// workers' node-type tags (`"artículo"`, `"Normativa"`, `"Materia"`, ...);
/// `properties` holds everything else, including `text`, `path`, and
/// (for articles) `embedding`.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeRecord {
    pub id: String,
    pub labels: Vec<String>,
    pub properties: Value,
}

impl NodeRecord {
    #[must_use]
    pub fn new(id: impl Into<String>, labels: Vec<String>, properties: Value) -> Self {
        Self { id: id.into(), labels, properties }
    }

    #[must_use]
    pub fn property(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    #[must_use]
    pub fn text(&self) -> Option<&str> {
        self.property("text").and_then(Value::as_str)
    }
}

/// A directed, typed edge between two node ids.
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeRecord {
    pub from_id: String,
    pub to_id: String,
    pub rel_type: String,
    pub properties: Value,
}

impl EdgeRecord {
    #[must_use]
    pub fn new(from_id: impl Into<String>, to_id: impl Into<String>, rel_type: impl Into<String>, properties: Value) -> Self {
        Self { from_id: from_id.into(), to_id: to_id.into(), rel_type: rel_type.into(), properties }
    }
}

/// A node returned from a similarity or keyword search, ranked by `score`
/// (higher is more relevant; cosine similarity for vector search).
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredArticle {
    pub node: NodeRecord,
    pub score: f64,
}

/// Similarity metric for a vector index. Cosine is the only metric the
/// pipeline itself requests (see `SPEC_FULL.md` §6), but the facade does
/// not hard-code that choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VectorSimilarity {
    Cosine,
    Euclidean,
    DotProduct,
}

impl VectorSimilarity {
    #[must_use]
    pub const fn duckdb_metric(self) -> &'static str {
        match self {
            Self::Cosine => "cosine",
            Self::Euclidean => "l2sq",
            Self::DotProduct => "ip",
        }
    }
}
