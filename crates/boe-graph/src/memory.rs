//! In-memory [`GraphAdapter`] backing tests and the simulation/benchmark
//! paths. Mirrors the `DuckDB` adapter's semantics without touching disk.

use std::collections::HashMap;
use std::sync::Mutex;

use serde_json::Value;

use crate::GraphAdapter;
use crate::error::GraphError;
use crate::types::{EdgeRecord, NodeRecord, ScoredArticle, VectorSimilarity};

#[derive(Default)]
struct State {
    nodes: HashMap<String, NodeRecord>,
    edges: Vec<EdgeRecord>,
    embeddings: HashMap<String, Vec<f32>>,
    vector_indexes: HashMap<String, bool>,
}

#[derive(Default)]
pub struct InMemoryGraphAdapter {
    state: Mutex<State>,
}

impl InMemoryGraphAdapter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn put_node(state: &mut State, node: NodeRecord) {
        if let Some(Value::Array(values)) = node.properties.get("embedding") {
            let vector: Vec<f32> = values.iter().filter_map(Value::as_f64).map(|f| f as f32).collect();
            if !vector.is_empty() {
                state.embeddings.insert(node.id.clone(), vector);
            }
        }
        state.nodes.insert(node.id.clone(), node);
    }

    fn put_edge(state: &mut State, edge: EdgeRecord) {
        if let Some(existing) = state
            .edges
            .iter_mut()
            .find(|e| e.from_id == edge.from_id && e.to_id == edge.to_id && e.rel_type == edge.rel_type)
        {
            existing.properties = edge.properties;
        } else {
            state.edges.push(edge);
        }
    }

    fn related(state: &State, id: &str, rel_type: &str, outgoing: bool) -> Vec<NodeRecord> {
        state
            .edges
            .iter()
            .filter(|e| e.rel_type == rel_type && if outgoing { e.from_id == id } else { e.to_id == id })
            .filter_map(|e| state.nodes.get(if outgoing { &e.to_id } else { &e.from_id }).cloned())
            .collect()
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 { 0.0 } else { f64::from(dot / (norm_a * norm_b)) }
}

impl GraphAdapter for InMemoryGraphAdapter {
    fn merge_node(&self, labels: &[String], properties: Value) -> Result<(), GraphError> {
        let id = properties
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| GraphError::Other(anyhow::anyhow!("merge_node: properties missing \"id\"")))?
            .to_string();
        Self::put_node(&mut self.lock(), NodeRecord::new(id, labels.to_vec(), properties));
        Ok(())
    }

    fn merge_relationship(&self, from: &str, to: &str, rel_type: &str, properties: Option<Value>) -> Result<(), GraphError> {
        Self::put_edge(&mut self.lock(), EdgeRecord::new(from, to, rel_type, properties.unwrap_or(Value::Object(serde_json::Map::new()))));
        Ok(())
    }

    fn batch_merge_nodes(&self, nodes: &[NodeRecord]) -> Result<(), GraphError> {
        let mut state = self.lock();
        for node in nodes {
            Self::put_node(&mut state, node.clone());
        }
        Ok(())
    }

    fn batch_merge_relationships(&self, edges: &[EdgeRecord]) -> Result<(), GraphError> {
        let mut state = self.lock();
        for edge in edges {
            Self::put_edge(&mut state, edge.clone());
        }
        Ok(())
    }

    fn ensure_constraints(&self) -> Result<(), GraphError> {
        Ok(())
    }

    fn create_vector_index(&self, name: &str, _label: &str, _property: &str, _dimensions: usize, _similarity: VectorSimilarity) -> Result<(), GraphError> {
        self.lock().vector_indexes.insert(name.to_string(), true);
        Ok(())
    }

    fn drop_vector_index(&self, name: &str) -> Result<(), GraphError> {
        self.lock().vector_indexes.insert(name.to_string(), false);
        Ok(())
    }

    fn get_article_by_id(&self, id: &str) -> Result<Option<NodeRecord>, GraphError> {
        Ok(self.lock().nodes.get(id).cloned())
    }

    fn get_article_with_context(&self, id: &str, window: usize) -> Result<Vec<NodeRecord>, GraphError> {
        let state = self.lock();
        let Some(article) = state.nodes.get(id).cloned() else { return Ok(Vec::new()) };
        let mut out = vec![article];
        let mut cursor = id.to_string();
        for _ in 0..window {
            let Some(parent) = Self::related(&state, &cursor, "PART_OF", true).into_iter().next() else { break };
            cursor = parent.id.clone();
            out.push(parent);
        }
        Ok(out)
    }

    fn get_article_versions(&self, id: &str) -> Result<Vec<NodeRecord>, GraphError> {
        let state = self.lock();
        let mut chain = Vec::new();
        let mut cursor = id.to_string();
        while let Some(prev) = Self::related(&state, &cursor, "PREVIOUS_VERSION", true).into_iter().next() {
            cursor = prev.id.clone();
            chain.push(prev);
        }
        chain.reverse();
        if let Some(current) = state.nodes.get(id).cloned() {
            chain.push(current);
        }
        let mut cursor = id.to_string();
        while let Some(next) = Self::related(&state, &cursor, "NEXT_VERSION", true).into_iter().next() {
            cursor = next.id.clone();
            chain.push(next);
        }
        Ok(chain)
    }

    fn get_all_next_versions(&self, id: &str) -> Result<Vec<NodeRecord>, GraphError> {
        let state = self.lock();
        let mut out = Vec::new();
        let mut cursor = id.to_string();
        while let Some(next) = Self::related(&state, &cursor, "NEXT_VERSION", true).into_iter().next() {
            cursor = next.id.clone();
            out.push(next);
        }
        Ok(out)
    }

    fn get_previous_version(&self, id: &str) -> Result<Option<NodeRecord>, GraphError> {
        Ok(Self::related(&self.lock(), id, "PREVIOUS_VERSION", true).into_iter().next())
    }

    fn get_latest_version(&self, id: &str) -> Result<Option<NodeRecord>, GraphError> {
        let next_versions = self.get_all_next_versions(id)?;
        Ok(next_versions.into_iter().last().or(self.get_article_by_id(id)?))
    }

    fn vector_search(&self, _index: &str, query: &[f32], k: usize) -> Result<Vec<ScoredArticle>, GraphError> {
        let state = self.lock();
        let mut results: Vec<ScoredArticle> = state
            .embeddings
            .iter()
            .filter_map(|(id, vector)| {
                state.nodes.get(id).map(|node| ScoredArticle { node: node.clone(), score: cosine_similarity(query, vector) })
            })
            .collect();
        results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        results.truncate(k);
        Ok(results)
    }

    fn keyword_search(&self, text: &str, k: usize) -> Result<Vec<ScoredArticle>, GraphError> {
        let needle = text.to_lowercase();
        let state = self.lock();
        let mut results: Vec<ScoredArticle> = state
            .nodes
            .values()
            .filter_map(|node| {
                let occurrences = node.text()?.to_lowercase().matches(&needle).count();
                (occurrences > 0).then(|| ScoredArticle { node: node.clone(), score: occurrences as f64 })
            })
            .collect();
        results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        results.truncate(k);
        Ok(results)
    }

    fn get_referred_articles(&self, id: &str) -> Result<Vec<NodeRecord>, GraphError> {
        Ok(Self::related(&self.lock(), id, "REFERS_TO", true))
    }

    fn get_article_rich_text(&self, id: &str) -> Result<Option<String>, GraphError> {
        Ok(self.lock().nodes.get(id).and_then(|n| {
            n.property("full_text").and_then(Value::as_str).map(str::to_string).or_else(|| n.text().map(str::to_string))
        }))
    }

    fn get_version_text(&self, id: &str) -> Result<Option<String>, GraphError> {
        self.get_article_rich_text(id)
    }

    fn get_articles_by_structure(&self, path_pattern: &str) -> Result<Vec<NodeRecord>, GraphError> {
        let pattern = path_pattern.replace('%', "");
        Ok(self
            .lock()
            .nodes
            .values()
            .filter(|n| n.property("path").and_then(Value::as_str).is_some_and(|p| p.contains(&pattern)))
            .cloned()
            .collect())
    }

    fn get_articles_by_subject(&self, materia_code: &str) -> Result<Vec<NodeRecord>, GraphError> {
        Ok(Self::related(&self.lock(), materia_code, "HAS_SUBJECT", false))
    }

    fn run_query(&self, _query: &str, _params: &[Value]) -> Result<Vec<Value>, GraphError> {
        Err(GraphError::NotInitialized("run_query is not supported by the in-memory adapter; use DuckDbGraphAdapter".into()))
    }

    fn run_write(&self, _query: &str, _params: &[Value]) -> Result<(), GraphError> {
        Err(GraphError::NotInitialized("run_write is not supported by the in-memory adapter; use DuckDbGraphAdapter".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn merge_node_is_idempotent() {
        let graph = InMemoryGraphAdapter::new();
        graph.merge_node(&["artículo".into()], json!({"id": "a1"})).unwrap();
        graph.merge_node(&["artículo".into()], json!({"id": "a1", "text": "updated"})).unwrap();
        assert_eq!(graph.lock().nodes.len(), 1);
        assert_eq!(graph.get_article_by_id("a1").unwrap().unwrap().text(), Some("updated"));
    }

    #[test]
    fn vector_search_orders_by_similarity() {
        let graph = InMemoryGraphAdapter::new();
        graph.merge_node(&["artículo".into()], json!({"id": "a1", "embedding": [1.0, 0.0]})).unwrap();
        graph.merge_node(&["artículo".into()], json!({"id": "a2", "embedding": [0.0, 1.0]})).unwrap();
        let results = graph.vector_search("idx", &[1.0, 0.0], 1).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].node.id, "a1");
    }

    #[test]
    fn referred_articles_follow_refers_to_edges() {
        let graph = InMemoryGraphAdapter::new();
        graph.merge_node(&["artículo".into()], json!({"id": "a1"})).unwrap();
        graph.merge_node(&["artículo".into()], json!({"id": "a2"})).unwrap();
        graph.merge_relationship("a1", "a2", "REFERS_TO", None).unwrap();
        let referred = graph.get_referred_articles("a1").unwrap();
        assert_eq!(referred.len(), 1);
        assert_eq!(referred[0].id, "a2");
    }
}
