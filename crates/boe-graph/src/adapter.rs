//! The narrow facade the rest of the pipeline depends on instead of any
//! specific storage engine.

use serde_json::Value;

use crate::error::GraphError;
use crate::types::{EdgeRecord, NodeRecord, ScoredArticle, VectorSimilarity};

/// Read and write operations over the document/content graph. Every write
/// is a merge: idempotent by the `id` property, safe to call twice.
pub trait GraphAdapter: Send + Sync {
    // --- writes (core to ingestion) ---

    fn merge_node(&self, labels: &[String], properties: Value) -> Result<(), GraphError>;

    fn merge_relationship(
        &self,
        from: &str,
        to: &str,
        rel_type: &str,
        properties: Option<Value>,
    ) -> Result<(), GraphError>;

    fn batch_merge_nodes(&self, nodes: &[NodeRecord]) -> Result<(), GraphError>;

    fn batch_merge_relationships(&self, edges: &[EdgeRecord]) -> Result<(), GraphError>;

    fn ensure_constraints(&self) -> Result<(), GraphError>;

    fn create_vector_index(
        &self,
        name: &str,
        label: &str,
        property: &str,
        dimensions: usize,
        similarity: VectorSimilarity,
    ) -> Result<(), GraphError>;

    fn drop_vector_index(&self, name: &str) -> Result<(), GraphError>;

    // --- reads (downstream callers, plus the Linker/CLI) ---

    fn get_article_by_id(&self, id: &str) -> Result<Option<NodeRecord>, GraphError>;

    /// `window` ancestors and siblings around the article, for rendering a
    /// reading context.
    fn get_article_with_context(&self, id: &str, window: usize) -> Result<Vec<NodeRecord>, GraphError>;

    fn get_article_versions(&self, id: &str) -> Result<Vec<NodeRecord>, GraphError>;

    fn get_all_next_versions(&self, id: &str) -> Result<Vec<NodeRecord>, GraphError>;

    fn get_previous_version(&self, id: &str) -> Result<Option<NodeRecord>, GraphError>;

    fn get_latest_version(&self, id: &str) -> Result<Option<NodeRecord>, GraphError>;

    fn vector_search(&self, index: &str, query: &[f32], k: usize) -> Result<Vec<ScoredArticle>, GraphError>;

    fn keyword_search(&self, text: &str, k: usize) -> Result<Vec<ScoredArticle>, GraphError>;

    fn get_referred_articles(&self, id: &str) -> Result<Vec<NodeRecord>, GraphError>;

    fn get_article_rich_text(&self, id: &str) -> Result<Option<String>, GraphError>;

    fn get_version_text(&self, id: &str) -> Result<Option<String>, GraphError>;

    fn get_articles_by_structure(&self, path_pattern: &str) -> Result<Vec<NodeRecord>, GraphError>;

    fn get_articles_by_subject(&self, materia_code: &str) -> Result<Vec<NodeRecord>, GraphError>;

    // --- escape hatch ---

    fn run_query(&self, query: &str, params: &[Value]) -> Result<Vec<Value>, GraphError>;

    fn run_query_single(&self, query: &str, params: &[Value]) -> Result<Option<Value>, GraphError> {
        Ok(self.run_query(query, params)?.into_iter().next())
    }

    fn run_write(&self, query: &str, params: &[Value]) -> Result<(), GraphError>;
}
