//! Bulk Reference Linker (C7): after every document is saved, resolve
//! citation markers left by the parser into `REFERS_TO` edges in a single
//! batched pass rather than one round-trip per reference.

use boe_core::IngestError;
use boe_graph::{EdgeRecord, GraphAdapter};
use serde_json::json;
use tracing::warn;

/// An unresolved citation carried through from the Save stage, ready for
/// bulk resolution.
#[derive(Debug, Clone)]
pub struct PendingLink {
    pub source_article_id: String,
    pub raw_text: String,
    pub target_doc_id: Option<String>,
    pub target_article_id: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkStats {
    pub resolved: u64,
    pub unresolved: u64,
}

/// Resolve `pending` into `REFERS_TO` edges in batches of `batch_size`
/// (default 5 000 per SPEC_FULL.md §4.7). A reference that resolves to
/// neither a specific article nor its target document is logged and
/// skipped, never fatal.
pub fn link(graph: &dyn GraphAdapter, pending: &[PendingLink], batch_size: usize) -> Result<LinkStats, IngestError> {
    let mut stats = LinkStats::default();

    for batch in pending.chunks(batch_size.max(1)) {
        let mut edges = Vec::new();
        for reference in batch {
            if let Some(target) = resolve(graph, reference)? {
                edges.push(EdgeRecord::new(
                    reference.source_article_id.clone(),
                    target.id,
                    "REFERS_TO",
                    json!({"raw_text": reference.raw_text, "confidence": target.confidence}),
                ));
                stats.resolved += 1;
            } else {
                stats.unresolved += 1;
                warn!(
                    source = %reference.source_article_id,
                    raw_text = %reference.raw_text,
                    "unresolved reference"
                );
            }
        }
        if !edges.is_empty() {
            graph.batch_merge_relationships(&edges).map_err(|e| IngestError::GraphWriteFailure(e.to_string()))?;
        }
    }

    Ok(stats)
}

struct ResolvedTarget {
    id: String,
    confidence: &'static str,
}

fn resolve(graph: &dyn GraphAdapter, reference: &PendingLink) -> Result<Option<ResolvedTarget>, IngestError> {
    if let Some(article_id) = &reference.target_article_id {
        if graph.get_article_by_id(article_id).map_err(|e| IngestError::GraphWriteFailure(e.to_string()))?.is_some() {
            return Ok(Some(ResolvedTarget { id: article_id.clone(), confidence: "article" }));
        }
    }
    if let Some(doc_id) = &reference.target_doc_id {
        if graph.get_article_by_id(doc_id).map_err(|e| IngestError::GraphWriteFailure(e.to_string()))?.is_some() {
            return Ok(Some(ResolvedTarget { id: doc_id.clone(), confidence: "document" }));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use boe_graph::InMemoryGraphAdapter;
    use serde_json::json;

    fn seeded_graph() -> InMemoryGraphAdapter {
        let graph = InMemoryGraphAdapter::new();
        graph.merge_node(&["artículo".into()], json!({"id": "BOE-B#artículo:3"})).unwrap();
        graph.merge_node(&["Normativa".into()], json!({"id": "BOE-B"})).unwrap();
        graph
    }

    #[test]
    fn resolves_to_specific_article_when_known() {
        let graph = seeded_graph();
        let pending = vec![PendingLink {
            source_article_id: "BOE-A#artículo:5".into(),
            raw_text: "artículo 3 de la Ley B".into(),
            target_doc_id: Some("BOE-B".into()),
            target_article_id: Some("BOE-B#artículo:3".into()),
        }];
        let stats = link(&graph, &pending, 5000).unwrap();
        assert_eq!(stats.resolved, 1);
        assert_eq!(stats.unresolved, 0);
        let referred = graph.get_referred_articles("BOE-A#artículo:5").unwrap();
        assert_eq!(referred[0].id, "BOE-B#artículo:3");
    }

    #[test]
    fn falls_back_to_document_when_article_unknown() {
        let graph = seeded_graph();
        let pending = vec![PendingLink {
            source_article_id: "BOE-A#artículo:5".into(),
            raw_text: "Ley B".into(),
            target_doc_id: Some("BOE-B".into()),
            target_article_id: Some("BOE-B#artículo:999".into()),
        }];
        let stats = link(&graph, &pending, 5000).unwrap();
        assert_eq!(stats.resolved, 1);
        let referred = graph.get_referred_articles("BOE-A#artículo:5").unwrap();
        assert_eq!(referred[0].id, "BOE-B");
    }

    #[test]
    fn records_unresolved_when_nothing_exists() {
        let graph = seeded_graph();
        let pending = vec![PendingLink {
            source_article_id: "BOE-A#artículo:5".into(),
            raw_text: "Ley desconocida".into(),
            target_doc_id: Some("BOE-Z".into()),
            target_article_id: None,
        }];
        let stats = link(&graph, &pending, 5000).unwrap();
        assert_eq!(stats.resolved, 0);
        assert_eq!(stats.unresolved, 1);
    }
}
