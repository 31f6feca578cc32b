//! Save Workers (disk-bound): materialize one embedded document into the
//! graph in batched writes, per SPEC_FULL.md §4.5.

use std::collections::HashMap;

use boe_core::{ArticleTextBuilder, ChangeEvent, ChangeKind, IngestError, Normativa, NodeId};
use boe_graph::{EdgeRecord, GraphAdapter, NodeRecord};
use serde_json::json;

use crate::ids::content_node_id;
use crate::linker::PendingLink;
use crate::preloader::{departamento_id, materia_id, rango_id};

/// What one Save worker produced for its document, before timing is glued
/// on by the caller.
pub struct SaveOutput {
    pub nodes_created: u64,
    pub relationships_created: u64,
    pub articles_count: u64,
    pub pending_links: Vec<PendingLink>,
}

/// Upsert the document, its dictionary relationships, its content tree, its
/// version chains, and any change events, all in two batched round-trips.
pub fn save_document(
    law_id: &str,
    normativa: &Normativa,
    change_events: &[ChangeEvent],
    graph: &dyn GraphAdapter,
) -> Result<SaveOutput, IngestError> {
    let tree = &normativa.content_tree;
    let builder = ArticleTextBuilder::new();

    let mut nodes = Vec::new();
    let mut edges = Vec::new();
    let mut pending_links = Vec::new();
    let mut articles_count = 0u64;
    let mut graph_ids: HashMap<NodeId, String> = HashMap::new();

    nodes.push(NodeRecord::new(
        law_id.to_string(),
        vec!["Normativa".to_string()],
        json!({
            "id": law_id,
            "titulo": normativa.metadata.titulo,
            "fecha_publicacion": normativa.metadata.fecha_publicacion,
        }),
    ));

    if let Some(rango) = normativa.metadata.rango {
        edges.push(EdgeRecord::new(law_id, rango_id(rango), "HAS_RANK", json!({})));
    }
    if let Some(departamento) = normativa.metadata.departamento {
        edges.push(EdgeRecord::new(law_id, departamento_id(departamento), "ISSUED_BY", json!({})));
    }
    for &materia in &normativa.metadata.materias {
        edges.push(EdgeRecord::new(law_id, materia_id(materia), "HAS_SUBJECT", json!({})));
    }

    for node_id in tree.walk(tree.root) {
        let node = tree.get(node_id);
        let graph_id = content_node_id(law_id, &node.path);
        graph_ids.insert(node_id, graph_id.clone());

        let mut properties = json!({
            "id": graph_id,
            "name": node.name,
            "path": node.path,
            "text": node.text,
        });

        if let Some(data) = node.article_data() {
            articles_count += 1;
            properties["full_text"] = json!(builder.build_full_text(tree, node_id));
            if let Some(embedding) = &data.embedding {
                properties["embedding"] = json!(embedding);
            }
            for reference in &data.pending_references {
                pending_links.push(PendingLink {
                    source_article_id: graph_id.clone(),
                    raw_text: reference.raw_text.clone(),
                    target_doc_id: reference.target_doc_id.clone(),
                    target_article_id: reference.target_article_id.clone(),
                });
            }
        }

        nodes.push(NodeRecord::new(graph_id.clone(), vec![node.kind.label().to_string()], properties));

        if node_id == tree.root {
            edges.push(EdgeRecord::new(law_id, graph_id, "HAS_CONTENT", json!({})));
        } else if let Some(parent_id) = node.parent {
            let parent_graph_id = graph_ids.get(&parent_id).cloned().unwrap_or_else(|| content_node_id(law_id, &tree.get(parent_id).path));
            edges.push(EdgeRecord::new(graph_id, parent_graph_id, "PART_OF", json!({})));
        }
    }

    for node_id in tree.collect_articles(tree.root) {
        let Some(data) = tree.get(node_id).article_data() else { continue };
        let graph_id = graph_ids[&node_id].clone();
        if let Some(next_id) = data.next_version {
            let next_graph_id = graph_ids.get(&next_id).cloned().unwrap_or_else(|| content_node_id(law_id, &tree.get(next_id).path));
            edges.push(EdgeRecord::new(graph_id.clone(), next_graph_id, "NEXT_VERSION", json!({})));
        }
        if let Some(previous_id) = data.previous_version {
            let previous_graph_id =
                graph_ids.get(&previous_id).cloned().unwrap_or_else(|| content_node_id(law_id, &tree.get(previous_id).path));
            edges.push(EdgeRecord::new(graph_id, previous_graph_id, "PREVIOUS_VERSION", json!({})));
        }
    }

    for event in change_events {
        nodes.push(NodeRecord::new(
            event.id.clone(),
            vec!["ChangeEvent".to_string()],
            json!({
                "id": event.id,
                "target_document_id": event.target_document_id,
                "source_document_id": event.source_document_id,
                "description": event.description,
            }),
        ));
        edges.push(EdgeRecord::new(event.source_document_id.clone(), event.id.clone(), "INTRODUCED_CHANGE", json!({})));
        edges.push(EdgeRecord::new(event.id.clone(), event.target_document_id.clone(), "MODIFIES", json!({})));
        for (path, kind) in &event.affected_nodes {
            let target_graph_id = content_node_id(&event.target_document_id, path);
            edges.push(EdgeRecord::new(event.id.clone(), target_graph_id, "CHANGED", json!({"type": change_kind_label(*kind)})));
        }
    }

    graph.batch_merge_nodes(&nodes).map_err(|e| IngestError::GraphWriteFailure(e.to_string()))?;
    graph.batch_merge_relationships(&edges).map_err(|e| IngestError::GraphWriteFailure(e.to_string()))?;

    Ok(SaveOutput {
        nodes_created: nodes.len() as u64,
        relationships_created: edges.len() as u64,
        articles_count,
        pending_links,
    })
}

const fn change_kind_label(kind: ChangeKind) -> &'static str {
    match kind {
        ChangeKind::Added => "added",
        ChangeKind::Modified => "modified",
        ChangeKind::Removed => "removed",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use boe_graph::InMemoryGraphAdapter;

    use crate::parser::{DocumentParser, FixtureDocumentParser};

    #[test]
    fn saves_document_node_tree_and_part_of_edges() {
        let normativa = FixtureDocumentParser::new().parse("BOE-X", "1|Uno\n2|Dos").unwrap();
        let graph = InMemoryGraphAdapter::new();
        let output = save_document("BOE-X", &normativa, &[], &graph).unwrap();
        assert_eq!(output.articles_count, 2);
        assert!(graph.get_article_by_id("BOE-X").unwrap().is_some());
        let root_path = &normativa.content_tree.get(normativa.content_tree.root).path;
        assert!(graph.get_article_by_id(&content_node_id("BOE-X", root_path)).unwrap().is_some());
    }

    #[test]
    fn change_events_produce_introduced_change_and_changed_edges() {
        let normativa = FixtureDocumentParser::new().parse("BOE-X", "1|Uno").unwrap();
        let graph = InMemoryGraphAdapter::new();
        let mut event = ChangeEvent::create("BOE-X", "BOE-X");
        event.add_affected_node("artículo:1", ChangeKind::Modified);
        save_document("BOE-X", &normativa, std::slice::from_ref(&event), &graph).unwrap();
        let event_node = graph.get_article_by_id(&event.id).unwrap().unwrap();
        assert_eq!(event_node.labels, vec!["ChangeEvent".to_string()]);
    }
}
