//! Pure per-document stage logic shared by the Parse and Embed worker pools.
//! Kept free of threading/queue concerns so it can be unit tested directly.

use std::collections::HashMap;

use boe_config::PipelineConfig;
use boe_core::{ArticleTextBuilder, ChangeEvent, ChangeKind, IngestError, Node, NodeId, Normativa, ParsedDocument, Tree};
use boe_embeddings::{EmbeddingCache, EmbeddingError, EmbeddingProvider, chunked, with_retry};
use tracing::warn;

use crate::parser::DocumentParser;
use crate::source::DocumentSource;

/// Fetch and parse one document, deriving change events from any version
/// chains the parser already built into the tree.
pub fn parse_one(law_id: &str, source: &dyn DocumentSource, parser: &dyn DocumentParser) -> Result<ParsedDocument, IngestError> {
    let start = std::time::Instant::now();
    let xml = source.fetch(law_id)?;
    let normativa = parser.parse(law_id, &xml)?;
    let change_events = detect_change_events(&normativa);
    Ok(ParsedDocument {
        law_id: law_id.to_string(),
        normativa,
        change_events,
        parse_duration: start.elapsed().as_secs_f64(),
    })
}

/// For every article with a `previous_version`, recursively diff its
/// subtree against that predecessor's, grouping the resulting added/
/// modified/removed node paths into one [`ChangeEvent`] per amending act
/// (`introduced_by`, falling back to the document's own id when the
/// article carries no amending act of its own). Returns no events for a
/// tree with no version chains (the common case for a base ingest).
#[must_use]
pub fn detect_change_events(normativa: &Normativa) -> Vec<ChangeEvent> {
    let tree = &normativa.content_tree;
    let mut events: HashMap<String, ChangeEvent> = HashMap::new();

    for node_id in tree.collect_articles(tree.root) {
        let node = tree.get(node_id);
        let Some(data) = node.article_data() else { continue };
        let Some(previous_id) = data.previous_version else { continue };

        let source_document_id = data.introduced_by.clone().unwrap_or_else(|| normativa.id.clone());
        let event = events
            .entry(source_document_id.clone())
            .or_insert_with(|| ChangeEvent::create(&normativa.id, source_document_id));

        diff_subtree(tree, Some(previous_id), node_id, event);
    }

    let mut out: Vec<ChangeEvent> = events.into_values().collect();
    out.sort_by(|a, b| a.id.cmp(&b.id));
    out
}

/// Recursively compare `new_id` against `old_id` (if any), recording every
/// added, modified, or removed descendant path on `event`. Children are
/// matched across versions by `(kind label, name)`, mirroring how the
/// parser names siblings deterministically within one parent.
fn diff_subtree(tree: &Tree, old_id: Option<NodeId>, new_id: NodeId, event: &mut ChangeEvent) {
    let new_node = tree.get(new_id);

    let Some(old_id) = old_id else {
        event.add_affected_node(new_node.path.clone(), ChangeKind::Added);
        return;
    };
    let old_node = tree.get(old_id);

    if old_node.kind.label() != new_node.kind.label() || old_node.name != new_node.name || old_node.text != new_node.text {
        event.add_affected_node(new_node.path.clone(), ChangeKind::Modified);
    }

    for &new_child_id in &new_node.children {
        let matched_old = find_matching_child(tree, old_node, tree.get(new_child_id));
        diff_subtree(tree, matched_old, new_child_id, event);
    }

    for &old_child_id in &old_node.children {
        let old_child = tree.get(old_child_id);
        if find_matching_child(tree, new_node, old_child).is_none() {
            event.add_affected_node(old_child.path.clone(), ChangeKind::Removed);
        }
    }
}

/// The child of `parent` sharing `target`'s type and name, if any.
fn find_matching_child(tree: &Tree, parent: &Node, target: &Node) -> Option<NodeId> {
    parent.children.iter().copied().find(|&id| {
        let candidate = tree.get(id);
        candidate.kind.label() == target.kind.label() && candidate.name == target.name
    })
}

fn to_ingest_error(error: EmbeddingError) -> IngestError {
    match error {
        EmbeddingError::Transient(reason) => IngestError::EmbedTransient(reason),
        EmbeddingError::Permanent(reason) | EmbeddingError::InitFailed(reason) => IngestError::EmbedPermanent(reason),
        EmbeddingError::CacheIo(reason) => IngestError::CachePersistFailure(reason),
    }
}

/// Embed every article of a parsed document, honoring `skip_embeddings` and
/// dispatching large documents across scatter-gather sub-tasks.
pub fn embed_document(
    mut parsed: ParsedDocument,
    embedder: &dyn EmbeddingProvider,
    cache: Option<&dyn EmbeddingCache>,
    config: &PipelineConfig,
) -> Result<boe_core::EmbeddedDocument, IngestError> {
    let start = std::time::Instant::now();

    if config.skip_embeddings {
        return Ok(boe_core::EmbeddedDocument {
            law_id: parsed.law_id,
            normativa: parsed.normativa,
            change_events: parsed.change_events,
            parse_duration: parsed.parse_duration,
            embed_duration: 0.0,
        });
    }

    let builder = ArticleTextBuilder::new();
    let root = parsed.normativa.content_tree.root;
    let article_ids = parsed.normativa.content_tree.collect_articles(root);
    let texts: Vec<String> = article_ids.iter().map(|&id| builder.build_context_string(&parsed.normativa, id)).collect();

    let vectors = embed_texts(&texts, embedder, config)?;

    for (&article_id, vector) in article_ids.iter().zip(vectors) {
        if let Some(data) = parsed.normativa.content_tree.get_mut(article_id).article_data_mut() {
            data.embedding = Some(vector);
        }
    }

    if let Some(cache) = cache {
        if let Err(e) = cache.flush() {
            warn!(law_id = %parsed.law_id, error = %e, "embedding cache flush failed, continuing");
        }
    }

    Ok(boe_core::EmbeddedDocument {
        law_id: parsed.law_id,
        normativa: parsed.normativa,
        change_events: parsed.change_events,
        parse_duration: parsed.parse_duration,
        embed_duration: start.elapsed().as_secs_f64(),
    })
}

/// Embed one scatter-dispatch chunk, further sub-batching it by
/// `embedding_batch_max` before each call to the provider — a scatter
/// chunk sizes the thread fan-out, not the provider's own batch limit.
fn embed_via_provider(texts: &[String], embedder: &dyn EmbeddingProvider, config: &PipelineConfig) -> Result<Vec<Vec<f32>>, EmbeddingError> {
    let mut out = Vec::with_capacity(texts.len());
    for batch in chunked(texts, config.embedding_batch_max) {
        out.extend(with_retry(config.embed_retries, |_| embedder.embed_batch(batch))?);
    }
    Ok(out)
}

/// Embed `texts`, splitting into `scatter_chunk_size`-sized sub-tasks run on
/// independent threads when the document exceeds that size, each of which
/// is further sub-batched by `embedding_batch_max` before hitting the
/// provider. Chunks write to disjoint output slices, so no further
/// synchronization is needed between them.
fn embed_texts(texts: &[String], embedder: &dyn EmbeddingProvider, config: &PipelineConfig) -> Result<Vec<Vec<f32>>, IngestError> {
    if texts.is_empty() {
        return Ok(Vec::new());
    }

    let chunk_size = config.scatter_chunk_size.max(1);
    if texts.len() <= chunk_size {
        return embed_via_provider(texts, embedder, config).map_err(to_ingest_error);
    }

    let chunks: Vec<&[String]> = texts.chunks(chunk_size).collect();
    let results: Vec<Result<Vec<Vec<f32>>, EmbeddingError>> = std::thread::scope(|scope| {
        let handles: Vec<_> = chunks.iter().map(|chunk| scope.spawn(move || embed_via_provider(chunk, embedder, config))).collect();
        handles
            .into_iter()
            .map(|handle| handle.join().unwrap_or_else(|_| Err(EmbeddingError::Permanent("embed sub-task panicked".into()))))
            .collect()
    });

    let mut out = Vec::with_capacity(texts.len());
    for chunk_result in results {
        out.extend(chunk_result.map_err(to_ingest_error)?);
    }
    Ok(out)
}
