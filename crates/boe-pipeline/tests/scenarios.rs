//! End-to-end scenarios for the decoupled ingestion pipeline, each driven
//! entirely through in-process collaborators (`StaticDocumentSource`,
//! `FixtureDocumentParser`, `SimulatedEmbeddingProvider`,
//! `InMemoryGraphAdapter`) so they run with no real network, XML grammar,
//! or embedding model.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use boe_config::PipelineConfig;
use boe_core::{IngestError, Normativa};
use boe_embeddings::{EmbeddingError, EmbeddingProvider, SimulatedEmbeddingProvider};
use boe_graph::{GraphAdapter, InMemoryGraphAdapter};
use boe_pipeline::{DocumentParser, FixtureDocumentParser, Orchestrator, StaticDocumentSource};
use pretty_assertions::assert_eq;

fn run_with(
    source: StaticDocumentSource,
    parser: impl DocumentParser + 'static,
    config: PipelineConfig,
    law_ids: &[&str],
) -> (boe_core::BatchIngestionResult, Arc<InMemoryGraphAdapter>) {
    let embedder = Arc::new(SimulatedEmbeddingProvider::new(config.embedding_dim));
    run_with_embedder(source, parser, embedder, config, law_ids)
}

fn run_with_embedder(
    source: StaticDocumentSource,
    parser: impl DocumentParser + 'static,
    embedder: Arc<dyn EmbeddingProvider>,
    config: PipelineConfig,
    law_ids: &[&str],
) -> (boe_core::BatchIngestionResult, Arc<InMemoryGraphAdapter>) {
    let graph = Arc::new(InMemoryGraphAdapter::new());
    let orchestrator = Orchestrator::new(Arc::new(source), Arc::new(parser), graph.clone(), embedder, None, config);
    let ids: Vec<String> = law_ids.iter().map(ToString::to_string).collect();
    let result = orchestrator.run(&ids).unwrap();
    (result, graph)
}

/// Wraps a [`SimulatedEmbeddingProvider`], counting how many times
/// `embed_batch` is actually invoked against it — one call per
/// `embedding_batch_max`-sized sub-chunk handed to the provider.
struct CountingProvider {
    inner: SimulatedEmbeddingProvider,
    calls: AtomicUsize,
}

impl CountingProvider {
    fn new(dim: usize) -> Self {
        Self { inner: SimulatedEmbeddingProvider::new(dim), calls: AtomicUsize::new(0) }
    }

    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl EmbeddingProvider for CountingProvider {
    fn dimension(&self) -> usize {
        self.inner.dimension()
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.embed_batch(texts)
    }
}

// ---------------------------------------------------------------------------
// S1: tiny base ingest
// ---------------------------------------------------------------------------

#[test]
fn tiny_base_ingest_produces_one_document_and_its_articles() {
    let source = StaticDocumentSource::new().with_document("BOE-A-2000-1", "1|Primero\n2|Segundo\n3|Tercero");
    let config = PipelineConfig { embedding_dim: 8, ..Default::default() };
    let (result, graph) = run_with(source, FixtureDocumentParser::new(), config, &["BOE-A-2000-1"]);

    assert!(result.invariant_holds());
    assert_eq!(result.total_documents, 1);
    assert_eq!(result.successful, 1);
    assert_eq!(result.failed, 0);
    assert_eq!(result.document_results[0].articles_count, 3);
    assert!(graph.get_article_by_id("BOE-A-2000-1").unwrap().is_some());
    assert!(graph.get_article_by_id("BOE-A-2000-1#artículo:1").unwrap().is_some());
}

// ---------------------------------------------------------------------------
// S2: idempotent re-ingest
// ---------------------------------------------------------------------------

#[test]
fn reingesting_the_same_document_does_not_duplicate_nodes() {
    let make_source = || StaticDocumentSource::new().with_document("BOE-A-2000-2", "1|Uno\n2|Dos");
    let config = PipelineConfig { embedding_dim: 8, ..Default::default() };

    let graph = Arc::new(InMemoryGraphAdapter::new());
    for _ in 0..2 {
        let embedder = Arc::new(SimulatedEmbeddingProvider::new(config.embedding_dim));
        let orchestrator = Orchestrator::new(
            Arc::new(make_source()),
            Arc::new(FixtureDocumentParser::new()),
            graph.clone(),
            embedder,
            None,
            config.clone(),
        );
        let result = orchestrator.run(&["BOE-A-2000-2".to_string()]).unwrap();
        assert_eq!(result.successful, 1);
    }

    let articles = graph.get_articles_by_structure("artículo:").unwrap();
    assert_eq!(articles.len(), 2, "merging the same document twice must not duplicate article nodes");
}

// ---------------------------------------------------------------------------
// S3: scatter-gather over a large document
// ---------------------------------------------------------------------------

#[test]
fn scatter_gather_embeds_every_article_of_a_large_document() {
    let body: String = (1..=1750).map(|n| format!("{n}|Texto del artículo {n}")).collect::<Vec<_>>().join("\n");
    let source = StaticDocumentSource::new().with_document("BOE-A-2000-3", body);
    let config = PipelineConfig {
        scatter_chunk_size: 500,
        embedding_dim: 8,
        embedding_batch_max: 100,
        cpu_workers: 2,
        network_workers: 4,
        ..Default::default()
    };
    let embedder = Arc::new(CountingProvider::new(config.embedding_dim));
    let (result, graph) = run_with_embedder(source, FixtureDocumentParser::new(), embedder.clone(), config, &["BOE-A-2000-3"]);

    assert_eq!(result.successful, 1);
    assert_eq!(result.document_results[0].articles_count, 1750);
    let node = graph.get_article_by_id("BOE-A-2000-3#artículo:1000").unwrap().unwrap();
    assert!(node.property("embedding").is_some());

    // 1750 articles batched at 100 per provider call: ceil(1750/100) = 18.
    assert!(embedder.call_count() <= 18, "expected at most 18 embed API batches, got {}", embedder.call_count());
}

// ---------------------------------------------------------------------------
// S4: fault isolation
// ---------------------------------------------------------------------------

#[test]
fn a_failing_document_does_not_prevent_its_siblings_from_succeeding() {
    let source = StaticDocumentSource::new().with_document("BOE-GOOD-1", "1|Uno").with_document("BOE-GOOD-2", "1|Dos");
    let config = PipelineConfig { embedding_dim: 8, cpu_workers: 2, ..Default::default() };
    let (result, graph) = run_with(source, FixtureDocumentParser::new(), config, &["BOE-GOOD-1", "BOE-MISSING", "BOE-GOOD-2"]);

    assert_eq!(result.total_documents, 3);
    assert_eq!(result.successful, 2);
    assert_eq!(result.failed, 1);
    let failed = result.document_results.iter().find(|r| r.law_id == "BOE-MISSING").unwrap();
    assert!(!failed.success);
    assert!(failed.error_message.is_some());
    assert!(graph.get_article_by_id("BOE-GOOD-1").unwrap().is_some());
    assert!(graph.get_article_by_id("BOE-GOOD-2").unwrap().is_some());
}

// ---------------------------------------------------------------------------
// S5: backpressure with a narrow embed stage
// ---------------------------------------------------------------------------

#[test]
fn a_single_network_worker_and_tiny_queue_still_drains_every_document() {
    let source = StaticDocumentSource::new()
        .with_document("BOE-BP-1", "1|Uno\n2|Dos")
        .with_document("BOE-BP-2", "1|Tres")
        .with_document("BOE-BP-3", "1|Cuatro\n2|Cinco\n3|Seis");
    let config = PipelineConfig {
        cpu_workers: 3,
        network_workers: 1,
        disk_workers: 1,
        queue_maxsize: 2,
        embedding_dim: 8,
        ..Default::default()
    };
    let (result, _graph) = run_with(source, FixtureDocumentParser::new(), config, &["BOE-BP-1", "BOE-BP-2", "BOE-BP-3"]);

    assert_eq!(result.successful, 3);
    assert_eq!(result.failed, 0);
    assert_eq!(result.document_results.iter().map(|r| r.articles_count).sum::<u64>(), 6);
}

// ---------------------------------------------------------------------------
// S6: reference linking across two documents
// ---------------------------------------------------------------------------

/// Wraps the fixture parser and attaches one pending reference from the
/// first article of `from` to a specific article of `to`, modeling a
/// citation the real grammar would have left on the tree.
struct ReferencingParser {
    inner: FixtureDocumentParser,
    from: &'static str,
    to_doc: &'static str,
    to_article_path: &'static str,
}

impl DocumentParser for ReferencingParser {
    fn parse(&self, law_id: &str, xml: &str) -> Result<Normativa, IngestError> {
        let mut normativa = self.inner.parse(law_id, xml)?;
        if law_id == self.from {
            let root = normativa.content_tree.root;
            let article = normativa.content_tree.collect_articles(root)[0];
            if let Some(data) = normativa.content_tree.get_mut(article).article_data_mut() {
                data.pending_references.push(boe_core::PendingReference {
                    source_node: article,
                    raw_text: "artículo 1 de la Ley citada".to_string(),
                    target_doc_id: Some(self.to_doc.to_string()),
                    target_article_id: Some(format!("{}#{}", self.to_doc, self.to_article_path)),
                });
            }
        }
        Ok(normativa)
    }
}

#[test]
fn a_reference_in_one_document_resolves_to_an_article_in_another() {
    let source = StaticDocumentSource::new().with_document("BOE-CITING", "1|Cita a otra ley").with_document("BOE-CITED", "1|Texto citado");
    let parser = ReferencingParser {
        inner: FixtureDocumentParser::new(),
        from: "BOE-CITING",
        to_doc: "BOE-CITED",
        to_article_path: "artículo:1",
    };
    let config = PipelineConfig { embedding_dim: 8, cpu_workers: 2, ..Default::default() };
    let (result, graph) = run_with(source, parser, config, &["BOE-CITING", "BOE-CITED"]);

    assert_eq!(result.successful, 2);
    assert_eq!(result.total_reference_links, 1);
    let referred = graph.get_referred_articles("BOE-CITING#artículo:1").unwrap();
    assert_eq!(referred.len(), 1);
    assert_eq!(referred[0].id, "BOE-CITED#artículo:1");
}
