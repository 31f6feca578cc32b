//! Queue-Linked Orchestrator (C6): wires the Parse, Embed, and Save pools
//! together through two bounded `crossbeam-channel` queues and drives the
//! full batch lifecycle described in SPEC_FULL.md §4.6.

use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Instant;

use boe_config::PipelineConfig;
use boe_core::{BatchIngestionResult, DocumentResult, IngestError, ParsedDocument};
use boe_embeddings::{EmbeddingCache, EmbeddingProvider};
use boe_graph::{GraphAdapter, VectorSimilarity};
use crossbeam_channel::{bounded, unbounded};
use tracing::{error, info, info_span};

use crate::linker::{PendingLink, link};
use crate::parser::DocumentParser;
use crate::preloader::preload;
use crate::save::save_document;
use crate::source::DocumentSource;
use crate::stages::{embed_document, parse_one};

const VECTOR_INDEX_NAME: &str = "article_embeddings";
const VECTOR_INDEX_LABEL: &str = "artículo";
const VECTOR_INDEX_PROPERTY: &str = "embedding";

enum EmbedMsg {
    Work(ParsedDocument),
    Stop,
}

enum SaveMsg {
    Work(boe_core::EmbeddedDocument),
    Stop,
}

/// Owns the collaborator handles for one pipeline run and drives the batch
/// lifecycle: preload, spawn pools, drain, link, recreate the index.
pub struct Orchestrator {
    source: Arc<dyn DocumentSource>,
    parser: Arc<dyn DocumentParser>,
    graph: Arc<dyn GraphAdapter>,
    embedder: Arc<dyn EmbeddingProvider>,
    cache: Option<Arc<dyn EmbeddingCache>>,
    config: PipelineConfig,
}

impl Orchestrator {
    pub fn new(
        source: Arc<dyn DocumentSource>,
        parser: Arc<dyn DocumentParser>,
        graph: Arc<dyn GraphAdapter>,
        embedder: Arc<dyn EmbeddingProvider>,
        cache: Option<Arc<dyn EmbeddingCache>>,
        config: PipelineConfig,
    ) -> Self {
        Self { source, parser, graph, embedder, cache, config }
    }

    /// Ingest every id in `law_ids`, returning an aggregate result that
    /// always accounts for every input id, whether it succeeded or failed.
    pub fn run(&self, law_ids: &[String]) -> Result<BatchIngestionResult, IngestError> {
        let batch_start = Instant::now();
        info!(documents = law_ids.len(), "starting ingestion batch");

        self.graph.ensure_constraints().map_err(|e| IngestError::Infrastructure(anyhow::anyhow!(e)))?;
        self.graph.drop_vector_index(VECTOR_INDEX_NAME).map_err(|e| IngestError::IndexLifecycleFailure(e.to_string()))?;

        let dictionary_stats = preload(self.graph.as_ref())?;
        info!("dictionary preload complete");

        let results: Arc<Mutex<Vec<DocumentResult>>> = Arc::new(Mutex::new(Vec::new()));
        let pending_links: Arc<Mutex<Vec<PendingLink>>> = Arc::new(Mutex::new(Vec::new()));

        let (law_tx, law_rx) = unbounded::<String>();
        for law_id in law_ids {
            law_tx.send(law_id.clone()).expect("law task list receiver is held by this same scope");
        }
        drop(law_tx);

        let (embed_tx, embed_rx) = bounded::<EmbedMsg>(self.config.queue_maxsize);
        let (save_tx, save_rx) = bounded::<SaveMsg>(self.config.queue_maxsize);

        let phase_parse_duration = self.run_parse_pool(&law_rx, &embed_tx, &results);
        info!(duration = phase_parse_duration, "parse stage drained");

        for _ in 0..self.config.network_workers {
            let _ = embed_tx.send(EmbedMsg::Stop);
        }
        drop(embed_tx);

        let phase_embed_duration = self.run_embed_pool(&embed_rx, &save_tx, &results);
        info!(duration = phase_embed_duration, "embed stage drained");

        for _ in 0..self.config.disk_workers {
            let _ = save_tx.send(SaveMsg::Stop);
        }
        drop(save_tx);

        let phase_save_duration = self.run_save_pool(&save_rx, &results, &pending_links);
        info!(duration = phase_save_duration, "save stage drained");

        let link_start = Instant::now();
        let pending_links = unwrap_shared(pending_links);
        let link_stats = link(self.graph.as_ref(), &pending_links, self.config.link_batch_size)?;
        let link_duration = link_start.elapsed().as_secs_f64();
        info!(resolved = link_stats.resolved, unresolved = link_stats.unresolved, "reference linker complete");

        self.graph
            .create_vector_index(VECTOR_INDEX_NAME, VECTOR_INDEX_LABEL, VECTOR_INDEX_PROPERTY, self.config.embedding_dim, VectorSimilarity::Cosine)
            .map_err(|e| IngestError::IndexLifecycleFailure(e.to_string()))?;
        info!("vector index recreated");

        let mut results = unwrap_shared(results);
        results.sort_by(|a, b| a.law_id.cmp(&b.law_id));

        let successful = results.iter().filter(|r| r.success).count();
        let failed = results.len() - successful;

        Ok(BatchIngestionResult {
            total_documents: law_ids.len(),
            successful,
            failed,
            total_nodes: results.iter().map(|r| r.nodes_created).sum(),
            total_relationships: results.iter().map(|r| r.relationships_created).sum(),
            total_reference_links: link_stats.resolved,
            duration_seconds: batch_start.elapsed().as_secs_f64(),
            total_parse_duration: results.iter().map(|r| r.parse_duration).sum(),
            total_embed_duration: results.iter().map(|r| r.embed_duration).sum(),
            total_save_duration: results.iter().map(|r| r.save_duration).sum(),
            link_duration,
            phase_parse_duration,
            phase_embed_duration,
            phase_save_duration,
            document_results: results,
            dictionary_stats,
        })
    }

    fn run_parse_pool(
        &self,
        law_rx: &crossbeam_channel::Receiver<String>,
        embed_tx: &crossbeam_channel::Sender<EmbedMsg>,
        results: &Arc<Mutex<Vec<DocumentResult>>>,
    ) -> f64 {
        let start = Instant::now();
        let handles: Vec<_> = (0..self.config.cpu_workers)
            .map(|worker_id| {
                let law_rx = law_rx.clone();
                let embed_tx = embed_tx.clone();
                let source = Arc::clone(&self.source);
                let parser = Arc::clone(&self.parser);
                let results = Arc::clone(results);
                thread::spawn(move || {
                    let _pool_span = info_span!("parse_worker", worker_id).entered();
                    while let Ok(law_id) = law_rx.recv() {
                        let _doc_span = info_span!("document", law_id = %law_id).entered();
                        match parse_one(&law_id, source.as_ref(), parser.as_ref()) {
                            Ok(parsed) => {
                                if embed_tx.send(EmbedMsg::Work(parsed)).is_err() {
                                    break;
                                }
                            }
                            Err(e) => {
                                error!(law_id = %law_id, error = %e, "parse failed");
                                push_result(&results, DocumentResult::failed(law_id, e.to_string()));
                            }
                        }
                    }
                })
            })
            .collect();
        join_all(handles);
        start.elapsed().as_secs_f64()
    }

    fn run_embed_pool(
        &self,
        embed_rx: &crossbeam_channel::Receiver<EmbedMsg>,
        save_tx: &crossbeam_channel::Sender<SaveMsg>,
        results: &Arc<Mutex<Vec<DocumentResult>>>,
    ) -> f64 {
        let start = Instant::now();
        let handles: Vec<_> = (0..self.config.network_workers)
            .map(|worker_id| {
                let embed_rx = embed_rx.clone();
                let save_tx = save_tx.clone();
                let embedder = Arc::clone(&self.embedder);
                let cache = self.cache.clone();
                let config = self.config.clone();
                let results = Arc::clone(results);
                thread::spawn(move || {
                    let _pool_span = info_span!("embed_worker", worker_id).entered();
                    loop {
                        match embed_rx.recv() {
                            Ok(EmbedMsg::Stop) | Err(_) => break,
                            Ok(EmbedMsg::Work(parsed)) => {
                                let law_id = parsed.law_id.clone();
                                let _doc_span = info_span!("document", law_id = %law_id).entered();
                                match embed_document(parsed, embedder.as_ref(), cache.as_deref(), &config) {
                                    Ok(embedded) => {
                                        if save_tx.send(SaveMsg::Work(embedded)).is_err() {
                                            break;
                                        }
                                    }
                                    Err(e) => {
                                        error!(law_id = %law_id, error = %e, "embed failed");
                                        push_result(&results, DocumentResult::failed(law_id, e.to_string()));
                                    }
                                }
                            }
                        }
                    }
                })
            })
            .collect();
        join_all(handles);
        start.elapsed().as_secs_f64()
    }

    fn run_save_pool(
        &self,
        save_rx: &crossbeam_channel::Receiver<SaveMsg>,
        results: &Arc<Mutex<Vec<DocumentResult>>>,
        pending_links: &Arc<Mutex<Vec<PendingLink>>>,
    ) -> f64 {
        let start = Instant::now();
        let handles: Vec<_> = (0..self.config.disk_workers)
            .map(|worker_id| {
                let save_rx = save_rx.clone();
                let graph = Arc::clone(&self.graph);
                let results = Arc::clone(results);
                let pending_links = Arc::clone(pending_links);
                thread::spawn(move || {
                    let _pool_span = info_span!("save_worker", worker_id).entered();
                    loop {
                        match save_rx.recv() {
                            Ok(SaveMsg::Stop) | Err(_) => break,
                            Ok(SaveMsg::Work(embedded)) => {
                                let law_id = embedded.law_id.clone();
                                let _doc_span = info_span!("document", law_id = %law_id).entered();
                                let save_start = Instant::now();
                                match save_document(&law_id, &embedded.normativa, &embedded.change_events, graph.as_ref()) {
                                    Ok(output) => {
                                        let save_duration = save_start.elapsed().as_secs_f64();
                                        pending_links.lock().unwrap_or_else(PoisonError::into_inner).extend(output.pending_links);
                                        push_result(
                                            &results,
                                            DocumentResult {
                                                law_id,
                                                success: true,
                                                nodes_created: output.nodes_created,
                                                relationships_created: output.relationships_created,
                                                articles_count: output.articles_count,
                                                parse_duration: embedded.parse_duration,
                                                embed_duration: embedded.embed_duration,
                                                save_duration,
                                                duration_seconds: embedded.parse_duration + embedded.embed_duration + save_duration,
                                                error_message: None,
                                            },
                                        );
                                    }
                                    Err(e) => {
                                        error!(law_id = %law_id, error = %e, "save failed");
                                        push_result(&results, DocumentResult::failed(law_id, e.to_string()));
                                    }
                                }
                            }
                        }
                    }
                })
            })
            .collect();
        join_all(handles);
        start.elapsed().as_secs_f64()
    }
}

fn join_all(handles: Vec<thread::JoinHandle<()>>) {
    for handle in handles {
        let _ = handle.join();
    }
}

fn push_result(results: &Arc<Mutex<Vec<DocumentResult>>>, result: DocumentResult) {
    results.lock().unwrap_or_else(PoisonError::into_inner).push(result);
}

/// Unwrap a shared vector once every worker thread holding a clone has
/// joined and dropped its handle; falls back to draining the mutex in place
/// if, unexpectedly, more than one strong reference remains.
fn unwrap_shared<T: Default>(shared: Arc<Mutex<T>>) -> T {
    match Arc::try_unwrap(shared) {
        Ok(mutex) => mutex.into_inner().unwrap_or_else(PoisonError::into_inner),
        Err(shared) => std::mem::take(&mut *shared.lock().unwrap_or_else(PoisonError::into_inner)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use boe_embeddings::SimulatedEmbeddingProvider;
    use boe_graph::InMemoryGraphAdapter;

    use crate::parser::FixtureDocumentParser;
    use crate::source::StaticDocumentSource;

    fn orchestrator(config: PipelineConfig) -> (Orchestrator, Arc<InMemoryGraphAdapter>) {
        let source = Arc::new(
            StaticDocumentSource::new().with_document("BOE-A", "1|Uno\n2|Dos").with_document("BOE-B", "1|Tres"),
        );
        let graph = Arc::new(InMemoryGraphAdapter::new());
        let embedder = Arc::new(SimulatedEmbeddingProvider::new(config.embedding_dim));
        let orchestrator = Orchestrator::new(source, Arc::new(FixtureDocumentParser::new()), graph.clone(), embedder, None, config);
        (orchestrator, graph)
    }

    #[test]
    fn run_reports_successful_and_failed_documents() {
        let config = PipelineConfig { cpu_workers: 2, network_workers: 2, disk_workers: 1, embedding_dim: 16, ..Default::default() };
        let (orchestrator, _graph) = orchestrator(config);
        let law_ids = vec!["BOE-A".to_string(), "BOE-B".to_string(), "missing".to_string()];
        let result = orchestrator.run(&law_ids).unwrap();
        assert!(result.invariant_holds());
        assert_eq!(result.total_documents, 3);
        assert_eq!(result.successful, 2);
        assert_eq!(result.failed, 1);
        assert!(result.total_nodes > 0);
        assert!(result.dictionary_stats["materias"] > 0);
    }

    #[test]
    fn run_on_empty_batch_returns_zeroed_result() {
        let config = PipelineConfig { embedding_dim: 16, ..Default::default() };
        let (orchestrator, _graph) = orchestrator(config);
        let result = orchestrator.run(&[]).unwrap();
        assert_eq!(result.total_documents, 0);
        assert!(result.invariant_holds());
    }

    #[test]
    fn skip_embeddings_completes_without_vectors() {
        let config =
            PipelineConfig { cpu_workers: 1, network_workers: 1, disk_workers: 1, skip_embeddings: true, embedding_dim: 16, ..Default::default() };
        let (orchestrator, graph) = orchestrator(config);
        let result = orchestrator.run(&["BOE-A".to_string()]).unwrap();
        assert_eq!(result.successful, 1);
        let node = graph.get_article_by_id("BOE-A#artículo:1").unwrap().unwrap();
        assert!(node.property("embedding").is_none());
    }
}
