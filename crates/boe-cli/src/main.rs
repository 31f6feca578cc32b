use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};

use boe_config::IngestionConfig;
use boe_embeddings::{CachingProvider, DuckDbEmbeddingCache, EmbeddingCache, EmbeddingProvider, FastEmbedProvider, SimulatedEmbeddingProvider};
use boe_graph::{DuckDbGraphAdapter, GraphAdapter};
use boe_pipeline::{FixtureDocumentParser, HttpDocumentSource, Orchestrator};

mod cli;

use cli::{Cli, OutputFormat};

fn main() {
    if let Err(error) = run() {
        eprintln!("boe-ingest error: {error:#}");
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let law_ids = cli.resolve_law_ids()?;
    if law_ids.is_empty() {
        anyhow::bail!("no law ids provided (pass them as arguments or via --ids-file)");
    }

    let mut config = IngestionConfig::load().context("failed to load configuration")?;
    if cli.simulate_embeddings {
        config.pipeline.simulate_embeddings = true;
    }
    if cli.skip_embeddings {
        config.pipeline.skip_embeddings = true;
    }

    let runtime = tokio::runtime::Builder::new_current_thread().build().context("failed to start runtime")?;
    let result = runtime.block_on(async { ingest(&config, &law_ids) })?;

    match cli.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&to_json(&result))?),
        OutputFormat::Table => print_table(&result),
    }

    if result.failed > 0 {
        std::process::exit(1);
    }
    Ok(())
}

fn ingest(config: &IngestionConfig, law_ids: &[String]) -> anyhow::Result<boe_core::BatchIngestionResult> {
    let graph: Arc<dyn GraphAdapter> = Arc::new(DuckDbGraphAdapter::open(&config.storage.graph_path).context("failed to open graph store")?);

    let base_url = config.source.base_url.clone().context(
        "no document source configured: set source.base_url in ingest.toml or BOE_INGEST_SOURCE__BASE_URL",
    )?;
    let source = Arc::new(HttpDocumentSource::new(base_url)?);
    let parser = Arc::new(FixtureDocumentParser::new());

    let (embedder, cache): (Arc<dyn EmbeddingProvider>, Option<Arc<dyn EmbeddingCache>>) = build_embedder(config)?;

    let progress = ProgressBar::new_spinner();
    progress.set_style(ProgressStyle::with_template("{spinner} {msg}").unwrap_or_else(|_| ProgressStyle::default_spinner()));
    progress.enable_steady_tick(Duration::from_millis(120));
    progress.set_message(format!("ingesting {} document(s)", law_ids.len()));

    let orchestrator = Orchestrator::new(source, parser, graph, embedder, cache, config.pipeline.clone());
    let result = orchestrator.run(law_ids).context("pipeline run failed")?;

    progress.finish_and_clear();
    Ok(result)
}

fn build_embedder(config: &IngestionConfig) -> anyhow::Result<(Arc<dyn EmbeddingProvider>, Option<Arc<dyn EmbeddingCache>>)> {
    let cache = Arc::new(DuckDbEmbeddingCache::open(&config.storage.embedding_cache_path).context("failed to open embedding cache")?);

    if config.pipeline.simulate_embeddings {
        let inner = SimulatedEmbeddingProvider::new(config.pipeline.embedding_dim);
        let provider: Arc<dyn EmbeddingProvider> = Arc::new(CachingProvider::new(inner, CacheHandle(cache.clone())));
        return Ok((provider, Some(cache)));
    }

    let inner = FastEmbedProvider::try_new(config.pipeline.embedding_dim)?;
    let provider: Arc<dyn EmbeddingProvider> = Arc::new(CachingProvider::new(inner, CacheHandle(cache.clone())));
    Ok((provider, Some(cache)))
}

/// Cheap `Arc<dyn EmbeddingCache>` -> `EmbeddingCache` forwarding wrapper so
/// the same cache handle can be shared between the caching provider and the
/// orchestrator's post-embed flush call.
struct CacheHandle(Arc<DuckDbEmbeddingCache>);

impl EmbeddingCache for CacheHandle {
    fn get(&self, key: &str) -> Option<Vec<f32>> {
        self.0.get(key)
    }

    fn set(&self, key: &str, vector: &[f32]) {
        self.0.set(key, vector);
    }

    fn flush(&self) -> Result<(), boe_embeddings::EmbeddingError> {
        self.0.flush()
    }
}

fn init_tracing(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_env("BOE_INGEST_LOG").unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

fn to_json(result: &boe_core::BatchIngestionResult) -> serde_json::Value {
    serde_json::json!({
        "total_documents": result.total_documents,
        "successful": result.successful,
        "failed": result.failed,
        "total_nodes": result.total_nodes,
        "total_relationships": result.total_relationships,
        "total_reference_links": result.total_reference_links,
        "duration_seconds": result.duration_seconds,
        "phase_parse_duration": result.phase_parse_duration,
        "phase_embed_duration": result.phase_embed_duration,
        "phase_save_duration": result.phase_save_duration,
        "link_duration": result.link_duration,
        "dictionary_stats": result.dictionary_stats,
        "document_results": result.document_results.iter().map(|r| serde_json::json!({
            "law_id": r.law_id,
            "success": r.success,
            "nodes_created": r.nodes_created,
            "relationships_created": r.relationships_created,
            "articles_count": r.articles_count,
            "duration_seconds": r.duration_seconds,
            "error_message": r.error_message,
        })).collect::<Vec<_>>(),
    })
}

fn print_table(result: &boe_core::BatchIngestionResult) {
    println!(
        "{} documents: {} ok, {} failed ({:.2}s, {} nodes, {} relationships, {} links)",
        result.total_documents,
        result.successful,
        result.failed,
        result.duration_seconds,
        result.total_nodes,
        result.total_relationships,
        result.total_reference_links,
    );
    for doc in &result.document_results {
        if doc.success {
            println!("  ok   {}  nodes={} rels={} articles={}", doc.law_id, doc.nodes_created, doc.relationships_created, doc.articles_count);
        } else {
            println!("  FAIL {}  {}", doc.law_id, doc.error_message.as_deref().unwrap_or("unknown error"));
        }
    }
}
