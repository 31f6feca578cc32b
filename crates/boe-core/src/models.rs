//! DTOs exchanged between pipeline stages and returned to the caller.
//!
//! Field shapes mirror the data model in SPEC_FULL.md §3/§6 exactly: these
//! are the values that travel through the bounded queues and the aggregate
//! result handed back from `run()`.

use std::collections::HashMap;

use crate::change_event::ChangeEvent;
use crate::document::Normativa;

/// Output of the Parse stage: a fully-built content tree plus any change
/// events derived from diffing successive versions.
#[derive(Debug, Clone)]
pub struct ParsedDocument {
    pub law_id: String,
    pub normativa: Normativa,
    pub change_events: Vec<ChangeEvent>,
    pub parse_duration: f64,
}

/// Output of the Embed stage: identical to [`ParsedDocument`] plus timing,
/// with every article's `embedding` field populated (unless
/// `skip_embeddings` is set, in which case it passes through unchanged).
#[derive(Debug, Clone)]
pub struct EmbeddedDocument {
    pub law_id: String,
    pub normativa: Normativa,
    pub change_events: Vec<ChangeEvent>,
    pub parse_duration: f64,
    pub embed_duration: f64,
}

/// Per-document outcome, recorded whether the document succeeded or failed.
#[derive(Debug, Clone)]
pub struct DocumentResult {
    pub law_id: String,
    pub success: bool,
    pub nodes_created: u64,
    pub relationships_created: u64,
    pub articles_count: u64,
    pub parse_duration: f64,
    pub embed_duration: f64,
    pub save_duration: f64,
    pub duration_seconds: f64,
    pub error_message: Option<String>,
}

impl DocumentResult {
    #[must_use]
    pub fn failed(law_id: impl Into<String>, error_message: impl Into<String>) -> Self {
        Self {
            law_id: law_id.into(),
            success: false,
            nodes_created: 0,
            relationships_created: 0,
            articles_count: 0,
            parse_duration: 0.0,
            embed_duration: 0.0,
            save_duration: 0.0,
            duration_seconds: 0.0,
            error_message: Some(error_message.into()),
        }
    }
}

/// Per-taxonomy-class counts reported by the Dictionary Preloader, keyed by
/// `"materias"`, `"departamentos"`, `"rangos"`.
pub type DictionaryStats = HashMap<String, usize>;

/// Aggregate result of one `run()` invocation over a batch of law ids.
#[derive(Debug, Clone, Default)]
pub struct BatchIngestionResult {
    pub total_documents: usize,
    pub successful: usize,
    pub failed: usize,
    pub total_nodes: u64,
    pub total_relationships: u64,
    pub total_reference_links: u64,
    pub duration_seconds: f64,
    pub total_parse_duration: f64,
    pub total_embed_duration: f64,
    pub total_save_duration: f64,
    pub link_duration: f64,
    pub phase_parse_duration: f64,
    pub phase_embed_duration: f64,
    pub phase_save_duration: f64,
    pub document_results: Vec<DocumentResult>,
    pub dictionary_stats: DictionaryStats,
}

impl BatchIngestionResult {
    /// `successful + failed == total` must hold for every batch, regardless
    /// of how many documents failed.
    #[must_use]
    pub const fn invariant_holds(&self) -> bool {
        self.successful + self.failed == self.total_documents
    }
}
