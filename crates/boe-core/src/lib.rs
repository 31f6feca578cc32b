//! # boe-core
//!
//! Domain types shared by every crate in the BOE ingestion pipeline: the
//! content tree arena, change events, dictionary taxonomy, the canonical
//! article text builder, and the pipeline's DTOs and error kinds.
//!
//! Nothing in this crate performs I/O. It is the vocabulary the rest of the
//! workspace (`boe-embeddings`, `boe-graph`, `boe-pipeline`) is built from.

pub mod change_event;
pub mod document;
pub mod error;
pub mod models;
pub mod reference;
pub mod taxonomy;
pub mod text_builder;
pub mod tree;

pub use change_event::{ChangeEvent, ChangeKind};
pub use document::{DocumentMetadata, Normativa};
pub use error::IngestError;
pub use models::{BatchIngestionResult, DictionaryStats, DocumentResult, EmbeddedDocument, ParsedDocument};
pub use reference::PendingReference;
pub use taxonomy::{Departamento, Materia, Rango};
pub use text_builder::ArticleTextBuilder;
pub use tree::{ArticleData, Node, NodeId, NodeKind, Tree};
