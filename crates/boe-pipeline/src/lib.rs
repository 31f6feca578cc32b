//! Decoupled ingestion pipeline: orchestrator, stage workers, dictionary
//! preloader, and bulk reference linker, wired around a storage-agnostic
//! [`boe_graph::GraphAdapter`].

pub mod ids;
pub mod linker;
pub mod orchestrator;
pub mod parser;
pub mod preloader;
pub mod save;
pub mod source;
pub mod stages;

pub use ids::content_node_id;
pub use linker::{LinkStats, PendingLink, link};
pub use orchestrator::Orchestrator;
pub use parser::{ContentNode, ContentNodeKind, DocumentParser, FixtureDocumentParser, MetadataOverrideParser};
pub use preloader::{departamento_id, materia_id, preload, rango_id};
pub use save::{SaveOutput, save_document};
pub use source::{DocumentSource, HttpDocumentSource, StaticDocumentSource};
