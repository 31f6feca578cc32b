//! Citation markers left by the parser, resolved into graph edges later by
//! the Bulk Reference Linker (not during Save).

use crate::tree::NodeId;

/// An unresolved citation found in an article's text during parsing.
#[derive(Debug, Clone)]
pub struct PendingReference {
    /// Node in the *source* document's tree that carries this marker.
    pub source_node: NodeId,
    /// Raw citation text as found in the source (for the `REFERS_TO` edge).
    pub raw_text: String,
    /// BOE id of the document being cited, if the parser could resolve it.
    pub target_doc_id: Option<String>,
    /// Graph id of the specific article being cited, if known.
    pub target_article_id: Option<String>,
}
