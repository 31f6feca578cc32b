//! Graph id conventions shared by the Save workers and the Bulk Reference
//! Linker: a content-tree node's id is its owning document's law id plus its
//! path, so the same path in two different documents never collides.

#[must_use]
pub fn content_node_id(law_id: &str, path: &str) -> String {
    format!("{law_id}#{path}")
}
