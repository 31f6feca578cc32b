//! The document (`Normativa`) being ingested: metadata plus a content tree.

use crate::taxonomy::{Departamento, Materia, Rango};
use crate::tree::Tree;

/// Metadata carried by a BOE document, independent of its content tree.
#[derive(Debug, Clone)]
pub struct DocumentMetadata {
    pub titulo: String,
    /// Date the document was published (ISO 8601).
    pub fecha_publicacion: Option<String>,
    pub rango: Option<Rango>,
    pub departamento: Option<Departamento>,
    pub materias: Vec<Materia>,
}

/// A single BOE document together with its content tree.
#[derive(Debug, Clone)]
pub struct Normativa {
    /// Stable BOE identifier, e.g. `BOE-A-1978-31229`.
    pub id: String,
    pub metadata: DocumentMetadata,
    pub content_tree: Tree,
}

impl Normativa {
    #[must_use]
    pub fn new(id: impl Into<String>, titulo: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            metadata: DocumentMetadata {
                titulo: titulo.into(),
                fecha_publicacion: None,
                rango: None,
                departamento: None,
                materias: Vec::new(),
            },
            content_tree: Tree::new(),
        }
    }
}
