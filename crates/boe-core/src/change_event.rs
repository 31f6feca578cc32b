//! Change events: a record that one document (source) altered articles in
//! another document (target).

use sha2::{Digest, Sha256};

/// How an article changed between two versions of the same target document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ChangeKind {
    /// Lowest precedence: present in the new version only.
    Added,
    /// Present in both, but type/name/text differs.
    Modified,
    /// Highest precedence: present in the old version only.
    Removed,
}

impl ChangeKind {
    /// When an article carries multiple overlapping kinds against the same
    /// event, the higher-precedence kind wins: `removed > modified > added`.
    #[must_use]
    pub fn combine(self, other: Self) -> Self {
        self.max(other)
    }
}

/// All changes made to one target document by one source (legislative act).
#[derive(Debug, Clone)]
pub struct ChangeEvent {
    pub id: String,
    pub target_document_id: String,
    pub source_document_id: String,
    pub description: Option<String>,
    /// `(node_path, kind)`, deduplicated by path with kind precedence applied.
    pub affected_nodes: Vec<(String, ChangeKind)>,
}

impl ChangeEvent {
    /// Deterministic id from `(target, source)` so repeated ingests merge
    /// rather than duplicate: `"change_" + sha256("target:source")[..16]`.
    #[must_use]
    pub fn generate_id(target_document_id: &str, source_document_id: &str) -> String {
        let combined = format!("{target_document_id}:{source_document_id}");
        let digest = Sha256::digest(combined.as_bytes());
        format!("change_{}", hex_prefix(&digest, 16))
    }

    #[must_use]
    pub fn create(target_document_id: impl Into<String>, source_document_id: impl Into<String>) -> Self {
        let target_document_id = target_document_id.into();
        let source_document_id = source_document_id.into();
        let id = Self::generate_id(&target_document_id, &source_document_id);
        Self {
            id,
            target_document_id,
            source_document_id,
            description: None,
            affected_nodes: Vec::new(),
        }
    }

    /// Record `path` as affected by `kind`, applying removed > modified >
    /// added precedence if the path was already recorded.
    pub fn add_affected_node(&mut self, path: impl Into<String>, kind: ChangeKind) {
        let path = path.into();
        if let Some(existing) = self.affected_nodes.iter_mut().find(|(p, _)| *p == path) {
            existing.1 = existing.1.combine(kind);
        } else {
            self.affected_nodes.push((path, kind));
        }
    }
}

/// First `n` hex characters of `bytes` (`n` must be even).
fn hex_prefix(bytes: &[u8], n: usize) -> String {
    bytes.iter().take(n / 2).map(|b| format!("{b:02x}")).collect()
}
