//! The content tree: an arena of [`Node`]s addressed by [`NodeId`] handles.
//!
//! The source document model uses cyclic parent/child object references and
//! a dynamic attribute bag per node. Here the tree is an owning `Vec<Node>`
//! indexed by integer handle, and every node type is a variant of the closed
//! [`NodeKind`] enum, carrying only the fields that type needs. Parent and
//! child links are handles into the same arena, never pointers, so the tree
//! (and the version chains that cross trees) can never form a reference
//! cycle.

use crate::reference::PendingReference;

/// Index into a [`Tree`]'s arena. Stable for the lifetime of the tree.
pub type NodeId = usize;

/// Fields specific to `artículo` and `artículo_único` nodes.
#[derive(Debug, Clone, Default)]
pub struct ArticleData {
    /// Date the article entered into force (ISO 8601, `YYYY-MM-DD`).
    pub fecha_vigencia: Option<String>,
    /// Date the article was repealed, if any.
    pub fecha_caducidad: Option<String>,
    /// Handle to the immediately preceding version of this article, if any.
    pub previous_version: Option<NodeId>,
    /// Handle to the immediately following version of this article, if any.
    pub next_version: Option<NodeId>,
    /// BOE id of the legislative act that introduced this version of the
    /// article. `None` means it was introduced by the document being
    /// ingested itself, rather than by an earlier amending act.
    pub introduced_by: Option<String>,
    /// Dense embedding vector, attached during the embed stage.
    pub embedding: Option<Vec<f32>>,
    /// Citation markers found in this article's text, not yet resolved to
    /// graph edges. Consumed by the Bulk Reference Linker.
    pub pending_references: Vec<PendingReference>,
}

/// The closed set of structural node types in a BOE content tree.
#[derive(Debug, Clone)]
pub enum NodeKind {
    Root,
    Libro,
    Titulo,
    Capitulo,
    Seccion,
    Subseccion,
    Articulo(ArticleData),
    ArticuloUnico(ArticleData),
    ApartadoNumerico,
    ApartadoAlfa,
    OrdinalNumerico,
    OrdinalAlfa,
    Parrafo,
    Disposicion,
}

impl NodeKind {
    /// The lowercase Spanish type tag, as it appears on wire/graph labels.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Root => "root",
            Self::Libro => "libro",
            Self::Titulo => "título",
            Self::Capitulo => "capítulo",
            Self::Seccion => "sección",
            Self::Subseccion => "subsección",
            Self::Articulo(_) => "artículo",
            Self::ArticuloUnico(_) => "artículo_único",
            Self::ApartadoNumerico => "apartado_numérico",
            Self::ApartadoAlfa => "apartado_alfa",
            Self::OrdinalNumerico => "ordinal_numérico",
            Self::OrdinalAlfa => "ordinal_alfa",
            Self::Parrafo => "párrafo",
            Self::Disposicion => "disposición",
        }
    }

    /// Whether this node carries [`ArticleData`] (the embedding unit).
    #[must_use]
    pub const fn is_article(&self) -> bool {
        matches!(self, Self::Articulo(_) | Self::ArticuloUnico(_))
    }
}

/// A single node in the content tree.
#[derive(Debug, Clone)]
pub struct Node {
    pub id: NodeId,
    pub kind: NodeKind,
    pub name: String,
    pub level: i32,
    pub text: String,
    /// Slash-separated `type:name` path, unique per document, stable across
    /// re-ingestion of the same source. A `párrafo` whose parent is not
    /// itself an article/root/disposición inherits its parent's path rather
    /// than extending it.
    pub path: String,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
}

impl Node {
    /// Borrow this node's [`ArticleData`], if it is an article node.
    #[must_use]
    pub const fn article_data(&self) -> Option<&ArticleData> {
        match &self.kind {
            NodeKind::Articulo(d) | NodeKind::ArticuloUnico(d) => Some(d),
            _ => None,
        }
    }

    /// Mutably borrow this node's [`ArticleData`], if it is an article node.
    pub fn article_data_mut(&mut self) -> Option<&mut ArticleData> {
        match &mut self.kind {
            NodeKind::Articulo(d) | NodeKind::ArticuloUnico(d) => Some(d),
            _ => None,
        }
    }
}

/// An owning arena of [`Node`]s forming one document's content tree.
#[derive(Debug, Clone)]
pub struct Tree {
    nodes: Vec<Node>,
    pub root: NodeId,
}

impl Tree {
    /// Create a new tree with a single root node.
    #[must_use]
    pub fn new() -> Self {
        let root = Node {
            id: 0,
            kind: NodeKind::Root,
            name: "Content".to_string(),
            level: -1,
            text: String::new(),
            path: "root".to_string(),
            parent: None,
            children: Vec::new(),
        };
        Self {
            nodes: vec![root],
            root: 0,
        }
    }

    /// Allocate a new node as a child of `parent`, returning its handle.
    ///
    /// `path` follows the párrafo-inheritance rule: callers building a
    /// párrafo whose parent is not an article/root/disposición should pass
    /// the parent's own path unchanged.
    pub fn push_child(
        &mut self,
        parent: NodeId,
        kind: NodeKind,
        name: impl Into<String>,
        level: i32,
        text: impl Into<String>,
        path: impl Into<String>,
    ) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(Node {
            id,
            kind,
            name: name.into(),
            level,
            text: text.into(),
            path: path.into(),
            parent: Some(parent),
            children: Vec::new(),
        });
        self.nodes[parent].children.push(id);
        id
    }

    #[must_use]
    pub fn get(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    pub fn get_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id]
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Depth-first, pre-order iterator over every node handle starting at
    /// `start` (inclusive).
    #[must_use]
    pub fn walk(&self, start: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![start];
        while let Some(id) = stack.pop() {
            out.push(id);
            for &child in self.nodes[id].children.iter().rev() {
                stack.push(child);
            }
        }
        out
    }

    /// Collect every article node (`artículo` / `artículo_único`) reachable
    /// from `start`, in tree order.
    #[must_use]
    pub fn collect_articles(&self, start: NodeId) -> Vec<NodeId> {
        self.walk(start)
            .into_iter()
            .filter(|&id| self.nodes[id].kind.is_article())
            .collect()
    }

    /// The chain of ancestors from the tree root down to (but excluding)
    /// `node`, in root-to-leaf order.
    #[must_use]
    pub fn ancestors(&self, node: NodeId) -> Vec<NodeId> {
        let mut chain = Vec::new();
        let mut cur = self.nodes[node].parent;
        while let Some(id) = cur {
            chain.push(id);
            cur = self.nodes[id].parent;
        }
        chain.reverse();
        chain
    }
}

impl Default for Tree {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn new_tree_has_single_root() {
        let tree = Tree::new();
        assert_eq!(tree.len(), 1);
        assert_eq!(tree.get(tree.root).kind.label(), "root");
    }

    #[test]
    fn push_child_links_parent_and_child() {
        let mut tree = Tree::new();
        let titulo = tree.push_child(tree.root, NodeKind::Titulo, "I", 0, "", "título:I");
        let art = tree.push_child(
            titulo,
            NodeKind::Articulo(ArticleData::default()),
            "1",
            1,
            "texto",
            "título:I/artículo:1",
        );
        assert_eq!(tree.get(titulo).children, vec![art]);
        assert_eq!(tree.get(art).parent, Some(titulo));
    }

    #[test]
    fn collect_articles_finds_nested_articles() {
        let mut tree = Tree::new();
        let titulo = tree.push_child(tree.root, NodeKind::Titulo, "I", 0, "", "título:I");
        let a1 = tree.push_child(titulo, NodeKind::Articulo(ArticleData::default()), "1", 1, "", "a/1");
        let a2 = tree.push_child(tree.root, NodeKind::ArticuloUnico(ArticleData::default()), "único", 1, "", "a/u");
        let articles = tree.collect_articles(tree.root);
        assert_eq!(articles, vec![a1, a2]);
    }

    #[test]
    fn ancestors_excludes_self_and_orders_root_first() {
        let mut tree = Tree::new();
        let titulo = tree.push_child(tree.root, NodeKind::Titulo, "I", 0, "", "t:I");
        let cap = tree.push_child(titulo, NodeKind::Capitulo, "II", 1, "", "t:I/c:II");
        let art = tree.push_child(cap, NodeKind::Articulo(ArticleData::default()), "5", 2, "", "t:I/c:II/a:5");
        let chain = tree.ancestors(art);
        assert_eq!(chain, vec![tree.root, titulo, cap]);
    }

    #[rstest]
    #[case::direct_child_of_apartado_numerico(NodeKind::ApartadoNumerico, "a:5/apartado_numérico:1")]
    #[case::direct_child_of_apartado_alfa(NodeKind::ApartadoAlfa, "a:5/apartado_alfa:a")]
    #[case::direct_child_of_ordinal_numerico(NodeKind::OrdinalNumerico, "a:5/ordinal_numérico:1")]
    fn parrafo_under_non_article_parent_inherits_the_parents_path(#[case] parent_kind: NodeKind, #[case] parent_path: &str) {
        let mut tree = Tree::new();
        let parent = tree.push_child(tree.root, parent_kind, "1", 0, "", parent_path);

        // A párrafo whose parent is not itself artículo/artículo_único/root/
        // disposición is passed the parent's own path unchanged, per the
        // inheritance rule; siblings therefore legitimately share a path.
        let first = tree.push_child(parent, NodeKind::Parrafo, "1", 1, "primero", parent_path);
        let second = tree.push_child(parent, NodeKind::Parrafo, "2", 1, "segundo", parent_path);

        assert_eq!(tree.get(first).path, parent_path);
        assert_eq!(tree.get(second).path, parent_path);
        assert_eq!(tree.get(first).path, tree.get(second).path);
    }
}
