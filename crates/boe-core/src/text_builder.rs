//! Canonical article text rendering: the exact string fed to the embedding
//! provider and hashed to form the cache key (SPEC_FULL.md §4.5).
//!
//! Every rule here — the line order, the hierarchy separator, the validity
//! sentence wording, the descendant prefix markers — is load-bearing: two
//! semantically identical articles must render byte-for-byte identically so
//! the embedding cache actually hits across documents and runs.

use crate::document::Normativa;
use crate::tree::{ArticleData, NodeId, NodeKind, Tree};

const MONTHS_ES: [&str; 12] = [
    "enero",
    "febrero",
    "marzo",
    "abril",
    "mayo",
    "junio",
    "julio",
    "agosto",
    "septiembre",
    "octubre",
    "noviembre",
    "diciembre",
];

/// Builds canonical text representations of articles for embedding.
#[derive(Debug, Default, Clone, Copy)]
pub struct ArticleTextBuilder;

impl ArticleTextBuilder {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// The article's own text followed by each descendant's text, prefixed
    /// per its type marker, visited in tree order, non-empty parts joined by
    /// a blank line.
    #[must_use]
    pub fn build_full_text(&self, tree: &Tree, article: NodeId) -> String {
        let node = tree.get(article);
        let mut parts = Vec::new();
        if !node.text.is_empty() {
            parts.push(node.text.clone());
        }
        for &child in &node.children {
            self.collect_descendant_text(tree, child, &mut parts);
        }
        parts.join("\n\n")
    }

    fn collect_descendant_text(&self, tree: &Tree, node_id: NodeId, out: &mut Vec<String>) {
        let node = tree.get(node_id);
        let prefix = match &node.kind {
            NodeKind::ApartadoNumerico => format!("{}. ", node.name),
            NodeKind::ApartadoAlfa => format!("{}) ", node.name),
            NodeKind::OrdinalNumerico | NodeKind::OrdinalAlfa => format!("{} ", node.name),
            NodeKind::Parrafo => String::new(),
            _ => String::new(),
        };
        if !node.text.is_empty() {
            out.push(format!("{prefix}{}", node.text));
        }
        for &child in &node.children {
            self.collect_descendant_text(tree, child, out);
        }
    }

    /// The article's ancestor chain rendered as `"{Type} {name}"`, excluding
    /// root and the article itself, joined with `separator`.
    #[must_use]
    pub fn build_hierarchy_path(&self, tree: &Tree, article: NodeId, separator: &str) -> String {
        tree.ancestors(article)
            .into_iter()
            .filter(|&id| !matches!(tree.get(id).kind, NodeKind::Root))
            .map(|id| {
                let node = tree.get(id);
                format!("{} {}", capitalize(node.kind.label()), node.name)
            })
            .collect::<Vec<_>>()
            .join(separator)
    }

    /// The full canonical context string: document info, hierarchy context,
    /// article number, validity sentence, then content.
    #[must_use]
    pub fn build_context_string(&self, normativa: &Normativa, article: NodeId) -> String {
        let tree = &normativa.content_tree;
        let node = tree.get(article);
        let data = node.article_data().cloned().unwrap_or_default();

        let doc_line = format!("Documento: {} ({})", normativa.metadata.titulo, normativa.id);

        let context_str = self.build_hierarchy_path(tree, article, " > ");
        let context_line = format!(
            "Contexto: {}",
            if context_str.is_empty() { "General" } else { &context_str }
        );

        let article_line = format!("Artículo: {}", node.name);
        let state_line = format!("Estado: {}", self.build_validity_sentence(&data));

        let content_text = self.build_full_text(tree, article);

        format!("{doc_line}\n{context_line}\n{article_line}\n{state_line}\nContenido:\n{content_text}")
    }

    /// Spanish-language validity sentence for an article's `ArticleData`.
    #[must_use]
    pub fn build_validity_sentence(&self, data: &ArticleData) -> String {
        let start = format_date_human(data.fecha_vigencia.as_deref());
        if let Some(end) = data.fecha_caducidad.as_deref() {
            let end = format_date_human(Some(end));
            format!("Este artículo ya no está en vigor. Estuvo vigente desde {start} hasta {end}.")
        } else if data.next_version.is_some() {
            format!(
                "Este artículo ha sido modificado. Existe una versión más reciente. Estuvo vigente desde {start}."
            )
        } else {
            format!("Este artículo está actualmente vigente desde {start}. Se encuentra en vigor.")
        }
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().collect::<String>() + chars.as_str()
    })
}

/// Render an ISO `YYYY-MM-DD` date as `"{day} de {month} de {year}"`, or
/// `"Desconocida"` if absent/unparseable.
#[must_use]
pub fn format_date_human(date: Option<&str>) -> String {
    let Some(date) = date else {
        return "Desconocida".to_string();
    };
    let parts: Vec<&str> = date.splitn(3, '-').collect();
    if parts.len() != 3 {
        return date.to_string();
    }
    let (year, month, day) = (parts[0], parts[1], parts[2]);
    let (Ok(month_idx), Ok(day_num)) = (month.parse::<usize>(), day.parse::<u32>()) else {
        return date.to_string();
    };
    if month_idx == 0 || month_idx > 12 {
        return date.to_string();
    }
    format!("{day_num} de {} de {year}", MONTHS_ES[month_idx - 1])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::Tree;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn sample_tree() -> (Tree, NodeId) {
        let mut tree = Tree::new();
        let titulo = tree.push_child(tree.root, NodeKind::Titulo, "I", 0, "", "título:I");
        let capitulo = tree.push_child(titulo, NodeKind::Capitulo, "II", 1, "", "título:I/capítulo:II");
        let article = tree.push_child(
            capitulo,
            NodeKind::Articulo(ArticleData {
                fecha_vigencia: Some("1978-12-29".to_string()),
                ..Default::default()
            }),
            "5",
            2,
            "Texto principal del artículo.",
            "título:I/capítulo:II/artículo:5",
        );
        let apartado = tree.push_child(
            article,
            NodeKind::ApartadoNumerico,
            "1",
            3,
            "Primer apartado.",
            "título:I/capítulo:II/artículo:5/apartado_numérico:1",
        );
        let _ = apartado;
        (tree, article)
    }

    #[test]
    fn format_date_human_renders_spanish_date() {
        assert_eq!(format_date_human(Some("1978-12-29")), "29 de diciembre de 1978");
        assert_eq!(format_date_human(None), "Desconocida");
    }

    #[test]
    fn hierarchy_path_excludes_root_and_article() {
        let (tree, article) = sample_tree();
        let builder = ArticleTextBuilder::new();
        assert_eq!(builder.build_hierarchy_path(&tree, article, " > "), "Título I > Capítulo II");
    }

    #[test]
    fn full_text_includes_apartado_with_numeric_prefix() {
        let (tree, article) = sample_tree();
        let builder = ArticleTextBuilder::new();
        let text = builder.build_full_text(&tree, article);
        assert_eq!(text, "Texto principal del artículo.\n\n1. Primer apartado.");
    }

    #[rstest]
    #[case::currently_in_force(
        ArticleData { fecha_vigencia: Some("1978-12-29".to_string()), ..Default::default() },
        "Este artículo está actualmente vigente desde 29 de diciembre de 1978. Se encuentra en vigor."
    )]
    #[case::repealed_takes_precedence_over_next_version(
        ArticleData {
            fecha_vigencia: Some("1978-12-29".to_string()),
            fecha_caducidad: Some("2000-01-01".to_string()),
            next_version: Some(999),
            ..Default::default()
        },
        "Este artículo ya no está en vigor. Estuvo vigente desde 29 de diciembre de 1978 hasta 1 de enero de 2000."
    )]
    #[case::superseded_without_expiry(
        ArticleData { fecha_vigencia: Some("1978-12-29".to_string()), next_version: Some(42), ..Default::default() },
        "Este artículo ha sido modificado. Existe una versión más reciente. Estuvo vigente desde 29 de diciembre de 1978."
    )]
    #[case::unknown_start_date(
        ArticleData::default(),
        "Este artículo está actualmente vigente desde Desconocida. Se encuentra en vigor."
    )]
    fn validity_sentence_branches(#[case] data: ArticleData, #[case] expected: &str) {
        let builder = ArticleTextBuilder::new();
        assert_eq!(builder.build_validity_sentence(&data), expected);
    }

    #[test]
    fn context_string_assembles_all_sections_in_order() {
        let (tree, article) = sample_tree();
        let normativa = Normativa {
            id: "BOE-A-1978-31229".to_string(),
            metadata: crate::document::DocumentMetadata {
                titulo: "Constitución Española".to_string(),
                fecha_publicacion: None,
                rango: None,
                departamento: None,
                materias: Vec::new(),
            },
            content_tree: tree,
        };
        let builder = ArticleTextBuilder::new();
        let rendered = builder.build_context_string(&normativa, article);
        assert_eq!(
            rendered,
            "Documento: Constitución Española (BOE-A-1978-31229)\n\
             Contexto: Título I > Capítulo II\n\
             Artículo: 5\n\
             Estado: Este artículo está actualmente vigente desde 29 de diciembre de 1978. Se encuentra en vigor.\n\
             Contenido:\n\
             Texto principal del artículo.\n\n1. Primer apartado."
        );
    }
}
