//! Dictionary Preloader (C4): seeds every Materia, Departamento, and Rango
//! node before any document worker starts, so concurrent ingest only ever
//! creates relationships to these nodes, never the nodes themselves.

use boe_core::{Departamento, DictionaryStats, IngestError, Materia, Rango};
use boe_graph::{GraphAdapter, NodeRecord};
use serde_json::json;
use tracing::info;

/// Graph id for a Materia node, stable across runs.
#[must_use]
pub fn materia_id(materia: Materia) -> String {
    format!("materia:{}", materia.code())
}

#[must_use]
pub fn departamento_id(departamento: Departamento) -> String {
    format!("departamento:{}", departamento.code())
}

#[must_use]
pub fn rango_id(rango: Rango) -> String {
    format!("rango:{}", rango.code())
}

/// Seed the three closed taxonomy classes, synchronously and
/// single-threaded, once per pipeline invocation.
pub fn preload(graph: &dyn GraphAdapter) -> Result<DictionaryStats, IngestError> {
    let mut stats = DictionaryStats::new();

    let materias: Vec<NodeRecord> = Materia::ALL
        .iter()
        .map(|&m| NodeRecord::new(materia_id(m), vec!["Materia".to_string()], json!({"id": materia_id(m), "code": m.code(), "label": m.label()})))
        .collect();
    graph.batch_merge_nodes(&materias).map_err(|e| IngestError::GraphWriteFailure(e.to_string()))?;
    stats.insert("materias".to_string(), materias.len());

    let departamentos: Vec<NodeRecord> = Departamento::ALL
        .iter()
        .map(|&d| {
            NodeRecord::new(departamento_id(d), vec!["Departamento".to_string()], json!({"id": departamento_id(d), "code": d.code(), "label": d.label()}))
        })
        .collect();
    graph.batch_merge_nodes(&departamentos).map_err(|e| IngestError::GraphWriteFailure(e.to_string()))?;
    stats.insert("departamentos".to_string(), departamentos.len());

    let rangos: Vec<NodeRecord> = Rango::ALL
        .iter()
        .map(|&r| NodeRecord::new(rango_id(r), vec!["Rango".to_string()], json!({"id": rango_id(r), "code": r.code(), "label": r.label()})))
        .collect();
    graph.batch_merge_nodes(&rangos).map_err(|e| IngestError::GraphWriteFailure(e.to_string()))?;
    stats.insert("rangos".to_string(), rangos.len());

    info!(materias = stats["materias"], departamentos = stats["departamentos"], rangos = stats["rangos"], "dictionary preloaded");
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use boe_graph::InMemoryGraphAdapter;

    #[test]
    fn preload_is_idempotent_and_reports_all_classes() {
        let graph = InMemoryGraphAdapter::new();
        let first = preload(&graph).unwrap();
        let second = preload(&graph).unwrap();
        assert_eq!(first, second);
        assert_eq!(first["materias"], Materia::ALL.len());
        assert_eq!(first["departamentos"], Departamento::ALL.len());
        assert_eq!(first["rangos"], Rango::ALL.len());
        assert!(graph.get_article_by_id(&materia_id(Materia::DerechoCivil)).unwrap().is_some());
    }
}
