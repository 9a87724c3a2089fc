//! Summary builder: normalizes raw snapshot payloads into a [`Summary`]

use crate::types::{edge_id, Exemplar, ServiceDiagram, ServiceStats, Summary};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Validated statistics payload for one snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotPayload {
    pub id: String,
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub exemplars: Vec<Exemplar>,
}

/// Directed call between two services
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagramEdge {
    pub from: String,
    pub to: String,
}

/// Validated service diagram payload for one snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagramPayload {
    pub id: String,
    #[serde(default)]
    pub nodes: Vec<String>,
    #[serde(default)]
    pub edges: Vec<DiagramEdge>,
}

#[derive(Default)]
struct Accumulator {
    errors: usize,
    total_micros: u64,
    operations: BTreeSet<String>,
    exemplars: Vec<Exemplar>,
}

/// Build the per-service summary for a snapshot.
///
/// Exemplars keep their payload order within each service. Output only
/// uses ordered collections, so identical inputs serialize identically.
pub fn summarize(stats: &SnapshotPayload, diagram: &DiagramPayload) -> Summary {
    let mut by_service: BTreeMap<&str, Accumulator> = BTreeMap::new();

    for exemplar in &stats.exemplars {
        let acc = by_service.entry(exemplar.service.as_str()).or_default();
        if exemplar.is_error {
            acc.errors += 1;
        }
        acc.total_micros = acc.total_micros.saturating_add(exemplar.duration_micros);
        if !exemplar.span_name.is_empty() {
            acc.operations.insert(exemplar.span_name.clone());
        }
        acc.exemplars.push(exemplar.clone());
    }

    let services = by_service
        .into_iter()
        .map(|(service, acc)| {
            let count = acc.exemplars.len();
            // count is never zero: an entry exists only once an exemplar was pushed
            let stats = ServiceStats {
                error_pct: acc.errors as f64 / count as f64,
                avg_duration_ms: acc.total_micros as f64 / count as f64 / 1000.0,
                span_count: count,
                operations: acc.operations,
                exemplars: acc.exemplars,
            };
            (service.to_string(), stats)
        })
        .collect();

    Summary {
        services,
        diagram: build_diagram(diagram),
    }
}

fn build_diagram(payload: &DiagramPayload) -> ServiceDiagram {
    let mut nodes: BTreeSet<String> = payload.nodes.iter().cloned().collect();
    let mut edges = BTreeSet::new();

    for edge in &payload.edges {
        nodes.insert(edge.from.clone());
        nodes.insert(edge.to.clone());
        edges.insert(edge_id(&edge.from, &edge.to));
    }

    ServiceDiagram { nodes, edges }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exemplar(service: &str, span: &str, micros: u64, is_error: bool) -> Exemplar {
        Exemplar {
            span_name: span.to_string(),
            service: service.to_string(),
            duration_micros: micros,
            is_error,
            attributes: BTreeMap::new(),
        }
    }

    fn sample_payloads() -> (SnapshotPayload, DiagramPayload) {
        let stats = SnapshotPayload {
            id: "snap1".to_string(),
            query: "service IN (\"api\")".to_string(),
            exemplars: vec![
                exemplar("api", "GET /users", 2000, false),
                exemplar("db", "SELECT", 500, false),
                exemplar("api", "GET /users", 4000, true),
                exemplar("api", "POST /users", 3000, false),
                exemplar("api", "GET /health", 1000, false),
            ],
        };
        let diagram = DiagramPayload {
            id: "snap1".to_string(),
            nodes: vec!["api".to_string()],
            edges: vec![DiagramEdge {
                from: "api".to_string(),
                to: "db".to_string(),
            }],
        };
        (stats, diagram)
    }

    #[test]
    fn test_summarize_aggregates_per_service() {
        let (stats, diagram) = sample_payloads();
        let summary = summarize(&stats, &diagram);

        let api = &summary.services["api"];
        assert_eq!(api.span_count, 4);
        assert!((api.error_pct - 0.25).abs() < 1e-12);
        assert!((api.avg_duration_ms - 2.5).abs() < 1e-12);
        assert_eq!(api.operations.len(), 3);
        assert_eq!(api.exemplars[1].duration_micros, 4000);

        let db = &summary.services["db"];
        assert_eq!(db.error_pct, 0.0);
        assert!((db.avg_duration_ms - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_summarize_diagram_includes_edge_endpoints() {
        let (stats, diagram) = sample_payloads();
        let summary = summarize(&stats, &diagram);

        assert!(summary.diagram.nodes.contains("db"));
        assert!(summary.diagram.edges.contains("api>db"));
    }

    #[test]
    fn test_summarize_is_idempotent() {
        let (stats, diagram) = sample_payloads();
        let first = serde_json::to_vec(&summarize(&stats, &diagram)).unwrap();
        let second = serde_json::to_vec(&summarize(&stats, &diagram)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_summarize_empty_payload() {
        let stats = SnapshotPayload {
            id: "empty".to_string(),
            query: String::new(),
            exemplars: vec![],
        };
        let diagram = DiagramPayload {
            id: "empty".to_string(),
            nodes: vec![],
            edges: vec![],
        };
        let summary = summarize(&stats, &diagram);
        assert!(summary.services.is_empty());
        assert!(summary.diagram.nodes.is_empty());
    }
}
