use snapdiff_core::{DiagramEdge, DiagramPayload, Exemplar, SnapshotPayload};
use std::collections::BTreeMap;

pub fn exemplar(service: &str, span_name: &str, duration_micros: u64, is_error: bool) -> Exemplar {
    Exemplar {
        span_name: span_name.to_string(),
        service: service.to_string(),
        duration_micros,
        is_error,
        attributes: BTreeMap::new(),
    }
}

pub fn with_attr(mut exemplar: Exemplar, key: &str, value: &str) -> Exemplar {
    exemplar
        .attributes
        .insert(key.to_string(), serde_json::Value::String(value.to_string()));
    exemplar
}

pub fn stats(id: &str, exemplars: Vec<Exemplar>) -> SnapshotPayload {
    SnapshotPayload {
        id: id.to_string(),
        query: String::new(),
        exemplars,
    }
}

pub fn diagram(id: &str, edges: &[(&str, &str)]) -> DiagramPayload {
    DiagramPayload {
        id: id.to_string(),
        nodes: vec![],
        edges: edges
            .iter()
            .map(|(from, to)| DiagramEdge {
                from: from.to_string(),
                to: to.to_string(),
            })
            .collect(),
    }
}

/// Twenty spans for `service` with `errors` of them failing
pub fn spans(service: &str, errors: usize, duration_micros: u64) -> Vec<Exemplar> {
    (0..20)
        .map(|i| exemplar(service, "GET /", duration_micros, i < errors))
        .collect()
}

/// Response body the backend sends for snapshot statistics
pub fn stats_body(payload: &SnapshotPayload) -> Vec<u8> {
    serde_json::to_vec(&serde_json::json!({
        "data": {
            "id": payload.id,
            "attributes": {"query": payload.query, "exemplars": payload.exemplars}
        }
    }))
    .unwrap()
}

/// Response body the backend sends for a service diagram
pub fn diagram_body(payload: &DiagramPayload) -> Vec<u8> {
    serde_json::to_vec(&serde_json::json!({
        "data": {
            "id": payload.id,
            "attributes": {"nodes": payload.nodes, "edges": payload.edges}
        }
    }))
    .unwrap()
}
