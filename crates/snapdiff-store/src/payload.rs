//! Parsing and validation of backend response bodies

use crate::error::StoreError;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use snapdiff_core::{DiagramEdge, DiagramPayload, Exemplar, Snapshot, SnapshotPayload};

#[derive(Deserialize)]
struct Envelope<T> {
    data: T,
}

#[derive(Deserialize)]
struct Resource<A> {
    id: String,
    attributes: Option<A>,
}

#[derive(Deserialize)]
struct SnapshotAttributes {
    #[serde(default)]
    query: String,
    #[serde(default, rename = "created-at")]
    created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    exemplars: Vec<Exemplar>,
}

#[derive(Deserialize)]
struct DiagramAttributes {
    #[serde(default)]
    nodes: Vec<String>,
    #[serde(default)]
    edges: Vec<DiagramEdge>,
}

fn decode<T: for<'de> Deserialize<'de>>(
    body: &[u8],
    kind: &'static str,
    snapshot_id: &str,
) -> Result<T, StoreError> {
    serde_json::from_slice(body)
        .map_err(|e| StoreError::malformed(kind, snapshot_id, e.to_string()))
}

fn check_id(kind: &'static str, expected: &str, got: &str) -> Result<(), StoreError> {
    if expected != got {
        return Err(StoreError::malformed(
            kind,
            expected,
            format!("response is for snapshot {}", got),
        ));
    }
    Ok(())
}

/// Parse a snapshot statistics response for `snapshot_id`
pub fn parse_snapshot(body: &[u8], snapshot_id: &str) -> Result<SnapshotPayload, StoreError> {
    const KIND: &str = "snapshot";
    let envelope: Envelope<Resource<SnapshotAttributes>> = decode(body, KIND, snapshot_id)?;
    let resource = envelope.data;
    check_id(KIND, snapshot_id, &resource.id)?;

    let attributes = resource
        .attributes
        .ok_or_else(|| StoreError::malformed(KIND, snapshot_id, "missing attributes"))?;

    if let Some(bad) = attributes.exemplars.iter().position(|e| e.service.is_empty()) {
        return Err(StoreError::malformed(
            KIND,
            snapshot_id,
            format!("exemplar {} has no service", bad),
        ));
    }

    Ok(SnapshotPayload {
        id: resource.id,
        query: attributes.query,
        exemplars: attributes.exemplars,
    })
}

/// Parse a service diagram response for `snapshot_id`
pub fn parse_diagram(body: &[u8], snapshot_id: &str) -> Result<DiagramPayload, StoreError> {
    const KIND: &str = "diagram";
    let envelope: Envelope<Resource<DiagramAttributes>> = decode(body, KIND, snapshot_id)?;
    let resource = envelope.data;
    check_id(KIND, snapshot_id, &resource.id)?;

    let attributes = resource
        .attributes
        .ok_or_else(|| StoreError::malformed(KIND, snapshot_id, "missing attributes"))?;

    if attributes.nodes.iter().any(String::is_empty) {
        return Err(StoreError::malformed(KIND, snapshot_id, "node with empty name"));
    }
    if let Some(edge) = attributes
        .edges
        .iter()
        .find(|e| e.from.is_empty() || e.to.is_empty())
    {
        return Err(StoreError::malformed(
            KIND,
            snapshot_id,
            format!("edge with empty endpoint: {:?} -> {:?}", edge.from, edge.to),
        ));
    }

    Ok(DiagramPayload {
        id: resource.id,
        nodes: attributes.nodes,
        edges: attributes.edges,
    })
}

/// Parse the snapshot listing for a project, keeping backend order
pub fn parse_snapshot_list(body: &[u8], project: &str) -> Result<Vec<Snapshot>, StoreError> {
    let envelope: Envelope<Vec<Resource<SnapshotAttributes>>> =
        decode(body, "snapshot list", project)?;
    Ok(envelope
        .data
        .into_iter()
        .map(|r| {
            let (query, created_at) = r
                .attributes
                .map(|a| (a.query, a.created_at))
                .unwrap_or_default();
            Snapshot {
                id: r.id,
                query,
                created_at,
            }
        })
        .collect())
}

/// Parse the id out of a snapshot creation response
pub fn parse_created_id(body: &[u8], project: &str) -> Result<String, StoreError> {
    let envelope: Envelope<Resource<serde_json::Value>> = decode(body, "created snapshot", project)?;
    if envelope.data.id.is_empty() {
        return Err(StoreError::malformed("created snapshot", project, "empty id"));
    }
    Ok(envelope.data.id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_snapshot() {
        let body = serde_json::json!({
            "data": {
                "id": "snap1",
                "attributes": {
                    "query": "service IN (\"api\")",
                    "exemplars": [
                        {"span_name": "GET /", "service": "api", "duration_micros": 1500,
                         "is_error": true, "attributes": {"http.status_code": "500"}}
                    ]
                }
            }
        });
        let payload = parse_snapshot(&serde_json::to_vec(&body).unwrap(), "snap1").unwrap();
        assert_eq!(payload.exemplars.len(), 1);
        assert!(payload.exemplars[0].is_error);
    }

    #[test]
    fn test_parse_snapshot_rejects_wrong_id() {
        let body = br#"{"data": {"id": "other", "attributes": {}}}"#;
        let err = parse_snapshot(body, "snap1").unwrap_err();
        assert!(matches!(err, StoreError::Malformed { .. }));
    }

    #[test]
    fn test_parse_snapshot_rejects_exemplar_without_service() {
        let body = br#"{"data": {"id": "snap1", "attributes": {"exemplars": [{"service": ""}]}}}"#;
        assert!(parse_snapshot(body, "snap1").is_err());
    }

    #[test]
    fn test_parse_snapshot_rejects_garbage() {
        assert!(parse_snapshot(b"<html>rate limited</html>", "snap1").is_err());
        assert!(parse_snapshot(br#"{"data": {"id": "snap1"}}"#, "snap1").is_err());
    }

    #[test]
    fn test_parse_diagram() {
        let body = br#"{"data": {"id": "snap1", "attributes": {
            "nodes": ["api", "db"],
            "edges": [{"from": "api", "to": "db"}]
        }}}"#;
        let payload = parse_diagram(body, "snap1").unwrap();
        assert_eq!(payload.nodes, vec!["api", "db"]);
        assert_eq!(payload.edges[0].to, "db");
    }

    #[test]
    fn test_parse_diagram_rejects_empty_endpoint() {
        let body = br#"{"data": {"id": "snap1", "attributes": {
            "edges": [{"from": "api", "to": ""}]
        }}}"#;
        assert!(parse_diagram(body, "snap1").is_err());
    }

    #[test]
    fn test_parse_snapshot_list_keeps_order() {
        let body = br#"{"data": [
            {"id": "a", "attributes": {"query": "q1", "created-at": "2026-01-01T00:00:00Z"}},
            {"id": "b", "attributes": {"query": "q2"}},
            {"id": "c"}
        ]}"#;
        let list = parse_snapshot_list(body, "proj").unwrap();
        let ids: Vec<_> = list.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert!(list[0].created_at.is_some());
        assert_eq!(list[1].query, "q2");
    }

    #[test]
    fn test_parse_created_id() {
        let body = br#"{"data": {"id": "new123", "type": "snapshot"}}"#;
        assert_eq!(parse_created_id(body, "proj").unwrap(), "new123");
    }
}
