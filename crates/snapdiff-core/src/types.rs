//! Core types for snapshot analysis

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Separator between source and destination in an edge id (`"A>B"`)
pub const EDGE_SEPARATOR: char = '>';

/// Build the edge id for a directed call from `from` to `to`
pub fn edge_id(from: &str, to: &str) -> String {
    format!("{}{}{}", from, EDGE_SEPARATOR, to)
}

/// A point-in-time capture of trace statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub id: String,
    /// Filter expression the backend used to produce the snapshot
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// A sampled span attached to a service's statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exemplar {
    #[serde(default)]
    pub span_name: String,
    pub service: String,
    #[serde(default)]
    pub duration_micros: u64,
    #[serde(default)]
    pub is_error: bool,
    #[serde(default)]
    pub attributes: BTreeMap<String, serde_json::Value>,
}

impl Exemplar {
    /// Attribute value when it is a JSON string
    pub fn attribute_str(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).and_then(serde_json::Value::as_str)
    }
}

/// Aggregated statistics for a single service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceStats {
    /// Share of erroring spans in [0, 1]
    pub error_pct: f64,
    pub avg_duration_ms: f64,
    pub span_count: usize,
    #[serde(default)]
    pub operations: BTreeSet<String>,
    #[serde(default)]
    pub exemplars: Vec<Exemplar>,
}

/// Service dependency graph observed in a snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceDiagram {
    pub nodes: BTreeSet<String>,
    /// Edge ids, see [`edge_id`]
    pub edges: BTreeSet<String>,
}

impl ServiceDiagram {
    pub fn has_edge(&self, from: &str, to: &str) -> bool {
        self.edges.contains(&edge_id(from, to))
    }

    /// Split every edge id back into its endpoints
    pub fn edge_pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.edges
            .iter()
            .filter_map(|e| e.split_once(EDGE_SEPARATOR))
    }
}

/// Per-service statistics plus the service diagram for one snapshot
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub services: BTreeMap<String, ServiceStats>,
    pub diagram: ServiceDiagram,
}

impl Summary {
    /// Services named by either the statistics or the diagram
    pub fn service_names(&self) -> BTreeSet<&str> {
        self.services
            .keys()
            .map(String::as_str)
            .chain(self.diagram.nodes.iter().map(String::as_str))
            .collect()
    }
}
