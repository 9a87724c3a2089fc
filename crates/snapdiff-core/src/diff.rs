//! Diff engine: structural and numeric comparison of two summaries

use crate::types::{ServiceStats, Summary};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Directional change of one metric (after minus before)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricDelta {
    pub delta: f64,
    /// Relative change; `None` when the baseline is exactly zero
    pub pct: Option<f64>,
}

impl MetricDelta {
    pub fn between(before: f64, after: f64) -> Self {
        let delta = after - before;
        let pct = if before == 0.0 {
            None
        } else {
            Some(delta / before)
        };
        Self { delta, pct }
    }
}

/// Metric deltas for a service present in both snapshots
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ServiceDelta {
    pub error_pct: MetricDelta,
    pub avg_duration_ms: MetricDelta,
}

impl ServiceDelta {
    fn between(before: &ServiceStats, after: &ServiceStats) -> Self {
        Self {
            error_pct: MetricDelta::between(before.error_pct, after.error_pct),
            avg_duration_ms: MetricDelta::between(before.avg_duration_ms, after.avg_duration_ms),
        }
    }
}

/// Set differences between two service diagrams
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagramDiff {
    pub added_services: BTreeSet<String>,
    pub deleted_services: BTreeSet<String>,
    pub added_edges: BTreeSet<String>,
    pub deleted_edges: BTreeSet<String>,
}

impl DiagramDiff {
    pub fn is_empty(&self) -> bool {
        self.added_services.is_empty()
            && self.deleted_services.is_empty()
            && self.added_edges.is_empty()
            && self.deleted_edges.is_empty()
    }
}

/// Comparison of an "after" snapshot against its "before" baseline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diff {
    pub before_id: String,
    pub after_id: String,
    /// Numeric deltas, only for services present in both summaries
    pub services: BTreeMap<String, ServiceDelta>,
    pub diagram: DiagramDiff,
}

impl Diff {
    /// True when a snapshot was compared with itself
    pub fn is_single_snapshot(&self) -> bool {
        self.before_id == self.after_id
    }

    pub fn is_added(&self, service: &str) -> bool {
        self.diagram.added_services.contains(service)
    }

    pub fn is_deleted(&self, service: &str) -> bool {
        self.diagram.deleted_services.contains(service)
    }
}

/// Compare `after` against the `before` baseline.
///
/// A service that only exists in `after` gets no numeric entry; it is
/// reported through `added_services` instead.
pub fn diff_summaries(before_id: &str, before: &Summary, after_id: &str, after: &Summary) -> Diff {
    let services = after
        .services
        .iter()
        .filter_map(|(name, after_stats)| {
            before
                .services
                .get(name)
                .map(|before_stats| (name.clone(), ServiceDelta::between(before_stats, after_stats)))
        })
        .collect();

    let diagram = DiagramDiff {
        added_services: difference(&after.diagram.nodes, &before.diagram.nodes),
        deleted_services: difference(&before.diagram.nodes, &after.diagram.nodes),
        added_edges: difference(&after.diagram.edges, &before.diagram.edges),
        deleted_edges: difference(&before.diagram.edges, &after.diagram.edges),
    };

    Diff {
        before_id: before_id.to_string(),
        after_id: after_id.to_string(),
        services,
        diagram,
    }
}

fn difference(left: &BTreeSet<String>, right: &BTreeSet<String>) -> BTreeSet<String> {
    left.difference(right).cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{edge_id, ServiceDiagram};

    fn stats(error_pct: f64, avg_duration_ms: f64) -> ServiceStats {
        ServiceStats {
            error_pct,
            avg_duration_ms,
            span_count: 10,
            operations: BTreeSet::new(),
            exemplars: vec![],
        }
    }

    fn summary(services: &[(&str, f64, f64)], edges: &[(&str, &str)]) -> Summary {
        let mut diagram = ServiceDiagram::default();
        for (name, _, _) in services {
            diagram.nodes.insert(name.to_string());
        }
        for (from, to) in edges {
            diagram.nodes.insert(from.to_string());
            diagram.nodes.insert(to.to_string());
            diagram.edges.insert(edge_id(from, to));
        }
        Summary {
            services: services
                .iter()
                .map(|(name, err, lat)| (name.to_string(), stats(*err, *lat)))
                .collect(),
            diagram,
        }
    }

    #[test]
    fn test_metric_delta_zero_baseline_has_no_pct() {
        let d = MetricDelta::between(0.0, 5.0);
        assert_eq!(d.delta, 5.0);
        assert_eq!(d.pct, None);

        let zero = MetricDelta::between(0.0, 0.0);
        assert_eq!(zero.delta, 0.0);
        assert_eq!(zero.pct, None);
    }

    #[test]
    fn test_error_pct_doubles() {
        let before = summary(&[("serviceX", 0.05, 10.0)], &[]);
        let after = summary(&[("serviceX", 0.10, 10.0)], &[]);
        let diff = diff_summaries("a", &before, "b", &after);

        let delta = diff.services["serviceX"].error_pct;
        assert!((delta.delta - 0.05).abs() < 1e-12);
        assert!((delta.pct.unwrap() - 1.0).abs() < 1e-12);
        assert_eq!(diff.services["serviceX"].avg_duration_ms.delta, 0.0);
        assert_eq!(diff.services["serviceX"].avg_duration_ms.pct, Some(0.0));
    }

    #[test]
    fn test_added_edge() {
        let before = summary(&[("X", 0.0, 1.0)], &[("X", "Y")]);
        let after = summary(&[("X", 0.0, 1.0)], &[("X", "Y"), ("X", "Z")]);
        let diff = diff_summaries("a", &before, "b", &after);

        assert_eq!(
            diff.diagram.added_edges,
            ["X>Z".to_string()].into_iter().collect()
        );
        assert!(diff.diagram.deleted_edges.is_empty());
        assert!(diff.is_added("Z"));
        assert!(!diff.is_deleted("Y"));
    }

    #[test]
    fn test_structural_diff_is_complementary() {
        let a = summary(&[("X", 0.0, 1.0), ("old", 0.0, 1.0)], &[("X", "Y")]);
        let b = summary(&[("X", 0.0, 1.0), ("new", 0.0, 1.0)], &[("X", "Z")]);

        let forward = diff_summaries("a", &a, "b", &b);
        let backward = diff_summaries("b", &b, "a", &a);

        assert_eq!(forward.diagram.added_services, backward.diagram.deleted_services);
        assert_eq!(forward.diagram.deleted_services, backward.diagram.added_services);
        assert_eq!(forward.diagram.added_edges, backward.diagram.deleted_edges);
    }

    #[test]
    fn test_new_service_has_no_numeric_entry() {
        let before = summary(&[("X", 0.1, 1.0)], &[]);
        let after = summary(&[("X", 0.1, 1.0), ("fresh", 0.5, 9.0)], &[]);
        let diff = diff_summaries("a", &before, "b", &after);

        assert!(diff.services.contains_key("X"));
        assert!(!diff.services.contains_key("fresh"));
        assert!(diff.is_added("fresh"));
    }

    #[test]
    fn test_same_snapshot_is_trivial() {
        let s = summary(
            &[("X", 0.2, 30.0), ("Y", 0.0, 0.0)],
            &[("X", "Y")],
        );
        let diff = diff_summaries("same", &s, "same", &s);

        assert!(diff.is_single_snapshot());
        assert!(diff.diagram.is_empty());
        for delta in diff.services.values() {
            assert_eq!(delta.error_pct.delta, 0.0);
            assert_eq!(delta.avg_duration_ms.delta, 0.0);
        }
        assert_eq!(diff.services["Y"].error_pct.pct, None);
    }
}
