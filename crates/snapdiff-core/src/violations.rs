//! Rule evaluation against an "after" summary

use crate::rules::{AttributeOp, Rule, RuleKind, RuleSet};
use crate::types::{edge_id, Exemplar, Summary};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Something a rule matched
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleMatch {
    Exemplar(Exemplar),
    Edge(String),
}

/// A rule that matched at least once for a service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    pub rule: Rule,
    pub matches: Vec<RuleMatch>,
    pub msg: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceViolations {
    pub service: String,
    pub violations: Vec<Violation>,
}

/// Evaluation result for every service of a summary
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ViolationReport {
    pub services: BTreeMap<String, ServiceViolations>,
    pub has_violations: bool,
}

impl ViolationReport {
    pub fn for_service(&self, service: &str) -> &[Violation] {
        self.services
            .get(service)
            .map(|s| s.violations.as_slice())
            .unwrap_or(&[])
    }

    pub fn total(&self) -> usize {
        self.services.values().map(|s| s.violations.len()).sum()
    }
}

/// Evaluate configured rules against every service in `after`.
///
/// Every service gets an entry, with an empty list when nothing matched.
pub fn evaluate(after: &Summary, rules: &RuleSet) -> ViolationReport {
    let mut report = ViolationReport::default();

    for service in after.service_names() {
        let violations: Vec<Violation> = rules
            .rules_for(service)
            .into_iter()
            .filter_map(|rule| check_rule(after, service, rule))
            .collect();

        report.has_violations |= !violations.is_empty();
        report.services.insert(
            service.to_string(),
            ServiceViolations {
                service: service.to_string(),
                violations,
            },
        );
    }

    report
}

fn check_rule(after: &Summary, service: &str, rule: Rule) -> Option<Violation> {
    let matches = match &rule.kind {
        RuleKind::SpanAttribute { key, op } => after
            .services
            .get(service)
            .map(|stats| {
                stats
                    .exemplars
                    .iter()
                    .filter(|e| attribute_matches(e, key, op))
                    .cloned()
                    .map(RuleMatch::Exemplar)
                    .collect()
            })
            .unwrap_or_default(),
        RuleKind::Connection { target } => {
            if after.diagram.has_edge(service, target) {
                vec![RuleMatch::Edge(edge_id(service, target))]
            } else {
                Vec::new()
            }
        }
    };

    if matches.is_empty() {
        return None;
    }

    let msg = match &rule.kind {
        RuleKind::SpanAttribute { .. } => format!(
            "Found {} spans that violate the rule: {}",
            matches.len(),
            rule.name
        ),
        RuleKind::Connection { .. } => rule.name.clone(),
    };

    Some(Violation { rule, matches, msg })
}

fn attribute_matches(exemplar: &Exemplar, key: &str, op: &AttributeOp) -> bool {
    match op {
        AttributeOp::Equals(expected) => exemplar.attribute_str(key) == Some(expected.as_str()),
        AttributeOp::Unset => !exemplar.attributes.contains_key(key),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::RuleSpec;
    use crate::types::{ServiceDiagram, ServiceStats};
    use std::collections::BTreeSet;

    fn exemplar(service: &str, attrs: serde_json::Value) -> Exemplar {
        Exemplar {
            span_name: "op".to_string(),
            service: service.to_string(),
            duration_micros: 100,
            is_error: false,
            attributes: serde_json::from_value(attrs).unwrap(),
        }
    }

    fn after_summary() -> Summary {
        let mut services = BTreeMap::new();
        services.insert(
            "X".to_string(),
            ServiceStats {
                error_pct: 0.0,
                avg_duration_ms: 0.1,
                span_count: 3,
                operations: BTreeSet::new(),
                exemplars: vec![
                    exemplar("X", serde_json::json!({"http.status_code": "500"})),
                    exemplar("X", serde_json::json!({"http.status_code": 500, "user.id": "u1"})),
                    exemplar("X", serde_json::json!({"http.status_code": "200", "user.id": "u2"})),
                ],
            },
        );
        services.insert(
            "Y".to_string(),
            ServiceStats {
                error_pct: 0.0,
                avg_duration_ms: 0.1,
                span_count: 0,
                operations: BTreeSet::new(),
                exemplars: vec![],
            },
        );
        Summary {
            services,
            diagram: ServiceDiagram {
                nodes: ["X", "Y", "Z"].iter().map(|s| s.to_string()).collect(),
                edges: ["X>Y", "X>Z"].iter().map(|s| s.to_string()).collect(),
            },
        }
    }

    fn spec(json: serde_json::Value) -> RuleSpec {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_connection_violation() {
        let mut rules = RuleSet::new();
        rules.insert(
            "X",
            spec(serde_json::json!({"type": "connection", "value": "Z", "name": "must not call Z"})),
        );

        let report = evaluate(&after_summary(), &rules);
        assert!(report.has_violations);
        let violations = report.for_service("X");
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].msg, "must not call Z");
        assert_eq!(violations[0].matches, vec![RuleMatch::Edge("X>Z".to_string())]);
    }

    #[test]
    fn test_attribute_equals_counts_matches() {
        let mut rules = RuleSet::new();
        rules.insert(
            "X",
            spec(serde_json::json!({
                "type": "span.attributes", "op": "equals",
                "key": "http.status_code", "value": 500, "name": "no 500s"
            })),
        );

        // the rule value 500 compares as "500"; a numeric attribute 500 does not match
        let report = evaluate(&after_summary(), &rules);
        let violations = report.for_service("X");
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].matches.len(), 1);
        assert_eq!(
            violations[0].msg,
            "Found 1 spans that violate the rule: no 500s"
        );
    }

    #[test]
    fn test_attribute_unset() {
        let mut rules = RuleSet::new();
        rules.insert(
            "X",
            spec(serde_json::json!({
                "type": "span.attributes", "op": "unset",
                "key": "user.id", "name": "user id required"
            })),
        );

        let report = evaluate(&after_summary(), &rules);
        assert_eq!(report.for_service("X")[0].matches.len(), 1);
    }

    #[test]
    fn test_services_without_rules_have_empty_entries() {
        let report = evaluate(&after_summary(), &RuleSet::new());
        assert!(!report.has_violations);
        assert_eq!(report.services.len(), 3);
        assert!(report.services["Y"].violations.is_empty());
        assert!(report.services["Z"].violations.is_empty());
    }

    #[test]
    fn test_non_matching_rules_yield_no_violations() {
        let mut rules = RuleSet::new();
        rules.insert(
            "Y",
            spec(serde_json::json!({"type": "connection", "value": "X", "name": "no calls back"})),
        );
        let report = evaluate(&after_summary(), &rules);
        assert!(!report.has_violations);
        assert!(report.for_service("Y").is_empty());
    }

    #[test]
    fn test_malformed_rule_never_reported() {
        let mut rules = RuleSet::new();
        rules.insert("X", spec(serde_json::json!({"type": "connection", "value": "Z"})));
        rules.insert("X", spec(serde_json::json!({"value": "Z", "name": "untyped"})));

        let report = evaluate(&after_summary(), &rules);
        assert!(!report.has_violations);
        assert_eq!(report.total(), 0);
    }
}
