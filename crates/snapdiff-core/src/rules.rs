//! Declarative per-service rules

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Rule as written in the config document.
///
/// Nothing is required at this level; [`Rule::from_spec`] decides whether
/// it is usable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleSpec {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub op: Option<String>,
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub value: Option<serde_json::Value>,
}

/// How an attribute rule compares an exemplar's attribute
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttributeOp {
    Equals(String),
    Unset,
}

/// Closed set of rule kinds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RuleKind {
    /// Matches exemplars by attribute
    #[serde(rename = "span.attributes")]
    SpanAttribute { key: String, op: AttributeOp },
    /// Matches when the service calls `target`
    #[serde(rename = "connection")]
    Connection { target: String },
}

/// A well-formed rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    pub name: String,
    pub kind: RuleKind,
}

impl Rule {
    /// Convert a config spec into a rule.
    ///
    /// Returns `None` when `type` or `name` is missing, or when the kind
    /// or operator is not one we know how to evaluate.
    pub fn from_spec(spec: &RuleSpec) -> Option<Self> {
        let name = spec.name.as_deref().filter(|n| !n.is_empty())?;
        let kind = match spec.kind.as_deref()? {
            "span.attributes" => {
                let key = spec.key.clone()?;
                let op = match spec.op.as_deref()? {
                    "equals" => AttributeOp::Equals(value_text(spec.value.as_ref()?)),
                    "unset" => AttributeOp::Unset,
                    _ => return None,
                };
                RuleKind::SpanAttribute { key, op }
            }
            "connection" => RuleKind::Connection {
                target: value_text(spec.value.as_ref()?),
            },
            _ => return None,
        };
        Some(Self {
            name: name.to_string(),
            kind,
        })
    }
}

fn value_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Rules configured per service, in configured order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleSet {
    pub services: BTreeMap<String, Vec<RuleSpec>>,
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, service: &str, spec: RuleSpec) {
        self.services
            .entry(service.to_string())
            .or_default()
            .push(spec);
    }

    /// Well-formed rules for `service`; malformed specs are skipped
    pub fn rules_for(&self, service: &str) -> Vec<Rule> {
        let Some(specs) = self.services.get(service) else {
            return Vec::new();
        };
        specs
            .iter()
            .filter_map(|spec| {
                let rule = Rule::from_spec(spec);
                if rule.is_none() {
                    tracing::debug!(service, ?spec, "skipping malformed rule");
                }
                rule
            })
            .collect()
    }
}
