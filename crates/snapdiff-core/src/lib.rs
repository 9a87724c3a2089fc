//! Snapshot summarizing, diffing and rule evaluation

mod config;
mod diff;
mod rules;
mod selector;
mod summary;
mod types;
mod violations;

pub use config::{
    ConfigError, Integrations, PagerDutyConfig, PagerDutyService, ReportConfig, RollbarConfig,
    ServiceConfig, ServiceIntegrations, CONFIG_FILE_NAME,
};
pub use diff::{diff_summaries, DiagramDiff, Diff, MetricDelta, ServiceDelta};
pub use rules::{AttributeOp, Rule, RuleKind, RuleSet, RuleSpec};
pub use selector::{repo_tag_of, select_baseline, tag_query, REPO_TAG_KEY};
pub use summary::{summarize, DiagramEdge, DiagramPayload, SnapshotPayload};
pub use types::{edge_id, Exemplar, ServiceDiagram, ServiceStats, Snapshot, Summary, EDGE_SEPARATOR};
pub use violations::{evaluate, RuleMatch, ServiceViolations, Violation, ViolationReport};
