//! Markdown and DOT rendering of a snapshot comparison

use crate::integrations::{DeployStats, OnCallSection};
use petgraph::dot::{Config, Dot};
use petgraph::graph::{DiGraph, NodeIndex};
use snapdiff_core::{
    Diff, RollbarConfig, ServiceDelta, ServiceDiagram, ServiceStats, Summary, Violation,
    ViolationReport,
};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt::Write;

const UP: &str = ":chart_with_upwards_trend:";
const DOWN: &str = ":chart_with_downwards_trend:";

/// One row of the service table
#[derive(Debug, Clone)]
pub struct ServiceRow {
    pub service: String,
    /// Missing for services only seen in the diagram
    pub stats: Option<ServiceStats>,
    pub delta: Option<ServiceDelta>,
    pub is_new: bool,
    pub is_deleted: bool,
    pub violations: Vec<Violation>,
    pub on_call: Option<OnCallSection>,
}

#[derive(Debug, Clone)]
pub struct RollbarSection {
    pub config: RollbarConfig,
    pub result: Result<DeployStats, String>,
}

/// Everything the markdown report shows
#[derive(Debug, Clone)]
pub struct ReportModel {
    pub project: String,
    pub before_id: String,
    pub after_id: String,
    /// False when a snapshot is reported on its own
    pub compare: bool,
    pub rows: Vec<ServiceRow>,
    pub new_services: usize,
    pub deleted_services: Vec<String>,
    pub added_edges: Vec<String>,
    pub deleted_edges: Vec<String>,
    pub rollbar: Option<RollbarSection>,
}

impl ReportModel {
    pub fn build(
        project: &str,
        after: &Summary,
        diff: &Diff,
        violations: &ViolationReport,
        filter: &ServiceFilter,
    ) -> Self {
        let rows = after
            .service_names()
            .into_iter()
            .filter(|s| filter.allows(s))
            .map(|service| ServiceRow {
                service: service.to_string(),
                stats: after.services.get(service).cloned(),
                delta: diff.services.get(service).cloned(),
                is_new: diff.is_added(service),
                is_deleted: diff.is_deleted(service),
                violations: violations.for_service(service).to_vec(),
                on_call: None,
            })
            .collect();

        Self {
            project: project.to_string(),
            before_id: diff.before_id.clone(),
            after_id: diff.after_id.clone(),
            compare: !diff.is_single_snapshot(),
            rows,
            new_services: diff.diagram.added_services.len(),
            deleted_services: diff.diagram.deleted_services.iter().cloned().collect(),
            added_edges: diff.diagram.added_edges.iter().cloned().collect(),
            deleted_edges: diff.diagram.deleted_edges.iter().cloned().collect(),
            rollbar: None,
        }
    }

    pub fn set_on_call(&mut self, mut sections: BTreeMap<String, OnCallSection>) {
        for row in &mut self.rows {
            row.on_call = sections.remove(&row.service);
        }
    }

    fn has_on_call(&self) -> bool {
        self.rows.iter().any(|r| r.on_call.is_some())
    }
}

/// Comma-separated list of services to show; empty shows everything
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ServiceFilter {
    services: BTreeSet<String>,
}

impl ServiceFilter {
    pub fn parse(raw: Option<&str>) -> Self {
        let services = raw
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect();
        Self { services }
    }

    pub fn allows(&self, service: &str) -> bool {
        self.services.is_empty() || self.services.contains(service)
    }
}

fn with_trend(value: String, pct: Option<f64>) -> String {
    match pct.filter(|p| *p != 0.0 && p.is_finite()) {
        Some(pct) => {
            let change = pct * 100.0;
            let (icon, sign) = if change < 0.0 { (DOWN, "") } else { (UP, "+") };
            format!("{} {} ({}{:.2}%)", icon, value, sign, change)
        }
        None => value,
    }
}

pub fn format_error_pct(stats: Option<&ServiceStats>, delta: Option<&ServiceDelta>) -> String {
    let Some(stats) = stats else {
        return ":question:".to_string();
    };
    if stats.error_pct == 0.0 {
        return "0%".to_string();
    }
    with_trend(
        format!("{:.2}%", stats.error_pct * 100.0),
        delta.and_then(|d| d.error_pct.pct),
    )
}

pub fn format_latency(stats: Option<&ServiceStats>, delta: Option<&ServiceDelta>) -> String {
    let Some(stats) = stats else {
        return ":question:".to_string();
    };
    if stats.avg_duration_ms == 0.0 {
        return "0ms".to_string();
    }
    with_trend(
        format!("{:.2}ms", stats.avg_duration_ms),
        delta.and_then(|d| d.avg_duration_ms.pct),
    )
}

pub fn snapshot_link(project: &str, snapshot_id: &str) -> String {
    format!(
        "https://app.lightstep.com/{}/explorer?snapshot_id={}",
        project, snapshot_id
    )
}

/// Link into the explorer filtered on one operation of a service
pub fn operation_link(project: &str, snapshot_id: &str, service: &str, operation: &str) -> String {
    match reqwest::Url::parse(&snapshot_link(project, snapshot_id)) {
        Ok(mut url) => {
            url.query_pairs_mut()
                .append_pair("selected_node_id", service)
                .append_pair("filter[0][type]", "built-in")
                .append_pair("filter[0][key]", "operation")
                .append_pair("filter[0][value]", operation);
            format!("<a href=\"{}\">{}</a>", url, operation)
        }
        Err(_) => operation.to_string(),
    }
}

pub fn on_call_cell(section: Option<&OnCallSection>) -> String {
    match section {
        Some(OnCallSection::Found(on_call)) => format!(
            "<a href=\"{}\">{}</a>",
            on_call.service_url,
            on_call.users.join(", ")
        ),
        Some(OnCallSection::Error(_)) => ":exclamation: API Error".to_string(),
        None => ":question:".to_string(),
    }
}

pub fn rollbar_cell(section: &RollbarSection) -> String {
    let url = format!(
        "https://rollbar.com/{}/{}/versions/",
        section.config.account, section.config.project
    );
    match &section.result {
        Ok(DeployStats {
            new_items: Some(new),
            ..
        }) => format!(
            "[`{}` new errors]({}) since last deploy",
            new.errors + new.critical,
            url
        ),
        Ok(_) => ":question_mark: Could not find Rollbar error information".to_string(),
        Err(_) => ":exclamation: Problem retrieving error information from Rollbar".to_string(),
    }
}

fn plural(n: usize, word: &str) -> String {
    if n == 1 {
        format!("{} {}", n, word)
    } else {
        format!("{} {}s", n, word)
    }
}

fn service_table(model: &ReportModel) -> String {
    let on_call = model.has_on_call();
    let mut out = String::new();

    let _ = write!(out, "| Service | Operations | Avg latency | Error % |");
    if on_call {
        let _ = write!(out, " On-call |");
    }
    let _ = writeln!(out, " Violations |");
    let _ = write!(out, "|---|---|---|---|");
    if on_call {
        let _ = write!(out, "---|");
    }
    let _ = writeln!(out, "---|");

    for row in &model.rows {
        let mut name = format!("**{}**", row.service);
        if row.is_new {
            name.push_str(" :new:");
        }
        if row.is_deleted {
            name.push_str(" :wastebasket:");
        }
        let operations = row
            .stats
            .as_ref()
            .map(|s| {
                s.operations
                    .iter()
                    .map(|op| operation_link(&model.project, &model.after_id, &row.service, op))
                    .collect::<Vec<_>>()
                    .join("<br>")
            })
            .unwrap_or_default();
        let violations = if row.violations.is_empty() {
            ":white_check_mark:".to_string()
        } else {
            format!(":warning: {}", row.violations.len())
        };

        let _ = write!(
            out,
            "| {} | {} | {} | {} |",
            name,
            operations,
            format_latency(row.stats.as_ref(), row.delta.as_ref()),
            format_error_pct(row.stats.as_ref(), row.delta.as_ref()),
        );
        if on_call {
            let _ = write!(out, " {} |", on_call_cell(row.on_call.as_ref()));
        }
        let _ = writeln!(out, " {} |", violations);
    }
    out
}

/// Render the report as GitHub-flavored markdown
pub fn render_markdown(model: &ReportModel) -> String {
    let mut sections = Vec::new();

    let after = format!(
        "[`{}`]({})",
        model.after_id,
        snapshot_link(&model.project, &model.after_id)
    );
    if model.compare {
        let before = format!(
            "[`{}`]({})",
            model.before_id,
            snapshot_link(&model.project, &model.before_id)
        );
        sections.push(format!(
            "## :mag: Snapshot comparison\n\nSnapshot {} compared with {}\n\n\
             :new: {} | :wastebasket: {}",
            after,
            before,
            plural(model.new_services, "new service"),
            plural(model.deleted_services.len(), "deleted service"),
        ));
    } else {
        sections.push(format!("## :mag: Snapshot summary\n\nSnapshot {}", after));
    }

    if model.rows.is_empty() {
        sections.push("No services found in this snapshot.".to_string());
    } else {
        sections.push(service_table(model));
    }

    let violations: Vec<String> = model
        .rows
        .iter()
        .flat_map(|row| {
            row.violations
                .iter()
                .map(move |v| format!("- **{}**: {}", row.service, v.msg))
        })
        .collect();
    if !violations.is_empty() {
        sections.push(format!("### :warning: Violations\n\n{}", violations.join("\n")));
    }

    if model.compare {
        let mut changes = String::new();
        for service in &model.deleted_services {
            let _ = writeln!(changes, "- Removed service `{}`", service);
        }
        for edge in &model.added_edges {
            let _ = writeln!(changes, "- Added connection `{}`", edge);
        }
        for edge in &model.deleted_edges {
            let _ = writeln!(changes, "- Removed connection `{}`", edge);
        }
        if !changes.is_empty() {
            sections.push(format!("### Service diagram changes\n\n{}", changes.trim_end()));
        }
    }

    if let Some(rollbar) = &model.rollbar {
        sections.push(format!("### Rollbar\n\n{}", rollbar_cell(rollbar)));
    }

    let mut markdown = sections.join("\n\n");
    markdown.push('\n');
    markdown
}

/// Render a service diagram in Graphviz DOT
pub fn render_dot(diagram: &ServiceDiagram) -> String {
    let mut graph: DiGraph<&str, &str> = DiGraph::new();
    let mut indices: HashMap<&str, NodeIndex> = HashMap::new();

    for node in &diagram.nodes {
        indices.insert(node.as_str(), graph.add_node(node.as_str()));
    }
    for (from, to) in diagram.edge_pairs() {
        let from = *indices.entry(from).or_insert_with(|| graph.add_node(from));
        let to = *indices.entry(to).or_insert_with(|| graph.add_node(to));
        graph.add_edge(from, to, "");
    }

    format!("{}", Dot::with_config(&graph, &[Config::EdgeNoLabel]))
}
