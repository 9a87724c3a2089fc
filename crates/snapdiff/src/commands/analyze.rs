use crate::cli::AnalyzeArgs;
use crate::github::{CommentTarget, WorkflowPullRequest};
use crate::integrations::{lookup_on_call, Lookups, OnCallSection};
use crate::outputs::ActionOutputs;
use crate::report::{render_dot, render_markdown, ReportModel, RollbarSection, ServiceFilter};
use crate::settings::Settings;
use anyhow::{anyhow, Context};
use snapdiff_core::{diff_summaries, evaluate, select_baseline, summarize, ReportConfig};
use snapdiff_store::{SnapshotCache, SnapshotStore, TraceBackend};

/// Baseline id meaning "pick one automatically"
pub const AUTO_BASELINE: &str = "*";

/// What to analyze
#[derive(Debug, Clone, Default)]
pub struct AnalyzeRequest {
    pub project: String,
    pub snapshot_id: String,
    pub compare_id: Option<String>,
    pub repository: Option<String>,
    pub filter: ServiceFilter,
}

/// Rendered result of an analysis
#[derive(Debug, Clone)]
pub struct Analysis {
    pub before_id: String,
    pub after_id: String,
    pub markdown: String,
    pub dot: String,
    pub has_violations: bool,
}

pub async fn run(
    settings: &Settings,
    args: &AnalyzeArgs,
    outputs: &ActionOutputs,
) -> anyhow::Result<()> {
    super::emit_target(settings, outputs)?;

    let snapshot_id = args
        .snapshot_id
        .clone()
        .filter(|id| !id.trim().is_empty())
        .context("Input lightstep_snapshot_id must be set as an env var or passed as an action input")?;
    let request = AnalyzeRequest {
        project: settings.project.clone(),
        snapshot_id,
        compare_id: args.compare_id.clone().filter(|id| !id.trim().is_empty()),
        repository: args.repository.clone(),
        filter: ServiceFilter::parse(args.service_filter.as_deref()),
    };
    let lookups = Lookups::from_tokens(
        args.pagerduty_token.as_deref(),
        args.rollbar_token.as_deref(),
    );

    let store = settings.store();
    let analysis = analyze(&store, &settings.config, &request, &lookups).await?;
    tracing::info!(
        before = %analysis.before_id,
        after = %analysis.after_id,
        has_violations = analysis.has_violations,
        "report rendered"
    );

    let pull_request = WorkflowPullRequest {
        token: args.github_token.clone(),
        repository: args.repository.clone(),
    };
    let target: Option<&dyn CommentTarget> = if args.disable_comment {
        None
    } else {
        Some(&pull_request)
    };
    publish(&analysis, outputs, target).await
}

/// Write the step outputs, then post the report comment.
///
/// A failed comment fails the step but leaves the outputs in place.
pub async fn publish(
    analysis: &Analysis,
    outputs: &ActionOutputs,
    target: Option<&dyn CommentTarget>,
) -> anyhow::Result<()> {
    outputs.set("lightstep_snapshot_md", &analysis.markdown)?;
    outputs.set("lightstep_snapshot_dotviz", &analysis.dot)?;
    if analysis.has_violations {
        outputs.set("lightstep_snapshot_has_violations", "true")?;
    }

    if let Some(target) = target {
        target
            .comment(&analysis.markdown)
            .await
            .context("failed to post report comment")?;
    }
    Ok(())
}

/// Resolve the baseline id for `request`
pub async fn resolve_baseline<B: TraceBackend, C: SnapshotCache>(
    store: &SnapshotStore<B, C>,
    request: &AnalyzeRequest,
) -> anyhow::Result<String> {
    match request.compare_id.as_deref() {
        None => Ok(request.snapshot_id.clone()),
        Some(AUTO_BASELINE) => {
            let snapshots = store
                .backend()
                .list_snapshots(&request.project)
                .await
                .with_context(|| format!("failed to list snapshots in {}", request.project))?;
            select_baseline(
                &snapshots,
                &request.snapshot_id,
                request.repository.as_deref(),
            )
            .map(|s| s.id.clone())
            .ok_or_else(|| {
                anyhow!(
                    "could not determine a snapshot to compare with: {}",
                    request.snapshot_id
                )
            })
        }
        Some(id) => Ok(id.to_string()),
    }
}

/// Fetch, summarize, diff, evaluate and render one comparison
pub async fn analyze<B: TraceBackend, C: SnapshotCache>(
    store: &SnapshotStore<B, C>,
    config: &ReportConfig,
    request: &AnalyzeRequest,
    lookups: &Lookups,
) -> anyhow::Result<Analysis> {
    let before_id = resolve_baseline(store, request).await?;
    let after_id = request.snapshot_id.as_str();
    if before_id == after_id {
        tracing::info!(snapshot = %after_id, "analyzing snapshot");
    } else {
        tracing::info!(before = %before_id, after = %after_id, "analyzing difference between snapshots");
    }

    let (before, after) = store
        .fetch_pair(&request.project, &before_id, after_id)
        .await
        .context("failed to fetch snapshots")?;

    let before_summary = summarize(&before.stats, &before.diagram);
    let after_summary = summarize(&after.stats, &after.diagram);
    let diff = diff_summaries(&before_id, &before_summary, after_id, &after_summary);
    let violations = evaluate(&after_summary, &config.rule_set());
    tracing::info!(
        services = after_summary.services.len(),
        violations = violations.total(),
        "snapshot analyzed"
    );

    let mut model = ReportModel::build(
        &request.project,
        &after_summary,
        &diff,
        &violations,
        &request.filter,
    );
    add_integrations(&mut model, config, lookups).await;

    Ok(Analysis {
        before_id,
        after_id: after_id.to_string(),
        markdown: render_markdown(&model),
        dot: render_dot(&after_summary.diagram),
        has_violations: violations.has_violations,
    })
}

async fn add_integrations(model: &mut ReportModel, config: &ReportConfig, lookups: &Lookups) {
    let paged: Vec<(String, String)> = model
        .rows
        .iter()
        .filter_map(|row| {
            config
                .pagerduty_service(&row.service)
                .map(|pd| (row.service.clone(), pd.to_string()))
        })
        .collect();
    if !paged.is_empty() {
        let sections = match &lookups.on_call {
            Some(lookup) => lookup_on_call(lookup.clone(), paged).await,
            None => {
                tracing::warn!("pagerduty services configured but no PagerDuty token given");
                paged
                    .into_iter()
                    .map(|(service, _)| {
                        (service, OnCallSection::Error("no PagerDuty token given".to_string()))
                    })
                    .collect()
            }
        };
        model.set_on_call(sections);
    }

    if let Some(rollbar) = &config.integrations.rollbar {
        let result = match &lookups.deploys {
            Some(lookup) => lookup
                .last_deploy(&rollbar.environment)
                .await
                .map_err(|e| e.to_string()),
            None => Err("no Rollbar token given".to_string()),
        };
        match &result {
            Ok(stats) => tracing::info!(version = %stats.version, "found last rollbar deploy"),
            Err(e) => tracing::warn!(error = %e, "rollbar lookup failed"),
        }
        model.rollbar = Some(RollbarSection {
            config: rollbar.clone(),
            result,
        });
    }
}
