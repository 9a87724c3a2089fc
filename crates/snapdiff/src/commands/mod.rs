pub mod analyze;
pub mod create;

use crate::cli::{AnalyzeArgs, CreateArgs};
use crate::outputs::ActionOutputs;
use crate::settings::Settings;
use anyhow::bail;

/// Create a snapshot when a query is given, otherwise analyze
pub async fn run(
    settings: &Settings,
    query: Option<String>,
    args: &AnalyzeArgs,
    outputs: &ActionOutputs,
) -> anyhow::Result<()> {
    if let Some(query) = query.filter(|q| !q.trim().is_empty()) {
        let create = CreateArgs {
            query,
            repository: args.repository.clone(),
        };
        return create::run(settings, &create, outputs).await;
    }

    if args.snapshot_id.is_none() {
        bail!("no input found: please specify a query to take a snapshot or snapshot id(s) to summarize");
    }
    analyze::run(settings, args, outputs).await
}

fn emit_target(settings: &Settings, outputs: &ActionOutputs) -> anyhow::Result<()> {
    tracing::info!(
        project = %settings.project,
        organization = %settings.organization,
        "using lightstep project"
    );
    outputs.set("lightstep_project", &settings.project)?;
    outputs.set("lightstep_organization", &settings.organization)?;
    Ok(())
}
