use crate::cli::CreateArgs;
use crate::outputs::ActionOutputs;
use crate::settings::Settings;
use anyhow::Context;
use snapdiff_core::tag_query;
use snapdiff_store::TraceBackend;

pub async fn run(
    settings: &Settings,
    args: &CreateArgs,
    outputs: &ActionOutputs,
) -> anyhow::Result<()> {
    super::emit_target(settings, outputs)?;

    let client = settings.client();
    let id = create(
        &client,
        &settings.project,
        &args.query,
        args.repository.as_deref(),
    )
    .await?;

    outputs.set("lightstep_snapshot_id", &id)?;
    Ok(())
}

/// Create a snapshot, tagging the query with the repository when known
pub async fn create<B: TraceBackend>(
    backend: &B,
    project: &str,
    query: &str,
    repository: Option<&str>,
) -> anyhow::Result<String> {
    let query = match repository {
        Some(repo) if !repo.is_empty() => tag_query(query, repo),
        _ => query.to_string(),
    };

    tracing::info!(project, "creating snapshot");
    let id = backend
        .create_snapshot(project, &query)
        .await
        .with_context(|| format!("failed to create snapshot in project {}", project))?;
    tracing::info!(snapshot = %id, "took snapshot");
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use snapdiff_core::Snapshot;
    use snapdiff_store::StoreError;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingBackend {
        queries: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl TraceBackend for RecordingBackend {
        async fn create_snapshot(&self, _project: &str, query: &str) -> Result<String, StoreError> {
            self.queries.lock().unwrap().push(query.to_string());
            Ok("snap-new".to_string())
        }

        async fn list_snapshots(&self, _project: &str) -> Result<Vec<Snapshot>, StoreError> {
            Ok(vec![])
        }

        async fn fetch_snapshot(&self, _project: &str, _id: &str) -> Result<Vec<u8>, StoreError> {
            unreachable!()
        }

        async fn fetch_diagram(&self, _project: &str, _id: &str) -> Result<Vec<u8>, StoreError> {
            unreachable!()
        }
    }

    #[tokio::test]
    async fn test_create_tags_query_with_repository() {
        let backend = RecordingBackend::default();
        let id = create(&backend, "demo", "service IN (\"api\")", Some("acme/shop"))
            .await
            .unwrap();

        assert_eq!(id, "snap-new");
        let queries = backend.queries.lock().unwrap();
        assert_eq!(
            queries[0],
            "service IN (\"api\") AND \"ignore.github.repo\" NOT IN (\"acme/shop\")"
        );
    }

    #[tokio::test]
    async fn test_create_without_repository_keeps_query() {
        let backend = RecordingBackend::default();
        create(&backend, "demo", "service IN (\"api\")", None)
            .await
            .unwrap();
        assert_eq!(backend.queries.lock().unwrap()[0], "service IN (\"api\")");
    }
}
