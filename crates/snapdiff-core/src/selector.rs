//! Baseline snapshot selection

use crate::types::Snapshot;
use regex::Regex;
use std::sync::OnceLock;

/// Attribute key used to embed the source repository in a snapshot query
pub const REPO_TAG_KEY: &str = "ignore.github.repo";

static REPO_TAG_RE: OnceLock<Regex> = OnceLock::new();

/// Tag a snapshot query with the repository it was taken for.
///
/// The backend has no annotations, so the tag rides along as a clause
/// that never filters anything out.
pub fn tag_query(query: &str, repo: &str) -> String {
    format!("{} AND \"{}\" NOT IN (\"{}\")", query, REPO_TAG_KEY, repo)
}

/// Repository tag embedded in a snapshot query by [`tag_query`]
pub fn repo_tag_of(query: &str) -> Option<&str> {
    let re = REPO_TAG_RE.get_or_init(|| {
        Regex::new(r#""ignore\.github\.repo".*?"(.*?)""#).expect("repo tag pattern is valid")
    });
    re.captures(query)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Pick the snapshot to compare `exclude_id` against.
///
/// `snapshots` is in backend order (oldest first), so the last candidate is
/// the most recent. Candidates tagged with `repo` win over untagged ones.
pub fn select_baseline<'a>(
    snapshots: &'a [Snapshot],
    exclude_id: &str,
    repo: Option<&str>,
) -> Option<&'a Snapshot> {
    let candidates: Vec<&Snapshot> = snapshots.iter().filter(|s| s.id != exclude_id).collect();

    if let Some(repo) = repo {
        let tagged = candidates
            .iter()
            .rev()
            .find(|s| repo_tag_of(&s.query) == Some(repo))
            .copied();
        if let Some(snapshot) = tagged {
            tracing::info!(snapshot = %snapshot.id, repo, "comparing with most recent repo snapshot");
            return Some(snapshot);
        }
    }

    let latest = candidates.last().copied();
    if let Some(snapshot) = latest {
        tracing::info!(snapshot = %snapshot.id, "comparing with most recent snapshot");
    }
    latest
}
