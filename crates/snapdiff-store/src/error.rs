use std::path::PathBuf;

/// Failure talking to the tracing backend or validating what it sent
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("request to tracing backend failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("tracing backend returned {status} for {url}: {body}")]
    Status {
        status: u16,
        url: String,
        body: String,
    },
    #[error("malformed {kind} payload for snapshot {snapshot_id}: {reason}")]
    Malformed {
        kind: &'static str,
        snapshot_id: String,
        reason: String,
    },
}

impl StoreError {
    pub(crate) fn malformed(kind: &'static str, snapshot_id: &str, reason: impl Into<String>) -> Self {
        Self::Malformed {
            kind,
            snapshot_id: snapshot_id.to_string(),
            reason: reason.into(),
        }
    }
}

/// Failure reading or writing the local snapshot cache.
///
/// Never fatal: the store logs it and carries on without the cache.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("cache io error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("cache lock poisoned")]
    Poisoned,
}
