//! Snapshot store: cached access to snapshot statistics and diagrams

use crate::backend::TraceBackend;
use crate::cache::{CacheKey, PayloadKind, SnapshotCache};
use crate::error::{CacheError, StoreError};
use crate::payload::{parse_diagram, parse_snapshot};
use snapdiff_core::{DiagramPayload, SnapshotPayload};
use std::future::Future;

/// Where a payload came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Cache,
    Backend,
}

/// A payload plus any cache problem met while producing it
#[derive(Debug)]
pub struct Fetched<T> {
    pub value: T,
    pub origin: Origin,
    /// Soft failure: the payload is valid but the cache could not be used
    pub cache_error: Option<CacheError>,
}

impl<T> Fetched<T> {
    pub fn into_inner(self) -> T {
        self.value
    }
}

/// Statistics and diagram for one snapshot
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotData {
    pub stats: SnapshotPayload,
    pub diagram: DiagramPayload,
}

pub struct SnapshotStore<B, C> {
    backend: B,
    cache: C,
    write_through: bool,
}

impl<B: TraceBackend, C: SnapshotCache> SnapshotStore<B, C> {
    pub fn new(backend: B, cache: C) -> Self {
        Self {
            backend,
            cache,
            write_through: true,
        }
    }

    /// Keep reading from the cache but stop writing new entries
    pub fn without_write_through(mut self) -> Self {
        self.write_through = false;
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub async fn get_snapshot(
        &self,
        project: &str,
        snapshot_id: &str,
    ) -> Result<Fetched<SnapshotPayload>, StoreError> {
        self.load(
            CacheKey::new(snapshot_id, PayloadKind::Stats),
            || self.backend.fetch_snapshot(project, snapshot_id),
            parse_snapshot,
        )
        .await
    }

    pub async fn get_diagram(
        &self,
        project: &str,
        snapshot_id: &str,
    ) -> Result<Fetched<DiagramPayload>, StoreError> {
        self.load(
            CacheKey::new(snapshot_id, PayloadKind::Diagram),
            || self.backend.fetch_diagram(project, snapshot_id),
            parse_diagram,
        )
        .await
    }

    /// Statistics and diagram for one snapshot, fetched concurrently
    pub async fn get_data(&self, project: &str, snapshot_id: &str) -> Result<SnapshotData, StoreError> {
        let (stats, diagram) = tokio::try_join!(
            self.get_snapshot(project, snapshot_id),
            self.get_diagram(project, snapshot_id)
        )?;
        Ok(SnapshotData {
            stats: stats.into_inner(),
            diagram: diagram.into_inner(),
        })
    }

    /// Data for a before/after pair. Identical ids are fetched once.
    pub async fn fetch_pair(
        &self,
        project: &str,
        before_id: &str,
        after_id: &str,
    ) -> Result<(SnapshotData, SnapshotData), StoreError> {
        if before_id == after_id {
            let data = self.get_data(project, after_id).await?;
            return Ok((data.clone(), data));
        }
        tokio::try_join!(
            self.get_data(project, before_id),
            self.get_data(project, after_id)
        )
    }

    async fn load<T, F, Fut>(
        &self,
        key: CacheKey,
        fetch: F,
        parse: fn(&[u8], &str) -> Result<T, StoreError>,
    ) -> Result<Fetched<T>, StoreError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<u8>, StoreError>>,
    {
        let mut cache_error = None;

        match self.cache.get(&key) {
            Ok(Some(body)) => match parse(&body, &key.snapshot_id) {
                Ok(value) => {
                    tracing::info!(
                        snapshot = %key.snapshot_id,
                        kind = key.kind.as_str(),
                        "getting snapshot from cache"
                    );
                    return Ok(Fetched {
                        value,
                        origin: Origin::Cache,
                        cache_error: None,
                    });
                }
                Err(e) => {
                    tracing::warn!(
                        snapshot = %key.snapshot_id,
                        kind = key.kind.as_str(),
                        error = %e,
                        "ignoring malformed cache entry"
                    );
                }
            },
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(snapshot = %key.snapshot_id, error = %e, "snapshot cache read failed");
                cache_error = Some(e);
            }
        }

        tracing::info!(
            snapshot = %key.snapshot_id,
            kind = key.kind.as_str(),
            "fetching snapshot from backend"
        );
        let body = fetch().await?;
        let value = parse(&body, &key.snapshot_id)?;

        if self.write_through {
            if let Err(e) = self.cache.put(&key, &body) {
                tracing::warn!(snapshot = %key.snapshot_id, error = %e, "snapshot cache write failed");
                cache_error = Some(e);
            }
        }

        Ok(Fetched {
            value,
            origin: Origin::Backend,
            cache_error,
        })
    }
}
