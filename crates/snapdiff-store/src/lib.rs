//! Snapshot retrieval from the tracing backend with a local response cache

mod backend;
mod cache;
mod error;
mod payload;
mod store;

pub use backend::{LightstepClient, TraceBackend, DEFAULT_API_BASE};
pub use cache::{
    atomic_write, default_cache_dir, CacheKey, FsCache, MemoryCache, PayloadKind, SnapshotCache,
};
pub use error::{CacheError, StoreError};
pub use payload::{parse_created_id, parse_diagram, parse_snapshot, parse_snapshot_list};
pub use store::{Fetched, Origin, SnapshotData, SnapshotStore};
