//! Local cache of raw backend responses, one entry per (snapshot, kind)

use crate::error::CacheError;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Which backend response an entry holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PayloadKind {
    Stats,
    Diagram,
}

impl PayloadKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PayloadKind::Stats => "snapshot",
            PayloadKind::Diagram => "diagram",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub snapshot_id: String,
    pub kind: PayloadKind,
}

impl CacheKey {
    pub fn new(snapshot_id: &str, kind: PayloadKind) -> Self {
        Self {
            snapshot_id: snapshot_id.to_string(),
            kind,
        }
    }
}

/// Key-value store for raw snapshot responses.
///
/// Snapshots are immutable once created, so entries never expire.
pub trait SnapshotCache: Send + Sync {
    fn get(&self, key: &CacheKey) -> Result<Option<Vec<u8>>, CacheError>;
    fn put(&self, key: &CacheKey, data: &[u8]) -> Result<(), CacheError>;
}

/// Default cache directory, shared across process invocations
pub fn default_cache_dir() -> PathBuf {
    std::env::temp_dir().join("snapdiff")
}

/// Filesystem cache: one JSON file per key
#[derive(Debug, Clone)]
pub struct FsCache {
    dir: PathBuf,
}

impl FsCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// File backing `key`, e.g. `snapdiff-snapshotdiagram-abc123.json`
    pub fn path_for(&self, key: &CacheKey) -> PathBuf {
        let suffix = match key.kind {
            PayloadKind::Stats => "",
            PayloadKind::Diagram => "diagram",
        };
        let id: String = key
            .snapshot_id
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir
            .join(format!("snapdiff-snapshot{}-{}.json", suffix, id))
    }
}

impl Default for FsCache {
    fn default() -> Self {
        Self::new(default_cache_dir())
    }
}

impl SnapshotCache for FsCache {
    fn get(&self, key: &CacheKey) -> Result<Option<Vec<u8>>, CacheError> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }
        std::fs::read(&path)
            .map(Some)
            .map_err(|source| CacheError::Io { path, source })
    }

    fn put(&self, key: &CacheKey, data: &[u8]) -> Result<(), CacheError> {
        let path = self.path_for(key);
        atomic_write(&path, data).map_err(|source| CacheError::Io { path, source })
    }
}

/// Write data atomically using temp file + rename
pub fn atomic_write(path: &Path, data: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let temp_path = path.with_extension("tmp");
    std::fs::write(&temp_path, data)?;
    std::fs::rename(temp_path, path)?;
    Ok(())
}

/// In-memory cache, mostly for tests
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<CacheKey, Vec<u8>>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SnapshotCache for MemoryCache {
    fn get(&self, key: &CacheKey) -> Result<Option<Vec<u8>>, CacheError> {
        let entries = self.entries.lock().map_err(|_| CacheError::Poisoned)?;
        Ok(entries.get(key).cloned())
    }

    fn put(&self, key: &CacheKey, data: &[u8]) -> Result<(), CacheError> {
        let mut entries = self.entries.lock().map_err(|_| CacheError::Poisoned)?;
        entries.insert(key.clone(), data.to_vec());
        Ok(())
    }
}

impl<T: SnapshotCache + ?Sized> SnapshotCache for std::sync::Arc<T> {
    fn get(&self, key: &CacheKey) -> Result<Option<Vec<u8>>, CacheError> {
        (**self).get(key)
    }

    fn put(&self, key: &CacheKey, data: &[u8]) -> Result<(), CacheError> {
        (**self).put(key, data)
    }
}
