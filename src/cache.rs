//! Disk-backed cache of per-item analyses.
//!
//! Each [`AnalysisRecord`] lives in its own `<key>.json` file inside one cache
//! directory, where `key` is the SHA-256 hex digest of the connection
//! identity, schema and item name. The directory is created on first write
//! and never removed by the pipeline.
//!
//! Caching is best effort. Reads that fail for any reason are misses; writes
//! that fail are logged and dropped. Writes go to a temporary file that is
//! renamed over the entry, so readers never observe a half-written record and
//! concurrent writers of the same key resolve as last-writer-wins.

use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::models::AnalysisRecord;

/// Hex-encoded SHA-256 digest identifying one cached analysis.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

pub struct AnalysisCache {
    dir: PathBuf,
}

impl AnalysisCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Derive the key for `(connection, schema, item)`.
    ///
    /// Fields are length-prefixed so `("a.b", "c")` and `("a", "b.c")` hash
    /// differently; the default schema hashes as its own marker.
    pub fn key(identity: &str, schema: Option<&str>, item: &str) -> CacheKey {
        let mut hasher = Sha256::new();
        for field in [Some(identity), schema, Some(item)] {
            match field {
                Some(value) => {
                    hasher.update((value.len() as u64).to_le_bytes());
                    hasher.update(value.as_bytes());
                }
                None => hasher.update(u64::MAX.to_le_bytes()),
            }
        }
        CacheKey(hex::encode(hasher.finalize()))
    }

    fn entry_path(&self, key: &CacheKey) -> PathBuf {
        self.dir.join(format!("{}.json", key.as_str()))
    }

    pub fn get(&self, key: &CacheKey) -> Option<AnalysisRecord> {
        let path = self.entry_path(key);
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "unreadable cache entry ignored");
                return None;
            }
        };

        match serde_json::from_slice(&bytes) {
            Ok(record) => {
                tracing::debug!(key = %key, "cache hit");
                Some(record)
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "corrupt cache entry ignored");
                None
            }
        }
    }

    pub fn put(&self, key: &CacheKey, record: &AnalysisRecord) {
        if let Err(e) = self.try_put(key, record) {
            tracing::warn!(key = %key, error = %e, "failed to write cache entry");
        }
    }

    fn try_put(&self, key: &CacheKey, record: &AnalysisRecord) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        let json = serde_json::to_vec_pretty(record)?;
        let tmp = self.dir.join(format!(".{}.{}.tmp", key.as_str(), Uuid::new_v4()));
        std::fs::write(&tmp, json)?;
        if let Err(e) = std::fs::rename(&tmp, self.entry_path(key)) {
            let _ = std::fs::remove_file(&tmp);
            return Err(e);
        }
        Ok(())
    }

    /// Delete every cached entry. Returns how many were removed.
    pub fn clear(&self) -> std::io::Result<usize> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e),
        };

        let mut removed = 0;
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) == Some("json") {
                std::fs::remove_file(&path)?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}
