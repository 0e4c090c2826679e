//! Durable TTL cache of analysis results, one JSON file per key.

use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::fingerprint::Fingerprint;
use super::key::{CacheKey, CacheKeyBuilder, OperationKind};

/// Default expiration window: 30 days.
pub const DEFAULT_TTL: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// Directory name used under the OS temp dir when no cache dir is configured.
pub const DEFAULT_CACHE_SUBDIR: &str = "ai_image_analysis_cache";

const ENTRY_EXTENSION: &str = "json";
const TEMP_EXTENSION: &str = "tmp";

static TEMP_SEQ: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Cache I/O error at '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to encode cache entry: {0}")]
    Encode(#[from] serde_json::Error),
}

impl CacheError {
    fn io(path: &Path, source: io::Error) -> Self {
        Self::Io { path: path.to_path_buf(), source }
    }
}

/// One memoized analysis result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: CacheKey,
    pub operation: OperationKind,
    /// Source fingerprints at write time, in argument order.
    pub fingerprints: Vec<Fingerprint>,
    pub params: BTreeMap<String, String>,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl CacheEntry {
    /// Create an entry for the key described by `builder`, stamped now.
    pub fn new(builder: &CacheKeyBuilder, payload: serde_json::Value) -> Self {
        Self {
            key: builder.build(),
            operation: builder.operation(),
            fingerprints: builder.fingerprints().to_vec(),
            params: builder.params().clone(),
            payload,
            created_at: Utc::now(),
        }
    }

    pub fn is_expired(&self, ttl: Duration, now: DateTime<Utc>) -> bool {
        let age = now.signed_duration_since(self.created_at);
        // A timestamp from the future cannot be trusted to age out
        if age < chrono::Duration::zero() {
            return true;
        }
        match chrono::Duration::from_std(ttl) {
            Ok(ttl) => age > ttl,
            // TTL too large to represent never expires
            Err(_) => false,
        }
    }
}

/// Read-only view of the store's footprint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub entry_count: usize,
    pub total_bytes: u64,
    pub location: PathBuf,
}

impl CacheStats {
    pub fn total_megabytes(&self) -> f64 {
        self.total_bytes as f64 / (1024.0 * 1024.0)
    }
}

/// File-backed cache store.
///
/// The root directory is created on the first write. Entries are written to
/// a uniquely named temp file and renamed into place, so readers never see a
/// partially written entry and writers to different keys never interfere.
#[derive(Debug, Clone)]
pub struct CacheStore {
    root: PathBuf,
    ttl: Duration,
}

impl CacheStore {
    pub fn new(root: impl Into<PathBuf>, ttl: Duration) -> Self {
        Self { root: root.into(), ttl }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn entry_path(&self, key: &CacheKey) -> PathBuf {
        self.root.join(format!("{}.{}", key.as_str(), ENTRY_EXTENSION))
    }

    /// Look up an entry.
    ///
    /// Returns `Ok(None)` for absent, expired and corrupt entries; the latter
    /// two are removed on the way out. `Err` is reserved for I/O failures
    /// that make the store itself unusable.
    pub fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry>, CacheError> {
        let path = self.entry_path(key);
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(CacheError::io(&path, e)),
        };

        let entry: CacheEntry = match serde_json::from_str(&contents) {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "discarding corrupt cache entry");
                self.discard(&path);
                return Ok(None);
            }
        };

        if entry.key != *key {
            tracing::warn!(key = %key, stored = %entry.key, "discarding mismatched cache entry");
            self.discard(&path);
            return Ok(None);
        }

        if entry.is_expired(self.ttl, Utc::now()) {
            tracing::debug!(key = %key, created_at = %entry.created_at, "cache entry expired");
            self.discard(&path);
            return Ok(None);
        }

        Ok(Some(entry))
    }

    /// Write or overwrite an entry. Last writer wins for identical keys.
    pub fn put(&self, entry: &CacheEntry) -> Result<(), CacheError> {
        fs::create_dir_all(&self.root).map_err(|e| CacheError::io(&self.root, e))?;

        let bytes = serde_json::to_vec_pretty(entry)?;
        let target = self.entry_path(&entry.key);
        let temp = self.root.join(format!(
            ".{}.{}.{}.{}",
            entry.key.as_str(),
            std::process::id(),
            TEMP_SEQ.fetch_add(1, Ordering::Relaxed),
            TEMP_EXTENSION
        ));

        let written = fs::File::create(&temp)
            .and_then(|mut file| {
                file.write_all(&bytes)?;
                file.sync_all()
            })
            .and_then(|_| fs::rename(&temp, &target));

        if let Err(e) = written {
            let _ = fs::remove_file(&temp);
            return Err(CacheError::io(&target, e));
        }

        tracing::debug!(key = %entry.key, bytes = bytes.len(), "cache entry stored");
        Ok(())
    }

    /// Remove a single entry. Returns whether a file was removed.
    pub fn remove(&self, key: &CacheKey) -> Result<bool, CacheError> {
        let path = self.entry_path(key);
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(CacheError::io(&path, e)),
        }
    }

    /// Remove every entry, best effort. Returns the number of entries removed.
    ///
    /// Leftover temp files from interrupted writes are swept too but are not
    /// counted.
    pub fn clear(&self) -> usize {
        let mut removed = 0;
        for path in self.scan(ENTRY_EXTENSION) {
            match fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "failed to remove cache entry")
                }
            }
        }
        for path in self.scan(TEMP_EXTENSION) {
            let _ = fs::remove_file(&path);
        }
        tracing::info!(removed, location = %self.root.display(), "cache cleared");
        removed
    }

    /// Count entries and their total size. A missing store reports zeros.
    pub fn stats(&self) -> CacheStats {
        let mut entry_count = 0;
        let mut total_bytes = 0;
        for path in self.scan(ENTRY_EXTENSION) {
            if let Ok(meta) = fs::metadata(&path) {
                entry_count += 1;
                total_bytes += meta.len();
            }
        }
        CacheStats { entry_count, total_bytes, location: self.root.clone() }
    }

    fn scan(&self, extension: &str) -> Vec<PathBuf> {
        let pattern = format!(
            "{}/*.{}",
            glob::Pattern::escape(&self.root.display().to_string()),
            extension
        );
        match glob::glob(&pattern) {
            Ok(paths) => paths.filter_map(Result::ok).filter(|p| p.is_file()).collect(),
            Err(e) => {
                tracing::warn!(pattern = %pattern, error = %e, "invalid cache scan pattern");
                Vec::new()
            }
        }
    }

    fn discard(&self, path: &Path) {
        if let Err(e) = fs::remove_file(path) {
            if e.kind() != io::ErrorKind::NotFound {
                tracing::warn!(path = %path.display(), error = %e, "failed to remove cache entry");
            }
        }
    }
}
