//! Content-addressed response cache.
//!
//! Every synthesized response is stored as a self-describing JSON record
//! named by the SHA-256 of its virtual URL. Records are written once and
//! never invalidated; the content is regenerable, so there is no eviction,
//! TTL or size bound.
//!
//! ## Storage roots
//!
//! - [`StoragePolicy::Ephemeral`]: a process-private scratch directory that
//!   is removed when the store is dropped.
//! - [`StoragePolicy::Persistent`]: a stable directory reused across restarts.

pub mod flight;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// File extension of cache records.
const RECORD_EXT: &str = "cache";

/// Errors raised while setting up or writing to the cache.
///
/// Reads never fail: an unreadable record is a miss.
#[derive(thiserror::Error, Debug)]
pub enum CacheError {
    #[error("failed to prepare cache dir {path}: {source}")]
    Setup { path: PathBuf, source: io::Error },

    #[error("failed to write cache record {path}: {source}")]
    Write { path: PathBuf, source: io::Error },

    #[error("failed to encode cache record: {0}")]
    Encode(#[from] serde_json::Error),
}

/// One cached response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub content: String,
    pub content_type: String,
}

/// Where cache records live.
#[derive(Debug, Clone)]
pub enum StoragePolicy {
    /// Fresh scratch directory, gone after the process exits.
    Ephemeral,
    /// Shared directory kept across restarts.
    Persistent(PathBuf),
}

impl StoragePolicy {
    /// Default persistent root: `<user cache dir>/llm-web`.
    pub fn default_persistent_dir() -> PathBuf {
        dirs::cache_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("llm-web")
    }
}

/// Derive the record key for a full virtual URL.
pub fn cache_key(full_url: &str) -> String {
    hex::encode(Sha256::digest(full_url.as_bytes()))
}

/// Filesystem-backed cache store.
#[derive(Debug)]
pub struct CacheStore {
    root: PathBuf,
    /// Keeps the ephemeral directory alive for the lifetime of the store.
    _scratch: Option<TempDir>,
}

impl CacheStore {
    /// Open a store according to `policy`, creating the root if needed.
    pub fn open(policy: StoragePolicy) -> Result<Self, CacheError> {
        let store = match policy {
            StoragePolicy::Ephemeral => {
                let scratch = tempfile::Builder::new()
                    .prefix("llm-web-cache-")
                    .tempdir()
                    .map_err(|source| CacheError::Setup {
                        path: std::env::temp_dir(),
                        source,
                    })?;
                Self {
                    root: scratch.path().to_path_buf(),
                    _scratch: Some(scratch),
                }
            }
            StoragePolicy::Persistent(root) => {
                std::fs::create_dir_all(&root).map_err(|source| CacheError::Setup {
                    path: root.clone(),
                    source,
                })?;
                Self {
                    root,
                    _scratch: None,
                }
            }
        };

        tracing::info!(cache_dir = %store.root.display(), "cache store ready");
        Ok(store)
    }

    /// Cache root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the record for `full_url`.
    pub fn record_path(&self, full_url: &str) -> PathBuf {
        self.root
            .join(format!("{}.{RECORD_EXT}", cache_key(full_url)))
    }

    /// Look up the record for `full_url`.
    ///
    /// Returns `None` on a miss. A record that cannot be read or decoded is
    /// logged and treated as a miss.
    pub async fn get(&self, full_url: &str) -> Option<CacheEntry> {
        let path = self.record_path(full_url);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!(path = %path.display(), "unreadable cache record: {e}");
                return None;
            }
        };

        match serde_json::from_slice::<CacheEntry>(&bytes) {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::warn!(path = %path.display(), "corrupt cache record: {e}");
                None
            }
        }
    }

    /// Store `entry` under `full_url`, replacing any previous record.
    ///
    /// The record is written to a temporary file in the cache root and then
    /// renamed into place, so readers see either the old or the new record.
    pub async fn put(&self, full_url: &str, entry: &CacheEntry) -> Result<(), CacheError> {
        let path = self.record_path(full_url);
        let data = serde_json::to_vec(entry)?;

        let tmp = self
            .root
            .join(format!(".{}.{}.tmp", cache_key(full_url), uuid::Uuid::new_v4()));
        if let Err(source) = tokio::fs::write(&tmp, &data).await {
            return Err(CacheError::Write { path: tmp, source });
        }
        if let Err(source) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(CacheError::Write { path, source });
        }

        tracing::debug!(url = full_url, path = %path.display(), "cached response");
        Ok(())
    }

    /// Number of records on disk.
    pub fn len(&self) -> usize {
        std::fs::read_dir(&self.root)
            .map(|entries| {
                entries
                    .flatten()
                    .filter(|e| e.path().extension().and_then(|x| x.to_str()) == Some(RECORD_EXT))
                    .count()
            })
            .unwrap_or(0)
    }

    /// Whether the store holds no records.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(content: &str, content_type: &str) -> CacheEntry {
        CacheEntry {
            content: content.to_string(),
            content_type: content_type.to_string(),
        }
    }

    #[test]
    fn test_key_is_deterministic_sha256() {
        let a = cache_key("example.com/");
        let b = cache_key("example.com/");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert_ne!(a, cache_key("example.com/index.html"));
        assert_eq!(
            cache_key(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[tokio::test]
    async fn test_miss_then_hit() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::open(StoragePolicy::Persistent(dir.path().to_path_buf())).unwrap();

        assert!(store.get("a.example/page").await.is_none());

        store
            .put("a.example/page", &entry("<p>hi</p>", "text/html"))
            .await
            .unwrap();
        let hit = store.get("a.example/page").await.unwrap();
        assert_eq!(hit, entry("<p>hi</p>", "text/html"));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_record_layout_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::open(StoragePolicy::Persistent(dir.path().to_path_buf())).unwrap();
        store
            .put("a.example/style.css", &entry("body{}", "text/css"))
            .await
            .unwrap();

        let path = dir
            .path()
            .join(format!("{}.cache", cache_key("a.example/style.css")));
        let raw: serde_json::Value =
            serde_json::from_slice(&std::fs::read(path).unwrap()).unwrap();
        assert_eq!(raw["content"], "body{}");
        assert_eq!(raw["content_type"], "text/css");
    }

    #[tokio::test]
    async fn test_last_write_wins() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::open(StoragePolicy::Persistent(dir.path().to_path_buf())).unwrap();
        store.put("k.example/", &entry("one", "text/html")).await.unwrap();
        store.put("k.example/", &entry("two", "text/html")).await.unwrap();
        assert_eq!(store.get("k.example/").await.unwrap().content, "two");
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_corrupt_record_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::open(StoragePolicy::Persistent(dir.path().to_path_buf())).unwrap();
        std::fs::write(store.record_path("bad.example/"), b"{not json").unwrap();
        assert!(store.get("bad.example/").await.is_none());
    }

    #[tokio::test]
    async fn test_persistent_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store =
                CacheStore::open(StoragePolicy::Persistent(dir.path().to_path_buf())).unwrap();
            store.put("p.example/", &entry("kept", "text/html")).await.unwrap();
        }
        let store = CacheStore::open(StoragePolicy::Persistent(dir.path().to_path_buf())).unwrap();
        assert_eq!(store.get("p.example/").await.unwrap().content, "kept");
    }

    #[tokio::test]
    async fn test_ephemeral_root_is_removed_on_drop() {
        let store = CacheStore::open(StoragePolicy::Ephemeral).unwrap();
        let root = store.root().to_path_buf();
        store.put("e.example/", &entry("tmp", "text/html")).await.unwrap();
        assert!(root.exists());
        drop(store);
        assert!(!root.exists());
    }

    #[tokio::test]
    async fn test_write_failure_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("gone");
        let store = CacheStore::open(StoragePolicy::Persistent(root.clone())).unwrap();
        std::fs::remove_dir_all(&root).unwrap();

        let err = store
            .put("w.example/", &entry("x", "text/html"))
            .await
            .unwrap_err();
        assert!(matches!(err, CacheError::Write { .. }));
    }
}
