//! Persistent, directory-backed response cache.
//!
//! One JSON file per request identity, named by the BLAKE3 digest of the
//! identity. Writes are atomic (temp file + rename), so a reader never sees a
//! half-written entry; a concurrent writer for the same key simply wins or
//! loses the rename.

use super::{CacheError, CacheStore, CachedResponse, RequestIdentity};
use crate::config::Channel;
use crate::paths::imports_cache_dir;
use crate::version::SCHEMA_VERSION;
use futures::future::{BoxFuture, FutureExt};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use urlpack_util::fs::{atomic_write, remove_files_in};
use urlpack_util::hash::blake3_parts;

/// Serialized form of one cache entry.
#[derive(Debug, Serialize, Deserialize)]
struct DiskEntry {
    schema: u32,
    method: String,
    url: String,
    final_url: String,
    status: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    content_type: Option<String>,
    body: String,
}

/// Response cache persisted under a directory.
#[derive(Debug, Clone)]
pub struct DiskCache {
    root: PathBuf,
}

impl DiskCache {
    /// Open (creating if needed) a cache rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let root = root.into();
        std::fs::create_dir_all(&root).map_err(|e| {
            CacheError::io(format!(
                "Failed to create cache directory {}: {e}",
                root.display()
            ))
        })?;
        Ok(Self { root })
    }

    /// Open the default imports cache for a channel.
    pub fn for_channel(channel: Channel) -> Result<Self, CacheError> {
        Self::open(imports_cache_dir(channel))
    }

    /// Get the cache root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File that holds the entry for `request`.
    #[must_use]
    pub fn entry_path(&self, request: &RequestIdentity) -> PathBuf {
        let digest = blake3_parts(&[request.method().as_str(), request.url().as_str()]);
        self.root.join(format!("{digest}.json"))
    }

    /// Number of stored entries.
    pub fn entry_count(&self) -> Result<usize, CacheError> {
        let entries = match std::fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(CacheError::io(format!("Failed to read cache directory: {e}"))),
        };

        Ok(entries
            .flatten()
            .filter(|e| e.path().extension().is_some_and(|ext| ext == "json"))
            .count())
    }

    /// Remove every entry, returning how many files were deleted.
    pub fn clear(&self) -> Result<usize, CacheError> {
        remove_files_in(&self.root)
            .map_err(|e| CacheError::io(format!("Failed to clear cache: {e}")))
    }

    async fn read_entry(&self, request: &RequestIdentity) -> Result<Option<CachedResponse>, CacheError> {
        let path = self.entry_path(request);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(CacheError::io(format!(
                    "Failed to read cache entry {}: {e}",
                    path.display()
                )))
            }
        };

        let entry: DiskEntry = match serde_json::from_slice(&bytes) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Ignoring corrupt cache entry");
                return Ok(None);
            }
        };

        if entry.schema != SCHEMA_VERSION
            || entry.method != request.method().as_str()
            || entry.url != request.url().as_str()
        {
            debug!(path = %path.display(), "Cache entry does not match request, treating as miss");
            return Ok(None);
        }

        Ok(Some(CachedResponse {
            url: entry.final_url,
            status: entry.status,
            content_type: entry.content_type,
            body: entry.body.into(),
        }))
    }

    async fn write_entry(
        &self,
        request: RequestIdentity,
        response: CachedResponse,
    ) -> Result<(), CacheError> {
        let entry = DiskEntry {
            schema: SCHEMA_VERSION,
            method: request.method().as_str().to_string(),
            url: request.url().to_string(),
            body: response.text(),
            final_url: response.url,
            status: response.status,
            content_type: response.content_type,
        };
        let json = serde_json::to_vec(&entry)
            .map_err(|e| CacheError::corrupt(format!("Failed to serialize cache entry: {e}")))?;

        let path = self.entry_path(&request);
        tokio::task::spawn_blocking(move || atomic_write(&path, &json))
            .await
            .map_err(|e| CacheError::io(format!("Cache write task failed: {e}")))?
            .map_err(|e| CacheError::io(format!("Failed to write cache entry: {e}")))
    }
}

impl CacheStore for DiskCache {
    fn match_request<'a>(
        &'a self,
        request: &'a RequestIdentity,
    ) -> BoxFuture<'a, Result<Option<CachedResponse>, CacheError>> {
        self.read_entry(request).boxed()
    }

    fn put<'a>(
        &'a self,
        request: RequestIdentity,
        response: CachedResponse,
    ) -> BoxFuture<'a, Result<(), CacheError>> {
        self.write_entry(request, response).boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use url::Url;

    fn id(url: &str) -> RequestIdentity {
        RequestIdentity::get(Url::parse(url).unwrap())
    }

    #[tokio::test]
    async fn test_put_then_match() {
        let dir = tempdir().unwrap();
        let cache = DiskCache::open(dir.path()).unwrap();
        let key = id("https://esm.sh/react@18/");

        assert!(cache.match_request(&key).await.unwrap().is_none());

        let response = CachedResponse {
            content_type: Some("application/javascript; charset=utf-8".to_string()),
            ..CachedResponse::ok("https://esm.sh/stable/react@18.3.1/es2022/react.mjs", "export default {};")
        };
        cache.put(key.clone(), response.clone()).await.unwrap();

        let hit = cache.match_request(&key).await.unwrap().unwrap();
        assert_eq!(hit, response);
        assert_eq!(cache.entry_count().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_survives_reopen() {
        let dir = tempdir().unwrap();
        let key = id("https://esm.sh/lodash@4/");
        {
            let cache = DiskCache::open(dir.path()).unwrap();
            cache
                .put(key.clone(), CachedResponse::ok("https://esm.sh/lodash@4/", "// lodash"))
                .await
                .unwrap();
        }

        let reopened = DiskCache::open(dir.path()).unwrap();
        let hit = reopened.match_request(&key).await.unwrap().unwrap();
        assert_eq!(hit.text(), "// lodash");
    }

    #[tokio::test]
    async fn test_corrupt_entry_is_a_miss() {
        let dir = tempdir().unwrap();
        let cache = DiskCache::open(dir.path()).unwrap();
        let key = id("https://esm.sh/broken.js");

        std::fs::write(cache.entry_path(&key), b"{not json").unwrap();
        assert!(cache.match_request(&key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_mismatched_entry_is_a_miss() {
        let dir = tempdir().unwrap();
        let cache = DiskCache::open(dir.path()).unwrap();
        let a = id("https://esm.sh/a.js");
        let b = id("https://esm.sh/b.js");

        cache.put(a.clone(), CachedResponse::ok("https://esm.sh/a.js", "a")).await.unwrap();
        // Simulate a digest collision by copying a's entry into b's slot
        std::fs::copy(cache.entry_path(&a), cache.entry_path(&b)).unwrap();

        assert!(cache.match_request(&b).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_clear() {
        let dir = tempdir().unwrap();
        let cache = DiskCache::open(dir.path().join("imports")).unwrap();
        for url in ["https://esm.sh/a.js", "https://esm.sh/b.js"] {
            cache.put(id(url), CachedResponse::ok(url, "x")).await.unwrap();
        }
        assert_eq!(cache.entry_count().unwrap(), 2);
        assert_eq!(cache.clear().unwrap(), 2);
        assert_eq!(cache.entry_count().unwrap(), 0);
    }

    #[test]
    fn test_entry_path_depends_on_url() {
        let dir = tempdir().unwrap();
        let cache = DiskCache::open(dir.path()).unwrap();
        let a = cache.entry_path(&id("https://esm.sh/a.js"));
        let b = cache.entry_path(&id("https://esm.sh/b.js"));
        assert_ne!(a, b);
        assert!(a.starts_with(dir.path()));
        assert_eq!(a.extension().unwrap(), "json");
    }
}
