use super::{CacheError, CacheStore, CachedResponse, RequestIdentity};
use futures::future::{self, BoxFuture, FutureExt};
use rustc_hash::FxHashMap as HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{PoisonError, RwLock};

/// In-memory response cache.
///
/// Lives as long as the value does. Counts hits and puts so callers can
/// observe how often the network was avoided.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<RequestIdentity, CachedResponse>>,
    hits: AtomicUsize,
    puts: AtomicUsize,
}

/// Cache statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub entry_count: usize,
    pub hits: usize,
    pub puts: usize,
}

impl MemoryCache {
    /// Create a new empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get cache statistics.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        CacheStats {
            entry_count: entries.len(),
            hits: self.hits.load(Ordering::Relaxed),
            puts: self.puts.load(Ordering::Relaxed),
        }
    }

    /// Synchronous lookup, bypassing the hit counter.
    #[must_use]
    pub fn peek(&self, request: &RequestIdentity) -> Option<CachedResponse> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.get(request).cloned()
    }
}

impl CacheStore for MemoryCache {
    fn match_request<'a>(
        &'a self,
        request: &'a RequestIdentity,
    ) -> BoxFuture<'a, Result<Option<CachedResponse>, CacheError>> {
        let found = self.peek(request);
        if found.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
        }
        future::ready(Ok(found)).boxed()
    }

    fn put<'a>(
        &'a self,
        request: RequestIdentity,
        response: CachedResponse,
    ) -> BoxFuture<'a, Result<(), CacheError>> {
        {
            let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
            entries.insert(request, response);
        }
        self.puts.fetch_add(1, Ordering::Relaxed);
        future::ready(Ok(())).boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn id(url: &str) -> RequestIdentity {
        RequestIdentity::get(Url::parse(url).unwrap())
    }

    #[tokio::test]
    async fn test_miss_then_hit() {
        let cache = MemoryCache::new();
        let key = id("https://esm.sh/react@18/");

        assert!(cache.match_request(&key).await.unwrap().is_none());

        cache
            .put(key.clone(), CachedResponse::ok("https://esm.sh/react@18/", "export {}"))
            .await
            .unwrap();

        let hit = cache.match_request(&key).await.unwrap().unwrap();
        assert_eq!(hit.text(), "export {}");
        assert_eq!(
            cache.stats(),
            CacheStats {
                entry_count: 1,
                hits: 1,
                puts: 1
            }
        );
    }

    #[tokio::test]
    async fn test_last_write_wins() {
        let cache = MemoryCache::new();
        let key = id("https://esm.sh/a.js");
        cache.put(key.clone(), CachedResponse::ok("https://esm.sh/a.js", "one")).await.unwrap();
        cache.put(key.clone(), CachedResponse::ok("https://esm.sh/a.js", "two")).await.unwrap();

        assert_eq!(cache.peek(&key).unwrap().text(), "two");
        assert_eq!(cache.stats().entry_count, 1);
        assert_eq!(cache.stats().puts, 2);
    }

    #[tokio::test]
    async fn test_clear() {
        let cache = MemoryCache::new();
        let key = id("https://esm.sh/a.js");
        cache.put(key.clone(), CachedResponse::ok("https://esm.sh/a.js", "x")).await.unwrap();
        cache.clear();
        assert!(cache.match_request(&key).await.unwrap().is_none());
    }
}
