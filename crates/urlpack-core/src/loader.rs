//! Cached loading of remote modules.
//!
//! `load` turns a `remote` location into source text: a cache hit returns the
//! stored body without touching the network; a miss fetches, stores one copy
//! of the response and returns the text of the other.
//!
//! Concurrent misses for the same request identity are coalesced by default:
//! later callers wait on a per-identity gate, then find the entry the first
//! caller stored. If the first fetch fails the next waiter fetches itself.
//!
//! Cache store failures are not recovered from: they fail the load with
//! `LOAD_CACHE`.

use crate::cache::{CacheError, CacheStore, CachedResponse, RequestIdentity};
use crate::fetch::Fetch;
use crate::resolve::{Namespace, ResolvedLocation};
use rustc_hash::FxHashMap as HashMap;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info};
use url::Url;

/// Loader error codes.
pub mod codes {
    /// The location is not in the `remote` namespace.
    pub const LOAD_NOT_REMOTE: &str = "LOAD_NOT_REMOTE";
    /// The location is not a parseable URL.
    pub const LOAD_INVALID_URL: &str = "LOAD_INVALID_URL";
    /// Network or transport failure.
    pub const LOAD_FETCH_FAILED: &str = "LOAD_FETCH_FAILED";
    /// The server answered with a non-success status.
    pub const LOAD_FETCH_STATUS: &str = "LOAD_FETCH_STATUS";
    /// The HTTP client could not be constructed.
    pub const LOAD_CLIENT_INIT: &str = "LOAD_CLIENT_INIT";
    /// The cache store failed to look up or store a response.
    pub const LOAD_CACHE: &str = "LOAD_CACHE";
}

/// Loading failure.
#[derive(Debug, Clone)]
pub struct LoadError {
    pub code: &'static str,
    pub message: String,
    pub url: Option<String>,
}

impl LoadError {
    fn new(code: &'static str, url: Option<&str>, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            url: url.map(str::to_string),
        }
    }

    #[must_use]
    pub fn not_remote(location: &ResolvedLocation) -> Self {
        Self::new(
            codes::LOAD_NOT_REMOTE,
            None,
            format!("Only remote modules can be loaded, got {location}"),
        )
    }

    #[must_use]
    pub fn invalid_url(url: &str, reason: &url::ParseError) -> Self {
        Self::new(
            codes::LOAD_INVALID_URL,
            Some(url),
            format!("Invalid module URL '{url}': {reason}"),
        )
    }

    pub fn fetch_failed(url: &str, reason: impl fmt::Display) -> Self {
        Self::new(
            codes::LOAD_FETCH_FAILED,
            Some(url),
            format!("Failed to fetch '{url}': {reason}"),
        )
    }

    #[must_use]
    pub fn status(url: &str, status: u16) -> Self {
        Self::new(
            codes::LOAD_FETCH_STATUS,
            Some(url),
            format!("Fetch of '{url}' returned status {status}"),
        )
    }

    pub fn client(message: impl Into<String>) -> Self {
        Self::new(codes::LOAD_CLIENT_INIT, None, message)
    }

    #[must_use]
    pub fn cache(url: &str, source: &CacheError) -> Self {
        Self::new(
            codes::LOAD_CACHE,
            Some(url),
            format!("Cache failure for '{url}': {source}"),
        )
    }
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for LoadError {}

/// Loader behaviour switches.
#[derive(Debug, Clone, Copy)]
pub struct LoaderOptions {
    /// Coalesce concurrent misses for the same request identity.
    pub coalesce: bool,
}

impl Default for LoaderOptions {
    fn default() -> Self {
        Self { coalesce: true }
    }
}

/// Counters describing what a loader did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoaderStats {
    /// Network fetches performed.
    pub fetches: usize,
    /// Loads answered from the cache.
    pub cache_hits: usize,
}

type Gate = Arc<tokio::sync::Mutex<()>>;

/// Remote module loader: cache first, network on miss.
pub struct Loader {
    cache: Arc<dyn CacheStore>,
    fetcher: Arc<dyn Fetch>,
    options: LoaderOptions,
    in_flight: Mutex<HashMap<RequestIdentity, Gate>>,
    fetches: AtomicUsize,
    cache_hits: AtomicUsize,
}

impl fmt::Debug for Loader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Loader")
            .field("options", &self.options)
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

impl Loader {
    /// Create a loader over an injected cache store and fetcher.
    pub fn new(cache: Arc<dyn CacheStore>, fetcher: Arc<dyn Fetch>) -> Self {
        Self::with_options(cache, fetcher, LoaderOptions::default())
    }

    /// Create a loader with explicit options.
    pub fn with_options(
        cache: Arc<dyn CacheStore>,
        fetcher: Arc<dyn Fetch>,
        options: LoaderOptions,
    ) -> Self {
        Self {
            cache,
            fetcher,
            options,
            in_flight: Mutex::new(HashMap::default()),
            fetches: AtomicUsize::new(0),
            cache_hits: AtomicUsize::new(0),
        }
    }

    /// What this loader has done so far.
    #[must_use]
    pub fn stats(&self) -> LoaderStats {
        LoaderStats {
            fetches: self.fetches.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
        }
    }

    /// Load the source text of a remote module.
    ///
    /// # Errors
    /// Fails for non-remote or unparseable locations, propagates fetch
    /// failures unchanged, and fails with `LOAD_CACHE` when the cache store
    /// cannot look up or store the response.
    pub async fn load(&self, location: &ResolvedLocation) -> Result<String, LoadError> {
        if location.namespace != Namespace::Remote {
            return Err(LoadError::not_remote(location));
        }

        let url = Url::parse(&location.path)
            .map_err(|e| LoadError::invalid_url(&location.path, &e))?;
        let request = RequestIdentity::get(url);

        if let Some(hit) = self.lookup(&request).await? {
            return Ok(hit.text());
        }

        if !self.options.coalesce {
            return self.fetch_and_store(request).await;
        }

        let gate = self.acquire_gate(&request);
        let result = {
            let _guard = gate.lock().await;
            match self.lookup(&request).await {
                Ok(Some(hit)) => Ok(hit.text()),
                Ok(None) => self.fetch_and_store(request.clone()).await,
                Err(e) => Err(e),
            }
        };
        self.release_gate(&request, &gate);

        result
    }

    async fn lookup(
        &self,
        request: &RequestIdentity,
    ) -> Result<Option<CachedResponse>, LoadError> {
        let hit = self
            .cache
            .match_request(request)
            .await
            .map_err(|e| LoadError::cache(request.url().as_str(), &e))?;
        if hit.is_some() {
            debug!(url = %request.url(), "cache hit");
            self.cache_hits.fetch_add(1, Ordering::Relaxed);
        }
        Ok(hit)
    }

    async fn fetch_and_store(&self, request: RequestIdentity) -> Result<String, LoadError> {
        info!(url = %request.url(), "Started fetching {}", request.url());

        let response = self.fetcher.fetch(&request).await?;
        self.fetches.fetch_add(1, Ordering::Relaxed);

        // One copy goes to the cache, the other is returned
        let text = response.text();
        let url = request.url().clone();
        self.cache
            .put(request, response)
            .await
            .map_err(|e| LoadError::cache(url.as_str(), &e))?;

        Ok(text)
    }

    fn acquire_gate(&self, request: &RequestIdentity) -> Gate {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(in_flight.entry(request.clone()).or_default())
    }

    fn release_gate(&self, request: &RequestIdentity, gate: &Gate) {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        // Only the map and this caller hold it: nobody else is waiting
        if Arc::strong_count(gate) <= 2 {
            in_flight.remove(request);
        }
    }
}
