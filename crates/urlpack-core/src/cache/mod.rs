//! Response cache for remote modules.
//!
//! The loader talks to a [`CacheStore`]: an async key-value map addressed by
//! [`RequestIdentity`]. Entries never expire; once written they are trusted
//! for the lifetime of the store.
//!
//! - [`MemoryCache`]: process-lifetime store, also used in tests.
//! - [`DiskCache`]: persistent store under the platform cache directory.

mod disk;
mod memory;

pub use disk::DiskCache;
pub use memory::{CacheStats, MemoryCache};

use bytes::Bytes;
use futures::future::BoxFuture;
use reqwest::Method;
use std::fmt;
use url::Url;

/// Cache error codes.
pub mod codes {
    pub const CACHE_IO: &str = "CACHE_IO";
    pub const CACHE_CORRUPT: &str = "CACHE_CORRUPT";
}

/// Canonical key of a cache entry: method plus URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestIdentity {
    method: Method,
    url: Url,
}

impl RequestIdentity {
    /// A `GET` request for `url`.
    #[must_use]
    pub fn get(url: Url) -> Self {
        Self {
            method: Method::GET,
            url,
        }
    }

    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }
}

impl fmt::Display for RequestIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.url)
    }
}

/// A stored response: everything a later lookup needs to skip the network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedResponse {
    /// URL the body was finally served from (after redirects).
    pub url: String,
    /// HTTP status code.
    pub status: u16,
    /// `Content-Type` header, if the server sent one.
    pub content_type: Option<String>,
    /// Response body.
    pub body: Bytes,
}

impl CachedResponse {
    /// Build a `200 OK` response with a text body.
    pub fn ok(url: impl Into<String>, body: impl Into<Bytes>) -> Self {
        Self {
            url: url.into(),
            status: 200,
            content_type: None,
            body: body.into(),
        }
    }

    /// Body decoded as UTF-8, with invalid sequences replaced.
    #[must_use]
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Cache store failure.
#[derive(Debug, Clone)]
pub struct CacheError {
    pub code: &'static str,
    pub message: String,
}

impl CacheError {
    pub fn io(message: impl Into<String>) -> Self {
        Self {
            code: codes::CACHE_IO,
            message: message.into(),
        }
    }

    pub fn corrupt(message: impl Into<String>) -> Self {
        Self {
            code: codes::CACHE_CORRUPT,
            message: message.into(),
        }
    }
}

impl fmt::Display for CacheError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for CacheError {}

/// Async key-value store for responses, keyed by request identity.
///
/// Implementations must be safe to share between concurrent loads. No
/// ordering or locking contract is imposed: concurrent `put`s for one key
/// are last-write-wins.
pub trait CacheStore: Send + Sync {
    /// Look up a stored response.
    fn match_request<'a>(
        &'a self,
        request: &'a RequestIdentity,
    ) -> BoxFuture<'a, Result<Option<CachedResponse>, CacheError>>;

    /// Store a response under `request`.
    fn put<'a>(
        &'a self,
        request: RequestIdentity,
        response: CachedResponse,
    ) -> BoxFuture<'a, Result<(), CacheError>>;
}
