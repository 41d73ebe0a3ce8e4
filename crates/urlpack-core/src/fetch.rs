//! Network transport for remote modules.

use crate::cache::{CachedResponse, RequestIdentity};
use crate::loader::LoadError;
use crate::version::user_agent;
use futures::future::{BoxFuture, FutureExt};
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use std::time::Duration;

/// Connect timeout for remote module requests.
const CONNECT_TIMEOUT_SECS: u64 = 5;

/// Whole-request timeout for remote module requests.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Opaque request/response exchange.
///
/// Implementations report non-success statuses as errors; there is no retry.
pub trait Fetch: Send + Sync {
    fn fetch<'a>(
        &'a self,
        request: &'a RequestIdentity,
    ) -> BoxFuture<'a, Result<CachedResponse, LoadError>>;
}

/// HTTP fetcher over `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    http: Client,
}

impl HttpFetcher {
    /// Create a fetcher with urlpack's default client settings.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be created.
    pub fn new() -> Result<Self, LoadError> {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .user_agent(user_agent())
            .build()
            .map_err(|e| LoadError::client(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { http })
    }

    async fn send(&self, request: &RequestIdentity) -> Result<CachedResponse, LoadError> {
        let url = request.url().as_str();

        let response = self
            .http
            .request(request.method().clone(), request.url().clone())
            .send()
            .await
            .map_err(|e| LoadError::fetch_failed(url, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(LoadError::status(url, status.as_u16()));
        }

        let final_url = response.url().to_string();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let body = response
            .bytes()
            .await
            .map_err(|e| LoadError::fetch_failed(url, format!("Failed to read response body: {e}")))?;

        Ok(CachedResponse {
            url: final_url,
            status: status.as_u16(),
            content_type,
            body,
        })
    }
}

impl Fetch for HttpFetcher {
    fn fetch<'a>(
        &'a self,
        request: &'a RequestIdentity,
    ) -> BoxFuture<'a, Result<CachedResponse, LoadError>> {
        self.send(request).boxed()
    }
}
