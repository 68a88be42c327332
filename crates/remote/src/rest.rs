//! REST cache service backend
//!
//! Talks to a `clang-tidy-cache` compatible HTTP service:
//! - `GET /is_cached/{digest}` returns a JSON bool
//! - `GET /cache/{digest}` returns the stored payload
//! - `PUT /cache/{digest}` stores the form field `data`
//! - `GET /stats` returns the service's statistics object
//!
//! Every failure is logged and turned into a miss; the service is never
//! allowed to break a lint run.

use reqwest::StatusCode;
use reqwest::header::CONTENT_TYPE;
use reqwest::blocking::{Client, Response};
use std::time::Duration;
use tidycache_cache::{BackendError, BackendResult, CacheBackend, CacheStats};
use tidycache_core::Digest;
use tidycache_core::config::RestSettings;

/// Per-request timeout
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(3);

/// Backend for the REST cache service.
#[derive(Debug)]
pub struct RestBackend {
    client: Client,
    base_url: String,
    read_only: bool,
}

impl RestBackend {
    /// Create a backend for the service described by `settings`.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::Connection`] if the HTTP client cannot be built.
    pub fn new(settings: &RestSettings) -> BackendResult<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| BackendError::Connection(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: settings.base_url(),
            read_only: settings.read_only,
        })
    }

    /// Service base URL
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, route: &str) -> String {
        format!("{}/{route}", self.base_url)
    }

    fn get(&self, operation: &'static str, url: &str) -> Option<Response> {
        match self.client.get(url).send() {
            Ok(response) if response.status() == StatusCode::OK => Some(response),
            Ok(response) if response.status() == StatusCode::NOT_FOUND => None,
            Ok(response) => {
                tracing::error!(
                    url = %url,
                    operation,
                    status = %response.status(),
                    "Cache service returned an error"
                );
                None
            }
            Err(e) => {
                tracing::debug!(url = %url, operation, error = %e, "Cache service unreachable");
                None
            }
        }
    }
}

impl CacheBackend for RestBackend {
    fn name(&self) -> &'static str {
        "rest"
    }

    fn is_cached(&self, digest: &Digest) -> bool {
        let url = self.url(&format!("is_cached/{digest}"));
        let Some(response) = self.get("is_cached", &url) else {
            return false;
        };
        match response.json::<serde_json::Value>() {
            Ok(serde_json::Value::Bool(hit)) => hit,
            Ok(other) => {
                tracing::error!(url = %url, body = %other, "Unexpected is_cached response");
                false
            }
            Err(e) => {
                tracing::error!(url = %url, error = %e, "Invalid is_cached response");
                false
            }
        }
    }

    fn get_data(&self, digest: &Digest) -> Option<Vec<u8>> {
        let url = self.url(&format!("cache/{digest}"));
        let response = self.get("get_data", &url)?;
        match response.bytes() {
            Ok(body) => Some(body.to_vec()),
            Err(e) => {
                tracing::warn!(url = %url, error = %e, "Failed to read cache payload");
                None
            }
        }
    }

    fn store_with_data(&self, digest: &Digest, data: &[u8]) -> BackendResult<()> {
        if self.read_only {
            return Ok(());
        }
        let url = self.url(&format!("cache/{digest}"));
        let request = self
            .client
            .put(&url)
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(form_body(data));
        match request.send() {
            Ok(response) if response.status() == StatusCode::OK => {
                tracing::debug!(digest = %digest, "Stored entry on cache service");
            }
            Ok(response) => {
                tracing::error!(url = %url, status = %response.status(), "Cache service rejected store");
            }
            Err(e) => {
                tracing::warn!(url = %url, error = %e, "Cache service unreachable");
            }
        }
        Ok(())
    }

    fn query_stats(&self) -> CacheStats {
        let url = self.url("stats");
        self.get("query_stats", &url)
            .and_then(|response| response.json::<serde_json::Value>().ok())
            .and_then(CacheStats::from_value)
            .unwrap_or_default()
    }

    fn clear_stats(&self) -> BackendResult<()> {
        // The service owns its counters
        Ok(())
    }
}

/// `data=<payload>` form body. The payload is percent-encoded byte by byte,
/// so non-UTF-8 output survives the round trip.
fn form_body(data: &[u8]) -> String {
    let mut body = String::from("data=");
    body.extend(url::form_urlencoded::byte_serialize(data));
    body
}
