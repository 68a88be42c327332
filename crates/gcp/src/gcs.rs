//! Google Cloud Storage cache backend
//!
//! Uses the JSON API directly:
//! - metadata `GET /storage/v1/b/{bucket}/o/{object}` for existence
//! - `?alt=media` on the same URL for the payload
//! - `POST /upload/storage/v1/b/{bucket}/o?uploadType=media&name={object}`
//!   for stores
//!
//! Authentication is a bearer token taken from the settings or, failing
//! that, from `gcloud auth print-access-token` on first use. Anonymous mode
//! sends no token and never writes.

use reqwest::blocking::{Client, RequestBuilder};
use reqwest::{StatusCode, Url};
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tidycache_cache::{BackendError, BackendResult, CacheBackend, CacheStats};
use tidycache_core::config::ObjectStoreSettings;
use tidycache_core::{CommandRunner, Digest, SystemCommandRunner};

/// Public GCS endpoint
pub const DEFAULT_ENDPOINT: &str = "https://storage.googleapis.com";

/// Per-request timeout
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

const PROVIDER: &str = "gcs";

/// Backend storing entries as GCS objects.
pub struct GcsBackend {
    client: Client,
    endpoint: Url,
    settings: ObjectStoreSettings,
    runner: Arc<dyn CommandRunner>,
    token: OnceLock<Option<String>>,
}

impl std::fmt::Debug for GcsBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GcsBackend")
            .field("endpoint", &self.endpoint.as_str())
            .field("bucket", &self.settings.bucket)
            .field("folder", &self.settings.folder)
            .field("anonymous", &self.settings.no_credentials)
            .finish_non_exhaustive()
    }
}

impl GcsBackend {
    /// Create a backend for the bucket in `settings`.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::Connection`] if the endpoint is not a valid URL
    /// or the HTTP client cannot be built.
    pub fn new(settings: &ObjectStoreSettings) -> BackendResult<Self> {
        Self::with_runner(settings, Arc::new(SystemCommandRunner))
    }

    /// Like [`GcsBackend::new`], with a custom runner for `gcloud`.
    ///
    /// # Errors
    ///
    /// See [`GcsBackend::new`].
    pub fn with_runner(
        settings: &ObjectStoreSettings,
        runner: Arc<dyn CommandRunner>,
    ) -> BackendResult<Self> {
        let raw = settings.endpoint.as_deref().unwrap_or(DEFAULT_ENDPOINT);
        let endpoint = Url::parse(raw)
            .map_err(|e| BackendError::Connection(format!("Invalid GCS endpoint '{raw}': {e}")))?;
        if endpoint.cannot_be_a_base() {
            return Err(BackendError::Connection(format!(
                "Invalid GCS endpoint '{raw}': not a base URL"
            )));
        }
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| BackendError::Connection(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint,
            settings: settings.clone(),
            runner,
            token: OnceLock::new(),
        })
    }

    /// Object name for `digest`
    #[must_use]
    pub fn object_name(&self, digest: &Digest) -> String {
        self.settings.object_key(digest)
    }

    /// Metadata URL of the object for `digest`
    #[must_use]
    pub fn object_url(&self, digest: &Digest) -> Url {
        self.url(
            &["storage", "v1", "b", &self.settings.bucket, "o", &self.object_name(digest)],
        )
    }

    /// Media upload URL for `digest`
    #[must_use]
    pub fn upload_url(&self, digest: &Digest) -> Url {
        let mut url = self.url(&["upload", "storage", "v1", "b", &self.settings.bucket, "o"]);
        url.query_pairs_mut()
            .append_pair("uploadType", "media")
            .append_pair("name", &self.object_name(digest));
        url
    }

    /// Endpoint with `segments` appended; each segment is percent-encoded so
    /// object names keep their slashes as `%2F`.
    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.endpoint.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn access_token(&self) -> Option<&str> {
        if self.settings.no_credentials {
            return None;
        }
        self.token
            .get_or_init(|| {
                self.settings
                    .access_token
                    .clone()
                    .or_else(|| self.gcloud_token())
            })
            .as_deref()
    }

    fn gcloud_token(&self) -> Option<String> {
        let argv = ["gcloud", "auth", "print-access-token"].map(String::from);
        match self.runner.run(&argv) {
            Ok(output) if output.success() => {
                let token = String::from_utf8_lossy(&output.stdout).trim().to_string();
                (!token.is_empty()).then_some(token)
            }
            Ok(output) => {
                tracing::warn!(
                    stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                    "gcloud could not provide an access token"
                );
                None
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to run gcloud for an access token");
                None
            }
        }
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match self.access_token() {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    fn fetch(&self, operation: &'static str, url: Url) -> Option<reqwest::blocking::Response> {
        match self.authorized(self.client.get(url.clone())).send() {
            Ok(response) if response.status().is_success() => Some(response),
            Ok(response) if response.status() == StatusCode::NOT_FOUND => None,
            Ok(response) => {
                tracing::warn!(url = %url, operation, status = %response.status(), "GCS request failed");
                None
            }
            Err(e) => {
                tracing::warn!(url = %url, operation, error = %e, "GCS unreachable");
                None
            }
        }
    }
}

impl CacheBackend for GcsBackend {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    fn is_cached(&self, digest: &Digest) -> bool {
        self.fetch("is_cached", self.object_url(digest)).is_some()
    }

    fn get_data(&self, digest: &Digest) -> Option<Vec<u8>> {
        let mut url = self.object_url(digest);
        url.query_pairs_mut().append_pair("alt", "media");
        let response = self.fetch("get_data", url)?;
        match response.bytes() {
            Ok(body) => Some(body.to_vec()),
            Err(e) => {
                tracing::warn!(digest = %digest, error = %e, "Failed to read GCS object");
                None
            }
        }
    }

    fn store_with_data(&self, digest: &Digest, data: &[u8]) -> BackendResult<()> {
        if self.settings.writes_disabled() {
            return Ok(());
        }
        let key = self.object_name(digest);
        let request = self
            .client
            .post(self.upload_url(digest))
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(data.to_vec());
        let error = |message: String| BackendError::ObjectStore {
            provider: PROVIDER,
            key: key.clone(),
            message,
        };

        let response = self
            .authorized(request)
            .send()
            .map_err(|e| error(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(error(format!("{status}: {}", body.trim())));
        }
        tracing::debug!(key = %key, bytes = data.len(), "Uploaded entry to GCS");
        Ok(())
    }

    fn query_stats(&self) -> CacheStats {
        CacheStats::new()
    }

    fn clear_stats(&self) -> BackendResult<()> {
        Ok(())
    }
}
