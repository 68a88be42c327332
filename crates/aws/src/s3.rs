//! Amazon S3 cache backend
//!
//! Objects live at `<folder>/<shard>/<suffix>` in the configured bucket.
//! The SDK is async; the backend owns a current-thread runtime and blocks on
//! each request so it fits the synchronous [`CacheBackend`] interface.

use aws_config::meta::region::RegionProviderChain;
use aws_config::{BehaviorVersion, ConfigLoader, Region};
use aws_sdk_s3::Client;
use aws_sdk_s3::config::RequestChecksumCalculation;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use tidycache_cache::{BackendError, BackendResult, CacheBackend, CacheStats};
use tidycache_core::Digest;
use tidycache_core::config::ObjectStoreSettings;
use tokio::runtime::Runtime;

/// Region used when none is configured in the environment
pub const FALLBACK_REGION: &str = "us-east-1";

const PROVIDER: &str = "s3";

/// Backend storing entries as S3 objects.
pub struct S3Backend {
    client: Client,
    runtime: Runtime,
    settings: ObjectStoreSettings,
}

impl std::fmt::Debug for S3Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Backend")
            .field("bucket", &self.settings.bucket)
            .field("folder", &self.settings.folder)
            .field("anonymous", &self.settings.no_credentials)
            .finish_non_exhaustive()
    }
}

impl S3Backend {
    /// Create a backend using the standard AWS configuration chain.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::Unavailable`] if the async runtime cannot start.
    pub fn new(settings: &ObjectStoreSettings) -> BackendResult<Self> {
        Self::with_loader(settings, |loader| loader)
    }

    /// Create a backend after adjusting the AWS config loader, e.g. to pin
    /// credentials or a region.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::Unavailable`] if the async runtime cannot start.
    pub fn with_loader<F>(settings: &ObjectStoreSettings, customize: F) -> BackendResult<Self>
    where
        F: FnOnce(ConfigLoader) -> ConfigLoader,
    {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| BackendError::Unavailable(format!("Failed to start runtime: {e}")))?;

        let mut loader = aws_config::defaults(BehaviorVersion::latest()).region(
            RegionProviderChain::default_provider().or_else(Region::new(FALLBACK_REGION)),
        );
        if settings.no_credentials {
            loader = loader.no_credentials();
        }
        let sdk_config = runtime.block_on(customize(loader).load());

        let mut builder = aws_sdk_s3::config::Builder::from(&sdk_config);
        if let Some(endpoint) = &settings.endpoint {
            // S3-compatible stores generally want path-style URLs and
            // plain request bodies
            builder = builder
                .endpoint_url(endpoint)
                .force_path_style(true)
                .request_checksum_calculation(RequestChecksumCalculation::WhenRequired);
        }

        tracing::debug!(
            bucket = %settings.bucket,
            folder = %settings.folder,
            anonymous = settings.no_credentials,
            "S3 backend ready"
        );

        Ok(Self {
            client: Client::from_conf(builder.build()),
            runtime,
            settings: settings.clone(),
        })
    }

    /// Object key for `digest`
    #[must_use]
    pub fn key(&self, digest: &Digest) -> String {
        self.settings.object_key(digest)
    }
}

impl CacheBackend for S3Backend {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    fn is_cached(&self, digest: &Digest) -> bool {
        let key = self.key(digest);
        let result = self.runtime.block_on(
            self.client
                .head_object()
                .bucket(&self.settings.bucket)
                .key(&key)
                .send(),
        );
        match result {
            Ok(_) => true,
            Err(e) if e.as_service_error().is_some_and(|se| se.is_not_found()) => false,
            Err(e) => {
                tracing::warn!(key = %key, error = %DisplayErrorContext(&e), "S3 lookup failed");
                false
            }
        }
    }

    fn get_data(&self, digest: &Digest) -> Option<Vec<u8>> {
        let key = self.key(digest);
        let response = self.runtime.block_on(
            self.client
                .get_object()
                .bucket(&self.settings.bucket)
                .key(&key)
                .send(),
        );
        let output = match response {
            Ok(output) => output,
            Err(e) if e.as_service_error().is_some_and(|se| se.is_no_such_key()) => return None,
            Err(e) => {
                tracing::warn!(key = %key, error = %DisplayErrorContext(&e), "S3 download failed");
                return None;
            }
        };
        match self.runtime.block_on(output.body.collect()) {
            Ok(body) => Some(body.into_bytes().to_vec()),
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Failed to read S3 object body");
                None
            }
        }
    }

    fn store_with_data(&self, digest: &Digest, data: &[u8]) -> BackendResult<()> {
        if self.settings.writes_disabled() {
            return Ok(());
        }
        let key = self.key(digest);
        self.runtime
            .block_on(
                self.client
                    .put_object()
                    .bucket(&self.settings.bucket)
                    .key(&key)
                    .body(ByteStream::from(data.to_vec()))
                    .send(),
            )
            .map_err(|e| BackendError::ObjectStore {
                provider: PROVIDER,
                key: key.clone(),
                message: DisplayErrorContext(&e).to_string(),
            })?;
        tracing::debug!(key = %key, bytes = data.len(), "Uploaded entry to S3");
        Ok(())
    }

    fn query_stats(&self) -> CacheStats {
        CacheStats::new()
    }

    fn clear_stats(&self) -> BackendResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> ObjectStoreSettings {
        ObjectStoreSettings {
            bucket: "lint-cache".to_string(),
            folder: "clang-tidy-cache".to_string(),
            no_credentials: true,
            read_only: false,
            endpoint: Some("http://127.0.0.1:1".to_string()),
            access_token: None,
        }
    }

    #[test]
    fn test_key_layout() {
        let backend = S3Backend::with_loader(&settings(), |l| l.region(Region::new("eu-west-1")))
            .unwrap();
        let digest = Digest::parse(&format!("ab{}", "c".repeat(62))).unwrap();
        assert_eq!(
            backend.key(&digest),
            format!("clang-tidy-cache/ab/{}", "c".repeat(62))
        );
    }

    #[test]
    fn test_anonymous_store_is_noop() {
        let backend = S3Backend::with_loader(&settings(), |l| l.region(Region::new("eu-west-1")))
            .unwrap();
        let digest = Digest::parse(&"1".repeat(64)).unwrap();
        // The endpoint is unreachable, so any attempted upload would fail
        assert!(backend.store_with_data(&digest, b"\x00").is_ok());
    }
}
