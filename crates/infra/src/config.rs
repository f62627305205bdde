//! Client configuration
//!
//! Builder-validated configuration for the assembled API client. Defaults
//! follow the documented knobs: 30s transport timeout, 5 minute cache TTL,
//! no retries unless a call opts in.

use std::sync::Arc;
use std::time::Duration;

use beacon_core::clock::Clock;
use beacon_core::ports::{ClientObserver, NoopObserver, ScopedStorage, Transport};
use beacon_core::retry::RetryOptions;
use beacon_domain::constants::{DEFAULT_CACHE_TTL_MS, DEFAULT_REFRESH_PATH, DEFAULT_TIMEOUT_MS};
use beacon_domain::{ApiError, Result};
use url::Url;

use crate::client::ApiClient;
use crate::storage::MemoryStorage;

/// Configuration for [`ApiClient`]
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL every request path is appended to
    pub base_url: String,
    /// Transport deadline per dispatch
    pub timeout: Duration,
    /// Maximum age of a cached GET response
    pub cache_ttl: Duration,
    /// Path of the credential refresh endpoint
    pub refresh_path: String,
    /// Sort object keys recursively when building cache keys
    pub canonical_keys: bool,
    /// Retry defaults applied by [`ApiClient::call`]
    pub retry: RetryOptions,
}

impl ClientConfig {
    /// Configuration with the documented defaults for `base_url`.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            cache_ttl: Duration::from_millis(DEFAULT_CACHE_TTL_MS),
            refresh_path: DEFAULT_REFRESH_PATH.to_owned(),
            canonical_keys: false,
            retry: RetryOptions::default(),
        }
    }
}

/// Builder for [`ApiClient`]
pub struct ClientBuilder {
    config: ClientConfig,
    storage: Option<Arc<dyn ScopedStorage>>,
    observer: Option<Arc<dyn ClientObserver>>,
    transport: Option<Arc<dyn Transport>>,
    clock: Option<Arc<dyn Clock>>,
}

impl ClientBuilder {
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            config: ClientConfig::new(base_url),
            storage: None,
            observer: None,
            transport: None,
            clock: None,
        }
    }

    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    #[must_use]
    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.config.cache_ttl = ttl;
        self
    }

    #[must_use]
    pub fn refresh_path(mut self, path: impl Into<String>) -> Self {
        self.config.refresh_path = path.into();
        self
    }

    /// Sort object keys when building cache keys, so logically-identical
    /// requests with differently ordered parameters share a key.
    #[must_use]
    pub fn canonical_keys(mut self, enabled: bool) -> Self {
        self.config.canonical_keys = enabled;
        self
    }

    /// Retry defaults used by [`ApiClient::call`].
    #[must_use]
    pub fn retry(mut self, retry: RetryOptions) -> Self {
        self.config.retry = retry;
        self
    }

    /// Credential persistence backing (defaults to in-memory).
    #[must_use]
    pub fn storage(mut self, storage: Arc<dyn ScopedStorage>) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Subscriber for client notifications.
    #[must_use]
    pub fn observer(mut self, observer: Arc<dyn ClientObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Replace the wire transport. Intended for tests that script responses
    /// without a server.
    #[must_use]
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Clock driving cache expiry. Intended for tests.
    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Validate the configuration and assemble the client.
    ///
    /// # Errors
    /// Returns an error when the base URL does not parse, the timeout is
    /// zero, or the refresh path does not start with `/`.
    pub fn build(self) -> Result<ApiClient> {
        if Url::parse(&self.config.base_url).is_err() {
            return Err(ApiError::Internal(format!(
                "invalid base url: {}",
                self.config.base_url
            )));
        }
        if self.config.timeout.is_zero() {
            return Err(ApiError::Internal("timeout must be greater than zero".into()));
        }
        if !self.config.refresh_path.starts_with('/') {
            return Err(ApiError::Internal(format!(
                "refresh path must be absolute, got {}",
                self.config.refresh_path
            )));
        }

        let storage = self.storage.unwrap_or_else(|| Arc::new(MemoryStorage::new()));
        let observer = self.observer.unwrap_or_else(|| Arc::new(NoopObserver));

        ApiClient::assemble(self.config, storage, observer, self.transport, self.clock)
    }
}
