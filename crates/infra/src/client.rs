//! Assembled API client
//!
//! Owns the whole pipeline — retry policy, request coordinator, refresh
//! coordinator, credential store and transport — and exposes the verb
//! helpers callers use. One client instance is the single owner of the
//! pending map, the response cache and the refresh handle; `reset` and
//! `sign_out` clear that state explicitly instead of relying on process
//! lifetime.

use std::sync::Arc;

use beacon_core::cache::CacheStats;
use beacon_core::clock::Clock;
use beacon_core::coordinator::RequestCoordinator;
use beacon_core::credentials::CredentialStore;
use beacon_core::ports::{ClientObserver, ScopedStorage, Transport};
use beacon_core::refresh::RefreshCoordinator;
use beacon_core::retry::{RetryOptions, RetryPolicy};
use beacon_domain::{ApiEnvelope, ApiRequest, CallOutcome, Method, Result};
use futures::FutureExt;
use serde_json::Value;
use tracing::info;

use crate::config::{ClientBuilder, ClientConfig};
use crate::http::HttpTransport;

/// Resilient API client: deduplicated, cached, retrying and auth-aware
pub struct ApiClient {
    config: ClientConfig,
    coordinator: Arc<RequestCoordinator>,
    refresh: Arc<RefreshCoordinator>,
    credentials: Arc<CredentialStore>,
    retry: RetryPolicy,
}

impl ApiClient {
    /// Start building a client for `base_url`.
    #[must_use]
    pub fn builder(base_url: impl Into<String>) -> ClientBuilder {
        ClientBuilder::new(base_url)
    }

    /// Wire the pipeline together. Called by [`ClientBuilder::build`].
    pub(crate) fn assemble(
        config: ClientConfig,
        storage: Arc<dyn ScopedStorage>,
        observer: Arc<dyn ClientObserver>,
        transport: Option<Arc<dyn Transport>>,
        clock: Option<Arc<dyn Clock>>,
    ) -> Result<Self> {
        let credentials =
            Arc::new(CredentialStore::new(storage, Arc::clone(&observer)));

        let transport: Arc<dyn Transport> = match transport {
            Some(transport) => transport,
            None => Arc::new(HttpTransport::new(
                &config.base_url,
                config.timeout,
                Arc::clone(&credentials),
            )?),
        };

        let coordinator = Arc::new(match clock {
            Some(clock) => {
                RequestCoordinator::with_clock(config.cache_ttl, config.canonical_keys, clock)
            }
            None => RequestCoordinator::new(config.cache_ttl, config.canonical_keys),
        });

        let refresh = Arc::new(RefreshCoordinator::new(
            transport,
            Arc::clone(&credentials),
            Arc::clone(&observer),
            config.refresh_path.clone(),
        ));

        let retry = RetryPolicy::new(observer);

        Ok(Self { config, coordinator, refresh, credentials, retry })
    }

    /// Execute one logical call through the full pipeline:
    /// cache → single-flight dedup → transport → 401 refresh + replay.
    ///
    /// # Errors
    /// Propagates the transport or refresh error unchanged.
    pub async fn request(&self, request: ApiRequest) -> Result<ApiEnvelope> {
        let refresh = Arc::clone(&self.refresh);
        let owned = request.clone();
        self.coordinator
            .execute(&request, move || {
                async move { refresh.dispatch(&owned).await }.boxed()
            })
            .await
    }

    /// GET `path`.
    ///
    /// # Errors
    /// Propagates the transport or refresh error unchanged.
    pub async fn get(&self, path: &str) -> Result<ApiEnvelope> {
        self.request(ApiRequest::new(Method::Get, path)).await
    }

    /// GET `path` with query parameters.
    ///
    /// # Errors
    /// Propagates the transport or refresh error unchanged.
    pub async fn get_with(&self, path: &str, params: Value) -> Result<ApiEnvelope> {
        self.request(ApiRequest::new(Method::Get, path).with_params(params)).await
    }

    /// POST `data` to `path`.
    ///
    /// # Errors
    /// Propagates the transport or refresh error unchanged.
    pub async fn post(&self, path: &str, data: Value) -> Result<ApiEnvelope> {
        self.request(ApiRequest::new(Method::Post, path).with_data(data)).await
    }

    /// PUT `data` to `path`.
    ///
    /// # Errors
    /// Propagates the transport or refresh error unchanged.
    pub async fn put(&self, path: &str, data: Value) -> Result<ApiEnvelope> {
        self.request(ApiRequest::new(Method::Put, path).with_data(data)).await
    }

    /// PATCH `data` to `path`.
    ///
    /// # Errors
    /// Propagates the transport or refresh error unchanged.
    pub async fn patch(&self, path: &str, data: Value) -> Result<ApiEnvelope> {
        self.request(ApiRequest::new(Method::Patch, path).with_data(data)).await
    }

    /// DELETE `path`.
    ///
    /// # Errors
    /// Propagates the transport or refresh error unchanged.
    pub async fn delete(&self, path: &str) -> Result<ApiEnvelope> {
        self.request(ApiRequest::new(Method::Delete, path)).await
    }

    /// Run a request under the client's default retry options and return a
    /// structured outcome instead of an error.
    pub async fn call(&self, request: ApiRequest) -> CallOutcome {
        let options = self.config.retry.clone();
        self.call_with(request, &options).await
    }

    /// Run a request under explicit retry options.
    pub async fn call_with(&self, request: ApiRequest, options: &RetryOptions) -> CallOutcome {
        self.retry
            .run(options, || {
                let attempt = request.clone();
                async move { self.request(attempt).await }
            })
            .await
    }

    /// Delete every cached response whose key contains `pattern`.
    pub fn invalidate(&self, pattern: &str) -> usize {
        self.coordinator.invalidate(pattern)
    }

    /// Clear the pending map, the response cache and any refresh handle.
    pub fn reset(&self) {
        self.coordinator.reset();
        self.refresh.reset();
        info!("client state reset");
    }

    /// Sign out: clear the stored credential and all coordinator state.
    ///
    /// # Errors
    /// Returns an error only when credential storage fails; coordinator
    /// state is cleared regardless.
    pub fn sign_out(&self) -> Result<()> {
        let cleared = self.credentials.clear();
        self.reset();
        cleared
    }

    /// Credential store, e.g. for persisting a token after login.
    #[must_use]
    pub fn credentials(&self) -> Arc<CredentialStore> {
        Arc::clone(&self.credentials)
    }

    /// Response-cache activity counters.
    #[must_use]
    pub fn cache_stats(&self) -> CacheStats {
        self.coordinator.cache_stats()
    }

    /// The configuration this client was built with.
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }
}
