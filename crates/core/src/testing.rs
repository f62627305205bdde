//! Test support: in-memory port implementations
//!
//! Deterministic stand-ins for the transport, storage and observer ports,
//! used by this crate's own tests and by downstream integration tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use beacon_domain::{
    ApiEnvelope, ApiError, ApiRequest, DiagnosticEvent, ErrorInfo, Result, StorageScope,
};
use parking_lot::Mutex;

use crate::ports::{ClientObserver, ScopedStorage, Transport};

/// In-memory `ScopedStorage` holding both scopes in one map.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    cells: Mutex<HashMap<(StorageScope, String), String>>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl ScopedStorage for MemoryStorage {
    fn get(&self, scope: StorageScope, key: &str) -> Result<Option<String>> {
        Ok(self.cells.lock().get(&(scope, key.to_owned())).cloned())
    }

    fn set(&self, scope: StorageScope, key: &str, value: &str) -> Result<()> {
        self.cells.lock().insert((scope, key.to_owned()), value.to_owned());
        Ok(())
    }

    fn remove(&self, scope: StorageScope, key: &str) -> Result<()> {
        self.cells.lock().remove(&(scope, key.to_owned()));
        Ok(())
    }
}

/// Observer that records every notification it receives.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    pub refreshed: Mutex<Vec<(String, Option<i64>)>>,
    pub rate_limits: Mutex<Vec<ErrorInfo>>,
    pub invalidations: Mutex<usize>,
    pub diagnostics: Mutex<Vec<DiagnosticEvent>>,
}

impl RecordingObserver {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    #[must_use]
    pub fn session_invalidations(&self) -> usize {
        *self.invalidations.lock()
    }
}

impl ClientObserver for RecordingObserver {
    fn credential_refreshed(&self, token: &str, expires_at: Option<i64>) {
        self.refreshed.lock().push((token.to_owned(), expires_at));
    }

    fn rate_limited(&self, info: &ErrorInfo) {
        self.rate_limits.lock().push(info.clone());
    }

    fn session_invalidated(&self) {
        *self.invalidations.lock() += 1;
    }

    fn diagnostic(&self, event: &DiagnosticEvent) {
        self.diagnostics.lock().push(event.clone());
    }
}

/// Transport that replays scripted results per path and records every
/// dispatched request.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    responses: Mutex<HashMap<String, VecDeque<Result<ApiEnvelope>>>>,
    latency: Mutex<std::time::Duration>,
    pub dispatched: Mutex<Vec<ApiRequest>>,
}

impl ScriptedTransport {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queue the next result for requests to `path`.
    pub fn script(&self, path: &str, result: Result<ApiEnvelope>) {
        self.responses.lock().entry(path.to_owned()).or_default().push_back(result);
    }

    /// Delay every dispatch, so tests can force calls to overlap.
    pub fn set_latency(&self, latency: std::time::Duration) {
        *self.latency.lock() = latency;
    }

    /// Number of dispatches seen for `path`.
    #[must_use]
    pub fn calls_to(&self, path: &str) -> usize {
        self.dispatched.lock().iter().filter(|r| r.path == path).count()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn dispatch(&self, request: &ApiRequest) -> Result<ApiEnvelope> {
        self.dispatched.lock().push(request.clone());

        let latency = *self.latency.lock();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        let next = self
            .responses
            .lock()
            .get_mut(&request.path)
            .and_then(VecDeque::pop_front);

        next.unwrap_or_else(|| {
            Err(ApiError::Internal(format!("no scripted response for {}", request.path)))
        })
    }
}
