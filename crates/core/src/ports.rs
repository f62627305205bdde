//! Port interfaces for the API-client core
//!
//! These traits define the boundaries between the coordination logic and
//! infrastructure implementations: the wire transport, the key/value
//! persistence primitive backing credential storage, and the observer
//! surface consumed by UI and observability collaborators.

use async_trait::async_trait;
use beacon_domain::{ApiEnvelope, ApiRequest, DiagnosticEvent, ErrorInfo, Result, StorageScope};

/// Trait for issuing actual network calls
///
/// Implementations attach the current credential as an authorization header
/// and normalize responses into the `{success, data, message}` envelope.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Dispatch a single request and return its envelope or error.
    async fn dispatch(&self, request: &ApiRequest) -> Result<ApiEnvelope>;
}

/// Trait for the key/value persistence primitive backing credential storage
///
/// Two mutually exclusive scopes mirror durable vs session-scoped browser
/// storage. Implementations are expected to be cheap and non-blocking.
pub trait ScopedStorage: Send + Sync {
    /// Read a value from the given scope.
    fn get(&self, scope: StorageScope, key: &str) -> Result<Option<String>>;

    /// Write a value into the given scope.
    fn set(&self, scope: StorageScope, key: &str, value: &str) -> Result<()>;

    /// Remove a value from the given scope.
    fn remove(&self, scope: StorageScope, key: &str) -> Result<()>;
}

/// Observer surface for client notifications
///
/// Replaces the original global event dispatch with an explicit
/// subscription interface owned by the client. All methods have empty
/// defaults so implementors subscribe only to what they need.
///
/// Implementations must not block and must not panic: they are invoked
/// inline from classification and refresh paths.
pub trait ClientObserver: Send + Sync {
    /// A new credential was stored after login or refresh.
    fn credential_refreshed(&self, _token: &str, _expires_at: Option<i64>) {}

    /// A request was rejected with 429.
    fn rate_limited(&self, _info: &ErrorInfo) {}

    /// The session is irrecoverable (refresh failed); the navigation
    /// collaborator should force sign-out.
    fn session_invalidated(&self) {}

    /// Diagnostic capture for 5xx and network-class failures.
    fn diagnostic(&self, _event: &DiagnosticEvent) {}
}

/// Observer that ignores every notification.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl ClientObserver for NoopObserver {}
