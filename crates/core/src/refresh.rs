//! Refresh coordinator
//!
//! Intercepts 401 responses, performs at most one concurrent
//! credential-refresh call system-wide, and replays the original request
//! with the new credential. Every 401 that arrives while a refresh is in
//! flight attaches to the same handle instead of dispatching another call.
//!
//! A request is only ever refreshed once: the replay carries the one-shot
//! `auth_retry` flag, so a second 401 for the same logical call propagates
//! instead of looping.

use std::sync::Arc;

use beacon_domain::{ApiEnvelope, ApiError, ApiRequest, Method, Result};
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::credentials::CredentialStore;
use crate::ports::{ClientObserver, Transport};

/// Singleton handle to the in-flight refresh call
type RefreshFuture = Shared<BoxFuture<'static, Result<String>>>;

/// Refresh endpoint payload: `{data: {accessToken}}`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshPayload {
    access_token: String,
}

/// Shared refresh state, owned once and handed to the spawned refresh call
struct RefreshState {
    transport: Arc<dyn Transport>,
    credentials: Arc<CredentialStore>,
    observer: Arc<dyn ClientObserver>,
    refresh_path: String,
    handle: Mutex<Option<RefreshFuture>>,
}

impl RefreshState {
    async fn run_refresh(&self) -> Result<String> {
        info!("refreshing access credential");

        match self.attempt_refresh().await {
            Ok(token) => {
                info!("credential refresh succeeded");
                Ok(token)
            }
            Err(error) => {
                warn!(error = %error, "credential refresh failed, session is irrecoverable");
                // The session is over either way; storage failures here
                // cannot change that
                let _ = self.credentials.clear();
                self.observer.session_invalidated();
                Err(error)
            }
        }
    }

    async fn attempt_refresh(&self) -> Result<String> {
        // Pre-marked so a 401 from the refresh endpoint can never recurse
        let request = ApiRequest::new(Method::Post, self.refresh_path.clone()).into_auth_retry();
        let envelope = self.transport.dispatch(&request).await?;
        let payload: RefreshPayload = envelope.decode()?;

        // Persisting reuses the saved remember preference, keeping the
        // credential in its existing storage scope
        self.credentials.store(&payload.access_token, None, None)?;
        Ok(payload.access_token)
    }
}

/// Spawn the refresh call eagerly so it settles regardless of waiter
/// interest.
fn spawn_refresh(state: &Arc<RefreshState>) -> RefreshFuture {
    let state = Arc::clone(state);
    let task = tokio::spawn(async move { state.run_refresh().await });

    async move {
        match task.await {
            Ok(result) => result,
            Err(err) => Err(ApiError::Internal(format!("refresh task failed: {err}"))),
        }
    }
    .boxed()
    .shared()
}

/// 401 interception and at-most-once credential refresh
pub struct RefreshCoordinator {
    state: Arc<RefreshState>,
}

impl RefreshCoordinator {
    #[must_use]
    pub fn new(
        transport: Arc<dyn Transport>,
        credentials: Arc<CredentialStore>,
        observer: Arc<dyn ClientObserver>,
        refresh_path: impl Into<String>,
    ) -> Self {
        Self {
            state: Arc::new(RefreshState {
                transport,
                credentials,
                observer,
                refresh_path: refresh_path.into(),
                handle: Mutex::new(None),
            }),
        }
    }

    /// Dispatch `request`, refreshing the credential and replaying once if
    /// the response is a 401 and the request has not already been retried
    /// for auth.
    ///
    /// # Errors
    /// Propagates the transport error, or the refresh error when the
    /// refresh itself fails.
    pub async fn dispatch(&self, request: &ApiRequest) -> Result<ApiEnvelope> {
        match self.state.transport.dispatch(request).await {
            Err(error) if error.is_unauthorized() && !request.auth_retry => {
                debug!(
                    path = %request.path,
                    correlation_id = %request.correlation_id,
                    "received 401, waiting for credential refresh"
                );
                self.refresh_access_token().await?;

                let replay = request.clone().into_auth_retry();
                self.state.transport.dispatch(&replay).await
            }
            other => other,
        }
    }

    /// Await the shared refresh, creating it if none is in flight.
    ///
    /// Creation is a synchronous test-and-set under the handle lock, so two
    /// racing 401s can never dispatch two refresh calls. The creator clears
    /// the slot once the refresh settles.
    async fn refresh_access_token(&self) -> Result<String> {
        let (future, owner) = {
            let mut slot = self.state.handle.lock();
            match slot.as_ref() {
                Some(existing) => (existing.clone(), false),
                None => {
                    let future = spawn_refresh(&self.state);
                    *slot = Some(future.clone());
                    (future, true)
                }
            }
        };

        let result = future.await;
        if owner {
            *self.state.handle.lock() = None;
        }
        result
    }

    /// Whether a refresh call is currently outstanding.
    #[must_use]
    pub fn refresh_in_flight(&self) -> bool {
        self.state.handle.lock().is_some()
    }

    /// Drop any in-flight handle reference (sign-out).
    pub fn reset(&self) {
        *self.state.handle.lock() = None;
    }
}
