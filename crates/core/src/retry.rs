//! Retry policy with bounded exponential backoff
//!
//! Wraps a request operation in an explicit attempt loop: failures are
//! classified, retried only while attempts remain and the status is in the
//! retryable set (or is the status-0 network sentinel), and the delay before
//! attempt *k* is `base_delay * 2^(k-1)`. This is the sole boundary that
//! converts terminal failures into structured values instead of errors.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use beacon_domain::constants::{
    DEFAULT_BASE_DELAY_MS, DEFAULT_MAX_RETRIES, DEFAULT_RETRYABLE_STATUSES, NETWORK_ERROR_STATUS,
};
use beacon_domain::{ApiEnvelope, CallOutcome, ErrorInfo, Result};
use tracing::{debug, warn};

use crate::classifier::classify_and_report;
use crate::ports::{ClientObserver, NoopObserver};

/// Hook invoked before each backoff wait: `(attempt, max_retries, info)`
pub type RetryHook = Arc<dyn Fn(u32, u32, &ErrorInfo) + Send + Sync>;

/// Per-call retry configuration
#[derive(Clone)]
pub struct RetryOptions {
    /// Number of retries after the initial attempt
    pub retries: u32,
    /// Delay before the first retry; doubles each subsequent retry
    pub base_delay: Duration,
    /// HTTP statuses eligible for retry (status 0 is always eligible)
    pub retryable_statuses: Vec<u16>,
    /// Observer for retry progress, fired before each wait
    pub on_retry: Option<RetryHook>,
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            retries: DEFAULT_MAX_RETRIES,
            base_delay: Duration::from_millis(DEFAULT_BASE_DELAY_MS),
            retryable_statuses: DEFAULT_RETRYABLE_STATUSES.to_vec(),
            on_retry: None,
        }
    }
}

impl std::fmt::Debug for RetryOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryOptions")
            .field("retries", &self.retries)
            .field("base_delay", &self.base_delay)
            .field("retryable_statuses", &self.retryable_statuses)
            .field("on_retry", &self.on_retry.is_some())
            .finish()
    }
}

impl RetryOptions {
    #[must_use]
    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    #[must_use]
    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    #[must_use]
    pub fn with_retryable_statuses(mut self, statuses: Vec<u16>) -> Self {
        self.retryable_statuses = statuses;
        self
    }

    #[must_use]
    pub fn with_on_retry(mut self, hook: RetryHook) -> Self {
        self.on_retry = Some(hook);
        self
    }
}

/// Retry boundary around request operations
pub struct RetryPolicy {
    observer: Arc<dyn ClientObserver>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { observer: Arc::new(NoopObserver) }
    }
}

impl RetryPolicy {
    /// Create a policy that reports classifications through `observer`.
    #[must_use]
    pub fn new(observer: Arc<dyn ClientObserver>) -> Self {
        Self { observer }
    }

    /// Run `op` with retries per `options` and return a structured outcome.
    ///
    /// The backoff delay strictly precedes the next dispatch, and the
    /// `on_retry` hook fires before each wait.
    pub async fn run<F, Fut>(&self, options: &RetryOptions, mut op: F) -> CallOutcome
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<ApiEnvelope>>,
    {
        let mut attempt: u32 = 0;

        loop {
            match op().await {
                Ok(envelope) => {
                    if attempt > 0 {
                        debug!(attempts = attempt + 1, "operation succeeded after retry");
                    }
                    return CallOutcome::Success { data: envelope.data, message: envelope.message };
                }
                Err(error) => {
                    let mut info = classify_and_report(&error, None, self.observer.as_ref());

                    let eligible = attempt < options.retries
                        && (info.status == NETWORK_ERROR_STATUS
                            || options.retryable_statuses.contains(&info.status));

                    if !eligible {
                        if options.retries > 0 {
                            warn!(
                                attempts = attempt + 1,
                                status = info.status,
                                "giving up on retried operation"
                            );
                        }
                        // Terminal for this call, whatever the status class
                        info.retryable = false;
                        return CallOutcome::Failure { info };
                    }

                    attempt += 1;
                    if let Some(hook) = &options.on_retry {
                        hook(attempt, options.retries, &info);
                    }

                    let delay =
                        options.base_delay.saturating_mul(2u32.saturating_pow(attempt - 1));
                    warn!(
                        attempt,
                        max_retries = options.retries,
                        status = info.status,
                        delay = ?delay,
                        "attempt failed, backing off"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}
