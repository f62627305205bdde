//! Request, response and classification types for the API-client core
//!
//! These are the envelope shapes the client pipeline coordinates around:
//! the outbound request description, the `{success, data, message}` success
//! envelope, the `{message, errors[]}` failure body, the classified error
//! info produced by the error classifier, and the structured value the retry
//! boundary hands back to callers.

use chrono::{DateTime, TimeZone, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{ApiError, Result};

/// HTTP method of an outbound request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
}

impl Method {
    /// Uppercase wire representation, also used in canonical cache keys.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
            Self::Head => "HEAD",
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Description of one logical outbound call
///
/// `auth_retry` is the one-shot retried-for-auth flag: it is set before a
/// request is replayed after a credential refresh so a second 401 can never
/// trigger another refresh cycle for the same logical call.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub params: Option<Value>,
    pub data: Option<Value>,
    pub skip_cache: bool,
    pub auth_retry: bool,
    /// Correlation id surfaced in diagnostic events for this request
    pub correlation_id: String,
}

impl ApiRequest {
    /// Create a request for `path` with a fresh correlation id.
    #[must_use]
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            params: None,
            data: None,
            skip_cache: false,
            auth_retry: false,
            correlation_id: uuid::Uuid::new_v4().to_string(),
        }
    }

    #[must_use]
    pub fn with_params(mut self, params: Value) -> Self {
        self.params = Some(params);
        self
    }

    #[must_use]
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    #[must_use]
    pub fn with_skip_cache(mut self, skip: bool) -> Self {
        self.skip_cache = skip;
        self
    }

    /// Mark this request as already retried for auth and return it.
    #[must_use]
    pub fn into_auth_retry(mut self) -> Self {
        self.auth_retry = true;
        self
    }
}

fn default_true() -> bool {
    true
}

/// Success envelope returned by the API: `{success, data, message}`
///
/// `success` defaults to `true` when absent so bare `{data: ...}` payloads
/// (e.g. the refresh endpoint) still parse as envelopes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiEnvelope {
    #[serde(default = "default_true")]
    pub success: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ApiEnvelope {
    /// Wrap a raw payload in a successful envelope.
    #[must_use]
    pub fn of_data(data: Value) -> Self {
        Self { success: true, data: Some(data), message: None }
    }

    /// Deserialize the `data` payload into a typed value.
    ///
    /// # Errors
    /// Returns an error if `data` is absent or does not match `T`.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        let data = self
            .data
            .clone()
            .ok_or_else(|| ApiError::Internal("response envelope has no data".into()))?;
        serde_json::from_value(data)
            .map_err(|e| ApiError::Internal(format!("failed to decode response data: {e}")))
    }
}

/// One entry of a failure body's `errors[]` list
///
/// Validation failures carry field-level objects; some endpoints send plain
/// strings. Both shapes are accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldError {
    Message(String),
    Field { field: String, message: String },
}

impl FieldError {
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::Message(message) | Self::Field { message, .. } => message,
        }
    }

    #[must_use]
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::Message(_) => None,
            Self::Field { field, .. } => Some(field),
        }
    }
}

/// Failure body returned by the API: `{message, errors[]}`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<FieldError>,
}

/// Fixed classification taxonomy for terminal failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    /// 4xx with field-level errors
    Validation,
    /// 429
    RateLimited,
    /// 503
    ServiceUnavailable,
    /// Other 5xx
    Server,
    /// 404
    NotFound,
    /// 401
    Unauthorized,
    /// 403
    Forbidden,
    /// Request timed out before a response arrived
    Timeout,
    /// No connectivity
    Offline,
    /// Other network-level failure, no response
    Network,
    /// No response and no dispatched request
    Unknown,
}

impl ErrorKind {
    /// Timeout, offline and generic network failures all share the
    /// status-0 network class.
    #[must_use]
    pub fn is_network_error(&self) -> bool {
        matches!(self, Self::Timeout | Self::Offline | Self::Network | Self::Unknown)
    }

    #[must_use]
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, Self::RateLimited)
    }

    #[must_use]
    pub fn is_service_unavailable(&self) -> bool {
        matches!(self, Self::ServiceUnavailable)
    }
}

/// Classified error information with a user-facing message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub kind: ErrorKind,
    /// HTTP status, `0` for network-class failures
    pub status: u16,
    /// Short human-readable message safe to surface to the end user
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<FieldError>,
    /// Whether a retry policy would consider this failure retryable
    pub retryable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
}

/// Structured result of a retried call
///
/// The retry policy is the only layer that converts terminal failures into
/// values instead of propagating them as errors.
#[derive(Debug, Clone, PartialEq)]
pub enum CallOutcome {
    Success { data: Option<Value>, message: Option<String> },
    Failure { info: ErrorInfo },
}

impl CallOutcome {
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    #[must_use]
    pub fn data(&self) -> Option<&Value> {
        match self {
            Self::Success { data, .. } => data.as_ref(),
            Self::Failure { .. } => None,
        }
    }

    #[must_use]
    pub fn error_info(&self) -> Option<&ErrorInfo> {
        match self {
            Self::Success { .. } => None,
            Self::Failure { info } => Some(info),
        }
    }
}

/// Storage scope for persisted credentials
///
/// At most one scope holds a non-empty token at any time; writing to one
/// scope clears the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StorageScope {
    /// Survives the session (the "remember me" scope)
    Durable,
    /// Discarded with the session
    Session,
}

impl StorageScope {
    #[must_use]
    pub fn other(&self) -> Self {
        match self {
            Self::Durable => Self::Session,
            Self::Session => Self::Durable,
        }
    }
}

/// Credential material as read back from storage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialRecord {
    pub token: Option<String>,
    /// Expiry in epoch milliseconds, when known
    pub expires_at: Option<i64>,
    pub remember_me: bool,
}

impl CredentialRecord {
    /// Empty record carrying only the remembered preference.
    #[must_use]
    pub fn empty(remember_me: bool) -> Self {
        Self { token: None, expires_at: None, remember_me }
    }

    /// Expiry as a wall-clock timestamp, when known and in range.
    #[must_use]
    pub fn expires_at_datetime(&self) -> Option<DateTime<Utc>> {
        self.expires_at.and_then(|ms| Utc.timestamp_millis_opt(ms).single())
    }
}

/// Diagnostic event forwarded to the observability collaborator for 5xx and
/// network-class failures
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosticEvent {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    pub status: u16,
    pub message: String,
}
