//! Error types used throughout the API-client core

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::FieldError;

/// Main error type for Beacon API calls
///
/// Variants mirror the three shapes a failed call can take: the server
/// answered with a non-success status, the request went out but nothing came
/// back, or the request never reached the wire at all.
///
/// The type is `Clone` because a settled outcome is shared between every
/// caller that was deduplicated onto the same in-flight request.
#[derive(Error, Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "detail")]
pub enum ApiError {
    /// The server responded with a non-success HTTP status
    #[error("HTTP {status}: {}", .message.as_deref().unwrap_or("request failed"))]
    Status {
        status: u16,
        message: Option<String>,
        #[serde(default)]
        errors: Vec<FieldError>,
    },

    /// The request was dispatched but timed out before a response arrived
    #[error("request timed out")]
    Timeout,

    /// The request was dispatched but no connection could be established
    #[error("no network connectivity")]
    Offline,

    /// The request was dispatched but failed for another transport reason
    #[error("network error: {0}")]
    Network(String),

    /// Credential persistence failed
    #[error("storage error: {0}")]
    Storage(String),

    /// The request could not be constructed or another internal fault occurred
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// HTTP status associated with this error, with `0` as the sentinel for
    /// network-class failures that never produced a response.
    #[must_use]
    pub fn status(&self) -> u16 {
        match self {
            Self::Status { status, .. } => *status,
            _ => 0,
        }
    }

    /// Whether this is a 401 that the refresh coordinator should intercept.
    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Status { status: 401, .. })
    }
}

/// Result type alias for Beacon operations
pub type Result<T> = std::result::Result<T, ApiError>;
