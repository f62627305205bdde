//! Error classifier
//!
//! Pure mapping from a raw transport failure into the fixed taxonomy with a
//! short user-facing message, the originating HTTP status (0 for
//! network-class failures) and any field-level errors from the response
//! body. Raw transport detail goes to diagnostics, never to the end user.

use beacon_domain::constants::{DEFAULT_RETRYABLE_STATUSES, NETWORK_ERROR_STATUS};
use beacon_domain::{ApiError, DiagnosticEvent, ErrorInfo, ErrorKind};
use tracing::warn;

use crate::ports::ClientObserver;

const MSG_RATE_LIMIT: &str = "Too many requests. Please slow down and try again.";
const MSG_SERVICE_UNAVAILABLE: &str = "Service temporarily unavailable. Please try again shortly.";
const MSG_SERVER: &str = "Something went wrong on our end. Please try again.";
const MSG_NOT_FOUND: &str = "The requested resource was not found.";
const MSG_SESSION_EXPIRED: &str = "Your session has expired. Please sign in again.";
const MSG_FORBIDDEN: &str = "You do not have permission to perform this action.";
const MSG_REQUEST_FAILED: &str = "Request failed. Please try again.";
const MSG_TIMEOUT: &str = "The request timed out. Check your connection and try again.";
const MSG_OFFLINE: &str = "You appear to be offline. Check your connection.";
const MSG_NETWORK: &str = "A network error occurred. Please try again.";

fn is_retryable_status(status: u16) -> bool {
    status == NETWORK_ERROR_STATUS || DEFAULT_RETRYABLE_STATUSES.contains(&status)
}

/// Classify a raw failure into structured, user-presentable error info.
#[must_use]
pub fn classify(error: &ApiError, correlation_id: Option<&str>) -> ErrorInfo {
    let (kind, status, message, errors) = match error {
        ApiError::Status { status, message, errors } => {
            let (kind, text) = match *status {
                429 => (ErrorKind::RateLimited, MSG_RATE_LIMIT.to_owned()),
                503 => (ErrorKind::ServiceUnavailable, MSG_SERVICE_UNAVAILABLE.to_owned()),
                s if s >= 500 => (ErrorKind::Server, MSG_SERVER.to_owned()),
                404 => (ErrorKind::NotFound, MSG_NOT_FOUND.to_owned()),
                401 => (ErrorKind::Unauthorized, MSG_SESSION_EXPIRED.to_owned()),
                403 => (ErrorKind::Forbidden, MSG_FORBIDDEN.to_owned()),
                // Remaining 4xx family: validation-shaped, with whatever
                // field errors the body carried
                _ => {
                    let text =
                        message.clone().unwrap_or_else(|| MSG_REQUEST_FAILED.to_owned());
                    (ErrorKind::Validation, text)
                }
            };
            (kind, *status, text, errors.clone())
        }
        ApiError::Timeout => {
            (ErrorKind::Timeout, NETWORK_ERROR_STATUS, MSG_TIMEOUT.to_owned(), Vec::new())
        }
        ApiError::Offline => {
            (ErrorKind::Offline, NETWORK_ERROR_STATUS, MSG_OFFLINE.to_owned(), Vec::new())
        }
        ApiError::Network(_) => {
            (ErrorKind::Network, NETWORK_ERROR_STATUS, MSG_NETWORK.to_owned(), Vec::new())
        }
        ApiError::Storage(raw) | ApiError::Internal(raw) => {
            (ErrorKind::Unknown, NETWORK_ERROR_STATUS, friendly_unknown(raw), Vec::new())
        }
    };

    ErrorInfo {
        kind,
        status,
        message,
        errors,
        retryable: is_retryable_status(status),
        correlation_id: correlation_id.map(str::to_owned),
    }
}

/// Map a small set of well-known raw failure texts to friendlier wording.
fn friendly_unknown(raw: &str) -> String {
    if raw.contains("Network Error") || raw.contains("Failed to fetch") {
        MSG_NETWORK.to_owned()
    } else if raw.to_ascii_lowercase().contains("timeout") {
        MSG_TIMEOUT.to_owned()
    } else {
        MSG_REQUEST_FAILED.to_owned()
    }
}

/// Classify and forward the collaborator notifications this failure calls
/// for: diagnostic capture for 5xx and network-class failures, and the
/// rate-limit event for 429.
///
/// The observer calls sit outside classification proper; implementations
/// must not block (see [`ClientObserver`]).
#[must_use]
pub fn classify_and_report(
    error: &ApiError,
    correlation_id: Option<&str>,
    observer: &dyn ClientObserver,
) -> ErrorInfo {
    let info = classify(error, correlation_id);

    if info.status >= 500 || info.kind.is_network_error() {
        warn!(
            status = info.status,
            kind = ?info.kind,
            correlation_id = info.correlation_id.as_deref().unwrap_or(""),
            error = %error,
            "capturing diagnostic for failed request"
        );
        observer.diagnostic(&DiagnosticEvent {
            correlation_id: info.correlation_id.clone(),
            status: info.status,
            message: error.to_string(),
        });
    }

    if info.kind.is_rate_limit() {
        observer.rate_limited(&info);
    }

    info
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use beacon_domain::FieldError;
    use parking_lot::Mutex;

    use super::*;

    #[derive(Default)]
    struct RecordingObserver {
        diagnostics: Mutex<Vec<DiagnosticEvent>>,
        rate_limits: Mutex<Vec<ErrorInfo>>,
    }

    impl ClientObserver for RecordingObserver {
        fn rate_limited(&self, info: &ErrorInfo) {
            self.rate_limits.lock().push(info.clone());
        }

        fn diagnostic(&self, event: &DiagnosticEvent) {
            self.diagnostics.lock().push(event.clone());
        }
    }

    fn status_error(status: u16) -> ApiError {
        ApiError::Status { status, message: None, errors: Vec::new() }
    }

    #[test]
    fn maps_status_codes_onto_the_taxonomy() {
        assert_eq!(classify(&status_error(429), None).kind, ErrorKind::RateLimited);
        assert_eq!(classify(&status_error(503), None).kind, ErrorKind::ServiceUnavailable);
        assert_eq!(classify(&status_error(500), None).kind, ErrorKind::Server);
        assert_eq!(classify(&status_error(502), None).kind, ErrorKind::Server);
        assert_eq!(classify(&status_error(404), None).kind, ErrorKind::NotFound);
        assert_eq!(classify(&status_error(401), None).kind, ErrorKind::Unauthorized);
        assert_eq!(classify(&status_error(403), None).kind, ErrorKind::Forbidden);
    }

    #[test]
    fn validation_failures_carry_field_errors_through() {
        let error = ApiError::Status {
            status: 422,
            message: Some("Validation failed".into()),
            errors: vec![FieldError::Field { field: "email".into(), message: "is invalid".into() }],
        };

        let info = classify(&error, None);
        assert_eq!(info.kind, ErrorKind::Validation);
        assert_eq!(info.status, 422);
        assert_eq!(info.message, "Validation failed");
        assert_eq!(info.errors.len(), 1);
        assert!(!info.retryable);
    }

    #[test]
    fn plain_4xx_without_field_errors_uses_the_server_message() {
        let error = ApiError::Status {
            status: 400,
            message: Some("Missing cursor".into()),
            errors: Vec::new(),
        };

        let info = classify(&error, None);
        assert_eq!(info.kind, ErrorKind::Validation);
        assert_eq!(info.message, "Missing cursor");
        assert!(!info.retryable);
        assert!(!info.kind.is_network_error());
    }

    #[test]
    fn network_failures_use_the_zero_status_sentinel() {
        for error in [ApiError::Timeout, ApiError::Offline, ApiError::Network("reset".into())] {
            let info = classify(&error, None);
            assert_eq!(info.status, 0);
            assert!(info.kind.is_network_error());
            assert!(info.retryable);
        }
    }

    #[test]
    fn timeout_offline_and_generic_messages_differ() {
        let timeout = classify(&ApiError::Timeout, None).message;
        let offline = classify(&ApiError::Offline, None).message;
        let generic = classify(&ApiError::Network("reset".into()), None).message;

        assert_ne!(timeout, offline);
        assert_ne!(offline, generic);
        assert_ne!(timeout, generic);
    }

    #[test]
    fn known_raw_substrings_map_to_friendlier_text() {
        let network = classify(&ApiError::Internal("Network Error".into()), None);
        assert_eq!(network.message, MSG_NETWORK);

        let fetch = classify(&ApiError::Internal("Failed to fetch".into()), None);
        assert_eq!(fetch.message, MSG_NETWORK);

        let timeout = classify(&ApiError::Internal("socket timeout exceeded".into()), None);
        assert_eq!(timeout.message, MSG_TIMEOUT);

        let other = classify(&ApiError::Internal("boom".into()), None);
        assert_eq!(other.message, MSG_REQUEST_FAILED);
        assert!(other.kind.is_network_error());
    }

    #[test]
    fn retryable_statuses_match_the_default_set() {
        for status in [408, 429, 500, 502, 503, 504] {
            assert!(classify(&status_error(status), None).retryable, "{status} should retry");
        }
        for status in [400, 401, 403, 404, 422] {
            assert!(!classify(&status_error(status), None).retryable, "{status} should not retry");
        }
    }

    #[test]
    fn forwards_diagnostics_for_server_and_network_failures_only() {
        let observer = Arc::new(RecordingObserver::default());

        let _ = classify_and_report(&status_error(500), Some("corr-1"), observer.as_ref());
        let _ = classify_and_report(&ApiError::Timeout, None, observer.as_ref());
        let _ = classify_and_report(&status_error(404), None, observer.as_ref());
        let _ = classify_and_report(&status_error(403), None, observer.as_ref());

        let diagnostics = observer.diagnostics.lock();
        assert_eq!(diagnostics.len(), 2);
        assert_eq!(diagnostics[0].status, 500);
        assert_eq!(diagnostics[0].correlation_id.as_deref(), Some("corr-1"));
        assert_eq!(diagnostics[1].status, 0);
    }

    #[test]
    fn emits_rate_limit_event_on_429() {
        let observer = Arc::new(RecordingObserver::default());

        let info = classify_and_report(&status_error(429), None, observer.as_ref());
        assert!(info.kind.is_rate_limit());

        let rate_limits = observer.rate_limits.lock();
        assert_eq!(rate_limits.len(), 1);
        assert_eq!(rate_limits[0].status, 429);
    }
}
