//! Reqwest-backed transport
//!
//! Issues the actual network calls: builds the URL from the configured base,
//! attaches the current credential as a bearer authorization header, and
//! normalizes every response into the `{success, data, message}` envelope or
//! an `ApiError`. Bodies that are not already in envelope shape are wrapped
//! as the envelope's data payload.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use beacon_core::credentials::CredentialStore;
use beacon_core::ports::Transport;
use beacon_domain::{ApiEnvelope, ApiError, ApiRequest, ErrorBody, Method, Result};
use reqwest::Client as ReqwestClient;
use serde_json::Value;
use tracing::debug;

use crate::errors::InfraError;

/// `Transport` implementation over a pooled reqwest client
pub struct HttpTransport {
    client: ReqwestClient,
    base_url: String,
    credentials: Arc<CredentialStore>,
}

impl HttpTransport {
    /// Create a transport with the given request timeout.
    ///
    /// # Errors
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn new(
        base_url: impl Into<String>,
        timeout: Duration,
        credentials: Arc<CredentialStore>,
    ) -> Result<Self> {
        let client = ReqwestClient::builder().timeout(timeout).build().map_err(|err| {
            let infra: InfraError = err.into();
            ApiError::from(infra)
        })?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            credentials,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn method_for(method: Method) -> reqwest::Method {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Patch => reqwest::Method::PATCH,
            Method::Delete => reqwest::Method::DELETE,
            Method::Head => reqwest::Method::HEAD,
        }
    }

    /// Flatten a params object into query pairs.
    fn query_pairs(params: &Value) -> Vec<(String, String)> {
        match params {
            Value::Object(map) => map
                .iter()
                .map(|(key, value)| {
                    let rendered = match value {
                        Value::String(text) => text.clone(),
                        other => other.to_string(),
                    };
                    (key.clone(), rendered)
                })
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Interpret a success body: envelope-shaped objects pass through,
    /// anything else becomes the envelope's data payload.
    fn envelope_from_body(body: Value) -> ApiEnvelope {
        let is_envelope = body
            .as_object()
            .is_some_and(|map| map.contains_key("success") || map.contains_key("data"));

        if is_envelope {
            serde_json::from_value(body.clone()).unwrap_or_else(|_| ApiEnvelope::of_data(body))
        } else {
            ApiEnvelope::of_data(body)
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn dispatch(&self, request: &ApiRequest) -> Result<ApiEnvelope> {
        let url = self.endpoint(&request.path);
        let mut builder = self.client.request(Self::method_for(request.method), &url);

        if let Some(params) = &request.params {
            builder = builder.query(&Self::query_pairs(params));
        }
        if let Some(data) = &request.data {
            builder = builder.json(data);
        }
        if let Some(token) = self.credentials.token()? {
            builder = builder.bearer_auth(token);
        }

        debug!(
            method = %request.method,
            url = %url,
            correlation_id = %request.correlation_id,
            "dispatching request"
        );

        let response = builder.send().await.map_err(|err| {
            let infra: InfraError = err.into();
            ApiError::from(infra)
        })?;

        let status = response.status();
        debug!(
            status = status.as_u16(),
            correlation_id = %request.correlation_id,
            "received response"
        );

        let text = response.text().await.map_err(|err| {
            let infra: InfraError = err.into();
            ApiError::from(infra)
        })?;

        if status.is_success() {
            if text.is_empty() {
                return Ok(ApiEnvelope { success: true, data: None, message: None });
            }
            let body: Value = serde_json::from_str(&text)
                .map_err(|e| ApiError::Internal(format!("response body is not JSON: {e}")))?;
            return Ok(Self::envelope_from_body(body));
        }

        // Failure body: `{message, errors[]}` when the server provides one
        let body: ErrorBody = serde_json::from_str(&text).unwrap_or_default();
        Err(ApiError::Status {
            status: status.as_u16(),
            message: body.message,
            errors: body.errors,
        })
    }
}
