//! Credential store
//!
//! Persists the access credential and its expiry across two mutually
//! exclusive storage scopes: durable when the user asked to be remembered,
//! session-scoped otherwise. Writing to one scope always clears the other,
//! so at most one scope holds a token at any time. The remember preference
//! itself survives `clear` (sign-out).

use std::sync::Arc;

use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use beacon_domain::constants::{ACCESS_TOKEN_KEY, REMEMBER_ME_KEY, TOKEN_EXPIRY_KEY};
use beacon_domain::{CredentialRecord, Result, StorageScope};
use tracing::{debug, info};

use crate::ports::{ClientObserver, ScopedStorage};

/// Decode the expiry claim embedded in a three-part dotted token.
///
/// Returns the expiry in epoch milliseconds when the middle segment decodes
/// to a JSON object with a numeric `exp` (seconds) claim. Total for any
/// malformed or empty input: it never fails, it just returns `None`.
#[must_use]
pub fn decode_expiry(token: &str) -> Option<i64> {
    let mut parts = token.split('.');
    let (Some(_), Some(payload), Some(_), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return None;
    };

    let bytes = URL_SAFE_NO_PAD
        .decode(payload)
        .or_else(|_| STANDARD.decode(payload))
        .ok()?;
    let claims: serde_json::Value = serde_json::from_slice(&bytes).ok()?;

    claims.get("exp")?.as_i64().map(|seconds| seconds.saturating_mul(1000))
}

/// Scope-aware store for the access credential
pub struct CredentialStore {
    storage: Arc<dyn ScopedStorage>,
    observer: Arc<dyn ClientObserver>,
}

impl CredentialStore {
    #[must_use]
    pub fn new(storage: Arc<dyn ScopedStorage>, observer: Arc<dyn ClientObserver>) -> Self {
        Self { storage, observer }
    }

    /// Persist a credential.
    ///
    /// When `expires_at` is omitted it is derived from the token's embedded
    /// expiry claim; when `remember` is omitted the last saved preference is
    /// reused (default true). The chosen scope receives token and expiry and
    /// the other scope is cleared. Subscribers are notified afterwards.
    ///
    /// # Errors
    /// Returns an error only when the underlying storage fails.
    pub fn store(
        &self,
        token: &str,
        expires_at: Option<i64>,
        remember: Option<bool>,
    ) -> Result<()> {
        let expires_at = expires_at.or_else(|| decode_expiry(token));
        let remember = match remember {
            Some(remember) => remember,
            None => self.remember_preference()?,
        };
        let scope = if remember { StorageScope::Durable } else { StorageScope::Session };

        self.storage.set(scope, ACCESS_TOKEN_KEY, token)?;
        match expires_at {
            Some(expiry) => self.storage.set(scope, TOKEN_EXPIRY_KEY, &expiry.to_string())?,
            None => self.storage.remove(scope, TOKEN_EXPIRY_KEY)?,
        }

        // Preserve the mutual-exclusion invariant
        let other = scope.other();
        self.storage.remove(other, ACCESS_TOKEN_KEY)?;
        self.storage.remove(other, TOKEN_EXPIRY_KEY)?;

        let preference = remember.to_string();
        self.storage.set(StorageScope::Durable, REMEMBER_ME_KEY, &preference)?;
        self.storage.set(StorageScope::Session, REMEMBER_ME_KEY, &preference)?;

        info!(remember, has_expiry = expires_at.is_some(), "stored credential");
        self.observer.credential_refreshed(token, expires_at);
        Ok(())
    }

    /// Read the current credential, checking the durable scope first.
    ///
    /// # Errors
    /// Returns an error only when the underlying storage fails.
    pub fn read(&self) -> Result<CredentialRecord> {
        if let Some(token) = self.storage.get(StorageScope::Durable, ACCESS_TOKEN_KEY)? {
            return Ok(CredentialRecord {
                token: Some(token),
                expires_at: self.read_expiry(StorageScope::Durable)?,
                remember_me: true,
            });
        }

        if let Some(token) = self.storage.get(StorageScope::Session, ACCESS_TOKEN_KEY)? {
            return Ok(CredentialRecord {
                token: Some(token),
                expires_at: self.read_expiry(StorageScope::Session)?,
                remember_me: false,
            });
        }

        Ok(CredentialRecord::empty(self.remember_preference()?))
    }

    /// Current bearer token, if any.
    ///
    /// # Errors
    /// Returns an error only when the underlying storage fails.
    pub fn token(&self) -> Result<Option<String>> {
        Ok(self.read()?.token)
    }

    /// Remove token and expiry from both scopes, leaving the remember
    /// preference intact.
    ///
    /// # Errors
    /// Returns an error only when the underlying storage fails.
    pub fn clear(&self) -> Result<()> {
        for scope in [StorageScope::Durable, StorageScope::Session] {
            self.storage.remove(scope, ACCESS_TOKEN_KEY)?;
            self.storage.remove(scope, TOKEN_EXPIRY_KEY)?;
        }
        debug!("cleared stored credential");
        Ok(())
    }

    fn read_expiry(&self, scope: StorageScope) -> Result<Option<i64>> {
        Ok(self
            .storage
            .get(scope, TOKEN_EXPIRY_KEY)?
            .and_then(|raw| raw.parse::<i64>().ok()))
    }

    fn remember_preference(&self) -> Result<bool> {
        let saved = self
            .storage
            .get(StorageScope::Durable, REMEMBER_ME_KEY)?
            .or(self.storage.get(StorageScope::Session, REMEMBER_ME_KEY)?);
        Ok(saved.map_or(true, |raw| raw == "true"))
    }
}
