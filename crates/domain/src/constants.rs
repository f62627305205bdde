//! Domain constants
//!
//! Centralized location for the client core's defaults and storage key
//! names.

// Transport configuration
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

// Response cache configuration
pub const DEFAULT_CACHE_TTL_MS: u64 = 300_000;

// Retry configuration
pub const DEFAULT_MAX_RETRIES: u32 = 0;
pub const DEFAULT_BASE_DELAY_MS: u64 = 1_000;
pub const DEFAULT_RETRYABLE_STATUSES: [u16; 6] = [408, 429, 500, 502, 503, 504];

/// Sentinel status for failures that never produced an HTTP response.
pub const NETWORK_ERROR_STATUS: u16 = 0;

// Credential storage key names, duplicated across both storage scopes
pub const ACCESS_TOKEN_KEY: &str = "beacon.access_token";
pub const TOKEN_EXPIRY_KEY: &str = "beacon.token_expiry";
pub const REMEMBER_ME_KEY: &str = "beacon.remember_me";

// Refresh endpoint
pub const DEFAULT_REFRESH_PATH: &str = "/api/auth/refresh";
