//! Request coordinator: single-flight dedup + TTL response cache
//!
//! Every logical call is identified by a canonical key built from the
//! uppercased method, the url and the serialized params/data. Concurrent
//! calls with the same key collapse into one network operation whose settled
//! outcome is shared by every waiter, irrespective of HTTP verb. Successful
//! GET responses are cached with a TTL unless the caller opted out.
//!
//! The check-and-register sequence runs inside one synchronous critical
//! section, so a lookup can never interleave with another task's insert.
//! Operations are spawned eagerly: abandoning interest in a result does not
//! cancel the underlying call, and the pending entry is removed when the
//! operation settles regardless of whether anyone is still waiting.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use beacon_domain::{ApiEnvelope, ApiError, ApiRequest, Method, Result};
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use serde_json::{Map, Value};
use tracing::debug;

use crate::cache::{CacheStats, ResponseCache};
use crate::clock::{Clock, SystemClock};

/// Shared handle to one in-flight operation
type FlightFuture = Shared<BoxFuture<'static, Result<ApiEnvelope>>>;

struct FlightEntry {
    id: u64,
    future: FlightFuture,
}

/// Canonical request signature used for dedup and caching
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestKey(String);

impl RequestKey {
    /// Build the canonical key for a request.
    ///
    /// Serialization follows the insertion order of object keys; when
    /// `canonical_order` is set, object keys are sorted recursively first so
    /// logically-identical requests with differently ordered parameters
    /// share a key.
    #[must_use]
    pub fn for_request(request: &ApiRequest, canonical_order: bool) -> Self {
        let params = serialize_key_part(request.params.as_ref(), canonical_order);
        let data = serialize_key_part(request.data.as_ref(), canonical_order);
        Self(format!("{}:{}:{}:{}", request.method.as_str(), request.path, params, data))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_string(self) -> String {
        self.0
    }
}

fn serialize_key_part(value: Option<&Value>, canonical_order: bool) -> String {
    match value {
        None => String::new(),
        Some(value) => {
            let value = if canonical_order { sort_object_keys(value) } else { value.clone() };
            serde_json::to_string(&value).unwrap_or_default()
        }
    }
}

fn sort_object_keys(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut sorted = Map::new();
            for key in keys {
                if let Some(inner) = map.get(key) {
                    sorted.insert(key.clone(), sort_object_keys(inner));
                }
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(sort_object_keys).collect()),
        other => other.clone(),
    }
}

/// Shared coordinator state, owned once and handed to settlement tasks
struct CoordinatorState {
    pending: Mutex<HashMap<String, FlightEntry>>,
    cache: ResponseCache<Arc<dyn Clock>>,
    next_flight_id: AtomicU64,
}

impl CoordinatorState {
    /// Remove the pending entry for a settled flight and cache a successful
    /// cacheable response. Idempotent: only the flight that registered the
    /// entry settles it.
    fn settle(&self, key: &str, id: u64, cacheable: bool, result: &Result<ApiEnvelope>) {
        let removed = {
            let mut pending = self.pending.lock();
            match pending.get(key) {
                Some(entry) if entry.id == id => {
                    pending.remove(key);
                    true
                }
                _ => false,
            }
        };

        if removed && cacheable {
            if let Ok(envelope) = result {
                self.cache.insert(key.to_owned(), envelope.clone());
            }
        }
    }
}

/// Single-flight + TTL-cache wrapper around transport calls
pub struct RequestCoordinator {
    state: Arc<CoordinatorState>,
    canonical_keys: bool,
}

impl RequestCoordinator {
    /// Create a coordinator with the given cache TTL and the system clock.
    #[must_use]
    pub fn new(cache_ttl: Duration, canonical_keys: bool) -> Self {
        Self::with_clock(cache_ttl, canonical_keys, Arc::new(SystemClock))
    }

    /// Create a coordinator with a custom clock (useful for testing TTL
    /// behavior).
    #[must_use]
    pub fn with_clock(cache_ttl: Duration, canonical_keys: bool, clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Arc::new(CoordinatorState {
                pending: Mutex::new(HashMap::new()),
                cache: ResponseCache::with_clock(cache_ttl, clock),
                next_flight_id: AtomicU64::new(0),
            }),
            canonical_keys,
        }
    }

    /// Execute `op` for `request`, deduplicating against in-flight calls and
    /// serving fresh GET responses from the cache.
    ///
    /// For N concurrent logically-identical calls issued before the first
    /// settles, `op` runs exactly once and all N callers receive the same
    /// outcome.
    ///
    /// # Errors
    /// Propagates the operation's error unchanged; errors are never cached.
    pub async fn execute<F>(&self, request: &ApiRequest, op: F) -> Result<ApiEnvelope>
    where
        F: FnOnce() -> BoxFuture<'static, Result<ApiEnvelope>>,
    {
        let key = RequestKey::for_request(request, self.canonical_keys).into_string();
        let cacheable = request.method == Method::Get && !request.skip_cache;

        enum Flight {
            Attached(FlightFuture),
            Owner { id: u64, future: FlightFuture },
        }

        // Check-and-register must not be interleaved with other tasks:
        // cache lookup, pending lookup and pending insert happen under one
        // lock with no await in between.
        let flight = {
            let state = &self.state;
            let mut pending = state.pending.lock();

            if cacheable {
                if let Some(hit) = state.cache.get(&key) {
                    debug!(%key, "served from cache");
                    return Ok(hit);
                }
            }

            if let Some(entry) = pending.get(&key) {
                debug!(%key, "attached to in-flight request");
                Flight::Attached(entry.future.clone())
            } else {
                let id = state.next_flight_id.fetch_add(1, Ordering::Relaxed);
                let task = tokio::spawn(op());
                let future: FlightFuture = async move {
                    match task.await {
                        Ok(result) => result,
                        Err(err) => Err(ApiError::Internal(format!("request task failed: {err}"))),
                    }
                }
                .boxed()
                .shared();

                pending.insert(key.clone(), FlightEntry { id, future: future.clone() });
                Flight::Owner { id, future }
            }
        };

        match flight {
            Flight::Attached(future) => future.await,
            Flight::Owner { id, future } => {
                // Settlement bookkeeping must happen even if this caller is
                // dropped mid-await, so a janitor watches the same handle.
                let state = Arc::clone(&self.state);
                let watch = future.clone();
                let watch_key = key.clone();
                tokio::spawn(async move {
                    let result = watch.await;
                    state.settle(&watch_key, id, cacheable, &result);
                });

                let result = future.await;
                self.state.settle(&key, id, cacheable, &result);
                result
            }
        }
    }

    /// Delete every cached entry whose key contains `pattern`.
    pub fn invalidate(&self, pattern: &str) -> usize {
        self.state.cache.invalidate(pattern)
    }

    /// Empty the pending map and the cache in one synchronous pass.
    ///
    /// Flights that settle afterwards find their entry gone and write
    /// nothing back.
    pub fn reset(&self) {
        let mut pending = self.state.pending.lock();
        pending.clear();
        self.state.cache.clear();
    }

    /// Number of requests currently in flight.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.state.pending.lock().len()
    }

    /// Snapshot of the response-cache counters.
    #[must_use]
    pub fn cache_stats(&self) -> CacheStats {
        self.state.cache.stats()
    }
}
