//! Content-addressed cache for provider API responses.
//!
//! Responses are keyed by `(provider, endpoint, canonical_params_hash)`
//! where the hash is sha256 over the canonical JSON serialization of the
//! request parameters (keys sorted lexicographically at every nesting
//! level). A small in-memory TTL layer sits in front of the persisted
//! table so a burst of identical provider calls within one search does not
//! touch the database.
//!
//! Cache failures are never fatal: any error reading or writing degrades
//! to a miss. The one condition surfaced to the caller is a same-hash /
//! different-params conflict on insert, which indicates corruption rather
//! than a genuine sha256 collision.

use std::time::Duration;

use chrono::{DateTime, Utc};
use moka::sync::Cache as MokaCache;
use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::warn;

use crate::store::{PersistenceError, Store};

/// Key into the front cache.
type FrontKey = (String, String, String);

/// Configuration for the cache layers.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// TTL for in-memory entries. Kept short; the persisted row's own
    /// `expires_at_utc` is the authoritative lifetime.
    pub front_ttl: Duration,

    /// Maximum number of in-memory entries.
    pub front_capacity: u64,

    /// Default lifetime of persisted entries, hours.
    pub default_ttl_hours: f64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            front_ttl: Duration::from_secs(60),
            front_capacity: 1000,
            default_ttl_hours: 6.0,
        }
    }
}

/// Serialize a JSON value with object keys sorted lexicographically at
/// every nesting level.
///
/// This is the canonical form hashed for the content address; two
/// parameter objects that differ only in key order canonicalize
/// identically.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String((*key).clone()).to_string());
                out.push(':');
                write_canonical(&map[*key], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

/// Hex sha256 of the canonical JSON serialization of `params`.
pub fn canonical_hash(params: &Value) -> String {
    let mut hasher = Sha256::new();
    hasher.update(canonical_json(params).as_bytes());
    let digest = hasher.finalize();
    let mut hex = String::with_capacity(64);
    for byte in digest {
        use std::fmt::Write;
        let _ = write!(hex, "{byte:02x}");
    }
    hex
}

/// TTL-bounded, content-addressed cache of provider responses.
pub struct ApiCache {
    store: Store,
    front: MokaCache<FrontKey, String>,
    default_ttl_hours: f64,
}

impl ApiCache {
    /// Create a cache over the given store.
    pub fn new(store: Store, config: &CacheConfig) -> Self {
        let front = MokaCache::builder()
            .time_to_live(config.front_ttl)
            .max_capacity(config.front_capacity)
            .build();
        Self {
            store,
            front,
            default_ttl_hours: config.default_ttl_hours,
        }
    }

    /// Look up a cached response. Any store failure degrades to a miss.
    pub fn get(&self, provider: &str, endpoint: &str, params: &Value) -> Option<Value> {
        self.get_at(provider, endpoint, params, Utc::now())
    }

    /// Look up a cached response as of `now`.
    pub fn get_at(
        &self,
        provider: &str,
        endpoint: &str,
        params: &Value,
        now: DateTime<Utc>,
    ) -> Option<Value> {
        let hash = canonical_hash(params);
        let key = (provider.to_string(), endpoint.to_string(), hash.clone());

        if let Some(body) = self.front.get(&key) {
            return serde_json::from_str(&body).ok();
        }

        let row = match self.store.cache_lookup(provider, endpoint, &hash) {
            Ok(Some(row)) => row,
            Ok(None) => return None,
            Err(err) => {
                warn!(provider, endpoint, error = %err, "cache lookup failed, treating as miss");
                return None;
            }
        };

        // Usage stats are best-effort; a racy update loses nothing but a
        // count.
        if let Err(err) = self.store.cache_touch(provider, endpoint, &hash, now) {
            warn!(provider, endpoint, error = %err, "cache touch failed");
        }

        if now >= row.expires_at_utc {
            return None;
        }

        let parsed: Value = serde_json::from_str(&row.response_body).ok()?;
        self.front.insert(key, row.response_body);
        Some(parsed)
    }

    /// Insert a response with the default TTL.
    pub fn put(
        &self,
        provider: &str,
        endpoint: &str,
        params: &Value,
        response: &Value,
    ) -> Result<(), PersistenceError> {
        self.put_at(provider, endpoint, params, response, None, Utc::now())
    }

    /// Insert a response as of `now`, with an optional TTL override in
    /// hours.
    ///
    /// A row whose hash matches but whose stored parameters differ is
    /// surfaced as [`PersistenceError::Corrupted`]: sha256 is presumed
    /// strong enough that this indicates corruption, not collision.
    pub fn put_at(
        &self,
        provider: &str,
        endpoint: &str,
        params: &Value,
        response: &Value,
        ttl_hours: Option<f64>,
        now: DateTime<Utc>,
    ) -> Result<(), PersistenceError> {
        let canonical = canonical_json(params);
        let hash = canonical_hash(params);

        if let Some(existing) = self.store.cache_lookup(provider, endpoint, &hash)?
            && canonical_json(&serde_json::from_str(&existing.params_json).map_err(|e| {
                PersistenceError::Corrupted(format!("stored cache params unparseable: {e}"))
            })?) != canonical
        {
            return Err(PersistenceError::Corrupted(format!(
                "api_cache hash {hash} maps to different params for {provider}/{endpoint}"
            )));
        }

        let ttl = ttl_hours.unwrap_or(self.default_ttl_hours);
        let expires = now + chrono::Duration::seconds((ttl * 3600.0) as i64);
        let body = response.to_string();

        self.store
            .cache_upsert(provider, endpoint, &hash, &canonical, &body, now, expires)?;
        self.front
            .insert((provider.to_string(), endpoint.to_string(), hash), body);
        Ok(())
    }

    /// Persisted hit count for an entry, if it exists.
    pub fn hit_count(&self, provider: &str, endpoint: &str, params: &Value) -> Option<i64> {
        let hash = canonical_hash(params);
        self.store
            .cache_lookup(provider, endpoint, &hash)
            .ok()
            .flatten()
            .map(|row| row.hit_count)
    }

    /// Number of entries in the in-memory layer (for monitoring).
    pub fn front_entry_count(&self) -> u64 {
        self.front.entry_count()
    }

    /// Drop all in-memory entries. Persisted rows are untouched.
    pub fn invalidate_front(&self) {
        self.front.invalidate_all();
    }
}
