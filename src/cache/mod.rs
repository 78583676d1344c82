//! Process-wide response cache for provider API calls.
//!
//! Short-lived cache used to absorb repeated read-mostly provider calls
//! (profile lookups, audience searches) within a small window, keeping
//! pressure off external rate limits. Keys are scoped to the requesting
//! user so one user's cached data is never served to another.
//!
//! The cache is constructed once at process start and passed by reference
//! (`Arc<ResponseCache>`) to whatever needs it; there is no global singleton.
//! A background sweep task bounds memory growth from entries nobody reads
//! again.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use serde_json::Value;

/// Default entry time-to-live: 5 minutes.
///
/// Balances provider rate-limit pressure against staleness of analytics and
/// collaborator-search data. Callers needing stronger freshness pass a
/// shorter TTL.
pub const DEFAULT_TTL_SECONDS: i64 = 300;

/// Default sweep interval for the background maintenance task: 10 minutes.
pub const DEFAULT_SWEEP_INTERVAL_SECONDS: u64 = 600;

/// A single cached provider response.
#[derive(Clone, Debug)]
struct CacheEntry {
    value: Value,
    expires_at: DateTime<Utc>,
}

/// Time-bounded in-process cache keyed by opaque strings.
///
/// Backed by a DashMap, so reads and writes from concurrent requests are safe
/// and a single entry's visibility is atomic — no reader ever observes a
/// half-written entry. Expired entries are evicted lazily on read and in bulk
/// by [`ResponseCache::sweep`].
pub struct ResponseCache {
    entries: DashMap<String, CacheEntry>,
    default_ttl: Duration,
}

impl ResponseCache {
    /// Creates a cache with the default 5-minute TTL.
    pub fn new() -> Self {
        Self::with_default_ttl(Duration::seconds(DEFAULT_TTL_SECONDS))
    }

    /// Creates a cache with a custom default TTL.
    pub fn with_default_ttl(default_ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            default_ttl,
        }
    }

    /// Builds a cache key scoped to a (user, provider) pair.
    ///
    /// All cached provider calls must go through this so that
    /// [`ResponseCache::invalidate_scope`] can clear a pair on disconnect.
    /// Components are percent-encoded: user ids are opaque and may contain
    /// the `:` delimiter, which must not let one scope's prefix match
    /// another's entries.
    pub fn scoped_key(user_id: &str, provider: &str, operation: &str) -> String {
        format!(
            "{}:{}:{}",
            urlencoding::encode(user_id),
            urlencoding::encode(provider),
            urlencoding::encode(operation)
        )
    }

    /// Stores a value under `key`, overwriting any existing entry.
    ///
    /// `ttl` of `None` uses the cache default. A zero or negative TTL stores
    /// an entry that is already expired — useful for tests simulating clock
    /// advance.
    pub fn set(&self, key: &str, value: Value, ttl: Option<Duration>) {
        let entry = CacheEntry {
            value,
            expires_at: Utc::now() + ttl.unwrap_or(self.default_ttl),
        };
        self.entries.insert(key.to_string(), entry);
    }

    /// Returns the cached value, or `None` if absent or expired.
    ///
    /// An expired entry is evicted on the spot.
    pub fn get(&self, key: &str) -> Option<Value> {
        let expired = match self.entries.get(key) {
            Some(entry) => {
                if Utc::now() <= entry.expires_at {
                    return Some(entry.value.clone());
                }
                true
            }
            None => false,
        };

        if expired {
            self.entries.remove(key);
        }
        None
    }

    /// Returns whether a live (non-expired) entry exists for `key`.
    pub fn has(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Removes the entry for `key`, if any.
    pub fn delete(&self, key: &str) {
        self.entries.remove(key);
    }

    /// Removes every entry.
    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Removes every entry scoped to a (user, provider) pair.
    ///
    /// Called on credential revocation so stale data is never shown after a
    /// disconnect.
    pub fn invalidate_scope(&self, user_id: &str, provider: &str) {
        let prefix = format!(
            "{}:{}:",
            urlencoding::encode(user_id),
            urlencoding::encode(provider)
        );
        self.entries.retain(|key, _| !key.starts_with(&prefix));
    }

    /// Removes all expired entries. Returns the number removed.
    ///
    /// Removals are counted inside the retain pass: the map length can move
    /// under concurrent writers, so before/after arithmetic is unreliable.
    pub fn sweep(&self) -> usize {
        let now = Utc::now();
        let mut removed = 0usize;
        self.entries.retain(|_, entry| {
            let live = now <= entry.expires_at;
            if !live {
                removed += 1;
            }
            live
        });
        removed
    }

    /// Number of entries currently held, expired or not.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Background task that sweeps expired cache entries on a fixed interval.
///
/// Started alongside the cache at process start; stops when the process shuts
/// down (the spawned task is aborted with the runtime).
pub async fn run_cache_sweeper(cache: std::sync::Arc<ResponseCache>, interval_seconds: u64) {
    let mut interval = tokio::time::interval(tokio::time::Duration::from_secs(interval_seconds));

    loop {
        interval.tick().await;
        let removed = cache.sweep();
        tracing::debug!(
            removed = removed,
            remaining = cache.len(),
            "Cache sweep complete"
        );
    }
}
