//! In-memory value cache using [`moka`].
//!
//! Holds [`CachedValue`]s keyed by configuration key. The cache is
//! unbounded and has no TTL: a resolved key stays cached until the store
//! overwrites or removes it, so eviction can never trigger a re-query.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use moka::future::Cache;
use tracing::debug;

use crate::value::ConfigValue;

// ── cache stats ──────────────────────────────────────────────────────

/// Hit and miss counts of a [`ValueCache`] at one point in time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

#[derive(Debug, Default)]
struct LookupCounters {
    hits: AtomicU64,
    misses: AtomicU64,
}

// ── cached value ─────────────────────────────────────────────────────

/// A resolved key: the value plus whether a row backs it.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedValue {
    pub value: ConfigValue,
    /// `false` when the value is a caller default for a key with no row.
    pub persisted: bool,
}

impl CachedValue {
    /// A value read from, or written to, the table.
    pub fn stored(value: ConfigValue) -> Self {
        Self {
            value,
            persisted: true,
        }
    }

    /// A default returned for a key that has no row.
    pub fn defaulted(value: ConfigValue) -> Self {
        Self {
            value,
            persisted: false,
        }
    }
}

// ── value cache ──────────────────────────────────────────────────────

/// Key → value cache owned by one [`crate::ConfigStore`].
///
/// Values are stored as-is (not re-encoded), so a cached value is exactly the
/// one that was written or decoded.
pub struct ValueCache {
    name: String,
    inner: Cache<String, CachedValue>,
    counters: LookupCounters,
}

impl fmt::Debug for ValueCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValueCache")
            .field("name", &self.name)
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

impl ValueCache {
    /// Create an empty cache. `name` only labels log events.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        debug!(cache = %name, "value cache created");
        Self {
            name,
            inner: Cache::builder().build(),
            counters: LookupCounters::default(),
        }
    }

    /// Look up a cached value. Returns `None` on miss.
    pub async fn get(&self, key: &str) -> Option<CachedValue> {
        match self.inner.get(key).await {
            Some(value) => {
                self.counters.hits.fetch_add(1, Ordering::Relaxed);
                debug!(cache = %self.name, key, "cache hit");
                Some(value)
            }
            None => {
                self.counters.misses.fetch_add(1, Ordering::Relaxed);
                debug!(cache = %self.name, key, "cache miss");
                None
            }
        }
    }

    /// Look up a cached value without counting a hit or miss.
    pub async fn peek(&self, key: &str) -> Option<CachedValue> {
        self.inner.get(key).await
    }

    /// Whether `key` is cached. Does not touch the counters.
    pub fn contains(&self, key: &str) -> bool {
        self.inner.contains_key(key)
    }

    /// Insert or overwrite a value.
    pub async fn insert(&self, key: &str, entry: CachedValue) {
        debug!(cache = %self.name, key, persisted = entry.persisted, "cache insert");
        self.inner.insert(key.to_string(), entry).await;
    }

    /// Remove a specific entry.
    pub async fn invalidate(&self, key: &str) {
        self.inner.invalidate(key).await;
        debug!(cache = %self.name, key, "cache invalidate");
    }

    /// Remove all entries.
    pub async fn invalidate_all(&self) {
        self.inner.invalidate_all();
        self.inner.run_pending_tasks().await;
        debug!(cache = %self.name, "cache invalidate_all");
    }

    /// Keys currently cached, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.inner.iter().map(|(k, _)| k.to_string()).collect();
        keys.sort();
        keys
    }

    /// Lookups counted by [`ValueCache::get`] so far.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
        }
    }
}

// ── tests ────────────────────────────────────────────────────────────
