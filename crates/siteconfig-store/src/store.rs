//! Write-through, lazily populated configuration store.
//!
//! [`ConfigStore`] serves values from its in-memory cache and falls back to a
//! [`ConfigBackend`] on the first touch of a key. Writes go to the backend
//! first and reach the cache only once the backend has accepted them, so a
//! failed write never changes what the store returns afterwards.
//!
//! ```ignore
//! use siteconfig_store::{ConfigStore, StoreSettings};
//!
//! let store = ConfigStore::open(&StoreSettings::default().with_env()?).await?;
//! store.set("retries", 3).await?.set("timeout", 30.5).await?;
//! let retries = store.get("retries", 0).await?;
//! ```

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};

use crate::backend::{ConfigBackend, SqliteBackend, TableName};
use crate::cache::{CacheStats, CachedValue, ValueCache};
use crate::codec;
use crate::db::Database;
use crate::error::{StoreError, StoreResult};
use crate::settings::StoreSettings;
use crate::value::ConfigValue;

/// Key/value configuration over one table.
///
/// The store never assumes exclusive access to the table; it only trusts its
/// cache for keys it has already resolved. Other writers to the same table
/// are not observed once a key is cached.
pub struct ConfigStore {
    table: TableName,
    backend: Arc<dyn ConfigBackend>,
    cache: ValueCache,
    /// Held by `set`, `delete` and cache-miss reads across their backend
    /// round trip and cache update.
    lock: Mutex<()>,
}

impl fmt::Debug for ConfigStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigStore")
            .field("table", &self.table)
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

impl ConfigStore {
    /// Create a store over `table` in `backend`.
    pub fn new(table: TableName, backend: Arc<dyn ConfigBackend>) -> Self {
        let cache = ValueCache::new(table.as_str());
        Self {
            table,
            backend,
            cache,
            lock: Mutex::new(()),
        }
    }

    /// Open a SQLite-backed store as described by `settings`.
    pub async fn open(settings: &StoreSettings) -> StoreResult<Self> {
        let table = settings.table_name()?;
        let db = if settings.is_in_memory() {
            Database::open_in_memory()?
        } else {
            Database::open_async(settings.database_path.clone()).await?
        };

        let backend = SqliteBackend::new(db);
        if settings.create_table {
            backend.ensure_table(&table).await?;
        }

        info!(table = %table, path = %settings.database_path.display(), "config store ready");
        Ok(Self::new(table, Arc::new(backend)))
    }

    /// The table this store reads and writes.
    pub fn table(&self) -> &TableName {
        &self.table
    }

    // ── reads ────────────────────────────────────────────────────────

    /// Return the value for `key`, or `default` if the table has no row.
    ///
    /// The result is cached either way, including the default, so later
    /// calls for the same key do not query the backend.
    #[instrument(skip(self, default), fields(table = %self.table))]
    pub async fn get(
        &self,
        key: &str,
        default: impl Into<ConfigValue>,
    ) -> StoreResult<ConfigValue> {
        if let Some(entry) = self.cache.get(key).await {
            return Ok(entry.value);
        }

        let _guard = self.lock.lock().await;
        if let Some(entry) = self.cache.peek(key).await {
            return Ok(entry.value);
        }

        match self.fetch(key).await? {
            Some(value) => Ok(value),
            None => {
                let default = default.into();
                self.cache
                    .insert(key, CachedValue::defaulted(default.clone()))
                    .await;
                Ok(default)
            }
        }
    }

    /// [`ConfigStore::get`] with a [`ConfigValue::Null`] default.
    pub async fn get_or_null(&self, key: &str) -> StoreResult<ConfigValue> {
        self.get(key, ConfigValue::Null).await
    }

    /// Typed read: the value for `key` deserialized into `T`.
    ///
    /// Fails with [`StoreError::TypeMismatch`] if the value does not fit `T`.
    pub async fn get_as<T>(&self, key: &str, default: T) -> StoreResult<T>
    where
        T: Serialize + DeserializeOwned,
    {
        let default = ConfigValue::from(serde_json::to_value(&default)?);
        let value = self.get(key, default).await?;
        serde_json::from_value(value.into()).map_err(|_| StoreError::TypeMismatch {
            key: key.to_string(),
            expected: std::any::type_name::<T>(),
        })
    }

    /// Whether `key` is cached or has a row.
    ///
    /// A row found here is decoded and cached, so a following `get` does not
    /// query again.
    #[instrument(skip(self), fields(table = %self.table))]
    pub async fn has(&self, key: &str) -> StoreResult<bool> {
        if self.cache.contains(key) {
            return Ok(true);
        }

        let _guard = self.lock.lock().await;
        if self.cache.contains(key) {
            return Ok(true);
        }
        Ok(self.fetch(key).await?.is_some())
    }

    // ── writes ───────────────────────────────────────────────────────

    /// Persist `value` under `key` and cache it.
    ///
    /// Inserts when the key has no row and updates otherwise. Either write
    /// falls back to the other when another writer has created or removed
    /// the row in the meantime. The cache keeps the value exactly as given,
    /// not its decoded round-trip. Returns the store so calls can be chained.
    #[instrument(skip(self, value), fields(table = %self.table))]
    pub async fn set(&self, key: &str, value: impl Into<ConfigValue>) -> StoreResult<&Self> {
        let value = value.into();
        let encoded = codec::encode(&value)?;

        let _guard = self.lock.lock().await;

        if self.row_exists(key).await? {
            match self.backend.update(&self.table, key, &encoded).await {
                Ok(()) => {}
                Err(err) if err.is_missing_row() => {
                    debug!(key, "row removed since last read, inserting instead");
                    self.backend.insert(&self.table, key, &encoded).await?;
                }
                Err(err) => return Err(err),
            }
        } else {
            match self.backend.insert(&self.table, key, &encoded).await {
                Ok(()) => {}
                Err(err) if err.is_duplicate_key() => {
                    debug!(key, "row appeared since last read, updating instead");
                    self.backend.update(&self.table, key, &encoded).await?;
                }
                Err(err) => return Err(err),
            }
        }

        self.cache.insert(key, CachedValue::stored(value)).await;
        Ok(self)
    }

    /// Remove `key` from the table and the cache.
    ///
    /// Deleting a key that has no row is not an error.
    #[instrument(skip(self), fields(table = %self.table))]
    pub async fn delete(&self, key: &str) -> StoreResult<()> {
        let _guard = self.lock.lock().await;
        self.backend.delete(&self.table, key).await?;
        self.cache.invalidate(key).await;
        Ok(())
    }

    // ── cache inspection ─────────────────────────────────────────────

    /// Keys currently resolved in the cache, sorted.
    pub fn cached_keys(&self) -> Vec<String> {
        self.cache.keys()
    }

    /// Forget every cached value. The table is not touched.
    pub async fn clear_cache(&self) {
        self.cache.invalidate_all().await;
    }

    /// Hit and miss counts of the cache.
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    // ── internals ────────────────────────────────────────────────────

    /// Query the backend for `key`, caching and returning the decoded value.
    ///
    /// Callers hold `lock`.
    async fn fetch(&self, key: &str) -> StoreResult<Option<ConfigValue>> {
        let Some(raw) = self.backend.query_one(&self.table, key).await? else {
            debug!(key, "no row");
            return Ok(None);
        };

        let (value, origin) = codec::decode_with_origin(&raw);
        debug!(key, ?origin, "row decoded");
        self.cache
            .insert(key, CachedValue::stored(value.clone()))
            .await;
        Ok(Some(value))
    }

    /// Whether `key` is known to have a row, querying if it is not cached.
    ///
    /// A cached default means the row was absent when last read.
    async fn row_exists(&self, key: &str) -> StoreResult<bool> {
        match self.cache.peek(key).await {
            Some(entry) => Ok(entry.persisted),
            None => Ok(self.fetch(key).await?.is_some()),
        }
    }
}

// ── tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use std::sync::atomic::{AtomicBool, Ordering};

    use async_trait::async_trait;
    use tokio::sync::Notify;

    use super::*;
    use crate::backend::{BackendCounters, BackendOp, MemoryBackend};

    /// Parks the first query after it has read the table, until released.
    #[derive(Default)]
    struct GatedBackend {
        inner: MemoryBackend,
        armed: AtomicBool,
        parked: Notify,
        release: Notify,
    }

    impl GatedBackend {
        fn armed() -> Self {
            let backend = Self::default();
            backend.armed.store(true, Ordering::SeqCst);
            backend
        }
    }

    #[async_trait]
    impl ConfigBackend for GatedBackend {
        async fn query_one(&self, table: &TableName, key: &str) -> StoreResult<Option<String>> {
            let row = self.inner.query_one(table, key).await;
            if self.armed.swap(false, Ordering::SeqCst) {
                self.parked.notify_one();
                self.release.notified().await;
            }
            row
        }

        async fn insert(&self, table: &TableName, key: &str, value: &str) -> StoreResult<()> {
            self.inner.insert(table, key, value).await
        }

        async fn update(&self, table: &TableName, key: &str, value: &str) -> StoreResult<()> {
            self.inner.update(table, key, value).await
        }

        async fn delete(&self, table: &TableName, key: &str) -> StoreResult<()> {
            self.inner.delete(table, key).await
        }
    }

    fn options() -> TableName {
        TableName::new("options").unwrap()
    }

    fn setup() -> (Arc<MemoryBackend>, ConfigStore) {
        let backend = Arc::new(MemoryBackend::new());
        let store = ConfigStore::new(options(), backend.clone());
        (backend, store)
    }

    fn fresh(backend: &Arc<MemoryBackend>) -> ConfigStore {
        ConfigStore::new(options(), backend.clone())
    }

    #[tokio::test]
    async fn set_then_get_uses_cache() {
        let (backend, store) = setup();

        store.set("retries", 3).await.unwrap();
        backend.reset_counters();

        assert_eq!(store.get("retries", 0).await.unwrap(), ConfigValue::Int(3));
        assert_eq!(backend.counters().total(), 0);
    }

    #[tokio::test]
    async fn default_is_cached() {
        let (backend, store) = setup();

        assert_eq!(store.get("missing", "D").await.unwrap(), ConfigValue::from("D"));
        assert_eq!(store.get("missing", "D").await.unwrap(), ConfigValue::from("D"));
        assert_eq!(backend.counters().queries, 1);
    }

    #[tokio::test]
    async fn first_default_wins() {
        let (_backend, store) = setup();

        store.get("missing", 1).await.unwrap();
        assert_eq!(store.get("missing", 2).await.unwrap(), ConfigValue::Int(1));
    }

    #[tokio::test]
    async fn values_round_trip_through_fresh_store() {
        let (backend, store) = setup();

        let mut nested = BTreeMap::new();
        nested.insert("host".to_string(), ConfigValue::from("db1"));
        nested.insert(
            "ports".to_string(),
            ConfigValue::from(vec![5432_i64, 5433]),
        );

        let values = [
            ("flag", ConfigValue::Bool(true)),
            ("count", ConfigValue::Int(42)),
            ("ratio", ConfigValue::Float(0.25)),
            ("name", ConfigValue::from("site")),
            ("db", ConfigValue::Map(nested)),
        ];
        for (key, value) in &values {
            store.set(key, value.clone()).await.unwrap();
        }

        let reader = fresh(&backend);
        for (key, value) in &values {
            assert_eq!(&reader.get(key, "other").await.unwrap(), value, "{key}");
        }
    }

    #[tokio::test]
    async fn false_reads_back_as_false() {
        let (backend, store) = setup();
        store.set("enabled", false).await.unwrap();

        let reader = fresh(&backend);
        assert_eq!(
            reader.get("enabled", true).await.unwrap(),
            ConfigValue::Bool(false)
        );
    }

    #[tokio::test]
    async fn set_inserts_absent_and_updates_present() {
        let (backend, store) = setup();

        store.set("k", 1).await.unwrap();
        assert_eq!(
            backend.counters(),
            BackendCounters {
                queries: 1,
                inserts: 1,
                updates: 0,
                deletes: 0,
            }
        );

        backend.reset_counters();
        store.set("k", 2).await.unwrap();
        assert_eq!(
            backend.counters(),
            BackendCounters {
                queries: 0,
                inserts: 0,
                updates: 1,
                deletes: 0,
            }
        );
    }

    #[tokio::test]
    async fn set_on_existing_uncached_row_updates() {
        let (backend, store) = setup();
        backend.seed(&options(), "k", "i:1;").unwrap();

        store.set("k", 2).await.unwrap();

        let counters = backend.counters();
        assert_eq!(counters.inserts, 0);
        assert_eq!(counters.updates, 1);
        assert_eq!(fresh(&backend).get("k", 0).await.unwrap(), ConfigValue::Int(2));
    }

    #[tokio::test]
    async fn set_after_cached_default_inserts() {
        let (backend, store) = setup();

        store.get("k", "fallback").await.unwrap();
        store.set("k", "real").await.unwrap();

        assert_eq!(backend.counters().inserts, 1);
        assert_eq!(backend.counters().updates, 0);
        assert_eq!(
            fresh(&backend).get_or_null("k").await.unwrap(),
            ConfigValue::from("real")
        );
    }

    #[tokio::test]
    async fn insert_conflict_retries_as_update() {
        let (backend, store) = setup();

        // Resolve as absent, then let another writer create the row.
        store.get("k", 0).await.unwrap();
        fresh(&backend).set("k", 1).await.unwrap();
        backend.reset_counters();

        store.set("k", 2).await.unwrap();

        assert_eq!(backend.counters().inserts, 1);
        assert_eq!(backend.counters().updates, 1);
        assert_eq!(fresh(&backend).get("k", 0).await.unwrap(), ConfigValue::Int(2));
    }

    #[tokio::test]
    async fn set_after_external_delete_inserts() {
        let (backend, store) = setup();
        store.set("k", 1).await.unwrap();
        fresh(&backend).delete("k").await.unwrap();
        backend.reset_counters();

        store.set("k", 2).await.unwrap();

        assert_eq!(backend.counters().updates, 1);
        assert_eq!(backend.counters().inserts, 1);
        assert_eq!(fresh(&backend).get("k", 0).await.unwrap(), ConfigValue::Int(2));
    }

    #[tokio::test]
    async fn slow_cold_read_does_not_cache_over_a_later_set() {
        let backend = Arc::new(GatedBackend::armed());
        let store = Arc::new(ConfigStore::new(options(), backend.clone()));

        let reader = {
            let store = Arc::clone(&store);
            tokio::spawn(async move { store.get("k", 0).await })
        };
        backend.parked.notified().await;

        let writer = {
            let store = Arc::clone(&store);
            tokio::spawn(async move { store.set("k", 5).await.map(|_| ()) })
        };
        tokio::task::yield_now().await;
        backend.release.notify_one();

        assert_eq!(reader.await.unwrap().unwrap(), ConfigValue::Int(0));
        writer.await.unwrap().unwrap();

        assert_eq!(store.get("k", 0).await.unwrap(), ConfigValue::Int(5));
        assert_eq!(
            backend.inner.raw(&options(), "k").unwrap(),
            Some(r#"{"type":"int","payload":5}"#.to_string())
        );
    }

    #[tokio::test]
    async fn set_returns_the_store_for_chaining() {
        let (_backend, store) = setup();

        store
            .set("a", 1)
            .await
            .unwrap()
            .set("b", 2)
            .await
            .unwrap();

        assert_eq!(store.cached_keys(), vec!["a".to_string(), "b".to_string()]);
    }

    #[tokio::test]
    async fn cache_keeps_the_original_value() {
        let (backend, store) = setup();

        store.set("nan", f64::NAN).await.unwrap();
        let cached = store.get("nan", 0).await.unwrap();
        assert!(cached.as_f64().is_some_and(f64::is_nan));

        // The envelope cannot carry NaN, so a fresh reader sees raw text.
        let reread = fresh(&backend).get("nan", 0).await.unwrap();
        assert!(matches!(reread, ConfigValue::String(_)));
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let (backend, store) = setup();

        store.delete("never-set").await.unwrap();
        assert!(store.cached_keys().is_empty());
        assert_eq!(backend.counters().deletes, 1);
    }

    #[tokio::test]
    async fn delete_purges_row_and_cache() {
        let (backend, store) = setup();
        store.set("k", "v").await.unwrap();

        store.delete("k").await.unwrap();

        assert!(store.cached_keys().is_empty());
        assert_eq!(backend.row_count(&options()).unwrap(), 0);
        assert!(store.get_or_null("k").await.unwrap().is_null());
    }

    #[tokio::test]
    async fn has_caches_found_rows() {
        let (backend, store) = setup();
        backend.seed(&options(), "k", r#"{"type":"int","payload":7}"#).unwrap();

        assert!(store.has("k").await.unwrap());
        assert_eq!(backend.counters().queries, 1);

        assert_eq!(store.get("k", 0).await.unwrap(), ConfigValue::Int(7));
        assert_eq!(backend.counters().queries, 1);
    }

    #[tokio::test]
    async fn has_on_missing_key_does_not_cache() {
        let (backend, store) = setup();

        assert!(!store.has("nope").await.unwrap());
        assert!(!store.has("nope").await.unwrap());
        assert_eq!(backend.counters().queries, 2);
        assert!(store.cached_keys().is_empty());
    }

    #[tokio::test]
    async fn has_is_true_for_cached_default() {
        let (backend, store) = setup();

        store.get("k", 5).await.unwrap();
        assert!(store.has("k").await.unwrap());
        assert_eq!(backend.counters().queries, 1);
    }

    #[tokio::test]
    async fn legacy_and_plain_rows_decode() {
        let (backend, store) = setup();
        backend.seed(&options(), "off", "b:0;").unwrap();
        backend.seed(&options(), "motd", "Welcome back").unwrap();

        assert_eq!(store.get("off", true).await.unwrap(), ConfigValue::Bool(false));
        assert_eq!(
            store.get("motd", "").await.unwrap(),
            ConfigValue::from("Welcome back")
        );
    }

    #[tokio::test]
    async fn failed_insert_leaves_cache_untouched() {
        let (backend, store) = setup();
        backend.fail_next(BackendOp::Insert).unwrap();

        let err = store.set("k", 1).await.unwrap_err();
        assert!(matches!(err, StoreError::Backend(_)));
        assert!(store.cached_keys().is_empty());
        assert!(backend.raw(&options(), "k").unwrap().is_none());
    }

    #[tokio::test]
    async fn failed_update_keeps_previous_value() {
        let (backend, store) = setup();
        store.set("k", 1).await.unwrap();
        backend.fail_next(BackendOp::Update).unwrap();

        assert!(store.set("k", 2).await.is_err());
        assert_eq!(store.get("k", 0).await.unwrap(), ConfigValue::Int(1));
    }

    #[tokio::test]
    async fn failed_query_propagates_and_caches_nothing() {
        let (backend, store) = setup();
        backend.fail_next(BackendOp::Query).unwrap();

        assert!(store.get("k", 0).await.is_err());
        assert!(store.cached_keys().is_empty());

        // The next attempt queries again and succeeds.
        assert_eq!(store.get("k", 9).await.unwrap(), ConfigValue::Int(9));
    }

    #[tokio::test]
    async fn failed_delete_keeps_cache() {
        let (backend, store) = setup();
        store.set("k", 1).await.unwrap();
        backend.fail_next(BackendOp::Delete).unwrap();

        assert!(store.delete("k").await.is_err());
        assert_eq!(store.get("k", 0).await.unwrap(), ConfigValue::Int(1));
    }

    #[tokio::test]
    async fn get_as_converts_types() {
        let (_backend, store) = setup();
        store.set("retries", 3).await.unwrap();
        store.set("hosts", vec!["a", "b"]).await.unwrap();

        assert_eq!(store.get_as::<u32>("retries", 0).await.unwrap(), 3);
        assert_eq!(
            store.get_as::<Vec<String>>("hosts", Vec::new()).await.unwrap(),
            vec!["a".to_string(), "b".to_string()]
        );
        assert_eq!(store.get_as::<u16>("absent", 8080).await.unwrap(), 8080);

        let err = store.get_as::<bool>("retries", false).await.unwrap_err();
        assert!(matches!(err, StoreError::TypeMismatch { .. }));
    }

    #[tokio::test]
    async fn clear_cache_forces_requery() {
        let (backend, store) = setup();
        store.set("k", 1).await.unwrap();

        store.clear_cache().await;
        backend.reset_counters();

        assert_eq!(store.get("k", 0).await.unwrap(), ConfigValue::Int(1));
        assert_eq!(backend.counters().queries, 1);
    }

    #[tokio::test]
    async fn cache_stats_count_lookups() {
        let (_backend, store) = setup();
        store.get("k", 0).await.unwrap();
        store.get("k", 0).await.unwrap();

        assert_eq!(store.cache_stats(), CacheStats { hits: 1, misses: 1 });
    }

    #[tokio::test]
    async fn stores_on_other_tables_are_isolated() {
        let backend = Arc::new(MemoryBackend::new());
        let site = ConfigStore::new(options(), backend.clone());
        let admin = ConfigStore::new(TableName::new("admin_options").unwrap(), backend.clone());

        site.set("theme", "light").await.unwrap();
        assert!(admin.get_or_null("theme").await.unwrap().is_null());
        assert_eq!(admin.table().as_str(), "admin_options");
    }

    #[tokio::test]
    async fn concurrent_sets_on_one_store_never_conflict() {
        let (backend, store) = setup();
        let store = Arc::new(store);

        let mut handles = Vec::new();
        for i in 0..8_i64 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store.set("shared", i).await.map(|_| ())
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let counters = backend.counters();
        assert_eq!(counters.inserts, 1);
        assert_eq!(counters.updates, 7);
    }

    #[tokio::test]
    async fn open_in_memory_store() {
        let store = ConfigStore::open(&StoreSettings::in_memory()).await.unwrap();
        store.set("retries", 3).await.unwrap();
        assert_eq!(store.get("retries", 0).await.unwrap(), ConfigValue::Int(3));
        assert_eq!(store.table().as_str(), "options");
    }
}
