//! # siteconfig-store
//!
//! Write-through, lazily populated key/value configuration backed by a
//! relational table.
//!
//! Reads are served from an in-memory cache after the first lookup of a key;
//! writes go to the table first and are cached once they succeed.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  ConfigStore  get / has / set / delete  │
//! ├─────────────────────────────────────────┤
//! │  ValueCache (moka, unbounded, no TTL)   │
//! │  codec (tagged JSON, legacy rows)       │
//! ├─────────────────────────────────────────┤
//! │  ConfigBackend                          │
//! │    SqliteBackend (rusqlite WAL)         │
//! │    MemoryBackend (HashMap + counters)   │
//! └─────────────────────────────────────────┘
//! ```
//!
//! ## Quick start
//!
//! ```ignore
//! use std::sync::Arc;
//! use siteconfig_store::{ConfigStore, Database, SqliteBackend, TableName};
//!
//! let backend = SqliteBackend::new(Database::open("data/site.db")?);
//! let table = TableName::new("options")?;
//! backend.ensure_table(&table).await?;
//!
//! let store = ConfigStore::new(table, Arc::new(backend));
//! store.set("retries", 3).await?;
//! assert_eq!(store.get("retries", 0).await?.as_i64(), Some(3));
//! ```

pub mod backend;
pub mod cache;
pub mod codec;
pub mod db;
pub mod error;
pub mod schema;
pub mod settings;
pub mod store;
pub mod value;

// ── re-exports ───────────────────────────────────────────────────────

pub use backend::{
    BackendCounters, BackendOp, ConfigBackend, MemoryBackend, SqliteBackend, TableName,
};
pub use cache::{CacheStats, CachedValue, ValueCache};
pub use db::Database;
pub use error::{StoreError, StoreResult};
pub use settings::StoreSettings;
pub use store::ConfigStore;
pub use value::ConfigValue;
