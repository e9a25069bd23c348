//! Backing-store abstraction for configuration tables.
//!
//! A [`ConfigBackend`] offers the four point operations the store needs on a
//! `(key, value)` table. Every call names the table explicitly; the store
//! passes the [`TableName`] it was built with, so a query can never be
//! retargeted at another table.

pub mod memory;
pub mod sqlite;

use std::fmt;

use async_trait::async_trait;

use crate::error::{StoreError, StoreResult};

pub use memory::{BackendCounters, BackendOp, MemoryBackend};
pub use sqlite::SqliteBackend;

/// Longest accepted table name.
const MAX_TABLE_NAME_LEN: usize = 64;

// ---------------------------------------------------------------------------
// TableName
// ---------------------------------------------------------------------------

/// A validated SQL identifier naming a configuration table.
///
/// Only `[A-Za-z_][A-Za-z0-9_]*` up to 64 characters is accepted. SQL text
/// uses [`TableName::quoted`], so keywords such as `order` are valid names.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableName(String);

impl TableName {
    pub fn new(name: impl Into<String>) -> StoreResult<Self> {
        let name = name.into();
        let mut chars = name.chars();
        let head_ok = chars
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
        let tail_ok = chars.all(|c| c.is_ascii_alphanumeric() || c == '_');

        if !head_ok || !tail_ok || name.len() > MAX_TABLE_NAME_LEN {
            return Err(StoreError::InvalidTableName(name));
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The name as a double-quoted SQL identifier.
    ///
    /// The validated alphabet has no `"`, so no escaping is needed.
    pub fn quoted(&self) -> String {
        format!("\"{}\"", self.0)
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for TableName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// ---------------------------------------------------------------------------
// ConfigBackend
// ---------------------------------------------------------------------------

/// Point access to a `(key TEXT PRIMARY KEY, value TEXT)` table.
///
/// Implementations must enforce key uniqueness: [`ConfigBackend::insert`] on
/// an existing key fails with [`StoreError::DuplicateKey`], and
/// [`ConfigBackend::update`] of an absent key fails with
/// [`StoreError::MissingRow`]. Any other failure
/// is returned as-is and the store propagates it unchanged.
#[async_trait]
pub trait ConfigBackend: Send + Sync {
    /// Look up the stored text for `key`, or `None` when no row exists.
    async fn query_one(&self, table: &TableName, key: &str) -> StoreResult<Option<String>>;

    /// Insert a new row.
    async fn insert(&self, table: &TableName, key: &str, value: &str) -> StoreResult<()>;

    /// Replace the value of the row matching `key`, which must exist.
    async fn update(&self, table: &TableName, key: &str, value: &str) -> StoreResult<()>;

    /// Remove the row matching `key`. Removing an absent key is not an error.
    async fn delete(&self, table: &TableName, key: &str) -> StoreResult<()>;
}

// ── tests ────────────────────────────────────────────────────────────
