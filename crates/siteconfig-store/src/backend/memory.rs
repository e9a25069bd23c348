//! In-process implementation of [`ConfigBackend`].
//!
//! Rows live in a `HashMap` keyed by `(table, key)`. Every call is counted,
//! and a single failure can be armed with [`MemoryBackend::fail_next`], which
//! makes this backend the usual choice for exercising the store's caching
//! rules without a database.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tracing::debug;

use super::{ConfigBackend, TableName};
use crate::error::{StoreError, StoreResult};

/// One of the four backend operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendOp {
    Query,
    Insert,
    Update,
    Delete,
}

/// Snapshot of how many times each operation was called.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BackendCounters {
    pub queries: u64,
    pub inserts: u64,
    pub updates: u64,
    pub deletes: u64,
}

impl BackendCounters {
    /// Sum of all operations.
    pub fn total(&self) -> u64 {
        self.queries + self.inserts + self.updates + self.deletes
    }
}

/// `HashMap`-backed config tables with call counters.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    rows: Mutex<HashMap<(String, String), String>>,
    armed_failure: Mutex<Option<BackendOp>>,
    queries: AtomicU64,
    inserts: AtomicU64,
    updates: AtomicU64,
    deletes: AtomicU64,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current call counts.
    pub fn counters(&self) -> BackendCounters {
        BackendCounters {
            queries: self.queries.load(Ordering::Relaxed),
            inserts: self.inserts.load(Ordering::Relaxed),
            updates: self.updates.load(Ordering::Relaxed),
            deletes: self.deletes.load(Ordering::Relaxed),
        }
    }

    /// Reset all call counts to zero.
    pub fn reset_counters(&self) {
        self.queries.store(0, Ordering::Relaxed);
        self.inserts.store(0, Ordering::Relaxed);
        self.updates.store(0, Ordering::Relaxed);
        self.deletes.store(0, Ordering::Relaxed);
    }

    /// Make the next call of `op` fail with [`StoreError::Backend`].
    pub fn fail_next(&self, op: BackendOp) -> StoreResult<()> {
        *self.armed()? = Some(op);
        Ok(())
    }

    /// Write a row directly, bypassing counters. Useful for seeding legacy data.
    pub fn seed(&self, table: &TableName, key: &str, raw: &str) -> StoreResult<()> {
        self.rows()?
            .insert((table.to_string(), key.to_string()), raw.to_string());
        Ok(())
    }

    /// Read a row directly, bypassing counters.
    pub fn raw(&self, table: &TableName, key: &str) -> StoreResult<Option<String>> {
        Ok(self
            .rows()?
            .get(&(table.to_string(), key.to_string()))
            .cloned())
    }

    /// Number of rows stored in `table`.
    pub fn row_count(&self, table: &TableName) -> StoreResult<usize> {
        Ok(self
            .rows()?
            .keys()
            .filter(|(t, _)| t == table.as_str())
            .count())
    }

    fn rows(&self) -> StoreResult<std::sync::MutexGuard<'_, HashMap<(String, String), String>>> {
        self.rows
            .lock()
            .map_err(|e| StoreError::TaskJoin(format!("mutex poisoned: {e}")))
    }

    fn armed(&self) -> StoreResult<std::sync::MutexGuard<'_, Option<BackendOp>>> {
        self.armed_failure
            .lock()
            .map_err(|e| StoreError::TaskJoin(format!("mutex poisoned: {e}")))
    }

    /// Count the call and fire an armed failure for `op`.
    fn enter(&self, op: BackendOp) -> StoreResult<()> {
        let counter = match op {
            BackendOp::Query => &self.queries,
            BackendOp::Insert => &self.inserts,
            BackendOp::Update => &self.updates,
            BackendOp::Delete => &self.deletes,
        };
        counter.fetch_add(1, Ordering::Relaxed);

        let mut armed = self.armed()?;
        if *armed == Some(op) {
            *armed = None;
            debug!(?op, "injected backend failure");
            return Err(StoreError::Backend(format!("injected {op:?} failure")));
        }
        Ok(())
    }
}

#[async_trait]
impl ConfigBackend for MemoryBackend {
    async fn query_one(&self, table: &TableName, key: &str) -> StoreResult<Option<String>> {
        self.enter(BackendOp::Query)?;
        self.raw(table, key)
    }

    async fn insert(&self, table: &TableName, key: &str, value: &str) -> StoreResult<()> {
        self.enter(BackendOp::Insert)?;
        let mut rows = self.rows()?;
        let id = (table.to_string(), key.to_string());
        if rows.contains_key(&id) {
            return Err(StoreError::DuplicateKey {
                table: id.0,
                key: id.1,
            });
        }
        rows.insert(id, value.to_string());
        Ok(())
    }

    async fn update(&self, table: &TableName, key: &str, value: &str) -> StoreResult<()> {
        self.enter(BackendOp::Update)?;
        let mut rows = self.rows()?;
        match rows.get_mut(&(table.to_string(), key.to_string())) {
            Some(row) => {
                *row = value.to_string();
                Ok(())
            }
            None => Err(StoreError::MissingRow {
                table: table.to_string(),
                key: key.to_string(),
            }),
        }
    }

    async fn delete(&self, table: &TableName, key: &str) -> StoreResult<()> {
        self.enter(BackendOp::Delete)?;
        self.rows()?.remove(&(table.to_string(), key.to_string()));
        Ok(())
    }
}

// ── tests ────────────────────────────────────────────────────────────
