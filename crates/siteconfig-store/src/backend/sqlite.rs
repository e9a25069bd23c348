//! SQLite implementation of [`ConfigBackend`].

use async_trait::async_trait;
use rusqlite::{ErrorCode, OptionalExtension};
use tracing::{debug, instrument};

use super::{ConfigBackend, TableName};
use crate::db::Database;
use crate::error::{StoreError, StoreResult};
use crate::schema;

/// Config table accessor over a shared [`Database`] handle.
///
/// Several backends (and several stores) may share one database; cloning is
/// cheap.
#[derive(Debug, Clone)]
pub struct SqliteBackend {
    db: Database,
}

impl SqliteBackend {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// The underlying database handle.
    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Create `table` if it is missing.
    pub async fn ensure_table(&self, table: &TableName) -> StoreResult<()> {
        let table = table.clone();
        self.db
            .execute(move |conn| schema::ensure_table(conn, &table))
            .await
    }
}

#[async_trait]
impl ConfigBackend for SqliteBackend {
    #[instrument(skip(self), fields(table = %table))]
    async fn query_one(&self, table: &TableName, key: &str) -> StoreResult<Option<String>> {
        let sql = format!("SELECT value FROM {} WHERE key = ?1", table.quoted());
        let key = key.to_string();
        self.db
            .execute(move |conn| {
                // A NULL value column reads back as an empty string.
                let value: Option<Option<String>> = conn
                    .query_row(&sql, rusqlite::params![key], |row| row.get(0))
                    .optional()?;
                Ok(value.map(Option::unwrap_or_default))
            })
            .await
    }

    #[instrument(skip(self, value), fields(table = %table))]
    async fn insert(&self, table: &TableName, key: &str, value: &str) -> StoreResult<()> {
        let sql = format!("INSERT INTO {} (key, value) VALUES (?1, ?2)", table.quoted());
        let table_name = table.to_string();
        let key = key.to_string();
        let value = value.to_string();
        self.db
            .execute(move |conn| {
                let result = conn.execute(&sql, rusqlite::params![key, value]);
                match result {
                    Ok(_) => {
                        debug!(key = %key, "config row inserted");
                        Ok(())
                    }
                    Err(rusqlite::Error::SqliteFailure(err, _))
                        if err.code == ErrorCode::ConstraintViolation =>
                    {
                        Err(StoreError::DuplicateKey {
                            table: table_name,
                            key,
                        })
                    }
                    Err(e) => Err(e.into()),
                }
            })
            .await
    }

    #[instrument(skip(self, value), fields(table = %table))]
    async fn update(&self, table: &TableName, key: &str, value: &str) -> StoreResult<()> {
        let sql = format!("UPDATE {} SET value = ?2 WHERE key = ?1", table.quoted());
        let table_name = table.to_string();
        let key = key.to_string();
        let value = value.to_string();
        self.db
            .execute(move |conn| {
                let changed = conn.execute(&sql, rusqlite::params![key, value])?;
                if changed == 0 {
                    return Err(StoreError::MissingRow {
                        table: table_name,
                        key,
                    });
                }
                debug!(key = %key, "config row updated");
                Ok(())
            })
            .await
    }

    #[instrument(skip(self), fields(table = %table))]
    async fn delete(&self, table: &TableName, key: &str) -> StoreResult<()> {
        let sql = format!("DELETE FROM {} WHERE key = ?1", table.quoted());
        let key = key.to_string();
        self.db
            .execute(move |conn| {
                let deleted = conn.execute(&sql, rusqlite::params![key])?;
                debug!(key = %key, deleted, "config row deleted");
                Ok(())
            })
            .await
    }
}

// ── tests ────────────────────────────────────────────────────────────
