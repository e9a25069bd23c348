//! Table bootstrap for configuration tables.
//!
//! A configuration table has exactly two columns, `key TEXT PRIMARY KEY` and
//! `value TEXT`. This module only creates the table when it is missing; it
//! never alters an existing one.

use rusqlite::Connection;
use tracing::{debug, info};

use crate::backend::TableName;
use crate::error::StoreResult;

/// Create `table` if it does not exist yet.
///
/// This is a **synchronous** function; call it from `spawn_blocking`
/// (or through [`crate::Database::execute`]).
pub fn ensure_table(conn: &Connection, table: &TableName) -> StoreResult<()> {
    if table_exists(conn, table)? {
        debug!(table = %table, "config table already present");
        return Ok(());
    }

    conn.execute_batch(&format!(
        "CREATE TABLE IF NOT EXISTS {} (
            key   TEXT PRIMARY KEY,
            value TEXT
        );",
        table.quoted()
    ))?;

    info!(table = %table, "config table created");
    Ok(())
}

/// Whether `table` exists in the main schema.
pub fn table_exists(conn: &Connection, table: &TableName) -> StoreResult<bool> {
    let count: i64 = conn.query_row(
        "SELECT count(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
        rusqlite::params![table.as_str()],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

// ── tests ────────────────────────────────────────────────────────────
