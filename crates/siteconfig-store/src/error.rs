//! Error types for the siteconfig-store crate.
//!
//! All store and backend operations return [`StoreError`] via [`StoreResult`].
//! A stored value that cannot be decoded is *not* an error: it degrades to a
//! raw string (see [`crate::codec`]).

use thiserror::Error;

/// Alias for `Result<T, StoreError>`.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in the configuration store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// SQLite operation failed.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// JSON serialization or deserialization failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// An insert targeted a key that already has a row.
    #[error("duplicate key `{key}` in table `{table}`")]
    DuplicateKey { table: String, key: String },

    /// An update targeted a key that has no row.
    #[error("no row for key `{key}` in table `{table}`")]
    MissingRow { table: String, key: String },

    /// The table name is not a plain SQL identifier.
    #[error("invalid table name: {0:?}")]
    InvalidTableName(String),

    /// Any other failure reported by a backing store.
    #[error("backend error: {0}")]
    Backend(String),

    /// A typed read could not convert the stored value.
    #[error("value for `{key}` is not a valid {expected}")]
    TypeMismatch { key: String, expected: &'static str },

    /// Settings could not be loaded.
    #[error("settings error: {0}")]
    Settings(String),

    /// A blocking task was cancelled or panicked.
    #[error("background task failed: {0}")]
    TaskJoin(String),
}

impl From<tokio::task::JoinError> for StoreError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::TaskJoin(err.to_string())
    }
}

impl StoreError {
    /// Whether this error reports an insert conflict on an existing key.
    pub fn is_duplicate_key(&self) -> bool {
        matches!(self, Self::DuplicateKey { .. })
    }

    /// Whether this error reports an update of a key with no row.
    pub fn is_missing_row(&self) -> bool {
        matches!(self, Self::MissingRow { .. })
    }
}
