//! Store settings loaded from TOML with environment overrides.
//!
//! ```toml
//! [store]
//! database_path = "data/siteconfig.db"
//! table = "options"
//! create_table = true
//! ```
//!
//! Any field may be omitted. Environment variables win over the file:
//! `SITECONFIG_DB_PATH`, `SITECONFIG_TABLE`, `SITECONFIG_CREATE_TABLE`.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use crate::backend::TableName;
use crate::error::{StoreError, StoreResult};

/// Path value that selects an in-memory SQLite database.
pub const IN_MEMORY_PATH: &str = ":memory:";

pub const ENV_DB_PATH: &str = "SITECONFIG_DB_PATH";
pub const ENV_TABLE: &str = "SITECONFIG_TABLE";
pub const ENV_CREATE_TABLE: &str = "SITECONFIG_CREATE_TABLE";

/// Where a [`crate::ConfigStore`] keeps its data.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    /// SQLite file, or `:memory:`.
    pub database_path: PathBuf,
    /// Config table name.
    pub table: String,
    /// Create the table on open if it is missing.
    pub create_table: bool,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("data/siteconfig.db"),
            table: "options".to_string(),
            create_table: true,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct SettingsFile {
    #[serde(default)]
    store: StoreSettings,
}

impl StoreSettings {
    /// Settings for a throwaway in-memory database.
    pub fn in_memory() -> Self {
        Self {
            database_path: PathBuf::from(IN_MEMORY_PATH),
            ..Self::default()
        }
    }

    /// Parse the `[store]` section of a TOML document.
    pub fn from_toml_str(content: &str) -> StoreResult<Self> {
        let file: SettingsFile =
            toml::from_str(content).map_err(|e| StoreError::Settings(e.to_string()))?;
        Ok(file.store)
    }

    /// Read settings from `path`, falling back to defaults if it is missing.
    pub fn from_file(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        match std::fs::read_to_string(path) {
            Ok(content) => {
                debug!(path = %path.display(), "loading store settings");
                Self::from_toml_str(&content)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "settings file not found, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(StoreError::Settings(format!(
                "failed to read {}: {e}",
                path.display()
            ))),
        }
    }

    /// Override fields from the process environment.
    pub fn with_env(self) -> StoreResult<Self> {
        self.with_overrides(|name| std::env::var(name).ok())
    }

    /// Override fields from `lookup`, which maps variable names to values.
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> StoreResult<Self> {
        if let Some(path) = lookup(ENV_DB_PATH) {
            self.database_path = PathBuf::from(path);
        }
        if let Some(table) = lookup(ENV_TABLE) {
            self.table = table;
        }
        if let Some(flag) = lookup(ENV_CREATE_TABLE) {
            self.create_table = match flag.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" => false,
                other => {
                    return Err(StoreError::Settings(format!(
                        "{ENV_CREATE_TABLE} must be a boolean, got {other:?}"
                    )));
                }
            };
        }
        Ok(self)
    }

    /// Whether the database lives only in memory.
    pub fn is_in_memory(&self) -> bool {
        self.database_path.as_os_str() == IN_MEMORY_PATH
    }

    /// The validated table name.
    pub fn table_name(&self) -> StoreResult<TableName> {
        TableName::new(self.table.clone())
    }
}

// ── tests ────────────────────────────────────────────────────────────
