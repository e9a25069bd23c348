//! Shared helper functions used across CLI subcommands.

use anyhow::{Context, Result};
use siteconfig_store::{ConfigValue, StoreSettings};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::cli::Cli;

// ---------------------------------------------------------------------------
// Tracing
// ---------------------------------------------------------------------------

/// Initialize the tracing subscriber with the given default log level.
pub fn init_tracing(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

/// Resolve store settings: file, then environment, then command-line flags.
pub fn load_settings(cli: &Cli) -> Result<StoreSettings> {
    let mut settings = StoreSettings::from_file(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?
        .with_env()
        .context("invalid SITECONFIG_* environment")?;

    if let Some(db) = &cli.db {
        settings.database_path = db.clone();
    }
    if let Some(table) = &cli.table {
        settings.table = table.clone();
    }

    debug!(?settings, "store settings resolved");
    Ok(settings)
}

// ---------------------------------------------------------------------------
// Values
// ---------------------------------------------------------------------------

/// Interpret a command-line argument as a value: JSON if it parses, else text.
pub fn parse_value(raw: &str) -> ConfigValue {
    serde_json::from_str::<serde_json::Value>(raw)
        .map(ConfigValue::from)
        .unwrap_or_else(|_| ConfigValue::String(raw.to_string()))
}
