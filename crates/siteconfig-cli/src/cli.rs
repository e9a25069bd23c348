//! CLI argument definitions for siteconfig.
//!
//! All `clap` structures live here so that `main.rs` stays focused on
//! dispatching subcommands.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// siteconfig -- read and write configuration values stored in SQLite.
#[derive(Parser)]
#[command(
    name = "siteconfig",
    version,
    about = "siteconfig -- key/value configuration backed by a SQLite table",
    long_about = "Reads and writes configuration values in a (key, value) table. Values are \
                  stored as tagged JSON; older serialized rows are still readable."
)]
pub struct Cli {
    /// Settings file with a `[store]` section.
    #[arg(long, short, default_value = "config/siteconfig.toml")]
    pub config: PathBuf,

    /// SQLite database path (overrides settings and SITECONFIG_DB_PATH).
    #[arg(long)]
    pub db: Option<PathBuf>,

    /// Config table name (overrides settings and SITECONFIG_TABLE).
    #[arg(long)]
    pub table: Option<String>,

    /// Default log level when RUST_LOG is unset.
    #[arg(long, default_value = "warn")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print the value stored under a key as JSON.
    Get {
        key: String,

        /// JSON value printed when the key has no row.
        #[arg(long, short)]
        default: Option<String>,
    },

    /// Exit 0 if the key has a row, 1 otherwise.
    Has { key: String },

    /// Store a value. It is parsed as JSON, or kept as a string if that fails.
    Set { key: String, value: String },

    /// Remove a key. Removing an absent key succeeds.
    Delete { key: String },
}
