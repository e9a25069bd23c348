//! CLI entry point for siteconfig.
//!
//! This binary provides the `siteconfig` command with `get`, `has`, `set`
//! and `delete` subcommands over a single configuration table.

mod cli;
mod helpers;

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use siteconfig_store::{ConfigStore, ConfigValue};
use tracing::info;

use crate::cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    helpers::init_tracing(&cli.log_level);

    let settings = helpers::load_settings(&cli)?;
    let store = ConfigStore::open(&settings)
        .await
        .with_context(|| format!("failed to open {}", settings.database_path.display()))?;

    match cli.command {
        Commands::Get { key, default } => {
            let default = default
                .as_deref()
                .map(helpers::parse_value)
                .unwrap_or(ConfigValue::Null);
            let value = store
                .get(&key, default)
                .await
                .with_context(|| format!("failed to read `{key}`"))?;
            println!("{value}");
            Ok(ExitCode::SUCCESS)
        }
        Commands::Has { key } => {
            let found = store
                .has(&key)
                .await
                .with_context(|| format!("failed to look up `{key}`"))?;
            println!("{found}");
            Ok(if found {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Commands::Set { key, value } => {
            let value = helpers::parse_value(&value);
            store
                .set(&key, value)
                .await
                .with_context(|| format!("failed to write `{key}`"))?;
            info!(key = %key, table = %store.table(), "value stored");
            Ok(ExitCode::SUCCESS)
        }
        Commands::Delete { key } => {
            store
                .delete(&key)
                .await
                .with_context(|| format!("failed to delete `{key}`"))?;
            info!(key = %key, table = %store.table(), "value deleted");
            Ok(ExitCode::SUCCESS)
        }
    }
}
