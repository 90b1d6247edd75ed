//! CLI argument definitions.
//!
//! This module contains the top-level CLI structure and database resolution.
//! Individual command definitions are in the `commands` module.

use std::error::Error;
use std::path::PathBuf;

use clap::Parser;
use db::DatabaseConfig;

use crate::commands::Command;
use crate::config::ConfigFile;
use crate::output::OutputFormat;

/// Database used when nothing else is configured.
pub const DEFAULT_DB_PATH: &str = "./sqlcursor.db";

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Database file path or URL (`sqlite://path`, `:memory:`)
    ///
    /// If not specified, falls back to:
    ///   1. $SQLCURSOR_DATABASE_URL
    ///   2. the "database" entry of .sqlcursor.json
    ///   3. ./sqlcursor.db
    #[arg(long, global = true)]
    pub db: Option<String>,

    /// Output format
    #[arg(short = 'o', long, value_enum, default_value_t = OutputFormat::Table, global = true)]
    pub format: OutputFormat,

    /// Log cursor and blob activity to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Pick the database: `--db` flag, then environment, then config file, then
/// [`DEFAULT_DB_PATH`].
pub fn resolve_database(
    explicit: Option<&str>,
    config_file: Option<&ConfigFile>,
) -> Result<DatabaseConfig, Box<dyn Error>> {
    if let Some(url) = explicit {
        return Ok(DatabaseConfig::from_url(url)?);
    }

    if let Some(config) = DatabaseConfig::from_env()? {
        return Ok(config);
    }

    if let Some(database) = config_file.and_then(|c| c.database.clone()) {
        return Ok(database);
    }

    Ok(DatabaseConfig::Sqlite {
        path: PathBuf::from(DEFAULT_DB_PATH),
    })
}
