//! Command definitions and implementations.
//!
//! Each command is defined in its own module with:
//! - The command struct with clap attributes for CLI parsing
//! - An `Execute` implementation producing a serializable result
//! - An `Outputable` implementation rendering that result as a table

mod blob;
mod query;

pub use blob::BlobCmd;
pub use query::QueryCmd;

use clap::Subcommand;
use db::SqliteDatabase;
use std::error::Error;

use crate::output::{OutputFormat, Outputable};

/// An open database plus settings commands fall back on.
pub struct Session {
    pub db: SqliteDatabase,
    /// Row cap for `query` when the command line gives none
    pub max_rows: Option<u32>,
}

/// Trait for executing commands with command-specific result types.
pub trait Execute {
    type Output: Outputable;

    fn execute(self, session: &Session) -> Result<Self::Output, Box<dyn Error>>;
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a SQL statement and print every row it returns
    Query(QueryCmd),

    /// Read, write or inspect a single blob cell
    Blob(BlobCmd),

    /// Catch-all for unknown commands
    #[command(external_subcommand)]
    Unknown(Vec<String>),
}

impl Command {
    /// Execute the command and return formatted output
    pub fn run(self, session: &Session, format: OutputFormat) -> Result<String, Box<dyn Error>> {
        match self {
            Command::Query(cmd) => {
                let result = cmd.execute(session)?;
                Ok(result.format(format))
            }
            Command::Blob(cmd) => {
                let result = cmd.execute(session)?;
                Ok(result.format(format))
            }
            Command::Unknown(args) => {
                Err(format!("Unknown command: {}", args.first().unwrap_or(&String::new())).into())
            }
        }
    }
}
