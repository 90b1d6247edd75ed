mod cli_tests;
mod execute;
mod execute_tests;
mod output;

use clap::Args;

/// Run a SQL statement and print every row it returns
#[derive(Args, Debug)]
#[command(after_help = "\
Examples:
  sqlcursor query 'SELECT * FROM users'                 # Print every row
  sqlcursor query 'SELECT * FROM events' --max-rows 20  # Stop after 20 rows
  sqlcursor -o json query 'SELECT id, avatar FROM users' # Blobs print as hex")]
pub struct QueryCmd {
    /// SQL statement to run
    pub sql: String,

    /// Stop after this many rows (default: "max_rows" from .sqlcursor.json, else no limit)
    #[arg(short = 'n', long, value_parser = clap::value_parser!(u32).range(1..))]
    pub max_rows: Option<u32>,
}
