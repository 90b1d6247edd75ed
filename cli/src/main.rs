use clap::Parser;
use tracing::debug;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;
mod config;
pub mod output;
#[macro_use]
mod test_macros;
use cli::Args;
use commands::Session;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    init_logging(args.verbose);

    let config_file = config::ConfigFile::load()?;
    let database = cli::resolve_database(args.db.as_deref(), config_file.as_ref())?;
    debug!(?database, "resolved database");

    let session = Session {
        db: database.connect()?,
        max_rows: config_file.and_then(|c| c.max_rows),
    };
    let output = args.command.run(&session, args.format)?;
    println!("{}", output);
    Ok(())
}

/// Log to stderr. `RUST_LOG` wins over `--verbose`.
fn init_logging(verbose: bool) {
    let default = if verbose {
        "sqlcursor=debug,db=debug"
    } else {
        "sqlcursor=warn,db=warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();
}
