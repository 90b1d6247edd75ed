mod execute;
mod output;

use std::path::PathBuf;

use clap::{Args, Subcommand};

/// Read, write or inspect a single blob cell
#[derive(Args, Debug)]
#[command(after_help = "\
Examples:
  sqlcursor blob info files body 7                  # Size of the cell
  sqlcursor blob export files body 7 --out a.png    # Copy the cell to a file
  sqlcursor blob export files body 7                # Print the cell as hex
  sqlcursor blob import files body 7 -i a.png       # Overwrite the cell from a file

Import writes into the existing cell and never resizes it; allocate the
cell first, e.g. UPDATE files SET body = zeroblob(1024) WHERE rowid = 7.")]
pub struct BlobCmd {
    #[command(subcommand)]
    pub action: BlobAction,
}

#[derive(Subcommand, Debug)]
pub enum BlobAction {
    /// Print the size of the cell
    Info(CellArgs),

    /// Copy the cell to a file, or print it as hex
    Export(ExportArgs),

    /// Copy a file into the cell
    Import(ImportArgs),
}

/// Which cell to open.
#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct CellArgs {
    /// Table holding the blob
    pub table: String,

    /// Blob column
    pub column: String,

    /// Row id of the cell
    #[arg(allow_negative_numbers = true)]
    pub rowid: i64,
}

#[derive(Args, Debug)]
pub struct ExportArgs {
    #[command(flatten)]
    pub cell: CellArgs,

    /// File to write; the cell is printed as hex when omitted
    #[arg(long)]
    pub out: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct ImportArgs {
    #[command(flatten)]
    pub cell: CellArgs,

    /// File to read
    #[arg(short, long)]
    pub input: PathBuf,

    /// Byte position in the cell to start writing at
    #[arg(long, default_value_t = 0)]
    pub offset: i64,
}
