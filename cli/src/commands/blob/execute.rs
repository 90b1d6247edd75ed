use std::error::Error;
use std::fs::File;
use std::io::Write;

use db::escape::quote_identifier;
use db::{copy, Blob, CursorOptions, SqliteBlob, SqliteDatabase};
use serde::Serialize;
use tracing::debug;

use super::{BlobAction, BlobCmd, CellArgs, ExportArgs, ImportArgs};
use crate::commands::{Execute, Session};

/// Result of the blob command execution
#[derive(Debug, Default, Serialize)]
pub struct BlobResult {
    pub action: String,
    pub table: String,
    pub column: String,
    pub rowid: i64,
    /// Size of the cell in bytes
    pub length: usize,
    /// Bytes moved between the cell and a file
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transferred: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Cell contents, when exported without a file
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hex: Option<String>,
}

impl BlobResult {
    fn new(action: &str, cell: &CellArgs, length: usize) -> Self {
        Self {
            action: action.to_string(),
            table: cell.table.clone(),
            column: cell.column.clone(),
            rowid: cell.rowid,
            length,
            ..Default::default()
        }
    }
}

impl Execute for BlobCmd {
    type Output = BlobResult;

    fn execute(self, session: &Session) -> Result<Self::Output, Box<dyn Error>> {
        match self.action {
            BlobAction::Info(cell) => info(&session.db, &cell),
            BlobAction::Export(args) => export(&session.db, &args),
            BlobAction::Import(args) => import(&session.db, &args),
        }
    }
}

fn info(db: &SqliteDatabase, cell: &CellArgs) -> Result<BlobResult, Box<dyn Error>> {
    with_blob(db, cell, true, |blob| {
        Ok(BlobResult::new("info", cell, blob.length()?))
    })
}

fn export(db: &SqliteDatabase, args: &ExportArgs) -> Result<BlobResult, Box<dyn Error>> {
    with_blob(db, &args.cell, true, |blob| {
        let mut result = BlobResult::new("export", &args.cell, blob.length()?);
        let mut reader = blob.reader()?;
        match &args.out {
            Some(path) => {
                let mut file = File::create(path)?;
                result.transferred = Some(copy(&mut reader, &mut file)?);
                file.flush()?;
                result.path = Some(path.display().to_string());
            }
            None => {
                let mut buffer = Vec::with_capacity(result.length);
                result.transferred = Some(copy(&mut reader, &mut buffer)?);
                result.hex = Some(hex::encode(&buffer));
            }
        }
        Ok(result)
    })
}

fn import(db: &SqliteDatabase, args: &ImportArgs) -> Result<BlobResult, Box<dyn Error>> {
    let mut input = File::open(&args.input)
        .map_err(|e| format!("Failed to open {}: {}", args.input.display(), e))?;
    with_blob(db, &args.cell, false, |blob| {
        blob.set_write_offset(args.offset)?;
        let mut writer = blob.writer()?;
        let transferred = copy(&mut input, &mut writer)?;
        drop(writer);

        let mut result = BlobResult::new("import", &args.cell, blob.length()?);
        result.transferred = Some(transferred);
        result.offset = Some(args.offset);
        result.path = Some(args.input.display().to_string());
        Ok(result)
    })
}

/// Open the cell through a cursor over its row and hand the blob to `f`.
fn with_blob<'db, T>(
    db: &'db SqliteDatabase,
    cell: &CellArgs,
    read_only: bool,
    f: impl FnOnce(&Blob<SqliteBlob<'db>>) -> Result<T, Box<dyn Error>>,
) -> Result<T, Box<dyn Error>> {
    let sql = format!(
        "SELECT rowid, {} FROM {} WHERE rowid = {}",
        quote_identifier(&cell.column),
        quote_identifier(&cell.table),
        cell.rowid
    );
    debug!(%sql, read_only, "opening blob");

    let mut stmt = db.prepare(&sql)?;
    stmt.blob_source(2, &cell.table, &cell.column)?;
    let mut rows = stmt.query(CursorOptions::new().blob_read_only(read_only))?;
    if !rows.advance()? {
        return Err(format!("No row with rowid {} in table {}", cell.rowid, cell.table).into());
    }
    rows.get_row_id(1)?;

    let blob = rows.get_blob(2)?;
    let outcome = f(&blob);
    let code = blob.close();
    let value = outcome?;
    if !code.is_ok() {
        return Err(format!("Failed to close blob: {}", code).into());
    }
    rows.close()?;
    Ok(value)
}
