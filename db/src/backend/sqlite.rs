//! SQLite backend implementation.
//!
//! Wraps a `rusqlite::Connection` and adapts its statements and incremental
//! blobs to [`RawStatement`] and [`RawBlob`], so that [`Rows`] and
//! [`BlobHandle`] can drive them.
//!
//! SQLite does not report which table and column a result column was read
//! from unless it is built with column metadata, so the origin of every
//! column that `get_blob` should work on is declared with
//! [`SqliteStatement::blob_source`].

use std::cell::Cell;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use fallible_streaming_iterator::FallibleStreamingIterator;
use rusqlite::blob::Blob as NativeBlob;
use rusqlite::types::ValueRef;
use rusqlite::{Connection, DatabaseName, Statement};
use tracing::{debug, trace};

use super::{RawBlob, RawStatement};
use crate::blob::BlobHandle;
use crate::cursor::{CursorOptions, Rows};
use crate::error::{DbError, ErrorCode, NativeError};
use crate::escape::quote_literal;
use crate::types::{ColumnType, RowId, SqlValue};

/// Converts a rusqlite error into the engine's result code and message.
fn native_error(err: rusqlite::Error) -> NativeError {
    let code = match &err {
        rusqlite::Error::SqliteFailure(failure, _) => ErrorCode::from_raw(failure.extended_code),
        _ => ErrorCode::Error,
    };
    NativeError::new(code, err.to_string())
}

/// A SQLite connection.
pub struct SqliteDatabase {
    conn: Connection,
    next_savepoint: Cell<u32>,
}

impl SqliteDatabase {
    /// Opens (creating if needed) the database file at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, DbError> {
        let path = path.as_ref();
        let conn = Connection::open(path).map_err(|e| DbError::OpenFailed {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        debug!(path = %path.display(), "database opened");
        Ok(Self::from_connection(conn))
    }

    /// Opens a private in-memory database.
    pub fn open_mem() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory().map_err(|e| DbError::OpenFailed {
            path: ":memory:".to_string(),
            message: e.to_string(),
        })?;
        Ok(Self::from_connection(conn))
    }

    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn,
            next_savepoint: Cell::new(0),
        }
    }

    /// Returns a reference to the inner connection.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Runs one statement that returns no rows and reports the changed row count.
    pub fn execute(&self, sql: &str) -> Result<usize, DbError> {
        self.conn
            .execute(sql, [])
            .map_err(|e| DbError::native("executing", sql, native_error(e)))
    }

    /// Runs several `;`-separated statements.
    pub fn execute_batch(&self, sql: &str) -> Result<(), DbError> {
        self.conn
            .execute_batch(sql)
            .map_err(|e| DbError::native("executing", sql, native_error(e)))
    }

    pub fn last_insert_rowid(&self) -> RowId {
        RowId(self.conn.last_insert_rowid())
    }

    pub fn prepare(&self, sql: &str) -> Result<SqliteStatement<'_>, DbError> {
        let inner = self
            .conn
            .prepare(sql)
            .map_err(|e| DbError::native("preparing", sql, native_error(e)))?;
        Ok(SqliteStatement {
            conn: &self.conn,
            inner,
            sql: sql.to_string(),
            sources: BTreeMap::new(),
        })
    }

    /// Opens a blob on `table.column` of `row_id` without going through a cursor.
    ///
    /// The handle reports column 1.
    pub fn open_blob(
        &self,
        table: &str,
        column: &str,
        row_id: RowId,
        read_only: bool,
    ) -> Result<BlobHandle<SqliteBlob<'_>>, DbError> {
        let source = BlobSource::new(table, column);
        let native = SqliteBlob::open(&self.conn, &source, row_id, read_only)
            .map_err(|e| DbError::native("opening blob", format!("{}, row {}", source, row_id), e))?;
        Ok(BlobHandle::new(native, 1, row_id))
    }

    /// Starts an anonymous savepoint named after a per-connection counter.
    pub fn set_savepoint(&self) -> Result<Savepoint, DbError> {
        let id = self.next_savepoint.get();
        self.next_savepoint.set(id.wrapping_add(1));
        let savepoint = Savepoint::Anonymous(id);
        self.savepoint_command("SAVEPOINT", &savepoint)?;
        Ok(savepoint)
    }

    pub fn set_named_savepoint(&self, name: &str) -> Result<Savepoint, DbError> {
        let savepoint = Savepoint::Named(name.to_string());
        self.savepoint_command("SAVEPOINT", &savepoint)?;
        Ok(savepoint)
    }

    /// Undoes everything since `savepoint`; the savepoint stays active.
    pub fn rollback_to(&self, savepoint: &Savepoint) -> Result<(), DbError> {
        self.savepoint_command("ROLLBACK TO SAVEPOINT", savepoint)
    }

    pub fn release(&self, savepoint: &Savepoint) -> Result<(), DbError> {
        self.savepoint_command("RELEASE SAVEPOINT", savepoint)
    }

    fn savepoint_command(&self, verb: &str, savepoint: &Savepoint) -> Result<(), DbError> {
        let sql = format!("{} {}", verb, quote_literal(&savepoint.to_string()));
        trace!(%sql, "savepoint");
        self.execute_batch(&sql)
    }
}

/// A savepoint started on a [`SqliteDatabase`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Savepoint {
    Anonymous(u32),
    Named(String),
}

impl Savepoint {
    pub fn id(&self) -> Result<u32, DbError> {
        match self {
            Self::Anonymous(id) => Ok(*id),
            Self::Named(_) => Err(DbError::Unsupported {
                operation: "savepoint id",
                reason: "named savepoint",
            }),
        }
    }

    pub fn name(&self) -> Result<&str, DbError> {
        match self {
            Self::Named(name) => Ok(name),
            Self::Anonymous(_) => Err(DbError::Unsupported {
                operation: "savepoint name",
                reason: "un-named savepoint",
            }),
        }
    }
}

/// The name the savepoint has in SQL.
impl fmt::Display for Savepoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Anonymous(id) => write!(f, "{}", id),
            Self::Named(name) => f.write_str(name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct BlobSource {
    table: String,
    column: String,
}

impl BlobSource {
    fn new(table: &str, column: &str) -> Self {
        Self {
            table: table.to_string(),
            column: column.to_string(),
        }
    }
}

impl fmt::Display for BlobSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.table, self.column)
    }
}

/// A prepared statement on a [`SqliteDatabase`].
pub struct SqliteStatement<'conn> {
    conn: &'conn Connection,
    inner: Statement<'conn>,
    sql: String,
    /// Keyed by 0-based result column.
    sources: BTreeMap<usize, BlobSource>,
}

impl<'conn> SqliteStatement<'conn> {
    pub fn column_count(&self) -> usize {
        self.inner.column_count()
    }

    /// Declares that result `column` (1-based) reads `table.name`, so blobs
    /// can be opened on it.
    pub fn blob_source(
        &mut self,
        column: usize,
        table: &str,
        name: &str,
    ) -> Result<&mut Self, DbError> {
        let count = self.column_count();
        if column == 0 || column > count {
            return Err(DbError::ColumnOutOfRange {
                index: column,
                count,
            });
        }
        self.sources.insert(column - 1, BlobSource::new(table, name));
        Ok(self)
    }

    /// Executes the statement and wraps it in a cursor.
    ///
    /// The first row is fetched here; the cursor's first `advance` lands on it
    /// without stepping again. The statement can be queried again once the
    /// cursor is dropped.
    pub fn query(
        &mut self,
        options: CursorOptions,
    ) -> Result<Rows<SqliteCursor<'_, 'conn>>, DbError> {
        let columns = self
            .inner
            .column_names()
            .into_iter()
            .map(String::from)
            .collect();
        let mut cursor = SqliteCursor {
            conn: self.conn,
            stmt: Some(&mut self.inner),
            rows: None,
            columns,
            sources: self.sources.clone(),
            closed: false,
        };
        let has_row = cursor
            .step()
            .map_err(|e| DbError::native("executing", self.sql.as_str(), e))?;
        trace!(sql = %self.sql, has_row, "statement executed");
        Ok(Rows::new(cursor, has_row, options))
    }
}

/// The native side of a cursor over a [`SqliteStatement`].
pub struct SqliteCursor<'stmt, 'conn> {
    conn: &'conn Connection,
    /// Moved into `rows` by the first step.
    stmt: Option<&'stmt mut Statement<'conn>>,
    rows: Option<rusqlite::Rows<'stmt>>,
    columns: Vec<String>,
    sources: BTreeMap<usize, BlobSource>,
    closed: bool,
}

impl SqliteCursor<'_, '_> {
    fn cell(&self, index: usize) -> Option<ValueRef<'_>> {
        let row = self.rows.as_ref().and_then(|rows| rows.get())?;
        row.get_ref(index).ok()
    }

    fn value(&self, index: usize) -> SqlValue {
        match self.cell(index) {
            Some(ValueRef::Integer(i)) => SqlValue::Integer(i),
            Some(ValueRef::Real(f)) => SqlValue::Float(f),
            Some(ValueRef::Text(t)) => SqlValue::Text(String::from_utf8_lossy(t).into_owned()),
            Some(ValueRef::Blob(b)) => SqlValue::Blob(b.to_vec()),
            Some(ValueRef::Null) | None => SqlValue::Null,
        }
    }
}

impl<'conn> RawStatement for SqliteCursor<'_, 'conn> {
    type Blob = SqliteBlob<'conn>;

    fn step(&mut self) -> Result<bool, NativeError> {
        if self.closed {
            return Err(NativeError::new(ErrorCode::Misuse, "statement finalized"));
        }
        if self.rows.is_none() {
            self.rows = self.stmt.take().map(|stmt| stmt.raw_query());
        }
        // A reset cursor has given up the statement and reports no more rows.
        let Some(rows) = self.rows.as_mut() else {
            return Ok(false);
        };
        rows.advance().map_err(native_error)?;
        Ok(rows.get().is_some())
    }

    /// Dropping the rusqlite cursor resets the statement.
    fn reset(&mut self) -> Result<(), NativeError> {
        self.rows = None;
        Ok(())
    }

    fn column_count(&self) -> usize {
        self.columns.len()
    }

    fn column_name(&self, index: usize) -> Option<&str> {
        self.columns.get(index).map(String::as_str)
    }

    fn column_type(&self, index: usize) -> ColumnType {
        match self.cell(index) {
            Some(ValueRef::Integer(_)) => ColumnType::Integer,
            Some(ValueRef::Real(_)) => ColumnType::Float,
            Some(ValueRef::Text(_)) => ColumnType::Text,
            Some(ValueRef::Blob(_)) => ColumnType::Blob,
            Some(ValueRef::Null) | None => ColumnType::Null,
        }
    }

    fn column_text(&self, index: usize) -> Option<String> {
        self.value(index).coerce_text()
    }

    fn column_long(&self, index: usize) -> i64 {
        match self.cell(index) {
            Some(ValueRef::Integer(i)) => i,
            _ => self.value(index).coerce_i64(),
        }
    }

    fn column_double(&self, index: usize) -> f64 {
        match self.cell(index) {
            Some(ValueRef::Real(f)) => f,
            _ => self.value(index).coerce_f64(),
        }
    }

    fn column_blob(&self, index: usize) -> Option<Vec<u8>> {
        self.value(index).coerce_bytes()
    }

    fn open_blob(
        &mut self,
        index: usize,
        row_id: RowId,
        read_only: bool,
    ) -> Result<SqliteBlob<'conn>, NativeError> {
        let source = self.sources.get(&index).ok_or_else(|| {
            NativeError::new(
                ErrorCode::Error,
                format!("no blob source declared for column {}", index + 1),
            )
        })?;
        SqliteBlob::open(self.conn, source, row_id, read_only)
    }

    /// Resets the statement and refuses further steps. The prepared statement
    /// itself stays alive until its [`SqliteStatement`] is dropped, since
    /// rusqlite ties finalization to that owner.
    fn close(&mut self) -> Result<(), NativeError> {
        self.rows = None;
        self.stmt = None;
        self.closed = true;
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}

/// An incremental blob on one cell.
pub struct SqliteBlob<'conn> {
    inner: NativeBlob<'conn>,
}

impl<'conn> SqliteBlob<'conn> {
    fn open(
        conn: &'conn Connection,
        source: &BlobSource,
        row_id: RowId,
        read_only: bool,
    ) -> Result<Self, NativeError> {
        let inner = conn
            .blob_open(
                DatabaseName::Main,
                &source.table,
                &source.column,
                row_id.get(),
                read_only,
            )
            .map_err(native_error)?;
        Ok(Self { inner })
    }
}

impl RawBlob for SqliteBlob<'_> {
    fn bytes(&self) -> usize {
        self.inner.len()
    }

    fn read(&mut self, buf: &mut [u8], offset: usize) -> Result<(), NativeError> {
        self.inner.read_at_exact(buf, offset).map_err(native_error)
    }

    fn write(&mut self, buf: &[u8], offset: usize) -> Result<(), NativeError> {
        self.inner.write_at(buf, offset).map_err(native_error)
    }

    fn reopen(&mut self, row_id: RowId) -> Result<(), NativeError> {
        self.inner.reopen(row_id.get()).map_err(native_error)
    }

    fn close(self) -> Result<(), NativeError> {
        self.inner.close().map_err(native_error)
    }
}
