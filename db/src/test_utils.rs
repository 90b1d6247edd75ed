//! Shared test utilities for cursor and blob tests.
//!
//! [`ScriptedStatement`] replays a fixed result set through the
//! [`RawStatement`] interface and records how it was driven. [`MemoryBlob`]
//! serves incremental blob I/O out of a [`CellStore`]. Both can be told to
//! fail at specific points.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use crate::backend::{RawBlob, RawStatement};
use crate::cursor::{CursorOptions, Rows};
use crate::error::{DbError, ErrorCode, NativeError};
use crate::types::{ColumnType, RowId, SqlValue};

#[cfg(all(feature = "test-utils", feature = "backend-sqlite"))]
use crate::backend::sqlite::SqliteDatabase;
#[cfg(all(feature = "test-utils", feature = "backend-sqlite"))]
use tempfile::TempDir;

static NULL: SqlValue = SqlValue::Null;

/// Counts of the native calls a statement received.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CallLog {
    pub steps: usize,
    pub resets: usize,
    pub closes: usize,
    pub blob_opens: usize,
}

/// Blob cells keyed by (0-based column, row id).
#[derive(Debug, Clone, Default)]
pub struct CellStore {
    cells: Rc<RefCell<BTreeMap<(usize, i64), Vec<u8>>>>,
}

impl CellStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, column: usize, row_id: i64, bytes: Vec<u8>) {
        self.cells.borrow_mut().insert((column, row_id), bytes);
    }

    pub fn get(&self, column: usize, row_id: i64) -> Option<Vec<u8>> {
        self.cells.borrow().get(&(column, row_id)).cloned()
    }

    fn len_of(&self, column: usize, row_id: i64) -> Option<usize> {
        self.cells.borrow().get(&(column, row_id)).map(Vec::len)
    }
}

/// Incremental blob over a [`CellStore`] cell.
#[derive(Debug)]
pub struct MemoryBlob {
    store: CellStore,
    column: usize,
    row_id: i64,
    read_only: bool,
    fail_close: Option<ErrorCode>,
}

impl MemoryBlob {
    pub fn open(
        store: &CellStore,
        column: usize,
        row_id: RowId,
        read_only: bool,
    ) -> Result<Self, NativeError> {
        if store.len_of(column, row_id.get()).is_none() {
            return Err(no_such_row(row_id));
        }
        Ok(Self {
            store: store.clone(),
            column,
            row_id: row_id.get(),
            read_only,
            fail_close: None,
        })
    }

    /// Make `close` report `code`.
    pub fn fail_close(mut self, code: ErrorCode) -> Self {
        self.fail_close = Some(code);
        self
    }

    fn check_range(&self, offset: usize, len: usize) -> Result<(), NativeError> {
        let size = self.bytes();
        if offset.checked_add(len).is_none_or(|end| end > size) {
            return Err(NativeError::new(
                ErrorCode::Error,
                format!(
                    "range {}..{} outside blob of {} bytes",
                    offset,
                    offset.saturating_add(len),
                    size
                ),
            ));
        }
        Ok(())
    }
}

fn no_such_row(row_id: RowId) -> NativeError {
    NativeError::new(ErrorCode::Error, format!("no such rowid: {}", row_id))
}

impl RawBlob for MemoryBlob {
    fn bytes(&self) -> usize {
        self.store.len_of(self.column, self.row_id).unwrap_or(0)
    }

    fn read(&mut self, buf: &mut [u8], offset: usize) -> Result<(), NativeError> {
        self.check_range(offset, buf.len())?;
        let cells = self.store.cells.borrow();
        if let Some(cell) = cells.get(&(self.column, self.row_id)) {
            buf.copy_from_slice(&cell[offset..offset + buf.len()]);
        }
        Ok(())
    }

    fn write(&mut self, buf: &[u8], offset: usize) -> Result<(), NativeError> {
        if self.read_only {
            return Err(NativeError::new(
                ErrorCode::ReadOnly,
                "attempt to write a readonly blob",
            ));
        }
        self.check_range(offset, buf.len())?;
        let mut cells = self.store.cells.borrow_mut();
        if let Some(cell) = cells.get_mut(&(self.column, self.row_id)) {
            cell[offset..offset + buf.len()].copy_from_slice(buf);
        }
        Ok(())
    }

    fn reopen(&mut self, row_id: RowId) -> Result<(), NativeError> {
        if self.store.len_of(self.column, row_id.get()).is_none() {
            return Err(no_such_row(row_id));
        }
        self.row_id = row_id.get();
        Ok(())
    }

    fn close(self) -> Result<(), NativeError> {
        match self.fail_close {
            Some(code) => Err(NativeError::new(code, "scripted close failure")),
            None => Ok(()),
        }
    }
}

/// A statement that replays canned rows.
///
/// Like a real prepared statement, it fetches the first row before a cursor
/// is built: [`start`](Self::start) does that without counting it as a step.
#[derive(Debug)]
pub struct ScriptedStatement {
    columns: Vec<String>,
    rows: Vec<Vec<SqlValue>>,
    current: Option<usize>,
    next: usize,
    closed: bool,
    log: Rc<RefCell<CallLog>>,
    store: CellStore,
    fail_step_at: Option<usize>,
    fail_reset: Option<ErrorCode>,
    fail_close: Option<ErrorCode>,
}

impl ScriptedStatement {
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
            current: None,
            next: 0,
            closed: false,
            log: Rc::new(RefCell::new(CallLog::default())),
            store: CellStore::new(),
            fail_step_at: None,
            fail_reset: None,
            fail_close: None,
        }
    }

    pub fn row(mut self, values: Vec<SqlValue>) -> Self {
        self.rows.push(values);
        self
    }

    /// Fail the step that would land on the 0-based row `row`.
    pub fn fail_step_at(mut self, row: usize) -> Self {
        self.fail_step_at = Some(row);
        self
    }

    pub fn fail_reset(mut self, code: ErrorCode) -> Self {
        self.fail_reset = Some(code);
        self
    }

    pub fn fail_close(mut self, code: ErrorCode) -> Self {
        self.fail_close = Some(code);
        self
    }

    /// Shared call counters; stays readable after the statement is moved.
    pub fn log(&self) -> Rc<RefCell<CallLog>> {
        Rc::clone(&self.log)
    }

    /// Cells that `open_blob` serves.
    pub fn store(&self) -> CellStore {
        self.store.clone()
    }

    /// Fetch the first row, as executing a prepared statement does.
    pub fn start(&mut self) -> Result<bool, DbError> {
        let has_row = self
            .fetch()
            .map_err(|e| DbError::native("executing", "scripted statement", e))?;
        Ok(has_row)
    }

    /// Execute and wrap the statement in a cursor.
    pub fn query(mut self, options: CursorOptions) -> Result<Rows<Self>, DbError> {
        let has_row = self.start()?;
        Ok(Rows::new(self, has_row, options))
    }

    fn fetch(&mut self) -> Result<bool, NativeError> {
        if self.closed {
            return Err(NativeError::new(ErrorCode::Misuse, "statement finalized"));
        }
        if self.fail_step_at == Some(self.next) {
            return Err(NativeError::new(ErrorCode::Error, "scripted step failure"));
        }
        if self.next >= self.rows.len() {
            self.current = None;
            return Ok(false);
        }
        self.current = Some(self.next);
        self.next += 1;
        Ok(true)
    }

    fn value(&self, index: usize) -> &SqlValue {
        self.current
            .and_then(|row| self.rows.get(row))
            .and_then(|row| row.get(index))
            .unwrap_or(&NULL)
    }
}

impl RawStatement for ScriptedStatement {
    type Blob = MemoryBlob;

    fn step(&mut self) -> Result<bool, NativeError> {
        self.log.borrow_mut().steps += 1;
        self.fetch()
    }

    fn reset(&mut self) -> Result<(), NativeError> {
        self.log.borrow_mut().resets += 1;
        self.current = None;
        self.next = 0;
        match self.fail_reset {
            Some(code) => Err(NativeError::new(code, "scripted reset failure")),
            None => Ok(()),
        }
    }

    fn column_count(&self) -> usize {
        self.columns.len()
    }

    fn column_name(&self, index: usize) -> Option<&str> {
        self.columns.get(index).map(String::as_str)
    }

    fn column_type(&self, index: usize) -> ColumnType {
        self.value(index).column_type()
    }

    fn column_text(&self, index: usize) -> Option<String> {
        self.value(index).coerce_text()
    }

    fn column_long(&self, index: usize) -> i64 {
        self.value(index).coerce_i64()
    }

    fn column_double(&self, index: usize) -> f64 {
        self.value(index).coerce_f64()
    }

    fn column_blob(&self, index: usize) -> Option<Vec<u8>> {
        self.value(index).coerce_bytes()
    }

    fn open_blob(
        &mut self,
        index: usize,
        row_id: RowId,
        read_only: bool,
    ) -> Result<MemoryBlob, NativeError> {
        self.log.borrow_mut().blob_opens += 1;
        MemoryBlob::open(&self.store, index, row_id, read_only)
    }

    fn close(&mut self) -> Result<(), NativeError> {
        self.log.borrow_mut().closes += 1;
        self.closed = true;
        self.current = None;
        match self.fail_close {
            Some(code) => Err(NativeError::new(code, "scripted close failure")),
            None => Ok(()),
        }
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}

/// Create an empty on-disk SQLite database in a fresh temporary directory.
///
/// Keep the returned directory alive for as long as the database is used.
#[cfg(all(feature = "test-utils", feature = "backend-sqlite"))]
pub fn temp_database() -> (TempDir, SqliteDatabase) {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let db = SqliteDatabase::open(dir.path().join("test.db")).expect("Failed to open database");
    (dir, db)
}
