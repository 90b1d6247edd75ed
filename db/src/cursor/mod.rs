//! Forward-only typed cursor over a prepared statement.
//!
//! [`Rows`] drives a [`RawStatement`] through its result set one row at a time.
//! The statement has already fetched the first row when the cursor is built,
//! so the first [`Rows::advance`] only exposes it.
//!
//! Typed reads live in `accessors`, blob handles opened through the cursor in
//! `blob_cache`.

mod accessors;
mod blob_cache;

use tracing::{debug, trace, warn};

use crate::backend::RawStatement;
use crate::error::DbError;
use crate::types::{RowId, SqlValue};

pub use blob_cache::Blob;
use blob_cache::BlobCache;

/// Where the cursor is in its result set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorState {
    /// The statement produced no result set at all.
    NoResult,
    /// Rows are available but none has been exposed yet.
    BeforeFirst,
    /// On the given 1-based row.
    Positioned(u64),
    /// Past the last row, or stopped by the row cap.
    Exhausted,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FetchDirection {
    #[default]
    Forward,
    Reverse,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorType {
    ForwardOnly,
    ScrollInsensitive,
    ScrollSensitive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Concurrency {
    ReadOnly,
    Updatable,
}

/// Per-statement settings the cursor honors.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CursorOptions {
    /// Stop after this many rows. `None` means unlimited.
    pub max_rows: Option<u32>,
    /// Finalize the statement when the cursor closes instead of resetting it.
    pub close_on_completion: bool,
    /// Open blobs through the cursor without write access.
    pub blob_read_only: bool,
}

impl CursorOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cap the number of rows. Zero removes the cap.
    pub fn max_rows(mut self, max_rows: u32) -> Self {
        self.max_rows = (max_rows > 0).then_some(max_rows);
        self
    }

    pub fn close_on_completion(mut self, close: bool) -> Self {
        self.close_on_completion = close;
        self
    }

    pub fn blob_read_only(mut self, read_only: bool) -> Self {
        self.blob_read_only = read_only;
        self
    }
}

const TYPE_FORWARD_ONLY: &str = "TYPE_FORWARD_ONLY";
const CONCUR_READ_ONLY: &str = "CONCUR_READ_ONLY";

/// A forward-only, read-only cursor.
///
/// Column positions are 1-based. Dropping an open cursor closes it.
pub struct Rows<S: RawStatement> {
    stmt: S,
    state: CursorState,
    options: CursorOptions,
    was_null: Option<bool>,
    row_id: Option<RowId>,
    /// Last row positioned on; survives exhaustion.
    last_row: u64,
    blobs: BlobCache<S::Blob>,
}

impl<S: RawStatement> Rows<S> {
    /// Wrap a statement whose first `step` has already run.
    ///
    /// `has_row` is what that first step returned.
    pub fn new(stmt: S, has_row: bool, options: CursorOptions) -> Self {
        let state = if has_row {
            CursorState::BeforeFirst
        } else {
            CursorState::NoResult
        };
        debug!(?state, columns = stmt.column_count(), "cursor opened");
        Self {
            stmt,
            state,
            options,
            was_null: None,
            row_id: None,
            last_row: 0,
            blobs: BlobCache::new(),
        }
    }

    pub fn state(&self) -> CursorState {
        self.state
    }

    pub fn options(&self) -> &CursorOptions {
        &self.options
    }

    pub fn is_closed(&self) -> bool {
        self.state == CursorState::Closed
    }

    pub(crate) fn ensure_open(&self) -> Result<(), DbError> {
        if self.is_closed() {
            Err(DbError::CursorClosed)
        } else {
            Ok(())
        }
    }

    pub(crate) fn ensure_positioned(&self) -> Result<(), DbError> {
        self.ensure_open()?;
        match self.state {
            CursorState::Positioned(_) => Ok(()),
            _ => Err(DbError::NotPositioned),
        }
    }

    /// Translate a 1-based column position to the statement's 0-based index.
    pub(crate) fn native_index(&self, column: usize) -> Result<usize, DbError> {
        let count = self.stmt.column_count();
        if column == 0 || column > count {
            return Err(DbError::ColumnOutOfRange {
                index: column,
                count,
            });
        }
        Ok(column - 1)
    }

    /// Move to the next row. Returns `false` once no row is current.
    pub fn advance(&mut self) -> Result<bool, DbError> {
        self.ensure_open()?;
        self.was_null = None;
        self.row_id = None;

        match self.state {
            CursorState::NoResult | CursorState::Exhausted | CursorState::Closed => Ok(false),
            CursorState::BeforeFirst => {
                self.state = CursorState::Positioned(1);
                self.last_row = 1;
                Ok(true)
            }
            CursorState::Positioned(row) => {
                if let Some(max_rows) = self.options.max_rows.filter(|&max| row >= u64::from(max)) {
                    debug!(max_rows, "row cap reached");
                    self.finish();
                    return Ok(false);
                }
                match self.stmt.step() {
                    Ok(true) => {
                        trace!(row = row + 1, "stepped");
                        self.state = CursorState::Positioned(row + 1);
                        self.last_row = row + 1;
                        Ok(true)
                    }
                    Ok(false) => {
                        debug!(rows = row, "result set exhausted");
                        self.finish();
                        Ok(false)
                    }
                    Err(e) => {
                        self.finish();
                        Err(DbError::native("stepping", format!("after row {}", row), e))
                    }
                }
            }
        }
    }

    /// Rewind the statement and mark the cursor exhausted.
    fn finish(&mut self) {
        self.state = CursorState::Exhausted;
        if let Err(e) = self.stmt.reset() {
            warn!(error = %e, "failed to reset statement");
        }
    }

    /// Release the statement and every blob opened through this cursor.
    ///
    /// The statement is released when `close_on_completion` is set and reset
    /// otherwise. All blobs are closed even if that fails; the first failure
    /// is returned and the rest are logged. Closing twice is a no-op.
    pub fn close(&mut self) -> Result<(), DbError> {
        if self.is_closed() {
            return Ok(());
        }
        self.state = CursorState::Closed;
        self.was_null = None;
        self.row_id = None;

        let mut result = Ok(());
        if !self.stmt.is_closed() {
            let released = if self.options.close_on_completion {
                self.stmt
                    .close()
                    .map_err(|e| DbError::native("closing statement", "cursor close", e))
            } else {
                self.stmt
                    .reset()
                    .map_err(|e| DbError::native("resetting statement", "cursor close", e))
            };
            result = released;
        }

        if let Err(e) = self.blobs.close_all() {
            if result.is_ok() {
                result = Err(e);
            } else {
                warn!(error = %e, "failed to close blob while closing cursor");
            }
        }
        debug!(ok = result.is_ok(), "cursor closed");
        result
    }

    /// 1-based number of the current row.
    ///
    /// 0 before the first row. Once the rows run out it keeps reporting the
    /// last row that was current.
    pub fn get_row(&self) -> Result<u64, DbError> {
        self.ensure_open()?;
        Ok(match self.state {
            CursorState::Positioned(row) => row,
            CursorState::Exhausted => self.last_row,
            _ => 0,
        })
    }

    pub fn is_before_first(&self) -> Result<bool, DbError> {
        self.ensure_open()?;
        Ok(matches!(
            self.state,
            CursorState::NoResult | CursorState::BeforeFirst
        ))
    }

    pub fn is_first(&self) -> Result<bool, DbError> {
        self.ensure_open()?;
        Ok(self.state == CursorState::Positioned(1))
    }

    pub fn is_after_last(&self) -> Result<bool, DbError> {
        self.ensure_open()?;
        Ok(self.state == CursorState::Exhausted)
    }

    /// Whether the last value read was NULL.
    pub fn was_null(&self) -> Result<bool, DbError> {
        self.ensure_open()?;
        self.was_null.ok_or(DbError::NoColumnRead)
    }

    /// Row id read from the current row, if any.
    pub fn current_row_id(&self) -> Option<RowId> {
        self.row_id
    }

    pub fn column_count(&self) -> Result<usize, DbError> {
        self.ensure_open()?;
        Ok(self.stmt.column_count())
    }

    pub fn column_name(&self, column: usize) -> Result<&str, DbError> {
        self.ensure_open()?;
        let index = self.native_index(column)?;
        Ok(self.stmt.column_name(index).unwrap_or_default())
    }

    pub fn column_names(&self) -> Result<Vec<String>, DbError> {
        self.ensure_open()?;
        Ok((0..self.stmt.column_count())
            .map(|i| self.stmt.column_name(i).unwrap_or_default().to_string())
            .collect())
    }

    /// Resolve a column label to its 1-based position.
    ///
    /// An exact match wins over a case-insensitive one; among equals the
    /// leftmost column is chosen.
    pub fn find_column(&self, label: &str) -> Result<usize, DbError> {
        self.ensure_open()?;
        let count = self.stmt.column_count();
        let names = || (0..count).map(|i| self.stmt.column_name(i).unwrap_or_default());
        names()
            .position(|name| name == label)
            .or_else(|| names().position(|name| name.eq_ignore_ascii_case(label)))
            .map(|index| index + 1)
            .ok_or_else(|| DbError::NoSuchColumn {
                name: label.to_string(),
            })
    }

    pub fn fetch_direction(&self) -> Result<FetchDirection, DbError> {
        self.ensure_open()?;
        Ok(FetchDirection::Forward)
    }

    pub fn set_fetch_direction(&mut self, direction: FetchDirection) -> Result<(), DbError> {
        self.ensure_open()?;
        if direction != FetchDirection::Forward {
            return Err(DbError::Unsupported {
                operation: "set_fetch_direction",
                reason: "only forward fetching is supported",
            });
        }
        Ok(())
    }

    /// Rows fetched per step. Always 1.
    pub fn fetch_size(&self) -> Result<u32, DbError> {
        self.ensure_open()?;
        Ok(1)
    }

    /// Accepts 0 (no hint) and 1.
    pub fn set_fetch_size(&mut self, rows: u32) -> Result<(), DbError> {
        self.ensure_open()?;
        if rows > 1 {
            return Err(DbError::Unsupported {
                operation: "set_fetch_size",
                reason: "rows are fetched one at a time",
            });
        }
        Ok(())
    }

    pub fn cursor_type(&self) -> Result<CursorType, DbError> {
        self.ensure_open()?;
        Ok(CursorType::ForwardOnly)
    }

    pub fn concurrency(&self) -> Result<Concurrency, DbError> {
        self.ensure_open()?;
        Ok(Concurrency::ReadOnly)
    }

    pub fn row_updated(&self) -> Result<bool, DbError> {
        self.ensure_open()?;
        Ok(false)
    }

    pub fn row_inserted(&self) -> Result<bool, DbError> {
        self.ensure_open()?;
        Ok(false)
    }

    pub fn row_deleted(&self) -> Result<bool, DbError> {
        self.ensure_open()?;
        Ok(false)
    }

    fn forward_only(&self, operation: &'static str) -> DbError {
        match self.ensure_open() {
            Err(e) => e,
            Ok(()) => DbError::Unsupported {
                operation,
                reason: TYPE_FORWARD_ONLY,
            },
        }
    }

    fn read_only(&self, operation: &'static str) -> DbError {
        match self.ensure_open() {
            Err(e) => e,
            Ok(()) => DbError::Unsupported {
                operation,
                reason: CONCUR_READ_ONLY,
            },
        }
    }

    pub fn before_first(&mut self) -> Result<(), DbError> {
        Err(self.forward_only("before_first"))
    }

    pub fn after_last(&mut self) -> Result<(), DbError> {
        Err(self.forward_only("after_last"))
    }

    pub fn first(&mut self) -> Result<bool, DbError> {
        Err(self.forward_only("first"))
    }

    pub fn last(&mut self) -> Result<bool, DbError> {
        Err(self.forward_only("last"))
    }

    pub fn absolute(&mut self, _row: i64) -> Result<bool, DbError> {
        Err(self.forward_only("absolute"))
    }

    pub fn relative(&mut self, _rows: i64) -> Result<bool, DbError> {
        Err(self.forward_only("relative"))
    }

    pub fn previous(&mut self) -> Result<bool, DbError> {
        Err(self.forward_only("previous"))
    }

    pub fn update_value(&mut self, _column: usize, _value: SqlValue) -> Result<(), DbError> {
        Err(self.read_only("update_value"))
    }

    pub fn update_null(&mut self, _column: usize) -> Result<(), DbError> {
        Err(self.read_only("update_null"))
    }

    pub fn insert_row(&mut self) -> Result<(), DbError> {
        Err(self.read_only("insert_row"))
    }

    pub fn update_row(&mut self) -> Result<(), DbError> {
        Err(self.read_only("update_row"))
    }

    pub fn delete_row(&mut self) -> Result<(), DbError> {
        Err(self.read_only("delete_row"))
    }

    pub fn refresh_row(&mut self) -> Result<(), DbError> {
        Err(self.read_only("refresh_row"))
    }

    pub fn cancel_row_updates(&mut self) -> Result<(), DbError> {
        Err(self.read_only("cancel_row_updates"))
    }

    pub fn move_to_insert_row(&mut self) -> Result<(), DbError> {
        Err(self.read_only("move_to_insert_row"))
    }

    pub fn move_to_current_row(&mut self) -> Result<(), DbError> {
        Err(self.read_only("move_to_current_row"))
    }
}

impl<S: RawStatement> Drop for Rows<S> {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!(error = %e, "failed to close cursor on drop");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::test_utils::ScriptedStatement;
    use rstest::{fixture, rstest};

    fn three_rows() -> ScriptedStatement {
        ScriptedStatement::new(["id", "name"])
            .row(vec![SqlValue::Integer(1), SqlValue::from("a")])
            .row(vec![SqlValue::Integer(2), SqlValue::from("b")])
            .row(vec![SqlValue::Integer(3), SqlValue::from("c")])
    }

    #[fixture]
    fn rows() -> Rows<ScriptedStatement> {
        three_rows().query(CursorOptions::new()).unwrap()
    }

    #[test]
    fn test_first_advance_does_not_step() {
        let stmt = three_rows();
        let log = stmt.log();
        let mut rows = stmt.query(CursorOptions::new()).unwrap();

        assert_eq!(rows.state(), CursorState::BeforeFirst);
        assert!(rows.advance().unwrap());
        assert_eq!(log.borrow().steps, 0);
        assert_eq!(rows.get_row().unwrap(), 1);

        assert!(rows.advance().unwrap());
        assert_eq!(log.borrow().steps, 1);
    }

    #[rstest]
    fn test_row_numbers_increment(mut rows: Rows<ScriptedStatement>) {
        let mut seen = Vec::new();
        while rows.advance().unwrap() {
            seen.push(rows.get_row().unwrap());
        }
        assert_eq!(seen, vec![1, 2, 3]);
        assert_eq!(rows.get_row().unwrap(), 3);
        assert_eq!(rows.state(), CursorState::Exhausted);
        assert!(rows.is_after_last().unwrap());
    }

    #[test]
    fn test_exhaustion_resets_statement() {
        let stmt = three_rows();
        let log = stmt.log();
        let mut rows = stmt.query(CursorOptions::new()).unwrap();
        while rows.advance().unwrap() {}
        assert_eq!(log.borrow().resets, 1);

        assert!(!rows.advance().unwrap());
        assert_eq!(log.borrow().resets, 1);
    }

    #[test]
    fn test_no_result_never_advances() {
        let stmt = ScriptedStatement::new(["id"]);
        let log = stmt.log();
        let mut rows = stmt.query(CursorOptions::new()).unwrap();
        assert_eq!(rows.state(), CursorState::NoResult);
        assert!(rows.is_before_first().unwrap());
        assert!(!rows.advance().unwrap());
        assert!(!rows.advance().unwrap());
        assert_eq!(rows.get_row().unwrap(), 0);
        assert_eq!(log.borrow().steps, 0);
    }

    #[rstest]
    #[case(1, 1)]
    #[case(2, 2)]
    #[case(3, 3)]
    #[case(10, 3)]
    fn test_max_rows_cap(#[case] max_rows: u32, #[case] expected: u64) {
        let stmt = three_rows();
        let log = stmt.log();
        let mut rows = stmt
            .query(CursorOptions::new().max_rows(max_rows))
            .unwrap();
        let mut count = 0;
        while rows.advance().unwrap() {
            count += 1;
            assert!(rows.get_row().unwrap() <= u64::from(max_rows));
        }
        assert_eq!(count, expected);
        assert_eq!(rows.get_row().unwrap(), expected);
        assert_eq!(log.borrow().resets, 1);
    }

    #[test]
    fn test_zero_max_rows_is_unlimited() {
        assert_eq!(CursorOptions::new().max_rows(0).max_rows, None);
    }

    #[test]
    fn test_step_failure_resets_and_exhausts() {
        let stmt = three_rows().fail_step_at(1);
        let log = stmt.log();
        let mut rows = stmt.query(CursorOptions::new()).unwrap();
        assert!(rows.advance().unwrap());

        let err = rows.advance().unwrap_err();
        assert_eq!(err.code(), ErrorCode::Error);
        assert_eq!(rows.state(), CursorState::Exhausted);
        assert_eq!(log.borrow().resets, 1);
        assert!(!rows.advance().unwrap());
    }

    #[test]
    fn test_close_resets_by_default() {
        let stmt = three_rows();
        let log = stmt.log();
        let mut rows = stmt.query(CursorOptions::new()).unwrap();
        rows.advance().unwrap();
        rows.close().unwrap();

        assert!(rows.is_closed());
        assert_eq!(log.borrow().resets, 1);
        assert_eq!(log.borrow().closes, 0);
    }

    #[test]
    fn test_close_on_completion_finalizes() {
        let stmt = three_rows();
        let log = stmt.log();
        let mut rows = stmt
            .query(CursorOptions::new().close_on_completion(true))
            .unwrap();
        rows.close().unwrap();
        assert_eq!(log.borrow().closes, 1);
        assert_eq!(log.borrow().resets, 0);
    }

    #[test]
    fn test_close_twice_is_noop() {
        let stmt = three_rows();
        let log = stmt.log();
        let mut rows = stmt.query(CursorOptions::new()).unwrap();
        rows.close().unwrap();
        rows.close().unwrap();
        assert_eq!(log.borrow().resets, 1);
    }

    #[test]
    fn test_drop_closes_cursor() {
        let stmt = three_rows();
        let log = stmt.log();
        {
            let mut rows = stmt.query(CursorOptions::new()).unwrap();
            rows.advance().unwrap();
        }
        assert_eq!(log.borrow().resets, 1);
    }

    #[test]
    fn test_borrowed_statement_is_reusable() {
        let mut stmt = three_rows();
        for _ in 0..2 {
            let has_row = stmt.start().unwrap();
            let mut rows = Rows::new(&mut stmt, has_row, CursorOptions::new());
            let mut count = 0;
            while rows.advance().unwrap() {
                count += 1;
            }
            assert_eq!(count, 3);
        }
        assert!(!stmt.is_closed());
    }

    #[rstest]
    fn test_operations_after_close_fail(mut rows: Rows<ScriptedStatement>) {
        rows.close().unwrap();
        assert!(matches!(rows.advance(), Err(DbError::CursorClosed)));
        assert!(matches!(rows.get_row(), Err(DbError::CursorClosed)));
        assert!(matches!(rows.was_null(), Err(DbError::CursorClosed)));
        assert!(matches!(rows.find_column("id"), Err(DbError::CursorClosed)));
        assert!(matches!(rows.fetch_size(), Err(DbError::CursorClosed)));
        assert!(matches!(rows.previous(), Err(DbError::CursorClosed)));
        assert!(matches!(rows.insert_row(), Err(DbError::CursorClosed)));
        assert!(rows.is_closed());
    }

    #[rstest]
    fn test_was_null_requires_read(mut rows: Rows<ScriptedStatement>) {
        rows.advance().unwrap();
        assert!(matches!(rows.was_null(), Err(DbError::NoColumnRead)));
        rows.get_long(1).unwrap();
        assert!(!rows.was_null().unwrap());

        rows.advance().unwrap();
        assert!(matches!(rows.was_null(), Err(DbError::NoColumnRead)));
    }

    #[rstest]
    fn test_position_predicates(mut rows: Rows<ScriptedStatement>) {
        assert!(rows.is_before_first().unwrap());
        assert!(!rows.is_first().unwrap());
        rows.advance().unwrap();
        assert!(!rows.is_before_first().unwrap());
        assert!(rows.is_first().unwrap());
        rows.advance().unwrap();
        assert!(!rows.is_first().unwrap());
    }

    #[test]
    fn test_find_column_prefers_exact_match() {
        let mut rows = ScriptedStatement::new(["ID", "id", "Name", "name"])
            .query(CursorOptions::new())
            .unwrap();
        assert_eq!(rows.find_column("id").unwrap(), 2);
        assert_eq!(rows.find_column("NAME").unwrap(), 3);
        assert_eq!(rows.find_column("name").unwrap(), 4);
        let err = rows.find_column("missing").unwrap_err();
        assert_eq!(err.to_string(), "no such column: 'missing'");
        rows.close().unwrap();
    }

    #[rstest]
    fn test_column_metadata(rows: Rows<ScriptedStatement>) {
        assert_eq!(rows.column_count().unwrap(), 2);
        assert_eq!(rows.column_name(2).unwrap(), "name");
        assert_eq!(rows.column_names().unwrap(), vec!["id", "name"]);
        assert!(matches!(
            rows.column_name(3),
            Err(DbError::ColumnOutOfRange { index: 3, count: 2 })
        ));
    }

    #[rstest]
    fn test_forward_only_surface(mut rows: Rows<ScriptedStatement>) {
        assert_eq!(rows.fetch_direction().unwrap(), FetchDirection::Forward);
        rows.set_fetch_direction(FetchDirection::Forward).unwrap();
        assert!(rows.set_fetch_direction(FetchDirection::Reverse).is_err());
        assert_eq!(rows.fetch_size().unwrap(), 1);
        rows.set_fetch_size(0).unwrap();
        rows.set_fetch_size(1).unwrap();
        assert!(rows.set_fetch_size(50).is_err());
        assert_eq!(rows.cursor_type().unwrap(), CursorType::ForwardOnly);
        assert_eq!(rows.concurrency().unwrap(), Concurrency::ReadOnly);
        assert!(!rows.row_updated().unwrap());
        assert!(!rows.row_inserted().unwrap());
        assert!(!rows.row_deleted().unwrap());
    }

    #[rstest]
    fn test_scroll_and_update_are_unsupported(mut rows: Rows<ScriptedStatement>) {
        let err = rows.absolute(2).unwrap_err();
        assert!(err.to_string().contains("TYPE_FORWARD_ONLY"));
        assert!(rows.first().is_err());
        assert!(rows.last().is_err());
        assert!(rows.before_first().is_err());
        assert!(rows.after_last().is_err());
        assert!(rows.relative(1).is_err());

        let err = rows.update_value(1, SqlValue::Integer(5)).unwrap_err();
        assert!(err.to_string().contains("CONCUR_READ_ONLY"));
        assert!(rows.delete_row().is_err());
        assert!(rows.refresh_row().is_err());
    }

    #[test]
    fn test_close_failure_is_reported() {
        let stmt = three_rows().fail_close(ErrorCode::Busy);
        let mut rows = stmt
            .query(CursorOptions::new().close_on_completion(true))
            .unwrap();
        let err = rows.close().unwrap_err();
        assert_eq!(err.code(), ErrorCode::Busy);
        assert!(rows.is_closed());
    }
}
