//! Native engine abstraction.
//!
//! The cursor and blob layers never talk to an engine directly. They drive a
//! prepared statement through [`RawStatement`] and an incremental blob through
//! [`RawBlob`]. Column indexes at this boundary are 0-based.
//!
//! The SQLite backend lives behind the `backend-sqlite` feature. Tests use the
//! scripted engine from `test_utils`.

use crate::error::NativeError;
use crate::types::{ColumnType, RowId};

#[cfg(feature = "backend-sqlite")]
pub mod sqlite;

/// A prepared statement positioned somewhere in its result set.
///
/// Column accessors read the current row and apply the engine's own
/// conversions (a float read through `column_long` is truncated, an integer
/// read through `column_text` is rendered as decimal text). They never fail;
/// reading a NULL cell yields zero or `None`.
pub trait RawStatement {
    type Blob: RawBlob;

    /// Advance to the next row. `Ok(false)` means the result set is done.
    fn step(&mut self) -> Result<bool, NativeError>;

    /// Rewind so the statement can be executed again.
    fn reset(&mut self) -> Result<(), NativeError>;

    fn column_count(&self) -> usize;

    fn column_name(&self, index: usize) -> Option<&str>;

    /// Storage class of the cell in the current row.
    fn column_type(&self, index: usize) -> ColumnType;

    fn column_text(&self, index: usize) -> Option<String>;

    /// Lower 32 bits of the integer value, like `sqlite3_column_int`.
    fn column_int(&self, index: usize) -> i32 {
        self.column_long(index) as i32
    }

    fn column_long(&self, index: usize) -> i64;

    fn column_double(&self, index: usize) -> f64;

    fn column_blob(&self, index: usize) -> Option<Vec<u8>>;

    /// Open an incremental blob on the cell the column originates from.
    fn open_blob(
        &mut self,
        index: usize,
        row_id: RowId,
        read_only: bool,
    ) -> Result<Self::Blob, NativeError>;

    /// Release the statement. Stepping afterwards is an error.
    fn close(&mut self) -> Result<(), NativeError>;

    fn is_closed(&self) -> bool;
}

/// Lets a cursor borrow a statement the caller wants to reuse afterwards.
impl<T: RawStatement + ?Sized> RawStatement for &mut T {
    type Blob = T::Blob;

    fn step(&mut self) -> Result<bool, NativeError> {
        (**self).step()
    }

    fn reset(&mut self) -> Result<(), NativeError> {
        (**self).reset()
    }

    fn column_count(&self) -> usize {
        (**self).column_count()
    }

    fn column_name(&self, index: usize) -> Option<&str> {
        (**self).column_name(index)
    }

    fn column_type(&self, index: usize) -> ColumnType {
        (**self).column_type(index)
    }

    fn column_text(&self, index: usize) -> Option<String> {
        (**self).column_text(index)
    }

    fn column_int(&self, index: usize) -> i32 {
        (**self).column_int(index)
    }

    fn column_long(&self, index: usize) -> i64 {
        (**self).column_long(index)
    }

    fn column_double(&self, index: usize) -> f64 {
        (**self).column_double(index)
    }

    fn column_blob(&self, index: usize) -> Option<Vec<u8>> {
        (**self).column_blob(index)
    }

    fn open_blob(
        &mut self,
        index: usize,
        row_id: RowId,
        read_only: bool,
    ) -> Result<Self::Blob, NativeError> {
        (**self).open_blob(index, row_id, read_only)
    }

    fn close(&mut self) -> Result<(), NativeError> {
        (**self).close()
    }

    fn is_closed(&self) -> bool {
        (**self).is_closed()
    }
}

/// An open incremental blob bound to one cell.
///
/// Reads and writes are all-or-nothing: a range that does not fit inside the
/// cell fails without transferring anything.
pub trait RawBlob {
    /// Size of the cell in bytes.
    fn bytes(&self) -> usize;

    fn read(&mut self, buf: &mut [u8], offset: usize) -> Result<(), NativeError>;

    fn write(&mut self, buf: &[u8], offset: usize) -> Result<(), NativeError>;

    /// Rebind to the same column of another row.
    fn reopen(&mut self, row_id: RowId) -> Result<(), NativeError>;

    fn close(self) -> Result<(), NativeError>;
}
