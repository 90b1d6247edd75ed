//! Incremental blob I/O.
//!
//! A [`BlobHandle`] wraps one native blob handle and keeps two independent
//! cursors into the cell: a read offset and a write offset. Both start at 0,
//! move forward only when a transfer succeeds and are rewound by `reopen`.
//!
//! [`BlobReader`] and [`BlobWriter`] expose a handle as `std::io::Read` and
//! `std::io::Write`, and [`copy`] drains any reader into any writer.

mod copy;
mod stream;

use std::cell::Cell;

use tracing::{debug, warn};

use crate::backend::RawBlob;
use crate::error::{DbError, ErrorCode, NativeError, OffsetKind};
use crate::types::RowId;

pub use copy::{copy, COPY_BUFFER_SIZE};
pub use stream::{BlobReader, BlobWriter};

#[derive(Debug)]
pub struct BlobHandle<B: RawBlob> {
    native: Option<B>,
    column: usize,
    row_id: RowId,
    length: Cell<Option<usize>>,
    read_offset: usize,
    write_offset: usize,
}

impl<B: RawBlob> BlobHandle<B> {
    /// Wrap a freshly opened native handle for `column` (1-based) of `row_id`.
    pub fn new(native: B, column: usize, row_id: RowId) -> Self {
        debug!(column, %row_id, "blob opened");
        Self {
            native: Some(native),
            column,
            row_id,
            length: Cell::new(None),
            read_offset: 0,
            write_offset: 0,
        }
    }

    pub fn column(&self) -> usize {
        self.column
    }

    /// Row the handle is currently bound to.
    pub fn row_id(&self) -> RowId {
        self.row_id
    }

    pub fn is_closed(&self) -> bool {
        self.native.is_none()
    }

    fn native(&self) -> Result<&B, DbError> {
        self.native.as_ref().ok_or(DbError::BlobClosed)
    }

    fn native_mut(&mut self) -> Result<&mut B, DbError> {
        self.native.as_mut().ok_or(DbError::BlobClosed)
    }

    fn context(&self) -> String {
        location(self.column, self.row_id)
    }

    /// Size of the cell in bytes, fetched once per binding.
    pub fn length(&self) -> Result<usize, DbError> {
        let native = self.native()?;
        if let Some(length) = self.length.get() {
            return Ok(length);
        }
        let length = native.bytes();
        self.length.set(Some(length));
        Ok(length)
    }

    /// Fill `buf` from the read offset and advance it by `buf.len()`.
    ///
    /// The range is not checked against `length()`; an overrun is reported by
    /// the engine and leaves the offset untouched.
    pub fn read_at(&mut self, buf: &mut [u8]) -> Result<usize, DbError> {
        let (offset, column, row_id) = (self.read_offset, self.column, self.row_id);
        self.native_mut()?
            .read(buf, offset)
            .map_err(|e| DbError::native("reading blob", location(column, row_id), e))?;
        self.read_offset += buf.len();
        Ok(buf.len())
    }

    /// Write all of `buf` at the write offset and advance it by `buf.len()`.
    pub fn write_at(&mut self, buf: &[u8]) -> Result<usize, DbError> {
        let (offset, column, row_id) = (self.write_offset, self.column, self.row_id);
        self.native_mut()?
            .write(buf, offset)
            .map_err(|e| DbError::native("writing blob", location(column, row_id), e))?;
        self.write_offset += buf.len();
        Ok(buf.len())
    }

    pub fn read_offset(&self) -> usize {
        self.read_offset
    }

    pub fn write_offset(&self) -> usize {
        self.write_offset
    }

    pub fn set_read_offset(&mut self, offset: i64) -> Result<(), DbError> {
        self.read_offset = self.checked_offset(OffsetKind::Read, offset)?;
        Ok(())
    }

    pub fn set_write_offset(&mut self, offset: i64) -> Result<(), DbError> {
        self.write_offset = self.checked_offset(OffsetKind::Write, offset)?;
        Ok(())
    }

    fn checked_offset(&self, kind: OffsetKind, offset: i64) -> Result<usize, DbError> {
        if offset < 0 {
            return Err(DbError::NegativeOffset { kind, offset });
        }
        let length = self.length()?;
        match usize::try_from(offset) {
            Ok(position) if position <= length => Ok(position),
            _ => Err(DbError::OffsetPastEnd {
                kind,
                offset,
                length,
            }),
        }
    }

    /// Rebind to the same column of another row.
    ///
    /// Both offsets go back to 0 and the cached length is dropped.
    pub fn reopen(&mut self, row_id: RowId) -> Result<(), DbError> {
        let column = self.column;
        self.native_mut()?
            .reopen(row_id)
            .map_err(|e| DbError::native("reopening blob", location(column, row_id), e))?;
        debug!(column = self.column, from = %self.row_id, to = %row_id, "blob reopened");
        self.row_id = row_id;
        self.read_offset = 0;
        self.write_offset = 0;
        self.length.set(None);
        Ok(())
    }

    /// Release the native handle and report the engine's result code.
    ///
    /// Closing twice returns [`ErrorCode::Ok`]. The native handle is released
    /// even when the engine reports a failure.
    pub fn close(&mut self) -> ErrorCode {
        match self.native.take() {
            None => ErrorCode::Ok,
            Some(native) => match native.close() {
                Ok(()) => {
                    debug!(column = self.column, row_id = %self.row_id, "blob closed");
                    ErrorCode::Ok
                }
                Err(e) => {
                    debug!(column = self.column, row_id = %self.row_id, error = %e, "blob close failed");
                    e.code
                }
            },
        }
    }

    /// Like [`close`](Self::close) but turns a failure code into an error.
    pub fn close_checked(&mut self) -> Result<(), DbError> {
        let code = self.close();
        if code.is_ok() {
            Ok(())
        } else {
            Err(DbError::native(
                "closing blob",
                self.context(),
                NativeError::new(code, code.description()),
            ))
        }
    }

    pub fn reader(&mut self) -> BlobReader<&mut Self> {
        BlobReader::new(self)
    }

    pub fn writer(&mut self) -> BlobWriter<&mut Self> {
        BlobWriter::new(self)
    }
}

fn location(column: usize, row_id: RowId) -> String {
    format!("column {}, row {}", column, row_id)
}

impl<B: RawBlob> Drop for BlobHandle<B> {
    fn drop(&mut self) {
        let code = self.close();
        if !code.is_ok() {
            warn!(column = self.column, row_id = %self.row_id, %code, "failed to close blob on drop");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{CellStore, MemoryBlob};
    use rstest::{fixture, rstest};

    #[fixture]
    fn handle() -> BlobHandle<MemoryBlob> {
        let store = CellStore::new();
        store.put(0, 1, b"hello world".to_vec());
        store.put(0, 2, vec![0; 4]);
        let native = MemoryBlob::open(&store, 0, RowId(1), false).unwrap();
        BlobHandle::new(native, 1, RowId(1))
    }

    #[rstest]
    fn test_length_is_cached(handle: BlobHandle<MemoryBlob>) {
        assert_eq!(handle.length().unwrap(), 11);
        assert_eq!(handle.length().unwrap(), 11);
    }

    #[rstest]
    fn test_read_advances_offset(mut handle: BlobHandle<MemoryBlob>) {
        let mut buf = [0u8; 5];
        assert_eq!(handle.read_at(&mut buf).unwrap(), 5);
        assert_eq!(&buf, b"hello");
        assert_eq!(handle.read_offset(), 5);
        assert_eq!(handle.write_offset(), 0);

        let mut rest = [0u8; 6];
        handle.read_at(&mut rest).unwrap();
        assert_eq!(&rest, b" world");
        assert_eq!(handle.read_offset(), 11);
    }

    #[rstest]
    fn test_zero_length_transfers_are_noops(mut handle: BlobHandle<MemoryBlob>) {
        assert_eq!(handle.read_at(&mut []).unwrap(), 0);
        assert_eq!(handle.write_at(&[]).unwrap(), 0);
        assert_eq!(handle.read_offset(), 0);
        assert_eq!(handle.write_offset(), 0);
    }

    #[rstest]
    fn test_read_past_end_surfaces_native_error(mut handle: BlobHandle<MemoryBlob>) {
        handle.set_read_offset(8).unwrap();
        let mut buf = [0u8; 4];
        let err = handle.read_at(&mut buf).unwrap_err();
        assert_eq!(err.code(), ErrorCode::Error);
        assert!(matches!(err, DbError::Native { .. }));
        assert_eq!(handle.read_offset(), 8);
    }

    #[rstest]
    fn test_write_past_end_surfaces_native_error(mut handle: BlobHandle<MemoryBlob>) {
        handle.set_write_offset(10).unwrap();
        assert!(handle.write_at(b"xy").is_err());
        assert_eq!(handle.write_offset(), 10);
    }

    #[rstest]
    #[case(-1, "invalid read offset: -1 < 0")]
    #[case(12, "invalid read offset: 12 > 11")]
    fn test_set_read_offset_rejects(
        mut handle: BlobHandle<MemoryBlob>,
        #[case] offset: i64,
        #[case] message: &str,
    ) {
        let err = handle.set_read_offset(offset).unwrap_err();
        assert_eq!(err.to_string(), message);
        assert_eq!(handle.read_offset(), 0);
    }

    #[rstest]
    fn test_set_offset_accepts_length(mut handle: BlobHandle<MemoryBlob>) {
        handle.set_read_offset(11).unwrap();
        handle.set_write_offset(0).unwrap();
        assert_eq!(handle.read_offset(), 11);
    }

    #[rstest]
    fn test_write_reopen_read_round_trip(mut handle: BlobHandle<MemoryBlob>) {
        handle.write_at(b"HELLO").unwrap();
        handle.reopen(RowId(1)).unwrap();
        assert_eq!(handle.read_offset(), 0);
        assert_eq!(handle.write_offset(), 0);

        let mut buf = [0u8; 5];
        handle.read_at(&mut buf).unwrap();
        assert_eq!(&buf, b"HELLO");
    }

    #[rstest]
    fn test_reopen_switches_row_and_length(mut handle: BlobHandle<MemoryBlob>) {
        assert_eq!(handle.length().unwrap(), 11);
        handle.set_read_offset(3).unwrap();
        handle.reopen(RowId(2)).unwrap();
        assert_eq!(handle.row_id(), RowId(2));
        assert_eq!(handle.length().unwrap(), 4);
        assert_eq!(handle.read_offset(), 0);
    }

    #[rstest]
    fn test_reopen_missing_row_fails(mut handle: BlobHandle<MemoryBlob>) {
        assert!(handle.reopen(RowId(99)).is_err());
        assert_eq!(handle.row_id(), RowId(1));
    }

    #[rstest]
    fn test_close_is_idempotent(mut handle: BlobHandle<MemoryBlob>) {
        assert_eq!(handle.close(), ErrorCode::Ok);
        assert!(handle.is_closed());
        assert_eq!(handle.close(), ErrorCode::Ok);
        assert!(handle.close_checked().is_ok());
    }

    #[rstest]
    fn test_operations_after_close_fail(mut handle: BlobHandle<MemoryBlob>) {
        handle.close();
        assert!(matches!(handle.length(), Err(DbError::BlobClosed)));
        assert!(matches!(handle.read_at(&mut [0u8; 1]), Err(DbError::BlobClosed)));
        assert!(matches!(handle.write_at(b"x"), Err(DbError::BlobClosed)));
        assert!(matches!(handle.reopen(RowId(1)), Err(DbError::BlobClosed)));
        assert!(matches!(handle.set_read_offset(0), Err(DbError::BlobClosed)));
    }

    #[test]
    fn test_close_reports_native_failure() {
        let store = CellStore::new();
        store.put(0, 1, vec![1, 2, 3]);
        let native = MemoryBlob::open(&store, 0, RowId(1), false)
            .unwrap()
            .fail_close(ErrorCode::Busy);
        let mut handle = BlobHandle::new(native, 1, RowId(1));

        let err = handle.close_checked().unwrap_err();
        assert_eq!(err.code(), ErrorCode::Busy);
        assert!(handle.is_closed());
    }
}
