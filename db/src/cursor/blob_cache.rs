//! Blob handles opened through a cursor.
//!
//! The cursor keeps at most one handle per column and reuses it for later rows
//! by reopening it. Callers get a [`Blob`] that shares the handle with the
//! cache; closing the `Blob` closes the handle and forgets it.

use std::cell::{RefCell, RefMut};
use std::collections::BTreeMap;
use std::rc::{Rc, Weak};

use tracing::warn;

use crate::backend::RawBlob;
use crate::blob::{BlobHandle, BlobReader, BlobWriter};
use crate::error::{DbError, ErrorCode};
use crate::types::RowId;

type SharedHandle<B> = Rc<RefCell<BlobHandle<B>>>;
type Entries<B> = Rc<RefCell<BTreeMap<usize, SharedHandle<B>>>>;

pub(crate) struct BlobCache<B: RawBlob> {
    entries: Entries<B>,
}

impl<B: RawBlob> BlobCache<B> {
    pub(crate) fn new() -> Self {
        Self {
            entries: Rc::new(RefCell::new(BTreeMap::new())),
        }
    }

    pub(crate) fn get(&self, column: usize) -> Option<SharedHandle<B>> {
        self.entries.borrow().get(&column).cloned()
    }

    pub(crate) fn insert(&self, column: usize, handle: BlobHandle<B>) -> SharedHandle<B> {
        let shared = Rc::new(RefCell::new(handle));
        self.entries.borrow_mut().insert(column, Rc::clone(&shared));
        shared
    }

    pub(crate) fn remove(&self, column: usize) {
        self.entries.borrow_mut().remove(&column);
    }

    /// Hand out a capability for a cached handle.
    pub(crate) fn capability(&self, column: usize, handle: SharedHandle<B>) -> Blob<B> {
        Blob {
            handle,
            cache: Rc::downgrade(&self.entries),
            column,
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    /// Close and drop every cached handle.
    ///
    /// Keeps going after a failure and returns the first one.
    pub(crate) fn close_all(&self) -> Result<(), DbError> {
        let entries = std::mem::take(&mut *self.entries.borrow_mut());
        let mut first = None;
        for (column, handle) in entries {
            let outcome = match handle.try_borrow_mut() {
                Ok(mut handle) => handle.close_checked(),
                Err(_) => Err(DbError::BlobInUse { column }),
            };
            if let Err(e) = outcome {
                if first.is_none() {
                    first = Some(e);
                } else {
                    warn!(column, error = %e, "failed to close blob");
                }
            }
        }
        first.map_or(Ok(()), Err)
    }
}

/// A blob opened through a cursor.
///
/// Stays usable after the cursor moves on; it is not reopened automatically,
/// so it keeps addressing the row it was obtained for until
/// `Rows::get_blob` is called again for the same column. Closing the cursor
/// closes it.
pub struct Blob<B: RawBlob> {
    handle: SharedHandle<B>,
    cache: Weak<RefCell<BTreeMap<usize, SharedHandle<B>>>>,
    column: usize,
}

impl<B: RawBlob> Blob<B> {
    fn handle(&self) -> Result<RefMut<'_, BlobHandle<B>>, DbError> {
        self.handle
            .try_borrow_mut()
            .map_err(|_| DbError::BlobInUse {
                column: self.column,
            })
    }

    /// 1-based column the blob was opened on.
    pub fn column(&self) -> usize {
        self.column
    }

    pub fn row_id(&self) -> Result<RowId, DbError> {
        Ok(self.handle()?.row_id())
    }

    pub fn is_closed(&self) -> bool {
        self.handle.try_borrow().is_ok_and(|h| h.is_closed())
    }

    pub fn length(&self) -> Result<usize, DbError> {
        self.handle()?.length()
    }

    pub fn read_at(&self, buf: &mut [u8]) -> Result<usize, DbError> {
        self.handle()?.read_at(buf)
    }

    pub fn write_at(&self, buf: &[u8]) -> Result<usize, DbError> {
        self.handle()?.write_at(buf)
    }

    pub fn read_offset(&self) -> Result<usize, DbError> {
        Ok(self.handle()?.read_offset())
    }

    pub fn write_offset(&self) -> Result<usize, DbError> {
        Ok(self.handle()?.write_offset())
    }

    pub fn set_read_offset(&self, offset: i64) -> Result<(), DbError> {
        self.handle()?.set_read_offset(offset)
    }

    pub fn set_write_offset(&self, offset: i64) -> Result<(), DbError> {
        self.handle()?.set_write_offset(offset)
    }

    pub fn reopen(&self, row_id: RowId) -> Result<(), DbError> {
        self.handle()?.reopen(row_id)
    }

    /// Reader over the shared handle. The blob is busy while it lives.
    pub fn reader(&self) -> Result<BlobReader<RefMut<'_, BlobHandle<B>>>, DbError> {
        Ok(BlobReader::new(self.handle()?))
    }

    /// Writer over the shared handle. The blob is busy while it lives.
    pub fn writer(&self) -> Result<BlobWriter<RefMut<'_, BlobHandle<B>>>, DbError> {
        Ok(BlobWriter::new(self.handle()?))
    }

    /// Close the handle and remove it from the cursor's cache.
    ///
    /// While a reader or writer on the same handle is alive nothing is closed,
    /// the cursor keeps the handle, and [`ErrorCode::Misuse`] is returned.
    pub fn close(self) -> ErrorCode {
        let code = match self.handle.try_borrow_mut() {
            Ok(mut handle) => handle.close(),
            Err(_) => return ErrorCode::Misuse,
        };
        if let Some(cache) = self.cache.upgrade() {
            let mut entries = cache.borrow_mut();
            if entries
                .get(&self.column)
                .is_some_and(|cached| Rc::ptr_eq(cached, &self.handle))
            {
                entries.remove(&self.column);
            }
        }
        code
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{CellStore, MemoryBlob};
    use rstest::{fixture, rstest};

    #[fixture]
    fn store() -> CellStore {
        let store = CellStore::new();
        store.put(0, 1, b"abcdef".to_vec());
        store.put(1, 1, vec![0; 3]);
        store
    }

    fn handle(store: &CellStore, column: usize) -> BlobHandle<MemoryBlob> {
        let native = MemoryBlob::open(store, column - 1, RowId(1), false).unwrap();
        BlobHandle::new(native, column, RowId(1))
    }

    #[rstest]
    fn test_close_evicts_entry(store: CellStore) {
        let cache = BlobCache::new();
        let shared = cache.insert(1, handle(&store, 1));
        let blob = cache.capability(1, shared);
        assert_eq!(cache.len(), 1);

        assert_eq!(blob.close(), ErrorCode::Ok);
        assert_eq!(cache.len(), 0);
    }

    #[rstest]
    fn test_close_all_closes_every_handle(store: CellStore) {
        let cache = BlobCache::new();
        let first = cache.capability(1, cache.insert(1, handle(&store, 1)));
        let second = cache.capability(2, cache.insert(2, handle(&store, 2)));

        cache.close_all().unwrap();
        assert_eq!(cache.len(), 0);
        assert!(first.is_closed());
        assert!(second.is_closed());
        assert!(matches!(first.length(), Err(DbError::BlobClosed)));
    }

    #[rstest]
    fn test_close_all_continues_after_failure(store: CellStore) {
        let cache = BlobCache::new();
        let failing = MemoryBlob::open(&store, 0, RowId(1), false)
            .unwrap()
            .fail_close(ErrorCode::Busy);
        let first = cache.capability(1, cache.insert(1, BlobHandle::new(failing, 1, RowId(1))));
        let second = cache.capability(2, cache.insert(2, handle(&store, 2)));

        let err = cache.close_all().unwrap_err();
        assert_eq!(err.code(), ErrorCode::Busy);
        assert!(first.is_closed());
        assert!(second.is_closed());
    }

    #[rstest]
    fn test_live_reader_marks_blob_busy(store: CellStore) {
        let cache = BlobCache::new();
        let blob = cache.capability(1, cache.insert(1, handle(&store, 1)));
        let mut reader = blob.reader().unwrap();
        assert_eq!(reader.read_byte().unwrap(), Some(b'a'));
        assert!(matches!(blob.length(), Err(DbError::BlobInUse { column: 1 })));
        drop(reader);

        assert_eq!(blob.read_offset().unwrap(), 1);
    }

    #[rstest]
    fn test_close_while_busy_keeps_entry(store: CellStore) {
        let cache = BlobCache::new();
        let shared = cache.insert(1, handle(&store, 1));
        let reading = cache.capability(1, Rc::clone(&shared));
        let closing = cache.capability(1, shared);

        let reader = reading.reader().unwrap();
        assert_eq!(closing.close(), ErrorCode::Misuse);
        assert_eq!(cache.len(), 1);
        drop(reader);

        assert!(!reading.is_closed());
        cache.close_all().unwrap();
        assert!(reading.is_closed());
    }

    #[rstest]
    fn test_capability_outlives_cache(store: CellStore) {
        let cache = BlobCache::new();
        let blob = cache.capability(1, cache.insert(1, handle(&store, 1)));
        drop(cache);

        assert_eq!(blob.length().unwrap(), 6);
        assert_eq!(blob.close(), ErrorCode::Ok);
    }
}
