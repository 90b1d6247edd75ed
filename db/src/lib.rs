//! Typed forward-only cursors and incremental blob I/O over SQLite.
//!
//! A [`Rows`] cursor walks the result set of a prepared statement one row at
//! a time and reads cells through typed accessors that check the storage
//! class of each cell. Blob cells can be opened for incremental I/O with
//! [`Rows::get_blob`] and streamed through [`BlobReader`] and [`BlobWriter`].

pub mod backend;
pub mod blob;
pub mod config;
pub mod cursor;
pub mod error;
pub mod escape;
pub mod types;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use backend::{RawBlob, RawStatement};
pub use blob::{copy, BlobHandle, BlobReader, BlobWriter, COPY_BUFFER_SIZE};
pub use config::DatabaseConfig;
pub use cursor::{Blob, CursorOptions, CursorState, Rows};
pub use error::{DbError, ErrorCode, NativeError, OffsetKind};
pub use types::{ColumnType, RowId, SqlValue};

#[cfg(feature = "backend-sqlite")]
pub use backend::sqlite::{Savepoint, SqliteBlob, SqliteCursor, SqliteDatabase, SqliteStatement};
