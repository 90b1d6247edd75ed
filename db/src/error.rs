//! Error types for cursor and blob operations.
//!
//! Every failure the core can report is a variant of [`DbError`]. Failures that
//! originate in the native engine carry a [`NativeError`] with the engine's
//! result code so callers can still branch on `SQLITE_BUSY` and friends.

use std::fmt;

use thiserror::Error;

use crate::types::ColumnType;

/// SQLite-compatible primary result codes reported by the native layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum ErrorCode {
    /// Successful result.
    Ok = 0,
    /// Generic error.
    Error = 1,
    /// Internal logic error.
    Internal = 2,
    /// Access permission denied.
    Perm = 3,
    /// Callback requested abort.
    Abort = 4,
    /// Database file is locked.
    Busy = 5,
    /// Table is locked.
    Locked = 6,
    /// Out of memory.
    NoMem = 7,
    /// Attempt to write a read-only database.
    ReadOnly = 8,
    /// Interrupted.
    Interrupt = 9,
    /// Disk I/O error.
    IoErr = 10,
    /// Database disk image is malformed.
    Corrupt = 11,
    /// Not found.
    NotFound = 12,
    /// Database or disk is full.
    Full = 13,
    /// Unable to open database file.
    CantOpen = 14,
    /// Locking protocol error.
    Protocol = 15,
    /// Database schema has changed.
    Schema = 17,
    /// String or BLOB exceeds size limit.
    TooBig = 18,
    /// Constraint violation.
    Constraint = 19,
    /// Data type mismatch.
    Mismatch = 20,
    /// Library used incorrectly.
    Misuse = 21,
    /// Authorization denied.
    Auth = 23,
    /// Parameter or offset out of range.
    Range = 25,
    /// Not a database file.
    NotADb = 26,
}

impl ErrorCode {
    /// Map a raw (possibly extended) result code to its primary code.
    ///
    /// Unknown codes collapse to [`ErrorCode::Error`].
    pub const fn from_raw(code: i32) -> Self {
        match code & 0xff {
            0 => Self::Ok,
            2 => Self::Internal,
            3 => Self::Perm,
            4 => Self::Abort,
            5 => Self::Busy,
            6 => Self::Locked,
            7 => Self::NoMem,
            8 => Self::ReadOnly,
            9 => Self::Interrupt,
            10 => Self::IoErr,
            11 => Self::Corrupt,
            12 => Self::NotFound,
            13 => Self::Full,
            14 => Self::CantOpen,
            15 => Self::Protocol,
            17 => Self::Schema,
            18 => Self::TooBig,
            19 => Self::Constraint,
            20 => Self::Mismatch,
            21 => Self::Misuse,
            23 => Self::Auth,
            25 => Self::Range,
            26 => Self::NotADb,
            _ => Self::Error,
        }
    }

    /// The numeric code as the engine reports it.
    pub const fn as_raw(self) -> i32 {
        self as i32
    }

    pub const fn is_ok(self) -> bool {
        matches!(self, Self::Ok)
    }

    /// Short description in the style of `sqlite3_errstr`.
    pub const fn description(self) -> &'static str {
        match self {
            Self::Ok => "not an error",
            Self::Error => "SQL logic error",
            Self::Internal => "internal logic error",
            Self::Perm => "access permission denied",
            Self::Abort => "query aborted",
            Self::Busy => "database is locked",
            Self::Locked => "database table is locked",
            Self::NoMem => "out of memory",
            Self::ReadOnly => "attempt to write a readonly database",
            Self::Interrupt => "interrupted",
            Self::IoErr => "disk I/O error",
            Self::Corrupt => "database disk image is malformed",
            Self::NotFound => "unknown operation",
            Self::Full => "database or disk is full",
            Self::CantOpen => "unable to open database file",
            Self::Protocol => "locking protocol",
            Self::Schema => "database schema has changed",
            Self::TooBig => "string or blob too big",
            Self::Constraint => "constraint failed",
            Self::Mismatch => "datatype mismatch",
            Self::Misuse => "bad parameter or other API misuse",
            Self::Auth => "authorization denied",
            Self::Range => "column index out of range",
            Self::NotADb => "file is not a database",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.description(), self.as_raw())
    }
}

/// A failure reported by the native engine: result code plus message.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message} [{code}]")]
pub struct NativeError {
    pub code: ErrorCode,
    pub message: String,
}

impl NativeError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Which of the two independent blob cursors an offset refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OffsetKind {
    Read,
    Write,
}

impl fmt::Display for OffsetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read => f.write_str("read"),
            Self::Write => f.write_str("write"),
        }
    }
}

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Failed to open database '{path}': {message}")]
    OpenFailed { path: String, message: String },

    #[error("cursor closed")]
    CursorClosed,

    #[error("blob already closed")]
    BlobClosed,

    #[error("blob for column {column} is already borrowed by a live stream")]
    BlobInUse { column: usize },

    #[error("cursor is not positioned on a row")]
    NotPositioned,

    #[error("no column has been read")]
    NoColumnRead,

    #[error("the row id must be read before opening a blob (column {column})")]
    RowIdNotRead { column: usize },

    #[error("type mismatch on column {column}: expected {expected}, got {actual}")]
    TypeMismatch {
        column: usize,
        expected: ColumnType,
        actual: ColumnType,
    },

    #[error("Bad value for type {target}: {value}")]
    BadValue { target: &'static str, value: String },

    #[error("no such column: '{name}'")]
    NoSuchColumn { name: String },

    #[error("column index {index} out of range (1..={count})")]
    ColumnOutOfRange { index: usize, count: usize },

    #[error("invalid {kind} offset: {offset} < 0")]
    NegativeOffset { kind: OffsetKind, offset: i64 },

    #[error("invalid {kind} offset: {offset} > {length}")]
    OffsetPastEnd {
        kind: OffsetKind,
        offset: i64,
        length: usize,
    },

    #[error("no blob in column {column} for row {row_id}: {message}")]
    NotABlob {
        column: usize,
        row_id: i64,
        message: String,
    },

    #[error("error while {operation} ({context}): {source}")]
    Native {
        operation: &'static str,
        context: String,
        #[source]
        source: NativeError,
    },

    #[error("{operation} is not supported: {reason}")]
    Unsupported {
        operation: &'static str,
        reason: &'static str,
    },
}

impl DbError {
    /// Wrap a native failure with the operation and location it happened at.
    pub fn native(operation: &'static str, context: impl Into<String>, source: NativeError) -> Self {
        Self::Native {
            operation,
            context: context.into(),
            source,
        }
    }

    /// Closest SQLite result code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Native { source, .. } => source.code,
            Self::OpenFailed { .. } => ErrorCode::CantOpen,
            Self::TypeMismatch { .. } | Self::BadValue { .. } => ErrorCode::Mismatch,
            Self::ColumnOutOfRange { .. }
            | Self::NegativeOffset { .. }
            | Self::OffsetPastEnd { .. } => ErrorCode::Range,
            Self::CursorClosed
            | Self::BlobClosed
            | Self::BlobInUse { .. }
            | Self::NotPositioned
            | Self::NoColumnRead
            | Self::RowIdNotRead { .. } => ErrorCode::Misuse,
            Self::NoSuchColumn { .. }
            | Self::NotABlob { .. }
            | Self::Unsupported { .. } => ErrorCode::Error,
        }
    }
}
