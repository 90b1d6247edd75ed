//! Value model shared by the cursor, the accessors and the backends.

use std::fmt;

use serde::Serialize;

mod value;

pub use value::{format_real, SqlValue};

/// Runtime storage class of a single cell.
///
/// Discriminants match the codes SQLite reports from `sqlite3_column_type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
#[repr(i32)]
pub enum ColumnType {
    Integer = 1,
    Float = 2,
    Text = 3,
    Blob = 4,
    Null = 5,
}

impl ColumnType {
    /// Map a native type code; anything unknown is treated as NULL.
    pub const fn from_code(code: i32) -> Self {
        match code {
            1 => Self::Integer,
            2 => Self::Float,
            3 => Self::Text,
            4 => Self::Blob,
            _ => Self::Null,
        }
    }

    pub const fn code(self) -> i32 {
        self as i32
    }

    /// Integer or float.
    pub const fn is_numeric(self) -> bool {
        matches!(self, Self::Integer | Self::Float)
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Integer => "INTEGER",
            Self::Float => "FLOAT",
            Self::Text => "TEXT",
            Self::Blob => "BLOB",
            Self::Null => "NULL",
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Identifier of a row within its table (`rowid` in SQLite).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct RowId(pub i64);

impl RowId {
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl From<i64> for RowId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
