//! Typed column reads.
//!
//! Every read checks the cell's runtime storage class before touching the
//! value. Numeric reads reject TEXT and BLOB cells instead of letting the
//! engine turn them into 0; INTEGER and FLOAT convert into each other. NULL
//! reads as zero (numeric) or `None` and sets the was-null flag.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;

use super::Rows;
use crate::backend::RawStatement;
use crate::blob::BlobHandle;
use crate::cursor::Blob;
use crate::error::DbError;
use crate::types::{ColumnType, RowId, SqlValue};

/// Generates the by-label variant of a column accessor.
macro_rules! by_label {
    ($($(#[$meta:meta])* $name:ident => $by_index:ident -> $ret:ty;)+) => {
        $(
            $(#[$meta])*
            pub fn $name(&mut self, label: &str) -> Result<$ret, DbError> {
                let column = self.find_column(label)?;
                self.$by_index(column)
            }
        )+
    };
}

impl<S: RawStatement> Rows<S> {
    /// Validate the cursor position and column, returning the native index
    /// and the cell's storage class.
    fn cell(&self, column: usize) -> Result<(usize, ColumnType), DbError> {
        self.ensure_positioned()?;
        let index = self.native_index(column)?;
        Ok((index, self.stmt.column_type(index)))
    }

    fn numeric_cell(&mut self, column: usize, expected: ColumnType) -> Result<usize, DbError> {
        let (index, actual) = self.cell(column)?;
        if matches!(actual, ColumnType::Text | ColumnType::Blob) {
            return Err(DbError::TypeMismatch {
                column,
                expected,
                actual,
            });
        }
        self.was_null = Some(actual == ColumnType::Null);
        Ok(index)
    }

    /// Storage class of the cell in the current row.
    pub fn column_type(&self, column: usize) -> Result<ColumnType, DbError> {
        Ok(self.cell(column)?.1)
    }

    pub fn get_int(&mut self, column: usize) -> Result<i32, DbError> {
        let index = self.numeric_cell(column, ColumnType::Integer)?;
        Ok(self.stmt.column_int(index))
    }

    pub fn get_long(&mut self, column: usize) -> Result<i64, DbError> {
        let index = self.numeric_cell(column, ColumnType::Integer)?;
        Ok(self.stmt.column_long(index))
    }

    pub fn get_double(&mut self, column: usize) -> Result<f64, DbError> {
        let index = self.numeric_cell(column, ColumnType::Float)?;
        Ok(self.stmt.column_double(index))
    }

    /// Any storage class is rendered as text. NULL gives `None`.
    pub fn get_string(&mut self, column: usize) -> Result<Option<String>, DbError> {
        let (index, actual) = self.cell(column)?;
        self.was_null = Some(actual == ColumnType::Null);
        if actual == ColumnType::Null {
            return Ok(None);
        }
        Ok(self.stmt.column_text(index))
    }

    /// Any storage class is returned as raw bytes. NULL gives `None`.
    pub fn get_bytes(&mut self, column: usize) -> Result<Option<Vec<u8>>, DbError> {
        let (index, actual) = self.cell(column)?;
        self.was_null = Some(actual == ColumnType::Null);
        if actual == ColumnType::Null {
            return Ok(None);
        }
        Ok(self.stmt.column_blob(index))
    }

    pub fn get_boolean(&mut self, column: usize) -> Result<bool, DbError> {
        Ok(self.get_int(column)? != 0)
    }

    pub fn get_byte(&mut self, column: usize) -> Result<i8, DbError> {
        Ok(self.get_int(column)? as i8)
    }

    pub fn get_short(&mut self, column: usize) -> Result<i16, DbError> {
        Ok(self.get_int(column)? as i16)
    }

    pub fn get_float(&mut self, column: usize) -> Result<f32, DbError> {
        Ok(self.get_double(column)? as f32)
    }

    /// Parse the text form of the cell as an exact decimal.
    pub fn get_decimal(&mut self, column: usize) -> Result<Option<Decimal>, DbError> {
        let Some(text) = self.get_string(column)? else {
            return Ok(None);
        };
        let trimmed = text.trim();
        Decimal::from_str(trimmed)
            .or_else(|_| Decimal::from_scientific(trimmed))
            .map(Some)
            .map_err(|_| DbError::BadValue {
                target: "Decimal",
                value: text,
            })
    }

    /// Milliseconds since the Unix epoch as a UTC timestamp.
    pub fn get_timestamp(&mut self, column: usize) -> Result<Option<DateTime<Utc>>, DbError> {
        let millis = self.get_long(column)?;
        if self.was_null == Some(true) {
            return Ok(None);
        }
        DateTime::<Utc>::from_timestamp_millis(millis)
            .map(Some)
            .ok_or_else(|| DbError::BadValue {
                target: "Timestamp",
                value: millis.to_string(),
            })
    }

    pub fn get_date(&mut self, column: usize) -> Result<Option<NaiveDate>, DbError> {
        Ok(self.get_timestamp(column)?.map(|ts| ts.date_naive()))
    }

    pub fn get_time(&mut self, column: usize) -> Result<Option<NaiveTime>, DbError> {
        Ok(self.get_timestamp(column)?.map(|ts| ts.time()))
    }

    /// Read the cell as whatever the engine stored. Never fails on type.
    pub fn get_object(&mut self, column: usize) -> Result<SqlValue, DbError> {
        let (_, actual) = self.cell(column)?;
        Ok(match actual {
            ColumnType::Text => self.get_string(column)?.map_or(SqlValue::Null, SqlValue::Text),
            ColumnType::Integer => SqlValue::Integer(self.get_long(column)?),
            ColumnType::Float => SqlValue::Float(self.get_double(column)?),
            ColumnType::Blob => self.get_bytes(column)?.map_or(SqlValue::Null, SqlValue::Blob),
            ColumnType::Null => {
                self.was_null = Some(true);
                SqlValue::Null
            }
        })
    }

    /// Read the row id column and remember it for [`get_blob`](Self::get_blob).
    pub fn get_row_id(&mut self, column: usize) -> Result<RowId, DbError> {
        let row_id = RowId(self.get_long(column)?);
        self.row_id = Some(row_id);
        Ok(row_id)
    }

    /// Open the cell of `column` in the current row for incremental I/O.
    ///
    /// The row id must have been read from the current row first. A handle
    /// already open for this column is rebound to the current row instead of
    /// being opened again.
    /// If that rebinding fails the handle is closed and dropped from the
    /// cache, so the next row opens a fresh one.
    pub fn get_blob(&mut self, column: usize) -> Result<Blob<S::Blob>, DbError> {
        self.ensure_open()?;
        let index = self.native_index(column)?;
        let row_id = self.row_id.ok_or(DbError::RowIdNotRead { column })?;

        if let Some(shared) = self.blobs.get(column) {
            let reopened = {
                let mut handle = shared
                    .try_borrow_mut()
                    .map_err(|_| DbError::BlobInUse { column })?;
                if handle.is_closed() {
                    None
                } else {
                    let outcome = handle.reopen(row_id);
                    if outcome.is_err() {
                        // The engine aborts a handle that failed to reopen.
                        handle.close();
                    }
                    Some(outcome)
                }
            };
            match reopened {
                Some(Ok(())) => return Ok(self.blobs.capability(column, shared)),
                Some(Err(e)) => {
                    self.blobs.remove(column);
                    let message = match e {
                        DbError::Native { source, .. } => source.message,
                        other => other.to_string(),
                    };
                    return Err(DbError::NotABlob {
                        column,
                        row_id: row_id.get(),
                        message,
                    });
                }
                None => {}
            }
        }

        let native = self
            .stmt
            .open_blob(index, row_id, self.options.blob_read_only)
            .map_err(|e| DbError::NotABlob {
                column,
                row_id: row_id.get(),
                message: e.message,
            })?;
        let shared = self.blobs.insert(column, BlobHandle::new(native, column, row_id));
        Ok(self.blobs.capability(column, shared))
    }

    by_label! {
        get_int_by_label => get_int -> i32;
        get_long_by_label => get_long -> i64;
        get_double_by_label => get_double -> f64;
        get_string_by_label => get_string -> Option<String>;
        get_bytes_by_label => get_bytes -> Option<Vec<u8>>;
        get_boolean_by_label => get_boolean -> bool;
        get_byte_by_label => get_byte -> i8;
        get_short_by_label => get_short -> i16;
        get_float_by_label => get_float -> f32;
        get_decimal_by_label => get_decimal -> Option<Decimal>;
        get_timestamp_by_label => get_timestamp -> Option<DateTime<Utc>>;
        get_date_by_label => get_date -> Option<NaiveDate>;
        get_time_by_label => get_time -> Option<NaiveTime>;
        get_object_by_label => get_object -> SqlValue;
        get_row_id_by_label => get_row_id -> RowId;
        /// Label variant of [`get_blob`](Self::get_blob).
        get_blob_by_label => get_blob -> Blob<S::Blob>;
    }
}
