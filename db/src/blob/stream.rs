//! `std::io` adapters over a [`BlobHandle`].
//!
//! Both adapters hold anything that derefs to a handle: a plain `&mut` borrow
//! or the `RefMut` a cached blob hands out. They share the handle's offsets,
//! so moving through a reader is visible on the handle afterwards.

use std::io::{self, Read, Write};
use std::ops::DerefMut;

use crate::backend::RawBlob;
use crate::error::DbError;

use super::BlobHandle;

/// Sequential reader starting at the handle's read offset.
///
/// Reads are clamped to the bytes left in the cell and return 0 at the end.
pub struct BlobReader<H> {
    handle: H,
    mark: usize,
}

impl<B, H> BlobReader<H>
where
    B: RawBlob,
    H: DerefMut<Target = BlobHandle<B>>,
{
    pub fn new(handle: H) -> Self {
        Self { handle, mark: 0 }
    }

    /// Bytes between the read offset and the end of the cell.
    pub fn available(&self) -> Result<usize, DbError> {
        let length = self.handle.length()?;
        Ok(length.saturating_sub(self.handle.read_offset()))
    }

    pub fn is_eof(&self) -> Result<bool, DbError> {
        Ok(self.handle.read_offset() >= self.handle.length()?)
    }

    /// Remember the current read offset. Only the last mark is kept.
    pub fn mark(&mut self) {
        self.mark = self.handle.read_offset();
    }

    /// Move the read offset back to the last mark (or 0 without one).
    pub fn reset(&mut self) {
        self.handle.read_offset = self.mark;
    }

    /// Advance by up to `n` bytes without reading them.
    ///
    /// Negative counts skip nothing. Returns the number of bytes skipped.
    pub fn skip(&mut self, n: i64) -> Result<u64, DbError> {
        let remaining = self.available()? as u64;
        let skipped = u64::try_from(n).unwrap_or(0).min(remaining);
        self.handle.read_offset += skipped as usize;
        Ok(skipped)
    }

    /// Next byte, or `None` at the end of the cell.
    pub fn read_byte(&mut self) -> Result<Option<u8>, DbError> {
        if self.is_eof()? {
            return Ok(None);
        }
        let mut byte = [0u8; 1];
        self.handle.read_at(&mut byte)?;
        Ok(Some(byte[0]))
    }

    /// Close the underlying handle, reporting a failed native close.
    pub fn close(mut self) -> Result<(), DbError> {
        self.handle.close_checked()
    }

    pub fn into_inner(self) -> H {
        self.handle
    }
}

impl<B, H> Read for BlobReader<H>
where
    B: RawBlob,
    H: DerefMut<Target = BlobHandle<B>>,
{
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let available = self.available().map_err(io::Error::other)?;
        let len = buf.len().min(available);
        if len == 0 {
            return Ok(0);
        }
        self.handle
            .read_at(&mut buf[..len])
            .map_err(io::Error::other)
    }
}

/// Sequential writer starting at the handle's write offset.
///
/// Writes are never clamped: writing past the end of the cell fails.
pub struct BlobWriter<H> {
    handle: H,
}

impl<B, H> BlobWriter<H>
where
    B: RawBlob,
    H: DerefMut<Target = BlobHandle<B>>,
{
    pub fn new(handle: H) -> Self {
        Self { handle }
    }

    pub fn write_byte(&mut self, byte: u8) -> Result<(), DbError> {
        self.handle.write_at(&[byte])?;
        Ok(())
    }

    /// Close the underlying handle, reporting a failed native close.
    pub fn close(mut self) -> Result<(), DbError> {
        self.handle.close_checked()
    }

    pub fn into_inner(self) -> H {
        self.handle
    }
}

impl<B, H> Write for BlobWriter<H>
where
    B: RawBlob,
    H: DerefMut<Target = BlobHandle<B>>,
{
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.handle.write_at(buf).map_err(io::Error::other)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
