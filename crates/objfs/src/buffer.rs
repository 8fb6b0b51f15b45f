//! The in-memory content buffer behind an open file.
//!
//! A [`ContentBuffer`] holds a full copy of the object. Writes follow one
//! rule wherever they land: zero-pad any gap up to the write offset, replace
//! the covered range, keep whatever lies beyond it. The resulting length is
//! `max(old_len, offset + data.len())`.
//!
//! Interior writes rebuild the buffer from head, new bytes and tail, even
//! when the write fits exactly over existing bytes.
//!
//! Growth is fallible: a length the allocator cannot satisfy is reported as
//! [`FsError::InvalidArgument`] instead of aborting.

use std::collections::TryReserveError;

use bytes::Bytes;

use crate::error::{FsError, FsResult};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ContentBuffer {
    data: Vec<u8>,
}

impl ContentBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Copy of the contents, ready to hand to a backend.
    pub fn to_bytes(&self) -> Bytes {
        Bytes::copy_from_slice(&self.data)
    }

    /// Drop all content.
    pub fn clear(&mut self) {
        self.data.clear();
    }

    /// Copy bytes starting at `offset` into `dst`; returns the count copied.
    /// Reading at or past the end copies nothing.
    pub fn read_at(&self, dst: &mut [u8], offset: usize) -> usize {
        let Some(src) = self.data.get(offset..) else {
            return 0;
        };
        let n = src.len().min(dst.len());
        dst[..n].copy_from_slice(&src[..n]);
        n
    }

    /// Zero-extend to at least `len` bytes. Never shrinks.
    pub fn pad_to(&mut self, len: usize) -> FsResult<()> {
        if len > self.data.len() {
            self.data
                .try_reserve_exact(len - self.data.len())
                .map_err(|e| too_large(len, e))?;
            self.data.resize(len, 0);
        }
        Ok(())
    }

    /// Shrink or zero-extend to exactly `len` bytes.
    pub fn resize(&mut self, len: usize) -> FsResult<()> {
        if len <= self.data.len() {
            self.data.truncate(len);
            return Ok(());
        }
        self.pad_to(len)
    }

    /// Write `src` at `offset`, padding and splicing as described above.
    /// On error the buffer may have been padded but holds none of `src`.
    pub fn splice_at(&mut self, offset: usize, src: &[u8]) -> FsResult<()> {
        let end = offset.checked_add(src.len()).ok_or_else(|| {
            FsError::InvalidArgument(format!("write of {} bytes at {offset} overflows", src.len()))
        })?;
        self.pad_to(offset)?;

        if offset == self.data.len() {
            self.data.try_reserve_exact(src.len()).map_err(|e| too_large(end, e))?;
            self.data.extend_from_slice(src);
            return Ok(());
        }

        let cap = self.data.len().max(end);
        let mut rebuilt = Vec::new();
        rebuilt.try_reserve_exact(cap).map_err(|e| too_large(cap, e))?;
        rebuilt.extend_from_slice(&self.data[..offset]);
        rebuilt.extend_from_slice(src);
        if end < self.data.len() {
            rebuilt.extend_from_slice(&self.data[end..]);
        }
        self.data = rebuilt;
        Ok(())
    }
}

fn too_large(len: usize, e: TryReserveError) -> FsError {
    FsError::InvalidArgument(format!("cannot hold {len} bytes in memory: {e}"))
}

impl From<Vec<u8>> for ContentBuffer {
    fn from(data: Vec<u8>) -> Self {
        Self { data }
    }
}

impl From<Bytes> for ContentBuffer {
    fn from(data: Bytes) -> Self {
        Self {
            data: Vec::from(data),
        }
    }
}
