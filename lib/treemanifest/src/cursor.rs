//! A read position inside a manifest blob.
//!
//! The cursor never copies: every slice handed out by [`ManifestCursor::split_record`] is a
//! [`Bytes`] view sharing the blob, so entries parsed from it stay valid for as long as they are
//! alive, independently of the cursor.

use bytes::Bytes;

#[derive(Clone, Debug)]
pub struct ManifestCursor {
    blob: Bytes,
    position: usize,
}

impl ManifestCursor {
    /// Create a new cursor at the start of the given blob.
    pub fn new(blob: impl Into<Bytes>) -> Self {
        Self {
            blob: blob.into(),
            position: 0,
        }
    }

    /// Returns the offset of the cursor from the start of the blob.
    #[inline]
    pub fn position(&self) -> usize {
        self.position
    }

    /// Returns the bytes that have not been consumed yet.
    #[inline]
    pub fn remaining(&self) -> &[u8] {
        &self.blob[self.position..]
    }

    /// Returns true if every byte of the blob has been consumed.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.position >= self.blob.len()
    }

    /// Returns the blob this cursor is reading.
    #[inline]
    pub fn blob(&self) -> &Bytes {
        &self.blob
    }

    /// Returns the position of the first `byte` at or after the cursor, relative to the cursor.
    #[inline]
    pub(crate) fn find(&self, byte: u8) -> Option<usize> {
        self.remaining().iter().position(|b| *b == byte)
    }

    /// Returns the byte at `offset` from the cursor, if the blob is long enough.
    #[inline]
    pub(crate) fn peek(&self, offset: usize) -> Option<u8> {
        self.remaining().get(offset).copied()
    }

    /// Split off the next `len` bytes as a shared view and move the cursor past them.
    ///
    /// # Panics
    ///
    /// If fewer than `len` bytes remain. Callers check the bounds first.
    pub(crate) fn split_record(&mut self, len: usize) -> Bytes {
        let end = self.position + len;
        assert!(end <= self.blob.len(), "Out of bound.");
        let record = self.blob.slice(self.position..end);
        self.position = end;
        record
    }
}
