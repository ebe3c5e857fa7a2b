//! Bounds-checked random access into an archive buffer.

use byteorder::{ByteOrder, LittleEndian};

use crate::error::{Result, ZipError};

/// A read position over a borrowed byte slice.
///
/// Every read is checked against the end of the slice and fails with
/// [`ZipError::MalformedArchive`] instead of panicking, so length fields
/// taken from untrusted headers can be followed without pre-validation.
#[derive(Debug, Clone)]
pub struct ByteCursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteCursor<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Create a cursor positioned at `offset`, failing if it lies past the end.
    pub fn at(data: &'a [u8], offset: usize) -> Result<Self> {
        if offset > data.len() {
            return Err(ZipError::MalformedArchive("offset beyond end of archive"));
        }
        Ok(Self { data, pos: offset })
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Borrow the next `len` bytes and advance past them.
    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.data.len())
            .ok_or(ZipError::MalformedArchive("field extends beyond end of archive"))?;
        let bytes = &self.data[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    pub fn skip(&mut self, len: usize) -> Result<()> {
        self.read_bytes(len).map(|_| ())
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_bytes(1)?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        Ok(LittleEndian::read_u16(self.read_bytes(2)?))
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        Ok(LittleEndian::read_u32(self.read_bytes(4)?))
    }

    /// Read a little-endian `u16` at `offset` bytes past the current position
    /// without moving the cursor.
    pub fn peek_u16_at(&self, offset: usize) -> Result<u16> {
        let mut probe = self.clone();
        probe.skip(offset)?;
        probe.read_u16()
    }

    /// Check that the next bytes equal `signature`, consuming them on success.
    pub fn expect_signature(&mut self, signature: &[u8], what: &'static str) -> Result<()> {
        match self.read_bytes(signature.len()) {
            Ok(found) if found == signature => Ok(()),
            _ => Err(ZipError::MalformedArchive(what)),
        }
    }
}
