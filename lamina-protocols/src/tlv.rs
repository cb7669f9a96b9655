//! Bounds-checked cursor over a variable-length header region
//!
//! TCP options, LLDP TLVs, PPPoE discovery tags, 802.11 information
//! elements and PPI field records all follow the same type-then-length-
//! then-value pattern; this cursor does the offset bookkeeping for their
//! parsers.

use lamina_core::{endian, Error, Result};
use lamina_core::ByteSlice;

/// Cursor over a sub-region of a layer's header slice
pub(crate) struct RegionCursor<'a> {
    slice: &'a ByteSlice,
    at: usize,
    end: usize,
}

impl<'a> RegionCursor<'a> {
    /// Cursor over `[start, end)` within `slice`
    pub fn new(slice: &'a ByteSlice, start: usize, end: usize) -> Result<Self> {
        if end > slice.len() || start > end {
            return Err(Error::invariant(format!(
                "variable region {}..{} exceeds header of {} bytes",
                start,
                end,
                slice.len()
            )));
        }
        Ok(Self { slice, at: start, end })
    }

    /// Current relative offset within the slice
    pub fn position(&self) -> usize {
        self.at
    }

    /// Bytes left in the region
    pub fn remaining(&self) -> usize {
        self.end - self.at
    }

    pub fn at_end(&self) -> bool {
        self.at >= self.end
    }

    /// Read one byte and advance
    pub fn u8(&mut self) -> Result<u8> {
        self.check(1)?;
        let value = self.slice.byte_at(self.at)?;
        self.at += 1;
        Ok(value)
    }

    /// Read a big-endian u16 and advance
    pub fn u16_be(&mut self) -> Result<u16> {
        self.check(2)?;
        let value = endian::read_u16_be(self.slice, self.at)?;
        self.at += 2;
        Ok(value)
    }

    /// Read a little-endian u16 and advance
    pub fn u16_le(&mut self) -> Result<u16> {
        self.check(2)?;
        let value = endian::read_u16_le(self.slice, self.at)?;
        self.at += 2;
        Ok(value)
    }

    /// Take a sub-window of `len` bytes and advance past it
    pub fn window(&mut self, len: usize) -> Result<ByteSlice> {
        self.check(len)?;
        let window = self.slice.window(self.at, len)?;
        self.at += len;
        Ok(window)
    }

    /// Copy `len` bytes out and advance past them
    pub fn take(&mut self, len: usize) -> Result<Vec<u8>> {
        self.check(len)?;
        let bytes = self.slice.read_slice(self.at, len)?;
        self.at += len;
        Ok(bytes)
    }

    /// Skip `len` bytes
    pub fn skip(&mut self, len: usize) -> Result<()> {
        self.check(len)?;
        self.at += len;
        Ok(())
    }

    fn check(&self, needed: usize) -> Result<()> {
        if self.at + needed > self.end {
            return Err(Error::invariant(format!(
                "record of {} bytes runs past the region end at {}",
                needed, self.end
            )));
        }
        Ok(())
    }
}
