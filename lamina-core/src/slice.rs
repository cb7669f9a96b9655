//! Shared-buffer byte windows
//!
//! A [`ByteSlice`] is a `(buffer, offset, length)` triple over a reference
//! counted, interior-mutable byte buffer. Every protocol layer in a packet
//! tree views the same buffer through its own slice, so a header field
//! written through one layer is immediately visible to every other layer.
//!
//! The buffer is `Rc`-shared: a packet tree is a single-threaded structure
//! and is deliberately neither `Send` nor `Sync`.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::error::{Error, Result};

/// A logical window into a shared mutable byte buffer
#[derive(Clone)]
pub struct ByteSlice {
    buf: Rc<RefCell<Vec<u8>>>,
    offset: usize,
    len: usize,
}

impl ByteSlice {
    /// Wrap an existing buffer; the slice spans all of it.
    ///
    /// The buffer is not copied. Clones of the returned slice (and any
    /// sub-windows derived from it) alias the same bytes.
    pub fn new(data: Vec<u8>) -> Self {
        let len = data.len();
        Self {
            buf: Rc::new(RefCell::new(data)),
            offset: 0,
            len,
        }
    }

    /// Allocate a zeroed buffer of `len` bytes, spanned entirely.
    pub fn zeroed(len: usize) -> Self {
        Self::new(vec![0u8; len])
    }

    /// Offset of this window within the backing buffer
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Logical length of this window
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the window is empty
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Total length of the backing buffer
    pub fn buffer_len(&self) -> usize {
        self.buf.borrow().len()
    }

    /// Whether two slices alias the same backing buffer
    pub fn same_buffer(&self, other: &ByteSlice) -> bool {
        Rc::ptr_eq(&self.buf, &other.buf)
    }

    /// The `length` bytes starting at `offset`, copied out
    pub fn actual(&self) -> Vec<u8> {
        self.buf.borrow()[self.offset..self.offset + self.len].to_vec()
    }

    /// The window immediately after this one
    ///
    /// Spans from `offset + length` to the end of the backing buffer, or at
    /// most `cap` bytes when the caller knows the true payload size (an
    /// encapsulating header that declares its payload length).
    pub fn encapsulated(&self, cap: Option<usize>) -> Self {
        let start = self.offset + self.len;
        let rest = self.buffer_len().saturating_sub(start);
        let len = cap.map_or(rest, |c| c.min(rest));
        Self {
            buf: Rc::clone(&self.buf),
            offset: start,
            len,
        }
    }

    /// A sub-window of this one, at relative offset `at` and `len` bytes long
    pub fn window(&self, at: usize, len: usize) -> Result<Self> {
        if at + len > self.len {
            return Err(Error::InvalidSliceBounds {
                offset: self.offset + at,
                length: len,
                buffer: self.offset + self.len,
            });
        }
        Ok(Self {
            buf: Rc::clone(&self.buf),
            offset: self.offset + at,
            len,
        })
    }

    /// Assign a new logical length
    ///
    /// Shrinking is always permitted; growing is permitted only within the
    /// backing buffer.
    pub fn set_len(&mut self, len: usize) -> Result<()> {
        if self.offset + len > self.buffer_len() {
            return Err(Error::InvalidSliceBounds {
                offset: self.offset,
                length: len,
                buffer: self.buffer_len(),
            });
        }
        self.len = len;
        Ok(())
    }

    /// The byte at relative offset `i`
    pub fn byte_at(&self, i: usize) -> Result<u8> {
        if i >= self.len {
            return Err(Error::short(i + 1, self.len));
        }
        Ok(self.buf.borrow()[self.offset + i])
    }

    /// Overwrite the byte at relative offset `i`
    pub fn set_byte_at(&mut self, i: usize, value: u8) -> Result<()> {
        if i >= self.len {
            return Err(Error::short(i + 1, self.len));
        }
        self.buf.borrow_mut()[self.offset + i] = value;
        Ok(())
    }

    /// Copy `len` bytes at relative offset `at` out of the window
    pub fn read_slice(&self, at: usize, len: usize) -> Result<Vec<u8>> {
        if at + len > self.len {
            return Err(Error::short(at + len, self.len));
        }
        Ok(self.buf.borrow()[self.offset + at..self.offset + at + len].to_vec())
    }

    /// Copy `src` into the window starting at relative offset `at`
    pub fn write_slice(&mut self, at: usize, src: &[u8]) -> Result<()> {
        if at + src.len() > self.len {
            return Err(Error::short(at + src.len(), self.len));
        }
        self.buf.borrow_mut()[self.offset + at..self.offset + at + src.len()]
            .copy_from_slice(src);
        Ok(())
    }

    /// Replace the backing buffer with a fresh one spanned entirely
    ///
    /// Used by resizing setters (LLDP TLVs, 802.11 information elements)
    /// when the new value no longer fits the current buffer. Other slices
    /// still referencing the old buffer become stale and must be re-read.
    pub fn rebind(&mut self, data: Vec<u8>) {
        self.offset = 0;
        self.len = data.len();
        self.buf = Rc::new(RefCell::new(data));
    }
}

impl fmt::Debug for ByteSlice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ByteSlice {{ offset: {}, len: {}, buffer: {} }}",
            self.offset,
            self.len,
            self.buffer_len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrap_spans_buffer() {
        let slice = ByteSlice::new(vec![1, 2, 3, 4]);
        assert_eq!(slice.offset(), 0);
        assert_eq!(slice.len(), 4);
        assert_eq!(slice.actual(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_clone_shares_buffer() {
        let slice = ByteSlice::new(vec![0; 8]);
        let mut other = slice.clone();
        other.set_byte_at(3, 0xAB).unwrap();
        assert_eq!(slice.byte_at(3).unwrap(), 0xAB);
        assert!(slice.same_buffer(&other));
    }

    #[test]
    fn test_encapsulated_runs_to_buffer_end() {
        let slice = ByteSlice::new(vec![0, 1, 2, 3, 4, 5, 6, 7]);
        let mut header = slice.clone();
        header.set_len(3).unwrap();
        let rest = header.encapsulated(None);
        assert_eq!(rest.offset(), 3);
        assert_eq!(rest.actual(), vec![3, 4, 5, 6, 7]);
    }

    #[test]
    fn test_encapsulated_cap() {
        let slice = ByteSlice::new(vec![0; 10]);
        let mut header = slice.clone();
        header.set_len(4).unwrap();
        let rest = header.encapsulated(Some(2));
        assert_eq!(rest.offset(), 4);
        assert_eq!(rest.len(), 2);
    }

    #[test]
    fn test_set_len_beyond_buffer() {
        let mut slice = ByteSlice::new(vec![0; 4]);
        assert!(matches!(
            slice.set_len(5),
            Err(Error::InvalidSliceBounds { .. })
        ));
    }

    #[test]
    fn test_window_bounds() {
        let slice = ByteSlice::new(vec![0, 1, 2, 3]);
        let window = slice.window(1, 2).unwrap();
        assert_eq!(window.actual(), vec![1, 2]);
        assert!(slice.window(3, 2).is_err());
    }

    #[test]
    fn test_write_slice() {
        let mut slice = ByteSlice::new(vec![0; 6]);
        slice.write_slice(2, &[0xDE, 0xAD]).unwrap();
        assert_eq!(slice.actual(), vec![0, 0, 0xDE, 0xAD, 0, 0]);
        assert!(slice.write_slice(5, &[1, 2]).is_err());
    }

    #[test]
    fn test_rebind_detaches_buffer() {
        let slice = ByteSlice::new(vec![0; 4]);
        let mut other = slice.clone();
        other.rebind(vec![9; 8]);
        assert!(!slice.same_buffer(&other));
        assert_eq!(other.len(), 8);
        assert_eq!(slice.len(), 4);
    }
}
