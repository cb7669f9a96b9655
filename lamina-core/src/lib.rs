//! Byte-level substrate for the lamina packet library
//!
//! This crate carries no protocol knowledge. It provides the three
//! primitives every protocol layer is built from:
//!
//! - [`ByteSlice`] - a `(buffer, offset, length)` window into a shared,
//!   mutable byte buffer. Cloning a slice shares the buffer, so a field
//!   written through one view is visible through every other view of the
//!   same packet.
//! - [`endian`] - bounds-checked big- and little-endian integer reads and
//!   writes at an offset within a `ByteSlice`.
//! - [`checksum`] - the 16-bit one's-complement Internet checksum
//!   (RFC 1071) and the IPv4/IPv6 pseudo-header builders used by the
//!   transport-layer checksums.
//!
//! Protocol layers, dissection and packet construction live in
//! `lamina-protocols`.

pub mod checksum;
pub mod endian;
pub mod error;
pub mod slice;

pub use error::{Error, Result};
pub use slice::ByteSlice;
