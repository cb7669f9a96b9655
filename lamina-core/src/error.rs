//! Error types for lamina

use thiserror::Error;

/// Result type alias for lamina operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for lamina
///
/// Parse errors are raised at layer construction; field setters validate
/// eagerly. Checksum mismatches are never errors - they are observable
/// through the `valid_checksum()` accessors. An unknown encapsulation
/// discriminator is not an error either: the payload degrades to raw bytes.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Buffer too short for a fixed-size header
    #[error("buffer too short: need {needed} bytes, {available} available")]
    ShortBuffer { needed: usize, available: usize },

    /// A slice was asked to span bytes outside its backing buffer
    #[error("slice bounds exceed buffer: offset {offset} + length {length} > buffer of {buffer}")]
    InvalidSliceBounds {
        offset: usize,
        length: usize,
        buffer: usize,
    },

    /// A declared length field contradicts the bytes that are actually there
    #[error("header invariant violated: {0}")]
    InvariantViolated(String),

    /// An address setter received bytes of the wrong length
    #[error("invalid address: expected {expected} bytes, got {actual}")]
    InvalidAddress { expected: usize, actual: usize },

    /// A value does not fit the range of its length field
    #[error("value too large: {actual} exceeds maximum of {max}")]
    ValueTooLarge { max: usize, actual: usize },

    /// A TCP option kind this library does not know about
    #[error("unknown option kind {0}")]
    UnknownOption(u8),

    /// An experimental TCP option kind that is deliberately rejected
    #[error("unsupported experimental option kind {0}")]
    UnsupportedOption(u8),

    /// Functionality that is recognised but not provided
    #[error("not implemented: {0}")]
    NotImplemented(&'static str),
}

impl Error {
    /// Create an invariant violation with a custom message
    pub fn invariant<S: Into<String>>(msg: S) -> Self {
        Error::InvariantViolated(msg.into())
    }

    /// Create a short-buffer error
    pub fn short(needed: usize, available: usize) -> Self {
        Error::ShortBuffer { needed, available }
    }
}
