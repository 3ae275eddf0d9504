//! # Error Types
//!
//! Errors raised while decoding chain data shared across crates.

use thiserror::Error;

/// Errors that can occur while decoding headers, transactions and scripts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodingError {
    /// Input ended before the structure was complete.
    #[error("Unexpected end of data: needed {needed} more bytes at offset {offset}")]
    UnexpectedEof { offset: usize, needed: usize },

    /// Segwit marker present but the flag byte is not 0x01.
    #[error("Invalid segwit flag: {0:#04x}")]
    InvalidSegwitFlag(u8),

    /// Bytes left over after a complete structure was decoded.
    #[error("Trailing data: {0} bytes")]
    TrailingData(usize),

    /// A length prefix does not fit in memory on this platform.
    #[error("Length prefix too large: {0}")]
    LengthOverflow(u64),

    /// Hex string could not be decoded.
    #[error("Invalid hex: {0}")]
    InvalidHex(String),

    /// A fixed-size field had the wrong length.
    #[error("Invalid length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
}
