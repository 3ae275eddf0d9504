//! # Validation Errors

use thiserror::Error;

/// Reasons a header is refused by a consensus rule.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Difficulty bits differ from what the rule computed.
    #[error("Bits mismatch at height {height}: expected {expected:#010x}, got {actual:#010x}")]
    BitsMismatch {
        /// Height of the rejected block
        height: u32,
        /// Bits computed by the rule
        expected: u32,
        /// Bits carried by the header
        actual: u32,
    },

    /// A lookback block the rule needs is not in local history.
    #[error("Missing lookback block {depth} below height {height}")]
    NoPreviousBlock {
        /// Height lookback started from
        height: u32,
        /// Requested depth
        depth: u32,
    },

    /// Header at the fork height is not the expected fork block.
    #[error("Fork block hash mismatch at height {height}")]
    ForkHashMismatch {
        /// Fork activation height
        height: u32,
    },

    /// Header hash is above its own target.
    #[error("Insufficient proof of work at height {height}")]
    InsufficientWork {
        /// Height of the rejected block
        height: u32,
    },

    /// Compact bits encode a negative or overflowing target.
    #[error("Invalid compact bits: {0:#010x}")]
    InvalidBits(u32),
}
