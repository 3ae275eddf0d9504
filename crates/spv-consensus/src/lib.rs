//! # SPV Consensus
//!
//! Header-chain rules for a light client. An SPV client trusts its
//! checkpoint and the header chain built on top of it, so the rules here
//! only cover what can be checked from headers: proof of work, difficulty
//! retargeting and fork activation.
//!
//! ## Module Structure
//!
//! ```text
//! spv-consensus/
//! ├── bits.rs       # Compact target encoding, block work
//! ├── history.rs    # ChainHistory lookback, median time past
//! ├── validator.rs  # BlockValidator, ValidatorChain, ValidatorSet
//! └── rules/        # Legacy retarget, continuity, EDA, DAA, fork, PoW
//! ```

#![warn(clippy::all)]

pub mod bits;
pub mod errors;
pub mod history;
pub mod rules;
pub mod validator;

pub use bits::{decode_compact, encode_compact, MAX_TARGET_BITS};
pub use errors::ValidationError;
pub use history::{median_time_past, ChainHistory, MemoryChain, MEDIAN_TIME_SPAN};
pub use rules::{bitcoin_cash_validators, bitcoin_validators, DifficultyParams};
pub use validator::{BlockValidator, ValidatorChain, ValidatorSet};
