//! # SPV Hodler
//!
//! Plugin that locks a payment behind a BIP68 relative timelock.
//!
//! The recipient's P2PKH address is replaced by a P2SH address over
//!
//! ```text
//! <sequence: 3 bytes LE> OP_CHECKSEQUENCEVERIFY OP_DROP
//! OP_DUP OP_HASH160 <pubkey hash> OP_EQUALVERIFY OP_CHECKSIG
//! ```
//!
//! and the interval plus the original key hash travel in the null-data
//! output as `OP_1 <interval: 2 bytes LE> <pubkey hash>`, so the receiver
//! can rebuild the redeem script.
//!
//! ## Module Structure
//!
//! ```text
//! spv-hodler/
//! ├── interval.rs      # LockTimeInterval and sequence encoding
//! ├── errors.rs        # HodlerError
//! └── plugin.rs        # HodlerPlugin (spv_sync::Plugin)
//! ```

#![warn(clippy::all)]

pub mod errors;
pub mod interval;
pub mod plugin;

pub use errors::HodlerError;
pub use interval::{LockTimeInterval, RELATIVE_LOCK_TIME_MASK, SEQUENCE_GRANULARITY_SECONDS};
pub use plugin::{HodlerPlugin, HODLER_PLUGIN_ID, PARAM_ADDRESS, PARAM_LOCK_TIME_INTERVAL};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
