//! # Domain Layer
//!
//! Engine-level types: errors, outcomes, checkpoints and transaction drafts.

pub mod entities;
pub mod errors;
pub mod value_objects;

pub use entities::{
    Checkpoint, InputToSign, MutableTransaction, NetworkCheckpoints, UnspentCandidate,
};
pub use errors::{AddressError, ConfigError, PluginError, SpvError, StorageError};
pub use value_objects::{
    Address, Balance, BatchReport, FilterStatus, HeaderBatchOutcome, SyncMode, SyncState,
};
