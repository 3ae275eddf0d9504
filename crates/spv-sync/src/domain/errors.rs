//! # Domain Errors
//!
//! Error types for the sync engine. Recoverable signals such as bloom
//! filter staleness are outcomes (see `value_objects.rs`), not errors.

use spv_consensus::ValidationError;
use thiserror::Error;

/// Storage backend failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    /// Record inserted twice.
    #[error("Record already exists: {0}")]
    Duplicate(String),

    /// Record expected but absent.
    #[error("Record not found: {0}")]
    NotFound(String),

    /// Backend-specific failure.
    #[error("Storage backend error: {0}")]
    Backend(String),
}

/// Plugin failures.
///
/// `NotApplicable` means the data belongs to someone else and is skipped
/// silently; `Malformed` means the plugin recognised the data but could not
/// decode it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PluginError {
    /// Data or parameters are not meant for this plugin.
    #[error("Plugin data not applicable")]
    NotApplicable,

    /// Data carries this plugin's marker but cannot be decoded.
    #[error("Malformed plugin data: {0}")]
    Malformed(String),

    /// Recipient address type cannot be wrapped by the plugin.
    #[error("Unsupported address: {0}")]
    UnsupportedAddress(String),

    /// Address conversion failed inside the plugin.
    #[error("Address error: {0}")]
    Address(#[from] AddressError),
}

/// Address encoding/decoding failure reported by the converter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid address: {0}")]
pub struct AddressError(pub String);

/// Invalid engine construction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A required collaborator was not supplied to the builder.
    #[error("Missing component: {0}")]
    MissingComponent(&'static str),

    /// A configuration value is out of range.
    #[error("Invalid config value for {field}: {reason}")]
    InvalidValue {
        /// Offending field
        field: &'static str,
        /// Why it was refused
        reason: String,
    },

    /// A hard-coded or supplied checkpoint could not be parsed.
    #[error("Invalid checkpoint: {0}")]
    InvalidCheckpoint(String),
}

/// Engine error type.
#[derive(Debug, Error)]
pub enum SpvError {
    /// Outgoing transaction hash already known.
    #[error("Transaction already exists: {0}")]
    DuplicateTransaction(String),

    /// Header does not extend the expected tip.
    #[error("Chain linkage mismatch: previous block {previous} not found or not the tip")]
    ChainLinkageMismatch {
        /// Display hex of the missing parent
        previous: String,
    },

    /// Block failed a consensus rule.
    #[error("Block rejected by validator: {0}")]
    ValidatorRejected(#[from] ValidationError),

    /// Storage failure.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Plugin failure that could not be handled locally.
    #[error("Plugin error: {0}")]
    Plugin(#[from] PluginError),

    /// Address conversion failure.
    #[error("Address error: {0}")]
    Address(#[from] AddressError),

    /// Key derivation failure in the key manager.
    #[error("Key derivation failed: {0}")]
    KeyDerivation(String),

    /// Transaction builder could not produce a transaction.
    #[error("Transaction build failed: {0}")]
    TransactionBuild(String),

    /// Broadcasting failed.
    #[error("Send failed: {0}")]
    SendFailed(String),

    /// Engine misconfigured.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}
