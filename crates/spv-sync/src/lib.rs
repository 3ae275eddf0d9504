//! # SPV Sync
//!
//! Synchronization and transaction-settlement engine of an SPV wallet.
//!
//! Decides what to download, validates headers against consensus rules,
//! folds matched transactions into wallet state and keeps that state
//! consistent across aborted sessions, reorganizations and bloom-filter
//! staleness.
//!
//! ## Module Structure
//!
//! ```text
//! spv-sync/
//! ├── domain/          # Errors, outcomes, checkpoints, transaction drafts
//! ├── algorithms/      # Header linkage, topological transaction order
//! ├── ports/           # Outbound traits + in-process mocks
//! ├── plugins/         # Plugin trait and registry
//! ├── adapters/        # In-memory storage
//! ├── application/     # Syncer, processor, fork manager, coordinator, kit
//! ├── network.rs       # Hard-coded checkpoints and validator sets
//! └── config.rs        # SyncConfig
//! ```
//!
//! ## Filter staleness
//!
//! A received output the remote bloom filter cannot match is reported as
//! [`FilterStatus::Stale`]. The batch is kept; the caller rebuilds the
//! filter and repeats the download iteration. [`SpvKit`] does both.

#![warn(clippy::all)]

pub mod adapters;
pub mod algorithms;
pub mod application;
pub mod config;
pub mod domain;
pub mod network;
pub mod plugins;
pub mod ports;

// Re-exports
pub use adapters::InMemoryStorage;
pub use application::{
    BlockSyncer, Blockchain, CoordinatorState, PaymentRequest, PeerEvent, PeerEventSender,
    PeerSyncCoordinator, SpvKit, SpvKitBuilder, SyncStateProvider, TransactionCreator,
    TransactionProcessor, UnspentOutputProvider,
};
pub use config::SyncConfig;
pub use domain::{
    Address, AddressError, Balance, BatchReport, Checkpoint, ConfigError, FilterStatus,
    HeaderBatchOutcome, MutableTransaction, NetworkCheckpoints, PluginError, SpvError,
    StorageError, SyncMode, SyncState,
};
pub use network::Network;
pub use plugins::{Plugin, PluginContext, PluginData, PluginParams, PluginRegistry};
pub use ports::{
    AddressConverter, BlockchainDataListener, BloomFilterManager, CheckpointListener, KeyManager,
    MedianTimeSource, PeerId, Storage, SyncPeer, SyncStateListener, TransactionBuilder,
    TransactionSender, TransactionWatcher,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
