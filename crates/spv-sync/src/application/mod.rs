//! # Application Module
//!
//! Engine components built on the domain types and outbound ports.

pub mod block_syncer;
pub mod blockchain;
pub mod chain_history;
pub mod kit;
pub mod output_cache;
pub mod peer_sync;
pub mod sync_state_provider;
pub mod transaction_creator;
pub mod transaction_extractor;
pub mod transaction_processor;
pub mod unspent_outputs;

pub use block_syncer::{BlockSyncer, BlockSyncerParts};
pub use blockchain::Blockchain;
pub use chain_history::{StorageHistory, StorageMedianTime};
pub use kit::{SpvKit, SpvKitBuilder};
pub use output_cache::OutputCache;
pub use peer_sync::{CoordinatorState, PeerEvent, PeerEventSender, PeerSyncCoordinator};
pub use sync_state_provider::{progress, SyncStateProvider};
pub use transaction_creator::{PaymentRequest, TransactionCreator, TransactionCreatorParts};
pub use transaction_extractor::TransactionExtractor;
pub use transaction_processor::TransactionProcessor;
pub use unspent_outputs::UnspentOutputProvider;
