//! # Outbound Ports
//!
//! Collaborators the engine depends on but does not implement:
//! persistence, keys, addresses, bloom filters, listeners, peers and the
//! transaction builder/sender.

use async_trait::async_trait;
use shared_types::{
    Block, BlockHash, BlockHeader, FullTransaction, Hash, PublicKey, ScriptType, Transaction,
    TransactionInput, TransactionOutput,
};

use crate::domain::{
    Address, AddressError, Checkpoint, MutableTransaction, SpvError, StorageError,
    UnspentCandidate,
};

/// Shorthand for storage results.
pub type StorageResult<T> = Result<T, StorageError>;

/// Record store. Each write is atomic per entity.
///
/// Methods take `&self`; implementations provide interior mutability.
pub trait Storage: Send + Sync {
    // --- blocks ---

    /// Highest stored block.
    fn last_block(&self) -> StorageResult<Option<Block>>;
    fn block_by_hash(&self, hash: &Hash) -> StorageResult<Option<Block>>;
    fn block_by_height(&self, height: u32) -> StorageResult<Option<Block>>;
    /// Blocks above `height`, ascending, at most `limit`.
    fn blocks_after_height(&self, height: u32, limit: usize) -> StorageResult<Vec<Block>>;
    fn blocks_by_hashes(&self, hashes: &[Hash]) -> StorageResult<Vec<Block>>;
    /// How many of `hashes` are stored blocks. Callers keep `hashes` within
    /// the backend's parameter limit.
    fn blocks_count(&self, hashes: &[Hash]) -> StorageResult<usize>;
    fn add_block(&self, block: &Block) -> StorageResult<()>;
    fn update_block(&self, block: &Block) -> StorageResult<()>;
    /// Delete blocks and their transactions; returns deleted transaction hashes.
    fn delete_blocks(&self, hashes: &[Hash]) -> StorageResult<Vec<Hash>>;
    /// Stale blocks, ascending by height.
    fn stale_blocks(&self) -> StorageResult<Vec<Block>>;
    /// Highest non-stale block.
    fn last_non_stale_block(&self) -> StorageResult<Option<Block>>;
    /// Non-stale blocks at or above `height`.
    fn non_stale_blocks_from(&self, height: u32) -> StorageResult<Vec<Block>>;
    fn unstale_all_blocks(&self) -> StorageResult<()>;

    // --- block hashes ---

    fn block_hashes(&self) -> StorageResult<Vec<BlockHash>>;
    /// Entry with the highest sequence.
    fn last_block_hash(&self) -> StorageResult<Option<BlockHash>>;
    /// Ordered by sequence, then height.
    fn block_hashes_sorted(&self, limit: usize) -> StorageResult<Vec<BlockHash>>;
    fn add_block_hashes(&self, hashes: &[BlockHash]) -> StorageResult<()>;
    fn delete_block_hash(&self, hash: &Hash) -> StorageResult<()>;
    fn delete_all_block_hashes(&self) -> StorageResult<()>;

    // --- transactions ---

    fn transaction(&self, hash: &Hash) -> StorageResult<Option<Transaction>>;
    fn full_transaction(&self, hash: &Hash) -> StorageResult<Option<FullTransaction>>;
    /// Fails with `StorageError::Duplicate` if the hash exists.
    fn add_transaction(&self, transaction: &FullTransaction) -> StorageResult<()>;
    fn update_transaction(&self, transaction: &Transaction) -> StorageResult<()>;
    /// Transactions with status `New`.
    fn new_transactions(&self) -> StorageResult<Vec<FullTransaction>>;
    fn previous_output(&self, input: &TransactionInput) -> StorageResult<Option<TransactionOutput>>;
    /// Wallet outputs (with a key path) across all stored transactions.
    fn wallet_outputs(&self) -> StorageResult<Vec<TransactionOutput>>;
    /// Wallet outputs no stored input spends.
    fn unspent_outputs(&self) -> StorageResult<Vec<UnspentCandidate>>;
}

/// Wallet keys.
pub trait KeyManager: Send + Sync {
    /// Match a raw public key or its HASH160.
    fn public_key_by_key_or_hash(&self, bytes: &[u8]) -> Option<PublicKey>;
    /// Match the HASH160 of a key's P2WPKH script (P2WPKH-in-P2SH).
    fn public_key_by_p2wpkh_script_hash(&self, hash: &[u8]) -> Option<PublicKey>;
    fn public_key_by_path(&self, path: &str) -> Option<PublicKey>;
    /// Derive lookahead keys until the gap limit is restored.
    fn fill_gap(&self) -> Result<(), SpvError>;
    /// True when recently used keys consumed part of the lookahead window.
    fn gap_shifts(&self) -> bool;
}

/// Hash <-> address mapping.
pub trait AddressConverter: Send + Sync {
    fn convert(&self, hash: &[u8], script_type: ScriptType) -> Result<Address, AddressError>;
    fn parse(&self, address: &str) -> Result<Address, AddressError>;
}

/// Owner of the peer-side bloom filter.
pub trait BloomFilterManager: Send + Sync {
    fn regenerate(&self);
}

/// Download progress notifications.
pub trait SyncStateListener: Send + Sync {
    fn on_sync_start(&self);
    fn on_sync_stop(&self);
    fn on_sync_finish(&self);
    fn on_initial_best_block_height_update(&self, height: u32);
    fn on_current_best_block_height_update(&self, height: u32, max_block_height: u32);
}

/// Wallet data change notifications.
pub trait BlockchainDataListener: Send + Sync {
    fn on_transactions_update(&self, inserted: &[Transaction], updated: &[Transaction], block: Option<&Block>);
    /// Display-hex hashes of deleted transactions.
    fn on_transactions_delete(&self, hashes: &[String]);
    fn on_block_insert(&self, block: &Block);
}

/// Sees every incoming transaction before relevance filtering.
pub trait TransactionWatcher: Send + Sync {
    fn on_transaction_received(&self, transaction: &FullTransaction);
}

/// Median time past of the current chain tip.
pub trait MedianTimeSource: Send + Sync {
    fn median_time_past(&self) -> Option<u32>;
}

/// Input selection and signing.
pub trait TransactionBuilder: Send + Sync {
    /// Pick inputs from `unspent` and fill in change.
    fn select_inputs(
        &self,
        transaction: &mut MutableTransaction,
        unspent: &[shared_types::UnspentOutput],
    ) -> Result<(), SpvError>;

    /// Sign and assemble the final transaction.
    fn build(&self, transaction: MutableTransaction) -> Result<FullTransaction, SpvError>;
}

/// Broadcast of pending transactions.
#[async_trait]
pub trait TransactionSender: Send + Sync {
    async fn send_pending_transactions(&self) -> Result<(), SpvError>;
}

/// Peer identifier.
pub type PeerId = u64;

/// A connected peer as seen by the sync coordinator.
pub trait SyncPeer: Send + Sync {
    fn id(&self) -> PeerId;
    /// Ready to accept a new task.
    fn is_ready(&self) -> bool;
    /// Higher is better.
    fn quality(&self) -> u32;
    fn request_headers(&self, locator: Vec<Hash>);
    fn close(&self, reason: &str);
}

/// Receives checkpoints collected during header sync.
pub trait CheckpointListener: Send + Sync {
    fn on_checkpoints(&self, checkpoints: &[Checkpoint]);
}

/// Headers delivered by a peer.
pub type HeaderBatch = Vec<BlockHeader>;
