//! # Block Syncer
//!
//! Drives one download session: reconciles state left by an aborted
//! session, hands out block hashes and locators, accepts merkle blocks and
//! reports progress.
//!
//! ```text
//! prepare_for_download -> download_started -> (handle_merkle_block)*
//!     -> download_iteration_completed -> ... -> download_completed
//!                                                 \-> download_failed
//! ```

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use shared_types::{Block, BlockHash, Hash, MerkleBlock};

use super::blockchain::Blockchain;
use super::transaction_processor::TransactionProcessor;
use crate::config::SyncConfig;
use crate::domain::{FilterStatus, NetworkCheckpoints, SpvError, SyncMode};
use crate::ports::{KeyManager, Storage, SyncStateListener};

/// Collaborators of a [`BlockSyncer`].
pub struct BlockSyncerParts {
    pub storage: Arc<dyn Storage>,
    pub blockchain: Arc<Blockchain>,
    pub processor: Arc<TransactionProcessor>,
    pub keys: Arc<dyn KeyManager>,
    pub listener: Arc<dyn SyncStateListener>,
}

/// Download session driver.
pub struct BlockSyncer {
    storage: Arc<dyn Storage>,
    blockchain: Arc<Blockchain>,
    processor: Arc<TransactionProcessor>,
    keys: Arc<dyn KeyManager>,
    listener: Arc<dyn SyncStateListener>,
    checkpoint: Block,
    config: SyncConfig,
    /// Set when a batch in this iteration left the bloom filter stale.
    partial_blocks: AtomicBool,
}

impl BlockSyncer {
    /// Reports the downloaded height as the initial best height.
    pub fn new(parts: BlockSyncerParts, checkpoint: Block, config: SyncConfig) -> Result<Self, SpvError> {
        let syncer = Self {
            storage: parts.storage,
            blockchain: parts.blockchain,
            processor: parts.processor,
            keys: parts.keys,
            listener: parts.listener,
            checkpoint,
            config,
            partial_blocks: AtomicBool::new(false),
        };
        syncer
            .listener
            .on_initial_best_block_height_update(syncer.local_downloaded_best_block_height()?);
        Ok(syncer)
    }

    /// Pick the sync starting point and seed storage on first run.
    ///
    /// Full sync starts at the BIP44 checkpoint. Otherwise the last
    /// checkpoint is used, unless a stored chain ends below it.
    pub fn checkpoint_block(
        sync_mode: SyncMode,
        checkpoints: &NetworkCheckpoints,
        storage: &dyn Storage,
    ) -> Result<Block, SpvError> {
        let last_block = storage.last_block()?;

        let checkpoint = match (sync_mode, &last_block) {
            (SyncMode::Full, _) => &checkpoints.bip44,
            (_, Some(last)) if last.height < checkpoints.last.height() => &checkpoints.bip44,
            _ => &checkpoints.last,
        };

        if last_block.is_none() {
            tracing::info!(height = checkpoint.height(), "[spv-sync] seeding checkpoint block");
            storage.add_block(&checkpoint.block)?;
        }
        Ok(checkpoint.block.clone())
    }

    pub fn checkpoint(&self) -> &Block {
        &self.checkpoint
    }

    /// Height of the highest stored block.
    pub fn local_downloaded_best_block_height(&self) -> Result<u32, SpvError> {
        Ok(self.storage.last_block()?.map(|b| b.height).unwrap_or(0))
    }

    /// Downloaded height plus the pending hashes not yet stored as blocks.
    pub fn local_known_best_block_height(&self) -> Result<u32, SpvError> {
        let hashes: Vec<Hash> = self
            .storage
            .block_hashes()?
            .into_iter()
            .map(|h| h.header_hash)
            .collect();

        let mut existing = 0usize;
        for chunk in hashes.chunks(self.config.max_query_params) {
            existing += self.storage.blocks_count(chunk)?;
        }

        let pending = hashes.len().saturating_sub(existing) as u32;
        Ok(self.local_downloaded_best_block_height()? + pending)
    }

    /// Reset to a clean state. Safe to call after a normal stop or a
    /// mid-batch failure.
    pub fn prepare_for_download(&self) -> Result<FilterStatus, SpvError> {
        let status = self.handle_partial_blocks()?;
        self.clear_partial_blocks()?;
        self.storage.delete_all_block_hashes()?;
        self.blockchain.handle_fork()?;
        Ok(status)
    }

    pub fn download_started(&self) {}

    /// Returns `Stale` when this iteration consumed lookahead keys and the
    /// filter must be rebuilt before the next one.
    pub fn download_iteration_completed(&self) -> Result<FilterStatus, SpvError> {
        if self.partial_blocks.load(Ordering::SeqCst) {
            return self.handle_partial_blocks();
        }
        Ok(FilterStatus::Fresh)
    }

    pub fn download_completed(&self) -> Result<(), SpvError> {
        self.blockchain.handle_fork()
    }

    pub fn download_failed(&self) -> Result<FilterStatus, SpvError> {
        tracing::warn!("[spv-sync] download failed, resetting session");
        self.prepare_for_download()
    }

    /// Pending hashes to fetch, in request order.
    pub fn get_block_hashes(&self) -> Result<Vec<BlockHash>, SpvError> {
        Ok(self.storage.block_hashes_sorted(self.config.block_hash_fetch_limit)?)
    }

    /// Locator for a `getheaders`/`getblocks` request to a peer that claims
    /// `peer_last_block_height`.
    pub fn get_block_locator_hashes(&self, peer_last_block_height: u32) -> Result<Vec<Hash>, SpvError> {
        let mut locator = Vec::new();

        if let Some(last) = self.storage.last_block_hash()? {
            locator.push(last.header_hash);
        }

        if locator.is_empty() {
            let early = self
                .storage
                .blocks_after_height(self.checkpoint.height, self.config.locator_fallback_blocks)?;
            locator.extend(early.into_iter().map(|b| b.header.hash));
        }

        match self.storage.block_by_height(peer_last_block_height)? {
            Some(block) if !locator.contains(&block.header.hash) => locator.push(block.header.hash),
            Some(_) => {}
            None => locator.push(self.checkpoint.header.hash),
        }

        Ok(locator)
    }

    /// Record announced hashes not already pending.
    pub fn add_block_hashes(&self, hashes: &[Hash]) -> Result<(), SpvError> {
        let mut sequence = self.storage.last_block_hash()?.map(|h| h.sequence).unwrap_or(0);
        let mut known: HashSet<Hash> = self
            .storage
            .block_hashes()?
            .into_iter()
            .map(|h| h.header_hash)
            .collect();

        let fresh: Vec<BlockHash> = hashes
            .iter()
            .filter(|h| known.insert(**h))
            .map(|h| {
                sequence += 1;
                BlockHash::new(*h, None, sequence)
            })
            .collect();

        if !fresh.is_empty() {
            self.storage.add_block_hashes(&fresh)?;
        }
        Ok(())
    }

    /// Accept a filtered block and process its transactions.
    ///
    /// Blocks without a height extend the chain through validation; blocks
    /// with a height are stored as-is.
    pub fn handle_merkle_block(&self, merkle_block: MerkleBlock, max_block_height: u32) -> Result<Block, SpvError> {
        let mut block = match merkle_block.height {
            None => self.blockchain.connect(&merkle_block)?,
            Some(height) => self.blockchain.force_add(&merkle_block, height)?,
        };

        let skip_filter_check = self.partial_blocks.load(Ordering::SeqCst);
        let report = self.processor.process_incoming(
            merkle_block.associated_transactions,
            Some(&mut block),
            skip_filter_check,
        )?;
        if report.filter.is_stale() {
            tracing::debug!(height = block.height, "[spv-sync] iteration has partial blocks");
            self.partial_blocks.store(true, Ordering::SeqCst);
        }

        if !self.partial_blocks.load(Ordering::SeqCst) {
            self.storage.delete_block_hash(&block.header.hash)?;
        }

        self.listener
            .on_current_best_block_height_update(block.height, max_block_height);
        Ok(block)
    }

    /// True iff the block is not stored yet.
    pub fn should_request(&self, hash: &Hash) -> Result<bool, SpvError> {
        Ok(self.storage.block_by_hash(hash)?.is_none())
    }

    pub fn has_partial_blocks(&self) -> bool {
        self.partial_blocks.load(Ordering::SeqCst)
    }

    fn handle_partial_blocks(&self) -> Result<FilterStatus, SpvError> {
        let had_partial = self.partial_blocks.swap(false, Ordering::SeqCst);
        self.keys.fill_gap()?;
        Ok(if had_partial {
            FilterStatus::Stale
        } else {
            FilterStatus::Fresh
        })
    }

    /// Delete blocks whose hash is still pending, except the checkpoint.
    fn clear_partial_blocks(&self) -> Result<(), SpvError> {
        let pending: Vec<Hash> = self
            .storage
            .block_hashes()?
            .into_iter()
            .map(|h| h.header_hash)
            .filter(|h| h != &self.checkpoint.header.hash)
            .collect();

        for chunk in pending.chunks(self.config.max_query_params) {
            let blocks = self.storage.blocks_by_hashes(chunk)?;
            self.blockchain.delete_blocks(&blocks)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::InMemoryStorage;
    use crate::application::transaction_extractor::TransactionExtractor;
    use crate::domain::Checkpoint;
    use crate::plugins::PluginRegistry;
    use crate::ports::mocks::{ListenerEvent, MockAddressConverter, MockKeyManager, RecordingListener};
    use shared_types::script::{p2pkh_script, p2wpkh_script};
    use shared_types::{BlockHeader, FullTransaction, Transaction, TransactionInput, TransactionOutput};

    struct Fixture {
        storage: Arc<InMemoryStorage>,
        keys: Arc<MockKeyManager>,
        listener: Arc<RecordingListener>,
        syncer: BlockSyncer,
        checkpoint: Block,
    }

    fn header(previous: Hash, seed: u32) -> BlockHeader {
        BlockHeader::new(1, previous, [0u8; 32], 10_000 + seed, 0x207fffff, seed)
    }

    fn fixture() -> Fixture {
        let storage = Arc::new(InMemoryStorage::new());
        let keys = Arc::new(MockKeyManager::generate(3));
        let listener = Arc::new(RecordingListener::default());
        let converter = Arc::new(MockAddressConverter);
        let plugins = Arc::new(PluginRegistry::empty(converter.clone()));

        let checkpoint = Block::new(header([0u8; 32], 0), 100);
        storage.add_block(&checkpoint).unwrap();

        let blockchain = Arc::new(Blockchain::new(storage.clone(), None, listener.clone()));
        let extractor = TransactionExtractor::new(storage.clone(), keys.clone(), converter, plugins);
        let processor =
            Arc::new(TransactionProcessor::new(storage.clone(), extractor, keys.clone(), listener.clone()).unwrap());
        let parts = BlockSyncerParts {
            storage: storage.clone(),
            blockchain,
            processor,
            keys: keys.clone(),
            listener: listener.clone(),
        };
        let syncer = BlockSyncer::new(parts, checkpoint.clone(), SyncConfig::for_testing()).unwrap();
        Fixture {
            storage,
            keys,
            listener,
            syncer,
            checkpoint,
        }
    }

    fn connect_chain(f: &Fixture, count: u32) -> Vec<Block> {
        let mut previous = f.checkpoint.header.hash;
        (0..count)
            .map(|i| {
                let merkle = MerkleBlock::new(header(previous, i + 1), vec![]);
                let block = f.syncer.handle_merkle_block(merkle, 100 + count).unwrap();
                previous = block.header.hash;
                block
            })
            .collect()
    }

    #[test]
    fn test_initial_height_reported() {
        let f = fixture();
        assert_eq!(f.listener.events()[0], ListenerEvent::InitialHeight(100));
    }

    #[test]
    fn test_checkpoint_selection() {
        let genesis = Checkpoint::new(Block::new(header([0u8; 32], 0), 0));
        let last = Checkpoint::new(Block::new(header([1u8; 32], 1), 500));
        let checkpoints = NetworkCheckpoints {
            bip44: genesis.clone(),
            last: last.clone(),
        };

        let empty = InMemoryStorage::new();
        let chosen = BlockSyncer::checkpoint_block(SyncMode::Api, &checkpoints, &empty).unwrap();
        assert_eq!(chosen, last.block);
        assert_eq!(empty.last_block().unwrap(), Some(last.block.clone()));

        let full = InMemoryStorage::new();
        let chosen = BlockSyncer::checkpoint_block(SyncMode::Full, &checkpoints, &full).unwrap();
        assert_eq!(chosen, genesis.block);

        // Stored chain below the last checkpoint after an upgrade.
        let upgraded = InMemoryStorage::new();
        upgraded.add_block(&Block::new(header([2u8; 32], 2), 200)).unwrap();
        let chosen = BlockSyncer::checkpoint_block(SyncMode::Api, &checkpoints, &upgraded).unwrap();
        assert_eq!(chosen, genesis.block);
        assert_eq!(upgraded.block_count(), 1);
    }

    #[test]
    fn test_add_block_hashes_dedups_and_sequences() {
        let f = fixture();
        f.syncer.add_block_hashes(&[[1; 32], [2; 32]]).unwrap();
        f.syncer.add_block_hashes(&[[2; 32], [3; 32], [3; 32]]).unwrap();

        let hashes = f.syncer.get_block_hashes().unwrap();
        let pairs: Vec<(Hash, u32)> = hashes.iter().map(|h| (h.header_hash, h.sequence)).collect();
        assert_eq!(pairs, vec![([1; 32], 1), ([2; 32], 2), ([3; 32], 3)]);
    }

    #[test]
    fn test_get_block_hashes_limited() {
        let f = fixture();
        let many: Vec<Hash> = (1..=8u8).map(|i| [i; 32]).collect();
        f.syncer.add_block_hashes(&many).unwrap();
        assert_eq!(f.syncer.get_block_hashes().unwrap().len(), 5);
    }

    #[test]
    fn test_known_best_height_counts_unresolved_hashes() {
        let f = fixture();
        let blocks = connect_chain(&f, 2);
        f.syncer
            .add_block_hashes(&[blocks[1].header.hash, [7; 32], [8; 32], [9; 32], [10; 32]])
            .unwrap();
        assert_eq!(f.syncer.local_downloaded_best_block_height().unwrap(), 102);
        assert_eq!(f.syncer.local_known_best_block_height().unwrap(), 106);
    }

    #[test]
    fn test_locator_without_pending_hashes() {
        let f = fixture();
        let blocks = connect_chain(&f, 3);

        // Peer height unknown locally: early blocks then the checkpoint.
        let locator = f.syncer.get_block_locator_hashes(900).unwrap();
        assert_eq!(
            locator,
            vec![blocks[0].header.hash, blocks[1].header.hash, f.checkpoint.header.hash]
        );

        // Peer height known and already included.
        let locator = f.syncer.get_block_locator_hashes(101).unwrap();
        assert_eq!(locator, vec![blocks[0].header.hash, blocks[1].header.hash]);

        let locator = f.syncer.get_block_locator_hashes(103).unwrap();
        assert_eq!(locator.last(), Some(&blocks[2].header.hash));
    }

    #[test]
    fn test_locator_prefers_last_pending_hash() {
        let f = fixture();
        f.syncer.add_block_hashes(&[[1; 32], [2; 32]]).unwrap();
        let locator = f.syncer.get_block_locator_hashes(100).unwrap();
        assert_eq!(locator, vec![[2; 32], f.checkpoint.header.hash]);
    }

    #[test]
    fn test_merkle_block_clears_pending_hash() {
        let f = fixture();
        let merkle = MerkleBlock::new(header(f.checkpoint.header.hash, 1), vec![]);
        f.syncer.add_block_hashes(&[merkle.header.hash]).unwrap();
        assert!(f.syncer.should_request(&merkle.header.hash).unwrap());

        let block = f.syncer.handle_merkle_block(merkle, 101).unwrap();
        assert_eq!(block.height, 101);
        assert!(f.storage.block_hashes().unwrap().is_empty());
        assert!(!f.syncer.should_request(&block.header.hash).unwrap());
        assert!(f
            .listener
            .events()
            .contains(&ListenerEvent::CurrentHeight { height: 101, max: 101 }));
    }

    #[test]
    fn test_forced_height_skips_linkage() {
        let f = fixture();
        let mut merkle = MerkleBlock::new(header([9u8; 32], 1), vec![]);
        merkle.height = Some(150);
        let block = f.syncer.handle_merkle_block(merkle, 200).unwrap();
        assert_eq!(block.height, 150);
    }

    #[test]
    fn test_stale_filter_defers_hash_cleanup() {
        let f = fixture();
        let key = f.keys.keys()[0].clone();
        let tx = FullTransaction::new(
            Transaction::default(),
            vec![TransactionInput::new([4; 32], 0, 0)],
            vec![TransactionOutput::new(5_000, 0, p2wpkh_script(&key.key_hash))],
        );
        let mut merkle = MerkleBlock::new(header(f.checkpoint.header.hash, 1), vec![tx.header.hash]);
        merkle.associated_transactions.push(tx);
        f.syncer.add_block_hashes(&[merkle.header.hash]).unwrap();

        f.syncer.handle_merkle_block(merkle, 101).unwrap();
        assert!(f.syncer.has_partial_blocks());
        assert_eq!(f.storage.block_hashes().unwrap().len(), 1);

        assert_eq!(f.syncer.download_iteration_completed().unwrap(), FilterStatus::Stale);
        assert!(!f.syncer.has_partial_blocks());
        assert_eq!(f.keys.fill_gap_calls(), 1);
        assert_eq!(f.syncer.download_iteration_completed().unwrap(), FilterStatus::Fresh);
    }

    #[test]
    fn test_prepare_removes_partial_blocks_and_is_idempotent() {
        let f = fixture();
        let key = f.keys.keys()[0].clone();
        let blocks = connect_chain(&f, 1);
        f.syncer.download_completed().unwrap();

        // A pending block that arrived but was never confirmed by a clean batch.
        let tx = FullTransaction::new(
            Transaction::default(),
            vec![TransactionInput::new([4; 32], 0, 0)],
            vec![TransactionOutput::new(5_000, 0, p2pkh_script(&key.key_hash))],
        );
        let mut merkle = MerkleBlock::new(header(blocks[0].header.hash, 2), vec![tx.header.hash]);
        merkle.associated_transactions.push(tx.clone());
        f.syncer.add_block_hashes(&[merkle.header.hash, f.checkpoint.header.hash]).unwrap();
        f.keys.set_gap_shifts(true);
        let partial = f.syncer.handle_merkle_block(merkle, 102).unwrap();
        assert!(f.syncer.has_partial_blocks());

        assert_eq!(f.syncer.prepare_for_download().unwrap(), FilterStatus::Stale);
        assert!(f.storage.block_by_hash(&partial.header.hash).unwrap().is_none());
        assert!(f.storage.block_by_hash(&f.checkpoint.header.hash).unwrap().is_some());
        assert!(f.storage.transaction(&tx.header.hash).unwrap().is_none());
        assert!(f.storage.block_hashes().unwrap().is_empty());

        let blocks_after_first = f.storage.block_count();
        assert_eq!(f.syncer.download_failed().unwrap(), FilterStatus::Fresh);
        assert_eq!(f.storage.block_count(), blocks_after_first);
        assert_eq!(f.syncer.local_downloaded_best_block_height().unwrap(), 101);
    }
}
