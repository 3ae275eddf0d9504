//! # Blockchain
//!
//! Accepts blocks into the local chain and resolves forks.
//!
//! Blocks connected during a session are stored `stale`. Once the session
//! settles, [`Blockchain::handle_fork`] keeps whichever branch reaches
//! higher and deletes the other.

use std::sync::Arc;

use shared_types::{to_reversed_hex, Block, MerkleBlock};
use spv_consensus::ValidatorSet;

use super::chain_history::StorageHistory;
use crate::domain::{SpvError, StorageError};
use crate::ports::{BlockchainDataListener, Storage};

/// Fork manager over stored blocks.
pub struct Blockchain {
    storage: Arc<dyn Storage>,
    validators: Option<ValidatorSet>,
    listener: Arc<dyn BlockchainDataListener>,
}

impl Blockchain {
    /// `validators` of `None` accepts any correctly linked block.
    pub fn new(
        storage: Arc<dyn Storage>,
        validators: Option<ValidatorSet>,
        listener: Arc<dyn BlockchainDataListener>,
    ) -> Self {
        Self {
            storage,
            validators,
            listener,
        }
    }

    /// Extend the chain with a block whose height is not yet known.
    ///
    /// A block already stored is returned unchanged. A block whose parent is
    /// unknown fails with `ChainLinkageMismatch`; one that a validator
    /// rejects is never stored.
    pub fn connect(&self, merkle_block: &MerkleBlock) -> Result<Block, SpvError> {
        if let Some(existing) = self.storage.block_by_hash(merkle_block.block_hash())? {
            return Ok(existing);
        }

        let previous_hash = merkle_block.header.previous_block_hash;
        let previous = self.storage.block_by_hash(&previous_hash)?.ok_or_else(|| {
            SpvError::ChainLinkageMismatch {
                previous: to_reversed_hex(&previous_hash),
            }
        })?;

        let mut block = Block::with_previous(merkle_block.header.clone(), &previous);
        if let Some(validators) = &self.validators {
            validators.validate_block(&block, &previous, &StorageHistory::new(self.storage.as_ref()))?;
        }

        block.stale = true;
        self.add(block)
    }

    /// Store a block at a height learned elsewhere, without validation.
    pub fn force_add(&self, merkle_block: &MerkleBlock, height: u32) -> Result<Block, SpvError> {
        self.add(Block::new(merkle_block.header.clone(), height))
    }

    /// Store `block`. If another caller stored it first, that copy is
    /// returned and no insert is reported.
    fn add(&self, block: Block) -> Result<Block, SpvError> {
        match self.storage.add_block(&block) {
            Ok(()) => {}
            Err(StorageError::Duplicate(_)) => {
                if let Some(existing) = self.storage.block_by_hash(&block.header.hash)? {
                    tracing::debug!(height = existing.height, "[spv-sync] block stored concurrently");
                    return Ok(existing);
                }
                return Err(StorageError::Duplicate(block.header.hash_hex()).into());
            }
            Err(e) => return Err(e.into()),
        }
        tracing::debug!(height = block.height, hash = %block.header.hash_hex(), "[spv-sync] block stored");
        self.listener.on_block_insert(&block);
        Ok(block)
    }

    /// Settle the stale branch left by the current session.
    pub fn handle_fork(&self) -> Result<(), SpvError> {
        let stale = self.storage.stale_blocks()?;
        let (Some(first_stale), Some(last_stale)) = (stale.first(), stale.last()) else {
            return Ok(());
        };
        let last_non_stale_height = self
            .storage
            .last_non_stale_block()?
            .map(|b| b.height)
            .unwrap_or(0);

        if first_stale.height > last_non_stale_height {
            self.storage.unstale_all_blocks()?;
            return Ok(());
        }

        if last_stale.height > last_non_stale_height {
            tracing::info!(
                fork_height = first_stale.height,
                new_tip = last_stale.height,
                old_tip = last_non_stale_height,
                "[spv-sync] switching to longer branch"
            );
            let replaced = self.storage.non_stale_blocks_from(first_stale.height)?;
            self.delete_blocks(&replaced)?;
            self.storage.unstale_all_blocks()?;
        } else {
            tracing::info!(
                fork_height = first_stale.height,
                tip = last_non_stale_height,
                "[spv-sync] discarding shorter branch"
            );
            self.delete_blocks(&stale)?;
        }
        Ok(())
    }

    /// Delete blocks and their transactions, notifying the data listener.
    pub fn delete_blocks(&self, blocks: &[Block]) -> Result<(), SpvError> {
        if blocks.is_empty() {
            return Ok(());
        }
        let hashes: Vec<_> = blocks.iter().map(|b| b.header.hash).collect();
        let deleted = self.storage.delete_blocks(&hashes)?;
        let deleted: Vec<String> = deleted.iter().map(|h| to_reversed_hex(h)).collect();
        self.listener.on_transactions_delete(&deleted);
        Ok(())
    }
}
