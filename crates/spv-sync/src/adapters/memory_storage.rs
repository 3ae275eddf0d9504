//! # In-Memory Storage
//!
//! `Storage` over hash maps behind a single `RwLock`. Every trait call
//! takes the lock once, so each write is atomic per entity.

use std::collections::{HashMap, HashSet};

use parking_lot::RwLock;
use shared_types::{
    to_reversed_hex, Block, BlockHash, FullTransaction, Hash, Transaction, TransactionInput,
    TransactionOutput, TransactionStatus,
};

use crate::domain::{StorageError, UnspentCandidate};
use crate::ports::{Storage, StorageResult};

#[derive(Default)]
struct Tables {
    blocks: HashMap<Hash, Block>,
    block_hashes: Vec<BlockHash>,
    transactions: HashMap<Hash, FullTransaction>,
}

/// In-memory storage for tests and ephemeral wallets.
#[derive(Default)]
pub struct InMemoryStorage {
    tables: RwLock<Tables>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn block_count(&self) -> usize {
        self.tables.read().blocks.len()
    }

    pub fn transaction_count(&self) -> usize {
        self.tables.read().transactions.len()
    }
}

fn sorted_by_height(mut blocks: Vec<Block>) -> Vec<Block> {
    blocks.sort_by_key(|b| b.height);
    blocks
}

impl Storage for InMemoryStorage {
    fn last_block(&self) -> StorageResult<Option<Block>> {
        Ok(self.tables.read().blocks.values().max_by_key(|b| b.height).cloned())
    }

    fn block_by_hash(&self, hash: &Hash) -> StorageResult<Option<Block>> {
        Ok(self.tables.read().blocks.get(hash).cloned())
    }

    fn block_by_height(&self, height: u32) -> StorageResult<Option<Block>> {
        let tables = self.tables.read();
        let mut at_height: Vec<&Block> = tables.blocks.values().filter(|b| b.height == height).collect();
        at_height.sort_by_key(|b| b.stale);
        Ok(at_height.first().map(|b| (*b).clone()))
    }

    fn blocks_after_height(&self, height: u32, limit: usize) -> StorageResult<Vec<Block>> {
        let blocks = self
            .tables
            .read()
            .blocks
            .values()
            .filter(|b| b.height > height)
            .cloned()
            .collect();
        Ok(sorted_by_height(blocks).into_iter().take(limit).collect())
    }

    fn blocks_by_hashes(&self, hashes: &[Hash]) -> StorageResult<Vec<Block>> {
        let tables = self.tables.read();
        Ok(hashes.iter().filter_map(|h| tables.blocks.get(h).cloned()).collect())
    }

    fn blocks_count(&self, hashes: &[Hash]) -> StorageResult<usize> {
        let tables = self.tables.read();
        Ok(hashes.iter().filter(|h| tables.blocks.contains_key(*h)).count())
    }

    fn add_block(&self, block: &Block) -> StorageResult<()> {
        let mut tables = self.tables.write();
        if tables.blocks.contains_key(block.hash()) {
            return Err(StorageError::Duplicate(block.header.hash_hex()));
        }
        tables.blocks.insert(block.header.hash, block.clone());
        Ok(())
    }

    fn update_block(&self, block: &Block) -> StorageResult<()> {
        let mut tables = self.tables.write();
        match tables.blocks.get_mut(block.hash()) {
            Some(stored) => {
                *stored = block.clone();
                Ok(())
            }
            None => Err(StorageError::NotFound(block.header.hash_hex())),
        }
    }

    fn delete_blocks(&self, hashes: &[Hash]) -> StorageResult<Vec<Hash>> {
        let mut tables = self.tables.write();
        let doomed: HashSet<Hash> = hashes.iter().copied().collect();
        for hash in &doomed {
            tables.blocks.remove(hash);
        }

        let mut deleted: Vec<Hash> = tables
            .transactions
            .values()
            .filter(|tx| tx.header.block_hash.is_some_and(|h| doomed.contains(&h)))
            .map(|tx| tx.header.hash)
            .collect();
        deleted.sort_unstable();
        for hash in &deleted {
            tables.transactions.remove(hash);
        }
        Ok(deleted)
    }

    fn stale_blocks(&self) -> StorageResult<Vec<Block>> {
        let blocks = self.tables.read().blocks.values().filter(|b| b.stale).cloned().collect();
        Ok(sorted_by_height(blocks))
    }

    fn last_non_stale_block(&self) -> StorageResult<Option<Block>> {
        Ok(self
            .tables
            .read()
            .blocks
            .values()
            .filter(|b| !b.stale)
            .max_by_key(|b| b.height)
            .cloned())
    }

    fn non_stale_blocks_from(&self, height: u32) -> StorageResult<Vec<Block>> {
        let blocks = self
            .tables
            .read()
            .blocks
            .values()
            .filter(|b| !b.stale && b.height >= height)
            .cloned()
            .collect();
        Ok(sorted_by_height(blocks))
    }

    fn unstale_all_blocks(&self) -> StorageResult<()> {
        for block in self.tables.write().blocks.values_mut() {
            block.stale = false;
        }
        Ok(())
    }

    fn block_hashes(&self) -> StorageResult<Vec<BlockHash>> {
        Ok(self.tables.read().block_hashes.clone())
    }

    fn last_block_hash(&self) -> StorageResult<Option<BlockHash>> {
        Ok(self.tables.read().block_hashes.iter().max_by_key(|h| h.sequence).cloned())
    }

    fn block_hashes_sorted(&self, limit: usize) -> StorageResult<Vec<BlockHash>> {
        let mut hashes = self.tables.read().block_hashes.clone();
        hashes.sort_by_key(|h| (h.sequence, h.height));
        hashes.truncate(limit);
        Ok(hashes)
    }

    fn add_block_hashes(&self, hashes: &[BlockHash]) -> StorageResult<()> {
        self.tables.write().block_hashes.extend_from_slice(hashes);
        Ok(())
    }

    fn delete_block_hash(&self, hash: &Hash) -> StorageResult<()> {
        self.tables.write().block_hashes.retain(|h| &h.header_hash != hash);
        Ok(())
    }

    fn delete_all_block_hashes(&self) -> StorageResult<()> {
        self.tables.write().block_hashes.clear();
        Ok(())
    }

    fn transaction(&self, hash: &Hash) -> StorageResult<Option<Transaction>> {
        Ok(self.tables.read().transactions.get(hash).map(|tx| tx.header.clone()))
    }

    fn full_transaction(&self, hash: &Hash) -> StorageResult<Option<FullTransaction>> {
        Ok(self.tables.read().transactions.get(hash).cloned())
    }

    fn add_transaction(&self, transaction: &FullTransaction) -> StorageResult<()> {
        let mut tables = self.tables.write();
        if tables.transactions.contains_key(&transaction.header.hash) {
            return Err(StorageError::Duplicate(transaction.header.hash_hex()));
        }
        tables.transactions.insert(transaction.header.hash, transaction.clone());
        Ok(())
    }

    fn update_transaction(&self, transaction: &Transaction) -> StorageResult<()> {
        let mut tables = self.tables.write();
        match tables.transactions.get_mut(&transaction.hash) {
            Some(stored) => {
                stored.header = transaction.clone();
                Ok(())
            }
            None => Err(StorageError::NotFound(to_reversed_hex(&transaction.hash))),
        }
    }

    fn new_transactions(&self) -> StorageResult<Vec<FullTransaction>> {
        Ok(self
            .tables
            .read()
            .transactions
            .values()
            .filter(|tx| tx.header.status == TransactionStatus::New)
            .cloned()
            .collect())
    }

    fn previous_output(&self, input: &TransactionInput) -> StorageResult<Option<TransactionOutput>> {
        Ok(self
            .tables
            .read()
            .transactions
            .get(&input.previous_output_tx_hash)
            .and_then(|tx| tx.outputs.get(input.previous_output_index as usize))
            .cloned())
    }

    fn wallet_outputs(&self) -> StorageResult<Vec<TransactionOutput>> {
        Ok(self
            .tables
            .read()
            .transactions
            .values()
            .flat_map(|tx| tx.outputs.iter().filter(|o| o.is_mine()).cloned())
            .collect())
    }

    fn unspent_outputs(&self) -> StorageResult<Vec<UnspentCandidate>> {
        let tables = self.tables.read();
        let spent: HashSet<(Hash, u32)> = tables
            .transactions
            .values()
            .flat_map(|tx| tx.inputs.iter())
            .map(|i| (i.previous_output_tx_hash, i.previous_output_index))
            .collect();

        let mut candidates: Vec<UnspentCandidate> = tables
            .transactions
            .values()
            .flat_map(|tx| {
                tx.outputs
                    .iter()
                    .filter(|o| o.is_mine() && !spent.contains(&(o.transaction_hash, o.index)))
                    .map(move |o| UnspentCandidate {
                        output: o.clone(),
                        transaction: tx.header.clone(),
                    })
            })
            .collect();
        candidates.sort_by_key(|c| (c.transaction.timestamp, c.transaction.hash, c.output.index));
        Ok(candidates)
    }
}
