//! # Chain History
//!
//! Lookback access used by validators. Implemented by persistent storage in
//! the sync engine and by [`MemoryChain`] for header-only use.

use std::collections::HashMap;

use shared_types::{Block, Hash};

/// Number of blocks whose timestamps form the median time past.
pub const MEDIAN_TIME_SPAN: usize = 11;

/// Read access to accepted blocks by hash.
pub trait ChainHistory: Send + Sync {
    /// Look up an accepted block.
    fn block_by_hash(&self, hash: &Hash) -> Option<Block>;

    /// Walk `depth` parents back from `block`.
    fn previous(&self, block: &Block, depth: u32) -> Option<Block> {
        let mut current = block.clone();
        for _ in 0..depth {
            current = self.block_by_hash(&current.header.previous_block_hash)?;
        }
        Some(current)
    }

    /// Up to `count` blocks ending at `block` (inclusive), oldest first.
    fn window(&self, block: &Block, count: usize) -> Vec<Block> {
        let mut blocks = Vec::with_capacity(count);
        let mut current = Some(block.clone());
        while let Some(block) = current {
            if blocks.len() == count {
                break;
            }
            current = self.block_by_hash(&block.header.previous_block_hash);
            blocks.push(block);
        }
        blocks.reverse();
        blocks
    }
}

/// Median of the timestamps of the last 11 blocks ending at `block`.
///
/// Uses fewer blocks when history is shorter.
pub fn median_time_past(history: &dyn ChainHistory, block: &Block) -> u32 {
    let mut timestamps: Vec<u32> = history
        .window(block, MEDIAN_TIME_SPAN)
        .iter()
        .map(Block::timestamp)
        .collect();
    timestamps.sort_unstable();
    timestamps[timestamps.len() / 2]
}

/// Hash-indexed in-memory block set.
#[derive(Debug, Default, Clone)]
pub struct MemoryChain {
    blocks: HashMap<Hash, Block>,
    tip: Option<Hash>,
}

impl MemoryChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a block and make it the tip.
    pub fn push(&mut self, block: Block) {
        self.tip = Some(block.header.hash);
        self.blocks.insert(block.header.hash, block);
    }

    pub fn tip(&self) -> Option<&Block> {
        self.tip.as_ref().and_then(|hash| self.blocks.get(hash))
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

impl ChainHistory for MemoryChain {
    fn block_by_hash(&self, hash: &Hash) -> Option<Block> {
        self.blocks.get(hash).cloned()
    }
}
