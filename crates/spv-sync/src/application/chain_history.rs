//! # Storage-Backed Chain History
//!
//! Bridges `Storage` to the lookback and median-time views the consensus
//! rules and plugins need.

use std::sync::Arc;

use shared_types::{Block, Hash};
use spv_consensus::{median_time_past, ChainHistory};

use crate::ports::{MedianTimeSource, Storage};

/// `ChainHistory` over stored blocks. Storage failures read as a missing
/// block, which the rules report as `NoPreviousBlock`.
pub struct StorageHistory<'a> {
    storage: &'a dyn Storage,
}

impl<'a> StorageHistory<'a> {
    pub fn new(storage: &'a dyn Storage) -> Self {
        Self { storage }
    }
}

impl ChainHistory for StorageHistory<'_> {
    fn block_by_hash(&self, hash: &Hash) -> Option<Block> {
        match self.storage.block_by_hash(hash) {
            Ok(block) => block,
            Err(e) => {
                tracing::debug!(error = %e, "[spv-sync] history lookup failed");
                None
            }
        }
    }
}

/// Median time past at the stored chain tip.
pub struct StorageMedianTime {
    storage: Arc<dyn Storage>,
}

impl StorageMedianTime {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }
}

impl MedianTimeSource for StorageMedianTime {
    fn median_time_past(&self) -> Option<u32> {
        let tip = self.storage.last_block().ok().flatten()?;
        Some(median_time_past(&StorageHistory::new(self.storage.as_ref()), &tip))
    }
}
