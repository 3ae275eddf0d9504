//! # Sync Configuration
//!
//! Batching limits and thresholds for the sync engine.

use serde::{Deserialize, Serialize};

use crate::domain::ConfigError;

/// Sync engine configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Maximum headers a peer returns per request; a shorter batch means
    /// the peer has no more.
    pub header_batch_size: usize,

    /// Pending block hashes handed out per fetch round.
    pub block_hash_fetch_limit: usize,

    /// Maximum parameters per storage query.
    pub max_query_params: usize,

    /// Early post-checkpoint blocks used as a locator when no block hash
    /// is pending.
    pub locator_fallback_blocks: usize,

    /// Height interval at which synced headers are kept as checkpoints.
    pub checkpoint_interval: u32,

    /// Confirmations before received funds are spendable.
    pub confirmations_threshold: u32,

    /// Peers the connection layer aims to keep.
    pub peer_size: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            header_batch_size: 2000,
            block_hash_fetch_limit: 500,
            max_query_params: 999,
            locator_fallback_blocks: 10,
            checkpoint_interval: 2016,
            confirmations_threshold: 6,
            peer_size: 10,
        }
    }
}

impl SyncConfig {
    /// Create a config for testing (smaller values).
    pub fn for_testing() -> Self {
        Self {
            header_batch_size: 10,
            block_hash_fetch_limit: 5,
            max_query_params: 3,
            locator_fallback_blocks: 2,
            checkpoint_interval: 4,
            confirmations_threshold: 1,
            peer_size: 3,
        }
    }

    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("header_batch_size", self.header_batch_size),
            ("block_hash_fetch_limit", self.block_hash_fetch_limit),
            ("max_query_params", self.max_query_params),
            ("checkpoint_interval", self.checkpoint_interval as usize),
        ];
        for (field, value) in positive {
            if value == 0 {
                return Err(ConfigError::InvalidValue {
                    field,
                    reason: "must be positive".to_string(),
                });
            }
        }
        Ok(())
    }
}
