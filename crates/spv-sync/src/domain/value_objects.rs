//! # Value Objects
//!
//! Small immutable types passed across the engine boundary.

use serde::{Deserialize, Serialize};
use shared_types::{ScriptType, Transaction};

/// A decoded address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    /// Human-readable form.
    pub string: String,
    pub script_type: ScriptType,
    /// Key hash or script hash the address commits to.
    pub hash: Vec<u8>,
}

/// Where a sync session starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SyncMode {
    /// From the earliest (BIP44) checkpoint.
    Full,
    /// From the most recent checkpoint.
    #[default]
    Api,
    /// New wallet, nothing to restore.
    NewWallet,
}

/// Externally observable sync state.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum SyncState {
    #[default]
    NotSynced,
    /// Progress fraction in [0, 1].
    Syncing(f64),
    Synced,
}

/// Whether the remote bloom filter still covers every wallet output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FilterStatus {
    #[default]
    Fresh,
    /// Filter must be rebuilt and the iteration repeated.
    Stale,
}

impl FilterStatus {
    pub fn is_stale(self) -> bool {
        self == FilterStatus::Stale
    }

    /// Stale if either side is stale.
    pub fn merge(self, other: FilterStatus) -> FilterStatus {
        if self.is_stale() || other.is_stale() {
            FilterStatus::Stale
        } else {
            FilterStatus::Fresh
        }
    }
}

/// Result of one incoming batch.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BatchReport {
    pub inserted: Vec<Transaction>,
    pub updated: Vec<Transaction>,
    /// Post-condition the caller must act on.
    pub filter: FilterStatus,
}

impl BatchReport {
    pub fn is_empty(&self) -> bool {
        self.inserted.is_empty() && self.updated.is_empty()
    }
}

/// Result of validating one header batch from the sync peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderBatchOutcome {
    /// Every header linked; `peer_synced` when the batch was short.
    Accepted { count: usize, peer_synced: bool },
    /// Header at `index` did not link to its predecessor. Headers before it
    /// were applied.
    LinkageMismatch { index: usize },
}

/// Spendable and locked totals in satoshis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Balance {
    pub spendable: u64,
    pub unspendable: u64,
}
