//! # Output Cache
//!
//! Wallet outputs keyed by outpoint, so "does this input spend my funds"
//! is a set lookup.

use std::collections::HashSet;

use shared_types::{Hash, TransactionInput, TransactionOutput};

/// Set of `(transaction hash, output index)` pairs owned by the wallet.
#[derive(Debug, Default, Clone)]
pub struct OutputCache {
    outpoints: HashSet<(Hash, u32)>,
}

impl OutputCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed from stored wallet outputs.
    pub fn from_outputs(outputs: &[TransactionOutput]) -> Self {
        let mut cache = Self::new();
        cache.add(outputs);
        cache
    }

    /// Remember every output that carries a key path.
    pub fn add(&mut self, outputs: &[TransactionOutput]) {
        for output in outputs.iter().filter(|o| o.is_mine()) {
            self.outpoints.insert((output.transaction_hash, output.index));
        }
    }

    /// True when any input spends a cached output.
    pub fn has_outputs(&self, inputs: &[TransactionInput]) -> bool {
        inputs.iter().any(|input| {
            self.outpoints
                .contains(&(input.previous_output_tx_hash, input.previous_output_index))
        })
    }

    pub fn len(&self) -> usize {
        self.outpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outpoints.is_empty()
    }
}
