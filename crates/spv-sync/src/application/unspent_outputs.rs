//! # Unspent Output Provider
//!
//! Spendable wallet outputs and the balance derived from them.

use std::sync::Arc;

use shared_types::{TransactionStatus, UnspentOutput};

use crate::domain::{Balance, SpvError, UnspentCandidate};
use crate::plugins::PluginRegistry;
use crate::ports::{KeyManager, MedianTimeSource, Storage};

/// Resolves stored unspent outputs against keys, blocks and plugins.
pub struct UnspentOutputProvider {
    storage: Arc<dyn Storage>,
    keys: Arc<dyn KeyManager>,
    plugins: Arc<PluginRegistry>,
    median_time: Arc<dyn MedianTimeSource>,
    confirmations_threshold: u32,
}

impl UnspentOutputProvider {
    pub fn new(
        storage: Arc<dyn Storage>,
        keys: Arc<dyn KeyManager>,
        plugins: Arc<PluginRegistry>,
        median_time: Arc<dyn MedianTimeSource>,
        confirmations_threshold: u32,
    ) -> Self {
        Self {
            storage,
            keys,
            plugins,
            median_time,
            confirmations_threshold,
        }
    }

    /// Outputs the wallet may spend now.
    pub fn spendable(&self) -> Result<Vec<UnspentOutput>, SpvError> {
        Ok(self
            .confirmed()?
            .into_iter()
            .filter(|u| self.plugins.is_spendable(u, self.median_time.as_ref()))
            .collect())
    }

    /// Confirmed outputs a plugin currently locks.
    pub fn locked(&self) -> Result<Vec<UnspentOutput>, SpvError> {
        Ok(self
            .confirmed()?
            .into_iter()
            .filter(|u| !self.plugins.is_spendable(u, self.median_time.as_ref()))
            .collect())
    }

    /// Spendable and not-yet-spendable totals. Unconfirmed incoming funds
    /// count as unspendable.
    pub fn balance(&self) -> Result<Balance, SpvError> {
        let spendable: u64 = self.spendable()?.iter().map(|u| u.output.value).sum();
        let total: u64 = self.all()?.iter().map(|u| u.output.value).sum();
        Ok(Balance {
            spendable,
            unspendable: total.saturating_sub(spendable),
        })
    }

    /// Relayed outputs that are our own change or deep enough.
    fn confirmed(&self) -> Result<Vec<UnspentOutput>, SpvError> {
        let Some(last_height) = self.storage.last_block()?.map(|b| b.height) else {
            return Ok(Vec::new());
        };
        let threshold = self.confirmations_threshold;

        Ok(self
            .all()?
            .into_iter()
            .filter(|u| u.transaction.status == TransactionStatus::Relayed)
            .filter(|u| {
                if u.transaction.is_outgoing {
                    return true;
                }
                match &u.block {
                    Some(block) => last_height + 1 >= block.height + threshold,
                    None => threshold == 0,
                }
            })
            .collect())
    }

    fn all(&self) -> Result<Vec<UnspentOutput>, SpvError> {
        let mut resolved = Vec::new();
        for candidate in self.storage.unspent_outputs()? {
            if let Some(unspent) = self.resolve(candidate)? {
                resolved.push(unspent);
            }
        }
        Ok(resolved)
    }

    fn resolve(&self, candidate: UnspentCandidate) -> Result<Option<UnspentOutput>, SpvError> {
        if candidate.transaction.status == TransactionStatus::Invalid {
            return Ok(None);
        }
        let Some(path) = candidate.output.public_key_path.as_deref() else {
            return Ok(None);
        };
        let Some(public_key) = self.keys.public_key_by_path(path) else {
            tracing::warn!(path, "[spv-sync] unspent output with unknown key path");
            return Ok(None);
        };
        let block = match &candidate.transaction.block_hash {
            Some(hash) => self.storage.block_by_hash(hash)?,
            None => None,
        };
        Ok(Some(UnspentOutput {
            output: candidate.output,
            public_key,
            transaction: candidate.transaction,
            block,
        }))
    }
}
