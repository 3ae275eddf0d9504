//! # Transaction Processor
//!
//! Single entry point for transactions that may affect the wallet, whether
//! they arrive in a merkle block, from a peer's mempool or from the local
//! transaction creator.
//!
//! Batch processing runs inside one critical section guarding the output
//! cache. The same transaction delivered through two paths at once is
//! stored exactly once; the later arrival can only update it.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use shared_types::{Block, FullTransaction, Transaction, TransactionOutput, TransactionStatus};

use super::output_cache::OutputCache;
use super::transaction_extractor::TransactionExtractor;
use crate::algorithms::in_topological_order;
use crate::domain::{BatchReport, FilterStatus, SpvError, StorageError};
use crate::ports::{BlockchainDataListener, KeyManager, Storage, TransactionWatcher};

/// Relevance detection and persistence of wallet transactions.
pub struct TransactionProcessor {
    storage: Arc<dyn Storage>,
    extractor: TransactionExtractor,
    keys: Arc<dyn KeyManager>,
    listener: Arc<dyn BlockchainDataListener>,
    watcher: Option<Arc<dyn TransactionWatcher>>,
    cache: Mutex<OutputCache>,
}

impl TransactionProcessor {
    /// Seeds the output cache from stored wallet outputs.
    pub fn new(
        storage: Arc<dyn Storage>,
        extractor: TransactionExtractor,
        keys: Arc<dyn KeyManager>,
        listener: Arc<dyn BlockchainDataListener>,
    ) -> Result<Self, SpvError> {
        let cache = OutputCache::from_outputs(&storage.wallet_outputs()?);
        Ok(Self {
            storage,
            extractor,
            keys,
            listener,
            watcher: None,
            cache: Mutex::new(cache),
        })
    }

    pub fn with_watcher(mut self, watcher: Arc<dyn TransactionWatcher>) -> Self {
        self.watcher = Some(watcher);
        self
    }

    /// Store a locally created transaction.
    ///
    /// Returns `FilterStatus::Stale` when its wallet outputs cannot be
    /// matched by the current bloom filter.
    pub fn process_outgoing(&self, mut transaction: FullTransaction) -> Result<FilterStatus, SpvError> {
        let mut cache = self.cache.lock();

        if self.storage.transaction(&transaction.header.hash)?.is_some() {
            return Err(SpvError::DuplicateTransaction(transaction.header.hash_hex()));
        }

        self.process(&mut transaction, &mut cache)?;
        self.storage.add_transaction(&transaction).map_err(|e| match e {
            StorageError::Duplicate(hash) => SpvError::DuplicateTransaction(hash),
            other => other.into(),
        })?;
        drop(cache);

        tracing::info!(tx_hash = %transaction.header.hash_hex(), "[spv-sync] outgoing transaction stored");
        self.listener
            .on_transactions_update(std::slice::from_ref(&transaction.header), &[], None);

        Ok(filter_status(&transaction.outputs))
    }

    /// Process a batch received from the network.
    ///
    /// `block` is the containing block, or `None` for mempool relays. The
    /// batch is never rolled back; a stale filter is reported in the
    /// returned report for the caller to act on.
    pub fn process_incoming(
        &self,
        transactions: Vec<FullTransaction>,
        mut block: Option<&mut Block>,
        skip_filter_check: bool,
    ) -> Result<BatchReport, SpvError> {
        let mut report = BatchReport::default();
        let block_hash = block.as_deref().map(|b| b.header.hash);

        {
            let mut cache = self.cache.lock();

            for (order, mut transaction) in in_topological_order(transactions).into_iter().enumerate() {
                let order = order as u32;

                if let Some(mut stored) = self.storage.transaction(&transaction.header.hash)? {
                    let already_relayed =
                        stored.status == TransactionStatus::Relayed && stored.block_hash == block_hash;
                    let would_unconfirm = stored.block_hash.is_some() && block_hash.is_none();
                    if already_relayed || would_unconfirm {
                        continue;
                    }
                    self.relay(&mut stored, order, block.as_deref_mut())?;
                    self.storage.update_transaction(&stored)?;
                    report.updated.push(stored);
                    continue;
                }

                self.process(&mut transaction, &mut cache)?;
                if let Some(watcher) = &self.watcher {
                    watcher.on_transaction_received(&transaction);
                }

                if !transaction.header.is_mine {
                    continue;
                }

                self.relay(&mut transaction.header, order, block.as_deref_mut())?;
                self.storage.add_transaction(&transaction)?;
                tracing::debug!(
                    tx_hash = %transaction.header.hash_hex(),
                    outgoing = transaction.header.is_outgoing,
                    "[spv-sync] wallet transaction received"
                );

                if !skip_filter_check {
                    let status = if self.keys.gap_shifts() {
                        FilterStatus::Stale
                    } else {
                        filter_status(&transaction.outputs)
                    };
                    report.filter = report.filter.merge(status);
                }
                report.inserted.push(transaction.header);
            }
        }

        if !report.is_empty() {
            self.listener
                .on_transactions_update(&report.inserted, &report.updated, block.as_deref());
        }
        if report.filter.is_stale() {
            tracing::debug!("[spv-sync] batch requires a bloom filter rebuild");
        }

        Ok(report)
    }

    /// Number of wallet outputs currently tracked.
    pub fn cached_outputs(&self) -> usize {
        self.cache.lock().len()
    }

    fn process(&self, transaction: &mut FullTransaction, cache: &mut OutputCache) -> Result<(), SpvError> {
        self.extractor.extract_outputs(transaction);

        if cache.has_outputs(&transaction.inputs) {
            transaction.header.is_mine = true;
            transaction.header.is_outgoing = true;
        }

        if transaction.header.is_mine {
            cache.add(&transaction.outputs);
            self.extractor.extract_address(transaction);
            self.extractor.extract_inputs(transaction)?;
        }
        Ok(())
    }

    fn relay(&self, transaction: &mut Transaction, order: u32, block: Option<&mut Block>) -> Result<(), SpvError> {
        transaction.status = TransactionStatus::Relayed;
        transaction.order = order;
        transaction.block_hash = block.as_deref().map(|b| b.header.hash);
        transaction.timestamp = match block.as_deref() {
            Some(b) => b.timestamp() as u64,
            None => unix_now(),
        };

        if let Some(block) = block {
            if !block.has_transactions {
                block.has_transactions = true;
                self.storage.update_block(block)?;
            }
        }
        Ok(())
    }
}

/// `Stale` when a wallet output uses a script type the filter matches only
/// by its public key.
fn filter_status(outputs: &[TransactionOutput]) -> FilterStatus {
    let expires = outputs
        .iter()
        .any(|o| o.is_mine() && o.script_type.requires_filter_update());
    if expires {
        FilterStatus::Stale
    } else {
        FilterStatus::Fresh
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
