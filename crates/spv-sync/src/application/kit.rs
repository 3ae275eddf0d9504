//! # SPV Kit
//!
//! Single entry point that assembles the engine from its collaborators.
//!
//! ```text
//! SpvKitBuilder --build()--> SpvKit
//!   required: network, storage, key_manager, address_converter
//!   optional: plugins, listeners, sync_mode, config, checkpoints,
//!             bloom_filter, transaction_builder, transaction_sender
//! ```

use std::sync::Arc;

use shared_types::{Block, FullTransaction, MerkleBlock, Transaction};

use super::block_syncer::{BlockSyncer, BlockSyncerParts};
use super::blockchain::Blockchain;
use super::chain_history::StorageMedianTime;
use super::peer_sync::PeerSyncCoordinator;
use super::sync_state_provider::SyncStateProvider;
use super::transaction_creator::{PaymentRequest, TransactionCreator, TransactionCreatorParts};
use super::transaction_extractor::TransactionExtractor;
use super::transaction_processor::TransactionProcessor;
use super::unspent_outputs::UnspentOutputProvider;
use crate::config::SyncConfig;
use crate::domain::{
    Balance, Checkpoint, ConfigError, FilterStatus, NetworkCheckpoints, SpvError, SyncMode, SyncState,
};
use crate::network::Network;
use crate::plugins::{Plugin, PluginRegistry};
use crate::ports::{
    AddressConverter, BlockchainDataListener, BloomFilterManager, CheckpointListener, KeyManager,
    Storage, SyncStateListener, TransactionBuilder, TransactionSender, TransactionWatcher,
};

/// Listener and filter manager that ignore everything.
struct Noop;

impl BlockchainDataListener for Noop {
    fn on_transactions_update(&self, _: &[Transaction], _: &[Transaction], _: Option<&Block>) {}
    fn on_transactions_delete(&self, _: &[String]) {}
    fn on_block_insert(&self, _: &Block) {}
}

impl BloomFilterManager for Noop {
    fn regenerate(&self) {}
}

impl CheckpointListener for Noop {
    fn on_checkpoints(&self, _: &[Checkpoint]) {}
}

/// Forwards sync progress to the state provider and an optional observer.
struct SyncListeners {
    provider: Arc<SyncStateProvider>,
    extra: Option<Arc<dyn SyncStateListener>>,
}

impl SyncListeners {
    fn each(&self, f: impl Fn(&dyn SyncStateListener)) {
        f(self.provider.as_ref());
        if let Some(extra) = &self.extra {
            f(extra.as_ref());
        }
    }
}

impl SyncStateListener for SyncListeners {
    fn on_sync_start(&self) {
        self.each(|l| l.on_sync_start());
    }

    fn on_sync_stop(&self) {
        self.each(|l| l.on_sync_stop());
    }

    fn on_sync_finish(&self) {
        self.each(|l| l.on_sync_finish());
    }

    fn on_initial_best_block_height_update(&self, height: u32) {
        self.each(|l| l.on_initial_best_block_height_update(height));
    }

    fn on_current_best_block_height_update(&self, height: u32, max_block_height: u32) {
        self.each(|l| l.on_current_best_block_height_update(height, max_block_height));
    }
}

/// Builder for [`SpvKit`].
#[derive(Default)]
pub struct SpvKitBuilder {
    network: Option<Network>,
    storage: Option<Arc<dyn Storage>>,
    key_manager: Option<Arc<dyn KeyManager>>,
    address_converter: Option<Arc<dyn AddressConverter>>,
    plugins: Vec<Arc<dyn Plugin>>,
    data_listener: Option<Arc<dyn BlockchainDataListener>>,
    sync_listener: Option<Arc<dyn SyncStateListener>>,
    checkpoint_listener: Option<Arc<dyn CheckpointListener>>,
    watcher: Option<Arc<dyn TransactionWatcher>>,
    sync_mode: SyncMode,
    config: SyncConfig,
    checkpoints: Option<NetworkCheckpoints>,
    bloom_filter: Option<Arc<dyn BloomFilterManager>>,
    transaction_builder: Option<Arc<dyn TransactionBuilder>>,
    transaction_sender: Option<Arc<dyn TransactionSender>>,
}

impl SpvKitBuilder {
    pub fn network(mut self, network: Network) -> Self {
        self.network = Some(network);
        self
    }

    pub fn storage(mut self, storage: Arc<dyn Storage>) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn key_manager(mut self, keys: Arc<dyn KeyManager>) -> Self {
        self.key_manager = Some(keys);
        self
    }

    pub fn address_converter(mut self, converter: Arc<dyn AddressConverter>) -> Self {
        self.address_converter = Some(converter);
        self
    }

    pub fn plugin(mut self, plugin: Arc<dyn Plugin>) -> Self {
        self.plugins.push(plugin);
        self
    }

    pub fn data_listener(mut self, listener: Arc<dyn BlockchainDataListener>) -> Self {
        self.data_listener = Some(listener);
        self
    }

    /// Observer notified alongside the built-in [`SyncStateProvider`].
    pub fn sync_listener(mut self, listener: Arc<dyn SyncStateListener>) -> Self {
        self.sync_listener = Some(listener);
        self
    }

    pub fn checkpoint_listener(mut self, listener: Arc<dyn CheckpointListener>) -> Self {
        self.checkpoint_listener = Some(listener);
        self
    }

    pub fn transaction_watcher(mut self, watcher: Arc<dyn TransactionWatcher>) -> Self {
        self.watcher = Some(watcher);
        self
    }

    pub fn sync_mode(mut self, mode: SyncMode) -> Self {
        self.sync_mode = mode;
        self
    }

    pub fn config(mut self, config: SyncConfig) -> Self {
        self.config = config;
        self
    }

    /// Replace the network's built-in checkpoints.
    pub fn checkpoints(mut self, checkpoints: NetworkCheckpoints) -> Self {
        self.checkpoints = Some(checkpoints);
        self
    }

    pub fn bloom_filter(mut self, manager: Arc<dyn BloomFilterManager>) -> Self {
        self.bloom_filter = Some(manager);
        self
    }

    pub fn transaction_builder(mut self, builder: Arc<dyn TransactionBuilder>) -> Self {
        self.transaction_builder = Some(builder);
        self
    }

    pub fn transaction_sender(mut self, sender: Arc<dyn TransactionSender>) -> Self {
        self.transaction_sender = Some(sender);
        self
    }

    /// Validate, seed the checkpoint block and wire every component.
    pub fn build(self) -> Result<SpvKit, SpvError> {
        let network = self.network.ok_or(ConfigError::MissingComponent("network"))?;
        let storage = self.storage.ok_or(ConfigError::MissingComponent("storage"))?;
        let keys = self.key_manager.ok_or(ConfigError::MissingComponent("key_manager"))?;
        let address_converter = self
            .address_converter
            .ok_or(ConfigError::MissingComponent("address_converter"))?;
        self.config.validate()?;

        let checkpoints = match self.checkpoints {
            Some(checkpoints) => checkpoints,
            None => network.checkpoints()?,
        };
        let checkpoint = BlockSyncer::checkpoint_block(self.sync_mode, &checkpoints, storage.as_ref())?;
        let validators = network.validators(checkpoint.height)?;

        let plugins = Arc::new(
            self.plugins
                .into_iter()
                .fold(PluginRegistry::builder(), |builder, plugin| builder.plugin(plugin))
                .build(address_converter.clone()),
        );
        let data_listener: Arc<dyn BlockchainDataListener> = self.data_listener.unwrap_or_else(|| Arc::new(Noop));
        let bloom_filter: Arc<dyn BloomFilterManager> = self.bloom_filter.unwrap_or_else(|| Arc::new(Noop));

        let blockchain = Arc::new(Blockchain::new(storage.clone(), validators, data_listener.clone()));
        let extractor =
            TransactionExtractor::new(storage.clone(), keys.clone(), address_converter.clone(), plugins.clone());
        let mut processor = TransactionProcessor::new(storage.clone(), extractor, keys.clone(), data_listener)?;
        if let Some(watcher) = self.watcher {
            processor = processor.with_watcher(watcher);
        }
        let processor = Arc::new(processor);

        let state = Arc::new(SyncStateProvider::new());
        let listeners = Arc::new(SyncListeners {
            provider: state.clone(),
            extra: self.sync_listener,
        });
        let syncer = BlockSyncer::new(
            BlockSyncerParts {
                storage: storage.clone(),
                blockchain,
                processor: processor.clone(),
                keys: keys.clone(),
                listener: listeners,
            },
            checkpoint,
            self.config.clone(),
        )?;

        let unspent_outputs = Arc::new(UnspentOutputProvider::new(
            storage.clone(),
            keys,
            plugins.clone(),
            Arc::new(StorageMedianTime::new(storage)),
            self.config.confirmations_threshold,
        ));

        let creator = match (self.transaction_builder, self.transaction_sender) {
            (Some(builder), Some(sender)) => Some(TransactionCreator::new(TransactionCreatorParts {
                address_converter,
                plugins: plugins.clone(),
                unspent_outputs: unspent_outputs.clone(),
                builder,
                processor: processor.clone(),
                bloom_filter: bloom_filter.clone(),
                sender,
            })),
            _ => None,
        };

        tracing::info!(
            ?network,
            checkpoint = syncer.checkpoint().height,
            plugins = plugins.len(),
            "[spv-sync] kit ready"
        );

        Ok(SpvKit {
            network,
            config: self.config,
            syncer,
            processor,
            unspent_outputs,
            creator,
            state,
            plugins,
            bloom_filter,
            checkpoint_listener: self.checkpoint_listener.unwrap_or_else(|| Arc::new(Noop)),
        })
    }
}

/// An assembled engine.
pub struct SpvKit {
    network: Network,
    config: SyncConfig,
    syncer: BlockSyncer,
    processor: Arc<TransactionProcessor>,
    unspent_outputs: Arc<UnspentOutputProvider>,
    creator: Option<TransactionCreator>,
    state: Arc<SyncStateProvider>,
    plugins: Arc<PluginRegistry>,
    bloom_filter: Arc<dyn BloomFilterManager>,
    checkpoint_listener: Arc<dyn CheckpointListener>,
}

impl SpvKit {
    pub fn builder() -> SpvKitBuilder {
        SpvKitBuilder::default()
    }

    pub fn network(&self) -> Network {
        self.network
    }

    pub fn syncer(&self) -> &BlockSyncer {
        &self.syncer
    }

    pub fn processor(&self) -> &TransactionProcessor {
        &self.processor
    }

    pub fn plugins(&self) -> &PluginRegistry {
        &self.plugins
    }

    pub fn unspent_outputs(&self) -> &UnspentOutputProvider {
        &self.unspent_outputs
    }

    pub fn sync_state(&self) -> SyncState {
        self.state.state()
    }

    pub fn state_provider(&self) -> &SyncStateProvider {
        &self.state
    }

    pub fn balance(&self) -> Result<Balance, SpvError> {
        self.unspent_outputs.balance()
    }

    /// Reset the session and rebuild the bloom filter when needed.
    pub fn prepare_for_download(&self) -> Result<(), SpvError> {
        let status = self.syncer.prepare_for_download()?;
        self.apply_filter_status(status);
        Ok(())
    }

    pub fn handle_merkle_block(&self, merkle_block: MerkleBlock, max_block_height: u32) -> Result<Block, SpvError> {
        self.syncer.handle_merkle_block(merkle_block, max_block_height)
    }

    /// Finish an iteration. Returns `Stale` when the filter was rebuilt and
    /// the iteration must be repeated.
    pub fn download_iteration_completed(&self) -> Result<FilterStatus, SpvError> {
        let status = self.syncer.download_iteration_completed()?;
        self.apply_filter_status(status);
        Ok(status)
    }

    /// Settle the branch downloaded in this session.
    pub fn download_completed(&self) -> Result<(), SpvError> {
        self.syncer.download_completed()
    }

    /// Reset after an aborted session, rebuilding the bloom filter when the
    /// session left partial blocks.
    pub fn download_failed(&self) -> Result<FilterStatus, SpvError> {
        let status = self.syncer.download_failed()?;
        self.apply_filter_status(status);
        Ok(status)
    }

    /// Store a transaction relayed outside any block.
    pub fn handle_mempool_transactions(&self, transactions: Vec<FullTransaction>) -> Result<(), SpvError> {
        let report = self.processor.process_incoming(transactions, None, false)?;
        self.apply_filter_status(report.filter);
        Ok(())
    }

    /// Create, store and broadcast a payment.
    pub async fn send(&self, request: PaymentRequest) -> Result<FullTransaction, SpvError> {
        let creator = self
            .creator
            .as_ref()
            .ok_or(ConfigError::MissingComponent("transaction_builder"))?;
        creator.create(request).await
    }

    /// Header-sync coordinator rooted at this kit's checkpoint.
    pub fn peer_sync_coordinator(&self) -> PeerSyncCoordinator {
        PeerSyncCoordinator::new(
            Checkpoint::new(self.syncer.checkpoint().clone()),
            &self.config,
            self.checkpoint_listener.clone(),
        )
    }

    fn apply_filter_status(&self, status: FilterStatus) {
        if status.is_stale() {
            tracing::debug!("[spv-sync] regenerating bloom filter");
            self.bloom_filter.regenerate();
        }
    }
}
