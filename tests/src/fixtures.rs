//! # Test Fixtures
//!
//! Builders shared by the integration flows.

use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;
use shared_types::script::p2pkh_script;
use shared_types::{Block, BlockHeader, FullTransaction, Hash, MerkleBlock, Transaction, TransactionInput, TransactionOutput};
use spv_sync::ports::mocks::{
    MockAddressConverter, MockBloomFilterManager, MockKeyManager, MockTransactionBuilder, MockTransactionSender,
    RecordingListener,
};
use spv_sync::{
    Checkpoint, CheckpointListener, InMemoryStorage, Network, PeerEvent, PeerEventSender, PeerId, Plugin, SpvKit,
    SyncConfig, SyncPeer,
};
use tokio::sync::mpsc;

/// Regtest genesis difficulty.
pub const REGTEST_BITS: u32 = 0x207f_ffff;

/// A kit over in-memory collaborators.
pub struct Wallet {
    pub kit: SpvKit,
    pub storage: Arc<InMemoryStorage>,
    pub keys: Arc<MockKeyManager>,
    pub bloom: Arc<MockBloomFilterManager>,
    pub sender: Arc<MockTransactionSender>,
    pub listener: Arc<RecordingListener>,
}

impl Wallet {
    pub fn new() -> Self {
        Self::with_plugins(Vec::new())
    }

    /// Regtest kit with confirmations after one block.
    pub fn with_plugins(plugins: Vec<Arc<dyn Plugin>>) -> Self {
        spv_telemetry::init_test_logging();

        let storage = Arc::new(InMemoryStorage::new());
        let keys = Arc::new(MockKeyManager::generate(5));
        let bloom = Arc::new(MockBloomFilterManager::default());
        let sender = Arc::new(MockTransactionSender::default());
        let listener = Arc::new(RecordingListener::default());

        let mut builder = SpvKit::builder()
            .network(Network::RegTest)
            .storage(storage.clone())
            .key_manager(keys.clone())
            .address_converter(Arc::new(MockAddressConverter))
            .config(SyncConfig {
                confirmations_threshold: 1,
                ..SyncConfig::for_testing()
            })
            .bloom_filter(bloom.clone())
            .data_listener(listener.clone())
            .transaction_builder(Arc::new(MockTransactionBuilder))
            .transaction_sender(sender.clone());
        for plugin in plugins {
            builder = builder.plugin(plugin);
        }

        let kit = builder.build().expect("kit builds");
        Self {
            kit,
            storage,
            keys,
            bloom,
            sender,
            listener,
        }
    }

    pub fn key_hash(&self, index: usize) -> [u8; 20] {
        self.keys.keys()[index].key_hash
    }

    /// Highest stored block.
    pub fn tip(&self) -> Block {
        use spv_sync::Storage;
        self.storage.last_block().unwrap().expect("checkpoint seeded")
    }
}

impl Default for Wallet {
    fn default() -> Self {
        Self::new()
    }
}

/// A transaction spending an unrelated outpoint into `script`.
pub fn payment(script: Vec<u8>, value: u64, nonce: u8) -> FullTransaction {
    FullTransaction::new(
        Transaction::default(),
        vec![TransactionInput::new([nonce; 32], 0, 0xffff_ffff)],
        vec![TransactionOutput::new(value, 0, script)],
    )
}

pub fn p2pkh_payment(key_hash: &[u8], value: u64, nonce: u8) -> FullTransaction {
    payment(p2pkh_script(key_hash), value, nonce)
}

/// Merkle block on top of `previous` carrying `transactions`.
pub fn merkle_block(previous: &Block, timestamp: u32, transactions: Vec<FullTransaction>) -> MerkleBlock {
    let header = BlockHeader::new(1, previous.header.hash, [0u8; 32], timestamp, previous.bits(), previous.height + 1);
    let hashes = transactions.iter().map(|t| t.header.hash).collect();
    let mut block = MerkleBlock::new(header, hashes);
    block.associated_transactions = transactions;
    block
}

/// `count` linked headers after `previous`, one per `spacing` seconds.
pub fn header_chain(previous: &BlockHeader, count: u32, spacing: u32) -> Vec<BlockHeader> {
    let mut headers: Vec<BlockHeader> = Vec::with_capacity(count as usize);
    let mut parent = previous.clone();
    for i in 0..count {
        let header = BlockHeader::new(
            1,
            parent.hash,
            [0u8; 32],
            parent.timestamp + spacing,
            parent.bits,
            i,
        );
        parent = header.clone();
        headers.push(header);
    }
    headers
}

/// Peer that answers header requests from a fixed chain by queueing a
/// `Headers` event back to the coordinator.
pub struct ServingPeer {
    id: PeerId,
    quality: u32,
    start: Hash,
    chain: Vec<BlockHeader>,
    batch_size: usize,
    sender: OnceLock<PeerEventSender>,
    closed: Mutex<Option<String>>,
    served: Mutex<usize>,
}

impl ServingPeer {
    pub fn new(id: PeerId, quality: u32, start: Hash, chain: Vec<BlockHeader>, batch_size: usize) -> Self {
        Self {
            id,
            quality,
            start,
            chain,
            batch_size,
            sender: OnceLock::new(),
            closed: Mutex::new(None),
            served: Mutex::new(0),
        }
    }

    pub fn attach(&self, sender: PeerEventSender) {
        let _ = self.sender.set(sender);
    }

    pub fn closed_reason(&self) -> Option<String> {
        self.closed.lock().clone()
    }

    pub fn batches_served(&self) -> usize {
        *self.served.lock()
    }
}

impl SyncPeer for ServingPeer {
    fn id(&self) -> PeerId {
        self.id
    }

    fn is_ready(&self) -> bool {
        self.closed.lock().is_none()
    }

    fn quality(&self) -> u32 {
        self.quality
    }

    fn request_headers(&self, locator: Vec<Hash>) {
        let Some(tip) = locator.first() else {
            return;
        };
        let from = if *tip == self.start {
            0
        } else {
            match self.chain.iter().position(|h| &h.hash == tip) {
                Some(index) => index + 1,
                None => self.chain.len(),
            }
        };
        let end = (from + self.batch_size).min(self.chain.len());
        *self.served.lock() += 1;
        if let Some(sender) = self.sender.get() {
            sender.send(PeerEvent::Headers {
                peer: self.id,
                headers: self.chain[from..end].to_vec(),
            });
        }
    }

    fn close(&self, reason: &str) {
        *self.closed.lock() = Some(reason.to_string());
    }
}

/// Forwards exported checkpoints into a channel.
pub struct ChannelCheckpointListener {
    tx: mpsc::UnboundedSender<Vec<Checkpoint>>,
}

impl ChannelCheckpointListener {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Vec<Checkpoint>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl CheckpointListener for ChannelCheckpointListener {
    fn on_checkpoints(&self, checkpoints: &[Checkpoint]) {
        let _ = self.tx.send(checkpoints.to_vec());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_chain_links() {
        let genesis = BlockHeader::new(1, [0u8; 32], [0u8; 32], 1_000, REGTEST_BITS, 0);
        let chain = header_chain(&genesis, 3, 600);
        assert_eq!(chain[0].previous_block_hash, genesis.hash);
        assert_eq!(chain[2].previous_block_hash, chain[1].hash);
        assert_eq!(chain[2].timestamp, 2_800);
    }

    #[test]
    fn test_wallet_seeds_checkpoint() {
        let wallet = Wallet::new();
        assert_eq!(wallet.tip().height, 0);
        assert_eq!(wallet.tip().bits(), REGTEST_BITS);
    }
}
