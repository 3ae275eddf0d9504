//! # Port Mocks
//!
//! In-process implementations of the outbound ports for tests and demos.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use shared_types::script::{p2pkh_script, p2sh_script, p2wpkh_script};
use shared_types::{
    Block, FullTransaction, Hash, PublicKey, ScriptType, Transaction, TransactionInput,
    TransactionOutput, UnspentOutput,
};

use super::outbound::{
    AddressConverter, BlockchainDataListener, BloomFilterManager, CheckpointListener,
    KeyManager, MedianTimeSource, PeerId, SyncPeer, SyncStateListener, TransactionBuilder,
    TransactionSender,
};
use crate::domain::{Address, AddressError, Checkpoint, InputToSign, MutableTransaction, SpvError};

/// Address converter with a readable `<type>:<hex>` format.
#[derive(Debug, Default, Clone, Copy)]
pub struct MockAddressConverter;

impl MockAddressConverter {
    fn prefix(script_type: ScriptType) -> Option<&'static str> {
        match script_type {
            ScriptType::P2PKH | ScriptType::P2PK => Some("pkh"),
            ScriptType::P2SH | ScriptType::P2WPKHSH => Some("sh"),
            ScriptType::P2WPKH => Some("wpkh"),
            ScriptType::P2WSH => Some("wsh"),
            ScriptType::Unknown | ScriptType::NullData => None,
        }
    }
}

impl AddressConverter for MockAddressConverter {
    fn convert(&self, hash: &[u8], script_type: ScriptType) -> Result<Address, AddressError> {
        let prefix = Self::prefix(script_type)
            .ok_or_else(|| AddressError(format!("no address form for {:?}", script_type)))?;
        Ok(Address {
            string: format!("{}:{}", prefix, hex::encode(hash)),
            script_type,
            hash: hash.to_vec(),
        })
    }

    fn parse(&self, address: &str) -> Result<Address, AddressError> {
        let (prefix, body) = address
            .split_once(':')
            .ok_or_else(|| AddressError(address.to_string()))?;
        let script_type = match prefix {
            "pkh" => ScriptType::P2PKH,
            "sh" => ScriptType::P2SH,
            "wpkh" => ScriptType::P2WPKH,
            "wsh" => ScriptType::P2WSH,
            _ => return Err(AddressError(address.to_string())),
        };
        let hash = hex::decode(body).map_err(|e| AddressError(e.to_string()))?;
        Ok(Address {
            string: address.to_string(),
            script_type,
            hash,
        })
    }
}

/// Key manager over a fixed key list.
#[derive(Debug, Default)]
pub struct MockKeyManager {
    keys: RwLock<Vec<PublicKey>>,
    gap_shifts: AtomicBool,
    fill_gap_calls: AtomicUsize,
}

impl MockKeyManager {
    pub fn with_keys(keys: Vec<PublicKey>) -> Self {
        Self {
            keys: RwLock::new(keys),
            ..Self::default()
        }
    }

    /// Wallet with `count` external keys of account 0.
    pub fn generate(count: u32) -> Self {
        let keys = (0..count)
            .map(|index| {
                let mut raw = vec![0x02u8; 33];
                raw[1..5].copy_from_slice(&index.to_le_bytes());
                PublicKey::new(0, index, true, raw)
            })
            .collect();
        Self::with_keys(keys)
    }

    pub fn keys(&self) -> Vec<PublicKey> {
        self.keys.read().clone()
    }

    pub fn set_gap_shifts(&self, value: bool) {
        self.gap_shifts.store(value, Ordering::SeqCst);
    }

    pub fn fill_gap_calls(&self) -> usize {
        self.fill_gap_calls.load(Ordering::SeqCst)
    }
}

impl KeyManager for MockKeyManager {
    fn public_key_by_key_or_hash(&self, bytes: &[u8]) -> Option<PublicKey> {
        self.keys
            .read()
            .iter()
            .find(|k| k.raw == bytes || k.key_hash == bytes)
            .cloned()
    }

    fn public_key_by_p2wpkh_script_hash(&self, hash: &[u8]) -> Option<PublicKey> {
        self.keys
            .read()
            .iter()
            .find(|k| k.script_hash_for_p2wpkh == hash)
            .cloned()
    }

    fn public_key_by_path(&self, path: &str) -> Option<PublicKey> {
        self.keys.read().iter().find(|k| k.path == path).cloned()
    }

    fn fill_gap(&self) -> Result<(), SpvError> {
        self.fill_gap_calls.fetch_add(1, Ordering::SeqCst);
        self.gap_shifts.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn gap_shifts(&self) -> bool {
        self.gap_shifts.load(Ordering::SeqCst)
    }
}

/// Constant median time past.
#[derive(Debug, Clone, Copy)]
pub struct FixedMedianTime(pub Option<u32>);

impl MedianTimeSource for FixedMedianTime {
    fn median_time_past(&self) -> Option<u32> {
        self.0
    }
}

/// Counts filter rebuilds.
#[derive(Debug, Default)]
pub struct MockBloomFilterManager {
    regenerations: AtomicUsize,
}

impl MockBloomFilterManager {
    pub fn regenerations(&self) -> usize {
        self.regenerations.load(Ordering::SeqCst)
    }
}

impl BloomFilterManager for MockBloomFilterManager {
    fn regenerate(&self) {
        self.regenerations.fetch_add(1, Ordering::SeqCst);
    }
}

/// Listener events in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum ListenerEvent {
    SyncStart,
    SyncStop,
    SyncFinish,
    InitialHeight(u32),
    CurrentHeight { height: u32, max: u32 },
    TransactionsUpdate { inserted: Vec<Hash>, updated: Vec<Hash>, block: Option<Hash> },
    TransactionsDelete(Vec<String>),
    BlockInsert(u32),
    Checkpoints(Vec<u32>),
}

/// Records every callback of the listener ports.
#[derive(Debug, Default)]
pub struct RecordingListener {
    events: Mutex<Vec<ListenerEvent>>,
}

impl RecordingListener {
    pub fn events(&self) -> Vec<ListenerEvent> {
        self.events.lock().clone()
    }

    fn push(&self, event: ListenerEvent) {
        self.events.lock().push(event);
    }
}

impl SyncStateListener for RecordingListener {
    fn on_sync_start(&self) {
        self.push(ListenerEvent::SyncStart);
    }

    fn on_sync_stop(&self) {
        self.push(ListenerEvent::SyncStop);
    }

    fn on_sync_finish(&self) {
        self.push(ListenerEvent::SyncFinish);
    }

    fn on_initial_best_block_height_update(&self, height: u32) {
        self.push(ListenerEvent::InitialHeight(height));
    }

    fn on_current_best_block_height_update(&self, height: u32, max_block_height: u32) {
        self.push(ListenerEvent::CurrentHeight {
            height,
            max: max_block_height,
        });
    }
}

impl BlockchainDataListener for RecordingListener {
    fn on_transactions_update(&self, inserted: &[Transaction], updated: &[Transaction], block: Option<&Block>) {
        self.push(ListenerEvent::TransactionsUpdate {
            inserted: inserted.iter().map(|t| t.hash).collect(),
            updated: updated.iter().map(|t| t.hash).collect(),
            block: block.map(|b| b.header.hash),
        });
    }

    fn on_transactions_delete(&self, hashes: &[String]) {
        self.push(ListenerEvent::TransactionsDelete(hashes.to_vec()));
    }

    fn on_block_insert(&self, block: &Block) {
        self.push(ListenerEvent::BlockInsert(block.height));
    }
}

impl CheckpointListener for RecordingListener {
    fn on_checkpoints(&self, checkpoints: &[Checkpoint]) {
        self.push(ListenerEvent::Checkpoints(
            checkpoints.iter().map(Checkpoint::height).collect(),
        ));
    }
}

/// Peer that records header requests.
#[derive(Debug)]
pub struct MockPeer {
    id: PeerId,
    quality: u32,
    ready: AtomicBool,
    requests: Mutex<Vec<Vec<Hash>>>,
    closed: Mutex<Option<String>>,
}

impl MockPeer {
    pub fn new(id: PeerId, quality: u32) -> Self {
        Self {
            id,
            quality,
            ready: AtomicBool::new(true),
            requests: Mutex::new(Vec::new()),
            closed: Mutex::new(None),
        }
    }

    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }

    pub fn requests(&self) -> Vec<Vec<Hash>> {
        self.requests.lock().clone()
    }

    pub fn closed_reason(&self) -> Option<String> {
        self.closed.lock().clone()
    }
}

impl SyncPeer for MockPeer {
    fn id(&self) -> PeerId {
        self.id
    }

    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst) && self.closed.lock().is_none()
    }

    fn quality(&self) -> u32 {
        self.quality
    }

    fn request_headers(&self, locator: Vec<Hash>) {
        self.requests.lock().push(locator);
    }

    fn close(&self, reason: &str) {
        *self.closed.lock() = Some(reason.to_string());
    }
}

/// Greedy input selection; "signs" by leaving scripts empty.
#[derive(Debug, Default)]
pub struct MockTransactionBuilder;

impl TransactionBuilder for MockTransactionBuilder {
    fn select_inputs(
        &self,
        transaction: &mut MutableTransaction,
        unspent: &[UnspentOutput],
    ) -> Result<(), SpvError> {
        let fee = transaction.fee_rate * 226;
        let needed = transaction.recipient_value + if transaction.sender_pays { fee } else { 0 };
        let mut total = 0u64;
        for candidate in unspent {
            if total >= needed {
                break;
            }
            total += candidate.output.value;
            transaction.inputs_to_sign.push(InputToSign {
                input: TransactionInput::new(candidate.output.transaction_hash, candidate.output.index, 0xffff_ffff),
                previous_output: candidate.output.clone(),
                public_key: candidate.public_key.clone(),
            });
        }
        if total < needed {
            return Err(SpvError::TransactionBuild(format!(
                "insufficient funds: {} < {}",
                total, needed
            )));
        }
        transaction.change_value = total - needed;
        Ok(())
    }

    fn build(&self, transaction: MutableTransaction) -> Result<FullTransaction, SpvError> {
        let recipient_script = match transaction.recipient_address.script_type {
            ScriptType::P2PKH => p2pkh_script(&transaction.recipient_address.hash),
            ScriptType::P2SH => p2sh_script(&transaction.recipient_address.hash),
            ScriptType::P2WPKH => p2wpkh_script(&transaction.recipient_address.hash),
            other => {
                return Err(SpvError::TransactionBuild(format!("cannot pay to {:?}", other)));
            }
        };

        let mut outputs = vec![TransactionOutput::new(transaction.recipient_value, 0, recipient_script)];
        if let (Some(change), true) = (&transaction.change_address, transaction.change_value > 0) {
            outputs.push(TransactionOutput::new(transaction.change_value, 1, p2pkh_script(&change.hash)));
        }
        if let Some(null_data) = transaction.null_data_script() {
            outputs.push(TransactionOutput::new(0, outputs.len() as u32, null_data));
        }

        let inputs = transaction.inputs_to_sign.into_iter().map(|i| i.input).collect();
        let header = Transaction {
            is_mine: true,
            is_outgoing: true,
            ..Transaction::default()
        };
        Ok(FullTransaction::new(header, inputs, outputs))
    }
}

/// Sender that counts calls and optionally fails.
#[derive(Debug, Default)]
pub struct MockTransactionSender {
    pub fail: bool,
    sends: AtomicUsize,
}

impl MockTransactionSender {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn sends(&self) -> usize {
        self.sends.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TransactionSender for MockTransactionSender {
    async fn send_pending_transactions(&self) -> Result<(), SpvError> {
        self.sends.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(SpvError::SendFailed("no peers".to_string()));
        }
        Ok(())
    }
}
