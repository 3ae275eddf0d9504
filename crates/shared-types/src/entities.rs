//! # Core Domain Entities
//!
//! Bitcoin-family chain and wallet records shared by every crate.
//!
//! ## Clusters
//!
//! - **Chain**: `BlockHeader`, `Block`, `BlockHash`, `MerkleBlock`
//! - **Transactions**: `Transaction`, `TransactionInput`, `TransactionOutput`,
//!   `FullTransaction`
//! - **Wallet**: `PublicKey`, `UnspentOutput`

use serde::{Deserialize, Serialize};

use crate::encoding::{ByteReader, ByteWriter};
use crate::errors::EncodingError;
use crate::hashing::{double_sha256, hash160, to_reversed_hex, Hash};
use crate::script::ScriptType;

/// Serialized size of a block header.
pub const HEADER_SIZE: usize = 80;

// =============================================================================
// CLUSTER A: THE CHAIN
// =============================================================================

/// An 80-byte block header plus its cached hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    pub version: i32,
    /// Hash of the parent header (chain linkage).
    pub previous_block_hash: Hash,
    pub merkle_root: Hash,
    /// Unix seconds.
    pub timestamp: u32,
    /// Compact difficulty target.
    pub bits: u32,
    pub nonce: u32,
    /// Double SHA-256 of the serialized header.
    pub hash: Hash,
}

impl BlockHeader {
    /// Build a header and compute its hash.
    pub fn new(
        version: i32,
        previous_block_hash: Hash,
        merkle_root: Hash,
        timestamp: u32,
        bits: u32,
        nonce: u32,
    ) -> Self {
        let mut header = Self {
            version,
            previous_block_hash,
            merkle_root,
            timestamp,
            bits,
            nonce,
            hash: [0u8; 32],
        };
        header.hash = double_sha256(&header.serialize());
        header
    }

    /// Little-endian wire form (80 bytes).
    pub fn serialize(&self) -> Vec<u8> {
        let mut writer = ByteWriter::with_capacity(HEADER_SIZE);
        writer.write_i32(self.version);
        writer.write_bytes(&self.previous_block_hash);
        writer.write_bytes(&self.merkle_root);
        writer.write_u32(self.timestamp);
        writer.write_u32(self.bits);
        writer.write_u32(self.nonce);
        writer.into_bytes()
    }

    /// Read a header from the reader, consuming exactly 80 bytes.
    pub fn read(reader: &mut ByteReader<'_>) -> Result<Self, EncodingError> {
        let version = reader.read_i32()?;
        let previous_block_hash = reader.read_array()?;
        let merkle_root = reader.read_array()?;
        let timestamp = reader.read_u32()?;
        let bits = reader.read_u32()?;
        let nonce = reader.read_u32()?;
        Ok(Self::new(
            version,
            previous_block_hash,
            merkle_root,
            timestamp,
            bits,
            nonce,
        ))
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Self, EncodingError> {
        let mut reader = ByteReader::new(bytes);
        let header = Self::read(&mut reader)?;
        reader.finish()?;
        Ok(header)
    }

    /// Display-order hex of the hash.
    pub fn hash_hex(&self) -> String {
        to_reversed_hex(&self.hash)
    }
}

/// A header accepted into the local chain.
///
/// `stale` marks blocks connected during the current sync session that have
/// not yet been confirmed by fork resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub header: BlockHeader,
    pub height: u32,
    /// One-way flag: set once any wallet transaction lands in the block.
    pub has_transactions: bool,
    pub stale: bool,
}

impl Block {
    pub fn new(header: BlockHeader, height: u32) -> Self {
        Self {
            header,
            height,
            has_transactions: false,
            stale: false,
        }
    }

    /// Child block one height above `previous`.
    pub fn with_previous(header: BlockHeader, previous: &Block) -> Self {
        Self::new(header, previous.height + 1)
    }

    pub fn hash(&self) -> &Hash {
        &self.header.hash
    }

    pub fn timestamp(&self) -> u32 {
        self.header.timestamp
    }

    pub fn bits(&self) -> u32 {
        self.header.bits
    }
}

/// A header hash requested from peers but not yet resolved to a block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHash {
    pub header_hash: Hash,
    /// Known only when announced with a height.
    pub height: Option<u32>,
    /// Monotonic insertion counter.
    pub sequence: u32,
}

impl BlockHash {
    pub fn new(header_hash: Hash, height: Option<u32>, sequence: u32) -> Self {
        Self {
            header_hash,
            height,
            sequence,
        }
    }
}

/// A filtered block: header plus the matched transactions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MerkleBlock {
    pub header: BlockHeader,
    pub associated_transaction_hashes: Vec<Hash>,
    pub associated_transactions: Vec<FullTransaction>,
    /// Assigned by the syncer once the height is known.
    pub height: Option<u32>,
}

impl MerkleBlock {
    pub fn new(header: BlockHeader, associated_transaction_hashes: Vec<Hash>) -> Self {
        Self {
            header,
            associated_transaction_hashes,
            associated_transactions: Vec::new(),
            height: None,
        }
    }

    pub fn block_hash(&self) -> &Hash {
        &self.header.hash
    }

    /// True once every proven transaction hash has arrived.
    pub fn complete(&self) -> bool {
        self.associated_transactions.len() >= self.associated_transaction_hashes.len()
    }
}

// =============================================================================
// CLUSTER B: TRANSACTIONS
// =============================================================================

/// Wallet-level lifecycle of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TransactionStatus {
    /// Created locally, not yet seen from the network.
    #[default]
    New,
    /// Announced back by a peer or included in a block.
    Relayed,
    Invalid,
}

/// Transaction header record as stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub hash: Hash,
    pub version: i32,
    pub lock_time: u32,
    /// Unix seconds: block time when confirmed, creation time otherwise.
    pub timestamp: u64,
    /// Position inside the containing block.
    pub order: u32,
    pub block_hash: Option<Hash>,
    pub is_mine: bool,
    pub is_outgoing: bool,
    pub segwit: bool,
    pub status: TransactionStatus,
}

impl Default for Transaction {
    fn default() -> Self {
        Self {
            hash: [0u8; 32],
            version: 1,
            lock_time: 0,
            timestamp: 0,
            order: 0,
            block_hash: None,
            is_mine: false,
            is_outgoing: false,
            segwit: false,
            status: TransactionStatus::New,
        }
    }
}

impl Transaction {
    pub fn hash_hex(&self) -> String {
        to_reversed_hex(&self.hash)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TransactionInput {
    pub previous_output_tx_hash: Hash,
    pub previous_output_index: u32,
    pub sig_script: Vec<u8>,
    pub sequence: u32,
    pub witness: Vec<Vec<u8>>,
    /// Owning transaction, filled by `FullTransaction::set_hashes`.
    pub transaction_hash: Hash,
    pub key_hash: Option<Vec<u8>>,
    pub address: Option<String>,
}

impl TransactionInput {
    pub fn new(previous_output_tx_hash: Hash, previous_output_index: u32, sequence: u32) -> Self {
        Self {
            previous_output_tx_hash,
            previous_output_index,
            sequence,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TransactionOutput {
    /// Satoshis.
    pub value: u64,
    pub index: u32,
    pub lock_script: Vec<u8>,
    pub transaction_hash: Hash,
    pub script_type: ScriptType,
    pub key_hash: Option<Vec<u8>>,
    pub address: Option<String>,
    /// Keychain path of the wallet key this output pays to.
    pub public_key_path: Option<String>,
    pub redeem_script: Option<Vec<u8>>,
    pub plugin_id: Option<u8>,
    pub plugin_data: Option<String>,
}

impl TransactionOutput {
    pub fn new(value: u64, index: u32, lock_script: Vec<u8>) -> Self {
        Self {
            value,
            index,
            lock_script,
            ..Self::default()
        }
    }

    pub fn is_mine(&self) -> bool {
        self.public_key_path.is_some()
    }
}

/// Transaction record with its inputs and outputs.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FullTransaction {
    pub header: Transaction,
    pub inputs: Vec<TransactionInput>,
    pub outputs: Vec<TransactionOutput>,
}

impl FullTransaction {
    /// Build and hash.
    pub fn new(
        header: Transaction,
        inputs: Vec<TransactionInput>,
        outputs: Vec<TransactionOutput>,
    ) -> Self {
        let mut tx = Self {
            header,
            inputs,
            outputs,
        };
        tx.set_hashes();
        tx
    }

    pub fn hash(&self) -> &Hash {
        &self.header.hash
    }

    /// Recompute the txid and propagate it to inputs and outputs.
    ///
    /// Must be called after any field that takes part in serialization
    /// changes.
    pub fn set_hashes(&mut self) {
        let hash = double_sha256(&self.serialize_without_witness());
        self.header.hash = hash;
        for input in &mut self.inputs {
            input.transaction_hash = hash;
        }
        for (index, output) in self.outputs.iter_mut().enumerate() {
            output.transaction_hash = hash;
            output.index = index as u32;
        }
    }

    /// Legacy serialization. The txid is computed over this form.
    pub fn serialize_without_witness(&self) -> Vec<u8> {
        self.write(false)
    }

    /// Wire form; BIP144 when the transaction is segwit.
    pub fn serialize(&self) -> Vec<u8> {
        self.write(self.header.segwit)
    }

    fn write(&self, with_witness: bool) -> Vec<u8> {
        let mut writer = ByteWriter::new();
        writer.write_i32(self.header.version);
        if with_witness {
            writer.write_u8(0x00);
            writer.write_u8(0x01);
        }
        writer.write_var_int(self.inputs.len() as u64);
        for input in &self.inputs {
            writer.write_bytes(&input.previous_output_tx_hash);
            writer.write_u32(input.previous_output_index);
            writer.write_var_bytes(&input.sig_script);
            writer.write_u32(input.sequence);
        }
        writer.write_var_int(self.outputs.len() as u64);
        for output in &self.outputs {
            writer.write_u64(output.value);
            writer.write_var_bytes(&output.lock_script);
        }
        if with_witness {
            for input in &self.inputs {
                writer.write_var_int(input.witness.len() as u64);
                for item in &input.witness {
                    writer.write_var_bytes(item);
                }
            }
        }
        writer.write_u32(self.header.lock_time);
        writer.into_bytes()
    }

    pub fn read(reader: &mut ByteReader<'_>) -> Result<Self, EncodingError> {
        let version = reader.read_i32()?;

        let mut segwit = false;
        if reader.peek_u8()? == 0x00 {
            reader.read_u8()?;
            let flag = reader.read_u8()?;
            if flag != 0x01 {
                return Err(EncodingError::InvalidSegwitFlag(flag));
            }
            segwit = true;
        }

        let input_count = reader.read_length()?;
        let mut inputs = Vec::with_capacity(input_count);
        for _ in 0..input_count {
            let previous_output_tx_hash = reader.read_array()?;
            let previous_output_index = reader.read_u32()?;
            let sig_script = reader.read_var_bytes()?;
            let sequence = reader.read_u32()?;
            inputs.push(TransactionInput {
                sig_script,
                ..TransactionInput::new(previous_output_tx_hash, previous_output_index, sequence)
            });
        }

        let output_count = reader.read_length()?;
        let mut outputs = Vec::with_capacity(output_count);
        for index in 0..output_count {
            let value = reader.read_u64()?;
            let lock_script = reader.read_var_bytes()?;
            outputs.push(TransactionOutput::new(value, index as u32, lock_script));
        }

        if segwit {
            for input in &mut inputs {
                let items = reader.read_length()?;
                for _ in 0..items {
                    input.witness.push(reader.read_var_bytes()?);
                }
            }
        }

        let lock_time = reader.read_u32()?;

        let header = Transaction {
            version,
            lock_time,
            segwit,
            ..Transaction::default()
        };
        Ok(Self::new(header, inputs, outputs))
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Self, EncodingError> {
        let mut reader = ByteReader::new(bytes);
        let tx = Self::read(&mut reader)?;
        reader.finish()?;
        Ok(tx)
    }
}

// =============================================================================
// CLUSTER C: WALLET
// =============================================================================

/// A wallet-derived key. Ownership is tested by comparing hashes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicKey {
    /// `account/external/index`, e.g. `0/1/5`.
    pub path: String,
    pub account: u32,
    pub index: u32,
    pub external: bool,
    pub raw: Vec<u8>,
    pub key_hash: [u8; 20],
    /// HASH160 of the P2WPKH script, used for P2WPKH-in-P2SH matching.
    pub script_hash_for_p2wpkh: [u8; 20],
}

impl PublicKey {
    pub fn new(account: u32, index: u32, external: bool, raw: Vec<u8>) -> Self {
        let key_hash = hash160(&raw);
        let script_hash_for_p2wpkh = hash160(&crate::script::p2wpkh_script(&key_hash));
        Self {
            path: format!("{}/{}/{}", account, if external { 1 } else { 0 }, index),
            account,
            index,
            external,
            raw,
            key_hash,
            script_hash_for_p2wpkh,
        }
    }
}

/// A wallet output available to spend, with its owning transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnspentOutput {
    pub output: TransactionOutput,
    pub public_key: PublicKey,
    pub transaction: Transaction,
    pub block: Option<Block>,
}
