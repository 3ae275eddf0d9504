//! # Domain Entities
//!
//! Checkpoints and the mutable transaction draft that plugins rewrite
//! before it is signed.

use std::collections::BTreeMap;

use shared_types::script::{push, OP_RETURN};
use shared_types::{
    Block, BlockHeader, ByteReader, PublicKey, Transaction, TransactionInput, TransactionOutput,
    HEADER_SIZE,
};

use super::errors::ConfigError;
use super::value_objects::Address;

/// A trusted block used as a sync starting point.
///
/// Serialized as `header (80 bytes) || height (u32 LE)` in hex.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Checkpoint {
    pub block: Block,
}

impl Checkpoint {
    pub fn new(block: Block) -> Self {
        Self { block }
    }

    pub fn height(&self) -> u32 {
        self.block.height
    }

    pub fn from_hex(s: &str) -> Result<Self, ConfigError> {
        let bytes = hex::decode(s.trim()).map_err(|e| ConfigError::InvalidCheckpoint(e.to_string()))?;
        if bytes.len() != HEADER_SIZE + 4 {
            return Err(ConfigError::InvalidCheckpoint(format!(
                "expected {} bytes, got {}",
                HEADER_SIZE + 4,
                bytes.len()
            )));
        }

        let mut reader = ByteReader::new(&bytes);
        let header =
            BlockHeader::read(&mut reader).map_err(|e| ConfigError::InvalidCheckpoint(e.to_string()))?;
        let height = reader
            .read_u32()
            .map_err(|e| ConfigError::InvalidCheckpoint(e.to_string()))?;

        Ok(Self::new(Block::new(header, height)))
    }

    pub fn to_hex(&self) -> String {
        let mut bytes = self.block.header.serialize();
        bytes.extend_from_slice(&self.block.height.to_le_bytes());
        hex::encode(bytes)
    }
}

/// Checkpoints hard-coded for a network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkCheckpoints {
    /// Earliest block a BIP44 wallet can have used.
    pub bip44: Checkpoint,
    /// Most recent trusted block.
    pub last: Checkpoint,
}

/// An unspent wallet output as stored, before key and block resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnspentCandidate {
    pub output: TransactionOutput,
    pub transaction: Transaction,
}

/// An input picked for spending, with the output and key it unlocks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputToSign {
    pub input: TransactionInput,
    pub previous_output: TransactionOutput,
    pub public_key: PublicKey,
}

/// Transaction draft handed between the creator, plugins and the builder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutableTransaction {
    pub recipient_address: Address,
    pub recipient_value: u64,
    pub change_address: Option<Address>,
    pub change_value: u64,
    /// Satoshis per byte.
    pub fee_rate: u64,
    pub sender_pays: bool,
    pub inputs_to_sign: Vec<InputToSign>,
    plugin_data: BTreeMap<u8, Vec<u8>>,
}

impl MutableTransaction {
    pub fn new(recipient_address: Address, recipient_value: u64, fee_rate: u64, sender_pays: bool) -> Self {
        Self {
            recipient_address,
            recipient_value,
            change_address: None,
            change_value: 0,
            fee_rate,
            sender_pays,
            inputs_to_sign: Vec::new(),
            plugin_data: BTreeMap::new(),
        }
    }

    /// Attach a plugin's null-data payload (already push-encoded).
    pub fn add_plugin_data(&mut self, plugin_id: u8, data: Vec<u8>) {
        self.plugin_data.insert(plugin_id, data);
    }

    pub fn plugin_data(&self) -> &BTreeMap<u8, Vec<u8>> {
        &self.plugin_data
    }

    /// `OP_RETURN` followed by `marker || payload` for each plugin, or
    /// `None` when no plugin contributed data.
    pub fn null_data_script(&self) -> Option<Vec<u8>> {
        if self.plugin_data.is_empty() {
            return None;
        }
        let mut script = vec![OP_RETURN];
        for (id, data) in &self.plugin_data {
            script.push(*id);
            script.extend_from_slice(data);
        }
        Some(script)
    }

    /// Convenience for plugins that push a single element.
    pub fn pushed(data: &[u8]) -> Vec<u8> {
        push(data)
    }
}
