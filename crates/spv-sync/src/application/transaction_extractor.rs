//! # Transaction Extractor
//!
//! Derives ownership and bookkeeping fields of a transaction: script types,
//! key hashes, wallet key paths, addresses and the previous-output data of
//! inputs.

use std::sync::Arc;

use shared_types::{detect, hash160, FullTransaction, ScriptType};

use crate::domain::SpvError;
use crate::plugins::PluginRegistry;
use crate::ports::{AddressConverter, KeyManager, Storage};

/// Stateless extractor over the wallet's keys and stored outputs.
pub struct TransactionExtractor {
    storage: Arc<dyn Storage>,
    keys: Arc<dyn KeyManager>,
    address_converter: Arc<dyn AddressConverter>,
    plugins: Arc<PluginRegistry>,
}

impl TransactionExtractor {
    pub fn new(
        storage: Arc<dyn Storage>,
        keys: Arc<dyn KeyManager>,
        address_converter: Arc<dyn AddressConverter>,
        plugins: Arc<PluginRegistry>,
    ) -> Self {
        Self {
            storage,
            keys,
            address_converter,
            plugins,
        }
    }

    /// Classify every output, match it against wallet keys and hand any
    /// null-data output to the plugin registry.
    pub fn extract_outputs(&self, transaction: &mut FullTransaction) {
        let mut null_data_index = None;

        for output in &mut transaction.outputs {
            let (script_type, payload) = detect(&output.lock_script);
            output.script_type = script_type;
            output.key_hash = payload;

            let Some(payload) = output.key_hash.as_deref() else {
                continue;
            };
            let key = match script_type {
                ScriptType::P2PKH | ScriptType::P2PK | ScriptType::P2WPKH => {
                    self.keys.public_key_by_key_or_hash(payload)
                }
                ScriptType::P2SH => {
                    let key = self.keys.public_key_by_p2wpkh_script_hash(payload);
                    if key.is_some() {
                        output.script_type = ScriptType::P2WPKHSH;
                    }
                    key
                }
                ScriptType::NullData => {
                    null_data_index.get_or_insert(output.index as usize);
                    None
                }
                ScriptType::P2WSH | ScriptType::P2WPKHSH | ScriptType::Unknown => None,
            };

            if let Some(key) = key {
                output.public_key_path = Some(key.path);
                transaction.header.is_mine = true;
            }
        }

        if let Some(index) = null_data_index {
            self.plugins
                .process_transaction_with_null_data(transaction, index, self.keys.as_ref());
        }
    }

    /// Fill output addresses from their key or script hashes.
    pub fn extract_address(&self, transaction: &mut FullTransaction) {
        for output in &mut transaction.outputs {
            let Some(payload) = output.key_hash.as_deref() else {
                continue;
            };
            let converted = match output.script_type {
                ScriptType::P2PK => self.address_converter.convert(&hash160(payload), ScriptType::P2PKH),
                ScriptType::Unknown | ScriptType::NullData => continue,
                other => self.address_converter.convert(payload, other),
            };
            match converted {
                Ok(address) => output.address = Some(address.string),
                Err(e) => {
                    tracing::debug!(
                        tx_hash = %transaction.header.hash_hex(),
                        index = output.index,
                        error = %e,
                        "[spv-sync] output address unavailable"
                    );
                }
            }
        }
    }

    /// Copy key hash and address from each input's previous output.
    pub fn extract_inputs(&self, transaction: &mut FullTransaction) -> Result<(), SpvError> {
        for input in &mut transaction.inputs {
            if let Some(previous) = self.storage.previous_output(input)? {
                input.key_hash = previous.key_hash;
                input.address = previous.address;
            }
        }
        Ok(())
    }
}
