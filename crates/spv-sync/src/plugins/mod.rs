//! # Plugin Registry
//!
//! Auxiliary script semantics keyed by a one-byte marker. The marker is
//! the opcode that prefixes the plugin's payload inside a null-data output:
//!
//! ```text
//! OP_RETURN <marker> <payload chunks...> [<marker> <payload chunks...>]
//! ```
//!
//! The registry is built once and is read-only afterwards. Plugin failures
//! never abort transaction processing: `PluginError::NotApplicable` is
//! skipped silently, anything else is logged and the output is treated as
//! plugin-less.

use std::collections::BTreeMap;
use std::sync::Arc;

use shared_types::script::OP_RETURN;
use shared_types::{parse_chunks, Chunk, FullTransaction, PublicKey, TransactionOutput, UnspentOutput};

use crate::domain::{MutableTransaction, PluginError};
use crate::ports::{AddressConverter, KeyManager, MedianTimeSource};

/// Decoded key/value parameters of one plugin.
pub type PluginData = BTreeMap<String, String>;

/// Caller-supplied parameters, per plugin id.
pub type PluginParams = BTreeMap<u8, PluginData>;

/// Lookups a plugin may need while reconstructing a received output.
pub struct PluginContext<'a> {
    pub keys: &'a dyn KeyManager,
    pub address_converter: &'a dyn AddressConverter,
}

/// Capability interface every plugin implements.
pub trait Plugin: Send + Sync {
    /// Marker byte; must be unique in the registry.
    fn id(&self) -> u8;

    /// Rewrite the outputs of an outgoing draft. Return
    /// `PluginError::NotApplicable` when `params` carry nothing for this
    /// plugin.
    fn process_outputs(
        &self,
        transaction: &mut MutableTransaction,
        params: &PluginData,
        address_converter: &dyn AddressConverter,
    ) -> Result<(), PluginError>;

    /// Consume this plugin's chunks from a null-data output and mark the
    /// matching outputs of a received transaction.
    fn process_transaction_with_null_data(
        &self,
        transaction: &mut FullTransaction,
        chunks: &mut dyn Iterator<Item = Chunk>,
        context: &PluginContext<'_>,
    ) -> Result<(), PluginError>;

    fn is_spendable(
        &self,
        unspent: &UnspentOutput,
        median_time: &dyn MedianTimeSource,
    ) -> Result<bool, PluginError>;

    /// Sequence number for an input spending `output`.
    fn input_sequence(&self, output: &TransactionOutput) -> Result<u32, PluginError>;

    fn parse_plugin_data(&self, output: &TransactionOutput) -> Result<PluginData, PluginError>;

    /// Extra addresses to watch when restoring `public_key`.
    fn keys_for_restore(
        &self,
        public_key: &PublicKey,
        address_converter: &dyn AddressConverter,
    ) -> Result<Vec<String>, PluginError>;
}

/// Builder for [`PluginRegistry`].
#[derive(Default)]
pub struct PluginRegistryBuilder {
    plugins: BTreeMap<u8, Arc<dyn Plugin>>,
}

impl PluginRegistryBuilder {
    /// Register a plugin; a later plugin with the same id replaces the
    /// earlier one.
    pub fn plugin(mut self, plugin: Arc<dyn Plugin>) -> Self {
        let id = plugin.id();
        if self.plugins.insert(id, plugin).is_some() {
            tracing::warn!(plugin_id = id, "[spv-sync] plugin id registered twice, keeping the last");
        }
        self
    }

    pub fn build(self, address_converter: Arc<dyn AddressConverter>) -> PluginRegistry {
        PluginRegistry {
            plugins: self.plugins,
            address_converter,
        }
    }
}

/// Immutable table of plugins.
pub struct PluginRegistry {
    plugins: BTreeMap<u8, Arc<dyn Plugin>>,
    address_converter: Arc<dyn AddressConverter>,
}

impl PluginRegistry {
    pub fn builder() -> PluginRegistryBuilder {
        PluginRegistryBuilder::default()
    }

    /// Registry with no plugins.
    pub fn empty(address_converter: Arc<dyn AddressConverter>) -> Self {
        Self::builder().build(address_converter)
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    pub fn contains(&self, id: u8) -> bool {
        self.plugins.contains_key(&id)
    }

    /// Let every plugin rewrite the draft's outputs.
    ///
    /// Unlike the receive path, errors here are returned: the user asked
    /// for a plugin feature and it must not silently be dropped.
    pub fn process_outputs(
        &self,
        transaction: &mut MutableTransaction,
        params: &PluginParams,
    ) -> Result<(), PluginError> {
        for (id, plugin) in &self.plugins {
            let Some(data) = params.get(id) else {
                continue;
            };
            match plugin.process_outputs(transaction, data, self.address_converter.as_ref()) {
                Ok(()) | Err(PluginError::NotApplicable) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Let the owning plugin of each spent output set the input sequence.
    pub fn process_inputs(&self, transaction: &mut MutableTransaction) -> Result<(), PluginError> {
        for input_to_sign in &mut transaction.inputs_to_sign {
            let Some(plugin) = input_to_sign
                .previous_output
                .plugin_id
                .and_then(|id| self.plugins.get(&id))
            else {
                continue;
            };
            input_to_sign.input.sequence = plugin.input_sequence(&input_to_sign.previous_output)?;
        }
        Ok(())
    }

    /// Dispatch a null-data output's payload to the plugins it names.
    pub fn process_transaction_with_null_data(
        &self,
        transaction: &mut FullTransaction,
        null_data_index: usize,
        keys: &dyn KeyManager,
    ) {
        let Some(output) = transaction.outputs.get(null_data_index) else {
            return;
        };
        let chunks = match parse_chunks(&output.lock_script) {
            Ok(chunks) => chunks,
            Err(e) => {
                tracing::debug!(error = %e, "[spv-sync] unparseable null-data output");
                return;
            }
        };

        let mut chunks = chunks.into_iter();
        match chunks.next() {
            Some(chunk) if chunk.opcode == OP_RETURN => {}
            _ => return,
        }

        let context = PluginContext {
            keys,
            address_converter: self.address_converter.as_ref(),
        };

        while let Some(marker) = chunks.next() {
            let Some(plugin) = self.plugins.get(&marker.opcode) else {
                break;
            };
            match plugin.process_transaction_with_null_data(transaction, &mut chunks, &context) {
                Ok(()) => {}
                Err(PluginError::NotApplicable) => break,
                Err(e) => {
                    tracing::warn!(
                        plugin_id = marker.opcode,
                        tx_hash = %transaction.header.hash_hex(),
                        error = %e,
                        "[spv-sync] malformed plugin data, skipping to next marker"
                    );
                }
            }
        }
    }

    /// Spendability per the owning plugin; `true` when no plugin owns the
    /// output or its data cannot be read.
    pub fn is_spendable(&self, unspent: &UnspentOutput, median_time: &dyn MedianTimeSource) -> bool {
        let Some(plugin) = self.owner(&unspent.output) else {
            return true;
        };
        match plugin.is_spendable(unspent, median_time) {
            Ok(spendable) => spendable,
            Err(e) => {
                tracing::warn!(
                    plugin_id = plugin.id(),
                    tx_hash = %unspent.transaction.hash_hex(),
                    error = %e,
                    "[spv-sync] cannot evaluate plugin spendability"
                );
                true
            }
        }
    }

    /// The owning plugin's decoded parameters, keyed by its id.
    pub fn parse_plugin_data(&self, output: &TransactionOutput) -> Option<PluginParams> {
        let plugin = self.owner(output)?;
        match plugin.parse_plugin_data(output) {
            Ok(data) => Some(BTreeMap::from([(plugin.id(), data)])),
            Err(e) => {
                tracing::debug!(plugin_id = plugin.id(), error = %e, "[spv-sync] plugin data unreadable");
                None
            }
        }
    }

    /// Extra addresses every plugin wants watched for `public_key`,
    /// deduplicated.
    pub fn keys_for_restore(&self, public_key: &PublicKey) -> Vec<String> {
        let mut keys: Vec<String> = Vec::new();
        for plugin in self.plugins.values() {
            match plugin.keys_for_restore(public_key, self.address_converter.as_ref()) {
                Ok(found) => {
                    for key in found {
                        if !keys.contains(&key) {
                            keys.push(key);
                        }
                    }
                }
                Err(PluginError::NotApplicable) => {}
                Err(e) => {
                    tracing::warn!(
                        plugin_id = plugin.id(),
                        path = %public_key.path,
                        error = %e,
                        "[spv-sync] restore keys unavailable"
                    );
                }
            }
        }
        keys
    }

    fn owner(&self, output: &TransactionOutput) -> Option<&Arc<dyn Plugin>> {
        output.plugin_id.and_then(|id| self.plugins.get(&id))
    }
}
