//! # Hodler Plugin
//!
//! [`Plugin`] implementation over [`LockTimeInterval`].

use shared_types::script::{p2pkh_script, push, OP_1, OP_CHECKSEQUENCEVERIFY, OP_DROP};
use shared_types::{hash160, Chunk, FullTransaction, PublicKey, ScriptType, TransactionOutput, UnspentOutput};
use spv_sync::{AddressConverter, MedianTimeSource, MutableTransaction, Plugin, PluginContext, PluginData, PluginError};

use crate::errors::HodlerError;
use crate::interval::LockTimeInterval;

/// Null-data marker of this plugin.
pub const HODLER_PLUGIN_ID: u8 = OP_1;

/// Parameter key carrying the interval name.
pub const PARAM_LOCK_TIME_INTERVAL: &str = "lock_time_interval";

/// Parameter key carrying the original P2PKH address.
pub const PARAM_ADDRESS: &str = "address";

/// Relative-timelock plugin.
#[derive(Debug, Default, Clone, Copy)]
pub struct HodlerPlugin;

impl HodlerPlugin {
    pub fn new() -> Self {
        Self
    }

    pub fn redeem_script(interval: LockTimeInterval, pubkey_hash: &[u8]) -> Vec<u8> {
        let sequence = interval.sequence().to_le_bytes();
        let mut script = push(&sequence[..3]);
        script.push(OP_CHECKSEQUENCEVERIFY);
        script.push(OP_DROP);
        script.extend_from_slice(&p2pkh_script(pubkey_hash));
        script
    }

    /// Stored as `"<interval value>|<address>"` on the locked output.
    fn encode_data(interval: LockTimeInterval, address: &str) -> String {
        format!("{}|{}", interval.value(), address)
    }

    fn decode_data(output: &TransactionOutput) -> Result<(LockTimeInterval, String), HodlerError> {
        let invalid = || HodlerError::InvalidPluginData(output.plugin_data.clone());
        let data = output.plugin_data.as_deref().ok_or_else(invalid)?;
        let (value, address) = data.split_once('|').ok_or_else(invalid)?;
        let interval = value
            .parse::<u16>()
            .ok()
            .and_then(LockTimeInterval::from_value)
            .ok_or_else(invalid)?;
        Ok((interval, address.to_string()))
    }

    fn next_data(chunks: &mut dyn Iterator<Item = Chunk>, what: &'static str) -> Result<Vec<u8>, HodlerError> {
        chunks
            .next()
            .and_then(|chunk| chunk.data)
            .ok_or(HodlerError::MissingChunk(what))
    }
}

impl Plugin for HodlerPlugin {
    fn id(&self) -> u8 {
        HODLER_PLUGIN_ID
    }

    fn process_outputs(
        &self,
        transaction: &mut MutableTransaction,
        params: &PluginData,
        address_converter: &dyn AddressConverter,
    ) -> Result<(), PluginError> {
        let Some(name) = params.get(PARAM_LOCK_TIME_INTERVAL) else {
            return Err(PluginError::NotApplicable);
        };
        let interval: LockTimeInterval = name.parse()?;

        let recipient = &transaction.recipient_address;
        if recipient.script_type != ScriptType::P2PKH {
            return Err(PluginError::UnsupportedAddress(format!(
                "{} is not a P2PKH address",
                recipient.string
            )));
        }

        let pubkey_hash = recipient.hash.clone();
        let script_hash = hash160(&Self::redeem_script(interval, &pubkey_hash));
        let locked = address_converter.convert(&script_hash, ScriptType::P2SH)?;
        tracing::debug!(
            interval = %interval,
            address = %locked.string,
            "[spv-hodler] payment locked"
        );

        transaction.recipient_address = locked;
        let mut data = push(&interval.to_bytes());
        data.extend_from_slice(&push(&pubkey_hash));
        transaction.add_plugin_data(HODLER_PLUGIN_ID, data);
        Ok(())
    }

    fn process_transaction_with_null_data(
        &self,
        transaction: &mut FullTransaction,
        chunks: &mut dyn Iterator<Item = Chunk>,
        context: &PluginContext<'_>,
    ) -> Result<(), PluginError> {
        let interval_data = Self::next_data(chunks, "lock time interval")?;
        let pubkey_hash = Self::next_data(chunks, "pubkey hash")?;
        let interval = LockTimeInterval::from_bytes(&interval_data)?;

        let redeem_script = Self::redeem_script(interval, &pubkey_hash);
        let script_hash = hash160(&redeem_script);

        let Some(output) = transaction
            .outputs
            .iter_mut()
            .find(|o| o.key_hash.as_deref() == Some(&script_hash[..]))
        else {
            return Ok(());
        };

        let address = context.address_converter.convert(&pubkey_hash, ScriptType::P2PKH)?;
        output.plugin_id = Some(HODLER_PLUGIN_ID);
        output.plugin_data = Some(Self::encode_data(interval, &address.string));

        if let Some(key) = context.keys.public_key_by_key_or_hash(&pubkey_hash) {
            output.redeem_script = Some(redeem_script);
            output.public_key_path = Some(key.path);
            transaction.header.is_mine = true;
        }
        Ok(())
    }

    /// Locked until the funding transaction's time plus the interval lies
    /// before the chain's median time past.
    fn is_spendable(&self, unspent: &UnspentOutput, median_time: &dyn MedianTimeSource) -> Result<bool, PluginError> {
        let Some(median_time_past) = median_time.median_time_past() else {
            return Ok(false);
        };
        let (interval, _) = Self::decode_data(&unspent.output)?;
        let unlock_time = unspent.transaction.timestamp + interval.seconds();
        Ok(unlock_time < u64::from(median_time_past))
    }

    fn input_sequence(&self, output: &TransactionOutput) -> Result<u32, PluginError> {
        let (interval, _) = Self::decode_data(output)?;
        Ok(interval.sequence())
    }

    fn parse_plugin_data(&self, output: &TransactionOutput) -> Result<PluginData, PluginError> {
        let (interval, address) = Self::decode_data(output)?;
        Ok(PluginData::from([
            (PARAM_LOCK_TIME_INTERVAL.to_string(), interval.name().to_string()),
            (PARAM_ADDRESS.to_string(), address),
        ]))
    }

    fn keys_for_restore(
        &self,
        public_key: &PublicKey,
        address_converter: &dyn AddressConverter,
    ) -> Result<Vec<String>, PluginError> {
        LockTimeInterval::ALL
            .into_iter()
            .map(|interval| -> Result<String, PluginError> {
                let script_hash = hash160(&Self::redeem_script(interval, &public_key.key_hash));
                Ok(address_converter.convert(&script_hash, ScriptType::P2SH)?.string)
            })
            .collect()
    }
}
