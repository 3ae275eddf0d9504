//! # Hodler Flow
//!
//! Timelocked payments through a kit with the hodler plugin registered:
//! receiving a locked output, watching it unlock as the median time past
//! advances, and paying into a lock.

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Arc;

    use shared_types::script::{p2sh_script, push, OP_RETURN};
    use shared_types::{
        hash160, Block, FullTransaction, ScriptType, Transaction, TransactionInput, TransactionOutput,
    };
    use spv_hodler::{HodlerPlugin, LockTimeInterval, HODLER_PLUGIN_ID, PARAM_ADDRESS, PARAM_LOCK_TIME_INTERVAL};
    use spv_sync::ports::mocks::MockAddressConverter;
    use spv_sync::{AddressConverter, PaymentRequest, Plugin, PluginData, PluginParams, Storage};

    use crate::fixtures::{merkle_block, p2pkh_payment, Wallet};

    const DAY: u32 = 86_400;

    fn hodler_wallet() -> Wallet {
        let plugin: Arc<dyn Plugin> = Arc::new(HodlerPlugin);
        Wallet::with_plugins(vec![plugin])
    }

    /// Funding transaction paying `value` into a lock for `pubkey_hash`.
    fn locked_payment(interval: LockTimeInterval, pubkey_hash: &[u8], value: u64, nonce: u8) -> FullTransaction {
        let script_hash = hash160(&HodlerPlugin::redeem_script(interval, pubkey_hash));
        let mut null_data = vec![OP_RETURN, HODLER_PLUGIN_ID];
        null_data.extend_from_slice(&push(&interval.to_bytes()));
        null_data.extend_from_slice(&push(pubkey_hash));

        FullTransaction::new(
            Transaction::default(),
            vec![TransactionInput::new([nonce; 32], 0, 0xffff_ffff)],
            vec![
                TransactionOutput::new(value, 0, p2sh_script(&script_hash)),
                TransactionOutput::new(0, 1, null_data),
            ],
        )
    }

    /// Connect one block per timestamp, the first carrying `transactions`.
    fn mine(wallet: &Wallet, timestamps: &[u32], mut transactions: Vec<FullTransaction>) -> Block {
        let mut tip = wallet.tip();
        for &timestamp in timestamps {
            let block = merkle_block(&tip, timestamp, std::mem::take(&mut transactions));
            wallet.kit.syncer().add_block_hashes(&[block.header.hash]).unwrap();
            let height = tip.height + 1;
            tip = wallet.kit.handle_merkle_block(block, height).unwrap();
        }
        tip
    }

    fn lock_params(interval: &str) -> PluginParams {
        BTreeMap::from([(
            HODLER_PLUGIN_ID,
            PluginData::from([(PARAM_LOCK_TIME_INTERVAL.to_string(), interval.to_string())]),
        )])
    }

    #[test]
    fn test_locked_output_unlocks_after_interval() {
        let wallet = hodler_wallet();
        let kit = &wallet.kit;
        kit.prepare_for_download().unwrap();

        let funded_at = wallet.tip().timestamp() + 600;
        let funding = locked_payment(LockTimeInterval::Month, &wallet.key_hash(0), 50_000, 1);
        mine(&wallet, &[funded_at], vec![funding.clone()]);

        let stored = wallet.storage.full_transaction(&funding.header.hash).unwrap().unwrap();
        assert!(stored.header.is_mine);
        assert_eq!(stored.outputs[0].plugin_id, Some(HODLER_PLUGIN_ID));
        assert_eq!(stored.outputs[0].public_key_path.as_deref(), Some(wallet.keys.keys()[0].path.as_str()));
        assert_eq!(kit.balance().unwrap().spendable, 0);
        assert_eq!(kit.balance().unwrap().unspendable, 50_000);

        // A median time 29 days in still precedes the month lock.
        let early: Vec<u32> = (0..11).map(|i| funded_at + 29 * DAY + i * 60).collect();
        mine(&wallet, &early, vec![]);
        assert_eq!(kit.unspent_outputs().locked().unwrap().len(), 1);
        assert_eq!(kit.balance().unwrap().spendable, 0);

        let late: Vec<u32> = (0..11).map(|i| funded_at + 31 * DAY + i * 60).collect();
        mine(&wallet, &late, vec![]);
        assert!(kit.unspent_outputs().locked().unwrap().is_empty());
        assert_eq!(kit.balance().unwrap().spendable, 50_000);
    }

    #[test]
    fn test_foreign_lock_is_ignored() {
        let wallet = hodler_wallet();
        wallet.kit.prepare_for_download().unwrap();

        let funding = locked_payment(LockTimeInterval::Hour, &[0xab; 20], 10_000, 2);
        let funded_at = wallet.tip().timestamp() + 600;
        mine(&wallet, &[funded_at], vec![funding.clone()]);

        assert!(wallet.storage.transaction(&funding.header.hash).unwrap().is_none());
        assert_eq!(wallet.kit.balance().unwrap().unspendable, 0);
    }

    #[tokio::test]
    async fn test_payment_into_lock() {
        let wallet = hodler_wallet();
        let kit = &wallet.kit;
        kit.prepare_for_download().unwrap();

        let funded_at = wallet.tip().timestamp() + 600;
        mine(&wallet, &[funded_at], vec![p2pkh_payment(&wallet.key_hash(0), 100_000, 3)]);
        assert_eq!(kit.balance().unwrap().spendable, 100_000);

        let recipient = MockAddressConverter
            .convert(&wallet.key_hash(1), ScriptType::P2PKH)
            .unwrap();
        let request = PaymentRequest::new(recipient.string.clone(), 30_000, 1).with_plugin_params(lock_params("month"));
        let sent = kit.send(request).await.unwrap();

        let locked_hash = hash160(&HodlerPlugin::redeem_script(LockTimeInterval::Month, &wallet.key_hash(1)));
        let stored = wallet.storage.full_transaction(&sent.header.hash).unwrap().unwrap();
        let locked = stored
            .outputs
            .iter()
            .find(|o| o.key_hash.as_deref() == Some(&locked_hash[..]))
            .expect("locked output");
        assert_eq!(locked.value, 30_000);
        assert_eq!(locked.script_type, ScriptType::P2SH);
        assert_eq!(locked.plugin_id, Some(HODLER_PLUGIN_ID));

        let parsed = kit.plugins().parse_plugin_data(locked).unwrap();
        let data = &parsed[&HODLER_PLUGIN_ID];
        assert_eq!(data[PARAM_LOCK_TIME_INTERVAL], "month");
        assert_eq!(data[PARAM_ADDRESS], recipient.string);
        assert_eq!(wallet.sender.sends(), 1);
    }

    #[tokio::test]
    async fn test_lock_requires_p2pkh_recipient() {
        let wallet = hodler_wallet();
        wallet.kit.prepare_for_download().unwrap();
        let funded_at = wallet.tip().timestamp() + 600;
        mine(&wallet, &[funded_at], vec![p2pkh_payment(&wallet.key_hash(0), 100_000, 4)]);

        let script = MockAddressConverter.convert(&[0x11; 20], ScriptType::P2SH).unwrap();
        let request = PaymentRequest::new(script.string, 30_000, 1).with_plugin_params(lock_params("year"));
        assert!(wallet.kit.send(request).await.is_err());
        assert_eq!(wallet.sender.sends(), 0);
    }
}
