//! # Concurrent Relay
//!
//! The same transaction arriving through the block path and the mempool
//! path at once must be stored once and end up tied to its block.

#[cfg(test)]
mod tests {
    use std::thread;

    use shared_types::Hash;
    use spv_sync::ports::mocks::ListenerEvent;
    use spv_sync::Storage;

    use crate::fixtures::{merkle_block, p2pkh_payment, Wallet};

    fn insert_events(wallet: &Wallet, hash: &Hash) -> usize {
        wallet
            .listener
            .events()
            .iter()
            .filter(|e| matches!(e, ListenerEvent::TransactionsUpdate { inserted, .. } if inserted.contains(hash)))
            .count()
    }

    #[test]
    fn test_block_and_mempool_race_single_copy() {
        for round in 0..16u8 {
            let wallet = Wallet::new();
            let checkpoint = wallet.tip();
            let tx = p2pkh_payment(&wallet.key_hash(0), 9_000, round);
            let block = merkle_block(&checkpoint, checkpoint.timestamp() + 600, vec![tx.clone()]);
            let block_hash = block.header.hash;

            thread::scope(|s| {
                s.spawn(|| wallet.kit.handle_merkle_block(block, 1).unwrap());
                s.spawn(|| wallet.kit.handle_mempool_transactions(vec![tx.clone()]).unwrap());
            });

            assert_eq!(wallet.storage.transaction_count(), 1, "round {round}");
            let stored = wallet.storage.transaction(&tx.header.hash).unwrap().unwrap();
            assert_eq!(stored.block_hash, Some(block_hash), "round {round}");
            assert_eq!(insert_events(&wallet, &tx.header.hash), 1, "round {round}");
        }
    }

    #[test]
    fn test_many_peers_relay_same_transaction() {
        let wallet = Wallet::new();
        let tx = p2pkh_payment(&wallet.key_hash(2), 4_000, 42);

        thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| wallet.kit.handle_mempool_transactions(vec![tx.clone()]).unwrap());
            }
        });

        assert_eq!(wallet.storage.transaction_count(), 1);
        assert_eq!(insert_events(&wallet, &tx.header.hash), 1);
        assert_eq!(wallet.kit.processor().cached_outputs(), 1);
    }
}
