//! # Wallet Sync Flow
//!
//! One download session through the kit: hash bookkeeping, merkle blocks,
//! filter staleness, progress and an aborted session.

#[cfg(test)]
mod tests {
    use shared_types::script::p2wpkh_script;
    use shared_types::{Hash, TransactionStatus};
    use spv_sync::ports::mocks::ListenerEvent;
    use spv_sync::{FilterStatus, Storage, SyncState};

    use crate::fixtures::{merkle_block, p2pkh_payment, payment, Wallet};

    #[test]
    fn test_download_session_reaches_synced() {
        let wallet = Wallet::new();
        let kit = &wallet.kit;
        kit.prepare_for_download().unwrap();

        let checkpoint = wallet.tip();
        let first = merkle_block(&checkpoint, checkpoint.timestamp() + 600, vec![]);
        let second_tx = p2pkh_payment(&wallet.key_hash(0), 20_000, 1);
        let second = merkle_block(
            &shared_types::Block::with_previous(first.header.clone(), &checkpoint),
            checkpoint.timestamp() + 1_200,
            vec![second_tx.clone()],
        );

        let announced: Vec<Hash> = vec![first.header.hash, second.header.hash];
        kit.syncer().add_block_hashes(&announced).unwrap();
        kit.syncer().add_block_hashes(&announced).unwrap();
        let pending: Vec<Hash> = kit.syncer().get_block_hashes().unwrap().iter().map(|h| h.header_hash).collect();
        assert_eq!(pending, announced);
        assert_eq!(kit.syncer().local_known_best_block_height().unwrap(), 2);

        kit.handle_merkle_block(first, 4).unwrap();
        assert_eq!(kit.sync_state(), SyncState::Syncing(0.25));
        let block = kit.handle_merkle_block(second, 2).unwrap();
        assert_eq!(block.height, 2);
        assert_eq!(kit.sync_state(), SyncState::Synced);

        assert_eq!(kit.download_iteration_completed().unwrap(), FilterStatus::Fresh);
        kit.syncer().download_completed().unwrap();

        assert!(kit.syncer().get_block_hashes().unwrap().is_empty());
        let stored = wallet.storage.transaction(&second_tx.header.hash).unwrap().unwrap();
        assert_eq!(stored.status, TransactionStatus::Relayed);
        assert_eq!(stored.block_hash, Some(block.header.hash));
        assert!(wallet.storage.block_by_hash(&block.header.hash).unwrap().unwrap().has_transactions);
        assert_eq!(kit.balance().unwrap().spendable, 20_000);
        assert!(wallet.listener.events().contains(&ListenerEvent::BlockInsert(2)));
    }

    #[test]
    fn test_stale_filter_repeats_iteration() {
        let wallet = Wallet::new();
        let kit = &wallet.kit;
        kit.prepare_for_download().unwrap();

        let checkpoint = wallet.tip();
        let witness = payment(p2wpkh_script(&wallet.key_hash(1)), 7_000, 2);
        let block = merkle_block(&checkpoint, checkpoint.timestamp() + 600, vec![witness]);
        kit.syncer().add_block_hashes(&[block.header.hash]).unwrap();

        kit.handle_merkle_block(block.clone(), 1).unwrap();
        assert!(kit.syncer().has_partial_blocks());
        // Pending hash kept so the block is fetched again with the new filter.
        assert_eq!(kit.syncer().get_block_hashes().unwrap().len(), 1);

        assert_eq!(kit.download_iteration_completed().unwrap(), FilterStatus::Stale);
        assert_eq!(wallet.bloom.regenerations(), 1);
        assert!(!kit.syncer().has_partial_blocks());
        assert_eq!(kit.download_iteration_completed().unwrap(), FilterStatus::Fresh);
        assert_eq!(wallet.bloom.regenerations(), 1);
    }

    #[test]
    fn test_aborted_session_recovers() {
        let wallet = Wallet::new();
        let kit = &wallet.kit;
        kit.prepare_for_download().unwrap();

        let checkpoint = wallet.tip();
        let witness = payment(p2wpkh_script(&wallet.key_hash(0)), 3_000, 3);
        let block = merkle_block(&checkpoint, checkpoint.timestamp() + 600, vec![witness]);
        kit.syncer().add_block_hashes(&[block.header.hash]).unwrap();
        kit.handle_merkle_block(block.clone(), 1).unwrap();

        // Session dies mid-iteration.
        assert_eq!(kit.syncer().download_failed().unwrap(), FilterStatus::Stale);
        assert!(wallet.storage.block_by_hash(&block.header.hash).unwrap().is_none());
        assert!(kit.syncer().get_block_hashes().unwrap().is_empty());
        assert_eq!(wallet.tip().height, 0);

        // A second prepare finds nothing left to undo.
        kit.prepare_for_download().unwrap();
        assert_eq!(wallet.tip().height, 0);
        assert!(wallet.keys.fill_gap_calls() >= 3);
    }
}
