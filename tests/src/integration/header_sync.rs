//! # Header Sync
//!
//! The coordinator's worker task driving serving peers to a synced header
//! chain, including a peer that serves a broken chain.

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use shared_types::BlockHeader;
    use spv_sync::{Checkpoint, CoordinatorState, PeerEvent, PeerSyncCoordinator, SyncConfig};
    use tokio::time::timeout;

    use crate::fixtures::{header_chain, ChannelCheckpointListener, ServingPeer, Wallet};

    const BATCH: usize = 10;

    fn coordinator(wallet: &Wallet) -> (PeerSyncCoordinator, tokio::sync::mpsc::UnboundedReceiver<Vec<Checkpoint>>) {
        let (listener, rx) = ChannelCheckpointListener::new();
        let checkpoint = Checkpoint::new(wallet.kit.syncer().checkpoint().clone());
        let coordinator = PeerSyncCoordinator::new(checkpoint, &SyncConfig::for_testing(), Arc::new(listener));
        (coordinator, rx)
    }

    #[tokio::test]
    async fn test_single_peer_syncs_and_exports_checkpoints() {
        let wallet = Wallet::new();
        let genesis = wallet.tip();
        let chain = header_chain(&genesis.header, 25, 600);

        let (coordinator, mut checkpoints) = coordinator(&wallet);
        let coordinator = Arc::new(coordinator);
        let (sender, _worker) = coordinator.clone().spawn();

        let peer = Arc::new(ServingPeer::new(1, 5, genesis.header.hash, chain.clone(), BATCH));
        peer.attach(sender.clone());
        assert!(sender.send(PeerEvent::Connected(peer.clone())));

        let exported = timeout(Duration::from_secs(5), checkpoints.recv())
            .await
            .expect("synced in time")
            .expect("listener alive");

        assert_eq!(coordinator.state(), CoordinatorState::Synced);
        assert_eq!(coordinator.tip().header, chain[24]);
        assert_eq!(peer.batches_served(), 3);

        let heights: Vec<u32> = exported.iter().map(Checkpoint::height).collect();
        assert_eq!(heights, vec![0, 4, 8, 12, 16, 20, 24]);
        // Exported checkpoints seed a later session.
        let last = Checkpoint::from_hex(&exported[6].to_hex()).unwrap();
        assert_eq!(last.block.header, chain[23]);
    }

    #[tokio::test]
    async fn test_broken_chain_peer_replaced() {
        let wallet = Wallet::new();
        let genesis = wallet.tip();
        let honest_chain = header_chain(&genesis.header, 25, 600);

        let mut broken_chain = honest_chain.clone();
        broken_chain[15] = BlockHeader::new(1, [0xee; 32], [0u8; 32], 99, genesis.bits(), 0);

        let (coordinator, mut checkpoints) = coordinator(&wallet);
        let coordinator = Arc::new(coordinator);
        let (sender, _worker) = coordinator.clone().spawn();

        let liar = Arc::new(ServingPeer::new(1, 100, genesis.header.hash, broken_chain, BATCH));
        let honest = Arc::new(ServingPeer::new(2, 1, genesis.header.hash, honest_chain.clone(), BATCH));
        liar.attach(sender.clone());
        honest.attach(sender.clone());
        assert!(sender.send(PeerEvent::Connected(liar.clone())));
        assert!(sender.send(PeerEvent::Connected(honest.clone())));

        let exported = timeout(Duration::from_secs(5), checkpoints.recv())
            .await
            .expect("synced in time")
            .expect("listener alive");

        assert!(liar.closed_reason().is_some());
        assert_eq!(liar.batches_served(), 2);
        // Headers before the break are kept; the honest peer resumes after them.
        assert_eq!(honest.batches_served(), 2);
        assert_eq!(coordinator.tip().header, honest_chain[24]);
        assert_eq!(coordinator.candidate_peers(), Vec::<u64>::new());
        assert_eq!(exported.len(), 7);
    }

    #[test]
    fn test_sync_peer_disconnect_reassigns() {
        let wallet = Wallet::new();
        let genesis = wallet.tip();
        let chain = header_chain(&genesis.header, 5, 600);

        let (coordinator, _checkpoints) = coordinator(&wallet);
        // Silent peer: never answers.
        let silent = Arc::new(spv_sync::ports::mocks::MockPeer::new(1, 9));
        let backup = Arc::new(ServingPeer::new(2, 1, genesis.header.hash, chain.clone(), BATCH));

        coordinator.handle_event(PeerEvent::Connected(silent.clone()));
        coordinator.handle_event(PeerEvent::Connected(backup.clone()));
        assert_eq!(coordinator.sync_peer(), Some(1));

        coordinator.handle_event(PeerEvent::Disconnected(1));
        assert_eq!(coordinator.sync_peer(), Some(2));
        assert_eq!(backup.batches_served(), 1);

        // No sender attached: deliver the batch by hand.
        coordinator.handle_event(PeerEvent::Headers { peer: 2, headers: chain });
        assert_eq!(coordinator.state(), CoordinatorState::Synced);
    }
}
