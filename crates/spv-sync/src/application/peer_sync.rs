//! # Peer Sync Coordinator
//!
//! Picks one sync peer among the connected peers, pulls header batches from
//! it and checks that every header extends the current tip.
//!
//! ```text
//! NoSyncPeer --connect/ready--> AssigningSyncPeer --ready peer--> Downloading
//!     ^                                 |                             |
//!     |                       all peers synced                 short batch:
//!     +---- disconnect / linkage mismatch ----+                 peer synced,
//!                                             |                 reassign
//!                                           Synced <-------------+
//! ```
//!
//! Events are applied one at a time under a single lock. [`spawn`] runs
//! them on one worker task in arrival order; [`handle_event`] applies an
//! event synchronously.
//!
//! [`spawn`]: PeerSyncCoordinator::spawn
//! [`handle_event`]: PeerSyncCoordinator::handle_event

use std::sync::Arc;

use parking_lot::Mutex;
use shared_types::{Block, BlockHeader, Hash};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::algorithms::{find_linkage_mismatch, is_full_batch};
use crate::config::SyncConfig;
use crate::domain::{Checkpoint, HeaderBatchOutcome};
use crate::ports::{CheckpointListener, HeaderBatch, PeerId, SyncPeer};

/// Input to the coordinator.
pub enum PeerEvent {
    Connected(Arc<dyn SyncPeer>),
    Disconnected(PeerId),
    Ready(PeerId),
    Headers { peer: PeerId, headers: HeaderBatch },
}

/// Coordinator state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinatorState {
    NoSyncPeer,
    AssigningSyncPeer,
    Downloading(PeerId),
    Synced,
}

struct PeerEntry {
    peer: Arc<dyn SyncPeer>,
    synced: bool,
}

struct Session {
    peers: Vec<PeerEntry>,
    sync_peer: Option<PeerId>,
    state: CoordinatorState,
    tip: Block,
    checkpoints: Vec<Checkpoint>,
}

impl Session {
    fn entry(&self, id: PeerId) -> Option<&PeerEntry> {
        self.peers.iter().find(|e| e.peer.id() == id)
    }

    fn entry_mut(&mut self, id: PeerId) -> Option<&mut PeerEntry> {
        self.peers.iter_mut().find(|e| e.peer.id() == id)
    }
}

/// Sender half of a spawned coordinator's event queue.
#[derive(Clone)]
pub struct PeerEventSender {
    tx: mpsc::UnboundedSender<PeerEvent>,
}

impl PeerEventSender {
    /// Queue an event; returns `false` once the worker has stopped.
    pub fn send(&self, event: PeerEvent) -> bool {
        self.tx.send(event).is_ok()
    }
}

/// Header-sync coordinator with checkpoint collection.
pub struct PeerSyncCoordinator {
    session: Mutex<Session>,
    header_batch_size: usize,
    checkpoint_interval: u32,
    listener: Arc<dyn CheckpointListener>,
}

impl PeerSyncCoordinator {
    /// Start from `checkpoint`, which is also the first exported checkpoint.
    pub fn new(checkpoint: Checkpoint, config: &SyncConfig, listener: Arc<dyn CheckpointListener>) -> Self {
        let session = Session {
            peers: Vec::new(),
            sync_peer: None,
            state: CoordinatorState::NoSyncPeer,
            tip: checkpoint.block.clone(),
            checkpoints: vec![checkpoint],
        };
        Self {
            session: Mutex::new(session),
            header_batch_size: config.header_batch_size,
            checkpoint_interval: config.checkpoint_interval,
            listener,
        }
    }

    /// Run events on a dedicated worker task. The worker stops when every
    /// sender is dropped.
    pub fn spawn(self: Arc<Self>) -> (PeerEventSender, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                self.handle_event(event);
            }
            tracing::debug!("[spv-sync] peer event queue closed");
        });
        (PeerEventSender { tx }, handle)
    }

    pub fn handle_event(&self, event: PeerEvent) {
        let mut session = self.session.lock();
        match event {
            PeerEvent::Connected(peer) => {
                let id = peer.id();
                if session.entry(id).is_none() {
                    tracing::debug!(peer_id = id, "[spv-sync] peer connected");
                    session.peers.push(PeerEntry { peer, synced: false });
                }
                self.assign_next_sync_peer(&mut session);
            }
            PeerEvent::Disconnected(id) => {
                session.peers.retain(|e| e.peer.id() != id);
                if session.sync_peer == Some(id) {
                    tracing::info!(peer_id = id, "[spv-sync] sync peer disconnected");
                    session.sync_peer = None;
                    session.state = CoordinatorState::NoSyncPeer;
                    self.assign_next_sync_peer(&mut session);
                }
            }
            PeerEvent::Ready(id) => {
                if session.sync_peer == Some(id) {
                    self.download(&mut session);
                } else if session.sync_peer.is_none() {
                    self.assign_next_sync_peer(&mut session);
                }
            }
            PeerEvent::Headers { peer, headers } => {
                if session.sync_peer != Some(peer) {
                    tracing::debug!(peer_id = peer, "[spv-sync] headers from non-sync peer ignored");
                    return;
                }
                let outcome = self.validate_headers(&mut session, peer, &headers);
                tracing::debug!(peer_id = peer, ?outcome, tip = session.tip.height, "[spv-sync] header batch");
                if let HeaderBatchOutcome::Accepted { .. } = outcome {
                    self.download(&mut session);
                }
            }
        }
    }

    pub fn state(&self) -> CoordinatorState {
        self.session.lock().state
    }

    pub fn sync_peer(&self) -> Option<PeerId> {
        self.session.lock().sync_peer
    }

    /// Tip of the validated header chain.
    pub fn tip(&self) -> Block {
        self.session.lock().tip.clone()
    }

    pub fn checkpoints(&self) -> Vec<Checkpoint> {
        self.session.lock().checkpoints.clone()
    }

    /// Connected peers still eligible as sync peer.
    pub fn candidate_peers(&self) -> Vec<PeerId> {
        self.session
            .lock()
            .peers
            .iter()
            .filter(|e| !e.synced)
            .map(|e| e.peer.id())
            .collect()
    }

    /// Apply a batch from the sync peer. Headers are applied up to the first
    /// one that does not link; the peer is then dropped.
    fn validate_headers(&self, session: &mut Session, peer: PeerId, headers: &HeaderBatch) -> HeaderBatchOutcome {
        let mismatch = find_linkage_mismatch(&session.tip.header.hash, headers);
        let linked = mismatch.unwrap_or(headers.len());
        self.apply_headers(session, &headers[..linked]);

        if let Some(index) = mismatch {
            tracing::warn!(
                peer_id = peer,
                index,
                tip = session.tip.height,
                "[spv-sync] header does not extend tip, dropping sync peer"
            );
            if let Some(entry) = session.entry(peer) {
                entry.peer.close("chain linkage mismatch");
            }
            session.peers.retain(|e| e.peer.id() != peer);
            session.sync_peer = None;
            session.state = CoordinatorState::NoSyncPeer;
            self.assign_next_sync_peer(session);
            return HeaderBatchOutcome::LinkageMismatch { index };
        }

        let peer_synced = !is_full_batch(headers, self.header_batch_size);
        if peer_synced {
            if let Some(entry) = session.entry_mut(peer) {
                entry.synced = true;
            }
        }
        HeaderBatchOutcome::Accepted {
            count: headers.len(),
            peer_synced,
        }
    }

    /// Extend the tip with already linked headers, recording checkpoints.
    fn apply_headers(&self, session: &mut Session, headers: &[BlockHeader]) {
        for header in headers {
            let block = Block::with_previous(header.clone(), &session.tip);
            if block.height % self.checkpoint_interval == 0 {
                tracing::info!(
                    height = block.height,
                    hash = %block.header.hash_hex(),
                    "[spv-sync] checkpoint block"
                );
                session.checkpoints.push(Checkpoint::new(block.clone()));
            }
            session.tip = block;
        }
    }

    fn assign_next_sync_peer(&self, session: &mut Session) {
        if !session.peers.is_empty() && session.peers.iter().all(|e| e.synced) {
            if session.state != CoordinatorState::Synced {
                session.state = CoordinatorState::Synced;
                session.sync_peer = None;
                tracing::info!(
                    height = session.tip.height,
                    checkpoints = session.checkpoints.len(),
                    "[spv-sync] headers synced"
                );
                self.listener.on_checkpoints(&session.checkpoints);
            }
            return;
        }

        if session.sync_peer.is_some() {
            return;
        }

        session.state = CoordinatorState::AssigningSyncPeer;
        let mut candidates: Vec<&PeerEntry> = session.peers.iter().filter(|e| !e.synced).collect();
        candidates.sort_by_key(|e| std::cmp::Reverse(e.peer.quality()));
        let chosen = candidates
            .into_iter()
            .find(|e| e.peer.is_ready())
            .map(|e| e.peer.id());

        match chosen {
            Some(id) => {
                tracing::info!(peer_id = id, "[spv-sync] sync peer assigned");
                session.sync_peer = Some(id);
                self.download(session);
            }
            None => session.state = CoordinatorState::NoSyncPeer,
        }
    }

    fn download(&self, session: &mut Session) {
        let Some(id) = session.sync_peer else {
            return;
        };
        let Some(entry) = session.entry(id) else {
            session.sync_peer = None;
            session.state = CoordinatorState::NoSyncPeer;
            return self.assign_next_sync_peer(session);
        };
        if !entry.peer.is_ready() {
            return;
        }

        if entry.synced {
            session.sync_peer = None;
            self.assign_next_sync_peer(session);
        } else {
            let locator: Vec<Hash> = vec![session.tip.header.hash];
            entry.peer.request_headers(locator);
            session.state = CoordinatorState::Downloading(id);
        }
    }
}
