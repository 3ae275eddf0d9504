//! # Sync State Provider
//!
//! Folds sync listener callbacks into one observable `SyncState`.

use parking_lot::Mutex;
use tokio::sync::watch;

use crate::domain::SyncState;
use crate::ports::SyncStateListener;

#[derive(Debug, Default)]
struct Heights {
    initial: u32,
    current: u32,
}

/// Publishes `SyncState` changes on a watch channel.
pub struct SyncStateProvider {
    heights: Mutex<Heights>,
    state: watch::Sender<SyncState>,
}

impl Default for SyncStateProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncStateProvider {
    pub fn new() -> Self {
        let (state, _) = watch::channel(SyncState::NotSynced);
        Self {
            heights: Mutex::new(Heights::default()),
            state,
        }
    }

    pub fn state(&self) -> SyncState {
        *self.state.borrow()
    }

    /// Receiver notified on every state change.
    pub fn subscribe(&self) -> watch::Receiver<SyncState> {
        self.state.subscribe()
    }

    fn set(&self, state: SyncState) {
        self.state.send_if_modified(|current| {
            if *current == state {
                return false;
            }
            tracing::debug!(?state, "[spv-sync] sync state changed");
            *current = state;
            true
        });
    }
}

/// Downloaded fraction of the way from `initial` to `max`, in [0, 1].
pub fn progress(initial: u32, current: u32, max: u32) -> f64 {
    let to_download = max as i64 - initial as i64;
    if to_download <= 0 {
        return 1.0;
    }
    let downloaded = current as i64 - initial as i64;
    (downloaded as f64 / to_download as f64).clamp(0.0, 1.0)
}

impl SyncStateListener for SyncStateProvider {
    fn on_sync_start(&self) {
        self.set(SyncState::Syncing(0.0));
    }

    fn on_sync_stop(&self) {
        self.set(SyncState::NotSynced);
    }

    fn on_sync_finish(&self) {
        self.set(SyncState::Synced);
    }

    fn on_initial_best_block_height_update(&self, height: u32) {
        let mut heights = self.heights.lock();
        heights.initial = height;
        heights.current = height;
    }

    fn on_current_best_block_height_update(&self, height: u32, max_block_height: u32) {
        let fraction = {
            let mut heights = self.heights.lock();
            heights.current = heights.current.max(height);
            progress(heights.initial, heights.current, max_block_height)
        };

        if fraction >= 1.0 {
            self.set(SyncState::Synced);
        } else {
            self.set(SyncState::Syncing(fraction));
        }
    }
}
