//! # Header Linkage
//!
//! Continuity checks for header batches received from the sync peer.

use shared_types::{BlockHeader, Hash};

/// Index of the first header whose previous hash does not match its
/// predecessor, with `tip` standing in for the header before index 0.
pub fn find_linkage_mismatch(tip: &Hash, headers: &[BlockHeader]) -> Option<usize> {
    let mut expected = tip;
    for (index, header) in headers.iter().enumerate() {
        if &header.previous_block_hash != expected {
            return Some(index);
        }
        expected = &header.hash;
    }
    None
}

/// A batch of exactly `batch_size` headers means the peer has more.
pub fn is_full_batch(headers: &[BlockHeader], batch_size: usize) -> bool {
    headers.len() >= batch_size
}
