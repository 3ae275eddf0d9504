//! # Algorithms
//!
//! Pure functions over transactions and headers.

pub mod header_linkage;
pub mod topological;

pub use header_linkage::{find_linkage_mismatch, is_full_batch};
pub use topological::in_topological_order;
