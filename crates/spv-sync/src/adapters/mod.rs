//! # Adapters
//!
//! Concrete implementations of outbound ports.

pub mod memory_storage;

pub use memory_storage::InMemoryStorage;
