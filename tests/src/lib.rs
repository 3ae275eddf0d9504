//! # SPV Kit Test Suite
//!
//! Flows that cross crate boundaries.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! ├── fixtures.rs       # Kit assembly, chain and payment builders, serving peers
//! └── integration/
//!     ├── wallet_sync.rs    # Download session against a kit
//!     ├── concurrency.rs    # Block and mempool paths racing
//!     ├── header_sync.rs    # Coordinator worker with serving peers
//!     ├── difficulty.rs     # Retarget and continuity over a full period
//!     └── hodler.rs         # Timelocked payment send/receive/unlock
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p spv-tests
//! cargo test -p spv-tests integration::hodler
//! ```

pub mod fixtures;
pub mod integration;
