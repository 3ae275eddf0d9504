//! # Integration Flows

mod concurrency;
mod difficulty;
mod header_sync;
mod hodler;
mod wallet_sync;
