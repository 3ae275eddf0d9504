//! # Ports Module
//!
//! Outbound dependencies of the engine, plus in-process mocks.

pub mod mocks;
pub mod outbound;

pub use outbound::*;
