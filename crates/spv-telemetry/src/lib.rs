//! # SPV Telemetry
//!
//! Structured logging for SPV Kit binaries and tests.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use spv_telemetry::{init_logging, TelemetryConfig};
//!
//! fn main() {
//!     init_logging(&TelemetryConfig::from_env()).expect("logging");
//!     // Engine components log under the `[spv-sync]`, `[spv-consensus]`
//!     // and `[spv-hodler]` tags.
//! }
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `SPV_LOG_LEVEL` / `RUST_LOG` | `info` | `EnvFilter` directives |
//! | `SPV_JSON_LOGS` | `false` | JSON output instead of plain text |
//! | `SPV_SERVICE_NAME` | `spv-kit` | Reported in the startup event |

#![warn(clippy::all)]

mod config;
mod logging;

pub use config::TelemetryConfig;
pub use logging::{init_logging, init_test_logging};

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    /// Filter directives could not be parsed.
    #[error("Invalid log filter {filter:?}: {reason}")]
    InvalidFilter { filter: String, reason: String },

    /// A global subscriber is already installed.
    #[error("Failed to install subscriber: {0}")]
    SubscriberInit(String),
}

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
