//! # Hodler Errors

use spv_sync::PluginError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HodlerError {
    /// Interval name not one of the canonical four.
    #[error("Unknown lock time interval: {0}")]
    UnknownInterval(String),

    /// Encoded interval is not a 2-byte canonical value.
    #[error("Invalid lock time interval data: {0:02x?}")]
    InvalidIntervalData(Vec<u8>),

    /// Null-data payload ended early.
    #[error("Missing {0} chunk")]
    MissingChunk(&'static str),

    /// Stored `interval|address` string cannot be read.
    #[error("Invalid plugin data: {0:?}")]
    InvalidPluginData(Option<String>),
}

impl From<HodlerError> for PluginError {
    fn from(err: HodlerError) -> Self {
        PluginError::Malformed(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_maps_to_malformed() {
        let err: PluginError = HodlerError::MissingChunk("pubkey hash").into();
        assert_eq!(err, PluginError::Malformed("Missing pubkey hash chunk".to_string()));
    }
}
