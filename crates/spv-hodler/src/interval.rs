//! # Lock Time Intervals
//!
//! Canonical durations in units of 512 seconds (BIP68 time granularity).

use std::fmt;
use std::str::FromStr;

use crate::errors::HodlerError;

pub const SEQUENCE_GRANULARITY_SECONDS: u64 = 512;

/// BIP68 type flag: the sequence value counts 512-second units.
pub const RELATIVE_LOCK_TIME_MASK: u32 = 1 << 22;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockTimeInterval {
    Hour,
    Month,
    HalfYear,
    Year,
}

impl LockTimeInterval {
    pub const ALL: [LockTimeInterval; 4] = [
        LockTimeInterval::Hour,
        LockTimeInterval::Month,
        LockTimeInterval::HalfYear,
        LockTimeInterval::Year,
    ];

    /// Duration in 512-second units.
    pub fn value(self) -> u16 {
        match self {
            LockTimeInterval::Hour => 7,
            LockTimeInterval::Month => 5063,
            LockTimeInterval::HalfYear => 30881,
            LockTimeInterval::Year => 61593,
        }
    }

    pub fn from_value(value: u16) -> Option<Self> {
        Self::ALL.into_iter().find(|i| i.value() == value)
    }

    pub fn seconds(self) -> u64 {
        u64::from(self.value()) * SEQUENCE_GRANULARITY_SECONDS
    }

    /// Input sequence number enforcing the lock.
    pub fn sequence(self) -> u32 {
        RELATIVE_LOCK_TIME_MASK | u32::from(self.value())
    }

    /// Little-endian 2-byte form carried in the null-data output.
    pub fn to_bytes(self) -> [u8; 2] {
        self.value().to_le_bytes()
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, HodlerError> {
        let raw: [u8; 2] = bytes
            .try_into()
            .map_err(|_| HodlerError::InvalidIntervalData(bytes.to_vec()))?;
        Self::from_value(u16::from_le_bytes(raw)).ok_or_else(|| HodlerError::InvalidIntervalData(bytes.to_vec()))
    }

    pub fn name(self) -> &'static str {
        match self {
            LockTimeInterval::Hour => "hour",
            LockTimeInterval::Month => "month",
            LockTimeInterval::HalfYear => "half_year",
            LockTimeInterval::Year => "year",
        }
    }
}

impl fmt::Display for LockTimeInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for LockTimeInterval {
    type Err = HodlerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|i| i.name() == s)
            .ok_or_else(|| HodlerError::UnknownInterval(s.to_string()))
    }
}
