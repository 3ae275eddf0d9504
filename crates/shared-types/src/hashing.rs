//! # Hashing
//!
//! Bitcoin hash primitives: double SHA-256 for block and transaction ids,
//! HASH160 (RIPEMD-160 of SHA-256) for key and script hashes.

use ripemd::Ripemd160;
use sha2::{Digest, Sha256};

use crate::errors::EncodingError;

/// A 32-byte hash in internal (little-endian) byte order.
pub type Hash = [u8; 32];

/// A 20-byte key or script hash.
pub type Hash160 = [u8; 20];

/// SHA256(SHA256(data)).
pub fn double_sha256(data: &[u8]) -> Hash {
    let first = Sha256::digest(data);
    let second = Sha256::digest(first);
    let mut out = [0u8; 32];
    out.copy_from_slice(&second);
    out
}

/// RIPEMD160(SHA256(data)).
pub fn hash160(data: &[u8]) -> Hash160 {
    let sha = Sha256::digest(data);
    let ripe = Ripemd160::digest(sha);
    let mut out = [0u8; 20];
    out.copy_from_slice(&ripe);
    out
}

/// Hex in display order (byte-reversed), as block explorers show hashes.
pub fn to_reversed_hex(bytes: &[u8]) -> String {
    let mut reversed = bytes.to_vec();
    reversed.reverse();
    hex::encode(reversed)
}

/// Parse a display-order hex hash back into internal byte order.
pub fn from_reversed_hex(s: &str) -> Result<Hash, EncodingError> {
    let mut bytes = hex::decode(s).map_err(|e| EncodingError::InvalidHex(e.to_string()))?;
    if bytes.len() != 32 {
        return Err(EncodingError::InvalidLength {
            expected: 32,
            actual: bytes.len(),
        });
    }
    bytes.reverse();
    let mut out = [0u8; 32];
    out.copy_from_slice(&bytes);
    Ok(out)
}
