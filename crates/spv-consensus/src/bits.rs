//! # Compact Bits
//!
//! Conversion between the 32-bit compact difficulty encoding and 256-bit
//! targets, plus per-block work.

use primitive_types::{U256, U512};

use crate::errors::ValidationError;

/// Easiest allowed target on Bitcoin-family mainnets.
pub const MAX_TARGET_BITS: u32 = 0x1d00ffff;

/// Decode compact bits into a target.
///
/// Fails for negative encodings and for targets that do not fit 256 bits.
pub fn decode_compact(bits: u32) -> Result<U256, ValidationError> {
    let size = bits >> 24;
    let mut word = bits & 0x007f_ffff;

    if word != 0 && bits & 0x0080_0000 != 0 {
        return Err(ValidationError::InvalidBits(bits));
    }

    if size <= 3 {
        word >>= 8 * (3 - size);
        return Ok(U256::from(word));
    }

    let overflow = word != 0
        && (size > 34 || (word > 0xff && size > 33) || (word > 0xffff && size > 32));
    if overflow {
        return Err(ValidationError::InvalidBits(bits));
    }

    Ok(U256::from(word) << (8 * (size - 3) as usize))
}

/// Encode a target in compact form, rounding down to a 3-byte mantissa.
pub fn encode_compact(target: U256) -> u32 {
    let mut size = (target.bits() as u32).div_ceil(8);
    let mut compact = if size <= 3 {
        (target.low_u64() << (8 * (3 - size))) as u32
    } else {
        (target >> (8 * (size - 3) as usize)).low_u32()
    };

    if compact & 0x0080_0000 != 0 {
        compact >>= 8;
        size += 1;
    }

    compact | (size << 24)
}

/// Expected number of hashes to find a block at `bits`: 2^256 / (target + 1).
pub fn block_work(bits: u32) -> Result<U256, ValidationError> {
    let target = decode_compact(bits)?;
    if target.is_zero() {
        return Err(ValidationError::InvalidBits(bits));
    }
    // (~target / (target + 1)) + 1 == 2^256 / (target + 1) without 257-bit math
    Ok((!target / (target + U256::one())) + U256::one())
}

/// Narrow a 512-bit intermediate, saturating at `U256::MAX`.
pub fn saturating_narrow(value: U512) -> U256 {
    let mut bytes = [0u8; 64];
    value.to_little_endian(&mut bytes);
    if bytes[32..].iter().any(|b| *b != 0) {
        return U256::MAX;
    }
    U256::from_little_endian(&bytes[..32])
}

/// Interpret a block hash (internal byte order) as a number.
pub fn hash_to_u256(hash: &[u8; 32]) -> U256 {
    U256::from_little_endian(hash)
}
