//! # Script Primitives
//!
//! Opcode constants, chunk parsing, push encoding and standard script
//! templates. Script *execution* is out of scope; only shape detection and
//! construction live here.

use serde::{Deserialize, Serialize};

use crate::errors::EncodingError;

pub const OP_0: u8 = 0x00;
pub const OP_PUSHDATA1: u8 = 0x4c;
pub const OP_PUSHDATA2: u8 = 0x4d;
pub const OP_PUSHDATA4: u8 = 0x4e;
pub const OP_1: u8 = 0x51;
pub const OP_16: u8 = 0x60;
pub const OP_RETURN: u8 = 0x6a;
pub const OP_DROP: u8 = 0x75;
pub const OP_DUP: u8 = 0x76;
pub const OP_EQUAL: u8 = 0x87;
pub const OP_EQUALVERIFY: u8 = 0x88;
pub const OP_HASH160: u8 = 0xa9;
pub const OP_CHECKSIG: u8 = 0xac;
pub const OP_CHECKSEQUENCEVERIFY: u8 = 0xb2;

/// Shape of a locking script.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ScriptType {
    #[default]
    Unknown,
    P2PKH,
    P2PK,
    P2SH,
    P2WSH,
    P2WPKH,
    /// P2WPKH nested in P2SH.
    P2WPKHSH,
    NullData,
}

impl ScriptType {
    /// Outputs of these types make the remote bloom filter miss spends of
    /// them, so the filter must be rebuilt after one is received.
    pub fn requires_filter_update(self) -> bool {
        matches!(self, ScriptType::P2PK | ScriptType::P2WPKH | ScriptType::P2WPKHSH)
    }

    pub fn is_witness(self) -> bool {
        matches!(self, ScriptType::P2WPKH | ScriptType::P2WSH | ScriptType::P2WPKHSH)
    }
}

/// One parsed script element: an opcode, optionally with pushed data.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Chunk {
    pub opcode: u8,
    pub data: Option<Vec<u8>>,
}

impl Chunk {
    pub fn is_push(&self) -> bool {
        self.data.is_some()
    }
}

/// Split a script into chunks. Fails on truncated pushes.
pub fn parse_chunks(script: &[u8]) -> Result<Vec<Chunk>, EncodingError> {
    let mut chunks = Vec::new();
    let mut pos = 0usize;

    while pos < script.len() {
        let opcode = script[pos];
        pos += 1;

        let len = match opcode {
            0x01..=0x4b => Some(opcode as usize),
            OP_PUSHDATA1 => Some(read_le(script, &mut pos, 1)?),
            OP_PUSHDATA2 => Some(read_le(script, &mut pos, 2)?),
            OP_PUSHDATA4 => Some(read_le(script, &mut pos, 4)?),
            _ => None,
        };

        let data = match len {
            Some(len) => {
                if script.len() - pos < len {
                    return Err(EncodingError::UnexpectedEof {
                        offset: pos,
                        needed: len - (script.len() - pos),
                    });
                }
                let data = script[pos..pos + len].to_vec();
                pos += len;
                Some(data)
            }
            None if opcode == OP_0 => Some(Vec::new()),
            None => None,
        };

        chunks.push(Chunk { opcode, data });
    }

    Ok(chunks)
}

fn read_le(script: &[u8], pos: &mut usize, width: usize) -> Result<usize, EncodingError> {
    if script.len() - *pos < width {
        return Err(EncodingError::UnexpectedEof {
            offset: *pos,
            needed: width - (script.len() - *pos),
        });
    }
    let mut value = 0usize;
    for (i, byte) in script[*pos..*pos + width].iter().enumerate() {
        value |= (*byte as usize) << (8 * i);
    }
    *pos += width;
    Ok(value)
}

/// Minimal push encoding of `data`.
pub fn push(data: &[u8]) -> Vec<u8> {
    let len = data.len();
    let mut out = Vec::with_capacity(len + 5);
    match len {
        0..=0x4b => out.push(len as u8),
        0x4c..=0xff => {
            out.push(OP_PUSHDATA1);
            out.push(len as u8);
        }
        0x100..=0xffff => {
            out.push(OP_PUSHDATA2);
            out.extend_from_slice(&(len as u16).to_le_bytes());
        }
        _ => {
            out.push(OP_PUSHDATA4);
            out.extend_from_slice(&(len as u32).to_le_bytes());
        }
    }
    out.extend_from_slice(data);
    out
}

/// `OP_DUP OP_HASH160 <20> OP_EQUALVERIFY OP_CHECKSIG`
pub fn p2pkh_script(key_hash: &[u8]) -> Vec<u8> {
    let mut script = vec![OP_DUP, OP_HASH160];
    script.extend(push(key_hash));
    script.push(OP_EQUALVERIFY);
    script.push(OP_CHECKSIG);
    script
}

/// `OP_HASH160 <20> OP_EQUAL`
pub fn p2sh_script(script_hash: &[u8]) -> Vec<u8> {
    let mut script = vec![OP_HASH160];
    script.extend(push(script_hash));
    script.push(OP_EQUAL);
    script
}

/// `OP_0 <20>`
pub fn p2wpkh_script(key_hash: &[u8]) -> Vec<u8> {
    let mut script = vec![OP_0];
    script.extend(push(key_hash));
    script
}

/// Classify a locking script and return its key/script-hash payload.
///
/// P2PK returns the raw public key; NullData returns everything after
/// `OP_RETURN`.
pub fn detect(script: &[u8]) -> (ScriptType, Option<Vec<u8>>) {
    let len = script.len();

    if len == 25
        && script[0] == OP_DUP
        && script[1] == OP_HASH160
        && script[2] == 20
        && script[23] == OP_EQUALVERIFY
        && script[24] == OP_CHECKSIG
    {
        return (ScriptType::P2PKH, Some(script[3..23].to_vec()));
    }

    if (len == 35 || len == 67)
        && script[0] as usize == len - 2
        && script[len - 1] == OP_CHECKSIG
    {
        return (ScriptType::P2PK, Some(script[1..len - 1].to_vec()));
    }

    if len == 23 && script[0] == OP_HASH160 && script[1] == 20 && script[22] == OP_EQUAL {
        return (ScriptType::P2SH, Some(script[2..22].to_vec()));
    }

    if len == 22 && script[0] == OP_0 && script[1] == 20 {
        return (ScriptType::P2WPKH, Some(script[2..].to_vec()));
    }

    if len == 34 && script[0] == OP_0 && script[1] == 32 {
        return (ScriptType::P2WSH, Some(script[2..].to_vec()));
    }

    if len > 0 && script[0] == OP_RETURN {
        return (ScriptType::NullData, Some(script[1..].to_vec()));
    }

    (ScriptType::Unknown, None)
}
