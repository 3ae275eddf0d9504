//! # Shared Types Crate
//!
//! Chain and wallet entities used by every SPV crate, together with the
//! primitives needed to give them identity: hashing, wire serialization and
//! script shape detection.
//!
//! ## Design Principles
//!
//! - **Hash is identity**: block and transaction hashes are pure functions of
//!   their serialized bytes and are recomputed whenever fields change.
//! - **Internal byte order**: hashes are stored little-endian and only
//!   reversed for display.

pub mod encoding;
pub mod entities;
pub mod errors;
pub mod hashing;
pub mod script;

pub use encoding::{ByteReader, ByteWriter};
pub use entities::*;
pub use errors::*;
pub use hashing::{double_sha256, from_reversed_hex, hash160, to_reversed_hex, Hash, Hash160};
pub use script::{detect, parse_chunks, Chunk, ScriptType};
