//! Header hash must not exceed the target it claims.

use shared_types::Block;

use crate::bits::{decode_compact, hash_to_u256};
use crate::errors::ValidationError;
use crate::history::ChainHistory;
use crate::validator::BlockValidator;

pub struct ProofOfWorkValidator;

impl BlockValidator for ProofOfWorkValidator {
    fn name(&self) -> &'static str {
        "proof-of-work"
    }

    fn is_block_validatable(&self, _block: &Block, _previous: &Block) -> bool {
        true
    }

    fn validate(
        &self,
        block: &Block,
        _previous: &Block,
        _history: &dyn ChainHistory,
    ) -> Result<(), ValidationError> {
        let target = decode_compact(block.bits())?;
        if hash_to_u256(block.hash()) > target {
            return Err(ValidationError::InsufficientWork {
                height: block.height,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::MemoryChain;
    use shared_types::BlockHeader;

    const GENESIS_HEADER: &str = "0100000000000000000000000000000000000000000000000000000000000000000000003ba3edfd7a7b12b27ac72c3e67768f617fc81bc3888a51323a9fb8aa4b1e5e4a29ab5f49ffff001d1dac2b7c";

    fn genesis() -> Block {
        let bytes: Vec<u8> = (0..GENESIS_HEADER.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(&GENESIS_HEADER[i..i + 2], 16).unwrap())
            .collect();
        Block::new(BlockHeader::deserialize(&bytes).unwrap(), 0)
    }

    #[test]
    fn test_genesis_has_valid_work() {
        let block = genesis();
        let validator = ProofOfWorkValidator;
        assert!(validator.validate(&block, &block, &MemoryChain::new()).is_ok());
    }

    #[test]
    fn test_wrong_nonce_fails() {
        let mut block = genesis();
        let h = &block.header;
        block.header = BlockHeader::new(h.version, h.previous_block_hash, h.merkle_root, h.timestamp, h.bits, h.nonce + 1);
        let validator = ProofOfWorkValidator;
        assert!(matches!(
            validator.validate(&block, &block.clone(), &MemoryChain::new()),
            Err(ValidationError::InsufficientWork { height: 0 })
        ));
    }
}
