//! Between retargets the difficulty must not change.

use shared_types::Block;

use crate::errors::ValidationError;
use crate::history::ChainHistory;
use crate::validator::BlockValidator;

/// Non-retarget blocks carry their parent's bits.
pub struct BitsContinuityValidator {
    height_interval: u32,
}

impl BitsContinuityValidator {
    pub fn new(height_interval: u32) -> Self {
        Self { height_interval }
    }
}

impl BlockValidator for BitsContinuityValidator {
    fn name(&self) -> &'static str {
        "bits-continuity"
    }

    fn is_block_validatable(&self, block: &Block, _previous: &Block) -> bool {
        block.height % self.height_interval != 0
    }

    fn validate(
        &self,
        block: &Block,
        previous: &Block,
        _history: &dyn ChainHistory,
    ) -> Result<(), ValidationError> {
        if block.bits() != previous.bits() {
            return Err(ValidationError::BitsMismatch {
                height: block.height,
                expected: previous.bits(),
                actual: block.bits(),
            });
        }
        Ok(())
    }
}
