//! Periodic retarget every `height_interval` blocks.

use primitive_types::{U256, U512};
use shared_types::Block;

use super::DifficultyParams;
use crate::bits::{decode_compact, encode_compact, saturating_narrow};
use crate::errors::ValidationError;
use crate::history::ChainHistory;
use crate::validator::BlockValidator;

/// Retarget from elapsed time over the last period, clamped to a 4x band
/// and the network maximum.
pub struct LegacyDifficultyAdjustmentValidator {
    params: DifficultyParams,
}

impl LegacyDifficultyAdjustmentValidator {
    pub fn new(params: DifficultyParams) -> Self {
        Self { params }
    }

    /// Bits the block at a retarget height must carry.
    pub fn next_bits(
        &self,
        block: &Block,
        previous: &Block,
        history: &dyn ChainHistory,
    ) -> Result<u32, ValidationError> {
        let interval = self.params.height_interval;
        let period_start =
            history
                .previous(block, interval)
                .ok_or(ValidationError::NoPreviousBlock {
                    height: block.height,
                    depth: interval,
                })?;

        let target_timespan = self.params.target_timespan as i64;
        let timespan = (previous.timestamp() as i64 - period_start.timestamp() as i64)
            .clamp(target_timespan / 4, target_timespan * 4);

        let target = decode_compact(previous.bits())?;
        let scaled = target.full_mul(U256::from(timespan as u64)) / U512::from(target_timespan as u64);
        let new_target = saturating_narrow(scaled);

        let max_target = decode_compact(self.params.max_target_bits)?;
        Ok(encode_compact(new_target.min(max_target)))
    }
}

impl BlockValidator for LegacyDifficultyAdjustmentValidator {
    fn name(&self) -> &'static str {
        "legacy-retarget"
    }

    fn is_block_validatable(&self, block: &Block, _previous: &Block) -> bool {
        block.height % self.params.height_interval == 0
    }

    fn validate(
        &self,
        block: &Block,
        previous: &Block,
        history: &dyn ChainHistory,
    ) -> Result<(), ValidationError> {
        let expected = self.next_bits(block, previous, history)?;
        if expected != block.bits() {
            return Err(ValidationError::BitsMismatch {
                height: block.height,
                expected,
                actual: block.bits(),
            });
        }
        Ok(())
    }
}
