//! Bitcoin Cash 144-block difficulty adjustment.

use primitive_types::{U256, U512};
use shared_types::Block;

use super::DifficultyParams;
use crate::bits::{block_work, decode_compact, encode_compact, saturating_narrow};
use crate::errors::ValidationError;
use crate::history::ChainHistory;
use crate::validator::BlockValidator;

/// Blocks in the averaging window.
pub const DAA_WINDOW: u32 = 144;

/// Work-weighted moving average over the last 144 blocks. The window ends
/// are the median-by-timestamp of three consecutive blocks.
pub struct DaaValidator {
    params: DifficultyParams,
    activation_height: u32,
}

impl DaaValidator {
    pub fn new(params: DifficultyParams, activation_height: u32) -> Self {
        Self {
            params,
            activation_height,
        }
    }

    fn suitable_block(
        &self,
        block: &Block,
        history: &dyn ChainHistory,
    ) -> Result<Block, ValidationError> {
        let mut candidates = history.window(block, 3);
        if candidates.len() < 3 {
            return Err(ValidationError::NoPreviousBlock {
                height: block.height,
                depth: 2,
            });
        }
        candidates.sort_by_key(Block::timestamp);
        Ok(candidates.swap_remove(1))
    }

    /// Bits the successor of `previous` must carry.
    pub fn next_bits(
        &self,
        previous: &Block,
        history: &dyn ChainHistory,
    ) -> Result<u32, ValidationError> {
        let last = self.suitable_block(previous, history)?;
        let window_start =
            history
                .previous(previous, DAA_WINDOW)
                .ok_or(ValidationError::NoPreviousBlock {
                    height: previous.height,
                    depth: DAA_WINDOW,
                })?;
        let first = self.suitable_block(&window_start, history)?;

        let spacing = self.params.target_spacing as i64;
        let timespan = (last.timestamp() as i64 - first.timestamp() as i64)
            .clamp(72 * spacing, 288 * spacing);

        // Work done in (first, last]
        let mut work = U256::zero();
        let span = last.height.saturating_sub(first.height);
        for block in history.window(&last, span as usize) {
            work = work.saturating_add(block_work(block.bits())?);
        }

        let projected = work.full_mul(U256::from(spacing as u64)) / U512::from(timespan as u64);
        if projected.is_zero() {
            return Ok(self.params.max_target_bits);
        }
        let next_target = saturating_narrow(((U512::one() << 256) - projected) / projected);

        let max_target = decode_compact(self.params.max_target_bits)?;
        Ok(encode_compact(next_target.min(max_target)))
    }
}

impl BlockValidator for DaaValidator {
    fn name(&self) -> &'static str {
        "daa"
    }

    fn is_block_validatable(&self, block: &Block, _previous: &Block) -> bool {
        block.height >= self.activation_height
    }

    fn validate(
        &self,
        block: &Block,
        previous: &Block,
        history: &dyn ChainHistory,
    ) -> Result<(), ValidationError> {
        let expected = self.next_bits(previous, history)?;
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
