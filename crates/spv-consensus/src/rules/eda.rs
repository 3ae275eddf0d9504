//! Bitcoin Cash emergency difficulty adjustment (Aug 2017 rules).

use shared_types::Block;

use crate::bits::{decode_compact, encode_compact};
use crate::errors::ValidationError;
use crate::history::{median_time_past, ChainHistory, MEDIAN_TIME_SPAN};
use crate::validator::BlockValidator;

/// MTP gap over six blocks that triggers the adjustment.
const EMERGENCY_GAP_SECS: u32 = 12 * 60 * 60;
const LOOKBACK: u32 = 6;

/// Lowers difficulty by 20% when six blocks took more than twelve hours.
///
/// Skipped when the lookback reaches below the first checkpoint, since
/// those blocks are never stored.
pub struct EdaValidator {
    max_target_bits: u32,
    first_checkpoint_height: u32,
}

impl EdaValidator {
    pub fn new(max_target_bits: u32, first_checkpoint_height: u32) -> Self {
        Self {
            max_target_bits,
            first_checkpoint_height,
        }
    }
}

impl BlockValidator for EdaValidator {
    fn name(&self) -> &'static str {
        "eda"
    }

    fn is_block_validatable(&self, block: &Block, _previous: &Block) -> bool {
        block.height >= self.first_checkpoint_height + LOOKBACK + MEDIAN_TIME_SPAN as u32
    }

    fn validate(
        &self,
        block: &Block,
        previous: &Block,
        history: &dyn ChainHistory,
    ) -> Result<(), ValidationError> {
        if previous.bits() == self.max_target_bits {
            return expect_bits(block, self.max_target_bits);
        }

        let cursor = history
            .previous(previous, LOOKBACK)
            .ok_or(ValidationError::NoPreviousBlock {
                height: previous.height,
                depth: LOOKBACK,
            })?;
        let gap = median_time_past(history, previous).saturating_sub(median_time_past(history, &cursor));

        if gap < EMERGENCY_GAP_SECS {
            return expect_bits(block, previous.bits());
        }

        let target = decode_compact(previous.bits())?;
        let relaxed = target.saturating_add(target >> 2usize);
        let max_target = decode_compact(self.max_target_bits)?;
        tracing::debug!(
            height = block.height,
            gap_secs = gap,
            "[spv-consensus] emergency difficulty adjustment"
        );
        expect_bits(block, encode_compact(relaxed.min(max_target)))
    }
}

fn expect_bits(block: &Block, expected: u32) -> Result<(), ValidationError> {
    if block.bits() != expected {
        return Err(ValidationError::BitsMismatch {
            height: block.height,
            expected,
            actual: block.bits(),
        });
    }
    Ok(())
}
