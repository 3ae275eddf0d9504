//! # Reference Rules
//!
//! Difficulty and fork rules for Bitcoin and Bitcoin Cash, and the
//! per-network compositions of them.

mod continuity;
mod daa;
mod eda;
mod fork;
mod legacy;
mod pow;

pub use continuity::BitsContinuityValidator;
pub use daa::DaaValidator;
pub use eda::EdaValidator;
pub use fork::ForkValidator;
pub use legacy::LegacyDifficultyAdjustmentValidator;
pub use pow::ProofOfWorkValidator;

use std::sync::Arc;

use shared_types::Hash;

use crate::bits::MAX_TARGET_BITS;
use crate::validator::{ValidatorChain, ValidatorSet};

/// Timing constants shared by the difficulty rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DifficultyParams {
    /// Seconds per block.
    pub target_spacing: u32,
    /// Seconds per retarget period.
    pub target_timespan: u32,
    /// Blocks per retarget period.
    pub height_interval: u32,
    pub max_target_bits: u32,
}

impl Default for DifficultyParams {
    fn default() -> Self {
        let target_spacing = 10 * 60;
        let target_timespan = 14 * 24 * 60 * 60;
        Self {
            target_spacing,
            target_timespan,
            height_interval: target_timespan / target_spacing,
            max_target_bits: MAX_TARGET_BITS,
        }
    }
}

/// Bitcoin Cash Nov-2018 fork block (ABC side).
pub const BCH_FORK_HEIGHT: u32 = 556_767;
pub const BCH_FORK_HASH_HEX: &str =
    "0000000000000000004626ff6e3b936941d341c5932ece4357eeccac44e6d56c";
/// First height governed by the 144-block DAA.
pub const BCH_DAA_ACTIVATION_HEIGHT: u32 = 504_032;

/// Bitcoin mainnet: proof of work, then retarget or bits continuity.
pub fn bitcoin_validators(params: DifficultyParams) -> ValidatorSet {
    let difficulty = ValidatorChain::new()
        .with(Arc::new(LegacyDifficultyAdjustmentValidator::new(params)))
        .with(Arc::new(BitsContinuityValidator::new(params.height_interval)));

    ValidatorSet::new()
        .with(Arc::new(ProofOfWorkValidator))
        .with(Arc::new(difficulty))
}

/// Bitcoin Cash mainnet: fork check, DAA, legacy retarget, then EDA.
pub fn bitcoin_cash_validators(
    params: DifficultyParams,
    fork_hash: Hash,
    first_checkpoint_height: u32,
) -> ValidatorSet {
    let daa = Arc::new(DaaValidator::new(params, BCH_DAA_ACTIVATION_HEIGHT));
    let difficulty = ValidatorChain::new()
        .with(Arc::new(ForkValidator::new(BCH_FORK_HEIGHT, fork_hash, daa.clone())))
        .with(daa)
        .with(Arc::new(LegacyDifficultyAdjustmentValidator::new(params)))
        .with(Arc::new(EdaValidator::new(params.max_target_bits, first_checkpoint_height)));

    ValidatorSet::new()
        .with(Arc::new(ProofOfWorkValidator))
        .with(Arc::new(difficulty))
}
