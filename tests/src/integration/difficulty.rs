//! # Difficulty Period
//!
//! A full 2016-block retarget period connected through the fork manager
//! with the retarget and continuity rules (no proof-of-work check, so
//! headers need not be mined).

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use primitive_types::U256;
    use shared_types::{Block, BlockHeader, MerkleBlock};
    use spv_consensus::rules::{BitsContinuityValidator, LegacyDifficultyAdjustmentValidator};
    use spv_consensus::{
        decode_compact, encode_compact, DifficultyParams, ValidationError, ValidatorChain, ValidatorSet,
        MAX_TARGET_BITS,
    };
    use spv_sync::ports::mocks::RecordingListener;
    use spv_sync::{Blockchain, InMemoryStorage, SpvError, Storage};

    const GENESIS_TIME: u32 = 1_231_006_505;

    struct Fixture {
        storage: Arc<InMemoryStorage>,
        chain: Blockchain,
        genesis: Block,
    }

    fn fixture() -> Fixture {
        let params = DifficultyParams::default();
        let difficulty = ValidatorChain::new()
            .with(Arc::new(LegacyDifficultyAdjustmentValidator::new(params)))
            .with(Arc::new(BitsContinuityValidator::new(params.height_interval)));
        let validators = ValidatorSet::new().with(Arc::new(difficulty));

        let storage = Arc::new(InMemoryStorage::new());
        let genesis = Block::new(
            BlockHeader::new(1, [0u8; 32], [0u8; 32], GENESIS_TIME, MAX_TARGET_BITS, 0),
            0,
        );
        storage.add_block(&genesis).unwrap();
        let chain = Blockchain::new(storage.clone(), Some(validators), Arc::new(RecordingListener::default()));
        Fixture { storage, chain, genesis }
    }

    fn next(chain: &Blockchain, tip: &Block, spacing: u32, bits: u32) -> Result<Block, SpvError> {
        let header = BlockHeader::new(1, tip.header.hash, [0u8; 32], tip.timestamp() + spacing, bits, tip.height + 1);
        chain.connect(&MerkleBlock::new(header, vec![]))
    }

    fn extend(chain: &Blockchain, tip: &Block, count: u32, spacing: u32, bits: u32) -> Block {
        let mut tip = tip.clone();
        for _ in 0..count {
            tip = next(chain, &tip, spacing, bits).unwrap();
        }
        tip
    }

    fn scaled_max(divisor: u64) -> u32 {
        let max = decode_compact(MAX_TARGET_BITS).unwrap();
        encode_compact(max / U256::from(divisor))
    }

    #[test]
    fn test_slow_period_keeps_max_target_then_rejects_jump() {
        let f = fixture();

        // 700s blocks: the retarget at 2016 would ease past the maximum, so
        // it stays at MAX_TARGET_BITS.
        let tip = extend(&f.chain, &f.genesis, 2016, 700, MAX_TARGET_BITS);
        assert_eq!(tip.height, 2016);
        assert_eq!(f.storage.block_count(), 2017);

        let jump = scaled_max(8);
        let result = next(&f.chain, &tip, 700, jump);
        assert!(matches!(
            result,
            Err(SpvError::ValidatorRejected(ValidationError::BitsMismatch {
                height: 2017,
                expected: MAX_TARGET_BITS,
                ..
            }))
        ));
        assert_eq!(f.storage.block_count(), 2017);
    }

    #[test]
    fn test_retarget_outside_band_rejected() {
        let f = fixture();
        let tip = extend(&f.chain, &f.genesis, 2015, 700, MAX_TARGET_BITS);

        let result = next(&f.chain, &tip, 700, scaled_max(8));
        assert!(matches!(
            result,
            Err(SpvError::ValidatorRejected(ValidationError::BitsMismatch {
                height: 2016,
                expected: MAX_TARGET_BITS,
                ..
            }))
        ));
    }

    #[test]
    fn test_fast_period_clamped_to_quarter() {
        let f = fixture();
        // 150s blocks: elapsed time is just under a quarter of the target
        // timespan, so the clamp applies.
        let tip = extend(&f.chain, &f.genesis, 2015, 150, MAX_TARGET_BITS);

        let quarter = scaled_max(4);
        let retarget = next(&f.chain, &tip, 150, quarter).unwrap();
        assert_eq!(retarget.height, 2016);

        // The new difficulty carries forward.
        assert!(next(&f.chain, &retarget, 150, MAX_TARGET_BITS).is_err());
        assert_eq!(next(&f.chain, &retarget, 150, quarter).unwrap().height, 2017);
    }
}
