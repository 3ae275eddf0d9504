//! # Networks
//!
//! Hard-coded checkpoints and consensus rules per supported chain.

use serde::{Deserialize, Serialize};
use shared_types::from_reversed_hex;
use spv_consensus::rules::BCH_FORK_HASH_HEX;
use spv_consensus::{bitcoin_cash_validators, bitcoin_validators, DifficultyParams, ValidatorSet};

use crate::domain::{Checkpoint, ConfigError, NetworkCheckpoints};

const MAINNET_CHECKPOINT: &str = "0100000000000000000000000000000000000000000000000000000000000000000000003ba3edfd7a7b12b27ac72c3e67768f617fc81bc3888a51323a9fb8aa4b1e5e4a29ab5f49ffff001d1dac2b7c00000000";
const TESTNET_CHECKPOINT: &str = "0100000000000000000000000000000000000000000000000000000000000000000000003ba3edfd7a7b12b27ac72c3e67768f617fc81bc3888a51323a9fb8aa4b1e5e4adae5494dffff001d1aa4ae1800000000";
const REGTEST_CHECKPOINT: &str = "0100000000000000000000000000000000000000000000000000000000000000000000003ba3edfd7a7b12b27ac72c3e67768f617fc81bc3888a51323a9fb8aa4b1e5e4adae5494dffff7f200200000000000000";

/// Supported chains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Network {
    #[default]
    MainNet,
    TestNet,
    RegTest,
    BitcoinCashMainNet,
}

impl Network {
    /// Built-in checkpoints. Both point at genesis; deployments ship newer
    /// ones through `SpvKitBuilder::checkpoints`.
    pub fn checkpoints(self) -> Result<NetworkCheckpoints, ConfigError> {
        let hex = match self {
            Network::MainNet | Network::BitcoinCashMainNet => MAINNET_CHECKPOINT,
            Network::TestNet => TESTNET_CHECKPOINT,
            Network::RegTest => REGTEST_CHECKPOINT,
        };
        let checkpoint = Checkpoint::from_hex(hex)?;
        Ok(NetworkCheckpoints {
            bip44: checkpoint.clone(),
            last: checkpoint,
        })
    }

    /// Consensus rules applied when connecting blocks. Test networks run
    /// without difficulty checks.
    pub fn validators(self, first_checkpoint_height: u32) -> Result<Option<ValidatorSet>, ConfigError> {
        let params = DifficultyParams::default();
        match self {
            Network::MainNet => Ok(Some(bitcoin_validators(params))),
            Network::BitcoinCashMainNet => {
                let fork_hash = from_reversed_hex(BCH_FORK_HASH_HEX)
                    .map_err(|e| ConfigError::InvalidCheckpoint(e.to_string()))?;
                Ok(Some(bitcoin_cash_validators(params, fork_hash, first_checkpoint_height)))
            }
            Network::TestNet | Network::RegTest => Ok(None),
        }
    }
}
