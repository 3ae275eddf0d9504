//! Fork activation: pins the fork block and hands difficulty to another rule.

use std::sync::Arc;

use shared_types::{Block, Hash};

use crate::errors::ValidationError;
use crate::history::ChainHistory;
use crate::validator::BlockValidator;

pub struct ForkValidator {
    fork_height: u32,
    fork_hash: Hash,
    inner: Arc<dyn BlockValidator>,
}

impl ForkValidator {
    pub fn new(fork_height: u32, fork_hash: Hash, inner: Arc<dyn BlockValidator>) -> Self {
        Self {
            fork_height,
            fork_hash,
            inner,
        }
    }
}

impl BlockValidator for ForkValidator {
    fn name(&self) -> &'static str {
        "fork"
    }

    fn is_block_validatable(&self, block: &Block, _previous: &Block) -> bool {
        block.height == self.fork_height
    }

    fn validate(
        &self,
        block: &Block,
        previous: &Block,
        history: &dyn ChainHistory,
    ) -> Result<(), ValidationError> {
        if block.hash() != &self.fork_hash {
            return Err(ValidationError::ForkHashMismatch {
                height: self.fork_height,
            });
        }
        self.inner.validate(block, previous, history)
    }
}
