//! # Block Validators
//!
//! A validator checks one new block against its predecessor and whatever
//! lookback it needs from [`ChainHistory`]. Validators compose two ways:
//!
//! - [`ValidatorChain`]: the first rule that applies to the block decides.
//! - [`ValidatorSet`]: every member must accept.

use std::sync::Arc;

use shared_types::Block;

use crate::errors::ValidationError;
use crate::history::ChainHistory;

/// A consensus rule over a block and its parent.
pub trait BlockValidator: Send + Sync {
    /// Short rule name for logs.
    fn name(&self) -> &'static str;

    /// Whether this rule governs `block`.
    fn is_block_validatable(&self, block: &Block, previous: &Block) -> bool;

    /// Check `block`. Only called when [`Self::is_block_validatable`] holds.
    fn validate(
        &self,
        block: &Block,
        previous: &Block,
        history: &dyn ChainHistory,
    ) -> Result<(), ValidationError>;
}

/// Ordered rules; the first applicable one validates.
#[derive(Default, Clone)]
pub struct ValidatorChain {
    validators: Vec<Arc<dyn BlockValidator>>,
}

impl ValidatorChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, validator: Arc<dyn BlockValidator>) -> Self {
        self.validators.push(validator);
        self
    }

    pub fn len(&self) -> usize {
        self.validators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }
}

impl BlockValidator for ValidatorChain {
    fn name(&self) -> &'static str {
        "chain"
    }

    fn is_block_validatable(&self, block: &Block, previous: &Block) -> bool {
        self.validators
            .iter()
            .any(|v| v.is_block_validatable(block, previous))
    }

    fn validate(
        &self,
        block: &Block,
        previous: &Block,
        history: &dyn ChainHistory,
    ) -> Result<(), ValidationError> {
        match self
            .validators
            .iter()
            .find(|v| v.is_block_validatable(block, previous))
        {
            Some(validator) => {
                tracing::trace!(
                    height = block.height,
                    rule = validator.name(),
                    "[spv-consensus] validating block"
                );
                validator.validate(block, previous, history)
            }
            None => Ok(()),
        }
    }
}

/// Rules that must all accept.
#[derive(Default, Clone)]
pub struct ValidatorSet {
    validators: Vec<Arc<dyn BlockValidator>>,
}

impl ValidatorSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, validator: Arc<dyn BlockValidator>) -> Self {
        self.validators.push(validator);
        self
    }

    pub fn len(&self) -> usize {
        self.validators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }

    /// Run every applicable member, stopping at the first rejection.
    pub fn validate_block(
        &self,
        block: &Block,
        previous: &Block,
        history: &dyn ChainHistory,
    ) -> Result<(), ValidationError> {
        for validator in &self.validators {
            if validator.is_block_validatable(block, previous) {
                validator.validate(block, previous, history).map_err(|e| {
                    tracing::warn!(
                        height = block.height,
                        rule = validator.name(),
                        error = %e,
                        "[spv-consensus] block rejected"
                    );
                    e
                })?;
            }
        }
        Ok(())
    }
}

impl BlockValidator for ValidatorSet {
    fn name(&self) -> &'static str {
        "set"
    }

    fn is_block_validatable(&self, _block: &Block, _previous: &Block) -> bool {
        true
    }

    fn validate(
        &self,
        block: &Block,
        previous: &Block,
        history: &dyn ChainHistory,
    ) -> Result<(), ValidationError> {
        self.validate_block(block, previous, history)
    }
}
