//! # Transaction Creator
//!
//! Builds, stores and broadcasts an outgoing payment.

use std::sync::Arc;

use shared_types::FullTransaction;

use super::transaction_processor::TransactionProcessor;
use super::unspent_outputs::UnspentOutputProvider;
use crate::domain::{MutableTransaction, SpvError};
use crate::plugins::{PluginParams, PluginRegistry};
use crate::ports::{AddressConverter, BloomFilterManager, TransactionBuilder, TransactionSender};

/// A payment to create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentRequest {
    pub address: String,
    /// Satoshis.
    pub value: u64,
    /// Satoshis per byte.
    pub fee_rate: u64,
    pub sender_pays: bool,
    pub plugin_params: PluginParams,
}

impl PaymentRequest {
    pub fn new(address: impl Into<String>, value: u64, fee_rate: u64) -> Self {
        Self {
            address: address.into(),
            value,
            fee_rate,
            sender_pays: true,
            plugin_params: PluginParams::new(),
        }
    }

    pub fn with_plugin_params(mut self, params: PluginParams) -> Self {
        self.plugin_params = params;
        self
    }
}

/// Collaborators of a [`TransactionCreator`].
pub struct TransactionCreatorParts {
    pub address_converter: Arc<dyn AddressConverter>,
    pub plugins: Arc<PluginRegistry>,
    pub unspent_outputs: Arc<UnspentOutputProvider>,
    pub builder: Arc<dyn TransactionBuilder>,
    pub processor: Arc<TransactionProcessor>,
    pub bloom_filter: Arc<dyn BloomFilterManager>,
    pub sender: Arc<dyn TransactionSender>,
}

/// Outgoing payment pipeline.
pub struct TransactionCreator {
    parts: TransactionCreatorParts,
}

impl TransactionCreator {
    pub fn new(parts: TransactionCreatorParts) -> Self {
        Self { parts }
    }

    /// Build and store the payment, then ask the sender to broadcast.
    ///
    /// Broadcast failures are logged; the transaction stays stored as
    /// `New` and is retried with the next send.
    pub async fn create(&self, request: PaymentRequest) -> Result<FullTransaction, SpvError> {
        let parts = &self.parts;

        let recipient = parts.address_converter.parse(&request.address)?;
        let mut draft = MutableTransaction::new(recipient, request.value, request.fee_rate, request.sender_pays);
        parts.plugins.process_outputs(&mut draft, &request.plugin_params)?;

        let unspent = parts.unspent_outputs.spendable()?;
        parts.builder.select_inputs(&mut draft, &unspent)?;
        parts.plugins.process_inputs(&mut draft)?;

        let transaction = parts.builder.build(draft)?;
        let filter = parts.processor.process_outgoing(transaction.clone())?;
        if filter.is_stale() {
            parts.bloom_filter.regenerate();
        }

        if let Err(e) = parts.sender.send_pending_transactions().await {
            tracing::warn!(
                tx_hash = %transaction.header.hash_hex(),
                error = %e,
                "[spv-sync] broadcast deferred"
            );
        }
        Ok(transaction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::InMemoryStorage;
    use crate::application::transaction_extractor::TransactionExtractor;
    use crate::ports::mocks::{
        FixedMedianTime, MockAddressConverter, MockBloomFilterManager, MockKeyManager,
        MockTransactionBuilder, MockTransactionSender, RecordingListener,
    };
    use crate::ports::Storage;
    use shared_types::script::p2pkh_script;
    use shared_types::{Block, BlockHeader, Transaction, TransactionInput, TransactionOutput, TransactionStatus};

    struct Fixture {
        storage: Arc<InMemoryStorage>,
        bloom: Arc<MockBloomFilterManager>,
        sender: Arc<MockTransactionSender>,
        creator: TransactionCreator,
    }

    fn fixture(sender: MockTransactionSender) -> Fixture {
        let storage = Arc::new(InMemoryStorage::new());
        let keys = Arc::new(MockKeyManager::generate(2));
        let converter = Arc::new(MockAddressConverter);
        let plugins = Arc::new(PluginRegistry::empty(converter.clone()));
        let listener = Arc::new(RecordingListener::default());
        let extractor = TransactionExtractor::new(storage.clone(), keys.clone(), converter.clone(), plugins.clone());
        let processor =
            Arc::new(TransactionProcessor::new(storage.clone(), extractor, keys.clone(), listener).unwrap());
        let unspent_outputs = Arc::new(UnspentOutputProvider::new(
            storage.clone(),
            keys.clone(),
            plugins.clone(),
            Arc::new(FixedMedianTime(Some(0))),
            0,
        ));

        // One confirmed wallet output of 10_000.
        let block = Block::new(BlockHeader::new(1, [0u8; 32], [0u8; 32], 1, 0x207fffff, 0), 0);
        storage.add_block(&block).unwrap();
        let key = keys.keys()[0].clone();
        let mut output = TransactionOutput::new(10_000, 0, p2pkh_script(&key.key_hash));
        output.public_key_path = Some(key.path.clone());
        let funding = FullTransaction::new(
            Transaction {
                block_hash: Some(block.header.hash),
                status: TransactionStatus::Relayed,
                is_mine: true,
                ..Transaction::default()
            },
            vec![TransactionInput::new([1; 32], 0, 0)],
            vec![output],
        );
        storage.add_transaction(&funding).unwrap();

        let bloom = Arc::new(MockBloomFilterManager::default());
        let sender = Arc::new(sender);
        let creator = TransactionCreator::new(TransactionCreatorParts {
            address_converter: converter,
            plugins,
            unspent_outputs,
            builder: Arc::new(MockTransactionBuilder),
            processor,
            bloom_filter: bloom.clone(),
            sender: sender.clone(),
        });
        Fixture {
            storage,
            bloom,
            sender,
            creator,
        }
    }

    fn recipient() -> String {
        format!("pkh:{}", hex::encode([0xab; 20]))
    }

    #[tokio::test]
    async fn test_create_stores_and_sends() {
        let f = fixture(MockTransactionSender::default());
        let tx = f.creator.create(PaymentRequest::new(recipient(), 5_000, 1)).await.unwrap();

        let stored = f.storage.transaction(&tx.header.hash).unwrap().unwrap();
        assert_eq!(stored.status, TransactionStatus::New);
        assert!(stored.is_outgoing);
        assert_eq!(f.sender.sends(), 1);
        assert_eq!(f.bloom.regenerations(), 0);
        assert_eq!(f.storage.new_transactions().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_send_failure_keeps_transaction() {
        let f = fixture(MockTransactionSender::failing());
        let tx = f.creator.create(PaymentRequest::new(recipient(), 5_000, 1)).await.unwrap();
        assert!(f.storage.transaction(&tx.header.hash).unwrap().is_some());
    }

    #[tokio::test]
    async fn test_insufficient_funds() {
        let f = fixture(MockTransactionSender::default());
        let result = f.creator.create(PaymentRequest::new(recipient(), 50_000, 1)).await;
        assert!(matches!(result, Err(SpvError::TransactionBuild(_))));
        assert_eq!(f.sender.sends(), 0);
    }

    #[tokio::test]
    async fn test_bad_address() {
        let f = fixture(MockTransactionSender::default());
        let result = f.creator.create(PaymentRequest::new("nonsense", 1, 1)).await;
        assert!(matches!(result, Err(SpvError::Address(_))));
    }
}
