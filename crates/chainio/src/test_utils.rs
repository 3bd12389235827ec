use std::{
    collections::VecDeque,
    sync::{Mutex, PoisonError},
};

use alloy::{
    consensus::{Eip658Value, Receipt, ReceiptEnvelope, ReceiptWithBloom},
    rpc::types::TransactionReceipt,
};
use alloy_primitives::{Address, B256, Bloom, keccak256};
use async_trait::async_trait;
use surge_primitives::batch::TxCandidate;

use crate::tx_manager::{TransactionManager, TxManagerError};

/// Builds a successful receipt for the given transaction hash.
pub fn mock_receipt(transaction_hash: B256) -> TransactionReceipt {
    let receipt = Receipt { status: Eip658Value::Eip658(true), ..Default::default() };
    TransactionReceipt {
        inner: ReceiptEnvelope::Eip1559(ReceiptWithBloom::new(receipt, Bloom::ZERO)),
        transaction_hash,
        transaction_index: None,
        block_hash: None,
        block_number: Some(1),
        gas_used: 21_000,
        effective_gas_price: 1,
        blob_gas_used: None,
        blob_gas_price: None,
        from: Address::ZERO,
        to: None,
        contract_address: None,
    }
}

/// A [`TransactionManager`] that records every candidate, and fails with queued errors.
#[derive(Debug, Default)]
pub struct MockTxManager {
    sent: Mutex<Vec<TxCandidate>>,
    failures: Mutex<VecDeque<TxManagerError>>,
}

impl MockTxManager {
    /// Creates a manager where every send succeeds.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next send fail with the given error.
    pub fn fail_next(&self, err: TxManagerError) {
        self.failures.lock().unwrap_or_else(PoisonError::into_inner).push_back(err);
    }

    /// Returns every candidate handed over so far, including failed ones.
    pub fn sent(&self) -> Vec<TxCandidate> {
        self.sent.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Returns the number of send attempts.
    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

#[async_trait]
impl TransactionManager for MockTxManager {
    async fn send(&self, candidate: TxCandidate) -> Result<TransactionReceipt, TxManagerError> {
        let hash = keccak256(&candidate.data);
        self.sent.lock().unwrap_or_else(PoisonError::into_inner).push(candidate);

        if let Some(err) = self.failures.lock().unwrap_or_else(PoisonError::into_inner).pop_front() {
            return Err(err)
        }
        Ok(mock_receipt(hash))
    }

    fn sender(&self) -> Address {
        Address::repeat_byte(0xaa)
    }
}
