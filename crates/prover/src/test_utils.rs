use std::{
    collections::HashMap,
    sync::{Mutex, PoisonError},
};

use alloy::rpc::types::Header;
use alloy_primitives::{Address, B256, BlockNumber};
use async_trait::async_trait;
use clap::Parser;
use surge_chainio::taiko::inbox::{ITaikoInbox::ProtocolConfig, TaikoInbox};
use surge_config::Opts;
use surge_primitives::{
    batch::{BatchId, BatchMetadata},
    tier::ProofTier,
};
use url::Url;

use crate::{
    PipelineError, RuntimeConfig,
    event::ObservedEvent,
    iterator::EventSource,
    reader::{L2BlockRef, OnchainBatch, ProtocolReader},
};

/// Address of the local prover, as returned by the mock transaction manager.
pub(crate) const LOCAL_PROVER: Address = Address::repeat_byte(0xaa);

pub(crate) fn batch_meta(batch_id: BatchId, proposed_in: BlockNumber) -> BatchMetadata {
    BatchMetadata {
        batch_id,
        proposed_in,
        proposed_at: 1_700_000_000 + batch_id * 12,
        proposer: LOCAL_PROVER,
        coinbase: LOCAL_PROVER,
        min_tier: ProofTier::Optimistic,
        info_hash: B256::with_last_byte(batch_id as u8),
        meta_hash: B256::with_last_byte(batch_id as u8),
        first_block_id: batch_id * 10 + 1,
        last_block_id: batch_id * 10 + 10,
    }
}

pub(crate) fn inbox() -> TaikoInbox {
    TaikoInbox::new(Url::parse("http://localhost:8545").unwrap(), Address::repeat_byte(0x1b))
}

pub(crate) fn runtime_config(extra: &[&str]) -> RuntimeConfig {
    let mut args = vec![
        "surge",
        "--l1.el-url",
        "http://localhost:8545",
        "--l2.el-url",
        "http://localhost:28545",
        "--l2.engine-url",
        "http://localhost:28551",
        "--l2.jwt-secret",
        "0x2aa5ef6bbd2c7c3be33fb5e0fde8c0c3f07c3e8a4ed1c2a5c7a8f8b6d3e1f0a9",
        "--operator.private-key",
        "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80",
        "--contracts.taiko-inbox",
        "0x1b1b1b1b1b1b1b1b1b1b1b1b1b1b1b1b1b1b1b1b",
        "--contracts.taiko-token",
        "0x0000000000000000000000000000000000000002",
        "--contracts.taiko-anchor",
        "0x0000000000000000000000000000000000000003",
        "--prover.dummy",
        "--prover.retry-interval",
        "0",
        "--prover.max-retries",
        "2",
    ];
    args.extend_from_slice(extra);

    let opts = Opts::try_parse_from(args).unwrap();
    let protocol = ProtocolConfig {
        chainId: 763374,
        maxUnverifiedBatches: 256,
        provingWindow: 7200,
        cooldownWindow: alloy_primitives::aliases::U24::from(3600),
        ..Default::default()
    };
    RuntimeConfig { opts, protocol }
}

/// An [`EventSource`] over a fixed list of events.
#[derive(Debug, Default)]
pub(crate) struct MockEventSource {
    pub(crate) head: Mutex<BlockNumber>,
    pub(crate) events: Mutex<Vec<ObservedEvent>>,
}

impl MockEventSource {
    pub(crate) fn push(&self, event: ObservedEvent) {
        let mut head = self.head.lock().unwrap_or_else(PoisonError::into_inner);
        *head = (*head).max(event.block_number);
        self.events.lock().unwrap_or_else(PoisonError::into_inner).push(event);
    }
}

#[async_trait]
impl EventSource for MockEventSource {
    async fn head(&self) -> Result<BlockNumber, PipelineError> {
        Ok(*self.head.lock().unwrap_or_else(PoisonError::into_inner))
    }

    async fn header(&self, number: BlockNumber) -> Result<Header, PipelineError> {
        let mut header: Header = Header::default();
        header.inner.number = number;
        Ok(header)
    }

    async fn events(
        &self,
        from: BlockNumber,
        to: BlockNumber,
    ) -> Result<Vec<ObservedEvent>, PipelineError> {
        Ok(self
            .events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|e| (from..=to).contains(&e.block_number))
            .cloned()
            .collect())
    }
}

/// A [`ProtocolReader`] with a configurable verified batch, and an L2 chain where block `n`
/// has hash `n`, unless overridden.
#[derive(Debug, Default)]
pub(crate) struct MockReader {
    pub(crate) last_verified: Mutex<BatchId>,
    pub(crate) l2_overrides: Mutex<HashMap<u64, B256>>,
}

impl MockReader {
    pub(crate) fn with_last_verified(last_verified: BatchId) -> Self {
        Self { last_verified: Mutex::new(last_verified), ..Default::default() }
    }

    pub(crate) fn l2_hash(&self, number: u64) -> B256 {
        self.l2_overrides
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&number)
            .copied()
            .unwrap_or_else(|| B256::left_padding_from(&number.to_be_bytes()))
    }
}

#[async_trait]
impl ProtocolReader for MockReader {
    async fn last_verified_batch_id(&self) -> Result<BatchId, PipelineError> {
        Ok(*self.last_verified.lock().unwrap_or_else(PoisonError::into_inner))
    }

    async fn batch(&self, batch_id: BatchId) -> Result<OnchainBatch, PipelineError> {
        Ok(OnchainBatch { last_block_id: batch_id * 10 + 10, anchor_block_id: batch_id })
    }

    async fn l2_block(&self, number: u64) -> Result<L2BlockRef, PipelineError> {
        Ok(L2BlockRef { hash: self.l2_hash(number), state_root: B256::repeat_byte(0x5e) })
    }
}
