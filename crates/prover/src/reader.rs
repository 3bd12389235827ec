use std::{fmt, time::Duration};

use alloy_primitives::B256;
use async_trait::async_trait;
use surge_chainio::taiko::inbox::TaikoInbox;
use surge_clients::execution::ExecutionClient;
use surge_primitives::batch::{BatchId, BatchMetadata, Transition};

use crate::{PipelineError, error::with_timeout};

/// The hash and state root of an L2 block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct L2BlockRef {
    /// The block hash.
    pub hash: B256,
    /// The state root after the block.
    pub state_root: B256,
}

/// The on-chain record of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OnchainBatch {
    /// The last L2 block of the batch.
    pub last_block_id: u64,
    /// The L1 block the batch is anchored to.
    pub anchor_block_id: u64,
}

/// Read access to the protocol state, on L1 and L2.
#[async_trait]
pub trait ProtocolReader: Send + Sync + fmt::Debug {
    /// Returns the ID of the last verified batch.
    async fn last_verified_batch_id(&self) -> Result<BatchId, PipelineError>;

    /// Returns the on-chain record of a batch.
    async fn batch(&self, batch_id: BatchId) -> Result<OnchainBatch, PipelineError>;

    /// Returns the local L2 block with the given number.
    async fn l2_block(&self, number: u64) -> Result<L2BlockRef, PipelineError>;

    /// Returns the transition of the batch, according to the local L2 chain.
    async fn transition(&self, meta: &BatchMetadata) -> Result<Transition, PipelineError> {
        let parent = self.l2_block(meta.first_block_id.saturating_sub(1)).await?;
        let last = self.l2_block(meta.last_block_id).await?;

        Ok(Transition {
            parent_hash: parent.hash,
            block_hash: last.hash,
            state_root: last.state_root,
        })
    }
}

/// A [`ProtocolReader`] backed by the inbox contract and the L2 execution client.
#[derive(Debug, Clone)]
pub struct RpcProtocolReader {
    inbox: TaikoInbox,
    l2: ExecutionClient,
    timeout: Duration,
}

impl RpcProtocolReader {
    /// Creates a new reader. Every call is bounded by `timeout`.
    pub const fn new(inbox: TaikoInbox, l2: ExecutionClient, timeout: Duration) -> Self {
        Self { inbox, l2, timeout }
    }
}

#[async_trait]
impl ProtocolReader for RpcProtocolReader {
    async fn last_verified_batch_id(&self) -> Result<BatchId, PipelineError> {
        with_timeout(self.timeout, self.inbox.last_verified_batch_id()).await
    }

    async fn batch(&self, batch_id: BatchId) -> Result<OnchainBatch, PipelineError> {
        let batch = with_timeout(self.timeout, self.inbox.get_batch(batch_id)).await?;
        Ok(OnchainBatch { last_block_id: batch.lastBlockId, anchor_block_id: batch.anchorBlockId })
    }

    async fn l2_block(&self, number: u64) -> Result<L2BlockRef, PipelineError> {
        let header = with_timeout(self.timeout, self.l2.get_header(Some(number)))
            .await
            .map_err(|e| match e {
                PipelineError::Transport(_) => PipelineError::MissingL2Block(number),
                other => other,
            })?;
        Ok(L2BlockRef { hash: header.hash, state_root: header.state_root })
    }
}
