use alloy::{consensus::BlobTransactionSidecar, eips::eip4844::BYTES_PER_BLOB};
use alloy_primitives::{Address, B256, BlockNumber, Bytes, U256};
use serde::{Deserialize, Serialize};

use crate::{summary::Summary, tier::ProofTier};

/// A batch ID alias.
pub type BatchId = u64;

/// Identifies a proposed batch of L2 blocks, as observed in a `BatchProposed` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchMetadata {
    /// The unique, monotonic batch ID.
    pub batch_id: BatchId,
    /// The L1 block in which the batch was proposed.
    pub proposed_in: BlockNumber,
    /// The L1 timestamp at which the batch was proposed.
    pub proposed_at: u64,
    /// The account that proposed the batch.
    pub proposer: Address,
    /// The L2 fee recipient of the batch.
    pub coinbase: Address,
    /// The minimum proof tier required for this batch.
    pub min_tier: ProofTier,
    /// The hash of the batch info struct.
    pub info_hash: B256,
    /// The hash of the batch metadata struct.
    pub meta_hash: B256,
    /// The first L2 block ID of the batch.
    pub first_block_id: u64,
    /// The last L2 block ID of the batch.
    pub last_block_id: u64,
}

impl BatchMetadata {
    /// Returns the number of L2 blocks in this batch.
    pub const fn block_count(&self) -> u64 {
        self.last_block_id.saturating_sub(self.first_block_id) + 1
    }
}

impl Summary for BatchMetadata {
    fn summary(&self) -> String {
        format!(
            "batch_id={}, proposed_in={}, proposer={}, blocks={}..={}, min_tier={}",
            self.batch_id,
            self.proposed_in,
            self.proposer,
            self.first_block_id,
            self.last_block_id,
            self.min_tier
        )
    }
}

/// The claimed state change of a batch, as verified by the inbox contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transition {
    /// Hash of the L2 block preceding the batch.
    pub parent_hash: B256,
    /// Hash of the last L2 block of the batch.
    pub block_hash: B256,
    /// State root after the last L2 block of the batch.
    pub state_root: B256,
}

/// A request to generate a proof of the given tier for a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProofRequest {
    /// The batch to prove.
    pub meta: BatchMetadata,
    /// The requested tier, which may be stronger than `meta.min_tier`.
    pub tier: ProofTier,
}

impl ProofRequest {
    /// Creates a request at the minimum tier of the batch.
    pub fn at_min_tier(meta: BatchMetadata) -> Self {
        let tier = meta.min_tier;
        Self { meta, tier }
    }

    /// Returns the batch ID of the request.
    pub const fn batch_id(&self) -> BatchId {
        self.meta.batch_id
    }
}

/// A generated proof, owned by the pipeline until it is submitted on-chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProofResult {
    /// The proven batch.
    pub meta: BatchMetadata,
    /// The tier of the proof.
    pub tier: ProofTier,
    /// The transition being proven.
    pub transition: Transition,
    /// The raw proof bytes returned by the proof service.
    pub proof: Bytes,
}

impl ProofResult {
    /// Returns the batch ID of the proof.
    pub const fn batch_id(&self) -> BatchId {
        self.meta.batch_id
    }
}

/// A request to contest a transition proven on-chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContestRequest {
    /// The batch whose transition is contested.
    pub meta: BatchMetadata,
    /// The transition this node considers to be correct.
    pub transition: Transition,
    /// The tier of the proof being contested.
    pub tier: ProofTier,
    /// Unix timestamp after which contesting is pointless (cooldown window elapsed).
    pub deadline: u64,
}

/// An L1 transaction candidate, handed over to a transaction manager.
///
/// Built fresh for every attempt and never mutated after it is handed off.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxCandidate {
    /// Target contract.
    pub to: Address,
    /// Transaction calldata.
    pub data: Bytes,
    /// Value to transfer.
    pub value: U256,
    /// Optional gas limit. If `None`, the transaction manager estimates it.
    pub gas_limit: Option<u64>,
    /// Optional blob sidecar for EIP-4844 transactions.
    pub sidecar: Option<BlobTransactionSidecar>,
}

impl TxCandidate {
    /// Creates a new calldata-only candidate.
    pub const fn new(to: Address, data: Bytes) -> Self {
        Self { to, data, value: U256::ZERO, gas_limit: None, sidecar: None }
    }

    /// Attaches a blob sidecar to the candidate.
    pub fn with_sidecar(mut self, sidecar: BlobTransactionSidecar) -> Self {
        self.sidecar = Some(sidecar);
        self
    }

    /// Sets an explicit gas limit.
    pub const fn with_gas_limit(mut self, gas_limit: u64) -> Self {
        self.gas_limit = Some(gas_limit);
        self
    }

    /// Returns the number of blobs carried by the candidate.
    pub fn blob_count(&self) -> usize {
        self.sidecar.as_ref().map_or(0, |s| s.blobs.len())
    }

    /// Returns the total blob bytes carried by the candidate.
    pub fn blob_bytes(&self) -> usize {
        self.blob_count() * BYTES_PER_BLOB
    }
}

impl Summary for TxCandidate {
    fn summary(&self) -> String {
        format!(
            "to={}, calldata={}b, blobs={}, value={}, gas_limit={:?}",
            self.to,
            self.data.len(),
            self.blob_count(),
            self.value,
            self.gas_limit
        )
    }
}
