use ITaikoInbox::{
    Batch, BatchParams, BatchProposed, ITaikoInboxErrors, ITaikoInboxInstance, ProtocolConfig, Stats2,
    Transition as SolTransition,
};
use alloy::{
    contract::Result as ContractResult,
    providers::ProviderBuilder,
    rpc::{client::ClientBuilder, types::Filter},
    sol,
};
use alloy_primitives::{Address, B256, Bytes, U256, keccak256};
use alloy_sol_types::{Error as SolError, SolEvent, SolValue};
use derive_more::derive::Deref;
use surge_primitives::{
    batch::{BatchId, BatchMetadata, Transition},
    retries::DEFAULT_RETRY_LAYER,
    summary::Summary,
    tier::ProofTier,
};
use url::Url;

use crate::{DefaultProvider, try_parse_contract_error};

/// A read-only wrapper over a `ITaikoInbox` contract.
///
/// Write operations only build calldata: sending is left to a
/// [`TransactionManager`](crate::tx_manager::TransactionManager).
#[derive(Debug, Clone, Deref)]
pub struct TaikoInbox(ITaikoInboxInstance<DefaultProvider>);

impl TaikoInbox {
    /// Create a new `TaikoInbox` instance at the given contract address.
    pub fn new<U: Into<Url>>(el_client_url: U, address: Address) -> Self {
        let client = ClientBuilder::default().layer(DEFAULT_RETRY_LAYER).http(el_client_url.into());
        let provider = ProviderBuilder::new().connect_client(client);

        Self(ITaikoInboxInstance::new(address, provider))
    }

    /// Retrieves the current protocol configuration.
    pub async fn get_pacaya_config(&self) -> ContractResult<ProtocolConfig> {
        match self.0.pacayaConfig().call().await {
            Ok(config) => Ok(config),
            Err(err) => {
                let decoded_error = try_parse_contract_error::<ITaikoInboxErrors>(err)?;
                Err(SolError::custom(format!("{:?}", decoded_error)).into())
            }
        }
    }

    /// Retrieves the current batch counters.
    pub async fn get_stats2(&self) -> ContractResult<Stats2> {
        self.0.getStats2().call().await
    }

    /// Returns the ID of the last verified batch.
    pub async fn last_verified_batch_id(&self) -> ContractResult<BatchId> {
        Ok(self.get_stats2().await?.lastVerifiedBatchId)
    }

    /// Returns the bond balance the account deposited into the inbox.
    pub async fn bond_balance_of(&self, account: Address) -> ContractResult<U256> {
        self.0.bondBalanceOf(account).call().await
    }

    /// Retrieves the meta hash of the latest proposed batch, used as parent meta hash of the
    /// next proposal.
    pub async fn get_parent_meta_hash(&self) -> ContractResult<B256> {
        let stats2 = self.get_stats2().await?;
        Ok(self.get_batch(stats2.numBatches.saturating_sub(1)).await?.metaHash)
    }

    /// Retrieves the on-chain record of a batch.
    pub async fn get_batch(&self, batch_id: BatchId) -> ContractResult<Batch> {
        match self.0.getBatch(batch_id).call().await {
            Ok(batch) => Ok(batch),
            Err(err) => {
                let decoded_error = try_parse_contract_error::<ITaikoInboxErrors>(err)?;
                Err(SolError::custom(format!("{:?}", decoded_error)).into())
            }
        }
    }

    /// Builds the calldata of a `proposeBatch` call.
    pub fn propose_batch_calldata(&self, params: Bytes, tx_list: Bytes) -> Bytes {
        self.0.proposeBatch(params, tx_list).calldata().clone()
    }

    /// Builds the calldata of a `proveBatches` call for a single batch.
    pub fn prove_batch_calldata(
        &self,
        meta: &BatchMetadata,
        transition: Transition,
        proof: Bytes,
    ) -> Bytes {
        let metas = vec![ITaikoInbox::BatchMetadata::from(meta)];
        let transitions = vec![SolTransition::from(transition)];
        let params = Bytes::from((metas, transitions).abi_encode_params());

        self.0.proveBatches(params, proof).calldata().clone()
    }

    /// Builds the calldata of a `contestBatch` call.
    pub fn contest_batch_calldata(
        &self,
        batch_id: BatchId,
        transition: Transition,
        tier: ProofTier,
    ) -> Bytes {
        self.0.contestBatch(batch_id, transition.into(), tier.id()).calldata().clone()
    }

    /// Returns a log [`Filter`] matching every protocol event the prover reacts to.
    pub fn protocol_events_filter(&self) -> Filter {
        Filter::new().address(*self.0.address()).event_signature(vec![
            ITaikoInbox::BatchProposed::SIGNATURE_HASH,
            ITaikoInbox::BatchesVerified::SIGNATURE_HASH,
            ITaikoInbox::TransitionProved::SIGNATURE_HASH,
            ITaikoInbox::TransitionContested::SIGNATURE_HASH,
            ITaikoInbox::BatchesRollbacked::SIGNATURE_HASH,
        ])
    }

    /// Returns a log [`Filter`] based on the `BatchProposed` event.
    pub fn batch_proposed_filter(&self) -> Filter {
        self.0.BatchProposed_filter().filter
    }
}

impl BatchProposed {
    /// Returns the first L2 block number proposed in this batch.
    pub fn first_block_number(&self) -> u64 {
        let count = self.info.blocks.len() as u64;
        self.info.lastBlockId.saturating_sub(count.saturating_sub(1))
    }

    /// Returns the last L2 block number proposed in this batch.
    pub const fn last_block_number(&self) -> u64 {
        self.info.lastBlockId
    }

    /// Returns the hash of the batch metadata, as stored by the inbox.
    pub fn meta_hash(&self) -> B256 {
        keccak256(self.meta.abi_encode())
    }

    /// Converts the event into the node's [`BatchMetadata`], with the given minimum tier.
    pub fn to_batch_metadata(&self, min_tier: ProofTier) -> BatchMetadata {
        BatchMetadata {
            batch_id: self.meta.batchId,
            proposed_in: self.info.proposedIn,
            proposed_at: self.meta.proposedAt,
            proposer: self.meta.proposer,
            coinbase: self.info.coinbase,
            min_tier,
            info_hash: self.meta.infoHash,
            meta_hash: self.meta_hash(),
            first_block_id: self.first_block_number(),
            last_block_id: self.last_block_number(),
        }
    }
}

impl From<&BatchMetadata> for ITaikoInbox::BatchMetadata {
    fn from(meta: &BatchMetadata) -> Self {
        Self {
            infoHash: meta.info_hash,
            proposer: meta.proposer,
            batchId: meta.batch_id,
            proposedAt: meta.proposed_at,
        }
    }
}

impl From<Transition> for SolTransition {
    fn from(t: Transition) -> Self {
        Self { parentHash: t.parent_hash, blockHash: t.block_hash, stateRoot: t.state_root }
    }
}

impl From<SolTransition> for Transition {
    fn from(t: SolTransition) -> Self {
        Self { parent_hash: t.parentHash, block_hash: t.blockHash, state_root: t.stateRoot }
    }
}

impl Summary for BatchProposed {
    fn summary(&self) -> String {
        format!(
            "batch_id={}, proposer={}, coinbase={}, blobs={}, proposed_in={}, blocks={}..={}, anchor_block_id={}",
            self.meta.batchId,
            self.meta.proposer,
            self.info.coinbase,
            self.info.blobHashes.len(),
            self.info.proposedIn,
            self.first_block_number(),
            self.info.lastBlockId,
            self.info.anchorBlockId,
        )
    }
}

impl Summary for BatchParams {
    fn summary(&self) -> String {
        let txs = self.blocks.iter().map(|b| u64::from(b.numTransactions)).sum::<u64>();
        format!(
            "blocks={}, txs={}, blobs={}, byte_offset={}, byte_size={}, coinbase={}",
            self.blocks.len(),
            txs,
            self.blobParams.numBlobs,
            self.blobParams.byteOffset,
            self.blobParams.byteSize,
            self.coinbase
        )
    }
}

sol! {
    #[allow(missing_docs)]
    #[sol(rpc)]
    #[derive(Debug)]
    interface ITaikoInbox {
        error AnchorBlockIdSmallerThanParent();
        error AnchorBlockIdTooLarge();
        error AnchorBlockIdTooSmall();
        error ArraySizesMismatch();
        error BatchNotFound();
        error BatchVerified();
        error BeyondCurrentFork();
        error BlobNotFound();
        error BlockNotFound();
        error BlobNotSpecified();
        error ContractPaused();
        error CustomProposerMissing();
        error CustomProposerNotAllowed();
        error EtherNotPaidAsBond();
        error FirstBlockTimeShiftNotZero();
        error ForkNotActivated();
        error InsufficientBond();
        error InvalidBlobCreatedIn();
        error InvalidBlobParams();
        error InvalidGenesisBlockHash();
        error InvalidParams();
        error InvalidTransitionBlockHash();
        error InvalidTransitionParentHash();
        error InvalidTransitionStateRoot();
        error MetaHashMismatch();
        error MsgValueNotZero();
        error NoBlocksToProve();
        error NotFirstProposal();
        error NotInboxWrapper();
        error ParentMetaHashMismatch();
        error SameTransition();
        error SignalNotSent();
        error TimestampSmallerThanParent();
        error TimestampTooLarge();
        error TimestampTooSmall();
        error TooManyBatches();
        error TooManyBlocks();
        error TooManySignals();
        error TransitionNotFound();
        error ZeroAnchorBlockHash();
        error Error(string);

        // Proving and contesting errors.
        error AlreadyContested();
        error AssignmentNotExpired();
        error CooldownWindowElapsed();
        error InvalidTier();
        error ProofTierTooLow();
        error TransitionAlreadyProved();

        // Errors raised by the forced inclusion wrapper.
        error InvalidBlockTxs();
        error InvalidBlobHashesSize();
        error InvalidBlobHash();
        error InvalidBlobByteOffset();
        error InvalidBlobByteSize();
        error InvalidBlockSize();
        error InvalidTimeShift();
        error InvalidSignalSlots();
        error OldestForcedInclusionDue();

        #[derive(Default)]
        event BatchProposed(BatchInfo info, BatchMetadata meta, bytes txList);

        event BatchesProved(address verifier, uint64[] batchIds, Transition[] transitions);

        event BatchesVerified(uint64 batchId, bytes32 blockHash);

        event TransitionProved(uint64 indexed batchId, Transition tran, address prover, uint16 tier);

        event TransitionContested(uint64 indexed batchId, Transition tran, address contester, uint16 tier);

        event BatchesRollbacked(uint64 startId, uint64 endId);

        #[derive(Copy, Default)]
        struct BaseFeeConfig {
            uint8 adjustmentQuotient;
            uint8 sharingPctg;
            uint32 gasIssuancePerSecond;
            uint64 minGasExcess;
            uint32 maxGasIssuancePerBlock;
        }

        #[derive(Default)]
        struct BlockParams {
            // Number of transactions in the block
            uint16 numTransactions;
            // Time shift in seconds
            uint8 timeShift;
            // Signals sent on L1 and need to sync to this L2 block.
            bytes32[] signalSlots;
        }

        #[derive(Default)]
        struct BatchInfo {
            bytes32 txsHash;
            BlockParams[] blocks;
            bytes32[] blobHashes;
            bytes32 extraData;
            address coinbase;
            uint64 proposedIn;
            uint64 blobCreatedIn;
            uint32 blobByteOffset;
            uint32 blobByteSize;
            uint32 gasLimit;
            uint64 lastBlockId;
            uint64 lastBlockTimestamp;
            uint64 anchorBlockId;
            bytes32 anchorBlockHash;
            BaseFeeConfig baseFeeConfig;
        }

        #[derive(Default)]
        struct BatchMetadata {
            bytes32 infoHash;
            address proposer;
            uint64 batchId;
            uint64 proposedAt;
        }

        #[derive(Default)]
        struct BlobParams {
            // Explicit blob hashes. If not empty, `firstBlobIndex` and `numBlobs` must be 0.
            bytes32[] blobHashes;
            uint8 firstBlobIndex;
            uint8 numBlobs;
            uint32 byteOffset;
            uint32 byteSize;
            uint64 createdIn;
        }

        #[derive(Default)]
        struct BatchParams {
            address proposer;
            address coinbase;
            bytes32 parentMetaHash;
            uint64 anchorBlockId;
            uint64 lastBlockTimestamp;
            bool revertIfNotFirstProposal;
            BlobParams blobParams;
            BlockParams[] blocks;
        }

        #[derive(Default)]
        struct Transition {
            bytes32 parentHash;
            bytes32 blockHash;
            bytes32 stateRoot;
        }

        #[derive(Default)]
        struct ForkHeights {
            uint64 ontake;
            uint64 pacaya;
        }

        #[derive(Default)]
        struct ProtocolConfig {
            uint64 chainId;
            uint64 maxUnverifiedBatches;
            uint64 batchRingBufferSize;
            uint64 maxBatchesToVerify;
            uint32 blockMaxGasLimit;
            uint96 livenessBondBase;
            uint96 livenessBondPerBlock;
            uint8 stateRootSyncInternal;
            uint64 maxAnchorHeightOffset;
            BaseFeeConfig baseFeeConfig;
            uint16 provingWindow;
            uint24 cooldownWindow;
            uint8 maxSignalsToReceive;
            uint16 maxBlocksPerBatch;
            ForkHeights forkHeights;
        }

        struct Batch {
            bytes32 metaHash;
            uint64 lastBlockId;
            uint96 reserved3;
            uint96 livenessBond;
            uint64 batchId;
            uint64 lastBlockTimestamp;
            uint64 anchorBlockId;
            uint24 nextTransitionId;
            uint8 reserved4;
            uint24 verifiedTransitionId;
        }

        struct Stats2 {
            uint64 numBatches;
            uint64 lastVerifiedBatchId;
            bool paused;
            uint56 lastProposedIn;
            uint64 lastUnpausedAt;
        }

        /// @notice Proposes a batch of blocks.
        /// @param _params ABI-encoded BatchParams.
        /// @param _txList The transaction list in calldata. If empty, blobs carry the payload.
        function proposeBatch(
            bytes calldata _params,
            bytes calldata _txList
        )
            external
            returns (BatchInfo memory info_, BatchMetadata memory meta_);

        /// @notice Proves state transitions for multiple batches with a single aggregated proof.
        /// @param _params ABI-encoded (BatchMetadata[], Transition[]).
        /// @param _proof The aggregated proof.
        function proveBatches(bytes calldata _params, bytes calldata _proof) external;

        /// @notice Contests the transition proven for a batch.
        function contestBatch(uint64 _batchId, Transition calldata _tran, uint16 _tier) external;

        function pacayaConfig() external view returns (ProtocolConfig memory);

        function getStats2() external view returns (Stats2 memory);

        function getBatch(uint64 batchId) public view returns (Batch memory);

        function bondBalanceOf(address _user) external view returns (uint256);

        function bondToken() external view returns (address);
    }
}

impl ProtocolConfig {
    /// Returns the minimum bond required to propose a batch with the given number of blocks.
    pub fn required_bond(&self, blocks: usize) -> U256 {
        let base = U256::from(self.livenessBondBase);
        let per_block = U256::from(self.livenessBondPerBlock);
        base + per_block * U256::from(blocks)
    }
}
