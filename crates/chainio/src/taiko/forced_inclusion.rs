use IForcedInclusionStore::{ForcedInclusion, IForcedInclusionStoreInstance};
use ITaikoWrapper::ITaikoWrapperInstance;
use alloy::{
    contract::Result as ContractResult, primitives::Address, providers::ProviderBuilder,
    rpc::client::ClientBuilder, sol,
};
use alloy_primitives::U256;
use surge_primitives::{retries::DEFAULT_RETRY_LAYER, summary::Summary};
use url::Url;

use crate::DefaultProvider;

/// The oldest pending forced inclusion, alongside the minimum number of transactions the
/// wrapper requires for the block that carries it.
#[derive(Debug, Clone)]
pub struct PendingForcedInclusion {
    /// The forced inclusion request at the head of the queue.
    pub inclusion: ForcedInclusion,
    /// The number of transactions the forced inclusion block must declare.
    pub min_txs: u16,
}

/// A wrapper over the `TaikoWrapper.sol` contract and its forced inclusion store.
///
/// When configured, proposals go through the wrapper, which enforces that due forced
/// inclusions are processed first.
#[derive(Debug, Clone)]
pub struct TaikoWrapper {
    wrapper: ITaikoWrapperInstance<DefaultProvider>,
    store: IForcedInclusionStoreInstance<DefaultProvider>,
}

impl TaikoWrapper {
    /// Create a new instance with the wrapper and forced inclusion store addresses.
    pub fn new<U: Into<Url>>(el_client_url: U, wrapper: Address, store: Address) -> Self {
        let client = ClientBuilder::default().layer(DEFAULT_RETRY_LAYER).http(el_client_url.into());
        let provider = ProviderBuilder::new().connect_client(client);

        Self {
            wrapper: ITaikoWrapperInstance::new(wrapper, provider.clone()),
            store: IForcedInclusionStoreInstance::new(store, provider),
        }
    }

    /// Returns the address of the wrapper contract, the target of proposals.
    pub fn address(&self) -> Address {
        *self.wrapper.address()
    }

    /// Returns the oldest pending forced inclusion, or `None` if the queue is empty.
    pub async fn pending_forced_inclusion(&self) -> ContractResult<Option<PendingForcedInclusion>> {
        let head = self.store.head().call().await?;
        let tail = self.store.tail().call().await?;
        if head >= tail {
            return Ok(None)
        }

        let inclusion = self.store.getForcedInclusion(U256::from(head)).call().await?;
        let min_txs = self.wrapper.MIN_TXS_PER_FORCED_INCLUSION().call().await?;

        Ok(Some(PendingForcedInclusion { inclusion, min_txs }))
    }

    /// Returns the preconfirmation router allowed to propose through the wrapper, or `None` if
    /// proposing is open.
    pub async fn preconf_router(&self) -> ContractResult<Option<Address>> {
        let router = self.wrapper.preconfRouter().call().await?;
        Ok((!router.is_zero()).then_some(router))
    }
}

impl Summary for ForcedInclusion {
    fn summary(&self) -> String {
        format!(
            "blob_hash={}, fee_in_gwei={}, created_at_batch_id={}, byte_offset={}, byte_size={}, blob_created_in={}",
            self.blobHash,
            self.feeInGwei,
            self.createdAtBatchId,
            self.blobByteOffset,
            self.blobByteSize,
            self.blobCreatedIn
        )
    }
}

sol! {
    #[allow(missing_docs)]
    #[sol(rpc)]
    #[derive(Debug)]
    interface ITaikoWrapper {
        function MIN_TXS_PER_FORCED_INCLUSION() external view returns (uint16);
        function preconfRouter() external view returns (address);
    }
}

sol! {
    #[allow(missing_docs)]
    #[sol(rpc)]
    #[derive(Debug)]
    interface IForcedInclusionStore {
        #[derive(Default)]
        struct ForcedInclusion {
            bytes32 blobHash;
            uint64 feeInGwei;
            uint64 createdAtBatchId;
            uint32 blobByteOffset;
            uint32 blobByteSize;
            uint64 blobCreatedIn;
        }

        function head() external view returns (uint64);
        function tail() external view returns (uint64);
        function getForcedInclusion(uint256 index) external view returns (ForcedInclusion memory);
    }
}
