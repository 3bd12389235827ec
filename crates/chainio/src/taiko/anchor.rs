use ITaikoAnchor::{BaseFeeConfig, ITaikoAnchorInstance};
use alloy::{
    contract::Result as ContractResult, providers::ProviderBuilder, rpc::client::ClientBuilder,
};
use alloy_primitives::{Address, U256};
use alloy::sol;
use surge_primitives::retries::DEFAULT_RETRY_LAYER;
use url::Url;

use crate::DefaultProvider;

/// A read-only wrapper over the L2 `TaikoAnchor.sol` contract, used as the source of the L2
/// base fee of the next block.
#[derive(Debug, Clone)]
pub struct TaikoAnchor {
    inner: ITaikoAnchorInstance<DefaultProvider>,
}

impl TaikoAnchor {
    /// Connects to the anchor contract at `address` on the L2 execution client.
    pub fn new<U: Into<Url>>(el_client_url: U, address: Address) -> Self {
        let client = ClientBuilder::default().layer(DEFAULT_RETRY_LAYER).http(el_client_url.into());
        Self { inner: ITaikoAnchorInstance::new(address, ProviderBuilder::new().connect_client(client)) }
    }

    /// Returns the L2 base fee of a block at `block_timestamp`, following a parent that used
    /// `parent_gas_used` gas.
    pub async fn get_base_fee_v2(
        &self,
        parent_gas_used: u32,
        block_timestamp: u64,
        base_fee_config: BaseFeeConfig,
    ) -> ContractResult<BaseFeeResult> {
        let call = self.inner.getBasefeeV2(parent_gas_used, block_timestamp, base_fee_config);
        Ok(call.call().await?.into())
    }
}

sol! {
    #[allow(missing_docs)]
    #[sol(rpc)]
    #[derive(Debug)]
    interface ITaikoAnchor {
        struct BaseFeeConfig {
            uint8 adjustmentQuotient;
            uint8 sharingPctg;
            uint32 gasIssuancePerSecond;
            uint64 minGasExcess;
            uint32 maxGasIssuancePerBlock;
        }

        function getBasefeeV2(
            uint32 _parentGasUsed,
            uint64 _blockTimestamp,
            BaseFeeConfig calldata _baseFeeConfig
        )
            public
            view
            returns (uint256 basefee_, uint64 newGasTarget_, uint64 newGasExcess_);
    }
}

/// The L2 base fee, with the gas target and excess it leaves for the next block.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BaseFeeResult {
    /// Base fee per gas, in wei.
    pub base_fee: U256,
    /// Gas target after the block.
    pub new_gas_target: u64,
    /// Gas excess after the block.
    pub new_gas_excess: u64,
}

impl From<ITaikoAnchor::getBasefeeV2Return> for BaseFeeResult {
    fn from(ret: ITaikoAnchor::getBasefeeV2Return) -> Self {
        Self { base_fee: ret.basefee_, new_gas_target: ret.newGasTarget_, new_gas_excess: ret.newGasExcess_ }
    }
}

impl BaseFeeResult {
    /// Returns the base fee as a `u64`, saturating on overflow.
    pub fn base_fee_u64(&self) -> u64 {
        self.base_fee.saturating_to()
    }
}

/// The inbox and the anchor declare the same struct.
impl From<super::inbox::ITaikoInbox::BaseFeeConfig> for BaseFeeConfig {
    fn from(cfg: super::inbox::ITaikoInbox::BaseFeeConfig) -> Self {
        let super::inbox::ITaikoInbox::BaseFeeConfig {
            adjustmentQuotient,
            sharingPctg,
            gasIssuancePerSecond,
            minGasExcess,
            maxGasIssuancePerBlock,
        } = cfg;
        Self { adjustmentQuotient, sharingPctg, gasIssuancePerSecond, minGasExcess, maxGasIssuancePerBlock }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_fee_saturates() {
        let res = BaseFeeResult { base_fee: U256::MAX, new_gas_target: 0, new_gas_excess: 0 };
        assert_eq!(res.base_fee_u64(), u64::MAX);

        let res = BaseFeeResult { base_fee: U256::from(7), new_gas_target: 0, new_gas_excess: 0 };
        assert_eq!(res.base_fee_u64(), 7);
    }
}
