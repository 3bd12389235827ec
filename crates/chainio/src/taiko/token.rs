use alloy::{
    contract::{Error as ContractError, Result as ContractResult},
    rpc::client::ClientBuilder,
    signers::local::PrivateKeySigner,
    sol,
    transports::TransportErrorKind,
};
use alloy_primitives::{Address, U256};
use surge_primitives::{retries::DEFAULT_RETRY_LAYER, wei_to_eth};
use tracing::{error, info};
use url::Url;

use crate::{
    WalletProviderWithSimpleNonceManager, new_wallet_provider_with_simple_nonce_management,
};

use ITaikoToken::ITaikoTokenInstance;

/// A wrapper over the bond token contract.
#[derive(Debug, Clone)]
pub struct TaikoToken {
    token: ITaikoTokenInstance<WalletProviderWithSimpleNonceManager>,
    operator: Address,
}

impl TaikoToken {
    /// Create a new `TaikoToken` instance at the given contract address, operated by the
    /// given wallet.
    pub fn new<U: Into<Url>>(
        el_client_url: U,
        token_address: Address,
        wallet: PrivateKeySigner,
    ) -> Self {
        let client = ClientBuilder::default().layer(DEFAULT_RETRY_LAYER).http(el_client_url.into());
        let operator = wallet.address();
        let provider = new_wallet_provider_with_simple_nonce_management(client, wallet);

        Self { token: ITaikoTokenInstance::new(token_address, provider), operator }
    }

    /// Returns the address of the account operating this token wrapper.
    pub const fn operator(&self) -> Address {
        self.operator
    }

    /// Makes sure the spender can move at least `allowance` tokens on behalf of the operator.
    ///
    /// Returns `true` if an approval transaction was sent.
    pub async fn ensure_allowance(&self, spender: Address, allowance: U256) -> ContractResult<bool> {
        let current = self.token.allowance(self.operator, spender).call().await?;
        if current >= allowance {
            return Ok(false)
        }

        info!(operator = %self.operator, %spender, amount = wei_to_eth(allowance), "🔓 Approving bond token allowance");

        let receipt = self.token.approve(spender, allowance).send().await?.get_receipt().await?;
        if !receipt.status() {
            error!(operator = %self.operator, %spender, tx = %receipt.transaction_hash, "Bond token approval reverted");
            return Err(ContractError::TransportError(TransportErrorKind::custom_str(
                "bond token approval reverted",
            )))
        }

        Ok(true)
    }

    /// Returns the amount of tokens owned by an account.
    pub async fn balance_of(&self, account: Address) -> ContractResult<U256> {
        self.token.balanceOf(account).call().await
    }

    /// Returns the amount of tokens the spender can move on behalf of the owner.
    pub async fn allowance(&self, owner: Address, spender: Address) -> ContractResult<U256> {
        self.token.allowance(owner, spender).call().await
    }
}

sol! {
    #[allow(missing_docs)]
    #[sol(rpc)]
    #[derive(Debug)]
    interface ITaikoToken {
        error TT_INVALID_PARAM();

        function allowance(address owner, address spender) external view returns (uint256);

        function approve(address spender, uint256 amount) external returns (bool);

        function balanceOf(address account) external view returns (uint256);
    }
}
