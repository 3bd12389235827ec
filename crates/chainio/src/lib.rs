#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

//! Chain I/O for the rollup node: inbox and token bindings, revert classification and the
//! L1 transaction manager.

use alloy::{
    contract::Error as ContractError,
    network::EthereumWallet,
    providers::{
        RootProvider,
        fillers::{
            BlobGasFiller, ChainIdFiller, FillProvider, GasFiller, JoinFill, NonceFiller,
            SimpleNonceManager, WalletFiller,
        },
        utils::JoinedRecommendedFillers,
    },
    rpc::client::RpcClient,
    signers::local::PrivateKeySigner,
    transports::TransportError,
};
use alloy_primitives::Bytes;
use alloy_sol_types::SolInterface;

/// Classification of failed contract interactions.
pub mod revert;

/// Taiko contract bindings
pub mod taiko;

/// L1 transaction sending with nonce and fee management.
pub mod tx_manager;

/// In-memory collaborators for tests.
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

/// Read-only provider with the recommended fillers.
pub type DefaultProvider = FillProvider<JoinedRecommendedFillers, RootProvider>;

/// Gas, blob gas, nonce and chain ID fillers, with a [`SimpleNonceManager`] that asks the node
/// for the pending nonce on every transaction.
pub type SimpleNonceFillers = JoinFill<
    GasFiller,
    JoinFill<BlobGasFiller, JoinFill<NonceFiller<SimpleNonceManager>, ChainIdFiller>>,
>;

/// Signing provider over [`SimpleNonceFillers`].
///
/// The prover and the proposer send from the same operator account, so the nonce must never
/// be cached locally.
pub type WalletProviderWithSimpleNonceManager =
    FillProvider<JoinFill<SimpleNonceFillers, WalletFiller<EthereumWallet>>, RootProvider>;

/// Builds a [`WalletProviderWithSimpleNonceManager`] signing with `wallet`.
///
/// The filler stack is assembled by hand, as alloy's builder always installs the cached nonce
/// manager: <https://github.com/alloy-rs/alloy/pull/2289>
pub fn new_wallet_provider_with_simple_nonce_management(
    rpc_client: RpcClient,
    wallet: PrivateKeySigner,
) -> WalletProviderWithSimpleNonceManager {
    let fillers = JoinFill::new(
        GasFiller,
        JoinFill::new(
            BlobGasFiller::default(),
            JoinFill::new(
                NonceFiller::new(SimpleNonceManager::default()),
                ChainIdFiller::default(),
            ),
        ),
    );

    FillProvider::new(
        RootProvider::new(rpc_client),
        JoinFill::new(fillers, WalletFiller::new(wallet.into())),
    )
}

/// Decodes a contract error into the custom errors of the `I` interface, for example
/// `ITaikoInboxErrors`. Errors that don't decode are returned unchanged.
pub fn try_parse_contract_error<I: SolInterface>(error: ContractError) -> Result<I, ContractError> {
    error.as_decoded_interface_error::<I>().ok_or(error)
}

/// What the revert data of a failed RPC call decodes to.
#[derive(Debug)]
pub enum TryParseTransportErrorResult<I: SolInterface> {
    /// A custom error of the `I` interface.
    Decoded(I),
    /// Revert data with a selector `I` doesn't know.
    UnknownSelector(Bytes),
    /// No revert data: a network or node error.
    Original(TransportError),
}

/// Decodes the revert data carried by an RPC error, if any, into the custom errors of `I`.
pub fn try_parse_transport_error<I: SolInterface>(
    error: TransportError,
) -> TryParseTransportErrorResult<I> {
    let Some(revert_data) = error.as_error_resp().and_then(|e| e.as_revert_data()) else {
        return TryParseTransportErrorResult::Original(error)
    };

    match I::abi_decode(&revert_data) {
        Ok(decoded) => TryParseTransportErrorResult::Decoded(decoded),
        Err(_) => TryParseTransportErrorResult::UnknownSelector(revert_data),
    }
}
