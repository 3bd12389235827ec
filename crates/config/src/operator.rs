use alloy::{consensus::constants::ETH_TO_WEI, primitives::U256, signers::local::PrivateKeySigner};
use clap::Parser;

/// Operator-related configuration options
#[derive(Debug, Clone, Parser)]
pub struct OperatorOpts {
    /// The private key of the account sending proposals and proofs
    #[clap(long = "operator.private-key", env = "SURGE_OPERATOR_PRIVATE_KEY")]
    pub private_key: PrivateKeySigner,
    /// The minimum ETH balance required to run the node (in wei)
    ///
    /// Default: 1 ETH
    #[clap(long = "operator.min-eth", env = "SURGE_MIN_ETH_BALANCE", default_value_t = U256::from(ETH_TO_WEI))]
    pub min_eth_balance: U256,
    /// The minimum bond token balance required to run the node (in wei)
    ///
    /// Default: 1000 tokens
    #[clap(long = "operator.min-bond", env = "SURGE_MIN_BOND_BALANCE", default_value_t = U256::from(1000 * ETH_TO_WEI))]
    pub min_bond_balance: U256,
}
