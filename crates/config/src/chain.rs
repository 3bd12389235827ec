use alloy::primitives::Address;
use alloy_rpc_types_engine::JwtSecret;
use clap::Parser;
use url::Url;

/// L1-related configuration options
#[derive(Debug, Clone, Parser)]
pub struct L1Opts {
    /// The URL of the L1 execution client HTTP connection
    #[clap(long = "l1.el-url", env = "SURGE_L1_EXECUTION_URL", id = "l1-el-url")]
    pub el_url: Url,
    /// The URL of the L1 execution client WebSocket connection, used for event and mempool
    /// subscriptions. Without it, the prover only relies on its catch-up timer, and the
    /// proposer ignores L1 bridge activity.
    #[clap(long = "l1.el-ws-url", env = "SURGE_L1_EXECUTION_WS_URL", id = "l1-el-ws-url")]
    pub el_ws_url: Option<Url>,
}

/// L2-related configuration options
#[derive(Debug, Clone, Parser)]
pub struct L2Opts {
    /// The URL of the L2 execution client (taiko-geth) HTTP connection
    #[clap(long = "l2.el-url", env = "SURGE_L2_EXECUTION_URL", id = "l2-el-url")]
    pub el_url: Url,
    /// The URL of the L2 engine client (taiko-geth) HTTP connection
    #[clap(long = "l2.engine-url", env = "SURGE_L2_ENGINE_URL")]
    pub engine_url: Url,
    /// The JWT secret to communicate with the L2 engine client
    #[clap(long = "l2.jwt-secret", env = "SURGE_L2_JWT_SECRET")]
    pub jwt_secret: JwtSecret,
}

/// The contract addresses required to run the node.
#[derive(Debug, Clone, Parser)]
pub struct ContractAddresses {
    /// The address of the L1 `TaikoInbox.sol`
    #[clap(long = "contracts.taiko-inbox", env = "SURGE_TAIKO_INBOX")]
    pub taiko_inbox: Address,
    /// The address of the L1 bond token (`TaikoToken.sol`)
    #[clap(long = "contracts.taiko-token", env = "SURGE_TAIKO_TOKEN")]
    pub taiko_token: Address,
    /// The address of the L1 `TaikoWrapper.sol`. If set, proposals are sent through it so that
    /// forced inclusions are honored.
    #[clap(long = "contracts.taiko-wrapper", env = "SURGE_TAIKO_WRAPPER", requires = "forced_inclusion_store")]
    pub taiko_wrapper: Option<Address>,
    /// The address of the L1 `ForcedInclusionStore.sol`
    #[clap(long = "contracts.forced-inclusion-store", env = "SURGE_FORCED_INCLUSION_STORE")]
    pub forced_inclusion_store: Option<Address>,
    /// The address of the L1 `SignalService.sol`. If set, every `SignalSent` event forces a
    /// proposal, empty if need be.
    #[clap(long = "contracts.signal-service", env = "SURGE_SIGNAL_SERVICE")]
    pub signal_service: Option<Address>,
    /// The address of the L1 `Bridge.sol`. If set, pending `sendMessage` transactions in the
    /// L1 mempool force a proposal.
    #[clap(long = "contracts.bridge", env = "SURGE_BRIDGE")]
    pub bridge: Option<Address>,

    /// The address of the L2 `TaikoAnchor.sol`
    #[clap(long = "contracts.taiko-anchor", env = "SURGE_TAIKO_ANCHOR")]
    pub taiko_anchor: Address,
}
