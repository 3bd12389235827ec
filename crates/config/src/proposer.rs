use alloy::primitives::Address;
use clap::{Parser, ValueEnum};

/// Where the batch payload is published.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum DaMode {
    /// In the proposal transaction calldata.
    Calldata,
    /// In EIP-4844 blobs attached to the proposal transaction.
    #[default]
    Blob,
    /// On Celestia, with only a locator posted to L1.
    Celestia,
}

/// How the L1 cost of a proposal is estimated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum CostMethod {
    /// Fixed posting gas amounts, priced at the current L1 fees.
    #[default]
    FeeHistory,
    /// Blob proposals are priced from their payload: the calldata proposal gas, minus the
    /// calldata and hashing gas the blobs take over, plus the blob gas.
    Local,
}

/// Proposer-related configuration options
#[derive(Debug, Clone, Parser)]
pub struct ProposerOpts {
    /// The fixed interval between two proposals, in seconds. If unset, a random interval
    /// between 12 and 120 seconds is drawn after each proposal.
    #[clap(long = "proposer.interval", env = "SURGE_PROPOSE_INTERVAL")]
    pub propose_interval_secs: Option<u64>,
    /// The minimum time between two proposals after which an empty batch is proposed, in
    /// seconds. `0` disables empty proposals.
    #[clap(
        long = "proposer.min-proposing-interval",
        env = "SURGE_MIN_PROPOSING_INTERVAL",
        default_value_t = 0
    )]
    pub min_proposing_interval_secs: u64,
    /// Waive the minimum tip every N proposing epochs. `0` never waives it.
    #[clap(
        long = "proposer.allow-zero-tip-interval",
        env = "SURGE_ALLOW_ZERO_TIP_INTERVAL",
        default_value_t = 0
    )]
    pub allow_zero_tip_interval: u64,
    /// The minimum tip of a transaction to be included in a batch, in wei
    #[clap(long = "proposer.min-tip", env = "SURGE_MIN_TIP", default_value_t = 0)]
    pub min_tip: u64,

    /// The L2 coinbase of proposed blocks. Defaults to the operator address.
    #[clap(long = "proposer.fee-recipient", env = "SURGE_L2_FEE_RECIPIENT")]
    pub fee_recipient: Option<Address>,
    /// Accounts whose transactions are included first
    #[clap(long = "proposer.local-addresses", env = "SURGE_LOCAL_ADDRESSES", value_delimiter = ',')]
    pub local_addresses: Vec<Address>,
    /// Only include transactions from the local addresses
    #[clap(
        long = "proposer.local-addresses-only",
        env = "SURGE_LOCAL_ADDRESSES_ONLY",
        default_value_t = false
    )]
    pub local_addresses_only: bool,
    /// The maximum number of transaction lists (L2 blocks) fetched per proposal
    #[clap(long = "proposer.max-tx-lists", env = "SURGE_MAX_TX_LISTS", default_value_t = 1)]
    pub max_tx_lists: u64,
    /// The maximum size of a single compressed transaction list, in bytes
    #[clap(
        long = "proposer.max-bytes-per-tx-list",
        env = "SURGE_MAX_BYTES_PER_TX_LIST",
        default_value_t = 126_976
    )]
    pub max_bytes_per_tx_list: u64,

    /// Where the batch payload is published
    #[clap(long = "proposer.da", env = "SURGE_DA_MODE", value_enum, default_value_t = DaMode::Blob)]
    pub da: DaMode,

    /// How the L1 cost of a proposal is estimated
    #[clap(
        long = "proposer.cost-method",
        env = "SURGE_COST_METHOD",
        value_enum,
        default_value_t = CostMethod::FeeHistory
    )]
    pub cost_method: CostMethod,
    /// L1 gas used by a proposal carrying its payload in calldata
    #[clap(
        long = "proposer.gas-with-calldata",
        env = "SURGE_BATCH_POSTING_GAS_WITH_CALLDATA",
        default_value_t = 1_000_000
    )]
    pub batch_posting_gas_with_calldata: u64,
    /// L1 gas used by a proposal carrying its payload in blobs
    #[clap(
        long = "proposer.gas-with-blobs",
        env = "SURGE_BATCH_POSTING_GAS_WITH_BLOBS",
        default_value_t = 200_000
    )]
    pub batch_posting_gas_with_blobs: u64,
    /// L1 gas used to post the proof of a batch
    #[clap(long = "proposer.proof-posting-gas", env = "SURGE_PROOF_POSTING_GAS", default_value_t = 400_000)]
    pub proof_posting_gas: u64,
    /// Off-chain cost of proving one batch, in wei
    #[clap(long = "proposer.proving-cost", env = "SURGE_PROVING_COST_PER_BATCH", default_value_t = 0)]
    pub proving_cost_per_batch: u128,
    /// The share of the L2 base fee paid to the proposer, in percent. Overrides the sharing
    /// percentage of the protocol base fee config.
    #[clap(
        long = "proposer.base-fee-share",
        env = "SURGE_L2_BASE_FEE_SHARE_PCT",
        value_parser = clap::value_parser!(u8).range(0..=100)
    )]
    pub base_fee_share_pct: Option<u8>,

    /// The maximum number of fee bumps of a proposal transaction
    #[clap(long = "proposer.tx-max-attempts", env = "SURGE_TX_MAX_ATTEMPTS", default_value_t = 5)]
    pub tx_max_attempts: usize,
    /// The time to wait for a proposal receipt before bumping fees, in seconds
    #[clap(long = "proposer.tx-receipt-timeout", env = "SURGE_TX_RECEIPT_TIMEOUT", default_value_t = 36)]
    pub tx_receipt_timeout_secs: u64,
    /// The minimum priority fee of L1 transactions, in wei
    #[clap(long = "proposer.min-priority-fee", env = "SURGE_MIN_PRIORITY_FEE", default_value_t = 0)]
    pub min_priority_fee: u128,
    /// The timeout of every RPC call, in seconds
    #[clap(long = "proposer.rpc-timeout", env = "SURGE_PROPOSER_RPC_TIMEOUT", default_value_t = 30, id = "proposer-rpc-timeout")]
    pub rpc_timeout_secs: u64,
}
