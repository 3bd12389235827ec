use alloy::primitives::{Address, U256};
use clap::Parser;
use surge_primitives::tier::ProofTier;
use url::Url;

/// Prover-related configuration options
#[derive(Debug, Clone, Parser)]
pub struct ProverOpts {
    /// The URL of the Raiko proof service. Required unless `--prover.dummy` is set.
    #[clap(long = "raiko.endpoint", env = "SURGE_RAIKO_ENDPOINT", required_unless_present = "dummy")]
    pub raiko_endpoint: Option<Url>,
    /// The JWT used to authenticate with the Raiko proof service
    #[clap(long = "raiko.jwt", env = "SURGE_RAIKO_JWT")]
    pub raiko_jwt: Option<String>,
    /// The maximum time to wait for a single proof, in seconds
    #[clap(long = "raiko.request-timeout", env = "SURGE_RAIKO_REQUEST_TIMEOUT", default_value_t = 600)]
    pub raiko_request_timeout_secs: u64,
    /// The interval between two polls of a proof that is being generated, in seconds
    #[clap(
        long = "prover.proof-polling-interval",
        env = "SURGE_PROOF_POLLING_INTERVAL",
        default_value_t = 10
    )]
    pub proof_polling_interval_secs: u64,

    /// The tiers this node produces proofs for, comma separated
    #[clap(
        long = "prover.tiers",
        env = "SURGE_PROVER_TIERS",
        value_delimiter = ',',
        default_value = "optimistic,tee"
    )]
    pub tiers: Vec<ProofTier>,
    /// The minimum tier required by the protocol for every batch
    #[clap(long = "prover.min-tier", env = "SURGE_PROVER_MIN_TIER", default_value = "optimistic")]
    pub min_tier: ProofTier,
    /// Produce deterministic placeholder proofs instead of querying the proof service.
    /// Only meant for tests and development networks.
    #[clap(long = "prover.dummy", env = "SURGE_PROVER_DUMMY", default_value_t = false)]
    pub dummy: bool,
    /// The on-chain verifier of TEE proofs, used when combining sub-proofs
    #[clap(long = "prover.tee-verifier", env = "SURGE_TEE_VERIFIER")]
    pub tee_verifier: Option<Address>,
    /// The on-chain verifier of ZK proofs, used when combining sub-proofs
    #[clap(long = "prover.zk-verifier", env = "SURGE_ZK_VERIFIER")]
    pub zk_verifier: Option<Address>,

    /// The number of L1 confirmations before an event is handled
    #[clap(long = "prover.confirmations", env = "SURGE_PROVER_CONFIRMATIONS", default_value_t = 6)]
    pub confirmations: u64,
    /// The maximum number of L1 blocks scanned in one `eth_getLogs` call
    #[clap(long = "prover.block-range", env = "SURGE_PROVER_BLOCK_RANGE", default_value_t = 1000)]
    pub block_range: u64,
    /// The interval of the catch-up timer, in seconds
    #[clap(
        long = "prover.force-proving-interval",
        env = "SURGE_FORCE_PROVING_INTERVAL",
        default_value_t = 15
    )]
    pub force_proving_interval_secs: u64,
    /// The first batch to consider. Defaults to the last verified batch.
    #[clap(long = "prover.starting-batch-id", env = "SURGE_STARTING_BATCH_ID")]
    pub starting_batch_id: Option<u64>,
    /// Prove batches of other proposers once their proving window expired
    #[clap(long = "prover.prove-unassigned", env = "SURGE_PROVE_UNASSIGNED", default_value_t = false)]
    pub prove_unassigned: bool,
    /// Proposer addresses whose batches are treated as this node's own
    #[clap(long = "prover.local-proposers", env = "SURGE_LOCAL_PROPOSERS", value_delimiter = ',')]
    pub local_proposers: Vec<Address>,
    /// Contest transitions that don't match the local L2 chain
    #[clap(long = "prover.contest", env = "SURGE_PROVER_CONTEST", default_value_t = false)]
    pub contest: bool,
    /// The bond token allowance granted to the inbox at startup, in wei
    #[clap(long = "prover.allowance", env = "SURGE_PROVER_ALLOWANCE")]
    pub allowance: Option<U256>,

    /// The delay between two attempts of a transient operation, in seconds
    #[clap(long = "prover.retry-interval", env = "SURGE_PROVER_RETRY_INTERVAL", default_value_t = 12)]
    pub retry_interval_secs: u64,
    /// The maximum number of attempts of a transient operation
    #[clap(long = "prover.max-retries", env = "SURGE_PROVER_MAX_RETRIES", default_value_t = 5)]
    pub max_retries: usize,
    /// The timeout of every RPC call, in seconds
    #[clap(long = "prover.rpc-timeout", env = "SURGE_PROVER_RPC_TIMEOUT", default_value_t = 30, id = "prover-rpc-timeout")]
    pub rpc_timeout_secs: u64,
}
