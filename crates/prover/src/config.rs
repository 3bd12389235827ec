use std::time::Duration;

use derive_more::derive::{Deref, DerefMut};
use surge_chainio::taiko::inbox::{ITaikoInbox::ProtocolConfig, TaikoInbox};
use surge_config::Opts;
use surge_primitives::{retries::BackoffPolicy, summary::Summary};

/// Upper bound on the capacity of the work queues, regardless of the protocol configuration.
const MAX_QUEUE_CAPACITY: usize = 8192;

/// The runtime configuration of the prover.
#[derive(Debug, Clone, Deref, DerefMut)]
pub struct RuntimeConfig {
    /// CLI options that can be accessed as dereferenced fields.
    #[deref]
    #[deref_mut]
    pub opts: Opts,
    /// Pacaya protocol config, fetched once from the `TaikoInbox` L1 contract.
    pub protocol: ProtocolConfig,
}

impl RuntimeConfig {
    /// Create a new [`RuntimeConfig`] instance from the given [`Opts`].
    pub async fn from_opts(opts: Opts) -> Result<Self, alloy::contract::Error> {
        let inbox = TaikoInbox::new(opts.l1.el_url.clone(), opts.contracts.taiko_inbox);
        let protocol = inbox.get_pacaya_config().await?;

        Ok(Self { opts, protocol })
    }

    /// Capacity of the work queues: the maximum number of outstanding proposals.
    pub(crate) fn queue_capacity(&self) -> usize {
        usize::try_from(self.protocol.maxUnverifiedBatches)
            .unwrap_or(MAX_QUEUE_CAPACITY)
            .clamp(1, MAX_QUEUE_CAPACITY)
    }

    /// Backoff policy of retried side effects.
    pub(crate) const fn backoff_policy(&self) -> BackoffPolicy {
        BackoffPolicy::fixed(
            Duration::from_secs(self.opts.prover.retry_interval_secs),
            self.opts.prover.max_retries,
        )
    }

    pub(crate) const fn rpc_timeout(&self) -> Duration {
        Duration::from_secs(self.opts.prover.rpc_timeout_secs)
    }

    /// Interval of the catch-up timer. Never zero.
    pub(crate) const fn force_proving_interval(&self) -> Duration {
        Duration::from_secs(if self.opts.prover.force_proving_interval_secs == 0 {
            1
        } else {
            self.opts.prover.force_proving_interval_secs
        })
    }

    /// The proving window of a batch, in seconds.
    pub(crate) const fn proving_window_secs(&self) -> u64 {
        self.protocol.provingWindow as u64
    }

    /// The cooldown window of a transition, in seconds.
    pub(crate) fn cooldown_window_secs(&self) -> u64 {
        self.protocol.cooldownWindow.to::<u64>()
    }
}

impl Summary for RuntimeConfig {
    fn summary(&self) -> String {
        format!(
            "Running the prover with the following configuration:
            - Instance name: {}
            - L2 chain: id={}
            - Operator: address={}
            - Tiers: {:?}, min_tier={}, dummy={}
            - Events: confirmations={}, block_range={}, force_proving_interval={}s
            - Protocol: proving_window={}s, cooldown_window={}s, max_unverified_batches={}
            - Contest: {}, prove_unassigned: {}
            ",
            self.opts.instance_name,
            self.protocol.chainId,
            self.opts.operator.private_key.address(),
            self.opts.prover.tiers,
            self.opts.prover.min_tier,
            self.opts.prover.dummy,
            self.opts.prover.confirmations,
            self.opts.prover.block_range,
            self.opts.prover.force_proving_interval_secs,
            self.proving_window_secs(),
            self.cooldown_window_secs(),
            self.protocol.maxUnverifiedBatches,
            self.opts.prover.contest,
            self.opts.prover.prove_unassigned,
        )
    }
}
