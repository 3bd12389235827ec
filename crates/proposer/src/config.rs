use std::time::Duration;

use alloy_primitives::Address;
use derive_more::derive::{Deref, DerefMut};
use surge_chainio::{
    taiko::inbox::{ITaikoInbox::ProtocolConfig, TaikoInbox},
    tx_manager::TxManagerConfig,
};
use surge_config::Opts;
use surge_primitives::summary::Summary;

use crate::cost::CostParams;

/// The runtime configuration of the proposer.
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

    /// The address proposing batches.
    pub fn proposer_address(&self) -> Address {
        self.opts.operator.private_key.address()
    }

    /// The L2 coinbase of proposed blocks.
    pub fn fee_recipient(&self) -> Address {
        self.opts.proposer.fee_recipient.unwrap_or_else(|| self.proposer_address())
    }

    /// The fixed proposing interval, if configured.
    pub(crate) const fn propose_interval(&self) -> Option<Duration> {
        match self.opts.proposer.propose_interval_secs {
            Some(secs) => Some(Duration::from_secs(secs)),
            None => None,
        }
    }

    /// Time after the last proposal after which an empty batch may be proposed. `None`
    /// disables empty proposals.
    pub(crate) const fn min_proposing_interval(&self) -> Option<Duration> {
        match self.opts.proposer.min_proposing_interval_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    pub(crate) const fn rpc_timeout(&self) -> Duration {
        Duration::from_secs(self.opts.proposer.rpc_timeout_secs)
    }

    pub(crate) const fn max_blocks_per_batch(&self) -> usize {
        self.protocol.maxBlocksPerBatch as usize
    }

    /// The share of the L2 base fee paid to the proposer, in percent.
    pub fn base_fee_share_pct(&self) -> u8 {
        self.opts.proposer.base_fee_share_pct.unwrap_or(self.protocol.baseFeeConfig.sharingPctg)
    }

    /// The parameters of the L1 cost model.
    pub fn cost_params(&self) -> CostParams {
        CostParams {
            batch_posting_gas_with_calldata: self.opts.proposer.batch_posting_gas_with_calldata,
            batch_posting_gas_with_blobs: self.opts.proposer.batch_posting_gas_with_blobs,
            proof_posting_gas: self.opts.proposer.proof_posting_gas,
            proving_cost_per_batch: self.opts.proposer.proving_cost_per_batch,
        }
    }

    /// The configuration of the transaction manager sending proposals.
    pub fn tx_manager_config(&self) -> TxManagerConfig {
        TxManagerConfig {
            max_attempts: self.opts.proposer.tx_max_attempts,
            receipt_timeout: Duration::from_secs(self.opts.proposer.tx_receipt_timeout_secs),
            min_priority_fee: self.opts.proposer.min_priority_fee,
            ..Default::default()
        }
    }
}

impl Summary for RuntimeConfig {
    fn summary(&self) -> String {
        format!(
            "Running the proposer with the following configuration:
            - Instance name: {}
            - L2 chain: id={}, max_blocks_per_batch={}
            - Operator: address={}, fee_recipient={}
            - Proposing: interval={:?}, min_proposing_interval={:?}, max_tx_lists={}
            - Tips: min_tip={}, allow_zero_tip_interval={}
            - DA: {:?}
            - Profitability: base_fee_share={}%, {:?}
            ",
            self.opts.instance_name,
            self.protocol.chainId,
            self.protocol.maxBlocksPerBatch,
            self.proposer_address(),
            self.fee_recipient(),
            self.propose_interval(),
            self.min_proposing_interval(),
            self.opts.proposer.max_tx_lists,
            self.opts.proposer.min_tip,
            self.opts.proposer.allow_zero_tip_interval,
            self.opts.proposer.da,
            self.base_fee_share_pct(),
            self.cost_params(),
        )
    }
}
