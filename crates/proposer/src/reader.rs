use std::{fmt, time::Duration};

use alloy::consensus::Transaction as _;
use alloy_primitives::{Address, B256, U256};
use async_trait::async_trait;
use surge_chainio::taiko::{
    anchor::TaikoAnchor,
    bridge::is_send_message,
    forced_inclusion::{PendingForcedInclusion, TaikoWrapper},
    inbox::{ITaikoInbox::ProtocolConfig, TaikoInbox},
    token::TaikoToken,
};
use surge_clients::{engine::EngineClient, execution::ExecutionClient};
use surge_primitives::{
    current_timestamp_seconds,
    pool::{TxList, TxPoolContentParams},
};
use tracing::trace;

use crate::{ProposerError, error::with_timeout};

/// Read access to the L1 and L2 state needed to propose.
#[async_trait]
pub trait ProposerReader: Send + Sync + fmt::Debug {
    /// Returns true if the L2 execution client is synced.
    async fn is_l2_synced(&self) -> Result<bool, ProposerError>;

    /// Returns the pre-built transaction lists of the L2 mempool, one per L2 block. Empty if
    /// the mempool has nothing to offer.
    async fn pool_content(&self, params: TxPoolContentParams) -> Result<Vec<TxList>, ProposerError>;

    /// Returns the base fee of the next L2 block.
    async fn l2_base_fee(&self) -> Result<u64, ProposerError>;

    /// Returns the bond `account` can put up for a proposal: its inbox bond balance, or the
    /// tokens the inbox can pull from it, whichever is larger.
    async fn available_bond(&self, account: Address) -> Result<U256, ProposerError>;

    /// Returns the oldest pending forced inclusion, if any.
    async fn forced_inclusion(&self) -> Result<Option<PendingForcedInclusion>, ProposerError>;

    /// Returns the meta hash of the latest proposed batch.
    async fn parent_meta_hash(&self) -> Result<B256, ProposerError>;

    /// Returns the preconfirmation router allowed to propose, or `None` if proposing is open.
    async fn preconf_router(&self) -> Result<Option<Address>, ProposerError>;

    /// Returns true if the L1 transaction `hash` is still pending and sends a bridge message.
    async fn is_pending_bridge_message(&self, hash: B256) -> Result<bool, ProposerError>;
}

/// A [`ProposerReader`] backed by the protocol contracts and the L2 execution and engine
/// clients.
#[derive(Debug, Clone)]
pub struct RpcProposerReader {
    inbox: TaikoInbox,
    wrapper: Option<TaikoWrapper>,
    anchor: TaikoAnchor,
    token: TaikoToken,
    l1: ExecutionClient,
    l2: ExecutionClient,
    engine: EngineClient,
    bridge: Option<Address>,
    protocol: ProtocolConfig,
    timeout: Duration,
}

impl RpcProposerReader {
    /// Creates a new reader. Every call is bounded by `timeout`.
    #[allow(clippy::too_many_arguments)]
    pub const fn new(
        inbox: TaikoInbox,
        wrapper: Option<TaikoWrapper>,
        anchor: TaikoAnchor,
        token: TaikoToken,
        l1: ExecutionClient,
        l2: ExecutionClient,
        engine: EngineClient,
        bridge: Option<Address>,
        protocol: ProtocolConfig,
        timeout: Duration,
    ) -> Self {
        Self { inbox, wrapper, anchor, token, l1, l2, engine, bridge, protocol, timeout }
    }
}

#[async_trait]
impl ProposerReader for RpcProposerReader {
    async fn is_l2_synced(&self) -> Result<bool, ProposerError> {
        with_timeout(self.timeout, self.l2.is_synced()).await
    }

    async fn pool_content(&self, params: TxPoolContentParams) -> Result<Vec<TxList>, ProposerError> {
        let lists =
            with_timeout(self.timeout, self.engine.tx_pool_content_with_min_tip(params)).await?;

        Ok(lists.unwrap_or_default().into_iter().map(|list| list.tx_list).collect())
    }

    async fn l2_base_fee(&self) -> Result<u64, ProposerError> {
        let parent = with_timeout(self.timeout, self.l2.get_header(None)).await?;
        let gas_used = u32::try_from(parent.gas_used).unwrap_or(u32::MAX);

        let result = with_timeout(
            self.timeout,
            self.anchor.get_base_fee_v2(
                gas_used,
                current_timestamp_seconds(),
                self.protocol.baseFeeConfig.into(),
            ),
        )
        .await?;
        trace!(parent = parent.number, gas_used, base_fee = %result.base_fee, "Computed L2 base fee");

        Ok(result.base_fee_u64())
    }

    async fn available_bond(&self, account: Address) -> Result<U256, ProposerError> {
        let inbox = *self.inbox.address();
        let (deposited, balance, allowance) = tokio::try_join!(
            with_timeout(self.timeout, self.inbox.bond_balance_of(account)),
            with_timeout(self.timeout, self.token.balance_of(account)),
            with_timeout(self.timeout, self.token.allowance(account, inbox)),
        )?;

        Ok(deposited.max(balance.min(allowance)))
    }

    async fn forced_inclusion(&self) -> Result<Option<PendingForcedInclusion>, ProposerError> {
        match &self.wrapper {
            Some(wrapper) => with_timeout(self.timeout, wrapper.pending_forced_inclusion()).await,
            None => Ok(None),
        }
    }

    async fn parent_meta_hash(&self) -> Result<B256, ProposerError> {
        with_timeout(self.timeout, self.inbox.get_parent_meta_hash()).await
    }

    async fn preconf_router(&self) -> Result<Option<Address>, ProposerError> {
        match &self.wrapper {
            Some(wrapper) => with_timeout(self.timeout, wrapper.preconf_router()).await,
            None => Ok(None),
        }
    }

    async fn is_pending_bridge_message(&self, hash: B256) -> Result<bool, ProposerError> {
        let Some(bridge) = self.bridge else { return Ok(false) };
        let Some(tx) = with_timeout(self.timeout, self.l1.pending_transaction(hash)).await? else {
            return Ok(false)
        };

        Ok(is_send_message(tx.to(), tx.input(), bridge))
    }
}
