use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use alloy::{
    consensus::transaction::SignerRecoverable,
    rpc::types::{Log, TransactionReceipt},
};
use alloy_primitives::{Address, B256};
use rand::Rng;
use surge_chainio::{
    taiko::{
        anchor::TaikoAnchor, bridge::signal_sent_filter, forced_inclusion::TaikoWrapper,
        inbox::TaikoInbox, token::TaikoToken,
    },
    tx_manager::TransactionManager,
};
use surge_clients::{engine::EngineClient, execution::ExecutionClient};
use surge_primitives::{
    batch::TxCandidate,
    pool::{TxList, TxPoolContentParams, count_txs, total_gas_limit},
    retries::{BackoffPolicy, RetryError, retry_until_cancelled},
    summary::Summary,
};
use tokio::time::sleep;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{
    ProposerError, RuntimeConfig,
    builder::{self, ProposalContext, ProposalTarget, TxBuilder},
    cost::{self, CostEstimator},
    metrics::ProposerMetrics,
    profitability::FeeModel,
    reader::{ProposerReader, RpcProposerReader},
    triggers::{ForceTriggers, watch_bridge_messages, watch_signals},
};

/// Bounds of the random proposing interval, in seconds, used without a fixed interval.
const RANDOM_INTERVAL_SECS: (u64, u64) = (12, 120);

/// Retries of a proposal rejected with a stale nonce.
const NONCE_TOO_LOW_RETRIES: usize = 3;

/// Delay between the retries of a proposal rejected with a stale nonce.
const NONCE_TOO_LOW_RETRY_DELAY: Duration = Duration::from_secs(1);

/// The outcome of a proposing tick that didn't fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TickOutcome {
    /// A proposal landed on L1.
    Proposed,
    /// The mempool had nothing to offer, and no empty proposal was due.
    NothingToPropose,
    /// The collected fees didn't cover the L1 cost.
    Unprofitable,
    /// A preconfirmation router holds the right to propose.
    RouterManaged,
}

/// Surge proposer.
///
/// On every tick of its timer, the proposer:
/// - Pulls pre-built transaction lists out of the L2 mempool
/// - Checks the batch against the protocol limits and its bond
/// - Builds the proposal for the configured DA backend
/// - Sends it only if the L2 fees it collects cover the cost of posting and proving it
///
/// L1 bridge activity forces a proposal regardless of profitability, so that messages reach
/// L2 without waiting for a profitable batch. A failed tick is logged and abandoned: the next
/// tick starts from scratch.
#[derive(Debug)]
pub struct Proposer {
    /// Proposer runtime configuration.
    cfg: RuntimeConfig,
    reader: Arc<dyn ProposerReader>,
    builder: Arc<dyn TxBuilder>,
    estimator: Arc<dyn CostEstimator>,
    tx_manager: Arc<dyn TransactionManager>,
    fee_model: FeeModel,
    /// Retry policy of proposals rejected with a stale nonce.
    nonce_retry: BackoffPolicy,
    /// Process-wide cancellation token.
    token: CancellationToken,
    /// The account proposing batches.
    proposer: Address,
    /// Number of proposing ticks so far.
    total_epochs: u64,
    /// When the last proposal landed.
    last_proposed_at: Option<Instant>,
    /// Pending requests for a forced proposal.
    triggers: Arc<ForceTriggers>,
    /// `SignalSent` logs, if a signal service is configured.
    signals: Option<ReceiverStream<Log>>,
    /// Hashes of pending L1 transactions, if a bridge is configured.
    pending_txs: Option<ReceiverStream<B256>>,
}

impl Proposer {
    /// Create a new [`Proposer`] instance, sending proposals through `tx_manager`.
    pub async fn new(
        cfg: RuntimeConfig,
        tx_manager: Arc<dyn TransactionManager>,
        token: CancellationToken,
    ) -> Result<Self, ProposerError> {
        info!("{}", cfg.summary());

        let l1 = ExecutionClient::new(cfg.l1.el_url.clone(), cfg.l1.el_ws_url.clone()).await?;
        let l2 = ExecutionClient::new(cfg.l2.el_url.clone(), None).await?;
        let engine = EngineClient::new(cfg.l2.engine_url.clone(), cfg.l2.jwt_secret);
        let inbox = TaikoInbox::new(cfg.l1.el_url.clone(), cfg.contracts.taiko_inbox);
        let anchor = TaikoAnchor::new(cfg.l2.el_url.clone(), cfg.contracts.taiko_anchor);
        let bond_token = TaikoToken::new(
            cfg.l1.el_url.clone(),
            cfg.contracts.taiko_token,
            cfg.operator.private_key.clone(),
        );

        let wrapper = match (cfg.contracts.taiko_wrapper, cfg.contracts.forced_inclusion_store) {
            (Some(wrapper), Some(store)) => {
                info!(%wrapper, %store, "Proposing through the forced inclusion wrapper");
                Some(TaikoWrapper::new(cfg.l1.el_url.clone(), wrapper, store))
            }
            _ => None,
        };

        let timeout = cfg.rpc_timeout();
        let target = ProposalTarget::new(inbox.clone(), wrapper.as_ref().map(TaikoWrapper::address));
        let builder = builder::from_config(&cfg, target)?;
        let estimator = cost::from_config(&cfg, l1.clone());
        let signals = cfg.contracts.signal_service.map(|service| {
            info!(%service, "Forcing proposals on signals");
            l1.subscribe_events(signal_sent_filter(service))
        });
        let pending_txs = cfg.contracts.bridge.map(|bridge| {
            info!(%bridge, "Forcing proposals on pending bridge messages");
            l1.subscribe_pending_transactions()
        });
        let reader = Arc::new(RpcProposerReader::new(
            inbox,
            wrapper,
            anchor,
            bond_token,
            l1,
            l2,
            engine,
            cfg.contracts.bridge,
            cfg.protocol.clone(),
            timeout,
        ));

        let mut proposer = Self::with_components(cfg, reader, builder, estimator, tx_manager, token);
        proposer.signals = signals;
        proposer.pending_txs = pending_txs;
        Ok(proposer)
    }

    /// Builds a proposer over the given components.
    pub(crate) fn with_components(
        cfg: RuntimeConfig,
        reader: Arc<dyn ProposerReader>,
        builder: Arc<dyn TxBuilder>,
        estimator: Arc<dyn CostEstimator>,
        tx_manager: Arc<dyn TransactionManager>,
        token: CancellationToken,
    ) -> Self {
        Self {
            fee_model: FeeModel::new(cfg.base_fee_share_pct()),
            proposer: tx_manager.sender(),
            cfg,
            reader,
            builder,
            estimator,
            tx_manager,
            nonce_retry: BackoffPolicy::fixed(NONCE_TOO_LOW_RETRY_DELAY, NONCE_TOO_LOW_RETRIES),
            token,
            total_epochs: 0,
            last_proposed_at: None,
            triggers: Arc::default(),
            signals: None,
            pending_txs: None,
        }
    }

    /// Run the proposing loop until the cancellation token fires.
    pub async fn start(mut self) {
        let token = self.token.clone();
        info!(proposer = %self.proposer, da = self.builder.name(), "🤠 Starting proposer loop");

        if let Some(signals) = self.signals.take() {
            tokio::spawn(watch_signals(signals, self.triggers.clone(), token.clone()));
        }
        if let Some(pending) = self.pending_txs.take() {
            tokio::spawn(watch_bridge_messages(
                pending,
                self.reader.clone(),
                self.triggers.clone(),
                token.clone(),
            ));
        }

        loop {
            let wait = self.next_interval();
            debug!(?wait, "Waiting for the next proposing tick");

            tokio::select! {
                biased;

                _ = token.cancelled() => {
                    info!("Proposer shutting down");
                    return
                }

                _ = sleep(wait) => {}
            }

            tokio::select! {
                biased;

                _ = token.cancelled() => {
                    info!("Proposer shutting down, abandoning the current tick");
                    return
                }

                res = self.propose_once() => match res {
                    Ok(outcome) => debug!(?outcome, epoch = self.total_epochs, "Proposing tick done"),
                    Err(e) => {
                        ProposerMetrics::increment_failures(e.label());
                        if e.is_transient() {
                            warn!(error = %e, kind = e.label(), "Proposing tick failed, retrying on next tick");
                        } else {
                            error!(error = %e, kind = e.label(), "❌ Proposing tick failed");
                        }
                    }
                },
            }
        }
    }

    /// The time until the next tick: the configured interval, or a random one.
    fn next_interval(&self) -> Duration {
        self.cfg.propose_interval().unwrap_or_else(|| {
            let (min, max) = RANDOM_INTERVAL_SECS;
            Duration::from_secs(rand::rng().random_range(min..=max))
        })
    }

    /// Returns true once the minimum proposing interval has elapsed since the last proposal.
    fn empty_proposal_allowed(&self) -> bool {
        let Some(interval) = self.cfg.min_proposing_interval() else { return false };
        self.last_proposed_at.is_none_or(|at| at.elapsed() > interval)
    }

    /// The minimum tip of this tick. It is waived every `allow_zero_tip_interval` ticks.
    fn min_tip(&self) -> u64 {
        let interval = self.cfg.proposer.allow_zero_tip_interval;
        if interval > 0 && self.total_epochs % interval == 0 {
            info!(epoch = self.total_epochs, "Accepting transactions with zero tip");
            return 0
        }
        self.cfg.proposer.min_tip
    }

    /// Runs a single proposing tick.
    pub(crate) async fn propose_once(&mut self) -> Result<TickOutcome, ProposerError> {
        if let Some(router) = self.reader.preconf_router().await? {
            info!(%router, "Preconfirmation router is set, skipping proposal");
            return Ok(TickOutcome::RouterManaged)
        }

        if !self.reader.is_l2_synced().await? {
            return Err(ProposerError::L2NotSynced)
        }

        self.total_epochs += 1;
        ProposerMetrics::increment_epochs();

        let base_fee = self.reader.l2_base_fee().await?;
        ProposerMetrics::set_l2_base_fee(u128::from(base_fee));

        let forced = self.triggers.is_forced();
        let tx_lists = if forced {
            info!("Forcing an empty proposal after L1 bridge activity");
            Some(vec![vec![]])
        } else {
            self.fetch_tx_lists(base_fee).await?
        };
        let Some(mut tx_lists) = tx_lists else {
            debug!("No transactions to propose");
            return Ok(TickOutcome::NothingToPropose)
        };

        let max_blocks = self.cfg.max_blocks_per_batch();
        if tx_lists.len() > max_blocks {
            return Err(ProposerError::TooManyBlocks(tx_lists.len(), max_blocks))
        }

        let required = self.cfg.protocol.required_bond(tx_lists.len());
        let available = self.reader.available_bond(self.proposer).await?;
        if available < required {
            return Err(ProposerError::InsufficientBond {
                account: self.proposer,
                available,
                required,
            })
        }

        let ctx = ProposalContext {
            proposer: self.proposer,
            coinbase: self.cfg.proposer.fee_recipient.unwrap_or(self.proposer),
            parent_meta_hash: self.reader.parent_meta_hash().await?,
            forced_inclusion: self.reader.forced_inclusion().await?,
        };
        if let Some(pending) = &ctx.forced_inclusion {
            info!(blob_hash = %pending.inclusion.blobHash, "Including pending forced inclusion");
        }

        let mut base_fee = u128::from(base_fee);
        let candidate = self.builder.build(&tx_lists, &ctx).await?;
        let candidate = if forced {
            debug!("Forced proposal, skipping the profitability check");
            candidate
        } else {
            match self.profitable_candidate(candidate, &mut tx_lists, &mut base_fee, &ctx).await? {
                Some(candidate) => candidate,
                None => return Ok(TickOutcome::Unprofitable),
            }
        };

        let txs = count_txs(&tx_lists);
        let receipt = self.send_with_nonce_retry(candidate).await?;
        self.last_proposed_at = Some(Instant::now());
        if forced {
            self.triggers.clear();
            ProposerMetrics::increment_forced_proposals();
        }

        ProposerMetrics::increment_proposals_landed();
        ProposerMetrics::increment_proposed_tx_lists(tx_lists.len());
        ProposerMetrics::increment_proposed_txs(txs);
        info!(
            tx_hash = %receipt.transaction_hash,
            blocks = tx_lists.len(),
            txs,
            gas = total_gas_limit(&tx_lists),
            base_fee,
            da = self.builder.name(),
            "📦 Batch proposed"
        );

        Ok(TickOutcome::Proposed)
    }

    /// Runs the profitability check of the candidate. Returns the candidate to send, rebuilt
    /// if the base fee was raised, or `None` if the batch doesn't pay off.
    async fn profitable_candidate(
        &self,
        candidate: TxCandidate,
        tx_lists: &mut Vec<TxList>,
        base_fee: &mut u128,
        ctx: &ProposalContext,
    ) -> Result<Option<TxCandidate>, ProposerError> {
        let verdict =
            self.fee_model.check(self.estimator.as_ref(), &candidate, tx_lists, base_fee).await?;
        ProposerMetrics::set_profitability(verdict.estimated_cost, verdict.collected_fees);

        if !verdict.profitable {
            info!(
                estimated_cost = verdict.estimated_cost,
                collected_fees = verdict.collected_fees,
                "📉 Batch not profitable, skipping"
            );
            ProposerMetrics::increment_unprofitable_batches();
            return Ok(None)
        }

        if !verdict.base_fee_adjusted {
            return Ok(Some(candidate))
        }
        ProposerMetrics::increment_base_fee_adjustments();
        Ok(Some(self.builder.build(tx_lists, ctx).await?))
    }

    /// Fetches the transaction lists to propose. Returns `None` if there is nothing to
    /// propose, and a single empty list if an empty proposal is due.
    async fn fetch_tx_lists(&self, base_fee: u64) -> Result<Option<Vec<TxList>>, ProposerError> {
        let params = TxPoolContentParams {
            beneficiary: self.cfg.proposer.fee_recipient.unwrap_or(self.proposer),
            base_fee,
            block_max_gas_limit: u64::from(self.cfg.protocol.blockMaxGasLimit),
            max_bytes_per_tx_list: self.cfg.proposer.max_bytes_per_tx_list,
            local_accounts: self.cfg.proposer.local_addresses.clone(),
            max_tx_lists_per_call: self.cfg.proposer.max_tx_lists,
            min_tip: self.min_tip(),
        };

        let started = Instant::now();
        let mut tx_lists = self.reader.pool_content(params).await?;
        ProposerMetrics::record_pool_content_fetch_time(started.elapsed());

        if self.cfg.proposer.local_addresses_only {
            tx_lists = self.filter_local(tx_lists)?;
        }

        if !tx_lists.is_empty() {
            return Ok(Some(tx_lists))
        }

        if self.empty_proposal_allowed() {
            info!("Proposing an empty batch, the minimum proposing interval elapsed");
            return Ok(Some(vec![vec![]]))
        }

        Ok(None)
    }

    /// Keeps only the transactions sent by the local addresses, dropping the lists left empty.
    fn filter_local(&self, tx_lists: Vec<TxList>) -> Result<Vec<TxList>, ProposerError> {
        let local = &self.cfg.proposer.local_addresses;
        let mut filtered = Vec::with_capacity(tx_lists.len());

        for list in tx_lists {
            let mut kept = Vec::with_capacity(list.len());
            for tx in list {
                let sender = tx
                    .recover_signer()
                    .map_err(|e| ProposerError::SenderRecovery(e.to_string()))?;
                if local.contains(&sender) {
                    kept.push(tx);
                }
            }
            if !kept.is_empty() {
                filtered.push(kept);
            }
        }

        Ok(filtered)
    }

    /// Sends the candidate, retrying when it's rejected with a stale nonce.
    async fn send_with_nonce_retry(
        &self,
        candidate: TxCandidate,
    ) -> Result<TransactionReceipt, ProposerError> {
        let (tx_manager, candidate) = (&self.tx_manager, &candidate);
        let res = retry_until_cancelled(
            self.nonce_retry,
            &self.token,
            || async move { tx_manager.send(candidate.clone()).await.map_err(ProposerError::from) },
            |e: &ProposerError| {
                let retry = e.is_nonce_too_low();
                if retry {
                    warn!("Proposal nonce too low, retrying");
                }
                retry
            },
        )
        .await;

        match res {
            Ok(receipt) => Ok(receipt),
            Err(RetryError::Cancelled) => Err(ProposerError::Cancelled),
            Err(RetryError::Failed(e)) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use alloy_primitives::U256;
    use surge_chainio::{
        revert::{Rejection, RevertKind},
        test_utils::MockTxManager,
        tx_manager::TxManagerError,
    };

    use super::*;
    use crate::{
        builder::CalldataBuilder,
        test_utils::{
            FixedCostEstimator, GWEI, MockReader, inbox, runtime_config, signed_transfer, signer,
            transfer,
        },
    };

    struct Harness {
        proposer: Proposer,
        reader: Arc<MockReader>,
        tx_manager: Arc<MockTxManager>,
    }

    fn harness(extra: &[&str], reader: MockReader, cost: u128) -> Harness {
        let reader = Arc::new(reader);
        let tx_manager = Arc::new(MockTxManager::new());
        let mut proposer = Proposer::with_components(
            runtime_config(extra),
            reader.clone(),
            Arc::new(CalldataBuilder::new(ProposalTarget::new(inbox(), None))),
            Arc::new(FixedCostEstimator(cost)),
            tx_manager.clone(),
            CancellationToken::new(),
        );
        proposer.nonce_retry = BackoffPolicy::fixed(Duration::from_millis(1), NONCE_TOO_LOW_RETRIES);

        Harness { proposer, reader, tx_manager }
    }

    fn nonce_too_low() -> TxManagerError {
        TxManagerError::Failed(RevertKind::Rejected(
            Rejection::NonceTooLow,
            "nonce too low: next nonce 8, tx nonce 7".to_owned(),
        ))
    }

    #[tokio::test]
    async fn proposes_profitable_batch() {
        let pool = vec![vec![transfer(0), transfer(1)], vec![transfer(2)]];
        let mut h = harness(&[], MockReader::with_pool(pool), 0);

        assert_eq!(h.proposer.propose_once().await.unwrap(), TickOutcome::Proposed);
        assert_eq!(h.tx_manager.sent_count(), 1);
        assert!(h.proposer.last_proposed_at.is_some());

        let params = &h.reader.requests()[0];
        assert_eq!(params.base_fee, GWEI as u64);
        assert_eq!(params.beneficiary, Address::repeat_byte(0xaa));
        assert_eq!(params.block_max_gas_limit, 240_000_000);
    }

    #[tokio::test]
    async fn empty_pool_proposes_only_when_due() {
        let mut h = harness(&[], MockReader::default(), 0);
        assert_eq!(h.proposer.propose_once().await.unwrap(), TickOutcome::NothingToPropose);
        assert_eq!(h.tx_manager.sent_count(), 0);

        let mut h = harness(&["--proposer.min-proposing-interval", "3600"], MockReader::default(), 0);
        assert_eq!(h.proposer.propose_once().await.unwrap(), TickOutcome::Proposed);
        assert_eq!(h.tx_manager.sent_count(), 1);

        // The interval restarts from the last proposal.
        assert_eq!(h.proposer.propose_once().await.unwrap(), TickOutcome::NothingToPropose);
        assert_eq!(h.tx_manager.sent_count(), 1);
    }

    #[tokio::test]
    async fn preconf_router_skips_proposing() {
        let mut h = harness(&[], MockReader::with_pool(vec![vec![transfer(0)]]), 0);
        *h.reader.preconf_router.lock().unwrap() = Some(Address::repeat_byte(0x9e));

        assert_eq!(h.proposer.propose_once().await.unwrap(), TickOutcome::RouterManaged);
        assert_eq!(h.tx_manager.sent_count(), 0);
        assert!(h.reader.requests().is_empty());
        assert_eq!(h.proposer.total_epochs, 0);

        *h.reader.preconf_router.lock().unwrap() = None;
        assert_eq!(h.proposer.propose_once().await.unwrap(), TickOutcome::Proposed);
    }

    #[tokio::test]
    async fn signal_forces_an_empty_proposal() {
        let unprofitable = 1_000 * GWEI * GWEI;
        let mut h = harness(&[], MockReader::with_pool(vec![vec![transfer(0)]]), unprofitable);
        h.proposer.triggers.force();

        // Neither the mempool nor the profitability check is consulted.
        assert_eq!(h.proposer.propose_once().await.unwrap(), TickOutcome::Proposed);
        assert_eq!(h.tx_manager.sent_count(), 1);
        assert!(h.reader.requests().is_empty());

        // The request is cleared once the proposal landed.
        assert_eq!(h.proposer.propose_once().await.unwrap(), TickOutcome::Unprofitable);
        assert_eq!(h.tx_manager.sent_count(), 1);
    }

    #[tokio::test]
    async fn forced_proposal_survives_a_failed_send() {
        let mut h = harness(&[], MockReader::default(), 0);
        assert!(h.proposer.triggers.record_bridge_message(B256::repeat_byte(0xb1)));
        h.tx_manager.fail_next(TxManagerError::FeesTooHigh(2, 1));

        assert!(h.proposer.propose_once().await.is_err());
        assert_eq!(h.proposer.propose_once().await.unwrap(), TickOutcome::Proposed);
        assert_eq!(h.tx_manager.sent_count(), 2);

        // Back to the regular mempool flow.
        assert_eq!(h.proposer.propose_once().await.unwrap(), TickOutcome::NothingToPropose);
    }

    #[tokio::test]
    async fn rejects_too_many_blocks() {
        let pool = (0..5).map(|n| vec![transfer(n)]).collect();
        let mut h = harness(&[], MockReader::with_pool(pool), 0);

        let err = h.proposer.propose_once().await.unwrap_err();
        assert!(matches!(err, ProposerError::TooManyBlocks(5, 4)));
        assert_eq!(h.tx_manager.sent_count(), 0);
    }

    #[tokio::test]
    async fn rejects_insufficient_bond() {
        let pool = vec![vec![transfer(0)], vec![transfer(1)]];
        let mut h = harness(&[], MockReader::with_pool(pool), 0);
        h.reader.set_bond(U256::from(119));

        let err = h.proposer.propose_once().await.unwrap_err();
        assert!(matches!(
            err,
            ProposerError::InsufficientBond { available, required, .. }
                if available == U256::from(119) && required == U256::from(120)
        ));

        h.reader.set_bond(U256::from(120));
        assert_eq!(h.proposer.propose_once().await.unwrap(), TickOutcome::Proposed);
    }

    #[tokio::test]
    async fn unprofitable_batch_is_not_sent() {
        let mut h = harness(&[], MockReader::with_pool(vec![vec![transfer(0)]]), 1_000 * GWEI * GWEI);

        assert_eq!(h.proposer.propose_once().await.unwrap(), TickOutcome::Unprofitable);
        assert_eq!(h.tx_manager.sent_count(), 0);
        assert!(h.proposer.last_proposed_at.is_none());
    }

    #[tokio::test]
    async fn unsynced_l2_skips_tick() {
        let mut h = harness(&[], MockReader::with_pool(vec![vec![transfer(0)]]), 0);
        h.reader.synced.store(false, Ordering::Relaxed);

        let err = h.proposer.propose_once().await.unwrap_err();
        assert!(matches!(err, ProposerError::L2NotSynced));
        assert!(err.is_transient());
        assert!(h.reader.requests().is_empty());
    }

    #[tokio::test]
    async fn nonce_too_low_is_retried() {
        let mut h = harness(&[], MockReader::with_pool(vec![vec![transfer(0)]]), 0);
        h.tx_manager.fail_next(nonce_too_low());
        h.tx_manager.fail_next(nonce_too_low());

        assert_eq!(h.proposer.propose_once().await.unwrap(), TickOutcome::Proposed);
        assert_eq!(h.tx_manager.sent_count(), 3);

        // Retries are bounded.
        for _ in 0..=NONCE_TOO_LOW_RETRIES {
            h.tx_manager.fail_next(nonce_too_low());
        }
        let err = h.proposer.propose_once().await.unwrap_err();
        assert!(err.is_nonce_too_low());
        assert_eq!(h.tx_manager.sent_count(), 3 + NONCE_TOO_LOW_RETRIES + 1);
    }

    #[tokio::test]
    async fn other_send_errors_are_not_retried() {
        let mut h = harness(&[], MockReader::with_pool(vec![vec![transfer(0)]]), 0);
        h.tx_manager.fail_next(TxManagerError::FeesTooHigh(2, 1));

        let err = h.proposer.propose_once().await.unwrap_err();
        assert!(matches!(err, ProposerError::Tx(TxManagerError::FeesTooHigh(2, 1))));
        assert_eq!(h.tx_manager.sent_count(), 1);
    }

    #[tokio::test]
    async fn zero_tip_every_n_epochs() {
        let mut h = harness(
            &["--proposer.min-tip", "5", "--proposer.allow-zero-tip-interval", "3"],
            MockReader::default(),
            0,
        );
        for _ in 0..6 {
            h.proposer.propose_once().await.unwrap();
        }

        let tips: Vec<_> = h.reader.requests().iter().map(|p| p.min_tip).collect();
        assert_eq!(tips, vec![5, 5, 0, 5, 5, 0]);
    }

    #[tokio::test]
    async fn local_addresses_only() {
        let local = signer(1);
        let remote = signer(2);
        let local_address = local.address().to_string();
        let pool = vec![
            vec![signed_transfer(&remote, 0, 10 * GWEI)],
            vec![signed_transfer(&local, 0, 10 * GWEI), signed_transfer(&remote, 1, 10 * GWEI)],
        ];
        let mut h = harness(
            &["--proposer.local-addresses", &local_address, "--proposer.local-addresses-only"],
            MockReader::with_pool(pool),
            0,
        );

        let lists = h.proposer.fetch_tx_lists(1).await.unwrap().unwrap();
        assert_eq!(lists.len(), 1);
        assert_eq!(lists[0].len(), 1);
        assert_eq!(lists[0][0].recover_signer().unwrap(), local.address());

        // Nothing local left: nothing to propose.
        *h.reader.pool.lock().unwrap() = vec![vec![signed_transfer(&remote, 2, 10 * GWEI)]];
        assert_eq!(h.proposer.propose_once().await.unwrap(), TickOutcome::NothingToPropose);
    }

    #[tokio::test]
    async fn cancelled_loop_returns() {
        let h = harness(&["--proposer.interval", "3600"], MockReader::default(), 0);
        let token = h.proposer.token.clone();

        let handle = tokio::spawn(h.proposer.start());
        token.cancel();
        handle.await.unwrap();
        assert_eq!(h.tx_manager.sent_count(), 0);
    }
}
