use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
    time::{Duration, Instant},
};

use alloy::rpc::types::Log;
use alloy_primitives::{Address, B256};
use surge_chainio::{
    taiko::{
        inbox::{ITaikoInbox::ITaikoInboxErrors, TaikoInbox},
        token::TaikoToken,
    },
    tx_manager::{TransactionManager, TxManagerError},
};
use surge_clients::execution::ExecutionClient;
use surge_primitives::{
    batch::{BatchId, BatchMetadata, ContestRequest, ProofRequest, ProofResult},
    current_timestamp_seconds,
    cursor::SharedCursorState,
    retries::{RetryError, retry_until_cancelled},
    summary::Summary,
    task::BackgroundTasks,
};
use tokio::{
    sync::mpsc::{self, error::TrySendError},
    time::{self, MissedTickBehavior, interval, sleep},
};
use tokio_stream::{StreamExt, wrappers::ReceiverStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::{
    PipelineError, RuntimeConfig,
    iterator::{EventIterator, EventSource, RpcEventSource},
    ledger::{ProofLedger, ProofStatus},
    metrics::ProverMetrics,
    producer::build_producer,
    reader::{ProtocolReader, RpcProtocolReader},
    submitter::{ProofSubmitter, SubmissionOutcome, SubmitterSet},
};

/// Sending halves of the prover work queues.
#[derive(Debug, Clone)]
pub(crate) struct Senders {
    /// Triggers a prove pass. Capacity 1: extra triggers coalesce.
    pub(crate) notify: mpsc::Sender<()>,
    pub(crate) requests: mpsc::Sender<ProofRequest>,
    pub(crate) results: mpsc::Sender<ProofResult>,
    pub(crate) contests: mpsc::Sender<ContestRequest>,
    pub(crate) expired: mpsc::Sender<BatchMetadata>,
}

/// Receiving halves of the prover work queues, owned by the event loop.
#[derive(Debug)]
pub(crate) struct Receivers {
    pub(crate) notify: mpsc::Receiver<()>,
    pub(crate) requests: mpsc::Receiver<ProofRequest>,
    pub(crate) results: mpsc::Receiver<ProofResult>,
    pub(crate) contests: mpsc::Receiver<ContestRequest>,
    pub(crate) expired: mpsc::Receiver<BatchMetadata>,
}

fn channels(capacity: usize) -> (Senders, Receivers) {
    let (notify_tx, notify_rx) = mpsc::channel(1);
    let (requests_tx, requests_rx) = mpsc::channel(capacity);
    let (results_tx, results_rx) = mpsc::channel(capacity);
    let (contests_tx, contests_rx) = mpsc::channel(capacity);
    let (expired_tx, expired_rx) = mpsc::channel(capacity);

    (
        Senders {
            notify: notify_tx,
            requests: requests_tx,
            results: results_tx,
            contests: contests_tx,
            expired: expired_tx,
        },
        Receivers {
            notify: notify_rx,
            requests: requests_rx,
            results: results_rx,
            contests: contests_rx,
            expired: expired_rx,
        },
    )
}

/// Surge prover.
///
/// The prover runs a single event loop, responsible for:
/// - Replaying confirmed protocol events from L1 and dispatching them to the handlers
/// - Requesting proofs for new batches, at the cheapest tier that satisfies them
/// - Submitting generated proofs, and contesting transitions that don't match the local chain
///
/// Proof generation and submission run in background tasks with bounded retries: the loop
/// never waits on the proof service or on L1 confirmations.
#[derive(Debug)]
pub struct Prover {
    /// Prover runtime configuration.
    pub(crate) cfg: RuntimeConfig,
    /// Event cursor, written by the event loop only.
    pub(crate) cursor: Arc<SharedCursorState>,
    /// Source of protocol events on L1.
    pub(crate) source: Arc<dyn EventSource>,
    /// Protocol state reader.
    pub(crate) reader: Arc<dyn ProtocolReader>,
    /// Per-tier submitters, in ascending tier order.
    pub(crate) submitters: SubmitterSet,
    /// Proof status of every batch and tier.
    pub(crate) ledger: ProofLedger,
    /// Join gate of the retried side effects.
    pub(crate) background: BackgroundTasks,
    /// Process-wide cancellation token.
    token: CancellationToken,
    pub(crate) senders: Senders,
    receivers: Option<Receivers>,
    /// Metadata of the unverified batches seen so far.
    pub(crate) metas: HashMap<BatchId, BatchMetadata>,
    /// Proposers whose batches are proven right away.
    pub(crate) local_proposers: HashSet<Address>,
    /// The account sending the proofs.
    pub(crate) prover: Address,
    /// L1 client, used to trace reverted transactions.
    l1: Option<ExecutionClient>,
    /// New `BatchProposed` logs, each of which triggers a prove pass.
    proposals: Option<ReceiverStream<Log>>,
}

impl Prover {
    /// Create a new [`Prover`] instance, sending transactions through `tx_manager`.
    ///
    /// The event cursor resumes from the anchor block of the starting batch: the configured
    /// one, or the last verified one.
    pub async fn new(
        cfg: RuntimeConfig,
        tx_manager: Arc<dyn TransactionManager>,
        token: CancellationToken,
    ) -> Result<Self, PipelineError> {
        info!("{}", cfg.summary());

        let l1 = ExecutionClient::new(cfg.l1.el_url.clone(), cfg.l1.el_ws_url.clone()).await?;
        let l2 = ExecutionClient::new(cfg.l2.el_url.clone(), None).await?;
        let inbox = TaikoInbox::new(cfg.l1.el_url.clone(), cfg.contracts.taiko_inbox);
        let prover = tx_manager.sender();

        if let Some(allowance) = cfg.prover.allowance {
            let bond_token = TaikoToken::new(
                cfg.l1.el_url.clone(),
                cfg.contracts.taiko_token,
                cfg.operator.private_key.clone(),
            );
            if bond_token.ensure_allowance(cfg.contracts.taiko_inbox, allowance).await? {
                info!(%allowance, "Bond token allowance approved");
            }
        }

        let mut submitters = Vec::with_capacity(cfg.prover.tiers.len());
        for tier in &cfg.prover.tiers {
            let producer = build_producer(&cfg.prover, *tier, prover)?;
            submitters.push(ProofSubmitter::new(producer, inbox.clone(), Arc::clone(&tx_manager)));
        }
        let submitters = SubmitterSet::new(submitters);

        let timeout = cfg.rpc_timeout();
        let source = Arc::new(RpcEventSource::new(
            l1.clone(),
            inbox.protocol_events_filter(),
            cfg.prover.min_tier,
            timeout,
        ));
        let reader = Arc::new(RpcProtocolReader::new(inbox.clone(), l2, timeout));

        let (start_batch, last_handled) = match cfg.prover.starting_batch_id {
            Some(id) => (id, id.saturating_sub(1)),
            None => {
                let id = reader.last_verified_batch_id().await?;
                (id, id)
            }
        };
        let anchor = reader.batch(start_batch).await?.anchor_block_id;
        let cursor = Arc::new(SharedCursorState::new(last_handled));
        cursor.set_l1_current(source.header(anchor).await?);
        info!(start_batch, anchor, "Resuming from the anchor block of the starting batch");

        let proposals = l1.subscribe_events(inbox.batch_proposed_filter());

        let mut prover = Self::with_components(cfg, cursor, source, reader, submitters, prover, token);
        prover.l1 = Some(l1);
        prover.proposals = Some(proposals);
        Ok(prover)
    }

    /// Builds a prover over the given components, without any L1 subscription.
    pub(crate) fn with_components(
        cfg: RuntimeConfig,
        cursor: Arc<SharedCursorState>,
        source: Arc<dyn EventSource>,
        reader: Arc<dyn ProtocolReader>,
        submitters: SubmitterSet,
        prover: Address,
        token: CancellationToken,
    ) -> Self {
        let (senders, receivers) = channels(cfg.queue_capacity());
        let mut local_proposers: HashSet<_> = cfg.prover.local_proposers.iter().copied().collect();
        local_proposers.insert(prover);

        Self {
            background: BackgroundTasks::new(token.child_token()),
            cfg,
            cursor,
            source,
            reader,
            submitters,
            ledger: ProofLedger::new(),
            token,
            senders,
            receivers: Some(receivers),
            metas: HashMap::new(),
            local_proposers,
            prover,
            l1: None,
            proposals: None,
        }
    }

    /// Returns the shared event cursor.
    pub fn cursor(&self) -> Arc<SharedCursorState> {
        Arc::clone(&self.cursor)
    }

    /// Run the prover event loop until the cancellation token fires. In-flight side effects
    /// are cancelled and joined before returning.
    pub async fn start(mut self) {
        let Some(mut rx) = self.receivers.take() else {
            error!("Prover event loop already started");
            return
        };
        let mut proposals = self.proposals.take();
        let token = self.token.clone();

        let mut force_ticker = interval(self.cfg.force_proving_interval());
        force_ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(tiers = ?self.submitters.tiers(), "🤠 Starting prover event loop");

        loop {
            tokio::select! {
                biased;

                _ = token.cancelled() => {
                    info!(in_flight = self.background.in_flight(), "Prover shutting down, joining in-flight work");
                    self.background.close().await;
                    return
                }

                // Handle generated proofs
                Some(result) = rx.results.recv() => self.on_proof_generated(result),

                // Handle proof requests
                Some(req) = rx.requests.recv() => self.on_proof_request(req),

                // Handle contest requests
                Some(req) = rx.contests.recv() => self.on_contest_request(req),

                // Handle batches whose proving window closed
                Some(meta) = rx.expired.recv() => self.on_assignment_expired(meta).await,

                // New proposals trigger a prove pass
                Some(_) = next_proposal(&mut proposals) => self.notify(),

                Some(()) = rx.notify.recv() => self.prove_pass().await,

                _ = force_ticker.tick() => self.notify(),
            }
        }
    }

    /// Requests a prove pass. Coalesces with a pending one.
    pub(crate) fn notify(&self) {
        if let Err(TrySendError::Closed(_)) = self.senders.notify.try_send(()) {
            error!("Prove pass trigger closed");
        }
    }

    /// Replays the confirmed protocol events since the L1 cursor.
    pub(crate) async fn prove_pass(&mut self) {
        let start = self.cursor.l1_current_number() + 1;
        let iter = EventIterator::new(
            Arc::clone(&self.source),
            start,
            self.cfg.prover.confirmations,
            self.cfg.prover.block_range,
        );

        match iter.run(self).await {
            Ok(Some(height)) => debug!(start, height, "Prove pass completed"),
            Ok(None) => trace!(start, "No new confirmed blocks"),
            Err(e) => {
                warn!(start, error = %e, kind = e.label(), "Prove pass interrupted, resuming on next trigger")
            }
        }

        ProverMetrics::set_in_flight_tasks(self.background.in_flight());
    }

    /// Puts the item on the queue. If the queue is full, a background task waits for
    /// capacity instead of dropping the work.
    pub(crate) fn enqueue<T: Send + 'static>(
        &self,
        tx: &mpsc::Sender<T>,
        item: T,
        queue: &'static str,
    ) {
        match tx.try_send(item) {
            Ok(()) => {}
            Err(TrySendError::Full(item)) => {
                warn!(queue, "Queue full, waiting for capacity");
                let tx = tx.clone();
                self.background.spawn(move |token| async move {
                    send_or_cancel(&tx, item, &token, queue).await;
                });
            }
            Err(TrySendError::Closed(_)) => error!(queue, "Queue closed, work dropped"),
        }
    }

    /// Requests a proof at the cheapest tier satisfying the request, unless one is already
    /// outstanding or landed.
    pub(crate) fn on_proof_request(&self, req: ProofRequest) {
        let batch_id = req.batch_id();
        let submitter = match self.submitters.select(req.tier) {
            Ok(submitter) => Arc::clone(submitter),
            Err(e) => {
                warn!(batch_id, tier = %req.tier, error = %e, "Cannot prove batch");
                ProverMetrics::increment_no_submitter_found(req.tier);
                return
            }
        };

        let tier = submitter.tier();
        if !self.ledger.try_request(batch_id, tier) {
            let status = self.ledger.status(batch_id, tier);
            debug!(batch_id, %tier, %status, "Proof already requested, skipping");
            return
        }

        info!(batch_id, %tier, "🔍 Requesting proof");
        ProverMetrics::increment_proofs_requested(tier);

        let ledger = self.ledger.clone();
        let reader = Arc::clone(&self.reader);
        let results = self.senders.results.clone();
        let policy = self.cfg.backoff_policy();
        let meta = req.meta;

        self.background.spawn(move |token| async move {
            let started = Instant::now();
            ledger.set(batch_id, tier, ProofStatus::Generating);

            let res = retry_until_cancelled(
                policy,
                &token,
                || async {
                    let proof = submitter.request_proof(&meta).await?;
                    let transition = reader.transition(&meta).await?;
                    Ok::<_, PipelineError>((proof, transition))
                },
                PipelineError::is_transient,
            )
            .await;

            match res {
                Ok((proof, transition)) => {
                    let elapsed = started.elapsed();
                    ledger.set(batch_id, tier, ProofStatus::Generated);
                    ProverMetrics::increment_proofs_generated(tier);
                    ProverMetrics::record_proof_generation_time(tier, elapsed);
                    info!(batch_id, %tier, ?elapsed, "✨ Proof generated");

                    let result = ProofResult { meta, tier, transition, proof };
                    send_or_cancel(&results, result, &token, "proof_results").await;
                }
                Err(RetryError::Cancelled) => {
                    ledger.set(batch_id, tier, ProofStatus::Abandoned);
                    debug!(batch_id, %tier, "Proof request cancelled");
                }
                Err(RetryError::Failed(e)) => {
                    ledger.set(batch_id, tier, ProofStatus::Abandoned);
                    ProverMetrics::increment_failures(tier, e.label());
                    error!(batch_id, %tier, error = %e, kind = e.label(), "❌ Proof request abandoned");
                }
            }
        });
    }

    /// Submits a generated proof through the submitter of its tier. A second submission of
    /// the same batch and tier is a no-op while the first is in flight or landed.
    pub(crate) fn on_proof_generated(&self, result: ProofResult) {
        let (batch_id, tier) = (result.batch_id(), result.tier);
        let Some(submitter) = self.submitters.for_tier(tier).map(Arc::clone) else {
            error!(batch_id, %tier, "No submitter for the generated proof");
            return
        };

        if !self.ledger.try_begin_submission(batch_id, tier) {
            let status = self.ledger.status(batch_id, tier);
            debug!(batch_id, %tier, %status, "Proof submission in flight or landed, skipping");
            return
        }

        let ledger = self.ledger.clone();
        let policy = self.cfg.backoff_policy();
        let l1 = self.l1.clone();

        self.background.spawn(move |token| async move {
            let res = retry_until_cancelled(
                policy,
                &token,
                || submitter.submit_proof(&result),
                PipelineError::is_transient,
            )
            .await;

            match res {
                Ok(SubmissionOutcome::Landed(tx_hash)) => {
                    ledger.set(batch_id, tier, ProofStatus::Submitted);
                    ProverMetrics::increment_proofs_submitted(tier);
                    info!(batch_id, %tier, %tx_hash, "📜 Proof submitted");
                }
                Ok(SubmissionOutcome::AlreadyOnChain(reason)) => {
                    ledger.set(batch_id, tier, ProofStatus::Submitted);
                    ProverMetrics::increment_benign_reverts(tier);
                    info!(batch_id, %tier, %reason, "Proof already on chain, nothing to do");
                }
                Err(RetryError::Cancelled) => {
                    ledger.set(batch_id, tier, ProofStatus::Generated);
                    debug!(batch_id, %tier, "Proof submission cancelled");
                }
                Err(RetryError::Failed(e)) => {
                    ledger.set(batch_id, tier, ProofStatus::Abandoned);
                    ProverMetrics::increment_failures(tier, e.label());
                    error!(batch_id, %tier, error = %e, kind = e.label(), "❌ Proof submission abandoned");

                    if let (PipelineError::Tx(TxManagerError::Reverted(tx_hash, _)), Some(l1)) =
                        (&e, l1)
                    {
                        log_revert_reason(&l1, *tx_hash).await;
                    }
                }
            }
        });
    }

    /// Contests a transition, unless the cooldown window elapsed or a contest of the same
    /// batch and tier was already sent.
    ///
    /// Retries stop at the end of the cooldown window: no attempt starts after it, and an
    /// attempt still pending when it closes is dropped.
    pub(crate) fn on_contest_request(&self, req: ContestRequest) {
        let batch_id = req.meta.batch_id;
        let now = current_timestamp_seconds();
        if now > req.deadline {
            warn!(batch_id, deadline = req.deadline, now, "Cooldown window elapsed, not contesting");
            return
        }
        let expires_at = time::Instant::now() + Duration::from_secs(req.deadline - now);

        let submitter = match self.submitters.select(req.tier) {
            Ok(submitter) => Arc::clone(submitter),
            Err(e) => {
                warn!(batch_id, tier = %req.tier, error = %e, "Cannot contest transition");
                ProverMetrics::increment_no_submitter_found(req.tier);
                return
            }
        };

        let tier = req.tier;
        if self.ledger.status(batch_id, tier) == ProofStatus::Contested {
            debug!(batch_id, %tier, "Transition already contested, skipping");
            return
        }
        self.ledger.set(batch_id, tier, ProofStatus::Contested);

        let ledger = self.ledger.clone();
        let policy = self.cfg.backoff_policy();

        self.background.spawn(move |token| async move {
            let deadline = req.deadline;
            let res = retry_until_cancelled(
                policy,
                &token,
                || async {
                    if time::Instant::now() >= expires_at {
                        return Err(PipelineError::DeadlinePassed(deadline))
                    }
                    time::timeout_at(expires_at, submitter.contest(&req))
                        .await
                        .map_err(|_| PipelineError::DeadlinePassed(deadline))?
                },
                PipelineError::is_transient,
            )
            .await;

            match res {
                Ok(SubmissionOutcome::Landed(tx_hash)) => {
                    ProverMetrics::increment_contests_sent();
                    info!(batch_id, %tier, %tx_hash, "⚔️ Transition contested");
                }
                Ok(SubmissionOutcome::AlreadyOnChain(reason)) => {
                    info!(batch_id, %tier, %reason, "Transition already contested on chain");
                }
                Err(RetryError::Cancelled) => debug!(batch_id, %tier, "Contest cancelled"),
                Err(RetryError::Failed(PipelineError::DeadlinePassed(deadline))) => {
                    ledger.set(batch_id, tier, ProofStatus::Abandoned);
                    ProverMetrics::increment_failures(tier, "deadline_passed");
                    warn!(batch_id, %tier, deadline, "Cooldown window closed while contesting, giving up");
                }
                Err(RetryError::Failed(e)) => {
                    ledger.set(batch_id, tier, ProofStatus::Abandoned);
                    ProverMetrics::increment_failures(tier, e.label());
                    error!(batch_id, %tier, error = %e, kind = e.label(), "❌ Contest abandoned");
                }
            }
        });
    }

    /// Sends the batch to the expiry queue once the timestamp `at` is reached.
    pub(crate) fn schedule_assignment_expiry(&self, meta: BatchMetadata, at: u64) {
        let tx = self.senders.expired.clone();
        self.background.spawn(move |token| async move {
            let delay = Duration::from_secs(at.saturating_sub(current_timestamp_seconds()));
            tokio::select! {
                _ = token.cancelled() => {}
                _ = sleep(delay) => send_or_cancel(&tx, meta, &token, "assignment_expirations").await,
            }
        });
    }
}

async fn next_proposal(proposals: &mut Option<ReceiverStream<Log>>) -> Option<Log> {
    match proposals {
        Some(stream) => stream.next().await,
        None => std::future::pending().await,
    }
}

async fn send_or_cancel<T>(
    tx: &mpsc::Sender<T>,
    item: T,
    token: &CancellationToken,
    queue: &'static str,
) {
    tokio::select! {
        _ = token.cancelled() => debug!(queue, "Cancelled while waiting for queue capacity"),
        res = tx.send(item) => {
            if res.is_err() {
                error!(queue, "Queue closed, work dropped");
            }
        }
    }
}

async fn log_revert_reason(l1: &ExecutionClient, tx_hash: B256) {
    match l1.debug_revert_reason(tx_hash).await {
        Ok(trace) => {
            let reason = trace.try_decode::<ITaikoInboxErrors>();
            error!(%tx_hash, %reason, "Proof transaction reverted");
        }
        Err(e) => warn!(%tx_hash, error = %e, "Failed to trace reverted transaction"),
    }
}
