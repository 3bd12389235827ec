use alloy_primitives::{Address, B256, BlockNumber};
use async_trait::async_trait;
use surge_primitives::{
    batch::{BatchId, BatchMetadata, ContestRequest, ProofRequest, Transition},
    current_timestamp_seconds,
    tier::ProofTier,
};
use tracing::{debug, info, trace, warn};

use crate::{
    PipelineError, Prover,
    event::{ObservedEvent, ProtocolEvent},
    iterator::EventHandler,
    ledger::ProofStatus,
    metrics::ProverMetrics,
};

#[async_trait]
impl EventHandler for Prover {
    async fn handle(&mut self, observed: ObservedEvent) -> Result<(), PipelineError> {
        ProverMetrics::increment_events_handled(observed.event.kind());
        let timestamp = observed.block_timestamp.unwrap_or_else(current_timestamp_seconds);

        match observed.event {
            ProtocolEvent::BatchProposed(meta) => self.on_batch_proposed(meta).await,
            ProtocolEvent::BatchesVerified { batch_id, block_hash } => {
                self.on_batches_verified(batch_id, block_hash);
                Ok(())
            }
            ProtocolEvent::TransitionProved { batch_id, transition, prover, tier } => {
                self.on_transition_proved(batch_id, transition, prover, tier, timestamp).await
            }
            ProtocolEvent::TransitionContested { batch_id, transition, contester, tier } => {
                self.on_transition_contested(batch_id, transition, contester, tier).await
            }
            ProtocolEvent::BatchesRollbacked { start, end } => {
                self.on_batches_rollbacked(start, end, observed.block_number);
                Ok(())
            }
        }
    }

    async fn on_scanned(&mut self, height: BlockNumber) -> Result<(), PipelineError> {
        let header = self.source.header(height).await?;
        self.cursor.set_l1_current(header);
        ProverMetrics::set_l1_current(height);
        Ok(())
    }
}

impl Prover {
    /// Handles a new batch: requests a proof for it, unless it was already handled, verified,
    /// rolled back, or assigned to another proposer.
    pub(crate) async fn on_batch_proposed(
        &mut self,
        meta: BatchMetadata,
    ) -> Result<(), PipelineError> {
        let batch_id = meta.batch_id;
        if self.cursor.is_rolled_back(batch_id, meta.proposed_in) {
            debug!(batch_id, proposed_in = meta.proposed_in, "Batch proposal was rolled back, skipping");
            return Ok(())
        }

        if !self.cursor.should_handle(batch_id) {
            let last_handled = self.cursor.last_handled_batch_id();
            trace!(batch_id, last_handled, "Batch already handled, skipping");
            return Ok(())
        }

        let last_verified = self.reader.last_verified_batch_id().await?;
        if batch_id <= last_verified {
            debug!(batch_id, last_verified, "Batch already verified, skipping");
            self.advance_last_handled(batch_id);
            return Ok(())
        }

        self.metas.insert(batch_id, meta.clone());

        if self.local_proposers.contains(&meta.proposer) {
            info!(batch_id, proposer = %meta.proposer, min_tier = %meta.min_tier, "📦 New batch proposed");
            self.enqueue(&self.senders.requests, ProofRequest::at_min_tier(meta), "proof_requests");
        } else if !self.cfg.prover.prove_unassigned {
            debug!(batch_id, proposer = %meta.proposer, "Batch proposed by another proposer, skipping");
        } else {
            let expires_at = meta.proposed_at.saturating_add(self.cfg.proving_window_secs());
            if current_timestamp_seconds() < expires_at {
                debug!(batch_id, proposer = %meta.proposer, expires_at, "Waiting for the proving window of the batch to close");
                self.schedule_assignment_expiry(meta, expires_at);
            } else {
                info!(batch_id, proposer = %meta.proposer, "📦 Proving window of batch already closed");
                self.enqueue(&self.senders.requests, ProofRequest::at_min_tier(meta), "proof_requests");
            }
        }

        self.advance_last_handled(batch_id);
        Ok(())
    }

    pub(crate) fn on_batches_verified(&mut self, batch_id: BatchId, block_hash: B256) {
        info!(batch_id, %block_hash, "✅ Batches verified");
        ProverMetrics::set_last_verified_batch_id(batch_id);

        self.ledger.prune(batch_id);
        self.metas.retain(|id, _| *id > batch_id);
    }

    /// Compares a proved transition with the local chain, and contests it on mismatch if
    /// contesting is enabled. The deadline is the end of the cooldown window.
    pub(crate) async fn on_transition_proved(
        &mut self,
        batch_id: BatchId,
        transition: Transition,
        prover: Address,
        tier: Option<ProofTier>,
        proved_at: u64,
    ) -> Result<(), PipelineError> {
        if prover == self.prover {
            trace!(batch_id, "Own proof landed");
            return Ok(())
        }

        let Some(meta) = self.metas.get(&batch_id).cloned() else {
            debug!(batch_id, %prover, "Transition proved for an unknown or verified batch, skipping");
            return Ok(())
        };

        let local = self.reader.transition(&meta).await?;
        if local.block_hash == transition.block_hash {
            debug!(batch_id, %prover, "Proved transition matches the local chain");
            return Ok(())
        }

        warn!(
            batch_id,
            %prover,
            local = %local.block_hash,
            proved = %transition.block_hash,
            "⚠️ Proved transition doesn't match the local chain"
        );
        if !self.cfg.prover.contest {
            return Ok(())
        }

        let req = ContestRequest {
            tier: tier.unwrap_or(meta.min_tier),
            transition: local,
            deadline: proved_at.saturating_add(self.cfg.cooldown_window_secs()),
            meta,
        };
        self.enqueue(&self.senders.contests, req, "contests");
        Ok(())
    }

    /// Defends a contested transition that matches the local chain with a proof of the next
    /// higher tier.
    pub(crate) async fn on_transition_contested(
        &mut self,
        batch_id: BatchId,
        transition: Transition,
        contester: Address,
        tier: Option<ProofTier>,
    ) -> Result<(), PipelineError> {
        let Some(meta) = self.metas.get(&batch_id).cloned() else {
            debug!(batch_id, %contester, "Transition contested for an unknown or verified batch, skipping");
            return Ok(())
        };

        let current = tier.unwrap_or(meta.min_tier);
        self.ledger.set(batch_id, current, ProofStatus::Contested);

        let local = self.reader.transition(&meta).await?;
        if local.block_hash != transition.block_hash {
            info!(batch_id, %contester, "Contested transition doesn't match the local chain, not defending");
            return Ok(())
        }

        let Some(next) = current.next() else {
            warn!(batch_id, tier = %current, "Transition contested at the highest tier, cannot escalate");
            return Ok(())
        };

        info!(batch_id, %contester, from = %current, to = %next, "⚔️ Transition contested, escalating");
        self.enqueue(&self.senders.requests, ProofRequest { meta, tier: next }, "proof_requests");
        Ok(())
    }

    /// Re-requests a proof for a batch whose proving window closed, unless it got verified in
    /// the meantime.
    pub(crate) async fn on_assignment_expired(&mut self, meta: BatchMetadata) {
        let batch_id = meta.batch_id;
        match self.reader.last_verified_batch_id().await {
            Ok(last_verified) if batch_id <= last_verified => {
                debug!(batch_id, last_verified, "Batch verified before its proving window closed");
            }
            Ok(_) => {
                info!(batch_id, proposer = %meta.proposer, "⏰ Proving window closed, proving batch");
                self.on_proof_request(ProofRequest::at_min_tier(meta));
            }
            Err(e) => {
                warn!(batch_id, error = %e, "Failed to read the last verified batch, proving anyway");
                self.on_proof_request(ProofRequest::at_min_tier(meta));
            }
        }
    }

    /// Records the rolled back range: new proposals with the same IDs are handled again, while
    /// the stale proposals are ignored.
    pub(crate) fn on_batches_rollbacked(
        &mut self,
        start: BatchId,
        end: BatchId,
        observed_in: BlockNumber,
    ) {
        warn!(start, end, observed_in, "⏪ Batches rolled back");
        ProverMetrics::increment_rollbacks(start, end);

        self.cursor.record_rollback(start, end, observed_in);
        self.ledger.forget_range(start, end);
        self.metas.retain(|id, _| !(start..=end).contains(id));
        ProverMetrics::set_last_handled_batch_id(self.cursor.last_handled_batch_id());
    }

    fn advance_last_handled(&self, batch_id: BatchId) {
        self.cursor.advance_last_handled(batch_id);
        ProverMetrics::set_last_handled_batch_id(self.cursor.last_handled_batch_id());
    }
}
