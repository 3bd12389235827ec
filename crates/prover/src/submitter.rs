use std::sync::Arc;

use alloy_primitives::{Address, B256, Bytes};
use surge_chainio::{taiko::inbox::TaikoInbox, tx_manager::TransactionManager};
use surge_primitives::{
    batch::{BatchMetadata, ContestRequest, ProofResult, TxCandidate},
    tier::ProofTier,
};

use crate::{PipelineError, producer::ProofProducer};

/// The outcome of a proof or contest transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionOutcome {
    /// The transaction landed in the given L1 transaction.
    Landed(B256),
    /// The transaction reverted because the desired outcome is already on chain.
    AlreadyOnChain(String),
}

/// Requests and submits proofs of a single tier.
///
/// Submitters are stateless routers: the proof status of each batch lives in the
/// [`ProofLedger`](crate::ledger::ProofLedger).
#[derive(Debug)]
pub struct ProofSubmitter {
    tier: ProofTier,
    producer: Arc<dyn ProofProducer>,
    inbox: TaikoInbox,
    tx_manager: Arc<dyn TransactionManager>,
}

impl ProofSubmitter {
    /// Creates a submitter for the tier of the producer.
    pub fn new(
        producer: Arc<dyn ProofProducer>,
        inbox: TaikoInbox,
        tx_manager: Arc<dyn TransactionManager>,
    ) -> Self {
        Self { tier: producer.tier(), producer, inbox, tx_manager }
    }

    /// Returns the tier of the submitter.
    pub const fn tier(&self) -> ProofTier {
        self.tier
    }

    /// Returns the account sending the proofs.
    pub fn prover(&self) -> Address {
        self.tx_manager.sender()
    }

    /// Requests a proof from the producer, and waits until it is ready.
    pub async fn request_proof(&self, meta: &BatchMetadata) -> Result<Bytes, PipelineError> {
        Ok(self.producer.request_proof(meta).await?)
    }

    /// Submits the proof to the inbox.
    pub async fn submit_proof(
        &self,
        result: &ProofResult,
    ) -> Result<SubmissionOutcome, PipelineError> {
        let calldata =
            self.inbox.prove_batch_calldata(&result.meta, result.transition, result.proof.clone());
        self.send(TxCandidate::new(*self.inbox.address(), calldata)).await
    }

    /// Contests the transition proven for the batch, claiming the one in the request.
    pub async fn contest(&self, req: &ContestRequest) -> Result<SubmissionOutcome, PipelineError> {
        let calldata =
            self.inbox.contest_batch_calldata(req.meta.batch_id, req.transition, req.tier);
        self.send(TxCandidate::new(*self.inbox.address(), calldata)).await
    }

    async fn send(&self, candidate: TxCandidate) -> Result<SubmissionOutcome, PipelineError> {
        match self.tx_manager.send(candidate).await {
            Ok(receipt) => Ok(SubmissionOutcome::Landed(receipt.transaction_hash)),
            Err(err) => {
                let kind = err.kind();
                if kind.is_benign() {
                    return Ok(SubmissionOutcome::AlreadyOnChain(kind.to_string()))
                }
                Err(err.into())
            }
        }
    }
}

/// The submitters of every tier the node can prove, in ascending tier order.
#[derive(Debug, Clone, Default)]
pub struct SubmitterSet {
    submitters: Vec<Arc<ProofSubmitter>>,
}

impl SubmitterSet {
    /// Creates a new set. If several submitters share a tier, the first one is kept.
    pub fn new(submitters: Vec<ProofSubmitter>) -> Self {
        let mut submitters: Vec<_> = submitters.into_iter().map(Arc::new).collect();
        submitters.sort_by_key(|s| s.tier());
        submitters.dedup_by_key(|s| s.tier());
        Self { submitters }
    }

    /// Selects the cheapest submitter whose tier is at least `min_tier`.
    ///
    /// This is a linear scan over the ascending list: the first match wins.
    pub fn select(&self, min_tier: ProofTier) -> Result<&Arc<ProofSubmitter>, PipelineError> {
        self.submitters
            .iter()
            .find(|s| s.tier() >= min_tier)
            .ok_or(PipelineError::NoSubmitterFound(min_tier))
    }

    /// Returns the submitter of exactly the given tier.
    pub fn for_tier(&self, tier: ProofTier) -> Option<&Arc<ProofSubmitter>> {
        self.submitters.iter().find(|s| s.tier() == tier)
    }

    /// Returns the tiers of the set, in ascending order.
    pub fn tiers(&self) -> Vec<ProofTier> {
        self.submitters.iter().map(|s| s.tier()).collect()
    }
}

#[cfg(test)]
mod tests {
    use surge_chainio::{
        revert::RevertKind, test_utils::MockTxManager, tx_manager::TxManagerError,
    };
    use surge_primitives::batch::Transition;

    use super::*;
    use crate::{
        producer::DummyProducer,
        test_utils::{batch_meta, inbox},
    };

    fn set_of(tiers: &[ProofTier]) -> SubmitterSet {
        let tx_manager = Arc::new(MockTxManager::new());
        SubmitterSet::new(
            tiers
                .iter()
                .map(|t| {
                    ProofSubmitter::new(Arc::new(DummyProducer::new(*t)), inbox(), tx_manager.clone())
                })
                .collect(),
        )
    }

    #[test]
    fn selects_cheapest_sufficient_tier() {
        let set = set_of(&[ProofTier::Zk, ProofTier::Optimistic, ProofTier::ZkTee]);
        assert_eq!(set.tiers(), vec![ProofTier::Optimistic, ProofTier::Zk, ProofTier::ZkTee]);

        assert_eq!(set.select(ProofTier::Optimistic).unwrap().tier(), ProofTier::Optimistic);
        assert_eq!(set.select(ProofTier::Tee).unwrap().tier(), ProofTier::Zk);
        assert_eq!(set.select(ProofTier::ZkTee).unwrap().tier(), ProofTier::ZkTee);
        assert!(set.for_tier(ProofTier::Tee).is_none());
    }

    #[test]
    fn no_submitter_found() {
        let set = set_of(&[ProofTier::Optimistic, ProofTier::Tee]);
        let err = set.select(ProofTier::Zk).unwrap_err();
        assert!(matches!(err, PipelineError::NoSubmitterFound(ProofTier::Zk)));
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn benign_reverts_are_swallowed() {
        let tx_manager = Arc::new(MockTxManager::new());
        let submitter = ProofSubmitter::new(
            Arc::new(DummyProducer::new(ProofTier::Tee)),
            inbox(),
            tx_manager.clone(),
        );
        let meta = batch_meta(1, 10);
        let proof = submitter.request_proof(&meta).await.unwrap();
        let result =
            ProofResult { meta, tier: ProofTier::Tee, transition: Transition::default(), proof };

        tx_manager.fail_next(TxManagerError::Failed(RevertKind::Benign("BatchVerified".to_owned())));
        let outcome = submitter.submit_proof(&result).await.unwrap();
        assert!(matches!(outcome, SubmissionOutcome::AlreadyOnChain(_)));

        tx_manager.fail_next(TxManagerError::Failed(RevertKind::Fatal("InvalidParams".to_owned())));
        let err = submitter.submit_proof(&result).await.unwrap_err();
        assert!(!err.is_transient());

        tx_manager.fail_next(TxManagerError::Failed(RevertKind::Transient("timeout".to_owned())));
        assert!(submitter.submit_proof(&result).await.unwrap_err().is_transient());

        let outcome = submitter.submit_proof(&result).await.unwrap();
        assert!(matches!(outcome, SubmissionOutcome::Landed(_)));
        assert_eq!(tx_manager.sent_count(), 4);
        assert!(tx_manager.sent().iter().all(|c| c.to == *inbox().address()));
    }
}
