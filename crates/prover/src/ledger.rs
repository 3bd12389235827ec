use std::{
    collections::HashMap,
    fmt,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use surge_primitives::{batch::BatchId, tier::ProofTier};

/// The proof lifecycle of a batch at a given tier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ProofStatus {
    /// Nothing happened yet.
    #[default]
    Idle,
    /// A proof was requested from the producer.
    Requested,
    /// The producer is generating the proof.
    Generating,
    /// The proof is ready to be submitted.
    Generated,
    /// The proof transaction is in flight.
    Submitting,
    /// The proof landed on chain, or an equivalent one already did.
    Submitted,
    /// The transition of this tier was contested on chain.
    Contested,
    /// The work was given up. The catch-up timer may pick the batch up again.
    Abandoned,
}

impl ProofStatus {
    /// Returns true while a request is outstanding or the proof already landed.
    pub const fn is_active(&self) -> bool {
        matches!(
            self,
            Self::Requested | Self::Generating | Self::Generated | Self::Submitting | Self::Submitted
        )
    }

    const fn can_start_submission(&self) -> bool {
        !matches!(self, Self::Submitting | Self::Submitted)
    }
}

impl fmt::Display for ProofStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Shared record of the [`ProofStatus`] of every `(batch, tier)` pair.
///
/// Serializes the work on a given pair: there is at most one outstanding request, and at most
/// one submission in flight.
#[derive(Debug, Clone, Default)]
pub struct ProofLedger {
    inner: Arc<Mutex<HashMap<(BatchId, ProofTier), ProofStatus>>>,
}

impl ProofLedger {
    /// Creates an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the status of the pair.
    pub fn status(&self, batch_id: BatchId, tier: ProofTier) -> ProofStatus {
        self.lock().get(&(batch_id, tier)).copied().unwrap_or_default()
    }

    /// Unconditionally sets the status of the pair.
    pub fn set(&self, batch_id: BatchId, tier: ProofTier, status: ProofStatus) {
        self.lock().insert((batch_id, tier), status);
    }

    /// Marks the pair as requested, unless a request is already outstanding or the proof
    /// already landed. Returns true if the caller owns the new request.
    pub fn try_request(&self, batch_id: BatchId, tier: ProofTier) -> bool {
        self.try_transition(batch_id, tier, |s| !s.is_active(), ProofStatus::Requested)
    }

    /// Marks the pair as submitting, unless a submission is in flight or already landed.
    /// Returns true if the caller owns the submission.
    pub fn try_begin_submission(&self, batch_id: BatchId, tier: ProofTier) -> bool {
        self.try_transition(
            batch_id,
            tier,
            ProofStatus::can_start_submission,
            ProofStatus::Submitting,
        )
    }

    /// Forgets every batch up to `batch_id` (included).
    pub fn prune(&self, batch_id: BatchId) {
        self.lock().retain(|(id, _), _| *id > batch_id);
    }

    /// Forgets the batches in `start..=end`, so that new proposals with the same IDs start over.
    pub fn forget_range(&self, start: BatchId, end: BatchId) {
        self.lock().retain(|(id, _), _| !(start..=end).contains(id));
    }

    /// Returns the number of pairs in the given status.
    pub fn count(&self, status: ProofStatus) -> usize {
        self.lock().values().filter(|s| **s == status).count()
    }

    fn try_transition(
        &self,
        batch_id: BatchId,
        tier: ProofTier,
        allowed: impl Fn(&ProofStatus) -> bool,
        to: ProofStatus,
    ) -> bool {
        let mut ledger = self.lock();
        let status = ledger.entry((batch_id, tier)).or_default();
        if !allowed(status) {
            return false
        }
        *status = to;
        true
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<(BatchId, ProofTier), ProofStatus>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
