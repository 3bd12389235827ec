use std::time::Duration;

use metrics::{counter, gauge, histogram};
use surge_primitives::tier::ProofTier;

#[derive(Debug, Clone, Copy)]
pub(crate) struct ProverMetrics;

impl ProverMetrics {
    // ============= CURSOR ================ //

    /// Sets the L1 height up to which protocol events have been handled.
    pub(crate) fn set_l1_current(value: u64) {
        counter!("prover_l1_current").absolute(value);
    }

    /// Sets the last handled batch ID.
    pub(crate) fn set_last_handled_batch_id(id: u64) {
        counter!("prover_last_handled_batch_id").absolute(id);
    }

    /// Sets the last verified batch ID, as observed in `BatchesVerified` events.
    pub(crate) fn set_last_verified_batch_id(id: u64) {
        counter!("prover_last_verified_batch_id").absolute(id);
    }

    /// Sets the number of background tasks still running.
    pub(crate) fn set_in_flight_tasks(count: usize) {
        gauge!("prover_in_flight_tasks").set(count as f64);
    }

    // ============= PROOFS ================ //

    pub(crate) fn increment_proofs_requested(tier: ProofTier) {
        counter!("prover_proofs_requested", "tier" => tier.to_string()).increment(1);
    }

    pub(crate) fn increment_proofs_generated(tier: ProofTier) {
        counter!("prover_proofs_generated", "tier" => tier.to_string()).increment(1);
    }

    pub(crate) fn increment_proofs_submitted(tier: ProofTier) {
        counter!("prover_proofs_submitted", "tier" => tier.to_string()).increment(1);
    }

    /// Increments the amount of submissions that turned out to be already on chain.
    pub(crate) fn increment_benign_reverts(tier: ProofTier) {
        counter!("prover_benign_reverts", "tier" => tier.to_string()).increment(1);
    }

    /// Increments the amount of abandoned work, labeled with the error classification.
    pub(crate) fn increment_failures(tier: ProofTier, label: &'static str) {
        counter!("prover_failures", "tier" => tier.to_string(), "error" => label).increment(1);
    }

    pub(crate) fn increment_no_submitter_found(tier: ProofTier) {
        counter!("prover_no_submitter_found", "tier" => tier.to_string()).increment(1);
    }

    /// Records the time it took to generate a proof.
    pub(crate) fn record_proof_generation_time(tier: ProofTier, elapsed: Duration) {
        histogram!("prover_proof_generation_time_secs", "tier" => tier.to_string())
            .record(elapsed.as_secs_f64());
    }

    // ============= EVENTS ================ //

    pub(crate) fn increment_events_handled(kind: &'static str) {
        counter!("prover_events_handled", "kind" => kind).increment(1);
    }

    pub(crate) fn increment_contests_sent() {
        counter!("prover_contests_sent").increment(1);
    }

    pub(crate) fn increment_rollbacks(start: u64, end: u64) {
        counter!("prover_rollbacks", "start" => start.to_string(), "end" => end.to_string())
            .increment(1);
    }
}
