use std::time::Duration;

use metrics::{counter, gauge, histogram};

#[derive(Debug, Clone, Copy)]
pub(crate) struct ProposerMetrics;

impl ProposerMetrics {
    // ============= POOL ================ //

    /// Records the time it took to fetch the L2 mempool content.
    pub(crate) fn record_pool_content_fetch_time(elapsed: Duration) {
        histogram!("proposer_pool_content_fetch_time_secs").record(elapsed.as_secs_f64());
    }

    pub(crate) fn set_l2_base_fee(base_fee: u128) {
        gauge!("proposer_l2_base_fee_wei").set(base_fee as f64);
    }

    // ============= PROFITABILITY ================ //

    /// Sets the estimated L1 cost and the collected L2 fees of the last evaluated batch.
    pub(crate) fn set_profitability(estimated_cost: u128, collected_fees: u128) {
        gauge!("proposer_estimated_cost_wei").set(estimated_cost as f64);
        gauge!("proposer_collected_fees_wei").set(collected_fees as f64);
    }

    pub(crate) fn increment_unprofitable_batches() {
        counter!("proposer_unprofitable_batches").increment(1);
    }

    pub(crate) fn increment_base_fee_adjustments() {
        counter!("proposer_base_fee_adjustments").increment(1);
    }

    // ============= PROPOSALS ================ //

    /// Sets the compressed size of the last proposed payload.
    pub(crate) fn set_payload_size(backend: &'static str, size: usize) {
        gauge!("proposer_payload_size_bytes", "backend" => backend).set(size as f64);
    }

    pub(crate) fn increment_proposed_tx_lists(count: usize) {
        counter!("proposer_proposed_tx_lists").increment(count as u64);
    }

    pub(crate) fn increment_proposed_txs(count: usize) {
        counter!("proposer_proposed_txs").increment(count as u64);
    }

    pub(crate) fn increment_proposals_landed() {
        counter!("proposer_proposals_landed").increment(1);
    }

    /// Increments the amount of proposals forced by L1 bridge activity.
    pub(crate) fn increment_forced_proposals() {
        counter!("proposer_forced_proposals").increment(1);
    }

    /// Increments the amount of abandoned proposing ticks, labeled with the error classification.
    pub(crate) fn increment_failures(label: &'static str) {
        counter!("proposer_failures", "error" => label).increment(1);
    }

    pub(crate) fn increment_epochs() {
        counter!("proposer_epochs").increment(1);
    }
}
