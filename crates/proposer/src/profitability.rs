use alloy::consensus::{Transaction, TxEnvelope};
use surge_primitives::{
    batch::TxCandidate,
    pool::{TxList, count_txs},
};
use tracing::{debug, info};

use crate::{ProposerError, cost::CostEstimator};

/// Returns the tip per gas the transaction pays on top of `base_fee`.
///
/// Dynamic fee transactions pay `min(tip cap, fee cap - base fee)`, legacy ones pay
/// `gas price - base fee`. Never negative.
pub fn effective_tip(tx: &TxEnvelope, base_fee: u128) -> u128 {
    let headroom = tx.max_fee_per_gas().saturating_sub(base_fee);
    tx.max_priority_fee_per_gas().map_or(headroom, |tip_cap| tip_cap.min(headroom))
}

/// Returns the highest base fee the transaction is willing to pay: its fee cap, or its gas
/// price for legacy transactions.
pub fn willingness(tx: &TxEnvelope) -> u128 {
    tx.max_fee_per_gas()
}

/// The outcome of a profitability check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verdict {
    /// Whether the collected fees cover the estimated cost.
    pub profitable: bool,
    /// Whether the base fee was raised and the transaction lists filtered.
    pub base_fee_adjusted: bool,
    /// The estimated L1 cost, in wei.
    pub estimated_cost: u128,
    /// The L2 fees collected by the proposer, in wei.
    pub collected_fees: u128,
}

/// Computes the L2 fees a proposer collects for a batch, and searches for the base fee
/// threshold that maximizes them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeModel {
    /// The share of the L2 base fee paid to the proposer, in percent.
    sharing_pct: u8,
}

impl FeeModel {
    /// Creates a fee model with the given base fee share, in percent.
    pub const fn new(sharing_pct: u8) -> Self {
        Self { sharing_pct }
    }

    /// The part of the base fee paid to the proposer, per gas.
    const fn base_fee_share(&self, base_fee: u128) -> u128 {
        base_fee.saturating_mul(self.sharing_pct as u128) / 100
    }

    /// Returns the fees collected for the transaction lists at the given base fee.
    pub fn collected_fees(&self, tx_lists: &[TxList], base_fee: u128) -> u128 {
        let share = self.base_fee_share(base_fee);
        tx_lists
            .iter()
            .flatten()
            .map(|tx| {
                let gas = u128::from(tx.gas_limit());
                gas.saturating_mul(share).saturating_add(gas.saturating_mul(effective_tip(tx, base_fee)))
            })
            .fold(0u128, u128::saturating_add)
    }

    /// Finds the base fee threshold maximizing the collected fees, when every transaction not
    /// willing to pay the threshold is dropped.
    ///
    /// Candidate thresholds are the willingness of every transaction. Sorting them in
    /// decreasing order, each threshold keeps a prefix of the sorted transactions. Returns
    /// `None` if there are no transactions.
    pub fn optimal_threshold(&self, tx_lists: &[TxList]) -> Option<(u128, u128)> {
        let mut txs: Vec<&TxEnvelope> = tx_lists.iter().flatten().collect();
        txs.sort_by(|a, b| willingness(b).cmp(&willingness(a)));

        let mut best: Option<(u128, u128)> = None;
        let mut cum_gas = 0u128;

        for (i, tx) in txs.iter().enumerate() {
            let threshold = willingness(tx);
            cum_gas = cum_gas.saturating_add(u128::from(Transaction::gas_limit(*tx)));

            let tips = txs[..=i]
                .iter()
                .map(|tx| u128::from(Transaction::gas_limit(*tx)).saturating_mul(effective_tip(tx, threshold)))
                .fold(0u128, u128::saturating_add);
            let revenue = self.base_fee_share(threshold).saturating_mul(cum_gas).saturating_add(tips);

            if best.is_none_or(|(_, best_revenue)| revenue > best_revenue) {
                best = Some((threshold, revenue));
            }
        }

        best
    }

    /// Decides whether the batch pays for `estimated_cost`.
    ///
    /// If a higher base fee threshold collects strictly more fees, it is adopted: `base_fee` is
    /// replaced, transactions below it are dropped from `tx_lists`, and lists left empty are
    /// removed.
    pub fn evaluate(
        &self,
        estimated_cost: u128,
        tx_lists: &mut Vec<TxList>,
        base_fee: &mut u128,
    ) -> Verdict {
        let original = self.collected_fees(tx_lists, *base_fee);
        debug!(estimated_cost, collected_fees = original, base_fee = *base_fee, "Profitability check");

        let mut verdict = Verdict {
            profitable: original >= estimated_cost,
            base_fee_adjusted: false,
            estimated_cost,
            collected_fees: original,
        };

        let Some((threshold, optimal)) = self.optimal_threshold(tx_lists) else { return verdict };
        if optimal <= original {
            return verdict
        }

        let before = count_txs(tx_lists);
        filter_by_threshold(tx_lists, threshold);
        info!(
            original_base_fee = *base_fee,
            optimal_base_fee = threshold,
            original_fees = original,
            optimal_fees = optimal,
            txs_before = before,
            txs_after = count_txs(tx_lists),
            "💹 Found a better base fee threshold"
        );

        *base_fee = threshold;
        verdict.base_fee_adjusted = true;
        verdict.collected_fees = optimal;
        verdict.profitable = optimal >= estimated_cost;
        verdict
    }

    /// Estimates the cost of the candidate, then evaluates the batch against it.
    pub async fn check(
        &self,
        estimator: &dyn CostEstimator,
        candidate: &TxCandidate,
        tx_lists: &mut Vec<TxList>,
        base_fee: &mut u128,
    ) -> Result<Verdict, ProposerError> {
        let cost = estimator.estimate_l1_cost(candidate, tx_lists).await?;
        Ok(self.evaluate(cost, tx_lists, base_fee))
    }
}

/// Drops every transaction not willing to pay `threshold`, and the lists left empty.
fn filter_by_threshold(tx_lists: &mut Vec<TxList>, threshold: u128) {
    for list in tx_lists.iter_mut() {
        list.retain(|tx| willingness(tx) >= threshold);
    }
    tx_lists.retain(|list| !list.is_empty());
}
