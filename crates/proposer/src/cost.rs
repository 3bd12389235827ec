use std::{fmt, sync::Arc, time::Duration};

use alloy::eips::eip4844::DATA_GAS_PER_BLOB;
use async_trait::async_trait;
use surge_clients::execution::ExecutionClient;
use surge_config::CostMethod;
use surge_primitives::{batch::TxCandidate, compression::encode_tx_lists, pool::TxList};
use tracing::debug;

use crate::{BuilderError, ProposerError, RuntimeConfig, error::with_timeout};

/// Static gas of a `KECCAK256` call.
const KECCAK_STATIC_GAS: u64 = 30;

/// Gas per 32 byte word hashed by `KECCAK256`.
const KECCAK_WORD_GAS: u64 = 6;

/// Calldata gas of a zero byte.
const CALLDATA_ZERO_BYTE_GAS: u64 = 4;

/// Calldata gas of a non-zero byte.
const CALLDATA_NON_ZERO_BYTE_GAS: u64 = 16;

/// Fixed L1 gas amounts and off-chain costs of proposing and proving one batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CostParams {
    /// L1 gas used by a proposal carrying its payload in calldata.
    pub batch_posting_gas_with_calldata: u64,
    /// L1 gas used by a proposal carrying its payload in blobs, excluding blob gas.
    pub batch_posting_gas_with_blobs: u64,
    /// L1 gas used to post the proof of the batch.
    pub proof_posting_gas: u64,
    /// Off-chain cost of proving one batch, in wei.
    pub proving_cost_per_batch: u128,
}

impl CostParams {
    /// Returns the total cost of proposing and proving a batch carried by `blobs` blobs, or by
    /// calldata if `blobs` is zero.
    pub fn estimate(&self, fees: &TxCostCalculator, blobs: usize) -> u128 {
        let posting = if blobs > 0 {
            u128::from(self.batch_posting_gas_with_blobs)
                .saturating_mul(fees.gas_price)
                .saturating_add(fees.blob_cost(blobs))
        } else {
            self.calldata_posting_cost(fees)
        };

        posting.saturating_add(self.proving_cost(fees))
    }

    /// Like [`Self::estimate`], but a blob proposal is priced from its `payload`: the gas of
    /// the calldata proposal, minus the calldata and hashing gas of the payload.
    pub fn local_estimate(&self, fees: &TxCostCalculator, blobs: usize, payload: &[u8]) -> u128 {
        let posting = if blobs > 0 {
            fees.local_cost(blobs, &[payload], self.batch_posting_gas_with_calldata)
        } else {
            self.calldata_posting_cost(fees)
        };

        posting.saturating_add(self.proving_cost(fees))
    }

    fn calldata_posting_cost(&self, fees: &TxCostCalculator) -> u128 {
        u128::from(self.batch_posting_gas_with_calldata).saturating_mul(fees.gas_price)
    }

    /// Off-chain proving cost plus the L1 cost of posting the proof.
    fn proving_cost(&self, fees: &TxCostCalculator) -> u128 {
        self.proving_cost_per_batch
            .saturating_add(u128::from(self.proof_posting_gas).saturating_mul(fees.gas_price))
    }
}

/// Estimates the L1 cost of a proposal candidate, in wei.
#[async_trait]
pub trait CostEstimator: Send + Sync + fmt::Debug {
    /// Returns the cost of posting the candidate and proving the batch it carries.
    /// `tx_lists` are the lists the candidate was built from.
    async fn estimate_l1_cost(
        &self,
        candidate: &TxCandidate,
        tx_lists: &[TxList],
    ) -> Result<u128, ProposerError>;
}

/// Creates the estimator of the configured cost method.
pub fn from_config(cfg: &RuntimeConfig, l1: ExecutionClient) -> Arc<dyn CostEstimator> {
    let (params, timeout) = (cfg.cost_params(), cfg.rpc_timeout());
    match cfg.proposer.cost_method {
        CostMethod::FeeHistory => Arc::new(RpcCostEstimator::new(l1, params, timeout)),
        CostMethod::Local => Arc::new(LocalCostEstimator::new(l1, params, timeout)),
    }
}

/// Reads the current L1 base fee, and the blob base fee if the proposal carries blobs.
async fn current_fees(
    l1: &ExecutionClient,
    timeout: Duration,
    blobs: usize,
) -> Result<TxCostCalculator, ProposerError> {
    let base_fee = with_timeout(timeout, l1.l1_base_fee()).await?;
    let blob_base_fee =
        if blobs > 0 { with_timeout(timeout, l1.blob_base_fee()).await? } else { 0 };

    Ok(TxCostCalculator::new(base_fee, blob_base_fee))
}

/// A [`CostEstimator`] reading the current L1 fees from `eth_feeHistory` and
/// `eth_blobBaseFee`.
#[derive(Debug, Clone)]
pub struct RpcCostEstimator {
    l1: ExecutionClient,
    params: CostParams,
    timeout: Duration,
}

impl RpcCostEstimator {
    /// Creates a new estimator. Every call is bounded by `timeout`.
    pub const fn new(l1: ExecutionClient, params: CostParams, timeout: Duration) -> Self {
        Self { l1, params, timeout }
    }
}

#[async_trait]
impl CostEstimator for RpcCostEstimator {
    async fn estimate_l1_cost(
        &self,
        candidate: &TxCandidate,
        _tx_lists: &[TxList],
    ) -> Result<u128, ProposerError> {
        let blobs = candidate.blob_count();
        let fees = current_fees(&self.l1, self.timeout, blobs).await?;
        let cost = self.params.estimate(&fees, blobs);
        debug!(base_fee = fees.gas_price, blob_base_fee = fees.blob_base_fee, blobs, cost, "Estimated L1 cost");

        Ok(cost)
    }
}

/// A [`CostEstimator`] pricing blob proposals from the size and content of their payload.
#[derive(Debug, Clone)]
pub struct LocalCostEstimator {
    l1: ExecutionClient,
    params: CostParams,
    timeout: Duration,
}

impl LocalCostEstimator {
    /// Creates a new estimator. Every call is bounded by `timeout`.
    pub const fn new(l1: ExecutionClient, params: CostParams, timeout: Duration) -> Self {
        Self { l1, params, timeout }
    }
}

#[async_trait]
impl CostEstimator for LocalCostEstimator {
    async fn estimate_l1_cost(
        &self,
        candidate: &TxCandidate,
        tx_lists: &[TxList],
    ) -> Result<u128, ProposerError> {
        let blobs = candidate.blob_count();
        let payload = encode_tx_lists(tx_lists).map_err(BuilderError::from)?;
        let fees = current_fees(&self.l1, self.timeout, blobs).await?;
        let cost = self.params.local_estimate(&fees, blobs, &payload);
        debug!(
            base_fee = fees.gas_price,
            blob_base_fee = fees.blob_base_fee,
            blobs,
            payload_size = payload.len(),
            cost,
            "Estimated L1 cost locally"
        );

        Ok(cost)
    }
}

/// Local L1 cost arithmetic, at a fixed gas price and blob base fee.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxCostCalculator {
    gas_price: u128,
    blob_base_fee: u128,
}

impl TxCostCalculator {
    /// Creates a calculator pricing execution gas at `gas_price` and blob gas at
    /// `blob_base_fee`.
    pub const fn new(gas_price: u128, blob_base_fee: u128) -> Self {
        Self { gas_price, blob_base_fee }
    }

    /// Gas of hashing the concatenated transaction lists with `KECCAK256`.
    pub fn keccak_gas<T: AsRef<[u8]>>(tx_lists: &[T]) -> u64 {
        let size: u64 = tx_lists.iter().map(|l| l.as_ref().len() as u64).sum();
        KECCAK_STATIC_GAS + KECCAK_WORD_GAS * size.div_ceil(32)
    }

    /// Calldata gas of the transaction lists.
    pub fn calldata_gas<T: AsRef<[u8]>>(tx_lists: &[T]) -> u64 {
        tx_lists
            .iter()
            .flat_map(|l| l.as_ref().iter())
            .map(|b| if *b == 0 { CALLDATA_ZERO_BYTE_GAS } else { CALLDATA_NON_ZERO_BYTE_GAS })
            .sum()
    }

    /// Cost of the blob gas consumed by `blobs` blobs.
    pub const fn blob_cost(&self, blobs: usize) -> u128 {
        (DATA_GAS_PER_BLOB as u128).saturating_mul(blobs as u128).saturating_mul(self.blob_base_fee)
    }

    /// Cost of a blob proposal, given the gas used by the same proposal sent with its
    /// transaction lists in calldata.
    ///
    /// The calldata and hashing gas of the lists is subtracted, since blobs carry them instead.
    pub fn local_cost<T: AsRef<[u8]>>(
        &self,
        blobs: usize,
        tx_lists: &[T],
        calldata_gas_usage: u64,
    ) -> u128 {
        let overhead = calldata_gas_usage
            .saturating_sub(Self::calldata_gas(tx_lists))
            .saturating_sub(Self::keccak_gas(tx_lists));

        self.blob_cost(blobs).saturating_add(u128::from(overhead).saturating_mul(self.gas_price))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GWEI: u128 = 1_000_000_000;

    #[test]
    fn keccak_and_calldata_gas() {
        let lists = [b"test data 1".as_slice(), b"test data 2".as_slice()];
        assert_eq!(TxCostCalculator::keccak_gas(&lists), 36);
        assert_eq!(TxCostCalculator::calldata_gas(&lists), 22 * 16);

        assert_eq!(TxCostCalculator::keccak_gas(&[[0u8; 33]]), 30 + 12);
        assert_eq!(TxCostCalculator::calldata_gas(&[[0u8, 1, 0]]), 4 + 16 + 4);
        assert_eq!(TxCostCalculator::keccak_gas::<&[u8]>(&[]), 30);
    }

    #[test]
    fn local_cost_replaces_calldata_with_blobs() {
        let calc = TxCostCalculator::new(100, 1_000);
        let lists = [b"test data 1".as_slice(), b"test data 2".as_slice()];

        // blobs: 2 * 131072 * 1000, overhead: (1000 - 352 - 36) * 100
        assert_eq!(calc.local_cost(2, &lists, 1_000), 262_144_000 + 61_200);

        // Gas usage below the payload gas never underflows.
        assert_eq!(calc.local_cost(0, &lists, 10), 0);
    }

    #[test]
    fn blob_and_calldata_estimates() {
        let params = CostParams {
            batch_posting_gas_with_calldata: 1_000_000,
            batch_posting_gas_with_blobs: 200_000,
            proof_posting_gas: 400_000,
            proving_cost_per_batch: 5 * GWEI,
        };
        let fees = TxCostCalculator::new(GWEI, 2);

        let calldata = params.estimate(&fees, 0);
        assert_eq!(calldata, 1_000_000 * GWEI + 5 * GWEI + 400_000 * GWEI);

        let blobs = params.estimate(&fees, 3);
        assert_eq!(blobs, 200_000 * GWEI + 3 * 131_072 * 2 + 5 * GWEI + 400_000 * GWEI);
    }

    #[test]
    fn local_estimate_prices_blobs_from_the_payload() {
        let params = CostParams {
            batch_posting_gas_with_calldata: 1_000,
            batch_posting_gas_with_blobs: 999_999,
            proof_posting_gas: 10,
            proving_cost_per_batch: 7,
        };
        let fees = TxCostCalculator::new(100, 1_000);
        let payload = b"test data 1test data 2";

        // blobs: 2 * 131072 * 1000, overhead: (1000 - 352 - 36) * 100, proof: 7 + 10 * 100
        assert_eq!(params.local_estimate(&fees, 2, payload), 262_144_000 + 61_200 + 1_007);

        // Calldata proposals are priced the same by both methods.
        assert_eq!(params.local_estimate(&fees, 0, payload), params.estimate(&fees, 0));

        // A larger payload leaves less gas to the proposal itself.
        let larger = [0xffu8; 44];
        assert!(params.local_estimate(&fees, 2, &larger) < params.local_estimate(&fees, 2, payload));
    }

    #[test]
    fn empty_batch_pays_fixed_cost() {
        let params = CostParams { proving_cost_per_batch: 7, ..Default::default() };
        assert_eq!(params.estimate(&TxCostCalculator::new(GWEI, GWEI), 0), 7);
    }
}
