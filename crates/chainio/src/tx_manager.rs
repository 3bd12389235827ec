use std::{fmt, time::Duration};

use alloy::{
    consensus::{Transaction as _, TxEnvelope, constants::ETH_TO_WEI},
    eips::{eip2718::Encodable2718, eip4844::DATA_GAS_PER_BLOB},
    network::{TransactionBuilder, TransactionBuilder4844},
    providers::Provider,
    rpc::{
        client::ClientBuilder,
        types::{TransactionReceipt, TransactionRequest},
    },
    signers::local::PrivateKeySigner,
    transports::{RpcError, TransportError},
};
use alloy_primitives::{Address, B256};
use async_trait::async_trait;
use surge_primitives::{
    batch::TxCandidate, blob::BlobTxFeesHints, retries::DEFAULT_RETRY_LAYER, summary::Summary,
};
use tracing::{Level, debug, info, span_enabled, warn};
use url::Url;

use crate::{
    WalletProviderWithSimpleNonceManager, new_wallet_provider_with_simple_nonce_management,
    revert::{Rejection, RevertKind},
};

/// The error message that indicates the blob gas is too low.
pub const BLOB_GAS_TOO_LOW_ERROR: &str = "max fee per blob gas less than block blob gas fee";

/// The error message that indicates the max fee per gas is lower than the block base fee.
pub const MAX_FEE_PER_GAS_TOO_LOW_ERROR: &str = "max fee per gas less than block base fee";

/// The error message that indicates a transaction was sent with a stale nonce.
pub const NONCE_TOO_LOW_ERROR: &str = "nonce too low";

/// Sends L1 transactions on behalf of the node.
///
/// Implementations own nonce and fee management. Callers only hand over a fresh
/// [`TxCandidate`] and get back the mined receipt.
#[async_trait]
pub trait TransactionManager: Send + Sync + fmt::Debug {
    /// Sends the candidate and waits until it is mined.
    ///
    /// A mined but reverted transaction is reported as an error.
    async fn send(&self, candidate: TxCandidate) -> Result<TransactionReceipt, TxManagerError>;

    /// Returns the account sending transactions.
    fn sender(&self) -> Address;
}

/// Errors returned by a [`TransactionManager`].
#[derive(Debug, thiserror::Error)]
pub enum TxManagerError {
    /// The node rejected the transaction, or it could not be reached.
    #[error("transaction failed: {0}")]
    Failed(RevertKind),
    /// The transaction was mined but reverted.
    #[error("transaction {0} reverted in block {1:?}")]
    Reverted(B256, Option<u64>),
    /// The worst-case fee of the transaction is above the configured cap.
    #[error("transaction fees too high: got {0}, max {1}")]
    FeesTooHigh(u128, u128),
    /// The filled transaction request could not be turned into a signed envelope.
    #[error("failed to sign transaction: {0}")]
    Signing(String),
    /// No receipt was observed after every attempt.
    #[error("transaction not mined after {0} attempts")]
    NotMined(usize),
}

impl TxManagerError {
    /// Classifies the error.
    pub fn kind(&self) -> RevertKind {
        match self {
            Self::Failed(kind) => kind.clone(),
            Self::Reverted(hash, _) => RevertKind::Fatal(format!("reverted: {hash}")),
            Self::Signing(err) => RevertKind::Fatal(err.clone()),
            Self::FeesTooHigh(..) | Self::NotMined(_) => RevertKind::Transient(self.to_string()),
        }
    }

    /// Returns true if the error is a stale nonce rejection.
    pub fn is_nonce_too_low(&self) -> bool {
        matches!(self, Self::Failed(kind) if kind.rejection() == Some(Rejection::NonceTooLow))
    }
}

impl From<TransportError> for TxManagerError {
    fn from(err: TransportError) -> Self {
        Self::Failed(RevertKind::from_transport_error(err))
    }
}

/// Configuration of the [`AlloyTxManager`].
#[derive(Debug, Clone, Copy)]
pub struct TxManagerConfig {
    /// Maximum number of send attempts, each with bumped fees.
    pub max_attempts: usize,
    /// How long to wait for a receipt before bumping fees.
    pub receipt_timeout: Duration,
    /// Minimum priority fee, in wei.
    pub min_priority_fee: u128,
    /// Upper bound on the worst-case fee of a single transaction, in wei.
    pub max_fees: u128,
    /// Percentage added on top of the estimated gas limit.
    pub gas_limit_buffer_pct: u64,
}

impl Default for TxManagerConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            receipt_timeout: Duration::from_secs(36),
            min_priority_fee: 0,
            max_fees: ETH_TO_WEI / 8, // 0.125 ETH
            gas_limit_buffer_pct: 20,
        }
    }
}

/// A [`TransactionManager`] backed by an alloy wallet provider with a simple nonce manager.
#[derive(Debug, Clone)]
pub struct AlloyTxManager {
    provider: WalletProviderWithSimpleNonceManager,
    sender: Address,
    cfg: TxManagerConfig,
}

impl AlloyTxManager {
    /// Creates a new transaction manager sending through the given L1 RPC with the wallet.
    pub fn new<U: Into<Url>>(el_client_url: U, wallet: PrivateKeySigner, cfg: TxManagerConfig) -> Self {
        let client = ClientBuilder::default().layer(DEFAULT_RETRY_LAYER).http(el_client_url.into());
        let sender = wallet.address();
        let provider = new_wallet_provider_with_simple_nonce_management(client, wallet);

        Self { provider, sender, cfg }
    }

    /// Returns the underlying provider.
    pub const fn provider(&self) -> &WalletProviderWithSimpleNonceManager {
        &self.provider
    }

    async fn fees_hints(&self) -> Result<BlobTxFeesHints, TxManagerError> {
        let (blob_fee_per_gas, eip1559) = tokio::try_join!(
            self.provider.get_blob_base_fee(),
            self.provider.estimate_eip1559_fees()
        )?;

        Ok(BlobTxFeesHints::from_estimation(eip1559, blob_fee_per_gas)
            .with_next_block_increase()
            .with_min_priority_fee(self.cfg.min_priority_fee))
    }

    async fn gas_limit(&self, tx_req: &TransactionRequest) -> Result<u64, TxManagerError> {
        let estimate = self.provider.estimate_gas(tx_req.clone()).await?;
        Ok(estimate.saturating_mul(100 + self.cfg.gas_limit_buffer_pct) / 100)
    }

    /// Fills, signs and broadcasts a single attempt. Returns the signed envelope.
    async fn send_attempt(
        &self,
        mut tx_req: TransactionRequest,
        fees: &BlobTxFeesHints,
        nonce: Option<u64>,
    ) -> Result<TxEnvelope, TxManagerError> {
        if let Some(nonce) = nonce {
            tx_req.set_nonce(nonce);
        }
        tx_req.set_max_priority_fee_per_gas(fees.max_priority_fee_per_gas());
        tx_req.set_max_fee_per_gas(fees.max_fee_per_gas());
        if tx_req.sidecar.is_some() {
            tx_req.set_max_fee_per_blob_gas(fees.blob_fee_per_gas());
        }

        let envelope = self
            .provider
            .fill(tx_req)
            .await?
            .try_into_envelope()
            .map_err(|e| TxManagerError::Signing(e.to_string()))?;

        let total_fees = max_tx_fee(&envelope);
        if total_fees > self.cfg.max_fees {
            return Err(TxManagerError::FeesTooHigh(total_fees, self.cfg.max_fees))
        }

        if span_enabled!(Level::DEBUG) {
            debug!(tx = %envelope.summary(), "⚒️ Transaction prepared");
        } else {
            info!(hash = %envelope.tx_hash(), %fees, nonce = envelope.nonce(), "🛠️ Transaction prepared");
        }

        let _ = self.provider.send_raw_transaction(&envelope.encoded_2718()).await?;
        Ok(envelope)
    }
}

#[async_trait]
impl TransactionManager for AlloyTxManager {
    async fn send(&self, candidate: TxCandidate) -> Result<TransactionReceipt, TxManagerError> {
        debug!(candidate = %candidate.summary(), "Sending transaction candidate");

        let mut tx_req = TransactionRequest::default()
            .with_from(self.sender)
            .with_to(candidate.to)
            .with_input(candidate.data)
            .with_value(candidate.value);
        if let Some(sidecar) = candidate.sidecar {
            tx_req.set_blob_sidecar(sidecar);
        }

        let gas_limit = match candidate.gas_limit {
            Some(gas_limit) => gas_limit,
            None => self.gas_limit(&tx_req).await?,
        };
        tx_req.set_gas_limit(gas_limit);

        let mut fees = self.fees_hints().await?;
        let mut nonce = None;
        let mut sent = Vec::new();

        for attempt in 1..=self.cfg.max_attempts {
            let envelope = match self.send_attempt(tx_req.clone(), &fees, nonce).await {
                Ok(envelope) => envelope,
                Err(TxManagerError::Failed(kind)) => match kind.rejection() {
                    Some(Rejection::BlobFeeCapTooLow) => {
                        fees.next_block_increase();
                        warn!(attempt, %fees, "Blob gas too low, retrying with higher fees");
                        continue
                    }
                    Some(Rejection::FeeCapTooLow(base_fee)) => {
                        match base_fee {
                            Some(base_fee) if fees.bump_base_fee(base_fee) => {}
                            _ => fees = self.fees_hints().await?,
                        }
                        warn!(attempt, %fees, "Max fee per gas below base fee, retrying");
                        continue
                    }
                    _ => return Err(TxManagerError::Failed(kind)),
                },
                Err(e) => return Err(e),
            };

            let hash = *envelope.tx_hash();
            nonce.get_or_insert(envelope.nonce());
            sent.push(hash);

            match self.wait_for_receipt(&sent).await? {
                Some(receipt) if receipt.status() => {
                    info!(hash = %receipt.transaction_hash, block = ?receipt.block_number, attempt, "✅ Transaction mined");
                    return Ok(receipt)
                }
                Some(receipt) => {
                    return Err(TxManagerError::Reverted(
                        receipt.transaction_hash,
                        receipt.block_number,
                    ))
                }
                None => {
                    warn!(%hash, attempt, "Transaction not mined in time, bumping fees");
                    fees.double();
                }
            }
        }

        Err(TxManagerError::NotMined(self.cfg.max_attempts))
    }

    fn sender(&self) -> Address {
        self.sender
    }
}

impl AlloyTxManager {
    /// Polls for a receipt of any of the sent hashes until the receipt timeout elapses.
    ///
    /// Earlier attempts share the same nonce, so any of them may be the one that lands.
    async fn wait_for_receipt(
        &self,
        hashes: &[B256],
    ) -> Result<Option<TransactionReceipt>, TxManagerError> {
        const POLL_INTERVAL: Duration = Duration::from_secs(3);

        let deadline = tokio::time::Instant::now() + self.cfg.receipt_timeout;
        loop {
            for hash in hashes.iter().rev() {
                match self.provider.get_transaction_receipt(*hash).await {
                    Ok(Some(receipt)) => return Ok(Some(receipt)),
                    Ok(None) => {}
                    Err(RpcError::NullResp) => {}
                    Err(e) => return Err(e.into()),
                }
            }

            if tokio::time::Instant::now() >= deadline {
                return Ok(None)
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }
}

/// Returns the worst-case fee of the given transaction, including blob gas.
///
/// Ref: <https://x.com/etherscan/status/1775507063675965589>
fn max_tx_fee(tx: &TxEnvelope) -> u128 {
    let execution_fees = tx.max_fee_per_gas().saturating_mul(u128::from(tx.gas_limit()));

    let blobs = tx.blob_versioned_hashes().map_or(0, |h| h.len()) as u128;
    let blob_fees = tx
        .max_fee_per_blob_gas()
        .unwrap_or_default()
        .saturating_mul(blobs.saturating_mul(u128::from(DATA_GAS_PER_BLOB)));

    execution_fees.saturating_add(blob_fees)
}

/// Extracts the base fee from an error message like [`MAX_FEE_PER_GAS_TOO_LOW_ERROR`].
///
/// Example full err: "failed with 35894639 gas: max fee per gas less than block base fee: address
/// 0xA5a9D8524077714378E12aF057B40d42AAd79F3C, maxFeePerGas: 1009953, baseFee: 64546698"
///
/// Returns `None` if the base fee is missing or not a number.
pub fn extract_base_fee_from_err(err: &str) -> Option<u128> {
    let err = err.trim().to_lowercase();
    let prefix = "basefee: ";

    let start_idx = err.find(prefix)? + prefix.len();
    let end_idx = err
        .get(start_idx..)?
        .find(|c: char| !c.is_ascii_digit())
        .map_or(err.len(), |end| start_idx + end);

    err.get(start_idx..end_idx)?.parse::<u128>().ok()
}

#[cfg(test)]
mod tests {
    use alloy::{rpc::json_rpc::ErrorPayload, transports::TransportErrorKind};

    use super::*;

    #[test]
    fn extract_base_fee_from_err_works() {
        let test_str = "failed with 35894639 gas: max fee per gas less than block base fee: address 0xA5a9D8524077714378E12aF057B40d42AAd79F3C, maxFeePerGas: 1009953, baseFee: 64546698";
        assert_eq!(extract_base_fee_from_err(test_str), Some(64546698));
    }

    #[test]
    fn extract_base_fee_from_err_fails() {
        let test_str = "failed with 35894639 gas: max fee per gas less than block base fee: address 0xA5a9D8524077714378E12aF057B40d42AAd79F3C, maxFeePerGas: 1009953";
        assert_eq!(extract_base_fee_from_err(test_str), None);
    }

    #[test]
    fn extract_base_fee_from_err_nil_base_fee_fails() {
        let test_str = "failed with 35894639 gas: max fee per gas less than block base fee: address 0xA5a9D8524077714378E12aF057B40d42AAd79F3C, maxFeePerGas: 1009953, baseFee: nil";
        assert_eq!(extract_base_fee_from_err(test_str), None);
    }

    #[test]
    fn nonce_too_low_is_detected() {
        let payload = ErrorPayload {
            code: -32000,
            message: "nonce too low: next nonce 10, tx nonce 9".into(),
            data: None,
        };
        let err = TxManagerError::from(RpcError::ErrorResp(payload));
        assert!(err.is_nonce_too_low());
        assert!(err.kind().is_transient());

        let err = TxManagerError::from(RpcError::Transport(TransportErrorKind::BackendGone));
        assert!(!err.is_nonce_too_low());
    }

    #[test]
    fn mined_revert_is_fatal() {
        let err = TxManagerError::Reverted(B256::ZERO, Some(1));
        assert!(!err.kind().is_transient());
        assert!(!err.kind().is_benign());
    }
}
