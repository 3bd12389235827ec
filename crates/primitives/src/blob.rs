use std::fmt;

use alloy::{
    consensus::{BlobTransactionSidecar, SidecarBuilder, SimpleCoder},
    eips::eip4844::FIELD_ELEMENTS_PER_BLOB,
    providers::utils::Eip1559Estimation,
};

/// The maximum number of blobs that a single proposal transaction can carry.
pub const MAX_BLOBS_PER_BLOCK: usize = 6;

/// The number of usable bytes in a single field element with [`SimpleCoder`].
const USABLE_BYTES_PER_FIELD_ELEMENT: usize = 31;

/// The maximum amount of data that fits in a single blob, accounting for the length prefix
/// written by [`SimpleCoder`].
pub const MAX_BLOB_DATA_SIZE: usize =
    (FIELD_ELEMENTS_PER_BLOB as usize - 1) * USABLE_BYTES_PER_FIELD_ELEMENT;

/// Returns the maximum amount of data that fits in the given number of blobs.
pub const fn max_blob_data_size(blobs: usize) -> usize {
    if blobs == 0 {
        return 0
    }
    blobs * FIELD_ELEMENTS_PER_BLOB as usize * USABLE_BYTES_PER_FIELD_ELEMENT -
        USABLE_BYTES_PER_FIELD_ELEMENT
}

/// Errors that can occur while building a blob sidecar.
#[derive(Debug, thiserror::Error)]
pub enum BlobError {
    /// The data doesn't fit in the maximum number of blobs.
    #[error("data too large for blobs: {0} bytes, max {1} bytes")]
    DataTooLarge(usize, usize),
    /// The KZG commitments or proofs could not be computed.
    #[error("kzg error: {0}")]
    Kzg(String),
    /// The blocking task building the sidecar panicked or was cancelled.
    #[error("sidecar builder task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Build a blob sidecar from the given data, computing commitments and proofs.
pub fn create_blob_sidecar_from_data(data: &[u8]) -> Result<BlobTransactionSidecar, BlobError> {
    let max = max_blob_data_size(MAX_BLOBS_PER_BLOCK);
    if data.len() > max {
        return Err(BlobError::DataTooLarge(data.len(), max))
    }

    SidecarBuilder::<SimpleCoder>::from_slice(data).build().map_err(|e| BlobError::Kzg(e.to_string()))
}

/// Build a blob sidecar from the given data in a blocking task, since computing KZG proofs
/// is CPU-heavy.
pub async fn create_blob_sidecar_from_data_async(
    data: impl AsRef<[u8]> + Send + 'static,
) -> Result<BlobTransactionSidecar, BlobError> {
    tokio::task::spawn_blocking(move || create_blob_sidecar_from_data(data.as_ref())).await?
}

/// Fee hints for a blob-carrying transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlobTxFeesHints {
    max_fee_per_gas: u128,
    max_priority_fee_per_gas: u128,
    blob_fee_per_gas: u128,
}

impl BlobTxFeesHints {
    /// Creates fee hints from an EIP-1559 estimation and the current blob base fee.
    pub const fn from_estimation(estimation: Eip1559Estimation, blob_fee_per_gas: u128) -> Self {
        Self {
            max_fee_per_gas: estimation.max_fee_per_gas,
            max_priority_fee_per_gas: estimation.max_priority_fee_per_gas,
            blob_fee_per_gas,
        }
    }

    /// Returns the max fee per gas.
    pub const fn max_fee_per_gas(&self) -> u128 {
        self.max_fee_per_gas
    }

    /// Returns the max priority fee per gas.
    pub const fn max_priority_fee_per_gas(&self) -> u128 {
        self.max_priority_fee_per_gas
    }

    /// Returns the max fee per blob gas.
    pub const fn blob_fee_per_gas(&self) -> u128 {
        self.blob_fee_per_gas
    }

    /// Applies the maximum base fee increase of the next block (12.5%).
    pub const fn next_block_increase(&mut self) {
        self.max_fee_per_gas = self.max_fee_per_gas.saturating_mul(9) / 8;
        self.blob_fee_per_gas = self.blob_fee_per_gas.saturating_mul(9) / 8;
    }

    /// Builder-style variant of [`Self::next_block_increase`].
    pub const fn with_next_block_increase(mut self) -> Self {
        self.next_block_increase();
        self
    }

    /// Enforces a minimum priority fee. The max fee is raised by the same delta if needed.
    pub fn with_min_priority_fee(mut self, min_priority_fee: u128) -> Self {
        if self.max_priority_fee_per_gas < min_priority_fee {
            let delta = min_priority_fee - self.max_priority_fee_per_gas;
            self.max_priority_fee_per_gas = min_priority_fee;
            self.max_fee_per_gas = self.max_fee_per_gas.saturating_add(delta);
        }
        self
    }

    /// Raises the max fee so that it covers the given base fee plus the priority fee.
    ///
    /// Returns `false` if the current hints already covered it.
    pub const fn bump_base_fee(&mut self, base_fee: u128) -> bool {
        let required = base_fee.saturating_add(self.max_priority_fee_per_gas);
        if self.max_fee_per_gas >= required {
            return false
        }
        self.max_fee_per_gas = required.saturating_mul(9) / 8;
        true
    }

    /// Doubles every fee, used when a transaction must replace a pending one.
    pub const fn double(&mut self) {
        self.max_fee_per_gas = self.max_fee_per_gas.saturating_mul(2);
        self.max_priority_fee_per_gas = self.max_priority_fee_per_gas.saturating_mul(2);
        self.blob_fee_per_gas = self.blob_fee_per_gas.saturating_mul(2);
    }
}

impl fmt::Display for BlobTxFeesHints {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "max_fee_per_gas={}, max_priority_fee_per_gas={}, blob_fee_per_gas={}",
            self.max_fee_per_gas, self.max_priority_fee_per_gas, self.blob_fee_per_gas
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn oversized_data_is_rejected() {
        let data = vec![1u8; max_blob_data_size(MAX_BLOBS_PER_BLOCK) + 1];
        let err = create_blob_sidecar_from_data(&data).unwrap_err();
        assert!(matches!(err, BlobError::DataTooLarge(..)));
    }

    #[tokio::test]
    async fn sidecar_spans_multiple_blobs() {
        let data = vec![7u8; MAX_BLOB_DATA_SIZE + 1_000];
        let sidecar = create_blob_sidecar_from_data_async(data).await.unwrap();
        assert_eq!(sidecar.blobs.len(), 2);
        assert_eq!(sidecar.commitments.len(), 2);
    }

    #[test]
    fn fee_hints_bumps() {
        let estimation =
            Eip1559Estimation { max_fee_per_gas: 80, max_priority_fee_per_gas: 10 };
        let mut hints = BlobTxFeesHints::from_estimation(estimation, 8).with_min_priority_fee(20);
        assert_eq!(hints.max_priority_fee_per_gas(), 20);
        assert_eq!(hints.max_fee_per_gas(), 90);

        assert!(!hints.bump_base_fee(50));
        assert!(hints.bump_base_fee(100));
        assert_eq!(hints.max_fee_per_gas(), 135);

        hints.double();
        assert_eq!(hints.blob_fee_per_gas(), 16);
    }
}
