use std::{io, time::Duration};

use alloy::{contract::Error as ContractError, transports::TransportError};
use alloy_primitives::{Address, U256};
use surge_chainio::{revert::RevertKind, tx_manager::TxManagerError};
use surge_primitives::blob::BlobError;
use thiserror::Error;

use crate::builder::DaError;

/// Errors that can occur while turning transaction lists into a proposal transaction.
#[derive(Debug, Error)]
#[allow(missing_docs)]
pub enum BuilderError {
    #[error("Error while compressing batch transactions with Zlib: {0}")]
    Compression(#[from] io::Error),
    #[error("Payload of {size} bytes exceeds the {backend} limit of {max} bytes")]
    PayloadTooLarge { backend: &'static str, size: usize, max: usize },
    #[error("Error while creating blob sidecar from batch data: {0}")]
    BlobSidecar(#[from] BlobError),
    #[error("DA publish failed: {0}")]
    Publish(#[from] DaError),
    #[error("Too many transactions in a single block: {0}")]
    TooManyTransactions(usize),
}

/// The errors that can occur while proposing.
///
/// None of them stop the proposing loop: the tick is abandoned and retried on the next one.
#[derive(Debug, Error)]
#[allow(missing_docs)]
pub enum ProposerError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("Contract error: {0}")]
    Contract(#[from] ContractError),
    #[error("Builder error: {0}")]
    Builder(#[from] BuilderError),
    #[error("Transaction error: {0}")]
    Tx(#[from] TxManagerError),
    #[error("L2 execution client is not synced")]
    L2NotSynced,
    #[error("Batch of {0} blocks exceeds the maximum of {1} blocks per batch")]
    TooManyBlocks(usize, usize),
    #[error("Insufficient bond balance for {account}: have {available}, need {required}")]
    InsufficientBond { account: Address, available: U256, required: U256 },
    #[error("Failed to recover transaction sender: {0}")]
    SenderRecovery(String),
    #[error("Call timed out after {0:?}")]
    Timeout(Duration),
    #[error("Invalid configuration: {0}")]
    Config(String),
    #[error("Cancelled")]
    Cancelled,
}

impl ProposerError {
    /// Returns true if the error is a stale nonce rejection of the proposal transaction.
    pub fn is_nonce_too_low(&self) -> bool {
        matches!(self, Self::Tx(err) if err.is_nonce_too_low())
    }

    /// Returns true if the operation is worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(_) | Self::Timeout(_) | Self::L2NotSynced => true,
            Self::Contract(ContractError::TransportError(err)) => {
                RevertKind::from_rpc_error(err).is_transient()
            }
            Self::Tx(err) => err.kind().is_transient(),
            _ => false,
        }
    }

    /// Returns the label used in logs and metrics.
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Transport(_) => "transport",
            Self::Contract(_) => "contract",
            Self::Builder(BuilderError::Publish(_)) => "da_publish",
            Self::Builder(_) => "builder",
            Self::Tx(_) => "tx",
            Self::L2NotSynced => "l2_not_synced",
            Self::TooManyBlocks(..) => "too_many_blocks",
            Self::InsufficientBond { .. } => "insufficient_bond",
            Self::SenderRecovery(_) => "sender_recovery",
            Self::Timeout(_) => "timeout",
            Self::Config(_) => "config",
            Self::Cancelled => "cancelled",
        }
    }
}

/// Awaits the future for at most `limit`. Exceeding it is reported as a transient
/// [`ProposerError::Timeout`].
pub(crate) async fn with_timeout<T, E, F>(limit: Duration, fut: F) -> Result<T, ProposerError>
where
    F: Future<Output = Result<T, E>>,
    E: Into<ProposerError>,
{
    tokio::time::timeout(limit, fut)
        .await
        .map_err(|_| ProposerError::Timeout(limit))?
        .map_err(Into::into)
}
