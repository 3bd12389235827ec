use std::time::Duration;

use alloy::{contract::Error as ContractError, transports::TransportError};
use surge_chainio::{revert::RevertKind, tx_manager::TxManagerError};
use surge_primitives::tier::ProofTier;
use thiserror::Error;

use crate::producer::ProducerError;

/// The errors that can occur in the proof pipeline.
///
/// None of these halt the event loop once it started: they flow back to the dispatcher, which
/// logs them and decides whether the work is retried or abandoned.
#[derive(Debug, Error)]
#[allow(missing_docs)]
pub enum PipelineError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("Contract error: {0}")]
    Contract(#[from] ContractError),
    #[error("Proof producer error: {0}")]
    Producer(#[from] ProducerError),
    #[error("Transaction error: {0}")]
    Tx(#[from] TxManagerError),
    #[error("No submitter found for tier {0} or above")]
    NoSubmitterFound(ProofTier),
    #[error("L2 block {0} not found")]
    MissingL2Block(u64),
    #[error("Call timed out after {0:?}")]
    Timeout(Duration),
    #[error("Invalid configuration: {0}")]
    Config(String),
    #[error("Channel closed: {0}")]
    ChannelClosed(&'static str),
    #[error("Deadline {0} passed")]
    DeadlinePassed(u64),
}

impl PipelineError {
    /// Returns true if the operation is worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(_) | Self::MissingL2Block(_) | Self::Timeout(_) => true,
            Self::Contract(ContractError::TransportError(err)) => {
                RevertKind::from_rpc_error(err).is_transient()
            }
            Self::Producer(err) => err.is_transient(),
            Self::Tx(err) => err.kind().is_transient(),
            _ => false,
        }
    }

    /// Returns true if the error means the desired outcome is already on chain.
    pub fn is_benign(&self) -> bool {
        matches!(self, Self::Tx(err) if err.kind().is_benign())
    }

    /// Returns the label used in logs and metrics.
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Transport(_) => "transport",
            Self::Contract(_) => "contract",
            Self::Producer(_) => "producer",
            Self::Tx(_) => "tx",
            Self::NoSubmitterFound(_) => "no_submitter",
            Self::MissingL2Block(_) => "missing_l2_block",
            Self::Timeout(_) => "timeout",
            Self::Config(_) => "config",
            Self::ChannelClosed(_) => "channel_closed",
            Self::DeadlinePassed(_) => "deadline_passed",
        }
    }
}

/// Awaits the future for at most `limit`. Exceeding it is reported as a transient
/// [`PipelineError::Timeout`].
pub(crate) async fn with_timeout<T, E, F>(limit: Duration, fut: F) -> Result<T, PipelineError>
where
    F: Future<Output = Result<T, E>>,
    E: Into<PipelineError>,
{
    tokio::time::timeout(limit, fut)
        .await
        .map_err(|_| PipelineError::Timeout(limit))?
        .map_err(Into::into)
}
