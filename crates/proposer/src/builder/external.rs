use std::{fmt, sync::Arc};

use alloy::sol;
use alloy_primitives::Bytes;
use alloy_sol_types::SolValue;
use async_trait::async_trait;
use surge_chainio::taiko::inbox::ITaikoInbox::BlobParams;
use surge_clients::celestia::{
    ADVISABLE_CELESTIA_BLOB_SIZE, CelestiaClient, CelestiaError, Namespace,
};
use surge_primitives::{batch::TxCandidate, pool::TxList};
use thiserror::Error;
use tracing::{debug, info};

use super::{ProposalContext, ProposalTarget, TxBuilder, batch_params, encode_payload};
use crate::BuilderError;

sol! {
    /// Where a payload published on an external DA layer can be found. It replaces the
    /// payload in the `_txList` argument of the proposal.
    #[derive(Debug, PartialEq, Eq)]
    struct ExternalDaLocator {
        uint64 height;
        bytes namespace;
        uint32 byteOffset;
        uint32 byteSize;
    }
}

/// Errors of an external DA backend.
#[derive(Debug, Error)]
#[allow(missing_docs)]
pub enum DaError {
    #[error(transparent)]
    Celestia(#[from] CelestiaError),
    #[error("Insufficient balance on the {0} account to pay for the submission")]
    InsufficientBalance(&'static str),
    #[error("No payload found at height {0}")]
    NotFound(u64),
    #[error("Payload of {0} bytes does not fit in a locator")]
    PayloadTooLarge(usize),
}

/// An external data availability layer payloads are published to.
#[async_trait]
pub trait DaBackend: Send + Sync + fmt::Debug {
    /// The name of the backend, used in logs and metrics.
    fn name(&self) -> &'static str;

    /// The maximum size of a single published payload.
    fn max_payload_size(&self) -> usize;

    /// Publishes the payload, returning where to find it.
    async fn publish(&self, payload: Bytes) -> Result<ExternalDaLocator, DaError>;

    /// Retrieves a previously published payload.
    async fn fetch(&self, locator: &ExternalDaLocator) -> Result<Bytes, DaError>;
}

/// Publishes payloads as single Celestia blobs.
#[derive(Debug)]
pub struct CelestiaDa {
    client: CelestiaClient,
}

impl CelestiaDa {
    /// Creates a new backend publishing with `client` in its namespace.
    pub const fn new(client: CelestiaClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl DaBackend for CelestiaDa {
    fn name(&self) -> &'static str {
        "celestia"
    }

    fn max_payload_size(&self) -> usize {
        ADVISABLE_CELESTIA_BLOB_SIZE
    }

    async fn publish(&self, payload: Bytes) -> Result<ExternalDaLocator, DaError> {
        if !self.client.has_sufficient_balance().await? {
            return Err(DaError::InsufficientBalance(self.name()))
        }

        let byte_size =
            u32::try_from(payload.len()).map_err(|_| DaError::PayloadTooLarge(payload.len()))?;
        let height = self.client.submit(&payload).await?;

        Ok(ExternalDaLocator {
            height,
            namespace: Bytes::copy_from_slice(self.client.namespace().as_bytes()),
            byteOffset: 0,
            byteSize: byte_size,
        })
    }

    async fn fetch(&self, locator: &ExternalDaLocator) -> Result<Bytes, DaError> {
        let namespace = Namespace::from_bytes(&locator.namespace)?;
        let start = locator.byteOffset as usize;
        let end = start + locator.byteSize as usize;

        for blob in self.client.get_all(locator.height, &namespace).await? {
            let data = blob.decode_data()?;
            if data.len() >= end {
                return Ok(data.slice(start..end))
            }
        }

        Err(DaError::NotFound(locator.height))
    }
}

/// Publishes the payload on an external DA layer and proposes its locator.
#[derive(Debug, Clone)]
pub struct ExternalDaBuilder {
    target: ProposalTarget,
    backend: Arc<dyn DaBackend>,
}

impl ExternalDaBuilder {
    /// Creates a new builder publishing on `backend` and proposing to `target`.
    pub fn new(target: ProposalTarget, backend: Arc<dyn DaBackend>) -> Self {
        Self { target, backend }
    }
}

#[async_trait]
impl TxBuilder for ExternalDaBuilder {
    fn name(&self) -> &'static str {
        self.backend.name()
    }

    fn max_payload_size(&self) -> usize {
        self.backend.max_payload_size()
    }

    async fn build(
        &self,
        tx_lists: &[TxList],
        ctx: &ProposalContext,
    ) -> Result<TxCandidate, BuilderError> {
        let payload = encode_payload(tx_lists, self.name(), self.max_payload_size())?;
        let size = payload.len();

        // A payload that isn't published is never proposed.
        let locator = self.backend.publish(payload).await?;
        info!(backend = self.name(), height = locator.height, size, "📤 Payload published");

        let blob_params = BlobParams {
            byteOffset: locator.byteOffset,
            byteSize: locator.byteSize,
            ..Default::default()
        };
        let params = batch_params(tx_lists, ctx, blob_params)?;
        debug!(?locator, "Proposing external DA locator");

        Ok(self.target.candidate(&params, ctx, locator.abi_encode().into()))
    }
}
