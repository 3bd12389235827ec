use async_trait::async_trait;
use surge_chainio::taiko::inbox::ITaikoInbox::BlobParams;
use surge_primitives::{
    batch::TxCandidate,
    blob::{MAX_BLOBS_PER_BLOCK, create_blob_sidecar_from_data_async, max_blob_data_size},
    pool::TxList,
};
use tracing::debug;

use super::{ProposalContext, ProposalTarget, TxBuilder, batch_params, encode_payload};
use crate::BuilderError;

/// Carries the payload in EIP-4844 blobs attached to the proposal.
#[derive(Debug, Clone)]
pub struct BlobBuilder {
    target: ProposalTarget,
}

impl BlobBuilder {
    /// Creates a new builder proposing to `target`.
    pub const fn new(target: ProposalTarget) -> Self {
        Self { target }
    }
}

#[async_trait]
impl TxBuilder for BlobBuilder {
    fn name(&self) -> &'static str {
        "blob"
    }

    fn max_payload_size(&self) -> usize {
        max_blob_data_size(MAX_BLOBS_PER_BLOCK)
    }

    async fn build(
        &self,
        tx_lists: &[TxList],
        ctx: &ProposalContext,
    ) -> Result<TxCandidate, BuilderError> {
        let payload = encode_payload(tx_lists, self.name(), self.max_payload_size())?;
        let size = payload.len();

        let sidecar = create_blob_sidecar_from_data_async(payload).await?;
        debug!(size, blobs = sidecar.blobs.len(), "Blob sidecar built");

        // Blobs are at most `MAX_BLOBS_PER_BLOCK`, and the payload at most a few hundred KiB.
        let blob_params = BlobParams {
            numBlobs: sidecar.blobs.len() as u8,
            byteSize: size as u32,
            ..Default::default()
        };
        let params = batch_params(tx_lists, ctx, blob_params)?;

        Ok(self.target.candidate(&params, ctx, Default::default()).with_sidecar(sidecar))
    }
}

#[cfg(test)]
mod tests {
    use alloy_sol_types::{SolCall, SolValue};
    use surge_chainio::taiko::inbox::ITaikoInbox::{BatchParams, proposeBatchCall};

    use super::*;
    use crate::test_utils::{inbox, transfer};

    #[tokio::test]
    async fn payload_goes_in_blobs() {
        let builder = BlobBuilder::new(ProposalTarget::new(inbox(), None));
        let lists = vec![(0..10).map(transfer).collect::<Vec<_>>()];

        let candidate = builder.build(&lists, &ProposalContext::default()).await.unwrap();
        assert_eq!(candidate.blob_count(), 1);

        let call = proposeBatchCall::abi_decode(&candidate.data).unwrap();
        assert!(call._txList.is_empty());

        let params = BatchParams::abi_decode(&call._params).unwrap();
        assert_eq!(params.blobParams.numBlobs, 1);
        assert!(params.blobParams.byteSize > 0);
        assert_eq!(params.blocks[0].numTransactions, 10);
    }
}
