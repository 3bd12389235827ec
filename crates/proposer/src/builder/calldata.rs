use alloy_primitives::Bytes;
use async_trait::async_trait;
use surge_chainio::taiko::inbox::ITaikoInbox::BlobParams;
use surge_primitives::{BYTES_PER_KB, batch::TxCandidate, pool::TxList};

use super::{ProposalContext, ProposalTarget, TxBuilder, batch_params, encode_payload};
use crate::BuilderError;

/// The maximum payload carried in calldata.
pub const MAX_CALLDATA_PAYLOAD_SIZE: usize = 128 * BYTES_PER_KB;

/// Carries the payload in the `_txList` calldata argument of the proposal.
#[derive(Debug, Clone)]
pub struct CalldataBuilder {
    target: ProposalTarget,
}

impl CalldataBuilder {
    /// Creates a new builder proposing to `target`.
    pub const fn new(target: ProposalTarget) -> Self {
        Self { target }
    }
}

#[async_trait]
impl TxBuilder for CalldataBuilder {
    fn name(&self) -> &'static str {
        "calldata"
    }

    fn max_payload_size(&self) -> usize {
        MAX_CALLDATA_PAYLOAD_SIZE
    }

    async fn build(
        &self,
        tx_lists: &[TxList],
        ctx: &ProposalContext,
    ) -> Result<TxCandidate, BuilderError> {
        let payload: Bytes = encode_payload(tx_lists, self.name(), self.max_payload_size())?;
        let params = batch_params(tx_lists, ctx, BlobParams::default())?;

        Ok(self.target.candidate(&params, ctx, payload))
    }
}

#[cfg(test)]
mod tests {
    use alloy_sol_types::SolCall;
    use surge_chainio::taiko::inbox::ITaikoInbox::proposeBatchCall;
    use surge_primitives::compression::decode_tx_lists;

    use super::*;
    use crate::test_utils::{inbox, transfer};

    #[tokio::test]
    async fn payload_goes_in_calldata() {
        let builder = CalldataBuilder::new(ProposalTarget::new(inbox(), None));
        let lists = vec![vec![transfer(0)], vec![transfer(1), transfer(2)]];

        let candidate = builder.build(&lists, &ProposalContext::default()).await.unwrap();
        assert_eq!(candidate.blob_count(), 0);

        let call = proposeBatchCall::abi_decode(&candidate.data).unwrap();
        let decoded = decode_tx_lists(&call._txList).unwrap();
        assert_eq!(decoded.len(), 2);
        assert_eq!(decoded[1][1].tx_hash(), lists[1][1].tx_hash());
    }

    #[tokio::test]
    async fn empty_batch_is_still_a_proposal() {
        let builder = CalldataBuilder::new(ProposalTarget::new(inbox(), None));
        let candidate = builder.build(&[vec![]], &ProposalContext::default()).await.unwrap();
        assert!(!candidate.data.is_empty());
    }
}
