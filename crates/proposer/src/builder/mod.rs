use std::{fmt, sync::Arc, time::Duration};

use alloy_primitives::{Address, B256, Bytes};
use alloy_sol_types::SolValue;
use async_trait::async_trait;
use surge_chainio::taiko::{
    forced_inclusion::PendingForcedInclusion,
    inbox::{
        ITaikoInbox::{BatchParams, BlobParams, BlockParams},
        TaikoInbox,
    },
};
use surge_clients::celestia::{CelestiaClient, Namespace};
use surge_config::DaMode;
use surge_primitives::{
    batch::TxCandidate,
    compression::encode_tx_lists,
    pool::TxList,
};

use crate::{BuilderError, ProposerError, RuntimeConfig, metrics::ProposerMetrics};

mod blob;
pub use blob::BlobBuilder;

mod calldata;
pub use calldata::CalldataBuilder;

mod external;
pub use external::{CelestiaDa, DaBackend, DaError, ExternalDaBuilder, ExternalDaLocator};

/// Everything a proposal carries besides the transaction lists.
#[derive(Debug, Clone, Default)]
pub struct ProposalContext {
    /// The account proposing the batch.
    pub proposer: Address,
    /// The L2 coinbase of the proposed blocks.
    pub coinbase: Address,
    /// The meta hash of the latest proposed batch. The proposal reverts if it changed.
    pub parent_meta_hash: B256,
    /// The forced inclusion to process first, if any.
    pub forced_inclusion: Option<PendingForcedInclusion>,
}

/// Turns transaction lists into an L1 proposal transaction, publishing the payload on one DA
/// backend.
#[async_trait]
pub trait TxBuilder: Send + Sync + fmt::Debug {
    /// The name of the DA backend, used in logs and metrics.
    fn name(&self) -> &'static str;

    /// The maximum size of the compressed payload, in bytes.
    fn max_payload_size(&self) -> usize;

    /// Builds the proposal transaction of the given lists, one list per L2 block.
    async fn build(
        &self,
        tx_lists: &[TxList],
        ctx: &ProposalContext,
    ) -> Result<TxCandidate, BuilderError>;
}

/// Creates the builder of the configured DA mode.
pub fn from_config(
    cfg: &RuntimeConfig,
    target: ProposalTarget,
) -> Result<Arc<dyn TxBuilder>, ProposerError> {
    let builder: Arc<dyn TxBuilder> = match cfg.proposer.da {
        DaMode::Calldata => Arc::new(CalldataBuilder::new(target)),
        DaMode::Blob => Arc::new(BlobBuilder::new(target)),
        DaMode::Celestia => {
            let missing = |flag: &str| ProposerError::Config(format!("{flag} is required"));
            let endpoint = cfg.celestia.endpoint.clone().ok_or_else(|| missing("--celestia.endpoint"))?;
            let token = cfg.celestia.auth_token.clone().ok_or_else(|| missing("--celestia.auth-token"))?;
            let namespace = cfg.celestia.namespace.as_deref().ok_or_else(|| missing("--celestia.namespace"))?;
            let namespace =
                Namespace::from_hex(namespace).map_err(|e| ProposerError::Config(e.to_string()))?;

            let client = CelestiaClient::new(
                endpoint,
                token,
                namespace,
                Duration::from_secs(cfg.celestia.timeout_secs),
            );
            Arc::new(ExternalDaBuilder::new(target, Arc::new(CelestiaDa::new(client))))
        }
    };

    Ok(builder)
}

/// The contract proposals are sent to: the inbox, or the forced inclusion wrapper in front
/// of it.
#[derive(Debug, Clone)]
pub struct ProposalTarget {
    inbox: TaikoInbox,
    wrapper: Option<Address>,
}

impl ProposalTarget {
    /// Creates a target. If `wrapper` is set, proposals go through it.
    pub const fn new(inbox: TaikoInbox, wrapper: Option<Address>) -> Self {
        Self { inbox, wrapper }
    }

    /// The address of the contract receiving proposals.
    pub fn address(&self) -> Address {
        self.wrapper.unwrap_or(*self.inbox.address())
    }

    /// Builds the `proposeBatch` transaction.
    ///
    /// Through the wrapper, the parameters are prefixed with the parameters of the forced
    /// inclusion block, empty if there is none.
    pub fn candidate(&self, params: &BatchParams, ctx: &ProposalContext, tx_list: Bytes) -> TxCandidate {
        let encoded = if self.wrapper.is_some() {
            let forced = forced_inclusion_params(ctx).map_or_else(Bytes::new, |p| p.abi_encode().into());
            let params: Bytes = params.abi_encode().into();
            (forced, params).abi_encode_params().into()
        } else {
            params.abi_encode().into()
        };

        TxCandidate::new(self.address(), self.inbox.propose_batch_calldata(encoded, tx_list))
    }
}

/// Serializes the transaction lists into the proposal payload, rejecting it if it's larger
/// than `max` bytes.
pub(crate) fn encode_payload(
    tx_lists: &[TxList],
    backend: &'static str,
    max: usize,
) -> Result<Bytes, BuilderError> {
    let payload = encode_tx_lists(tx_lists)?;
    if payload.len() > max {
        return Err(BuilderError::PayloadTooLarge { backend, size: payload.len(), max })
    }

    ProposerMetrics::set_payload_size(backend, payload.len());
    Ok(payload)
}

/// Builds the proposal parameters, one block per transaction list.
pub(crate) fn batch_params(
    tx_lists: &[TxList],
    ctx: &ProposalContext,
    blob_params: BlobParams,
) -> Result<BatchParams, BuilderError> {
    let blocks = tx_lists
        .iter()
        .map(|list| {
            let count = u16::try_from(list.len())
                .map_err(|_| BuilderError::TooManyTransactions(list.len()))?;
            Ok(BlockParams { numTransactions: count, timeShift: 0, signalSlots: vec![] })
        })
        .collect::<Result<Vec<_>, BuilderError>>()?;

    // Zero anchor block and timestamp are filled in by the inbox.
    Ok(BatchParams {
        proposer: ctx.proposer,
        coinbase: ctx.coinbase,
        parentMetaHash: ctx.parent_meta_hash,
        anchorBlockId: 0,
        lastBlockTimestamp: 0,
        revertIfNotFirstProposal: false,
        blobParams: blob_params,
        blocks,
    })
}

/// The parameters of the single block carrying the pending forced inclusion.
fn forced_inclusion_params(ctx: &ProposalContext) -> Option<BatchParams> {
    let forced = ctx.forced_inclusion.as_ref()?;
    let inclusion = &forced.inclusion;

    Some(BatchParams {
        proposer: ctx.proposer,
        coinbase: ctx.coinbase,
        blobParams: BlobParams {
            blobHashes: vec![inclusion.blobHash],
            firstBlobIndex: 0,
            numBlobs: 0,
            byteOffset: inclusion.blobByteOffset,
            byteSize: inclusion.blobByteSize,
            createdIn: inclusion.blobCreatedIn,
        },
        blocks: vec![BlockParams { numTransactions: forced.min_txs, timeShift: 0, signalSlots: vec![] }],
        ..Default::default()
    })
}

#[cfg(test)]
mod tests {
    use alloy_sol_types::SolCall;
    use surge_chainio::taiko::{
        forced_inclusion::IForcedInclusionStore::ForcedInclusion,
        inbox::ITaikoInbox::proposeBatchCall,
    };

    use super::*;
    use crate::test_utils::{inbox, transfer};

    fn decode(candidate: &TxCandidate) -> proposeBatchCall {
        proposeBatchCall::abi_decode(&candidate.data).unwrap()
    }

    #[test]
    fn params_without_wrapper() {
        let target = ProposalTarget::new(inbox(), None);
        let ctx = ProposalContext {
            proposer: Address::repeat_byte(1),
            coinbase: Address::repeat_byte(2),
            ..Default::default()
        };
        let lists = vec![vec![transfer(0), transfer(1)], vec![]];

        let params = batch_params(&lists, &ctx, BlobParams::default()).unwrap();
        let candidate = target.candidate(&params, &ctx, Bytes::from_static(b"payload"));

        assert_eq!(candidate.to, Address::repeat_byte(0x1b));
        let call = decode(&candidate);
        assert_eq!(call._txList, Bytes::from_static(b"payload"));

        let decoded = BatchParams::abi_decode(&call._params).unwrap();
        assert_eq!(decoded.coinbase, Address::repeat_byte(2));
        assert_eq!(decoded.blocks.len(), 2);
        assert_eq!(decoded.blocks[0].numTransactions, 2);
        assert_eq!(decoded.blocks[1].numTransactions, 0);
    }

    #[test]
    fn wrapper_prefixes_forced_inclusion() {
        let wrapper = Address::repeat_byte(0x77);
        let target = ProposalTarget::new(inbox(), Some(wrapper));
        let ctx = ProposalContext {
            proposer: Address::repeat_byte(1),
            forced_inclusion: Some(PendingForcedInclusion {
                inclusion: ForcedInclusion {
                    blobHash: B256::repeat_byte(9),
                    blobByteSize: 100,
                    ..Default::default()
                },
                min_txs: 3,
            }),
            ..Default::default()
        };

        let params = batch_params(&[vec![transfer(0)]], &ctx, BlobParams::default()).unwrap();
        let candidate = target.candidate(&params, &ctx, Bytes::new());
        assert_eq!(candidate.to, wrapper);

        let call = decode(&candidate);
        let (forced, params) = <(Bytes, Bytes)>::abi_decode_params(&call._params).unwrap();
        let forced = BatchParams::abi_decode(&forced).unwrap();
        assert_eq!(forced.blobParams.blobHashes, vec![B256::repeat_byte(9)]);
        assert_eq!(forced.blocks[0].numTransactions, 3);
        assert_eq!(BatchParams::abi_decode(&params).unwrap().blocks.len(), 1);

        // No pending inclusion: the forced parameters are empty.
        let ctx = ProposalContext { forced_inclusion: None, ..ctx };
        let call = decode(&target.candidate(&params_of(&ctx), &ctx, Bytes::new()));
        let (forced, _) = <(Bytes, Bytes)>::abi_decode_params(&call._params).unwrap();
        assert!(forced.is_empty());
    }

    fn params_of(ctx: &ProposalContext) -> BatchParams {
        batch_params(&[vec![]], ctx, BlobParams::default()).unwrap()
    }

    #[test]
    fn oversized_payload_is_rejected() {
        let lists = vec![(0..50).map(transfer).collect::<Vec<_>>()];
        let err = encode_payload(&lists, "test", 10).unwrap_err();
        assert!(matches!(err, BuilderError::PayloadTooLarge { backend: "test", max: 10, .. }));
    }
}
