use alloy::rpc::types::Log;
use alloy_primitives::{Address, B256, BlockNumber};
use alloy_sol_types::SolEvent;
use surge_chainio::taiko::inbox::ITaikoInbox::{
    BatchProposed, BatchesRollbacked, BatchesVerified, TransitionContested, TransitionProved,
};
use surge_primitives::{
    batch::{BatchId, BatchMetadata, Transition},
    tier::ProofTier,
};

/// A protocol event the prover reacts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolEvent {
    /// A new batch was proposed.
    BatchProposed(BatchMetadata),
    /// Batches up to `batch_id` were verified.
    BatchesVerified {
        /// The last verified batch.
        batch_id: BatchId,
        /// The verified L2 block hash.
        block_hash: B256,
    },
    /// A transition was proved for a batch.
    TransitionProved {
        /// The proved batch.
        batch_id: BatchId,
        /// The proved transition.
        transition: Transition,
        /// The account that submitted the proof.
        prover: Address,
        /// The tier of the proof, if known to the node.
        tier: Option<ProofTier>,
    },
    /// A proved transition was contested.
    TransitionContested {
        /// The contested batch.
        batch_id: BatchId,
        /// The contested transition.
        transition: Transition,
        /// The account that contested.
        contester: Address,
        /// The tier of the contested proof, if known to the node.
        tier: Option<ProofTier>,
    },
    /// Batches `start..=end` were rolled back.
    BatchesRollbacked {
        /// First rolled back batch.
        start: BatchId,
        /// Last rolled back batch.
        end: BatchId,
    },
}

impl ProtocolEvent {
    /// Returns a short name of the event kind, used in logs and metrics.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::BatchProposed(_) => "batch_proposed",
            Self::BatchesVerified { .. } => "batches_verified",
            Self::TransitionProved { .. } => "transition_proved",
            Self::TransitionContested { .. } => "transition_contested",
            Self::BatchesRollbacked { .. } => "batches_rollbacked",
        }
    }

    /// Returns the batch the event refers to, if a single one.
    pub const fn batch_id(&self) -> Option<BatchId> {
        match self {
            Self::BatchProposed(meta) => Some(meta.batch_id),
            Self::BatchesVerified { batch_id, .. } |
            Self::TransitionProved { batch_id, .. } |
            Self::TransitionContested { batch_id, .. } => Some(*batch_id),
            Self::BatchesRollbacked { .. } => None,
        }
    }
}

/// A protocol event with its position on L1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservedEvent {
    /// The L1 block containing the event.
    pub block_number: BlockNumber,
    /// The index of the log within the block.
    pub log_index: u64,
    /// The L1 block timestamp, if the node returned it.
    pub block_timestamp: Option<u64>,
    /// The decoded event.
    pub event: ProtocolEvent,
}

impl ObservedEvent {
    /// Returns the ordering key of the event on L1.
    pub const fn position(&self) -> (BlockNumber, u64) {
        (self.block_number, self.log_index)
    }

    /// Decodes a raw inbox log.
    ///
    /// Returns `Ok(None)` for pending logs, and for events the prover doesn't react to.
    /// `min_tier` is the minimum tier assigned to proposed batches.
    pub fn from_log(log: &Log, min_tier: ProofTier) -> Result<Option<Self>, alloy_sol_types::Error> {
        let (Some(block_number), Some(log_index)) = (log.block_number, log.log_index) else {
            return Ok(None)
        };

        let event = match log.topic0().copied() {
            Some(BatchProposed::SIGNATURE_HASH) => {
                let ev = BatchProposed::decode_log_data(log.data())?;
                ProtocolEvent::BatchProposed(ev.to_batch_metadata(min_tier))
            }
            Some(BatchesVerified::SIGNATURE_HASH) => {
                let ev = BatchesVerified::decode_log_data(log.data())?;
                ProtocolEvent::BatchesVerified { batch_id: ev.batchId, block_hash: ev.blockHash }
            }
            Some(TransitionProved::SIGNATURE_HASH) => {
                let ev = TransitionProved::decode_log_data(log.data())?;
                ProtocolEvent::TransitionProved {
                    batch_id: ev.batchId,
                    transition: ev.tran.into(),
                    prover: ev.prover,
                    tier: ProofTier::from_id(ev.tier),
                }
            }
            Some(TransitionContested::SIGNATURE_HASH) => {
                let ev = TransitionContested::decode_log_data(log.data())?;
                ProtocolEvent::TransitionContested {
                    batch_id: ev.batchId,
                    transition: ev.tran.into(),
                    contester: ev.contester,
                    tier: ProofTier::from_id(ev.tier),
                }
            }
            Some(BatchesRollbacked::SIGNATURE_HASH) => {
                let ev = BatchesRollbacked::decode_log_data(log.data())?;
                ProtocolEvent::BatchesRollbacked { start: ev.startId, end: ev.endId }
            }
            _ => return Ok(None),
        };

        Ok(Some(Self { block_number, log_index, block_timestamp: log.block_timestamp, event }))
    }
}

#[cfg(test)]
mod tests {
    use alloy_primitives::{Log as PrimitiveLog, LogData};
    use surge_chainio::taiko::inbox::ITaikoInbox::{self, BatchInfo, BlockParams};

    use super::*;

    fn rpc_log(data: LogData, block_number: u64, log_index: u64) -> Log {
        Log {
            inner: PrimitiveLog { address: Address::ZERO, data },
            block_number: Some(block_number),
            log_index: Some(log_index),
            ..Default::default()
        }
    }

    #[test]
    fn decode_batch_proposed() {
        let event = BatchProposed {
            info: BatchInfo {
                lastBlockId: 20,
                proposedIn: 7,
                blocks: vec![BlockParams::default(); 2],
                ..Default::default()
            },
            meta: ITaikoInbox::BatchMetadata { batchId: 4, ..Default::default() },
            ..Default::default()
        };
        let log = rpc_log(event.encode_log_data(), 7, 3);

        let observed = ObservedEvent::from_log(&log, ProofTier::Tee).unwrap().unwrap();
        assert_eq!(observed.position(), (7, 3));
        let ProtocolEvent::BatchProposed(meta) = observed.event else { panic!("wrong kind") };
        assert_eq!(meta.batch_id, 4);
        assert_eq!(meta.min_tier, ProofTier::Tee);
        assert_eq!((meta.first_block_id, meta.last_block_id), (19, 20));
    }

    #[test]
    fn decode_rollback_and_unknown_tier() {
        let log = rpc_log(BatchesRollbacked { startId: 80, endId: 100 }.encode_log_data(), 1, 0);
        let observed = ObservedEvent::from_log(&log, ProofTier::Optimistic).unwrap().unwrap();
        assert_eq!(observed.event, ProtocolEvent::BatchesRollbacked { start: 80, end: 100 });

        let proved = TransitionProved {
            batchId: 9,
            tran: Default::default(),
            prover: Address::ZERO,
            tier: 42,
        };
        let log = rpc_log(proved.encode_log_data(), 1, 1);
        let observed = ObservedEvent::from_log(&log, ProofTier::Optimistic).unwrap().unwrap();
        assert!(matches!(observed.event, ProtocolEvent::TransitionProved { tier: None, .. }));
    }

    #[test]
    fn pending_logs_are_skipped() {
        let mut log = rpc_log(BatchesVerified { batchId: 1, blockHash: B256::ZERO }.encode_log_data(), 1, 0);
        log.block_number = None;
        assert!(ObservedEvent::from_log(&log, ProofTier::Optimistic).unwrap().is_none());
    }
}
