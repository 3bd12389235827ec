use std::sync::Arc;

use alloy::sol;
use alloy_primitives::{Address, Bytes};
use alloy_sol_types::SolValue;
use async_trait::async_trait;
use futures::{StreamExt, stream::FuturesUnordered};
use surge_primitives::{batch::BatchMetadata, tier::ProofTier};
use tracing::warn;

use super::{ProducerError, ProofProducer};

sol! {
    /// A proof checked by a single verifier of a composed proof.
    #[derive(Debug, PartialEq, Eq)]
    struct SubProof {
        address verifier;
        bytes proof;
    }
}

/// Requests proofs from several producers concurrently, and combines the first
/// `required_proofs` that arrive into an ABI-encoded `(address verifier, bytes proof)[]`.
///
/// Sub-proofs keep the order of the producers, regardless of arrival order.
#[derive(Debug, Clone)]
pub struct CombinedProducer {
    tier: ProofTier,
    producers: Vec<(Address, Arc<dyn ProofProducer>)>,
    required_proofs: usize,
}

impl CombinedProducer {
    /// Creates a new producer combining the given `(verifier, producer)` pairs.
    pub fn new(
        tier: ProofTier,
        producers: Vec<(Address, Arc<dyn ProofProducer>)>,
        required_proofs: usize,
    ) -> Self {
        let required_proofs = required_proofs.clamp(1, producers.len().max(1));
        Self { tier, producers, required_proofs }
    }
}

#[async_trait]
impl ProofProducer for CombinedProducer {
    async fn request_proof(&self, meta: &BatchMetadata) -> Result<Bytes, ProducerError> {
        let mut pending: FuturesUnordered<_> = self
            .producers
            .iter()
            .enumerate()
            .map(|(index, (verifier, producer))| async move {
                (index, *verifier, producer.request_proof(meta).await)
            })
            .collect();

        let mut proofs = Vec::with_capacity(self.required_proofs);
        let mut transient = false;
        while let Some((index, verifier, res)) = pending.next().await {
            match res {
                Ok(proof) => {
                    proofs.push((index, SubProof { verifier, proof }));
                    if proofs.len() >= self.required_proofs {
                        break
                    }
                }
                Err(e) => {
                    warn!(batch_id = meta.batch_id, %verifier, ?e, "Sub-proof request failed");
                    transient |= e.is_transient();
                }
            }
        }

        if proofs.len() < self.required_proofs {
            return Err(ProducerError::NotEnoughProofs {
                got: proofs.len(),
                required: self.required_proofs,
                transient,
            })
        }

        proofs.sort_by_key(|(index, _)| *index);
        let sub_proofs: Vec<SubProof> = proofs.into_iter().map(|(_, p)| p).collect();
        Ok(Bytes::from(sub_proofs.abi_encode()))
    }

    fn tier(&self) -> ProofTier {
        self.tier
    }
}
