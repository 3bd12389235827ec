use alloy_primitives::{Bytes, keccak256};
use async_trait::async_trait;
use surge_primitives::{batch::BatchMetadata, tier::ProofTier};

use super::{ProducerError, ProofProducer};

/// Returns deterministic placeholder proofs, for tests and development networks.
#[derive(Debug, Clone, Copy)]
pub struct DummyProducer {
    tier: ProofTier,
}

impl DummyProducer {
    /// Creates a producer of the given tier.
    pub const fn new(tier: ProofTier) -> Self {
        Self { tier }
    }
}

#[async_trait]
impl ProofProducer for DummyProducer {
    async fn request_proof(&self, meta: &BatchMetadata) -> Result<Bytes, ProducerError> {
        let mut seed = [0u8; 10];
        seed[..8].copy_from_slice(&meta.batch_id.to_be_bytes());
        seed[8..].copy_from_slice(&self.tier.id().to_be_bytes());
        Ok(Bytes::from(keccak256(seed)))
    }

    fn tier(&self) -> ProofTier {
        self.tier
    }
}
