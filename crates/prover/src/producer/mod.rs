use std::{fmt, sync::Arc, time::Duration};

use alloy_primitives::{Address, Bytes};
use async_trait::async_trait;
use surge_clients::raiko::{RaikoClient, RaikoError};
use surge_config::ProverOpts;
use surge_primitives::{batch::BatchMetadata, tier::ProofTier};
use thiserror::Error;

use crate::PipelineError;

mod combined;
pub use combined::CombinedProducer;

mod dummy;
pub use dummy::DummyProducer;

mod raiko;
pub use raiko::RaikoProducer;

/// Errors returned by a [`ProofProducer`].
#[derive(Debug, Error)]
#[allow(missing_docs)]
pub enum ProducerError {
    #[error(transparent)]
    Raiko(#[from] RaikoError),
    #[error("proof not ready after {0:?}")]
    Timeout(Duration),
    #[error("got {got} of the {required} required sub-proofs")]
    NotEnoughProofs { got: usize, required: usize, transient: bool },
}

impl ProducerError {
    /// Returns true if asking again may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Raiko(err) => err.is_transient(),
            Self::Timeout(_) => true,
            Self::NotEnoughProofs { transient, .. } => *transient,
        }
    }
}

/// Produces proofs of a given tier for proposed batches.
#[async_trait]
pub trait ProofProducer: Send + Sync + fmt::Debug {
    /// Requests a proof for the batch and waits until it is ready.
    async fn request_proof(&self, meta: &BatchMetadata) -> Result<Bytes, ProducerError>;

    /// Returns the tier of the produced proofs.
    fn tier(&self) -> ProofTier;
}

/// Builds the producer of the given tier from the prover options.
///
/// The combined tier requests a TEE and a ZK proof, and needs both verifier addresses.
pub fn build_producer(
    opts: &ProverOpts,
    tier: ProofTier,
    prover: Address,
) -> Result<Arc<dyn ProofProducer>, PipelineError> {
    if opts.dummy {
        return Ok(Arc::new(DummyProducer::new(tier)))
    }

    let endpoint = opts
        .raiko_endpoint
        .clone()
        .ok_or_else(|| PipelineError::Config("missing Raiko endpoint".to_owned()))?;
    let client = RaikoClient::new(
        endpoint,
        opts.raiko_jwt.clone(),
        Duration::from_secs(opts.raiko_request_timeout_secs),
    );
    let raiko = |tier: ProofTier| {
        RaikoProducer::new(
            client.clone(),
            prover,
            tier,
            Duration::from_secs(opts.proof_polling_interval_secs),
            Duration::from_secs(opts.raiko_request_timeout_secs),
        )
    };

    if tier != ProofTier::ZkTee {
        return Ok(Arc::new(raiko(tier)))
    }

    let (Some(tee_verifier), Some(zk_verifier)) = (opts.tee_verifier, opts.zk_verifier) else {
        return Err(PipelineError::Config(
            "the zk_tee tier needs both the TEE and ZK verifier addresses".to_owned(),
        ))
    };
    let producers: Vec<(Address, Arc<dyn ProofProducer>)> = vec![
        (tee_verifier, Arc::new(raiko(ProofTier::Tee))),
        (zk_verifier, Arc::new(raiko(ProofTier::Zk))),
    ];
    Ok(Arc::new(CombinedProducer::new(ProofTier::ZkTee, producers, 2)))
}
