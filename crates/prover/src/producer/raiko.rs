use std::time::Duration;

use alloy_primitives::{Address, Bytes};
use async_trait::async_trait;
use surge_clients::raiko::{BatchProofRequest, RaikoBatch, RaikoClient, RaikoProofStatus};
use surge_primitives::{batch::BatchMetadata, tier::ProofTier};
use tokio::time::{sleep, timeout};
use tracing::debug;

use super::{ProducerError, ProofProducer};

/// Requests proofs from a Raiko proof service, polling until they are ready.
#[derive(Debug, Clone)]
pub struct RaikoProducer {
    client: RaikoClient,
    prover: Address,
    tier: ProofTier,
    polling_interval: Duration,
    request_timeout: Duration,
}

impl RaikoProducer {
    /// Creates a new producer of the given tier. `prover` is the account the proofs are
    /// generated for.
    pub const fn new(
        client: RaikoClient,
        prover: Address,
        tier: ProofTier,
        polling_interval: Duration,
        request_timeout: Duration,
    ) -> Self {
        Self { client, prover, tier, polling_interval, request_timeout }
    }
}

#[async_trait]
impl ProofProducer for RaikoProducer {
    async fn request_proof(&self, meta: &BatchMetadata) -> Result<Bytes, ProducerError> {
        let batch =
            RaikoBatch { batch_id: meta.batch_id, l1_inclusion_block_number: meta.proposed_in };
        let req = BatchProofRequest::single(batch, self.prover, self.tier.proof_type());

        let poll = async {
            loop {
                match self.client.request_batch_proof(&req).await? {
                    RaikoProofStatus::Ready(proof) => return Ok::<_, ProducerError>(proof),
                    RaikoProofStatus::Generating => {
                        debug!(batch_id = meta.batch_id, tier = %self.tier, "⏳ Proof is being generated");
                        sleep(self.polling_interval).await;
                    }
                }
            }
        };

        timeout(self.request_timeout, poll)
            .await
            .map_err(|_| ProducerError::Timeout(self.request_timeout))?
    }

    fn tier(&self) -> ProofTier {
        self.tier
    }
}

#[cfg(test)]
mod tests {
    use mockito::Server;
    use serde_json::json;
    use url::Url;

    use super::*;
    use crate::test_utils::batch_meta;

    fn producer(url: &str, timeout: Duration) -> RaikoProducer {
        let client = RaikoClient::new(Url::parse(url).unwrap(), None, Duration::from_secs(1));
        RaikoProducer::new(
            client,
            Address::repeat_byte(1),
            ProofTier::Tee,
            Duration::from_millis(10),
            timeout,
        )
    }

    #[tokio::test]
    async fn returns_ready_proof() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/v3/proof/batch")
            .with_status(200)
            .with_body(json!({ "status": "ok", "data": { "proof": { "proof": "0x01" } } }).to_string())
            .expect(1)
            .create_async()
            .await;

        let proof = producer(&server.url(), Duration::from_secs(5))
            .request_proof(&batch_meta(1, 10))
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(proof, Bytes::from_static(&[1]));
    }

    #[tokio::test]
    async fn keeps_polling_until_timeout() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/v3/proof/batch")
            .with_status(200)
            .with_body(json!({ "status": "ok", "data": { "status": "work_in_progress" } }).to_string())
            .expect_at_least(2)
            .create_async()
            .await;

        let err = producer(&server.url(), Duration::from_millis(100))
            .request_proof(&batch_meta(1, 10))
            .await
            .unwrap_err();

        assert!(matches!(err, ProducerError::Timeout(_)));
        assert!(err.is_transient());
    }
}
