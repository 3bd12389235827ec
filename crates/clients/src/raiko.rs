use std::{str::FromStr, time::Duration};

use alloy_primitives::{Address, Bytes};
use base64::{Engine, engine::general_purpose::STANDARD};
use reqwest::{
    Client, StatusCode,
    header::{AUTHORIZATION, CONTENT_TYPE},
};
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

/// Path of the batch proof endpoint.
const BATCH_PROOF_PATH: &str = "/v3/proof/batch";

/// Proof type for which the service returns an empty proof.
const NATIVE_PROOF_TYPE: &str = "native";

/// Statuses reported while a proof is still being generated.
const GENERATING_STATUSES: &[&str] = &["registered", "work_in_progress"];

/// Errors that can occur when interacting with the Raiko proof service.
#[derive(Debug, thiserror::Error)]
#[allow(missing_docs)]
pub enum RaikoError {
    #[error("URL parse error: {0}")]
    ParseUrl(#[from] url::ParseError),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected HTTP status {0}: {1}")]
    Status(StatusCode, String),
    #[error("proof service error: {0}")]
    Service(String),
    #[error("proof service returned an empty proof")]
    EmptyProof,
    #[error("invalid proof encoding: {0}")]
    InvalidProof(String),
}

impl RaikoError {
    /// Returns true if the error may go away by retrying the request.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            Self::Status(status, _) => status.is_server_error(),
            _ => false,
        }
    }
}

/// A single batch to prove.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RaikoBatch {
    /// The batch ID.
    pub batch_id: u64,
    /// The L1 block in which the batch was proposed.
    pub l1_inclusion_block_number: u64,
}

/// Body of a batch proof request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchProofRequest {
    /// The batches to prove.
    pub batches: Vec<RaikoBatch>,
    /// The prover address, hex encoded without `0x` prefix.
    pub prover: String,
    /// Whether the service should aggregate the batch proofs.
    pub aggregate: bool,
    /// The requested proof type, such as `sgx` or `sp1`.
    pub proof_type: String,
}

impl BatchProofRequest {
    /// Creates a request for a single batch.
    pub fn single(batch: RaikoBatch, prover: Address, proof_type: &str) -> Self {
        let prover = prover.to_string().trim_start_matches("0x").to_owned();
        Self { batches: vec![batch], prover, aggregate: false, proof_type: proof_type.to_owned() }
    }
}

#[derive(Debug, Deserialize)]
struct RaikoResponse {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    data: Option<RaikoProofData>,
}

#[derive(Debug, Deserialize)]
struct RaikoProofData {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    proof: Option<RaikoProof>,
}

#[derive(Debug, Deserialize)]
struct RaikoProof {
    #[serde(default)]
    proof: Option<String>,
}

/// Outcome of a single poll of the proof service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RaikoProofStatus {
    /// The proof is ready.
    Ready(Bytes),
    /// The proof is still being generated. Poll again later.
    Generating,
}

/// Client of a Raiko proof service.
#[derive(Debug, Clone)]
pub struct RaikoClient {
    inner: Client,
    endpoint: Url,
    jwt: Option<String>,
    timeout: Duration,
}

impl RaikoClient {
    /// Creates a new client for the service at the given endpoint.
    ///
    /// The optional JWT is sent base64-encoded as a bearer token.
    pub fn new(endpoint: Url, jwt: Option<String>, timeout: Duration) -> Self {
        Self { inner: Client::new(), endpoint, jwt, timeout }
    }

    /// Returns the service endpoint.
    pub const fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Requests a batch proof. The same request is re-sent to poll for completion.
    pub async fn request_batch_proof(
        &self,
        body: &BatchProofRequest,
    ) -> Result<RaikoProofStatus, RaikoError> {
        let url = self.endpoint.join(BATCH_PROOF_PATH)?;

        let mut req = self
            .inner
            .post(url)
            .timeout(self.timeout)
            .header(CONTENT_TYPE, "application/json")
            .json(body);
        if let Some(jwt) = self.jwt.as_ref().filter(|jwt| !jwt.is_empty()) {
            req = req.header(AUTHORIZATION, format!("Bearer {}", STANDARD.encode(jwt)));
        }

        let res = req.send().await?;
        let status = res.status();
        if status != StatusCode::OK {
            let text = res.text().await.unwrap_or_default();
            return Err(RaikoError::Status(status, text))
        }

        let output = res.json::<RaikoResponse>().await?;
        debug!(batches = ?body.batches, proof_type = %body.proof_type, ?output, "Raiko response");

        parse_response(output, &body.proof_type)
    }
}

fn parse_response(output: RaikoResponse, proof_type: &str) -> Result<RaikoProofStatus, RaikoError> {
    if output.status.as_deref() == Some("error") {
        let msg = output.message.unwrap_or_else(|| "unknown error".to_owned());
        return Err(RaikoError::Service(msg))
    }

    let Some(data) = output.data else { return Ok(RaikoProofStatus::Generating) };

    if data.status.as_deref().is_some_and(|s| GENERATING_STATUSES.contains(&s)) {
        return Ok(RaikoProofStatus::Generating)
    }

    let Some(proof) = data.proof.and_then(|p| p.proof) else {
        return Ok(RaikoProofStatus::Generating)
    };

    if proof.is_empty() {
        // The native prover doesn't produce a proof.
        if proof_type == NATIVE_PROOF_TYPE {
            return Ok(RaikoProofStatus::Ready(Bytes::new()))
        }
        return Err(RaikoError::EmptyProof)
    }

    Bytes::from_str(&proof)
        .map(RaikoProofStatus::Ready)
        .map_err(|e| RaikoError::InvalidProof(e.to_string()))
}

#[cfg(test)]
mod tests {
    use mockito::{Matcher, Server};
    use serde_json::json;

    use super::*;

    fn request(proof_type: &str) -> BatchProofRequest {
        BatchProofRequest::single(
            RaikoBatch { batch_id: 7, l1_inclusion_block_number: 100 },
            Address::repeat_byte(0x11),
            proof_type,
        )
    }

    #[tokio::test]
    async fn proof_ready() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/v3/proof/batch")
            .match_body(Matcher::PartialJson(json!({
                "batches": [{ "batch_id": 7, "l1_inclusion_block_number": 100 }],
                "prover": "1111111111111111111111111111111111111111",
                "aggregate": false,
                "proof_type": "sgx",
            })))
            .with_status(200)
            .with_body(json!({ "status": "ok", "data": { "proof": { "proof": "0xdeadbeef" } } }).to_string())
            .expect(1)
            .create_async()
            .await;

        let client =
            RaikoClient::new(Url::parse(&server.url()).unwrap(), None, Duration::from_secs(5));
        let res = client.request_batch_proof(&request("sgx")).await.unwrap();

        mock.assert_async().await;
        assert_eq!(res, RaikoProofStatus::Ready(Bytes::from_static(&[0xde, 0xad, 0xbe, 0xef])));
    }

    #[tokio::test]
    async fn proof_generating() {
        let mut server = Server::new_async().await;
        let _registered = server
            .mock("POST", "/v3/proof/batch")
            .with_status(200)
            .with_body(json!({ "status": "ok", "data": { "status": "registered" } }).to_string())
            .expect(1)
            .create_async()
            .await;

        let client =
            RaikoClient::new(Url::parse(&server.url()).unwrap(), None, Duration::from_secs(5));
        let res = client.request_batch_proof(&request("sp1")).await.unwrap();
        assert_eq!(res, RaikoProofStatus::Generating);
    }

    #[tokio::test]
    async fn service_error_and_jwt() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/v3/proof/batch")
            .match_header("authorization", format!("Bearer {}", STANDARD.encode("secret")).as_str())
            .with_status(200)
            .with_body(json!({ "status": "error", "message": "batch not found" }).to_string())
            .expect(1)
            .create_async()
            .await;

        let client = RaikoClient::new(
            Url::parse(&server.url()).unwrap(),
            Some("secret".to_owned()),
            Duration::from_secs(5),
        );
        let err = client.request_batch_proof(&request("sgx")).await.unwrap_err();

        mock.assert_async().await;
        assert!(matches!(err, RaikoError::Service(msg) if msg == "batch not found"));
    }

    #[tokio::test]
    async fn server_error_is_transient() {
        let mut server = Server::new_async().await;
        let _mock = server.mock("POST", "/v3/proof/batch").with_status(503).create_async().await;

        let client =
            RaikoClient::new(Url::parse(&server.url()).unwrap(), None, Duration::from_secs(5));
        let err = client.request_batch_proof(&request("sgx")).await.unwrap_err();
        assert!(err.is_transient());
    }

    #[test]
    fn native_proof_may_be_empty() {
        let output = RaikoResponse {
            status: Some("ok".to_owned()),
            message: None,
            data: Some(RaikoProofData {
                status: None,
                proof: Some(RaikoProof { proof: Some(String::new()) }),
            }),
        };
        assert_eq!(
            parse_response(output, NATIVE_PROOF_TYPE).unwrap(),
            RaikoProofStatus::Ready(Bytes::new())
        );

        let output = RaikoResponse {
            status: None,
            message: None,
            data: Some(RaikoProofData {
                status: None,
                proof: Some(RaikoProof { proof: Some(String::new()) }),
            }),
        };
        assert!(matches!(parse_response(output, "sgx"), Err(RaikoError::EmptyProof)));
    }
}
