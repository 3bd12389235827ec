use std::{
    fmt,
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};

use alloy_primitives::{Bytes, hex};
use base64::{Engine, engine::general_purpose::STANDARD};
use reqwest::{
    Client,
    header::{AUTHORIZATION, CONTENT_TYPE},
};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Value, json};
use tracing::{debug, trace};
use url::Url;

/// Largest payload published as a single Celestia blob.
pub const ADVISABLE_CELESTIA_BLOB_SIZE: usize = 500_000;

/// Minimum balance, in `utia`, the account needs to pay for blob submissions.
pub const MIN_CELESTIA_BALANCE: u128 = 200_000;

/// Size of a Celestia namespace: one version byte plus a 28 byte ID.
pub const NAMESPACE_SIZE: usize = 29;

/// Number of trailing ID bytes a user can set in a version 0 namespace.
const NAMESPACE_V0_USER_ID_SIZE: usize = 10;

/// Errors that can occur when interacting with a Celestia node.
#[derive(Debug, thiserror::Error)]
#[allow(missing_docs)]
pub enum CelestiaError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("JSON-RPC error {code}: {message}")]
    Rpc { code: i64, message: String },
    #[error("empty JSON-RPC response for {0}")]
    EmptyResponse(&'static str),
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("invalid namespace: {0}")]
    InvalidNamespace(String),
    #[error("invalid base64 in blob: {0}")]
    Base64(#[from] base64::DecodeError),
}

/// A version 0 Celestia namespace.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Namespace([u8; NAMESPACE_SIZE]);

impl Namespace {
    /// Creates a namespace from raw bytes.
    ///
    /// Accepts either a full 29 byte namespace, or a user ID of at most 10 bytes which is
    /// left-padded into a version 0 namespace.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CelestiaError> {
        let mut ns = [0u8; NAMESPACE_SIZE];
        match bytes.len() {
            NAMESPACE_SIZE => {
                if bytes[0] != 0 {
                    return Err(CelestiaError::InvalidNamespace(format!(
                        "unsupported version {}",
                        bytes[0]
                    )))
                }
                ns.copy_from_slice(bytes);
            }
            1..=NAMESPACE_V0_USER_ID_SIZE => {
                ns[NAMESPACE_SIZE - bytes.len()..].copy_from_slice(bytes);
            }
            len => {
                return Err(CelestiaError::InvalidNamespace(format!("invalid length {len}")))
            }
        }
        Ok(Self(ns))
    }

    /// Parses a hex encoded namespace, with or without `0x` prefix.
    pub fn from_hex(s: &str) -> Result<Self, CelestiaError> {
        let bytes = hex::decode(s).map_err(|e| CelestiaError::InvalidNamespace(e.to_string()))?;
        Self::from_bytes(&bytes)
    }

    /// Returns the raw namespace bytes.
    pub const fn as_bytes(&self) -> &[u8; NAMESPACE_SIZE] {
        &self.0
    }
}

impl fmt::Debug for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Namespace({})", hex::encode(self.0))
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

/// A blob as encoded by the Celestia node API. Byte fields are base64 encoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CelestiaBlob {
    /// The blob namespace.
    pub namespace: String,
    /// The blob data.
    pub data: String,
    /// The share version.
    pub share_version: u8,
    /// The blob commitment. Left empty on submission, the node computes it.
    #[serde(default)]
    pub commitment: String,
    /// Index of the blob in the square, `-1` if unknown.
    #[serde(default = "default_index")]
    pub index: i64,
}

const fn default_index() -> i64 {
    -1
}

impl CelestiaBlob {
    /// Creates a version 0 blob for the given data.
    pub fn new(namespace: &Namespace, data: &[u8]) -> Self {
        Self {
            namespace: STANDARD.encode(namespace.as_bytes()),
            data: STANDARD.encode(data),
            share_version: 0,
            commitment: String::new(),
            index: -1,
        }
    }

    /// Decodes the blob data.
    pub fn decode_data(&self) -> Result<Bytes, CelestiaError> {
        Ok(STANDARD.decode(&self.data)?.into())
    }
}

/// The account balance reported by the node.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CelestiaBalance {
    /// The amount, as a decimal string.
    pub amount: String,
    /// The denomination, usually `utia`.
    pub denom: String,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

/// JSON-RPC client of a Celestia light or bridge node.
#[derive(Debug)]
pub struct CelestiaClient {
    inner: Client,
    endpoint: Url,
    auth_token: String,
    namespace: Namespace,
    timeout: Duration,
    next_id: AtomicU64,
}

impl CelestiaClient {
    /// Creates a new client. Requests are authenticated with the given token.
    pub fn new(endpoint: Url, auth_token: String, namespace: Namespace, timeout: Duration) -> Self {
        Self { inner: Client::new(), endpoint, auth_token, namespace, timeout, next_id: AtomicU64::new(1) }
    }

    /// Returns the namespace blobs are published to.
    pub const fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    async fn request<T: DeserializeOwned>(
        &self,
        method: &'static str,
        params: Value,
    ) -> Result<Option<T>, CelestiaError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({ "jsonrpc": "2.0", "id": id, "method": method, "params": params });
        trace!(%method, id, "Celestia request");

        let res = self
            .inner
            .post(self.endpoint.clone())
            .timeout(self.timeout)
            .header(CONTENT_TYPE, "application/json")
            .header(AUTHORIZATION, format!("Bearer {}", self.auth_token))
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json::<RpcResponse<T>>()
            .await?;

        if let Some(err) = res.error {
            return Err(CelestiaError::Rpc { code: err.code, message: err.message })
        }
        Ok(res.result)
    }

    /// Fetches the network head, used to check the node is reachable.
    pub async fn network_head(&self) -> Result<Value, CelestiaError> {
        self.request("header.NetworkHead", json!([]))
            .await?
            .ok_or(CelestiaError::EmptyResponse("header.NetworkHead"))
    }

    /// Returns the balance of the node account.
    pub async fn balance(&self) -> Result<CelestiaBalance, CelestiaError> {
        self.request("state.Balance", json!([]))
            .await?
            .ok_or(CelestiaError::EmptyResponse("state.Balance"))
    }

    /// Returns true if the node account can pay for blob submissions.
    pub async fn has_sufficient_balance(&self) -> Result<bool, CelestiaError> {
        let balance = self.balance().await?;
        let amount = balance.amount.parse::<u128>().unwrap_or_default();
        Ok(amount > MIN_CELESTIA_BALANCE)
    }

    /// Submits the data as a single blob in the client namespace. Returns the Celestia height
    /// at which it was included.
    pub async fn submit(&self, data: &[u8]) -> Result<u64, CelestiaError> {
        let blob = CelestiaBlob::new(&self.namespace, data);
        let options = json!({ "gas_price": -1.0, "is_gas_price_set": false });

        let height = self
            .request("blob.Submit", json!([[blob], options]))
            .await?
            .ok_or(CelestiaError::EmptyResponse("blob.Submit"))?;
        debug!(height, size = data.len(), namespace = %self.namespace, "Blob submitted to Celestia");

        Ok(height)
    }

    /// Returns every blob in the namespace at the given height, in square order.
    pub async fn get_all(
        &self,
        height: u64,
        namespace: &Namespace,
    ) -> Result<Vec<CelestiaBlob>, CelestiaError> {
        let ns = STANDARD.encode(namespace.as_bytes());
        Ok(self.request("blob.GetAll", json!([height, [ns]])).await?.unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use mockito::{Matcher, Server};

    use super::*;

    fn client(url: &str) -> CelestiaClient {
        CelestiaClient::new(
            Url::parse(url).unwrap(),
            "token".to_owned(),
            Namespace::from_hex("0x0102030405").unwrap(),
            Duration::from_secs(5),
        )
    }

    #[test]
    fn namespace_padding() {
        let ns = Namespace::from_hex("0102").unwrap();
        assert_eq!(ns.as_bytes()[..27], [0u8; 27]);
        assert_eq!(ns.as_bytes()[27..], [1, 2]);

        let full = [0u8; NAMESPACE_SIZE];
        assert!(Namespace::from_bytes(&full).is_ok());

        let mut v1 = [0u8; NAMESPACE_SIZE];
        v1[0] = 1;
        assert!(Namespace::from_bytes(&v1).is_err());
        assert!(Namespace::from_bytes(&[0u8; 11]).is_err());
        assert!(Namespace::from_bytes(&[]).is_err());
    }

    #[tokio::test]
    async fn submit_returns_height() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/")
            .match_header("authorization", "Bearer token")
            .match_body(Matcher::PartialJson(json!({ "method": "blob.Submit" })))
            .with_status(200)
            .with_body(json!({ "jsonrpc": "2.0", "id": 1, "result": 4242 }).to_string())
            .expect(1)
            .create_async()
            .await;

        let height = client(&server.url()).submit(b"hello").await.unwrap();

        mock.assert_async().await;
        assert_eq!(height, 4242);
    }

    #[tokio::test]
    async fn get_all_decodes_blobs() {
        let mut server = Server::new_async().await;
        let ns = Namespace::from_hex("0102030405").unwrap();
        let blob = CelestiaBlob::new(&ns, b"payload");
        let _mock = server
            .mock("POST", "/")
            .match_body(Matcher::PartialJson(json!({ "method": "blob.GetAll" })))
            .with_status(200)
            .with_body(json!({ "jsonrpc": "2.0", "id": 1, "result": [blob] }).to_string())
            .create_async()
            .await;

        let blobs = client(&server.url()).get_all(10, &ns).await.unwrap();
        assert_eq!(blobs.len(), 1);
        assert_eq!(blobs[0].decode_data().unwrap(), Bytes::from_static(b"payload"));
    }

    #[tokio::test]
    async fn get_all_empty_and_rpc_error() {
        let mut server = Server::new_async().await;
        let _empty = server
            .mock("POST", "/")
            .match_body(Matcher::PartialJson(json!({ "method": "blob.GetAll" })))
            .with_status(200)
            .with_body(json!({ "jsonrpc": "2.0", "id": 1, "result": null }).to_string())
            .create_async()
            .await;
        let _err = server
            .mock("POST", "/")
            .match_body(Matcher::PartialJson(json!({ "method": "state.Balance" })))
            .with_status(200)
            .with_body(
                json!({ "jsonrpc": "2.0", "id": 1, "error": { "code": -1, "message": "unauthorized" } })
                    .to_string(),
            )
            .create_async()
            .await;

        let client = client(&server.url());
        let ns = client.namespace().clone();
        assert!(client.get_all(10, &ns).await.unwrap().is_empty());

        let err = client.balance().await.unwrap_err();
        assert!(matches!(err, CelestiaError::Rpc { code: -1, .. }));
    }

    #[tokio::test]
    async fn balance_threshold() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/")
            .with_status(200)
            .with_body(
                json!({ "jsonrpc": "2.0", "id": 1, "result": { "amount": "200001", "denom": "utia" } })
                    .to_string(),
            )
            .create_async()
            .await;

        assert!(client(&server.url()).has_sufficient_balance().await.unwrap());
    }
}
