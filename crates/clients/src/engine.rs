use std::{borrow::Cow, time::Duration};

use alloy::{
    providers::{Provider, RootProvider},
    rpc::client::RpcClient,
    transports::{
        RpcError, TransportErrorKind, TransportResult,
        http::{Http, reqwest::Url},
    },
};
use alloy_primitives::Bytes;
use alloy_rpc_types_engine::JwtSecret;
use alloy_transport_http::{
    AuthLayer, HyperClient,
    hyper_util::{client::legacy::Client, rt::TokioExecutor},
};
use derive_more::derive::Deref;
use http_body_util::Full;
use surge_primitives::{
    pool::{PreBuiltTxList, TxPoolContentParams},
    retries::is_connection_refused,
};
use serde_json::Value;
use tokio_retry::{RetryIf, strategy::ExponentialBackoff};
use tower::ServiceBuilder;

/// The authenticated method returning pre-built transaction lists out of the L2 mempool.
const TX_POOL_CONTENT_WITH_MIN_TIP: &str = "taikoAuth_txPoolContentWithMinTip";

/// Client of the L2 execution engine's authenticated RPC, used to pull pre-built transaction
/// lists out of the L2 mempool. The inner transport uses a JWT [`AuthLayer`] to authenticate
/// requests.
#[derive(Debug, Clone, Deref)]
pub struct EngineClient {
    inner: RootProvider,
}

impl EngineClient {
    /// Creates a new [`EngineClient`] from the provided [Url] and [`JwtSecret`].
    pub fn new(url: Url, jwt: JwtSecret) -> Self {
        let hyper_client = Client::builder(TokioExecutor::new()).build_http::<Full<Bytes>>();

        let auth_layer = AuthLayer::new(jwt);
        let service = ServiceBuilder::new().layer(auth_layer).service(hyper_client);

        let layer_transport = HyperClient::<Full<Bytes>, _>::with_service(service);
        let http_hyper = Http::with_client(layer_transport, url);
        let rpc_client = RpcClient::new(http_hyper, true);
        let inner = RootProvider::new(rpc_client);

        Self { inner }
    }

    /// Returns the transaction lists the L2 mempool would put in the next blocks, one per
    /// block, filtered by the base fee and minimum tip of `params`. `None` if the mempool has
    /// nothing to offer.
    ///
    /// Refused connections and other retryable transport errors are retried with exponential
    /// backoff, capped at one second between attempts.
    ///
    /// Reference: <https://github.com/taikoxyz/taiko-geth/blob/2448fb97a8b873c7bd7c0051cd83aaea339050e0/eth/taiko_api_backend.go#L118-L147>
    pub async fn tx_pool_content_with_min_tip(
        &self,
        params: TxPoolContentParams,
    ) -> TransportResult<Option<Vec<PreBuiltTxList>>> {
        let retry_strategy =
            ExponentialBackoff::from_millis(10).max_delay(Duration::from_millis(1_000));

        let client = self.client();
        let method = Cow::Borrowed(TX_POOL_CONTENT_WITH_MIN_TIP);

        // The retry layer doesn't compose with the auth layer, so retries are handled here.
        RetryIf::spawn(
            retry_strategy,
            || async {
                client
                    .request::<Vec<Value>, Option<Vec<PreBuiltTxList>>>(
                        method.clone(),
                        params.clone().into_rpc_params(),
                    )
                    .await
            },
            |res: &RpcError<TransportErrorKind>| {
                if let RpcError::Transport(e) = res {
                    e.is_retry_err() || is_connection_refused(e)
                } else {
                    false
                }
            },
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use alloy_primitives::Address;
    use mockito::{Matcher, Server};
    use serde_json::json;

    use super::*;

    fn params() -> TxPoolContentParams {
        TxPoolContentParams {
            beneficiary: Address::repeat_byte(1),
            base_fee: 10,
            block_max_gas_limit: 240_000_000,
            max_bytes_per_tx_list: 131_072,
            local_accounts: vec![],
            max_tx_lists_per_call: 1,
            min_tip: 0,
        }
    }

    #[tokio::test]
    async fn pool_content_is_authenticated() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/")
            .match_header("authorization", Matcher::Regex("^Bearer .+".to_owned()))
            .match_body(Matcher::PartialJson(json!({
                "method": TX_POOL_CONTENT_WITH_MIN_TIP,
                "params": ["0x0101010101010101010101010101010101010101", 10, 240_000_000, 131_072, [], 1, 0],
            })))
            .with_body(
                json!({
                    "jsonrpc": "2.0",
                    "id": 0,
                    "result": [{ "TxList": [], "EstimatedGasUsed": 21000, "BytesLength": 120 }],
                })
                .to_string(),
            )
            .expect(1)
            .create_async()
            .await;

        let client = EngineClient::new(Url::parse(&server.url()).unwrap(), JwtSecret::random());
        let lists = client.tx_pool_content_with_min_tip(params()).await.unwrap().unwrap();

        mock.assert_async().await;
        assert_eq!(lists.len(), 1);
        assert_eq!(lists[0].estimated_gas_used, 21000);
        assert_eq!(lists[0].bytes_length, 120);
    }

    #[tokio::test]
    async fn empty_pool_is_none() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/")
            .with_body(json!({ "jsonrpc": "2.0", "id": 0, "result": null }).to_string())
            .create_async()
            .await;

        let client = EngineClient::new(Url::parse(&server.url()).unwrap(), JwtSecret::random());
        assert!(client.tx_pool_content_with_min_tip(params()).await.unwrap().is_none());
    }
}
