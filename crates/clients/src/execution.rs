use std::time::Duration;

use alloy::{
    providers::{Provider, ProviderBuilder, WsConnect},
    rpc::{
        client::{ClientBuilder, RpcClient},
        types::{BlockNumberOrTag, Filter, Header, Log, SyncStatus, Transaction},
    },
    transports::{TransportErrorKind, TransportResult},
};
use alloy_primitives::{B256, Bytes};
use alloy_rpc_types_trace::geth::{
    CallConfig, CallFrame, GethDebugBuiltInTracerType, GethDebugTracerType, GethDebugTracingOptions,
};
use alloy_sol_types::SolInterface;
use derive_more::derive::Deref;
use surge_chainio::DefaultProvider;
use surge_primitives::retries::DEFAULT_RETRY_LAYER;
use tokio::{sync::mpsc, time::sleep};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, error, warn};
use url::Url;

/// An HTTP-based JSON-RPC execution client, with a WebSocket connection for subscriptions.
///
/// Dereferences to an alloy provider, so every standard `eth_` method is available.
#[derive(Clone, Debug, Deref)]
pub struct ExecutionClient {
    /// The raw RPC client, used for methods the provider doesn't expose.
    rpc: RpcClient,
    /// The inner provider that implements all the JSON-RPC methods.
    #[deref]
    inner: DefaultProvider,
    /// Provider over the WebSocket endpoint, used for subscriptions.
    ws_provider: Option<DefaultProvider>,
}

impl ExecutionClient {
    /// Create a new [`ExecutionClient`] with the given HTTP URL, and an optional WS URL for
    /// subscriptions.
    pub async fn new<U: Into<Url>>(http_url: U, ws_url: Option<U>) -> TransportResult<Self> {
        let rpc = ClientBuilder::default().layer(DEFAULT_RETRY_LAYER).http(http_url.into());
        let inner = ProviderBuilder::new().connect_client(rpc.clone());

        let ws_provider = match ws_url {
            Some(ws_url) => {
                let ws_client = ClientBuilder::default()
                    .layer(DEFAULT_RETRY_LAYER)
                    .ws(WsConnect::new(ws_url.into()))
                    .await?;
                Some(ProviderBuilder::new().connect_client(ws_client))
            }
            None => None,
        };

        Ok(Self { rpc, inner, ws_provider })
    }

    /// Returns the number of the latest block.
    pub async fn get_head(&self) -> TransportResult<u64> {
        self.get_block_number().await
    }

    /// Get the header of the block with the given number. If `None`, the latest block is returned.
    pub async fn get_header(&self, block_number: Option<u64>) -> TransportResult<Header> {
        let tag = block_number.map_or(BlockNumberOrTag::Latest, BlockNumberOrTag::Number);

        let block: Option<Header> = self.rpc.request("eth_getHeaderByNumber", vec![tag]).await?;
        block.ok_or_else(|| TransportErrorKind::custom_str(&format!("Header not found: {tag}")))
    }

    /// Returns the hash of the block with the given number.
    pub async fn block_hash(&self, block_number: u64) -> TransportResult<B256> {
        Ok(self.get_header(Some(block_number)).await?.hash)
    }

    /// Check if the client is synced. Returns `true` if the client is synced.
    pub async fn is_synced(&self) -> TransportResult<bool> {
        let status = self.syncing().await?;
        Ok(matches!(status, SyncStatus::None))
    }

    /// Returns the base fee of the latest block, as the last entry of a one-block fee history.
    pub async fn l1_base_fee(&self) -> TransportResult<u128> {
        let history = self.get_fee_history(1, BlockNumberOrTag::Latest, &[]).await?;
        history
            .base_fee_per_gas
            .last()
            .copied()
            .ok_or_else(|| TransportErrorKind::custom_str("empty fee history"))
    }

    /// Returns the current blob base fee.
    pub async fn blob_base_fee(&self) -> TransportResult<u128> {
        self.get_blob_base_fee().await
    }

    /// Returns the transaction `hash` if it is still waiting in the mempool.
    pub async fn pending_transaction(&self, hash: B256) -> TransportResult<Option<Transaction>> {
        let tx = self.get_transaction_by_hash(hash).await?;
        Ok(tx.filter(|tx| tx.block_number.is_none()))
    }

    /// Streams the logs matching `filter` over the WebSocket endpoint.
    ///
    /// A background task keeps the subscription alive, resubscribing after
    /// [`RESUBSCRIBE_DELAY`] whenever it drops. Without a WebSocket endpoint the stream stays
    /// pending forever, and callers fall back to polling.
    pub fn subscribe_events(&self, filter: Filter) -> ReceiverStream<Log> {
        let (tx, rx) = mpsc::channel(LOG_CHANNEL_CAPACITY);

        match self.ws_provider.clone() {
            Some(ws) => {
                tokio::spawn(forward_logs(ws, filter, tx));
            }
            None => {
                warn!("No L1 WebSocket endpoint, log subscription disabled");
                tokio::spawn(async move { tx.closed().await });
            }
        }

        ReceiverStream::new(rx)
    }

    /// Streams the hashes of transactions entering the mempool, over the WebSocket endpoint.
    ///
    /// Resubscribes like [`Self::subscribe_events`]. Without a WebSocket endpoint the stream
    /// stays pending forever.
    pub fn subscribe_pending_transactions(&self) -> ReceiverStream<B256> {
        let (tx, rx) = mpsc::channel(PENDING_TX_CHANNEL_CAPACITY);

        match self.ws_provider.clone() {
            Some(ws) => {
                tokio::spawn(forward_pending_transactions(ws, tx));
            }
            None => {
                warn!("No L1 WebSocket endpoint, mempool subscription disabled");
                tokio::spawn(async move { tx.closed().await });
            }
        }

        ReceiverStream::new(rx)
    }

    /// Traces the top call of a mined transaction with `debug_traceTransaction`, and returns
    /// why it reverted.
    pub async fn debug_revert_reason(&self, tx_hash: B256) -> TransportResult<RevertTrace> {
        let opts = GethDebugTracingOptions::default()
            .with_tracer(GethDebugTracerType::BuiltInTracer(GethDebugBuiltInTracerType::CallTracer))
            .with_config(CallConfig::default().only_top_call());

        let frame: CallFrame = self.rpc.request("debug_traceTransaction", (tx_hash, opts)).await?;
        Ok(RevertTrace::from(frame))
    }
}

/// Capacity of the channel between a subscription task and its stream.
const LOG_CHANNEL_CAPACITY: usize = 64;

/// Capacity of the channel between the mempool subscription task and its stream.
const PENDING_TX_CHANNEL_CAPACITY: usize = 1024;

/// Delay before resubscribing after a subscription failed or closed.
const RESUBSCRIBE_DELAY: Duration = Duration::from_secs(2);

/// Forwards subscribed logs to `tx` until the receiving stream is dropped.
async fn forward_logs(ws: DefaultProvider, filter: Filter, tx: mpsc::Sender<Log>) {
    loop {
        match ws.subscribe_logs(&filter).await {
            Ok(mut sub) => {
                debug!(address = ?filter.address, "🔔 Subscribed to L1 logs");
                while let Ok(log) = sub.recv().await {
                    if tx.send(log).await.is_err() {
                        debug!("Log stream dropped, unsubscribing");
                        return
                    }
                }
                warn!("L1 log subscription closed, resubscribing");
            }
            Err(e) => error!(error = %e, "Failed to subscribe to L1 logs"),
        }

        if tx.is_closed() {
            return
        }
        sleep(RESUBSCRIBE_DELAY).await;
    }
}

/// Forwards the hashes of new pending transactions to `tx` until the receiving stream is
/// dropped.
async fn forward_pending_transactions(ws: DefaultProvider, tx: mpsc::Sender<B256>) {
    loop {
        match ws.subscribe_pending_transactions().await {
            Ok(mut sub) => {
                debug!("🔔 Subscribed to L1 pending transactions");
                while let Ok(hash) = sub.recv().await {
                    if tx.send(hash).await.is_err() {
                        debug!("Pending transaction stream dropped, unsubscribing");
                        return
                    }
                }
                warn!("L1 pending transaction subscription closed, resubscribing");
            }
            Err(e) => error!(error = %e, "Failed to subscribe to L1 pending transactions"),
        }

        if tx.is_closed() {
            return
        }
        sleep(RESUBSCRIBE_DELAY).await;
    }
}

/// What a reverted call left behind, according to a call trace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RevertTrace {
    /// A decoded revert string.
    Reason(String),
    /// Raw return data, usually an encoded custom error.
    Output(Bytes),
    /// The trace carries neither.
    Empty,
}

impl From<CallFrame> for RevertTrace {
    fn from(frame: CallFrame) -> Self {
        match (frame.revert_reason, frame.output) {
            (Some(reason), _) => Self::Reason(reason),
            (None, Some(output)) => Self::Output(output),
            (None, None) => Self::Empty,
        }
    }
}

impl RevertTrace {
    /// Renders the revert, decoding raw output as an error of the interface `I`.
    pub fn try_decode<I: SolInterface + std::fmt::Debug>(self) -> String {
        match self {
            Self::Reason(reason) => reason,
            Self::Output(bytes) => I::abi_decode(&bytes)
                .map_or_else(|_| format!("unknown selector: {bytes}"), |err| format!("{err:?}")),
            Self::Empty => "unknown".to_owned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use mockito::{Matcher, Server};
    use serde_json::json;
    use surge_chainio::taiko::inbox::ITaikoInbox::{self, ITaikoInboxErrors};

    use super::*;

    #[test]
    fn revert_reason_decoding() {
        let reason = RevertTrace::Reason("out of gas".to_owned());
        assert_eq!(reason.try_decode::<ITaikoInboxErrors>(), "out of gas");

        let err = ITaikoInboxErrors::BatchVerified(ITaikoInbox::BatchVerified {});
        let reason = RevertTrace::Output(err.abi_encode().into());
        assert!(reason.try_decode::<ITaikoInboxErrors>().contains("BatchVerified"));

        let reason = RevertTrace::Output(Bytes::from_static(&[0xde, 0xad]));
        assert!(reason.try_decode::<ITaikoInboxErrors>().starts_with("unknown selector"));

        assert_eq!(RevertTrace::Empty.try_decode::<ITaikoInboxErrors>(), "unknown");
    }

    #[tokio::test]
    async fn revert_reason_from_call_trace() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/")
            .match_body(Matcher::PartialJson(json!({ "method": "debug_traceTransaction" })))
            .with_body(
                json!({
                    "jsonrpc": "2.0",
                    "id": 0,
                    "result": {
                        "type": "CALL",
                        "from": "0x0101010101010101010101010101010101010101",
                        "to": "0x1b1b1b1b1b1b1b1b1b1b1b1b1b1b1b1b1b1b1b1b",
                        "gas": "0x5208",
                        "gasUsed": "0x5208",
                        "input": "0x",
                        "error": "execution reverted",
                        "revertReason": "proof too old",
                    },
                })
                .to_string(),
            )
            .expect(1)
            .create_async()
            .await;

        let client = ExecutionClient::new(Url::parse(&server.url()).unwrap(), None).await.unwrap();
        let trace = client.debug_revert_reason(B256::repeat_byte(0xaf)).await.unwrap();

        mock.assert_async().await;
        assert_eq!(trace, RevertTrace::Reason("proof too old".to_owned()));
    }
}
