use std::{
    collections::HashSet,
    mem,
    sync::{
        Arc, Mutex, PoisonError,
        atomic::{AtomicBool, Ordering},
    },
};

use alloy::rpc::types::Log;
use alloy_primitives::B256;
use tokio_stream::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::reader::ProposerReader;

/// L1 activity that calls for a proposal whether or not the mempool makes one profitable.
///
/// A `SignalSent` event, or a `Bridge.sendMessage` transaction seen in the L1 mempool, forces
/// the next tick to propose. The request holds until a proposal lands.
#[derive(Debug, Default)]
pub struct ForceTriggers {
    forced: AtomicBool,
    bridge_messages: Mutex<HashSet<B256>>,
}

impl ForceTriggers {
    /// Requests a forced proposal.
    pub fn force(&self) {
        self.forced.store(true, Ordering::Release);
    }

    /// Records a pending bridge message. Returns false if it was already recorded.
    pub fn record_bridge_message(&self, hash: B256) -> bool {
        self.bridge_messages.lock().unwrap_or_else(PoisonError::into_inner).insert(hash)
    }

    /// Returns true if the bridge message `hash` is already recorded.
    pub fn knows_bridge_message(&self, hash: &B256) -> bool {
        self.bridge_messages.lock().unwrap_or_else(PoisonError::into_inner).contains(hash)
    }

    /// Returns true if the next proposal is forced. Recorded bridge messages are consumed
    /// and turned into a forced proposal.
    pub fn is_forced(&self) -> bool {
        let messages =
            mem::take(&mut *self.bridge_messages.lock().unwrap_or_else(PoisonError::into_inner));
        if !messages.is_empty() {
            info!(count = messages.len(), "🌉 Pending bridge messages, forcing a proposal");
            self.force();
        }

        self.forced.load(Ordering::Acquire)
    }

    /// Clears the forced proposal request, once a proposal landed.
    pub fn clear(&self) {
        self.forced.store(false, Ordering::Release);
    }
}

/// Forces a proposal on every `SignalSent` log, until the stream ends or the token fires.
pub async fn watch_signals<S>(mut signals: S, triggers: Arc<ForceTriggers>, token: CancellationToken)
where
    S: Stream<Item = Log> + Unpin,
{
    loop {
        tokio::select! {
            biased;

            _ = token.cancelled() => return,

            log = signals.next() => {
                let Some(log) = log else {
                    warn!("Signal stream closed");
                    return
                };
                info!(tx_hash = ?log.transaction_hash, block = ?log.block_number, "📡 SignalSent event received");
                triggers.force();
            }
        }
    }
}

/// Records the bridge messages among the pending L1 transactions, until the stream ends or
/// the token fires.
pub async fn watch_bridge_messages<S>(
    mut pending: S,
    reader: Arc<dyn ProposerReader>,
    triggers: Arc<ForceTriggers>,
    token: CancellationToken,
) where
    S: Stream<Item = B256> + Unpin,
{
    loop {
        tokio::select! {
            biased;

            _ = token.cancelled() => return,

            hash = pending.next() => {
                let Some(hash) = hash else {
                    warn!("Pending transaction stream closed");
                    return
                };
                if triggers.knows_bridge_message(&hash) {
                    continue
                }

                match reader.is_pending_bridge_message(hash).await {
                    Ok(true) => {
                        info!(%hash, "New bridge message detected in the L1 mempool");
                        triggers.record_bridge_message(hash);
                    }
                    Ok(false) => {}
                    Err(e) => debug!(%hash, error = %e, "Failed to inspect pending transaction"),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::MockReader;

    #[test]
    fn bridge_messages_force_once() {
        let triggers = ForceTriggers::default();
        assert!(!triggers.is_forced());

        assert!(triggers.record_bridge_message(B256::repeat_byte(1)));
        assert!(!triggers.record_bridge_message(B256::repeat_byte(1)));
        assert!(triggers.is_forced());
        assert!(!triggers.knows_bridge_message(&B256::repeat_byte(1)));

        // Still forced until a proposal lands.
        assert!(triggers.is_forced());
        triggers.clear();
        assert!(!triggers.is_forced());
    }

    #[tokio::test]
    async fn signals_force_a_proposal() {
        let triggers = Arc::new(ForceTriggers::default());
        let signals = tokio_stream::iter(vec![Log::default()]);

        watch_signals(signals, triggers.clone(), CancellationToken::new()).await;
        assert!(triggers.is_forced());
    }

    #[tokio::test]
    async fn only_bridge_messages_are_recorded() {
        let reader = MockReader::default();
        reader.bridge_messages.lock().unwrap().insert(B256::repeat_byte(0xb1));
        let triggers = Arc::new(ForceTriggers::default());
        let pending = tokio_stream::iter(vec![B256::repeat_byte(0x01), B256::repeat_byte(0xb1)]);

        watch_bridge_messages(pending, Arc::new(reader), triggers.clone(), CancellationToken::new())
            .await;

        assert!(triggers.knows_bridge_message(&B256::repeat_byte(0xb1)));
        assert!(!triggers.knows_bridge_message(&B256::repeat_byte(0x01)));
    }

    #[tokio::test]
    async fn watchers_stop_on_cancellation() {
        let triggers = Arc::new(ForceTriggers::default());
        let token = CancellationToken::new();
        token.cancel();

        watch_signals(tokio_stream::pending::<Log>(), triggers.clone(), token).await;
        assert!(!triggers.is_forced());
    }
}
