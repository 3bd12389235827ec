use std::{fmt, sync::Arc, time::Duration};

use alloy::{
    providers::Provider,
    rpc::types::{Filter, Header},
};
use alloy_primitives::BlockNumber;
use async_trait::async_trait;
use surge_clients::execution::ExecutionClient;
use surge_primitives::tier::ProofTier;
use tracing::{debug, error, trace};

use crate::{PipelineError, error::with_timeout, event::ObservedEvent};

/// A source of protocol events on L1.
#[async_trait]
pub trait EventSource: Send + Sync + fmt::Debug {
    /// Returns the current L1 head number.
    async fn head(&self) -> Result<BlockNumber, PipelineError>;

    /// Returns the header of the given L1 block.
    async fn header(&self, number: BlockNumber) -> Result<Header, PipelineError>;

    /// Returns the protocol events in the inclusive block range. The order is unspecified.
    async fn events(
        &self,
        from: BlockNumber,
        to: BlockNumber,
    ) -> Result<Vec<ObservedEvent>, PipelineError>;
}

/// Receives the events replayed by an [`EventIterator`].
#[async_trait]
pub trait EventHandler: Send {
    /// Handles a single event. Returning an error stops the iteration.
    async fn handle(&mut self, event: ObservedEvent) -> Result<(), PipelineError>;

    /// Called once every event up to `height` (included) has been handled.
    async fn on_scanned(&mut self, height: BlockNumber) -> Result<(), PipelineError>;
}

/// Replays protocol events in a confirmed range of L1 blocks.
///
/// Only blocks at least `confirmations` deep are touched. Events are handed to the handler
/// in strictly increasing `(block number, log index)` order, and the iteration stops at the
/// first handler error without skipping ahead.
#[derive(Debug)]
pub struct EventIterator<S: ?Sized> {
    source: Arc<S>,
    start: BlockNumber,
    confirmations: u64,
    block_range: u64,
}

impl<S: EventSource + ?Sized> EventIterator<S> {
    /// Creates an iterator starting at `start` (included).
    pub fn new(source: Arc<S>, start: BlockNumber, confirmations: u64, block_range: u64) -> Self {
        Self { source, start, confirmations, block_range: block_range.max(1) }
    }

    /// Runs the iteration until the confirmed blocks run out.
    ///
    /// Returns the last height scanned, or `None` if there was nothing to scan.
    pub async fn run<H: EventHandler + ?Sized>(
        &self,
        handler: &mut H,
    ) -> Result<Option<BlockNumber>, PipelineError> {
        let head = self.source.head().await?;
        let Some(end) = head.checked_sub(self.confirmations) else {
            trace!(head, confirmations = self.confirmations, "No confirmed blocks yet");
            return Ok(None)
        };
        if self.start > end {
            return Ok(None)
        }

        let mut from = self.start;
        let mut last_scanned = None;
        while from <= end {
            let to = end.min(from.saturating_add(self.block_range - 1));

            let mut events = self.source.events(from, to).await?;
            events.retain(|e| (from..=to).contains(&e.block_number));
            events.sort_by_key(ObservedEvent::position);

            if !events.is_empty() {
                debug!(from, to, count = events.len(), "Handling protocol events");
            }

            for event in events {
                handler.handle(event).await?;
            }

            handler.on_scanned(to).await?;
            last_scanned = Some(to);
            from = to + 1;
        }

        Ok(last_scanned)
    }
}

/// An [`EventSource`] reading logs of the inbox through JSON-RPC.
#[derive(Debug, Clone)]
pub struct RpcEventSource {
    el: ExecutionClient,
    filter: Filter,
    min_tier: ProofTier,
    timeout: Duration,
}

impl RpcEventSource {
    /// Creates a new source with the given filter. Proposed batches get assigned `min_tier`.
    pub const fn new(
        el: ExecutionClient,
        filter: Filter,
        min_tier: ProofTier,
        timeout: Duration,
    ) -> Self {
        Self { el, filter, min_tier, timeout }
    }
}

#[async_trait]
impl EventSource for RpcEventSource {
    async fn head(&self) -> Result<BlockNumber, PipelineError> {
        with_timeout(self.timeout, self.el.get_head()).await
    }

    async fn header(&self, number: BlockNumber) -> Result<Header, PipelineError> {
        with_timeout(self.timeout, self.el.get_header(Some(number))).await
    }

    async fn events(
        &self,
        from: BlockNumber,
        to: BlockNumber,
    ) -> Result<Vec<ObservedEvent>, PipelineError> {
        let filter = self.filter.clone().from_block(from).to_block(to);
        let logs = with_timeout(self.timeout, self.el.get_logs(&filter)).await?;

        let mut events = Vec::with_capacity(logs.len());
        for log in &logs {
            match ObservedEvent::from_log(log, self.min_tier) {
                Ok(Some(event)) => events.push(event),
                Ok(None) => {}
                Err(e) => {
                    error!(tx = ?log.transaction_hash, topic0 = ?log.topic0(), ?e, "Failed to decode protocol event, skipping")
                }
            }
        }

        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use alloy_primitives::B256;

    use super::*;
    use crate::event::ProtocolEvent;

    #[derive(Debug)]
    struct ShuffledSource {
        head: BlockNumber,
        events: Vec<ObservedEvent>,
        queried: Mutex<Vec<(BlockNumber, BlockNumber)>>,
    }

    #[async_trait]
    impl EventSource for ShuffledSource {
        async fn head(&self) -> Result<BlockNumber, PipelineError> {
            Ok(self.head)
        }

        async fn header(&self, _number: BlockNumber) -> Result<Header, PipelineError> {
            Ok(Header::default())
        }

        async fn events(
            &self,
            from: BlockNumber,
            to: BlockNumber,
        ) -> Result<Vec<ObservedEvent>, PipelineError> {
            self.queried.lock().unwrap().push((from, to));
            // Returned in reverse order on purpose.
            Ok(self
                .events
                .iter()
                .filter(|e| (from..=to).contains(&e.block_number))
                .rev()
                .cloned()
                .collect())
        }
    }

    #[derive(Debug, Default)]
    struct Recorder {
        handled: Vec<(BlockNumber, u64)>,
        scanned: Vec<BlockNumber>,
        fail_at: Option<(BlockNumber, u64)>,
    }

    #[async_trait]
    impl EventHandler for Recorder {
        async fn handle(&mut self, event: ObservedEvent) -> Result<(), PipelineError> {
            if self.fail_at == Some(event.position()) {
                return Err(PipelineError::MissingL2Block(0))
            }
            self.handled.push(event.position());
            Ok(())
        }

        async fn on_scanned(&mut self, height: BlockNumber) -> Result<(), PipelineError> {
            self.scanned.push(height);
            Ok(())
        }
    }

    fn verified_at(block_number: BlockNumber, log_index: u64) -> ObservedEvent {
        ObservedEvent {
            block_number,
            log_index,
            block_timestamp: None,
            event: ProtocolEvent::BatchesVerified { batch_id: block_number, block_hash: B256::ZERO },
        }
    }

    fn source(head: BlockNumber, positions: &[(BlockNumber, u64)]) -> Arc<ShuffledSource> {
        // Scramble the insertion order.
        let mut events: Vec<_> = positions.iter().map(|(b, i)| verified_at(*b, *i)).collect();
        events.swap(0, positions.len() - 1);
        Arc::new(ShuffledSource { head, events, queried: Mutex::new(Vec::new()) })
    }

    #[tokio::test]
    async fn events_are_handled_in_order() {
        let positions = [(12, 0), (10, 2), (10, 1), (15, 0), (11, 5), (13, 1), (13, 0)];
        let source = source(30, &positions);
        let mut recorder = Recorder::default();

        let iter = EventIterator::new(Arc::clone(&source), 10, 6, 3);
        let last = iter.run(&mut recorder).await.unwrap();

        let mut expected = positions.to_vec();
        expected.sort();
        assert_eq!(recorder.handled, expected);
        assert_eq!(last, Some(24));
        assert_eq!(recorder.scanned, vec![12, 15, 18, 21, 24]);
        assert_eq!(source.queried.lock().unwrap().first(), Some(&(10, 12)));
    }

    #[tokio::test]
    async fn unconfirmed_blocks_are_not_touched() {
        let source = source(20, &[(14, 0), (15, 0), (16, 0)]);
        let mut recorder = Recorder::default();

        let iter = EventIterator::new(Arc::clone(&source), 10, 5, 100);
        iter.run(&mut recorder).await.unwrap();

        assert_eq!(recorder.handled, vec![(14, 0), (15, 0)]);
        assert_eq!(recorder.scanned, vec![15]);
    }

    #[tokio::test]
    async fn handler_error_stops_the_iteration() {
        let source = source(100, &[(10, 0), (11, 0), (12, 0), (13, 0)]);
        let mut recorder = Recorder { fail_at: Some((12, 0)), ..Default::default() };

        let iter = EventIterator::new(Arc::clone(&source), 10, 0, 1000);
        let res = iter.run(&mut recorder).await;

        assert!(res.is_err());
        assert_eq!(recorder.handled, vec![(10, 0), (11, 0)]);
        assert!(recorder.scanned.is_empty());
    }

    #[tokio::test]
    async fn empty_range_is_an_immediate_success() {
        let source = source(5, &[(1, 0)]);
        let mut recorder = Recorder::default();

        let iter = EventIterator::new(Arc::clone(&source), 10, 6, 1000);
        assert_eq!(iter.run(&mut recorder).await.unwrap(), None);
        assert!(source.queried.lock().unwrap().is_empty());
    }
}
