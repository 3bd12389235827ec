//! Process-wide cursor state shared between the prover components.
//!
//! There is a single writer (the event dispatcher), and many readers. Every field is
//! independently owned: readers observe either the old or the new value of a field, never a
//! partially written one.

use std::sync::{
    PoisonError, RwLock,
    atomic::{AtomicU64, Ordering},
};

use alloy::rpc::types::Header;
use alloy_primitives::BlockNumber;

use crate::batch::BatchId;

/// A closed range of batch IDs invalidated by a rollback on L1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RollbackRange {
    /// First rolled back batch ID (inclusive).
    pub start: BatchId,
    /// Last rolled back batch ID (inclusive).
    pub end: BatchId,
    /// The L1 block in which the rollback was observed.
    pub observed_in: BlockNumber,
}

impl RollbackRange {
    /// Returns true if the batch ID falls within this range.
    pub const fn contains(&self, batch_id: BatchId) -> bool {
        self.start <= batch_id && batch_id <= self.end
    }
}

/// Shared cursor state.
#[derive(Debug, Default)]
pub struct SharedCursorState {
    last_handled_batch_id: AtomicU64,
    l1_current: RwLock<Option<Header>>,
    rollbacked_ranges: RwLock<Vec<RollbackRange>>,
}

impl SharedCursorState {
    /// Creates a new cursor state starting at the given batch ID.
    pub fn new(last_handled_batch_id: BatchId) -> Self {
        Self { last_handled_batch_id: AtomicU64::new(last_handled_batch_id), ..Default::default() }
    }

    /// Returns the last handled batch ID.
    pub fn last_handled_batch_id(&self) -> BatchId {
        self.last_handled_batch_id.load(Ordering::Acquire)
    }

    /// Overwrites the last handled batch ID. Only meant to be used on startup.
    pub fn set_last_handled_batch_id(&self, batch_id: BatchId) {
        self.last_handled_batch_id.store(batch_id, Ordering::Release);
    }

    /// Moves the last handled batch ID forward. Lower values are ignored.
    pub fn advance_last_handled(&self, batch_id: BatchId) {
        self.last_handled_batch_id.fetch_max(batch_id, Ordering::AcqRel);
    }

    /// Returns true if the batch ID has not been handled yet.
    pub fn should_handle(&self, batch_id: BatchId) -> bool {
        batch_id > self.last_handled_batch_id()
    }

    /// Returns the current L1 cursor header, if set.
    pub fn l1_current(&self) -> Option<Header> {
        self.l1_current.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Returns the current L1 cursor height, or zero if not set.
    pub fn l1_current_number(&self) -> BlockNumber {
        self.l1_current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map_or(0, |h| h.number)
    }

    /// Sets the current L1 cursor header.
    pub fn set_l1_current(&self, header: Header) {
        *self.l1_current.write().unwrap_or_else(PoisonError::into_inner) = Some(header);
    }

    /// Returns a snapshot of the recorded rollback ranges, ordered by start.
    pub fn rollbacked_ranges(&self) -> Vec<RollbackRange> {
        self.rollbacked_ranges.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Records a rollback range, and rewinds the last handled batch ID so that `start` is
    /// handled again. A range past the last handled batch ID leaves the counter untouched.
    ///
    /// Every range keeps its own observation height. Ranges observed in the same block are
    /// merged when they overlap or touch, and a range covered by another one observed at the
    /// same height or later is dropped.
    pub fn record_rollback(&self, start: BatchId, end: BatchId, observed_in: BlockNumber) {
        let (start, end) = if start <= end { (start, end) } else { (end, start) };
        let mut new = RollbackRange { start, end, observed_in };

        {
            let mut ranges =
                self.rollbacked_ranges.write().unwrap_or_else(PoisonError::into_inner);

            let covered = ranges.iter().any(|r| {
                r.start <= new.start && new.end <= r.end && new.observed_in <= r.observed_in
            });
            if !covered {
                ranges.retain(|r| {
                    let touches = r.start <= new.end.saturating_add(1) &&
                        new.start <= r.end.saturating_add(1);
                    if touches && r.observed_in == new.observed_in {
                        new.start = new.start.min(r.start);
                        new.end = new.end.max(r.end);
                        return false
                    }
                    let dominated = new.start <= r.start &&
                        r.end <= new.end &&
                        r.observed_in <= new.observed_in;
                    !dominated
                });
                let pos = ranges.partition_point(|r| {
                    (r.start, r.observed_in) < (new.start, new.observed_in)
                });
                ranges.insert(pos, new);
            }
        }

        self.last_handled_batch_id.fetch_min(start.saturating_sub(1), Ordering::AcqRel);
    }

    /// Returns true if a proposal of `batch_id` made in L1 block `proposed_in` was invalidated
    /// by a rollback observed afterwards.
    pub fn is_rolled_back(&self, batch_id: BatchId, proposed_in: BlockNumber) -> bool {
        self.rollbacked_ranges
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .any(|r| r.contains(batch_id) && proposed_in < r.observed_in)
    }
}
