//! Per-book synchronization state machine
//!
//! Protocol, per (exchange, pair, asset) key:
//! 1. Buffer incoming diffs while no snapshot exists, requesting a REST
//!    snapshot fetch once
//! 2. When the snapshot (cursor `S`) lands, discard buffered diffs with
//!    `final_update_id <= S`
//! 3. The first surviving diff must satisfy
//!    `first_update_id <= S + 1 <= final_update_id`; otherwise the
//!    snapshot is stale relative to the buffer and must be refetched
//! 4. Apply survivors in ascending `final_update_id` order, then apply
//!    live diffs directly; a sequence gap re-enters buffering
//!
//! The machine is synchronous and holds no locks; callers own the wiring
//! to [`fathom_book::Depth`].

use fathom_types::{DepthError, DepthResult, Update};
use std::collections::VecDeque;

/// Most diffs buffered per key while a snapshot fetch is in flight; the
/// oldest is dropped on overflow since it would be superseded anyway.
pub const MAX_BUFFERED_UPDATES: usize = 1024;

/// Synchronization state for one book.
#[derive(Debug)]
enum SyncState {
    /// Buffering diffs until a snapshot lands
    AwaitingSnapshot {
        buffer: VecDeque<Update>,
        fetch_requested: bool,
    },
    /// Applying diffs as they arrive
    Synced { last_update_id: i64 },
}

/// What the caller should do with an incoming diff.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncAction {
    /// Sequence-valid: apply this diff to the book now
    Apply(Update),
    /// Held back until a snapshot lands
    Buffered,
    /// Held back, and a snapshot fetch should be started
    SnapshotNeeded,
    /// A gap broke continuity: applied state is untrustworthy, a fresh
    /// snapshot fetch should be started
    GapDetected,
    /// Stale duplicate of already-applied events; ignored
    Dropped,
}

/// Result of folding a snapshot into the machine.
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotOutcome {
    /// Buffered diffs that survived the snapshot, in apply order
    pub updates: Vec<Update>,
    /// Cursor after the snapshot and survivors are applied
    pub last_update_id: i64,
    /// Buffered diffs discarded as already covered by the snapshot
    pub dropped: usize,
}

/// The per-key state machine.
#[derive(Debug)]
pub struct Synchronizer {
    state: SyncState,
    resyncs: u64,
}

impl Synchronizer {
    /// Start awaiting the first diff or snapshot
    pub fn new() -> Self {
        Self {
            state: SyncState::AwaitingSnapshot {
                buffer: VecDeque::new(),
                fetch_requested: false,
            },
            resyncs: 0,
        }
    }

    /// True once a snapshot has landed and continuity holds
    pub fn is_synced(&self) -> bool {
        matches!(self.state, SyncState::Synced { .. })
    }

    /// Cursor of the newest applied event, when synced
    pub fn last_update_id(&self) -> Option<i64> {
        match self.state {
            SyncState::Synced { last_update_id } => Some(last_update_id),
            SyncState::AwaitingSnapshot { .. } => None,
        }
    }

    /// How many times this book fell back to buffering after being synced.
    /// Gaps self-heal, but a climbing counter means reconnect storms.
    pub fn resync_count(&self) -> u64 {
        self.resyncs
    }

    /// Feed one incoming diff through the machine.
    pub fn on_update(&mut self, update: Update) -> SyncAction {
        match &mut self.state {
            SyncState::AwaitingSnapshot {
                buffer,
                fetch_requested,
            } => {
                if buffer.len() >= MAX_BUFFERED_UPDATES {
                    tracing::warn!(
                        capacity = MAX_BUFFERED_UPDATES,
                        "update buffer overflow, dropping oldest"
                    );
                    buffer.pop_front();
                }
                buffer.push_back(update);
                if *fetch_requested {
                    SyncAction::Buffered
                } else {
                    *fetch_requested = true;
                    SyncAction::SnapshotNeeded
                }
            }
            SyncState::Synced { last_update_id } => {
                let last = *last_update_id;
                if update.final_update_id <= last {
                    return SyncAction::Dropped;
                }
                if update.first_update_id <= last + 1 {
                    *last_update_id = update.final_update_id;
                    return SyncAction::Apply(update);
                }

                tracing::warn!(
                    expected = last + 1,
                    first = update.first_update_id,
                    last_in_batch = update.final_update_id,
                    "sequence gap detected, resynchronizing"
                );
                self.resyncs += 1;
                let mut buffer = VecDeque::new();
                buffer.push_back(update);
                self.state = SyncState::AwaitingSnapshot {
                    buffer,
                    fetch_requested: true,
                };
                SyncAction::GapDetected
            }
        }
    }

    /// Fold in a snapshot whose cursor is `snapshot_last_id`.
    ///
    /// On success the machine is synced and the returned survivors must be
    /// applied to the book, in order, after the snapshot itself. A
    /// [`DepthError::SequenceGap`] means the snapshot is stale relative to
    /// the buffer: the buffer is kept and the caller must fetch a fresher
    /// snapshot.
    pub fn on_snapshot(&mut self, snapshot_last_id: i64) -> DepthResult<SnapshotOutcome> {
        let buffer = match &mut self.state {
            SyncState::AwaitingSnapshot { buffer, .. } => std::mem::take(buffer),
            // A refresh while synced replaces applied state wholesale
            SyncState::Synced { .. } => VecDeque::new(),
        };

        let total = buffer.len();
        let mut survivors: Vec<Update> = buffer
            .into_iter()
            .filter(|u| u.final_update_id > snapshot_last_id)
            .collect();
        survivors.sort_by_key(|u| u.final_update_id);
        let dropped = total - survivors.len();

        if let Some(first) = survivors.first() {
            if first.first_update_id > snapshot_last_id + 1 {
                let err = DepthError::SequenceGap {
                    expected: snapshot_last_id + 1,
                    first: first.first_update_id,
                    last: first.final_update_id,
                };
                tracing::warn!(
                    snapshot_last_id,
                    buffer_first = first.first_update_id,
                    "snapshot stale relative to buffered updates, refetching"
                );
                self.state = SyncState::AwaitingSnapshot {
                    buffer: survivors.into(),
                    fetch_requested: true,
                };
                return Err(err);
            }
        }

        let last_update_id = survivors
            .last()
            .map(|u| u.final_update_id)
            .unwrap_or(snapshot_last_id);
        self.state = SyncState::Synced { last_update_id };

        Ok(SnapshotOutcome {
            updates: survivors,
            last_update_id,
            dropped,
        })
    }

    /// Discard applied state and re-enter buffering with a fetch already
    /// requested. Used when the book is found corrupt (checksum failure).
    pub fn begin_resync(&mut self) {
        self.resyncs += 1;
        self.state = SyncState::AwaitingSnapshot {
            buffer: VecDeque::new(),
            fetch_requested: true,
        };
    }
}

impl Default for Synchronizer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use fathom_types::{Asset, Level, Pair};

    fn update(first: i64, last: i64) -> Update {
        Update {
            exchange: "binance".to_string(),
            pair: Pair::new("BTC", "USDT"),
            asset: Asset::Spot,
            first_update_id: first,
            final_update_id: last,
            bids: vec![Level::new(100.0, 1.0)],
            asks: vec![Level::new(101.0, 1.0)],
            timestamp: Utc::now(),
            checksum: None,
        }
    }

    #[test]
    fn test_first_update_requests_snapshot() {
        let mut sync = Synchronizer::new();
        assert_eq!(sync.on_update(update(100, 105)), SyncAction::SnapshotNeeded);
        assert!(!sync.is_synced());
    }

    #[test]
    fn test_updates_buffer_until_snapshot() {
        let mut sync = Synchronizer::new();
        assert_eq!(sync.on_update(update(100, 105)), SyncAction::SnapshotNeeded);
        assert_eq!(sync.on_update(update(106, 110)), SyncAction::Buffered);
        assert_eq!(sync.on_update(update(111, 115)), SyncAction::Buffered);
    }

    #[test]
    fn test_snapshot_filters_stale_buffered_updates() {
        let mut sync = Synchronizer::new();
        sync.on_update(update(100, 105));
        sync.on_update(update(106, 110));
        sync.on_update(update(111, 115));

        // Snapshot at 108: the 100..=105 batch is covered, the 106..=110
        // batch spans 109 and survives, 111..=115 follows it
        let outcome = sync.on_snapshot(108).unwrap();
        assert_eq!(outcome.dropped, 1);
        assert_eq!(outcome.updates.len(), 2);
        assert_eq!(outcome.updates[0].final_update_id, 110);
        assert_eq!(outcome.last_update_id, 115);
        assert!(sync.is_synced());
    }

    #[test]
    fn test_survivors_apply_in_ascending_order() {
        let mut sync = Synchronizer::new();
        // Arrive out of order
        sync.on_update(update(111, 115));
        sync.on_update(update(100, 105));
        sync.on_update(update(106, 110));

        let outcome = sync.on_snapshot(105).unwrap();
        let finals: Vec<i64> = outcome.updates.iter().map(|u| u.final_update_id).collect();
        assert_eq!(finals, vec![110, 115]);
    }

    #[test]
    fn test_stale_snapshot_rejected() {
        let mut sync = Synchronizer::new();
        sync.on_update(update(100, 105));

        // Snapshot at 50 leaves a hole before the first buffered batch
        let err = sync.on_snapshot(50).unwrap_err();
        assert_eq!(
            err,
            DepthError::SequenceGap {
                expected: 51,
                first: 100,
                last: 105
            }
        );
        assert!(!sync.is_synced());

        // The buffer was kept; a fresh snapshot completes the sync
        let outcome = sync.on_snapshot(99).unwrap();
        assert_eq!(outcome.updates.len(), 1);
        assert!(sync.is_synced());
        assert_eq!(sync.last_update_id(), Some(105));
    }

    #[test]
    fn test_synced_applies_sequential_updates() {
        let mut sync = Synchronizer::new();
        sync.on_update(update(100, 105));
        sync.on_snapshot(105).unwrap();

        match sync.on_update(update(106, 110)) {
            SyncAction::Apply(applied) => assert_eq!(applied.final_update_id, 110),
            other => panic!("expected Apply, got {other:?}"),
        }
        assert_eq!(sync.last_update_id(), Some(110));

        // Batch-tolerant continuity: first id may fall inside the last batch
        match sync.on_update(update(108, 115)) {
            SyncAction::Apply(_) => {}
            other => panic!("expected Apply, got {other:?}"),
        }
        assert_eq!(sync.last_update_id(), Some(115));
    }

    #[test]
    fn test_stale_update_dropped_idempotently() {
        let mut sync = Synchronizer::new();
        sync.on_update(update(100, 105));
        sync.on_snapshot(105).unwrap();
        sync.on_update(update(106, 110));

        assert_eq!(sync.on_update(update(106, 108)), SyncAction::Dropped);
        assert_eq!(sync.on_update(update(100, 110)), SyncAction::Dropped);
        // Cursor unchanged
        assert_eq!(sync.last_update_id(), Some(110));
    }

    #[test]
    fn test_gap_triggers_resync() {
        let mut sync = Synchronizer::new();
        sync.on_update(update(100, 105));
        sync.on_snapshot(105).unwrap();
        assert_eq!(sync.resync_count(), 0);

        // Expected 106, got 200
        assert_eq!(sync.on_update(update(200, 205)), SyncAction::GapDetected);
        assert!(!sync.is_synced());
        assert_eq!(sync.resync_count(), 1);

        // The gapped update was kept and replays after the next snapshot
        let outcome = sync.on_snapshot(199).unwrap();
        assert_eq!(outcome.updates.len(), 1);
        assert_eq!(outcome.last_update_id, 205);
    }

    #[test]
    fn test_buffer_overflow_drops_oldest() {
        let mut sync = Synchronizer::new();
        for i in 0..(MAX_BUFFERED_UPDATES as i64 + 10) {
            sync.on_update(update(i * 10, i * 10 + 9));
        }
        // Oldest entries were evicted; snapshot at 0 is now stale relative
        // to what remains
        let err = sync.on_snapshot(0).unwrap_err();
        assert!(matches!(err, DepthError::SequenceGap { .. }));
    }

    #[test]
    fn test_begin_resync_counts_and_buffers() {
        let mut sync = Synchronizer::new();
        sync.on_update(update(100, 105));
        sync.on_snapshot(105).unwrap();

        sync.begin_resync();
        assert!(!sync.is_synced());
        assert_eq!(sync.resync_count(), 1);
        // Next diff buffers without re-requesting a snapshot
        assert_eq!(sync.on_update(update(106, 110)), SyncAction::Buffered);
    }
}
