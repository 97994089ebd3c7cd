//! Multi-book registry and feed pump
//!
//! [`BookService`] owns one [`Depth`] and one [`Synchronizer`] per
//! (exchange, pair, asset) key. Transport decoders push normalized
//! snapshots and diffs in; queries copy snapshots out. The service never
//! performs network I/O itself: when it needs a snapshot it says so, and
//! the transport layer fetches it.

use crate::manager::{SyncAction, Synchronizer};
use dashmap::DashMap;
use fathom_book::{checksum::validate_checksum, BookSnapshot, Depth, DepthOptions};
use fathom_types::{Asset, BookKey, DepthError, DepthResult, Pair, Update};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Event fed into the pump by transport decoders.
#[derive(Debug, Clone)]
pub enum FeedEvent {
    /// A full snapshot (REST fetch or websocket snapshot frame)
    Snapshot(BookSnapshot),
    /// An incremental diff
    Update(Update),
}

/// What happened to a processed update.
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessOutcome {
    /// The diff (or snapshot plus buffered diffs) reached the book
    Applied,
    /// Held in the buffer until a snapshot lands
    Buffered,
    /// Stale duplicate, ignored
    Dropped,
    /// The transport should fetch a fresh snapshot for this key
    SnapshotNeeded(BookKey),
}

/// One book plus its synchronization state.
///
/// The depth carries its own lock; the synchronizer gets a separate mutex
/// so buffering never blocks readers of the book.
#[derive(Debug)]
struct BookEntry {
    depth: Depth,
    sync: Mutex<Synchronizer>,
}

/// Registry of live books with the synchronization protocol wired in.
#[derive(Debug, Default)]
pub struct BookService {
    books: DashMap<BookKey, Arc<BookEntry>>,
    resyncs: AtomicU64,
}

impl BookService {
    /// Create an empty service
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a book for a key. Idempotent: re-subscribing an existing
    /// key keeps its current state.
    pub fn subscribe(&self, key: BookKey, options: DepthOptions) {
        self.books.entry(key.clone()).or_insert_with(|| {
            tracing::info!(key = %key, "subscribed");
            Arc::new(BookEntry {
                depth: Depth::new(key.clone(), options),
                sync: Mutex::new(Synchronizer::new()),
            })
        });
    }

    /// True when a book exists for the key
    pub fn is_subscribed(&self, key: &BookKey) -> bool {
        self.books.contains_key(key)
    }

    /// True once the key's book is synced to its feed
    pub fn is_synced(&self, key: &BookKey) -> bool {
        self.books
            .get(key)
            .map(|e| e.sync.lock().is_synced())
            .unwrap_or(false)
    }

    /// Drop all state for a key on subscription teardown.
    pub fn cleanup(&self, key: &BookKey) {
        if self.books.remove(key).is_some() {
            tracing::info!(key = %key, "cleaned up");
        }
    }

    /// Times any book fell back to buffering after being synced, from
    /// sequence gaps or checksum failures. A climbing value under a stable
    /// network means something is wrong upstream.
    pub fn resync_count(&self) -> u64 {
        self.resyncs.load(Ordering::Relaxed)
    }

    fn entry(&self, key: &BookKey) -> DepthResult<Arc<BookEntry>> {
        self.books
            .get(key)
            .map(|e| Arc::clone(e.value()))
            .ok_or_else(|| DepthError::BookNotFound(key.clone()))
    }

    /// Run one incoming diff through the key's synchronizer and, when
    /// continuity holds, into the book.
    ///
    /// A checksum mismatch is surfaced as an error *and* triggers a
    /// resync: the book is invalidated, the synchronizer re-enters
    /// buffering, and the caller should treat the returned key like a
    /// [`ProcessOutcome::SnapshotNeeded`].
    pub fn process_update(&self, update: Update) -> DepthResult<ProcessOutcome> {
        let key = update.key();
        let entry = self.entry(&key)?;

        let action = entry.sync.lock().on_update(update);
        match action {
            SyncAction::Apply(update) => {
                entry.depth.consume_update(&update)?;
                self.validate_applied(&entry, &update)?;
                Ok(ProcessOutcome::Applied)
            }
            SyncAction::Buffered => Ok(ProcessOutcome::Buffered),
            SyncAction::Dropped => Ok(ProcessOutcome::Dropped),
            SyncAction::SnapshotNeeded => Ok(ProcessOutcome::SnapshotNeeded(key)),
            SyncAction::GapDetected => {
                self.resyncs.fetch_add(1, Ordering::Relaxed);
                Ok(ProcessOutcome::SnapshotNeeded(key))
            }
        }
    }

    /// Load a full snapshot and drain the buffer behind it.
    ///
    /// A [`DepthError::SequenceGap`] means the snapshot was stale relative
    /// to the buffered diffs; the transport should fetch a fresher one.
    pub fn apply_snapshot(&self, snap: &BookSnapshot) -> DepthResult<ProcessOutcome> {
        let key = snap.key();
        let entry = self.entry(&key)?;

        let outcome = entry.sync.lock().on_snapshot(snap.last_update_id)?;
        entry.depth.load_snapshot(snap);
        for update in &outcome.updates {
            entry.depth.consume_update(update)?;
        }
        tracing::info!(
            key = %key,
            snapshot_id = snap.last_update_id,
            replayed = outcome.updates.len(),
            dropped = outcome.dropped,
            "book synchronized"
        );
        Ok(ProcessOutcome::Applied)
    }

    /// Point-in-time copy of a book.
    pub fn get_orderbook(
        &self,
        exchange: &str,
        pair: Pair,
        asset: Asset,
    ) -> DepthResult<BookSnapshot> {
        let key = BookKey::new(exchange, pair, asset);
        Ok(self.entry(&key)?.depth.retrieve(0))
    }

    /// Validate the freshly applied book against the feed's checksum, if
    /// both the feed supplied one and validation is enabled for this book.
    /// Corruption is never ignored: the book is emptied and resynced.
    fn validate_applied(&self, entry: &BookEntry, update: &Update) -> DepthResult<()> {
        let levels = entry.depth.options().checksum_levels;
        let (Some(expected), true) = (update.checksum, levels > 0) else {
            return Ok(());
        };

        let snap = entry.depth.retrieve(0);
        if let Err(err) = validate_checksum(&snap, levels, expected) {
            tracing::warn!(
                key = %entry.depth.key(),
                error = %err,
                "checksum validation failed, invalidating book"
            );
            self.resyncs.fetch_add(1, Ordering::Relaxed);
            entry.depth.invalidate();
            entry.sync.lock().begin_resync();
            return Err(err);
        }
        Ok(())
    }

    /// Consume feed events from a bounded channel until the senders hang
    /// up, emitting snapshot-fetch requests on `snapshot_requests`.
    ///
    /// This is the only async surface in the engine; everything it calls
    /// is synchronous and holds locks only for O(depth) work.
    pub async fn pump(
        &self,
        mut events: mpsc::Receiver<FeedEvent>,
        snapshot_requests: mpsc::Sender<BookKey>,
    ) {
        while let Some(event) = events.recv().await {
            match event {
                FeedEvent::Update(update) => {
                    let key = update.key();
                    match self.process_update(update) {
                        Ok(ProcessOutcome::SnapshotNeeded(key)) => {
                            if snapshot_requests.send(key).await.is_err() {
                                return;
                            }
                        }
                        Ok(_) => {}
                        Err(err) if err.requires_resync() => {
                            if snapshot_requests.send(key).await.is_err() {
                                return;
                            }
                        }
                        Err(err) => {
                            tracing::error!(key = %key, error = %err, "failed to process update");
                        }
                    }
                }
                FeedEvent::Snapshot(snap) => {
                    let key = snap.key();
                    match self.apply_snapshot(&snap) {
                        Ok(_) => {}
                        Err(err) if err.requires_resync() => {
                            if snapshot_requests.send(key).await.is_err() {
                                return;
                            }
                        }
                        Err(err) => {
                            tracing::error!(key = %key, error = %err, "failed to apply snapshot");
                        }
                    }
                }
            }
        }
    }
}
